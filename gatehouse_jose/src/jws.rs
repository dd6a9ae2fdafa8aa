//! JSON Web Signature verification traits
//!
//! The specifications for this standard can be found in [RFC7515][].
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515

use std::error::Error as StdError;

use crate::jwa;

/// A JWS verifier
pub trait Verifier {
    /// The error returned on a failure to verify
    type Error: StdError + Send + Sync + 'static;

    /// Attempts to verify the data against the signature using the
    /// specified algorithm
    fn verify(&self, alg: jwa::Algorithm, data: &[u8], signature: &[u8])
        -> Result<(), Self::Error>;
}

impl<T: Verifier + ?Sized> Verifier for &'_ T {
    type Error = T::Error;

    #[inline]
    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        T::verify(self, alg, data, signature)
    }
}

/// A JWS signer
#[cfg(any(test, feature = "private-keys"))]
#[cfg_attr(docsrs, doc(cfg(feature = "private-keys")))]
pub trait Signer {
    /// The error returned on failure to sign
    type Error: StdError + Send + Sync + 'static;

    /// Attempts to sign the data provided using the specified algorithm
    fn sign(&self, alg: jwa::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error>;
}
