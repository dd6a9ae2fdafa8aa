//! RSA keys for RS256

use crate::{b64::Base64Url, error, jwa, jws};

/// The smallest modulus accepted for verification, in bytes (2048 bits)
const MIN_MODULUS_LEN: usize = 256;

/// RSA public key components
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PublicKey {
    modulus: Base64Url,
    exponent: Base64Url,
}

impl PublicKey {
    /// Constructs a public key from the modulus and exponent
    ///
    /// # Errors
    ///
    /// Returns an error if the modulus is shorter than 2048 bits or either
    /// component is empty.
    pub fn from_components(
        modulus: impl Into<Base64Url>,
        exponent: impl Into<Base64Url>,
    ) -> Result<Self, error::KeyRejected> {
        let modulus = modulus.into();
        let exponent = exponent.into();

        if exponent.as_unsigned_be().is_empty() {
            return Err(error::key_rejected("empty RSA public exponent"));
        }

        if modulus.as_unsigned_be().len() < MIN_MODULUS_LEN {
            return Err(error::key_rejected("RSA modulus must be at least 2048 bits"));
        }

        Ok(Self { modulus, exponent })
    }

    /// The public key's modulus
    pub fn modulus(&self) -> &Base64Url {
        &self.modulus
    }

    /// The public key's exponent
    pub fn exponent(&self) -> &Base64Url {
        &self.exponent
    }
}

impl jws::Verifier for PublicKey {
    type Error = error::SignatureMismatch;

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        let pk = ring::signature::RsaPublicKeyComponents {
            n: self.modulus.as_unsigned_be(),
            e: self.exponent.as_unsigned_be(),
        };

        pk.verify(alg.verification_params(), data, signature)
            .map_err(|_| error::signature_mismatch())
    }
}

#[cfg(any(test, feature = "private-keys"))]
pub use private::PrivateKey;

#[cfg(any(test, feature = "private-keys"))]
mod private {
    use std::{fmt, sync::Arc};

    use ring::{rand::SystemRandom, signature::RsaKeyPair};

    use crate::{error, jwa, jws};

    /// An RSA key pair used to sign test tokens
    ///
    /// Production tokens are issued by the identity provider, so this type
    /// only exists behind the `private-keys` feature.
    #[derive(Clone)]
    #[must_use]
    pub struct PrivateKey {
        key_pair: Arc<RsaKeyPair>,
    }

    impl PrivateKey {
        /// Imports a PKCS#1 DER-encoded RSA private key
        ///
        /// # Errors
        ///
        /// The provided bytes are not a valid RSA private key.
        pub fn from_der(der: &[u8]) -> Result<Self, error::Unexpected> {
            let key_pair = RsaKeyPair::from_der(der)
                .map_err(|e| error::unexpected(e.to_string()))?;
            Ok(Self {
                key_pair: Arc::new(key_pair),
            })
        }
    }

    impl fmt::Debug for PrivateKey {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.debug_struct("PrivateKey")
                .field("private_key", &"<redacted>")
                .finish()
        }
    }

    impl jws::Signer for PrivateKey {
        type Error = error::Unexpected;

        fn sign(&self, alg: jwa::Algorithm, data: &[u8]) -> Result<Vec<u8>, Self::Error> {
            let mut buf = vec![0; self.key_pair.public().modulus_len()];
            self.key_pair
                .sign(alg.signing_params(), &SystemRandom::new(), data, &mut buf)
                .map_err(|e| error::unexpected(e.to_string()))?;
            Ok(buf)
        }
    }
}
