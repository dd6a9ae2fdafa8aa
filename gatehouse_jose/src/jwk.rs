//! JSON Web Keys as published by an identity provider
//!
//! The specifications for JSON Web Keys can be found in [RFC7517][].
//!
//! A published key set may carry keys of any type. Every entry is
//! retained, and suitability for RS256 verification is decided at lookup
//! time through [`SigningKey::is_compatible`]. A private exponent (`d`)
//! occasionally left in non-production key sets is never read.
//!
//! [RFC7517]: https://tools.ietf.org/html/rfc7517

use aliri_braid::braid;
use serde::{Deserialize, Serialize};

use crate::{b64::Base64Url, error, jwa, jws, rsa};

/// An identifier for a JWK
#[braid(serde, ref_doc = "A borrowed reference to a JWK identifier ([`KeyId`])")]
pub struct KeyId;

/// A single entry of a published key set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct SigningKey {
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    key_id: Option<KeyId>,

    #[serde(rename = "kty")]
    key_type: String,

    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    usage: Option<String>,

    #[serde(rename = "alg", default, skip_serializing_if = "Option::is_none")]
    algorithm: Option<String>,

    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    modulus: Option<Base64Url>,

    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    exponent: Option<Base64Url>,
}

impl SigningKey {
    /// Constructs an RSA key from its public components
    pub fn rsa(modulus: impl Into<Base64Url>, exponent: impl Into<Base64Url>) -> Self {
        Self {
            key_id: None,
            key_type: jwa::Algorithm::RS256.key_type().to_owned(),
            usage: None,
            algorithm: None,
            modulus: Some(modulus.into()),
            exponent: Some(exponent.into()),
        }
    }

    /// Sets the key ID
    pub fn with_key_id(self, kid: KeyId) -> Self {
        Self {
            key_id: Some(kid),
            ..self
        }
    }

    /// Sets the algorithm and the usage consistent with that algorithm
    pub fn with_algorithm(self, alg: jwa::Algorithm) -> Self {
        Self {
            algorithm: Some(alg.name().to_owned()),
            usage: Some(jwa::SIGNING_USE.to_owned()),
            ..self
        }
    }

    /// The key ID
    #[must_use]
    pub fn key_id(&self) -> Option<&KeyIdRef> {
        self.key_id.as_deref()
    }

    /// The key type (`kty`)
    #[must_use]
    pub fn key_type(&self) -> &str {
        &self.key_type
    }

    /// The intended usage of the key (`use`)
    #[must_use]
    pub fn usage(&self) -> Option<&str> {
        self.usage.as_deref()
    }

    /// The algorithm the key is restricted to (`alg`)
    #[must_use]
    pub fn algorithm(&self) -> Option<&str> {
        self.algorithm.as_deref()
    }

    /// The RSA modulus (`n`)
    #[must_use]
    pub fn modulus(&self) -> Option<&Base64Url> {
        self.modulus.as_ref()
    }

    /// The RSA public exponent (`e`)
    #[must_use]
    pub fn exponent(&self) -> Option<&Base64Url> {
        self.exponent.as_ref()
    }

    /// Whether the key may be used to verify a signature made with `alg`
    ///
    /// The key type must match, and any declared `use` or `alg` must agree.
    #[must_use]
    pub fn is_compatible(&self, alg: jwa::Algorithm) -> bool {
        self.key_type == alg.key_type()
            && self.usage.as_deref().map_or(true, |u| u == jwa::SIGNING_USE)
            && self.algorithm.as_deref().map_or(true, |a| a == alg.name())
            && self.modulus.is_some()
            && self.exponent.is_some()
    }

    /// Builds the RSA public key carried by this entry
    ///
    /// # Errors
    ///
    /// Returns an error if the components are missing or unacceptable.
    pub fn public_key(&self) -> Result<rsa::PublicKey, error::KeyRejected> {
        match (&self.modulus, &self.exponent) {
            (Some(n), Some(e)) => rsa::PublicKey::from_components(n.clone(), e.clone()),
            _ => Err(error::key_rejected("missing RSA public key components")),
        }
    }
}

impl jws::Verifier for SigningKey {
    type Error = error::KeyVerifyError;

    fn verify(
        &self,
        alg: jwa::Algorithm,
        data: &[u8],
        signature: &[u8],
    ) -> Result<(), Self::Error> {
        if !self.is_compatible(alg) {
            return Err(error::key_rejected("key incompatible with algorithm").into());
        }

        self.public_key()?.verify(alg, data, signature)?;

        Ok(())
    }
}
