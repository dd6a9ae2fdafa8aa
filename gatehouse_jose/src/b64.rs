//! Base64url handling for the segments of a compact JWT and the
//! big-endian integers of a JWK

use std::fmt;

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// URL-safe alphabet, no padding on output, padding tolerated on input
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The data provided was not valid base64url
#[derive(Debug, Error)]
#[error("invalid base64url data")]
pub struct InvalidBase64Data {
    #[from]
    source: base64::DecodeError,
}

/// Owned bytes that serialize as unpadded base64url
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[must_use]
pub struct Base64Url(Vec<u8>);

impl Base64Url {
    /// Wraps raw bytes
    pub fn from_raw(raw: impl Into<Vec<u8>>) -> Self {
        Self(raw.into())
    }

    /// Decodes base64url-encoded data
    ///
    /// # Errors
    ///
    /// Returns an error if `enc` is not valid base64url.
    pub fn from_encoded(enc: impl AsRef<[u8]>) -> Result<Self, InvalidBase64Data> {
        Ok(Self(URL_SAFE_LENIENT.decode(enc)?))
    }

    /// The decoded bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Unwraps the decoded bytes
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// The decoded bytes with any leading zero octets removed
    ///
    /// JWK integers are big-endian and should already be minimal, but some
    /// providers pad the modulus to a whole number of words.
    #[must_use]
    pub fn as_unsigned_be(&self) -> &[u8] {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(self.0.len());
        &self.0[start..]
    }
}

impl From<Vec<u8>> for Base64Url {
    #[inline]
    fn from(raw: Vec<u8>) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&URL_SAFE_LENIENT.encode(&self.0))
    }
}

impl fmt::Debug for Base64Url {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Base64Url({})", self)
    }
}

impl Serialize for Base64Url {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Base64Url {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        Self::from_encoded(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
