//! JSON Web Algorithms accepted by this crate
//!
//! The algorithm registry is defined in [RFC7518][]. Only RSASSA-PKCS1-v1_5
//! with SHA-256 (`RS256`) is accepted. Any other name, including the
//! symmetric `HS*` family and `none`, is rejected before a key is ever
//! consulted.
//!
//! [RFC7518]: https://tools.ietf.org/html/rfc7518

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error;

/// A signing algorithm accepted for verification
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Algorithm {
    /// RSASSA-PKCS1-v1_5 using SHA-256
    RS256,
}

impl Algorithm {
    /// The JWA name of the algorithm
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
        }
    }

    /// The JWK `kty` a key must carry to verify with this algorithm
    #[must_use]
    pub const fn key_type(self) -> &'static str {
        match self {
            Self::RS256 => "RSA",
        }
    }

    pub(crate) fn verification_params(self) -> &'static ring::signature::RsaParameters {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        }
    }

    #[cfg(any(test, feature = "private-keys"))]
    pub(crate) fn signing_params(self) -> &'static dyn ring::signature::RsaEncoding {
        match self {
            Self::RS256 => &ring::signature::RSA_PKCS1_SHA256,
        }
    }
}

impl FromStr for Algorithm {
    type Err = error::UnsupportedAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::RS256),
            other => Err(error::unsupported_algorithm(other)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The JWK `use` value for keys intended for signature verification
pub const SIGNING_USE: &str = "sig";
