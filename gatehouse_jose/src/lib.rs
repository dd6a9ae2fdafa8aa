//! The JOSE building blocks needed to verify identity provider tokens:
//!
//! * JSON Web Signature (JWS): [RFC7515][], RS256 only
//! * JSON Web Key (JWK) and key sets: [RFC7517][]
//! * JSON Web Algorithms (JWA): [RFC7518][]
//! * JSON Web Token (JWT): [RFC7519][]
//!
//! Token issuance is limited to the `private-keys` feature, which exists so
//! that tests can mint tokens for a freshly generated key pair.
//!
//! [RFC7515]: https://tools.ietf.org/html/rfc7515
//! [RFC7517]: https://tools.ietf.org/html/rfc7517
//! [RFC7518]: https://tools.ietf.org/html/rfc7518
//! [RFC7519]: https://tools.ietf.org/html/rfc7519
//!
//! # Example
//!
//! ```
//! use gatehouse_jose::{jwk, JwtRef};
//!
//! let token = JwtRef::from_str(concat!(
//!     "eyJhbGciOiJIUzI1NiIsImtpZCI6InRlc3Qga2V5In0.",
//!     "eyJzdWIiOiJBbGlyaSIsImF1ZCI6Im15X2FwaSIsImlzcyI6ImF1dGhvcml0eSJ9.",
//!     "yKDd4Ba3fdedqRKHrSUUMuF01-ctdXzEKM9oyWjSx9A"
//! ));
//!
//! let decomposed = token.decompose().unwrap();
//! assert_eq!(decomposed.kid(), Some(jwk::KeyIdRef::from_str("test key")));
//!
//! // Symmetric algorithms are refused before any key is consulted
//! let err = decomposed.alg().unwrap_err();
//! assert_eq!(err.alg(), "HS256");
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod b64;
pub mod clock;
pub mod error;
pub mod jwa;
pub mod jwk;
mod jwks;
pub mod jws;
pub mod jwt;
pub mod rsa;

#[cfg(test)]
mod test;

#[doc(inline)]
pub use b64::Base64Url;
#[doc(inline)]
pub use jwk::SigningKey;
pub use jwks::KeySet;
#[doc(inline)]
pub use jwt::{Jwt, JwtRef};
