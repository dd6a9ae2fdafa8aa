//! An API gateway token authorizer backed by an identity provider's
//! published signing keys
//!
//! For each inbound call the [`AuthorizationEngine`]:
//!
//! 1. parses the method identifier supplied by the gateway,
//! 2. verifies the bearer token against the key set published by the
//!    user pool, fetched and cached by a [`KeySetFetcher`],
//! 3. grants the principal access to their own user record, widened to all
//!    users for members of the administrator group,
//! 4. renders the grants into the policy document the gateway enforces.
//!
//! Any failure denies the call. There is no partial or default policy.
//!
//! # Example
//!
//! ```no_run
//! use gatehouse::{AuthorizationEngine, Config};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = AuthorizationEngine::from_config(Config::from_env()?)?;
//!
//! let response = engine
//!     .authorize(
//!         "arn:aws:execute-api:us-east-1:111122223333:a1b2c3/prod/GET/users/u1",
//!         "Bearer eyJ...",
//!     )
//!     .await?;
//!
//! println!("{}", serde_json::to_string(&response)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! HTTPS support in `reqwest` is provided by `rustls-tls` by default. Use
//! `default-tls` instead to link against the platform TLS library.

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

mod authority;
mod claims;
pub mod config;
mod descriptor;
mod engine;
mod error;
pub mod jwks;
pub mod policy;
pub mod response;
mod validator;

pub use authority::Authority;
pub use claims::Claims;
pub use config::{Config, ConfigError};
pub use descriptor::ResourceDescriptor;
pub use engine::AuthorizationEngine;
pub use error::{Error, KeyFetchError, PolicyError};
pub use jwks::{KeySetFetcher, RemoteKeySetFetcher, StaticKeySetFetcher};
pub use policy::{Effect, PolicyBuilder, Verb};
pub use response::{AuthorizerRequest, AuthorizerResponse};
pub use validator::TokenValidator;
