//! Authorizer configuration
//!
//! Configuration is read once, at start up, and is immutable afterwards.
//!
//! | variable                     | default                      |
//! |------------------------------|------------------------------|
//! | `USER_POOL_ID`               | required                     |
//! | `ADMIN_GROUP_NAME`           | empty, matching no one       |
//! | `APPLICATION_CLIENT_ID`      | unset, audience not checked  |
//! | `IDENTITY_PROVIDER_ENDPOINT` | regional Cognito endpoint    |
//! | `JWKS_FETCH_TIMEOUT_MS`      | `3000`                       |
//! | `JWKS_MAX_AGE_SECS`          | `300`                        |
//! | `TOKEN_LEEWAY_SECS`          | `0`                          |
//!
//! Variables that are set but empty are treated as unset.

use std::{num::ParseIntError, time::Duration};

use aliri_braid::braid;
use thiserror::Error;

use crate::Authority;

/// The OAuth2 client identifier of the application tokens are issued for
#[braid(serde, ref_doc = "A borrowed reference to a [`ClientId`]")]
pub struct ClientId;

const POOL_ID: &str = "USER_POOL_ID";
const ADMIN_GROUP: &str = "ADMIN_GROUP_NAME";
const CLIENT_ID: &str = "APPLICATION_CLIENT_ID";
const ENDPOINT: &str = "IDENTITY_PROVIDER_ENDPOINT";
const FETCH_TIMEOUT: &str = "JWKS_FETCH_TIMEOUT_MS";
const MAX_AGE: &str = "JWKS_MAX_AGE_SECS";
const LEEWAY: &str = "TOKEN_LEEWAY_SECS";

/// The default key set request timeout
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);

/// The default time a fetched key set is served without revalidation
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(300);

/// A configuration value is missing or unusable
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is not set
    #[error("required variable {0} is not set")]
    Missing(&'static str),

    /// A variable is set to a value that cannot be parsed
    #[error("variable {name} has invalid value '{value}'")]
    InvalidValue {
        /// The variable name
        name: &'static str,
        /// The rejected value
        value: String,
        /// Why the value was rejected
        #[source]
        source: ParseIntError,
    },
}

/// Authorizer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Config {
    pool_id: String,
    admin_group: String,
    client_id: Option<ClientId>,
    endpoint: Option<String>,
    fetch_timeout: Duration,
    max_age: Duration,
    leeway: Duration,
}

impl Config {
    /// Configuration for a user pool with default settings
    pub fn new(pool_id: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            admin_group: String::new(),
            client_id: None,
            endpoint: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_age: DEFAULT_MAX_AGE,
            leeway: Duration::ZERO,
        }
    }

    /// Reads configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a numeric
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary lookup function
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a numeric
    /// variable cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let pool_id = get(POOL_ID).ok_or(ConfigError::Missing(POOL_ID))?;

        let fetch_timeout = parse_u64(FETCH_TIMEOUT, get(FETCH_TIMEOUT))?
            .map_or(DEFAULT_FETCH_TIMEOUT, Duration::from_millis);
        let max_age =
            parse_u64(MAX_AGE, get(MAX_AGE))?.map_or(DEFAULT_MAX_AGE, Duration::from_secs);
        let leeway = parse_u64(LEEWAY, get(LEEWAY))?.map_or(Duration::ZERO, Duration::from_secs);

        Ok(Self {
            pool_id,
            admin_group: get(ADMIN_GROUP).unwrap_or_default(),
            client_id: get(CLIENT_ID).map(ClientId::new),
            endpoint: get(ENDPOINT),
            fetch_timeout,
            max_age,
            leeway,
        })
    }

    /// Sets the group whose members are granted access to all users
    pub fn with_admin_group(self, admin_group: impl Into<String>) -> Self {
        Self {
            admin_group: admin_group.into(),
            ..self
        }
    }

    /// Requires tokens to be issued for the given application client
    pub fn with_client_id(self, client_id: ClientId) -> Self {
        Self {
            client_id: Some(client_id),
            ..self
        }
    }

    /// Overrides the identity provider's base URL
    pub fn with_endpoint(self, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..self
        }
    }

    /// Sets the key set request timeout
    pub fn with_fetch_timeout(self, fetch_timeout: Duration) -> Self {
        Self {
            fetch_timeout,
            ..self
        }
    }

    /// Sets how long a fetched key set is served without revalidation
    pub fn with_max_age(self, max_age: Duration) -> Self {
        Self { max_age, ..self }
    }

    /// Sets the clock skew allowance for `exp` and `nbf`
    pub fn with_leeway(self, leeway: Duration) -> Self {
        Self { leeway, ..self }
    }

    /// The user pool identifier
    #[must_use]
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }

    /// The administrator group, empty if none is configured
    #[must_use]
    pub fn admin_group(&self) -> &str {
        &self.admin_group
    }

    /// The expected application client
    #[must_use]
    pub fn client_id(&self) -> Option<&ClientIdRef> {
        self.client_id.as_deref()
    }

    /// The identity provider base URL override
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    /// The key set request timeout
    #[must_use]
    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    /// How long a fetched key set is served without revalidation
    #[must_use]
    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// The clock skew allowance for `exp` and `nbf`
    #[must_use]
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// The authority for this pool in the given region
    pub fn authority(&self, region: &str) -> Authority {
        let authority = Authority::new(region, self.pool_id.as_str());
        match &self.endpoint {
            Some(endpoint) => authority.with_endpoint(endpoint),
            None => authority,
        }
    }
}

fn parse_u64(name: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|source| ConfigError::InvalidValue {
                    name,
                    value,
                    source,
                })
        })
        .transpose()
}
