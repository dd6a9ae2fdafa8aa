use std::error::Error as StdError;

use gatehouse_jose::jwk::{KeyId, KeyIdRef};
use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// An error retrieving the signing keys published by an identity provider
#[derive(Debug, Error)]
pub enum KeyFetchError {
    /// The key set could not be retrieved
    ///
    /// Covers transport failures, timeouts, and non-success responses.
    #[error("unable to fetch key set from {url}")]
    Failure {
        /// The key set URL
        url: String,
        /// The underlying failure
        #[source]
        source: BoxError,
    },

    /// The key set was retrieved but is not a well-formed key set document
    #[error("key set from {url} is malformed")]
    Malformed {
        /// The key set URL
        url: String,
        /// The underlying parse failure
        #[source]
        source: serde_json::Error,
    },
}

impl KeyFetchError {
    /// The URL of the key set that could not be retrieved
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::Failure { url, .. } | Self::Malformed { url, .. } => url,
        }
    }
}

/// An error constructing a policy document
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The HTTP verb is not one of the supported verbs
    #[error("invalid HTTP verb '{0}'")]
    InvalidVerb(String),

    /// The resource path contains characters outside `[A-Za-z0-9./*-]`
    #[error("invalid resource path '{0}'")]
    InvalidResourcePattern(String),

    /// A condition is not a non-empty JSON object of condition operators
    #[error("invalid policy condition '{0}'")]
    InvalidCondition(String),

    /// No methods were added before building
    #[error("no statements defined for the policy of '{principal_id}'")]
    EmptyPolicy {
        /// The principal the policy was being built for
        principal_id: String,
    },
}

/// The reason an authorization request was denied
///
/// Every variant is terminal. A caller must treat any error as a denial.
#[derive(Debug, Error)]
pub enum Error {
    /// The method descriptor does not have the expected shape
    #[error("malformed method descriptor '{0}'")]
    MalformedDescriptor(String),

    /// The bearer token is not a well-formed compact JWT
    #[error("malformed token")]
    MalformedToken(#[source] gatehouse_jose::error::JwtVerifyError),

    /// The identity provider's key set could not be retrieved
    #[error(transparent)]
    KeyFetchFailure(KeyFetchError),

    /// The identity provider returned an unreadable key set
    #[error(transparent)]
    KeyFetchMalformed(KeyFetchError),

    /// The token is signed with an algorithm other than RS256
    #[error("unsupported token signing algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    /// No usable key in the published set matches the token's key ID
    #[error("no signing key matches kid '{}'", display_kid(.kid.as_deref()))]
    NoMatchingKey {
        /// The key ID named by the token header, if any
        kid: Option<KeyId>,
    },

    /// The token signature does not verify against the selected key
    #[error("token signature does not verify against key '{kid}'")]
    InvalidSignature {
        /// The key ID used for verification
        kid: KeyId,
    },

    /// The token has expired or carries no expiration
    #[error("token expired")]
    TokenExpired,

    /// The token is not valid yet
    #[error("token not yet valid")]
    TokenNotYetValid,

    /// The token was not issued for this authority or application
    #[error("token {claim} '{value}' is not accepted")]
    TokenWrongAudience {
        /// The rejected claim
        claim: &'static str,
        /// The claim value, empty if absent
        value: String,
    },

    /// The token does not name a subject
    #[error("token does not identify a principal")]
    MissingPrincipal,

    /// The HTTP verb is not one of the supported verbs
    #[error("invalid HTTP verb '{0}'")]
    InvalidVerb(String),

    /// The resource path contains characters outside `[A-Za-z0-9./*-]`
    #[error("invalid resource path '{0}'")]
    InvalidResourcePattern(String),

    /// A policy condition is not a condition block
    #[error("invalid policy condition '{0}'")]
    InvalidCondition(String),

    /// The rules produced no statements
    #[error("no statements defined for the policy of '{principal_id}'")]
    EmptyPolicy {
        /// The principal the policy was being built for
        principal_id: String,
    },

    /// The request was cancelled or ran past its deadline
    #[error("authorization cancelled")]
    Cancelled,
}

fn display_kid(kid: Option<&KeyIdRef>) -> &str {
    kid.map_or("<none>", KeyIdRef::as_str)
}

impl Error {
    /// A stable name for the error, suitable for structured logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedDescriptor(_) => "MalformedDescriptor",
            Self::MalformedToken(_) => "MalformedToken",
            Self::KeyFetchFailure(_) => "KeyFetchFailure",
            Self::KeyFetchMalformed(_) => "KeyFetchMalformed",
            Self::UnsupportedAlgorithm(_) => "UnsupportedAlgorithm",
            Self::NoMatchingKey { .. } => "NoMatchingKey",
            Self::InvalidSignature { .. } => "InvalidSignature",
            Self::TokenExpired => "TokenExpired",
            Self::TokenNotYetValid => "TokenNotYetValid",
            Self::TokenWrongAudience { .. } => "TokenWrongAudience",
            Self::MissingPrincipal => "MissingPrincipal",
            Self::InvalidVerb(_) => "InvalidVerb",
            Self::InvalidResourcePattern(_) => "InvalidResourcePattern",
            Self::InvalidCondition(_) => "InvalidCondition",
            Self::EmptyPolicy { .. } => "EmptyPolicy",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl From<KeyFetchError> for Error {
    fn from(err: KeyFetchError) -> Self {
        match err {
            KeyFetchError::Failure { .. } => Self::KeyFetchFailure(err),
            KeyFetchError::Malformed { .. } => Self::KeyFetchMalformed(err),
        }
    }
}

impl From<PolicyError> for Error {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::InvalidVerb(verb) => Self::InvalidVerb(verb),
            PolicyError::InvalidResourcePattern(path) => Self::InvalidResourcePattern(path),
            PolicyError::InvalidCondition(condition) => Self::InvalidCondition(condition),
            PolicyError::EmptyPolicy { principal_id } => Self::EmptyPolicy { principal_id },
        }
    }
}
