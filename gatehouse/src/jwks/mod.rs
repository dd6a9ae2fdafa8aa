//! Sources of identity provider signing keys

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use gatehouse_jose::KeySet;

use crate::{Authority, KeyFetchError};

mod fixed;
mod remote;

pub use fixed::StaticKeySetFetcher;
pub use remote::{RemoteKeySetFetcher, DEFAULT_RETRY_DELAY};

/// Retrieves the signing key set published by an authority
#[async_trait]
pub trait KeySetFetcher: fmt::Debug + Send + Sync {
    /// The current key set, which may be served from a cache
    ///
    /// # Errors
    ///
    /// Returns [`KeyFetchError::Failure`] if the key set cannot be retrieved
    /// and [`KeyFetchError::Malformed`] if it cannot be read.
    async fn fetch(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError>;

    /// The key set, bypassing any cache freshness
    ///
    /// # Errors
    ///
    /// Fails in the same way as [`fetch`][KeySetFetcher::fetch].
    async fn refresh(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError>;
}
