use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use gatehouse_jose::KeySet;

use super::KeySetFetcher;
use crate::{Authority, KeyFetchError};

/// Serves a fixed, in-memory key set for every authority
///
/// Useful in tests and in deployments that pin the provider's keys.
#[derive(Debug)]
pub struct StaticKeySetFetcher {
    keys: ArcSwap<KeySet>,
}

impl StaticKeySetFetcher {
    /// Serves the given key set
    #[must_use]
    pub fn new(keys: KeySet) -> Self {
        Self {
            keys: ArcSwap::from_pointee(keys),
        }
    }

    /// Replaces the key set served from now on
    pub fn set_keys(&self, keys: KeySet) {
        self.keys.store(Arc::new(keys));
    }
}

#[async_trait]
impl KeySetFetcher for StaticKeySetFetcher {
    async fn fetch(&self, _authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        Ok(self.keys.load_full())
    }

    async fn refresh(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        self.fetch(authority).await
    }
}

#[cfg(test)]
mod tests {
    use gatehouse_jose::SigningKey;

    use super::*;

    #[tokio::test]
    async fn serves_replaced_keys() -> color_eyre::Result<()> {
        let fetcher = StaticKeySetFetcher::new(KeySet::default());
        let authority = Authority::new("us-east-1", "pool");

        assert!(fetcher.fetch(&authority).await?.is_empty());

        let key = SigningKey::rsa(vec![0xc5; 256], vec![1, 0, 1]);
        fetcher.set_keys(std::iter::once(key).collect());

        assert_eq!(fetcher.refresh(&authority).await?.keys().len(), 1);
        Ok(())
    }
}
