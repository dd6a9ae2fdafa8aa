use std::{collections::HashMap, error::Error as StdError, fmt, sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use gatehouse_jose::{
    clock::{Clock, System, UnixTime},
    KeySet,
};
use reqwest::{
    header::{self, HeaderValue},
    Client, Response, StatusCode,
};
use tokio::sync::Mutex;

use super::KeySetFetcher;
use crate::{config::Config, Authority, KeyFetchError};

/// Delay before the single retry of a request that failed in transport
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone)]
struct CachedKeySet {
    keys: Arc<KeySet>,
    fetched_at: UnixTime,
    etag: Option<HeaderValue>,
    last_modified: Option<HeaderValue>,
}

type Cache = HashMap<String, Arc<CachedKeySet>>;
type Gates = HashMap<String, Arc<Mutex<()>>>;

/// Fetches key sets over HTTPS, caching each one by URL
///
/// A cached set younger than the maximum age is served without a request.
/// An older one is revalidated with `If-None-Match` or `If-Modified-Since`,
/// and a `304 Not Modified` response keeps the cached keys.
///
/// Concurrent callers that find the same set stale share one request.
pub struct RemoteKeySetFetcher {
    client: Client,
    cache: ArcSwap<Cache>,
    gates: Mutex<Gates>,
    max_age: Duration,
    retry_delay: Duration,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl fmt::Debug for RemoteKeySetFetcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RemoteKeySetFetcher")
            .field("cached", &self.cache.load().len())
            .field("max_age", &self.max_age)
            .field("retry_delay", &self.retry_delay)
            .finish_non_exhaustive()
    }
}

impl RemoteKeySetFetcher {
    /// Constructs a fetcher whose requests time out after `timeout`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("gatehouse/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            cache: ArcSwap::from_pointee(Cache::new()),
            gates: Mutex::new(Gates::new()),
            max_age: crate::config::DEFAULT_MAX_AGE,
            retry_delay: DEFAULT_RETRY_DELAY,
            clock: Arc::new(System),
        })
    }

    /// Constructs a fetcher with the timeout and maximum age of `config`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        Ok(Self::new(config.fetch_timeout())?.with_max_age(config.max_age()))
    }

    /// Sets how long a fetched key set is served without revalidation
    #[must_use]
    pub fn with_max_age(self, max_age: Duration) -> Self {
        Self { max_age, ..self }
    }

    /// Sets the delay before retrying a request that failed in transport
    #[must_use]
    pub fn with_retry_delay(self, retry_delay: Duration) -> Self {
        Self {
            retry_delay,
            ..self
        }
    }

    /// Sets the clock used to judge cache freshness
    #[must_use]
    pub fn with_clock<C: Clock + Send + Sync + 'static>(self, clock: C) -> Self {
        Self {
            clock: Arc::new(clock),
            ..self
        }
    }

    fn cached(&self, url: &str) -> Option<Arc<CachedKeySet>> {
        self.cache.load().get(url).cloned()
    }

    async fn gate(&self, url: &str) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        Arc::clone(gates.entry(url.to_owned()).or_default())
    }

    fn fresh(&self, url: &str) -> Option<Arc<KeySet>> {
        self.cached(url)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| Arc::clone(&entry.keys))
    }

    fn is_fresh(&self, entry: &CachedKeySet) -> bool {
        self.clock.now().secs_since(entry.fetched_at) < self.max_age.as_secs()
    }

    fn store(&self, url: &str, entry: Arc<CachedKeySet>) {
        self.cache.rcu(|current| {
            let mut next = Cache::clone(current);
            next.insert(url.to_owned(), Arc::clone(&entry));
            next
        });
    }

    async fn load(
        &self,
        url: &str,
        cached: Option<Arc<CachedKeySet>>,
    ) -> Result<Arc<KeySet>, KeyFetchError> {
        let response = self.send(url, cached.as_deref()).await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return match cached {
                Some(entry) => {
                    tracing::debug!("key set not modified");
                    let entry = Arc::new(CachedKeySet {
                        fetched_at: self.clock.now(),
                        ..CachedKeySet::clone(&entry)
                    });
                    let keys = Arc::clone(&entry.keys);
                    self.store(url, entry);
                    Ok(keys)
                }
                None => Err(KeyFetchError::Failure {
                    url: url.to_owned(),
                    source: "not modified response to an unconditional request".into(),
                }),
            };
        }

        if let Err(err) = response.error_for_status_ref() {
            let error: &dyn StdError = &err;
            tracing::warn!(
                error,
                http.status_code = response.status().as_u16(),
                "key set fetch failed; unexpected response status",
            );
            return Err(KeyFetchError::Failure {
                url: url.to_owned(),
                source: Box::new(err),
            });
        }

        let etag = response.headers().get(header::ETAG).cloned();
        let last_modified = response.headers().get(header::LAST_MODIFIED).cloned();

        let body = response.bytes().await.map_err(|err| {
            let error: &dyn StdError = &err;
            tracing::warn!(error, "key set fetch failed; unable to read body");
            KeyFetchError::Failure {
                url: url.to_owned(),
                source: Box::new(err),
            }
        })?;

        let keys: KeySet = serde_json::from_slice(&body).map_err(|err| {
            let error: &dyn StdError = &err;
            tracing::warn!(error, "key set fetch failed; malformed key set");
            KeyFetchError::Malformed {
                url: url.to_owned(),
                source: err,
            }
        })?;

        let keys = Arc::new(keys);
        self.store(
            url,
            Arc::new(CachedKeySet {
                keys: Arc::clone(&keys),
                fetched_at: self.clock.now(),
                etag,
                last_modified,
            }),
        );
        tracing::info!(keys = keys.keys().len(), "key set refreshed");

        Ok(keys)
    }

    async fn send(
        &self,
        url: &str,
        cached: Option<&CachedKeySet>,
    ) -> Result<Response, KeyFetchError> {
        let mut attempt = 0;

        loop {
            let mut request = self.client.get(url);
            if let Some(entry) = cached {
                if let Some(etag) = &entry.etag {
                    request = request.header(header::IF_NONE_MATCH, etag);
                } else if let Some(last_modified) = &entry.last_modified {
                    request = request.header(header::IF_MODIFIED_SINCE, last_modified);
                }
            }

            match request.send().await {
                Ok(response) => return Ok(response),
                Err(err) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    {
                        let error: &dyn StdError = &err;
                        tracing::warn!(
                            error,
                            retry.attempt = attempt,
                            retry.delay = ?self.retry_delay,
                            "key set request failed; retrying",
                        );
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(err) => {
                    let error: &dyn StdError = &err;
                    tracing::warn!(error, "key set request failed; giving up");
                    return Err(KeyFetchError::Failure {
                        url: url.to_owned(),
                        source: Box::new(err),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl KeySetFetcher for RemoteKeySetFetcher {
    #[tracing::instrument(skip_all, fields(jwks.url = %authority.jwks_url()))]
    async fn fetch(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        let url = authority.jwks_url();

        if let Some(keys) = self.fresh(url) {
            tracing::debug!("serving cached key set");
            return Ok(keys);
        }

        let gate = self.gate(url).await;
        let _loading = gate.lock().await;

        // Another caller may have reloaded the set while this one waited.
        if let Some(keys) = self.fresh(url) {
            tracing::debug!("serving key set loaded by a concurrent fetch");
            return Ok(keys);
        }

        self.load(url, self.cached(url)).await
    }

    #[tracing::instrument(skip_all, fields(jwks.url = %authority.jwks_url()))]
    async fn refresh(&self, authority: &Authority) -> Result<Arc<KeySet>, KeyFetchError> {
        let url = authority.jwks_url();
        self.load(url, self.cached(url)).await
    }
}
