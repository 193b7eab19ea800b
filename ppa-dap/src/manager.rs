//! Resolves gateway keys through the cache, fetching on a miss.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::cache::KeyCache;
use crate::error::{DapError, Result};
use crate::fetcher::KeyFetcher;
use crate::keys::GatewayKeys;

/// Cached, deadline-bounded access to gateway key configurations.
pub struct KeyManager {
    fetcher: Arc<dyn KeyFetcher>,
    cache: Arc<KeyCache>,
    fetch_timeout: Duration,
}

impl KeyManager {
    pub fn new(fetcher: Arc<dyn KeyFetcher>, cache: Arc<KeyCache>, fetch_timeout: Duration) -> Self {
        Self {
            fetcher,
            cache,
            fetch_timeout,
        }
    }

    /// Return keys for `url`, from cache when fresh.
    ///
    /// On a miss the fetch is given an abort token that fires after
    /// `fetch_timeout`. Only successfully parsed configurations are cached.
    pub async fn get(&self, url: &Url) -> Result<GatewayKeys> {
        if let Some(keys) = self.cache.get(url).await {
            debug!(url = %url, "Gateway keys served from cache");
            return Ok(keys);
        }

        let abort = CancellationToken::new();
        let timer = {
            let abort = abort.clone();
            let timeout = self.fetch_timeout;
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                abort.cancel();
            })
        };

        let result = self.fetcher.fetch(url, abort.clone()).await;
        timer.abort();

        let body = match result {
            Ok(body) => body,
            Err(_) if abort.is_cancelled() => {
                return Err(DapError::Timeout {
                    operation: "gateway key fetch",
                    elapsed: self.fetch_timeout,
                });
            }
            Err(e) => return Err(e),
        };

        let keys = GatewayKeys::parse(&body)?;
        self.cache.insert(url.clone(), keys.clone()).await;
        Ok(keys)
    }

    pub fn cache(&self) -> &Arc<KeyCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::StaticKeyFetcher;
    use crate::keys::tests::x25519_body;

    fn url() -> Url {
        Url::parse("https://gateway.example/ohttp-configs").unwrap()
    }

    fn manager(fetcher: Arc<StaticKeyFetcher>, max_age: Duration) -> KeyManager {
        KeyManager::new(
            fetcher,
            Arc::new(KeyCache::new(max_age)),
            Duration::from_secs(15),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_get_hits_cache() {
        let fetcher = Arc::new(StaticKeyFetcher::new(x25519_body()));
        let manager = manager(fetcher.clone(), Duration::from_secs(3600));

        let first = manager.get(&url()).await.unwrap();
        let second = manager.get(&url()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let fetcher = Arc::new(StaticKeyFetcher::new(x25519_body()));
        let manager = manager(fetcher.clone(), Duration::from_secs(60));

        manager.get(&url()).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        manager.get(&url()).await.unwrap();

        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let fetcher =
            Arc::new(StaticKeyFetcher::new(x25519_body()).with_delay(Duration::from_secs(20)));
        let manager = manager(fetcher.clone(), Duration::from_secs(3600));

        let err = manager.get(&url()).await.unwrap_err();
        assert!(matches!(
            err,
            DapError::Timeout {
                operation: "gateway key fetch",
                ..
            }
        ));
        assert!(manager.cache().get(&url()).await.is_none());
    }

    #[tokio::test]
    async fn test_invalid_body_is_not_cached() {
        let fetcher = Arc::new(StaticKeyFetcher::new(vec![0, 1]));
        let manager = manager(fetcher.clone(), Duration::from_secs(3600));

        assert!(matches!(
            manager.get(&url()).await,
            Err(DapError::KeyConfig(_))
        ));
        assert!(manager.get(&url()).await.is_err());
        assert_eq!(fetcher.calls(), 2);
    }
}
