//! TTL-aware cache of gateway key configurations.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use url::Url;

use crate::keys::GatewayKeys;

struct CachedKeys {
    keys: GatewayKeys,
    fetched_at: Instant,
}

/// Process-wide cache of key configurations keyed by gateway key URL.
///
/// Safe to share between concurrent conversions; a later insert for the same
/// URL simply replaces the earlier one.
pub struct KeyCache {
    max_age: Duration,
    entries: RwLock<HashMap<Url, CachedKeys>>,
}

impl KeyCache {
    pub fn new(max_age: Duration) -> Self {
        Self {
            max_age,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Return the cached keys for `url` if they are younger than `max_age`.
    pub async fn get(&self, url: &Url) -> Option<GatewayKeys> {
        let entries = self.entries.read().await;
        let entry = entries.get(url)?;
        if entry.fetched_at.elapsed() < self.max_age {
            Some(entry.keys.clone())
        } else {
            None
        }
    }

    pub async fn insert(&self, url: Url, keys: GatewayKeys) {
        self.entries.write().await.insert(
            url,
            CachedKeys {
                keys,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Drop every entry, fresh or stale.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::tests::x25519_body;

    fn url() -> Url {
        Url::parse("https://gateway.example/ohttp-configs").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_entry_is_returned() {
        let cache = KeyCache::new(Duration::from_secs(60));
        let keys = GatewayKeys::parse(&x25519_body()).unwrap();
        cache.insert(url(), keys.clone()).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&url()).await, Some(keys));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_is_a_miss() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache
            .insert(url(), GatewayKeys::parse(&x25519_body()).unwrap())
            .await;

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(cache.get(&url()).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_entries() {
        let cache = KeyCache::new(Duration::from_secs(60));
        cache
            .insert(url(), GatewayKeys::parse(&x25519_body()).unwrap())
            .await;
        cache.clear().await;
        assert!(cache.get(&url()).await.is_none());
    }
}
