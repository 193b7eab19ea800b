//! Builds DAP submissions and hands them to the transport.

use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::KeyCache;
use crate::config::DapConfig;
use crate::error::{DapError, Result};
use crate::fetcher::KeyFetcher;
use crate::manager::KeyManager;
use crate::task::DapTask;
use crate::transport::{DapTransport, OhttpRoute, Submission};

/// Submits histogram reports through an OHTTP relay.
pub struct ReportSender {
    config: DapConfig,
    keys: KeyManager,
    transport: Arc<dyn DapTransport>,
}

impl ReportSender {
    /// Create a sender with its own key cache.
    pub fn new(
        config: DapConfig,
        fetcher: Arc<dyn KeyFetcher>,
        transport: Arc<dyn DapTransport>,
    ) -> Self {
        let cache = Arc::new(KeyCache::new(config.key_max_age));
        Self::with_cache(config, fetcher, cache, transport)
    }

    /// Create a sender that shares an existing key cache.
    pub fn with_cache(
        config: DapConfig,
        fetcher: Arc<dyn KeyFetcher>,
        cache: Arc<KeyCache>,
        transport: Arc<dyn DapTransport>,
    ) -> Self {
        let keys = KeyManager::new(fetcher, cache, config.key_fetch_timeout);
        Self {
            config,
            keys,
            transport,
        }
    }

    /// Submit `measurement` as a report for `task_id`.
    ///
    /// Fails with [`DapError::Configuration`] when no relay is configured
    /// outside test mode. There is no retry: a failed submission is gone.
    pub async fn send_report(&self, task_id: &str, measurement: Vec<u8>) -> Result<()> {
        let task = DapTask::histogram(task_id);
        let route = self.resolve_route().await?;

        let submission = Submission {
            task,
            measurement,
            route,
        };

        let timeout = self.config.send_timeout;
        match tokio::time::timeout(timeout, self.transport.send(&submission, timeout)).await {
            Ok(Ok(())) => {
                info!(task_id = %task_id, "Submitted DAP report");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(DapError::Timeout {
                operation: "DAP submission",
                elapsed: timeout,
            }),
        }
    }

    async fn resolve_route(&self) -> Result<Option<OhttpRoute>> {
        match (&self.config.ohttp_relay, &self.config.gateway_key_url) {
            (Some(relay), Some(key_url)) => {
                let gateway_keys = self.keys.get(key_url).await?;
                Ok(Some(OhttpRoute {
                    relay: relay.clone(),
                    gateway_keys,
                }))
            }
            (Some(_), None) => Err(DapError::Configuration(
                "OHTTP relay configured without a gateway key URL".into(),
            )),
            (None, _) if self.config.test_mode => {
                debug!("No OHTTP relay, submitting directly under test mode");
                Ok(None)
            }
            (None, _) => Err(DapError::Configuration(
                "no OHTTP relay configured; direct submission is not permitted".into(),
            )),
        }
    }

    pub fn config(&self) -> &DapConfig {
        &self.config
    }
}
