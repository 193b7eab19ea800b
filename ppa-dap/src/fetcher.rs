//! Fetching gateway key configurations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::error::{DapError, Result};

/// Media type of a gateway key configuration list.
pub const OHTTP_KEYS_MEDIA_TYPE: &str = "application/ohttp-keys";

/// Source of raw `application/ohttp-keys` bodies.
///
/// Implementations must stop work and return an error once `abort` is
/// cancelled.
#[async_trait]
pub trait KeyFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, abort: CancellationToken) -> Result<Vec<u8>>;
}

/// Fetches key configurations over HTTPS.
pub struct HttpKeyFetcher {
    client: reqwest::Client,
}

impl HttpKeyFetcher {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn request(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, OHTTP_KEYS_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| DapError::KeyFetch(format!("HTTP error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DapError::KeyFetch(format!(
                "gateway returned status {}",
                status.as_u16()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DapError::KeyFetch(format!("failed to read body: {e}")))?;
        debug!(url = %url, len = body.len(), "Fetched gateway key config");
        Ok(body.to_vec())
    }
}

impl Default for HttpKeyFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch(&self, url: &Url, abort: CancellationToken) -> Result<Vec<u8>> {
        tokio::select! {
            biased;

            _ = abort.cancelled() => Err(DapError::KeyFetch("aborted".into())),
            result = self.request(url) => result,
        }
    }
}

/// Serves a fixed body, optionally after a delay.
///
/// Used by tests and offline tooling in place of a real gateway.
pub struct StaticKeyFetcher {
    body: Vec<u8>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticKeyFetcher {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            body,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Wait `delay` before answering, honoring the abort token meanwhile.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches served or attempted so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyFetcher for StaticKeyFetcher {
    async fn fetch(&self, _url: &Url, abort: CancellationToken) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = abort.cancelled() => return Err(DapError::KeyFetch("aborted".into())),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        Ok(self.body.clone())
    }
}
