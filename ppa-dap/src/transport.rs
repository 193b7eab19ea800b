//! The encrypted DAP sender collaborator.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{DapError, Result};
use crate::keys::GatewayKeys;
use crate::task::DapTask;

/// Where an OHTTP-encapsulated submission goes and which keys seal it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OhttpRoute {
    pub relay: Url,
    pub gateway_keys: GatewayKeys,
}

/// A measurement ready for secret-sharing and upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task: DapTask,
    pub measurement: Vec<u8>,
    /// `None` only when submitting directly under test instrumentation.
    pub route: Option<OhttpRoute>,
}

/// Performs the DAP upload, including sharding, HPKE sealing and OHTTP
/// encapsulation.
///
/// Implementations should give up once `timeout` has elapsed; the caller
/// enforces the same deadline regardless.
#[async_trait]
pub trait DapTransport: Send + Sync {
    async fn send(&self, submission: &Submission, timeout: Duration) -> Result<()>;
}

/// Records submissions instead of sending them.
///
/// Can be switched into a failing mode to exercise error paths.
#[derive(Default)]
pub struct RecordingTransport {
    submissions: Mutex<Vec<Submission>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send fail with a transport error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Sleep this long before completing each send.
    pub fn set_delay(&self, delay: Option<Duration>) {
        if let Ok(mut slot) = self.delay.lock() {
            *slot = delay;
        }
    }

    /// Submissions recorded so far, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.submissions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DapTransport for RecordingTransport {
    async fn send(&self, submission: &Submission, _timeout: Duration) -> Result<()> {
        let delay = self.delay.lock().ok().and_then(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(DapError::Transport("upload rejected".into()));
        }

        self.submissions
            .lock()
            .map_err(|_| DapError::Transport("recorder lock poisoned".into()))?
            .push(submission.clone());
        Ok(())
    }
}
