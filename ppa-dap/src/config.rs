//! Configuration for report submission.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Relay, gateway, and timeout settings for DAP submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DapConfig {
    /// OHTTP relay that forwards encapsulated requests to the gateway.
    #[serde(default)]
    pub ohttp_relay: Option<Url>,

    /// URL serving the gateway's `application/ohttp-keys` configuration.
    #[serde(default)]
    pub gateway_key_url: Option<Url>,

    /// Abort deadline for a single gateway key fetch.
    #[serde(default = "default_key_fetch_timeout", with = "humantime_serde")]
    pub key_fetch_timeout: Duration,

    /// How long a fetched key configuration stays usable.
    #[serde(default = "default_key_max_age", with = "humantime_serde")]
    pub key_max_age: Duration,

    /// Overall deadline handed to the transport for one submission.
    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,

    /// Permit submission without OHTTP. Only for test instrumentation.
    #[serde(default)]
    pub test_mode: bool,
}

fn default_key_fetch_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_key_max_age() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for DapConfig {
    fn default() -> Self {
        Self {
            ohttp_relay: None,
            gateway_key_url: None,
            key_fetch_timeout: default_key_fetch_timeout(),
            key_max_age: default_key_max_age(),
            send_timeout: default_send_timeout(),
            test_mode: false,
        }
    }
}

impl DapConfig {
    /// Route submissions through the given relay and gateway key URL.
    #[must_use]
    pub fn with_ohttp(mut self, relay: Url, gateway_key_url: Url) -> Self {
        self.ohttp_relay = Some(relay);
        self.gateway_key_url = Some(gateway_key_url);
        self
    }

    #[must_use]
    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    #[must_use]
    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_key_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.key_fetch_timeout = timeout;
        self
    }
}
