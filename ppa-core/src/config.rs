//! Configuration for the attribution service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ppa_dap::DapConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything the attribution service reads from preferences.
///
/// Passed into [`crate::AttributionService::new`] once; nothing is read
/// lazily from global state afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionConfig {
    /// Master switch for the feature
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// User consent to upload data
    #[serde(default = "default_true")]
    pub upload_enabled: bool,

    /// Whether this build is allowed to report at all
    #[serde(default = "default_true")]
    pub reporting_build: bool,

    /// Test-only override that activates the service regardless of the flags
    #[serde(default)]
    pub force_enable: bool,

    /// Successful attributions allowed per target host per window
    #[serde(default = "default_max_conversions")]
    pub max_conversions: u32,

    /// Length of a budget window
    #[serde(default = "default_budget_window", with = "humantime_serde")]
    pub budget_window: Duration,

    /// SQLite database holding impressions and budgets
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Relay, gateway and timeout settings for submission
    #[serde(default)]
    pub dap: DapConfig,
}

fn default_true() -> bool {
    true
}

fn default_max_conversions() -> u32 {
    2
}

fn default_budget_window() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("ppa"))
        .unwrap_or_else(|| PathBuf::from(".local/share/ppa"))
        .join("attribution.sqlite")
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            upload_enabled: true,
            reporting_build: true,
            force_enable: false,
            max_conversions: default_max_conversions(),
            budget_window: default_budget_window(),
            database_path: default_database_path(),
            dap: DapConfig::default(),
        }
    }
}

impl AttributionConfig {
    /// Load from a TOML file. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No attribution config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Whether the service should do anything at all.
    pub fn is_active(&self) -> bool {
        self.force_enable || (self.enabled && self.upload_enabled && self.reporting_build)
    }

    /// Budget window in milliseconds.
    pub fn budget_window_millis(&self) -> i64 {
        i64::try_from(self.budget_window.as_millis()).unwrap_or(i64::MAX)
    }

    /// A config with every gating flag off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            upload_enabled: false,
            reporting_build: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_max_conversions(mut self, max: u32) -> Self {
        self.max_conversions = max;
        self
    }

    #[must_use]
    pub fn with_budget_window(mut self, window: Duration) -> Self {
        self.budget_window = window;
        self
    }

    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    #[must_use]
    pub fn with_dap(mut self, dap: DapConfig) -> Self {
        self.dap = dap;
        self
    }

    #[must_use]
    pub fn with_force_enable(mut self, force: bool) -> Self {
        self.force_enable = force;
        self
    }
}
