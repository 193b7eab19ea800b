//! Stored record types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AttributionError;

/// Milliseconds in one day, the unit of a lookback window.
pub const DAY_MILLIS: i64 = 86_400_000;

/// Kind of ad interaction, which doubles as the attribution model.
///
/// Each kind selects which timestamp on an [`Impression`] it updates when
/// recorded, and which one governs recency when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpressionType {
    #[default]
    Default,
    View,
    Click,
}

impl ImpressionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::View => "view",
            Self::Click => "click",
        }
    }

    /// Parse an attribution model name. Unknown or missing names fall back
    /// to [`ImpressionType::Default`].
    pub fn model(name: Option<&str>) -> Self {
        name.and_then(|n| n.parse().ok()).unwrap_or_default()
    }
}

impl FromStr for ImpressionType {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "view" => Ok(Self::View),
            "click" => Ok(Self::Click),
            other => Err(AttributionError::UnknownEventType(other.to_string())),
        }
    }
}

impl fmt::Display for ImpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ad shown on `source` that `target` may later report a conversion for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impression {
    pub source: String,
    pub target: String,
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_impression: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_view: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_click: Option<i64>,
}

impl Impression {
    /// A record with no events seen yet.
    pub fn new(source: impl Into<String>, target: impl Into<String>, index: u32) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            index,
            last_impression: None,
            last_view: None,
            last_click: None,
        }
    }

    /// The timestamp that governs recency under `model`.
    pub fn timestamp(&self, model: ImpressionType) -> Option<i64> {
        match model {
            ImpressionType::Default => self.last_impression,
            ImpressionType::View => self.last_view,
            ImpressionType::Click => self.last_click,
        }
    }

    /// Apply an event of `kind` at `now`.
    ///
    /// `lastImpression` moves on every event; `kind` additionally moves its
    /// own timestamp. The index is always overwritten.
    pub fn touch(&mut self, kind: ImpressionType, index: u32, now: i64) {
        self.index = index;
        self.last_impression = Some(now);
        match kind {
            ImpressionType::Default => {}
            ImpressionType::View => self.last_view = Some(now),
            ImpressionType::Click => self.last_click = Some(now),
        }
    }

    pub fn is_pair(&self, source: &str, target: &str) -> bool {
        self.source == source && self.target == target
    }
}

/// Conversions a target host has spent in the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub conversions: u32,
    pub next_reset: i64,
}

impl Budget {
    /// An unspent budget whose window closes at `next_reset`.
    pub fn fresh(next_reset: i64) -> Self {
        Self {
            conversions: 0,
            next_reset,
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now > self.next_reset
    }
}
