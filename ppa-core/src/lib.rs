//! On-device private attribution.
//!
//! Browsing code reports ad impressions through
//! [`AttributionService::on_attribution_event`]. When a target site later
//! reports a conversion through
//! [`AttributionService::on_attribution_conversion`], the service picks the
//! most recent qualifying impression, charges the target's weekly budget, and
//! submits a one-hot histogram via [`ppa_dap`]. Every conversion produces a
//! report; unmatched or over-budget ones are all zeros.
//!
//! # Key Types
//!
//! - [`AttributionService`] - The two public entry points
//! - [`ImpressionStore`] / [`BudgetStore`] - Storage traits
//! - [`SqliteStore`] / [`MemoryStore`] - Store implementations
//! - [`AttributionConfig`] - Gating flags, budget and submission settings

pub mod budget;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
mod locks;
pub mod matcher;
pub mod model;
pub mod recorder;
pub mod report;
pub mod service;
pub mod store;

pub use budget::BudgetEnforcer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AttributionConfig;
pub use error::{AttributionError, Result};
pub use events::{AttributionEvent, EventPublisher};
pub use matcher::{AttributionMatcher, ImpressionQuery, select_best};
pub use model::{Budget, DAY_MILLIS, Impression, ImpressionType};
pub use recorder::{ImpressionEvent, ImpressionRecorder};
pub use report::ConversionReport;
pub use service::{AttributionService, ConversionRequest};
pub use store::{BudgetStore, ImpressionStore, MemoryStore, Migrator, SqliteStore};
