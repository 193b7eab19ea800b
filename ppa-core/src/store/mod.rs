//! Durable impression and budget storage.
//!
//! Both stores are plain keyed tables. Read-modify-write sequences are
//! serialized by callers ([`crate::ImpressionRecorder`] locks per ad key,
//! [`crate::BudgetEnforcer`] per host), so implementations only need each
//! individual `get`/`put` to be atomic.

mod memory;
mod migrations;
mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Budget, Impression};

pub use memory::MemoryStore;
pub use migrations::Migrator;
pub use sqlite::SqliteStore;

/// Impression records keyed by ad identifier.
#[async_trait]
pub trait ImpressionStore: Send + Sync {
    /// Records stored under `ad_key`, empty if none.
    async fn get(&self, ad_key: &str) -> Result<Vec<Impression>>;

    /// Every record, in key insertion order and then record order.
    async fn get_all(&self) -> Result<Vec<Impression>>;

    /// Replace the records stored under `ad_key`.
    async fn put(&self, ad_key: &str, impressions: &[Impression]) -> Result<()>;
}

/// Conversion budgets keyed by reporting host.
#[async_trait]
pub trait BudgetStore: Send + Sync {
    async fn get(&self, host: &str) -> Result<Option<Budget>>;

    async fn put(&self, host: &str, budget: &Budget) -> Result<()>;
}
