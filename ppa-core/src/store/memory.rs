//! In-memory store implementation.
//!
//! Nothing is persisted. Useful for tests and for sessions that must leave
//! no trace on disk.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{BudgetStore, ImpressionStore};
use crate::error::Result;
use crate::model::{Budget, Impression};

/// In-memory implementation of both stores.
#[derive(Default)]
pub struct MemoryStore {
    /// Ad keys in first-insertion order with their records
    impressions: RwLock<Vec<(String, Vec<Impression>)>>,
    budgets: RwLock<HashMap<String, Budget>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ad keys with stored impressions.
    pub async fn ad_key_count(&self) -> usize {
        self.impressions.read().await.len()
    }
}

#[async_trait]
impl ImpressionStore for MemoryStore {
    async fn get(&self, ad_key: &str) -> Result<Vec<Impression>> {
        let impressions = self.impressions.read().await;
        Ok(impressions
            .iter()
            .find(|(key, _)| key == ad_key)
            .map(|(_, records)| records.clone())
            .unwrap_or_default())
    }

    async fn get_all(&self) -> Result<Vec<Impression>> {
        let impressions = self.impressions.read().await;
        Ok(impressions
            .iter()
            .flat_map(|(_, records)| records.iter().cloned())
            .collect())
    }

    async fn put(&self, ad_key: &str, records: &[Impression]) -> Result<()> {
        let mut impressions = self.impressions.write().await;
        match impressions.iter_mut().find(|(key, _)| key == ad_key) {
            Some((_, existing)) => *existing = records.to_vec(),
            None => impressions.push((ad_key.to_string(), records.to_vec())),
        }
        Ok(())
    }
}

#[async_trait]
impl BudgetStore for MemoryStore {
    async fn get(&self, host: &str) -> Result<Option<Budget>> {
        Ok(self.budgets.read().await.get(host).copied())
    }

    async fn put(&self, host: &str, budget: &Budget) -> Result<()> {
        self.budgets.write().await.insert(host.to_string(), *budget);
        Ok(())
    }
}
