//! Per-host conversion budgets.

use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::model::Budget;
use crate::store::BudgetStore;

/// Reads and charges conversion budgets.
///
/// A budget read and its update must happen under [`BudgetEnforcer::lock`]
/// for the same host, otherwise concurrent conversions can overspend.
pub struct BudgetEnforcer {
    store: Arc<dyn BudgetStore>,
    window_millis: i64,
    locks: KeyedLocks,
}

impl BudgetEnforcer {
    pub fn new(store: Arc<dyn BudgetStore>, window_millis: i64) -> Self {
        Self {
            store,
            window_millis,
            locks: KeyedLocks::new(),
        }
    }

    /// Serialize budget access for `host` until the guard is dropped.
    pub async fn lock(&self, host: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(host).await
    }

    /// Current budget for `host`.
    ///
    /// A missing or expired record comes back fresh. Nothing is written until
    /// [`BudgetEnforcer::update_budget`].
    pub async fn get_budget(&self, host: &str, now: i64) -> Result<Budget> {
        match self.store.get(host).await? {
            Some(budget) if !budget.is_expired(now) => Ok(budget),
            stale => {
                if stale.is_some() {
                    debug!(host = %host, "Budget window elapsed, starting fresh");
                }
                Ok(Budget::fresh(now.saturating_add(self.window_millis)))
            }
        }
    }

    /// Add `delta` conversions to `budget` and persist it for `host`.
    pub async fn update_budget(&self, budget: &mut Budget, delta: u32, host: &str) -> Result<()> {
        budget.conversions = budget.conversions.saturating_add(delta);
        self.store.put(host, budget).await
    }
}
