//! Picks the impression a conversion is attributed to.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::model::{DAY_MILLIS, Impression, ImpressionType};
use crate::store::ImpressionStore;

/// Constraints a conversion places on the impression it may match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionQuery {
    /// Ad keys to look under. Empty means scan every stored impression.
    pub candidate_ad_keys: Vec<String>,
    pub target_host: String,
    /// Sources allowed to have shown the ad. `None` allows any.
    pub allowed_source_hosts: Option<Vec<String>>,
    pub model: ImpressionType,
    pub lookback_days: u32,
    pub histogram_size: u32,
}

impl ImpressionQuery {
    /// Oldest timestamp still inside the lookback window.
    pub fn earliest(&self, now: i64) -> i64 {
        now.saturating_sub(i64::from(self.lookback_days).saturating_mul(DAY_MILLIS))
    }

    fn admits(&self, impression: &Impression, earliest: i64) -> Option<i64> {
        if impression.target != self.target_host || impression.index >= self.histogram_size {
            return None;
        }
        if let Some(allowed) = &self.allowed_source_hosts
            && !allowed.contains(&impression.source)
        {
            return None;
        }
        impression
            .timestamp(self.model)
            .filter(|ts| *ts >= earliest)
    }
}

/// Choose the most recent impression admitted by `query`.
///
/// Ties on the resolved timestamp go to the earliest candidate in iteration
/// order.
pub fn select_best<'a, I>(candidates: I, query: &ImpressionQuery, now: i64) -> Option<Impression>
where
    I: IntoIterator<Item = &'a Impression>,
{
    let earliest = query.earliest(now);
    let mut best: Option<(i64, &Impression)> = None;

    for impression in candidates {
        let Some(ts) = query.admits(impression, earliest) else {
            continue;
        };
        if best.is_none_or(|(best_ts, _)| ts > best_ts) {
            best = Some((ts, impression));
        }
    }

    best.map(|(_, impression)| impression.clone())
}

/// Reads candidate impressions and applies [`select_best`].
pub struct AttributionMatcher {
    store: Arc<dyn ImpressionStore>,
}

impl AttributionMatcher {
    pub fn new(store: Arc<dyn ImpressionStore>) -> Self {
        Self { store }
    }

    /// Find the impression `query` attributes to, if any. Read-only.
    pub async fn find_impression(
        &self,
        query: &ImpressionQuery,
        now: i64,
    ) -> Result<Option<Impression>> {
        let candidates = self.load_candidates(&query.candidate_ad_keys).await?;
        let found = select_best(&candidates, query, now);

        debug!(
            target_host = %query.target_host,
            model = %query.model,
            candidates = candidates.len(),
            matched = found.is_some(),
            "Impression lookup finished"
        );
        if let Some(imp) = &found {
            trace!(source = %imp.source, index = imp.index, "Matched impression");
        }
        Ok(found)
    }

    async fn load_candidates(&self, ad_keys: &[String]) -> Result<Vec<Impression>> {
        if ad_keys.is_empty() {
            return self.store.get_all().await;
        }

        let mut candidates = Vec::new();
        for key in ad_keys {
            candidates.extend(self.store.get(key).await?);
        }
        Ok(candidates)
    }
}
