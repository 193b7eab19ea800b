//! Upserts impression records on ad events.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::locks::KeyedLocks;
use crate::model::{Impression, ImpressionType};
use crate::store::ImpressionStore;

/// One ad view, click or plain impression reported by browsing code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpressionEvent {
    pub source_host: String,
    pub kind: ImpressionType,
    pub index: u32,
    pub ad_key: String,
    pub target_host: String,
}

/// Writes impression events into the [`ImpressionStore`].
///
/// Each ad key's record list is rewritten whole, so events sharing an ad key
/// are applied one at a time.
pub struct ImpressionRecorder {
    store: Arc<dyn ImpressionStore>,
    locks: KeyedLocks,
}

impl ImpressionRecorder {
    pub fn new(store: Arc<dyn ImpressionStore>) -> Self {
        Self {
            store,
            locks: KeyedLocks::new(),
        }
    }

    /// Record `event` at `now`.
    ///
    /// At most one record exists per `(source, target)` pair under an ad key;
    /// a repeat event updates that record instead of adding another.
    pub async fn record(&self, event: &ImpressionEvent, now: i64) -> Result<Impression> {
        let _guard = self.locks.lock(&event.ad_key).await;
        let mut impressions = self.store.get(&event.ad_key).await?;

        let position = impressions
            .iter()
            .position(|imp| imp.is_pair(&event.source_host, &event.target_host));

        let mut impression = match position {
            Some(i) => impressions[i].clone(),
            None => Impression::new(&event.source_host, &event.target_host, event.index),
        };
        impression.touch(event.kind, event.index, now);

        match position {
            Some(i) => impressions[i] = impression.clone(),
            None => impressions.push(impression.clone()),
        }

        self.store.put(&event.ad_key, &impressions).await?;
        debug!(
            ad_key = %event.ad_key,
            kind = %event.kind,
            updated = position.is_some(),
            "Recorded impression"
        );
        Ok(impression)
    }
}
