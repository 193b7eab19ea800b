//! Notifications emitted by the attribution service.
//!
//! Delivered over a broadcast channel to whoever subscribed. Nothing is
//! retained for replay.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Something the attribution service did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttributionEvent {
    /// An impression record was created or updated
    ImpressionRecorded {
        ad_key: String,
        source: String,
        target: String,
    },

    /// A conversion was decided and the budget committed
    ConversionAttributed {
        target: String,
        task_id: String,
        attributed: bool,
    },

    /// The report for a conversion reached the transport
    ReportSent { task_id: String },

    /// The report for a conversion was dropped
    ReportDropped { task_id: String, reason: String },
}

/// Fan-out of [`AttributionEvent`]s to live subscribers.
pub struct EventPublisher {
    tx: broadcast::Sender<AttributionEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: AttributionEvent) {
        // No receivers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttributionEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = AttributionEvent::ReportSent {
            task_id: "t".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "report_sent");
        assert_eq!(json["task_id"], "t");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let publisher = EventPublisher::default();
        publisher.publish(AttributionEvent::ReportSent {
            task_id: "t".into(),
        });

        let mut rx = publisher.subscribe();
        publisher.publish(AttributionEvent::ReportDropped {
            task_id: "t".into(),
            reason: "timeout".into(),
        });
        assert!(matches!(
            rx.recv().await.unwrap(),
            AttributionEvent::ReportDropped { .. }
        ));
    }
}
