//! The attribution service and its two entry points.

use std::sync::Arc;

use ppa_dap::{DapTransport, HttpKeyFetcher, ReportSender};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::budget::BudgetEnforcer;
use crate::clock::{Clock, SystemClock};
use crate::config::AttributionConfig;
use crate::error::Result;
use crate::events::{AttributionEvent, EventPublisher};
use crate::matcher::{AttributionMatcher, ImpressionQuery};
use crate::model::ImpressionType;
use crate::recorder::{ImpressionEvent, ImpressionRecorder};
use crate::report::ConversionReport;
use crate::store::{BudgetStore, ImpressionStore, SqliteStore};

/// Parameters of a conversion reported by a target site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub target_host: String,
    pub task_id: String,
    pub histogram_size: u32,
    pub lookback_days: u32,
    /// Attribution model name; unknown or missing means `"default"`
    pub model: Option<String>,
    /// Ads to check. `None` or empty scans every stored impression.
    pub candidate_ad_keys: Option<Vec<String>>,
    pub allowed_source_hosts: Option<Vec<String>>,
}

impl ConversionRequest {
    pub fn new(
        target_host: impl Into<String>,
        task_id: impl Into<String>,
        histogram_size: u32,
        lookback_days: u32,
    ) -> Self {
        Self {
            target_host: target_host.into(),
            task_id: task_id.into(),
            histogram_size,
            lookback_days,
            model: None,
            candidate_ad_keys: None,
            allowed_source_hosts: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_ad_keys(mut self, keys: Vec<String>) -> Self {
        self.candidate_ad_keys = Some(keys);
        self
    }

    #[must_use]
    pub fn with_source_hosts(mut self, hosts: Vec<String>) -> Self {
        self.allowed_source_hosts = Some(hosts);
        self
    }

    fn query(&self) -> ImpressionQuery {
        ImpressionQuery {
            candidate_ad_keys: self.candidate_ad_keys.clone().unwrap_or_default(),
            target_host: self.target_host.clone(),
            allowed_source_hosts: self.allowed_source_hosts.clone(),
            model: ImpressionType::model(self.model.as_deref()),
            lookback_days: self.lookback_days,
            histogram_size: self.histogram_size,
        }
    }
}

/// Records impressions and reports attributed conversions.
///
/// Neither entry point lets a transient failure escape: storage, key and
/// transport errors are logged and the work is dropped. Only a missing OHTTP
/// relay outside test mode is returned to the caller.
pub struct AttributionService {
    config: AttributionConfig,
    clock: Arc<dyn Clock>,
    recorder: ImpressionRecorder,
    matcher: AttributionMatcher,
    budgets: BudgetEnforcer,
    sender: ReportSender,
    events: EventPublisher,
}

impl AttributionService {
    pub fn new(
        config: AttributionConfig,
        impressions: Arc<dyn ImpressionStore>,
        budgets: Arc<dyn BudgetStore>,
        sender: ReportSender,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            recorder: ImpressionRecorder::new(impressions.clone()),
            matcher: AttributionMatcher::new(impressions),
            budgets: BudgetEnforcer::new(budgets, config.budget_window_millis()),
            sender,
            clock,
            events: EventPublisher::default(),
            config,
        }
    }

    /// Open the SQLite database named in `config` and fetch gateway keys over
    /// HTTPS, submitting through `transport`.
    pub fn open(config: AttributionConfig, transport: Arc<dyn DapTransport>) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(&config.database_path)?);
        let sender = ReportSender::new(
            config.dap.clone(),
            Arc::new(HttpKeyFetcher::new()),
            transport,
        );
        Ok(Self::new(
            config,
            store.clone(),
            store,
            sender,
            Arc::new(SystemClock),
        ))
    }

    /// Record an ad impression, view or click shown on `source_host`.
    pub async fn on_attribution_event(
        &self,
        source_host: &str,
        event_type: &str,
        index: u32,
        ad_key: &str,
        target_host: &str,
    ) {
        if !self.config.is_active() {
            debug!("Attribution disabled, ignoring impression event");
            return;
        }

        let kind = match event_type.parse::<ImpressionType>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!(error = %e, "Ignoring impression event");
                return;
            }
        };

        let event = ImpressionEvent {
            source_host: source_host.to_string(),
            kind,
            index,
            ad_key: ad_key.to_string(),
            target_host: target_host.to_string(),
        };

        let now = self.clock.now_millis();
        match self.recorder.record(&event, now).await {
            Ok(_) => self.events.publish(AttributionEvent::ImpressionRecorded {
                ad_key: event.ad_key,
                source: event.source_host,
                target: event.target_host,
            }),
            Err(e) => warn!(ad_key = %ad_key, error = %e, "Failed to record impression"),
        }
    }

    /// Attribute a conversion and submit its report.
    ///
    /// A report goes out whether or not anything matched. The budget is
    /// committed before submission, so a failed send neither refunds nor
    /// double-charges it.
    pub async fn on_attribution_conversion(&self, request: &ConversionRequest) -> Result<()> {
        if !self.config.is_active() {
            debug!("Attribution disabled, ignoring conversion");
            return Ok(());
        }

        let now = self.clock.now_millis();
        let report = match self.commit_conversion(request, now).await {
            Ok(report) => report,
            Err(e) => {
                warn!(target_host = %request.target_host, error = %e, "Abandoning conversion");
                return Ok(());
            }
        };

        self.events.publish(AttributionEvent::ConversionAttributed {
            target: request.target_host.clone(),
            task_id: report.task_id.clone(),
            attributed: report.is_attributed(),
        });

        let result = self
            .sender
            .send_report(&report.task_id, report.measurement())
            .await;

        match result {
            Ok(()) => {
                self.events.publish(AttributionEvent::ReportSent {
                    task_id: report.task_id,
                });
                Ok(())
            }
            Err(e) => {
                self.events.publish(AttributionEvent::ReportDropped {
                    task_id: report.task_id.clone(),
                    reason: e.to_string(),
                });
                if e.is_configuration() {
                    error!(task_id = %report.task_id, error = %e, "Refusing to submit attribution report");
                    return Err(e.into());
                }
                warn!(task_id = %report.task_id, error = %e, "Dropping attribution report");
                Ok(())
            }
        }
    }

    /// Check the budget, match, and charge the budget, all under the target
    /// host's budget lock.
    async fn commit_conversion(
        &self,
        request: &ConversionRequest,
        now: i64,
    ) -> Result<ConversionReport> {
        let host = request.target_host.as_str();
        let _guard = self.budgets.lock(host).await;

        let mut budget = self.budgets.get_budget(host, now).await?;
        let impression = self.matcher.find_impression(&request.query(), now).await?;

        let report = ConversionReport::build(
            &request.task_id,
            request.histogram_size,
            &budget,
            self.config.max_conversions,
            impression.as_ref(),
        );

        self.budgets
            .update_budget(&mut budget, report.budget_delta(), host)
            .await?;
        debug!(
            target_host = %host,
            conversions = budget.conversions,
            attributed = report.is_attributed(),
            "Committed conversion budget"
        );
        Ok(report)
    }

    /// Receive every [`AttributionEvent`] emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<AttributionEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.config.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Budget, Impression};
    use crate::store::MemoryStore;
    use ppa_dap::{DapConfig, RecordingTransport, StaticKeyFetcher};

    struct Harness {
        service: AttributionService,
        store: Arc<MemoryStore>,
        transport: Arc<RecordingTransport>,
    }

    fn harness(config: AttributionConfig) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(RecordingTransport::new());
        let sender = ReportSender::new(
            config.dap.clone(),
            Arc::new(StaticKeyFetcher::new(Vec::new())),
            transport.clone(),
        );
        let service = AttributionService::new(
            config,
            store.clone(),
            store.clone(),
            sender,
            Arc::new(ManualClock::new(0)),
        );
        Harness {
            service,
            store,
            transport,
        }
    }

    fn test_config() -> AttributionConfig {
        AttributionConfig::default().with_dap(DapConfig::default().with_test_mode(true))
    }

    #[test]
    fn test_request_query_defaults() {
        let query = ConversionRequest::new("b.com", "t", 8, 3)
            .with_model("nonsense")
            .query();

        assert!(query.candidate_ad_keys.is_empty());
        assert_eq!(query.model, ImpressionType::Default);
        assert_eq!(query.allowed_source_hosts, None);
        assert_eq!(query.histogram_size, 8);
    }

    #[tokio::test]
    async fn test_disabled_service_does_nothing() {
        let h = harness(AttributionConfig::disabled());

        h.service
            .on_attribution_event("a.com", "click", 1, "ad", "b.com")
            .await;
        h.service
            .on_attribution_conversion(&ConversionRequest::new("b.com", "t", 4, 1))
            .await
            .unwrap();

        assert_eq!(h.store.ad_key_count().await, 0);
        assert!(BudgetStore::get(h.store.as_ref(), "b.com").await.unwrap().is_none());
        assert!(h.transport.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_type_is_dropped() {
        let h = harness(test_config());

        h.service
            .on_attribution_event("a.com", "hover", 1, "ad", "b.com")
            .await;

        assert_eq!(h.store.ad_key_count().await, 0);
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let h = harness(test_config());
        let mut rx = h.service.subscribe();

        h.service
            .on_attribution_event("a.com", "view", 1, "ad", "b.com")
            .await;
        h.service
            .on_attribution_conversion(&ConversionRequest::new("b.com", "t", 4, 1).with_model("view"))
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            AttributionEvent::ImpressionRecorded {
                ad_key: "ad".into(),
                source: "a.com".into(),
                target: "b.com".into(),
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AttributionEvent::ConversionAttributed {
                target: "b.com".into(),
                task_id: "t".into(),
                attributed: true,
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            AttributionEvent::ReportSent {
                task_id: "t".into()
            }
        );
    }

    #[tokio::test]
    async fn test_missing_relay_is_returned_after_budget_commit() {
        let h = harness(AttributionConfig::default());
        h.service
            .on_attribution_event("a.com", "default", 2, "ad", "b.com")
            .await;

        let err = h
            .service
            .on_attribution_conversion(&ConversionRequest::new("b.com", "t", 4, 1))
            .await
            .unwrap_err();

        assert!(err.is_configuration());
        assert!(h.transport.is_empty());
        let budget = BudgetStore::get(h.store.as_ref(), "b.com").await.unwrap().unwrap();
        assert_eq!(budget.conversions, 1);
    }

    #[tokio::test]
    async fn test_submits_the_report_measurement() {
        let h = harness(test_config());
        h.service
            .on_attribution_event("a.com", "default", 2, "ad", "b.com")
            .await;

        h.service
            .on_attribution_conversion(&ConversionRequest::new("b.com", "t", 4, 1))
            .await
            .unwrap();

        let expected = ConversionReport::build(
            "t",
            4,
            &Budget::fresh(0),
            2,
            Some(&Impression::new("a.com", "b.com", 2)),
        );
        let sent = h.transport.submissions();
        assert_eq!(sent[0].measurement, expected.measurement());
        assert_eq!(sent[0].measurement, vec![0, 0, 1, 0]);
    }
}
