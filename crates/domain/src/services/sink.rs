//! Best-effort side effects (daily counters and audit entries).
//!
//! Callers enqueue without waiting; a background task drains the queue into
//! the stores. A full or closed queue drops the event, and store failures
//! are logged and swallowed. Counters are approximate by contract.

use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::model::{DailyMetric, NewAuditEntry};
use crate::storage::{AuditStore, StatsStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Increment(DailyMetric),
    Audit(NewAuditEntry),
}

impl SinkEvent {
    fn kind(&self) -> &'static str {
        match self {
            SinkEvent::Increment(_) => "stat",
            SinkEvent::Audit(_) => "audit",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StatsSink {
    tx: mpsc::Sender<SinkEvent>,
}

impl StatsSink {
    /// Starts the drain task on the current tokio runtime. The task exits once
    /// every sink handle has been dropped and the queue is empty.
    pub fn spawn(
        stats: Arc<dyn StatsStore>,
        audit: Arc<dyn AuditStore>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(drain(rx, stats, audit));
        (Self { tx }, worker)
    }

    pub fn increment(&self, metric: DailyMetric) {
        self.dispatch(SinkEvent::Increment(metric));
    }

    pub fn audit(&self, entry: NewAuditEntry) {
        self.dispatch(SinkEvent::Audit(entry));
    }

    fn dispatch(&self, event: SinkEvent) {
        let kind = event.kind();
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                counter!("sink_events_dropped_total", "kind" => kind, "reason" => "full")
                    .increment(1);
                debug!(kind, "sink queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                counter!("sink_events_dropped_total", "kind" => kind, "reason" => "closed")
                    .increment(1);
                warn!(kind, "sink worker stopped, dropping event");
            }
        }
    }
}

async fn drain(
    mut rx: mpsc::Receiver<SinkEvent>,
    stats: Arc<dyn StatsStore>,
    audit: Arc<dyn AuditStore>,
) {
    while let Some(event) = rx.recv().await {
        let kind = event.kind();
        let result = match event {
            SinkEvent::Increment(metric) => {
                stats
                    .increment_daily(Utc::now().date_naive(), metric)
                    .await
            }
            SinkEvent::Audit(entry) => audit.append_audit(entry).await,
        };
        match result {
            Ok(()) => {
                counter!("sink_events_total", "kind" => kind, "result" => "ok").increment(1);
            }
            Err(err) => {
                counter!("sink_events_total", "kind" => kind, "result" => "error").increment(1);
                warn!(kind, error = %err, "side-effect write failed");
            }
        }
    }
    debug!("sink worker drained");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use crate::model::AuditAction;
    use crate::services::testing::MemoryStore;

    #[tokio::test]
    async fn drains_counters_and_audit_entries() {
        let store = MemoryStore::shared();
        let (sink, worker) = StatsSink::spawn(store.clone(), store.clone(), 8);

        sink.increment(DailyMetric::Leads);
        sink.increment(DailyMetric::Leads);
        sink.increment(DailyMetric::ClicksAffiliate);
        sink.audit(NewAuditEntry::now(
            AuditAction::UpdateConfig,
            json!({ "key": "filament_pla" }),
            Some("127.0.0.1".into()),
        ));
        drop(sink);
        worker.await.expect("worker exits");

        assert_eq!(store.stat(DailyMetric::Leads), 2);
        assert_eq!(store.stat(DailyMetric::ClicksAffiliate), 1);
        let audits = store.audits();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].action, AuditAction::UpdateConfig);
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let store = MemoryStore::shared();
        store.fail_side_effects.store(true, Ordering::SeqCst);
        let (sink, worker) = StatsSink::spawn(store.clone(), store.clone(), 8);

        sink.increment(DailyMetric::Visits);
        sink.audit(NewAuditEntry::now(
            AuditAction::RevealContact,
            json!({}),
            None,
        ));
        drop(sink);

        // The worker survives failed writes and keeps draining.
        worker.await.expect("worker exits cleanly");
        assert_eq!(store.stat(DailyMetric::Visits), 0);
        assert!(store.audits().is_empty());
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = StatsSink { tx };

        sink.increment(DailyMetric::Leads);
        sink.increment(DailyMetric::Leads);
        drop(sink);

        assert_eq!(rx.recv().await, Some(SinkEvent::Increment(DailyMetric::Leads)));
        assert_eq!(rx.recv().await, None);
    }
}
