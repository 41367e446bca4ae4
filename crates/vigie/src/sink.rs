//! Collaborator boundary: alerting and storage.
//!
//! The engine hands every completed task to the registered sinks through
//! one mpsc channel; delivery transports and storage engines live behind
//! these traits, outside the engine. A sink failure is logged and never
//! blocks scheduling.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::report::TaskReport;
use crate::status::Status;

/// Receives completed tasks with enough identity to diff the set of
/// currently failing checks.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, report: &TaskReport);
}

/// Receives completed tasks for time-series persistence.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, report: &TaskReport) -> anyhow::Result<()>;
}

/// Alert sink that logs raise/clear transitions, tracking the failing
/// set by step hash.
#[derive(Default)]
pub struct LogAlertSink {
    failing: Mutex<HashSet<String>>,
}

impl LogAlertSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, report: &TaskReport) {
        let mut failing = self.failing.lock().await;
        let healthy = report.result.status.is_healthy();
        if healthy {
            if failing.remove(&report.step_hash) {
                info!(
                    suite = %report.suite,
                    case = %report.case,
                    step = %report.step,
                    "check recovered"
                );
            }
        } else if failing.insert(report.step_hash.clone()) {
            warn!(
                suite = %report.suite,
                case = %report.case,
                step = %report.step,
                status = %report.result.status,
                failures = ?report.result.failures(),
                "check failing"
            );
        }
    }
}

/// Store that only traces results; stands in until a real time-series
/// backend is wired up.
#[derive(Default)]
pub struct LogStore;

#[async_trait]
impl ResultStore for LogStore {
    async fn store(&self, report: &TaskReport) -> anyhow::Result<()> {
        debug!(
            suite = %report.suite,
            case = %report.case,
            step = %report.step,
            status = %report.result.status,
            "result recorded"
        );
        Ok(())
    }
}

/// Drain the report channel, fanning every report out to the sinks.
/// Runs until the channel closes; store failures are logged only.
pub async fn dispatch_reports(
    mut reports: mpsc::Receiver<TaskReport>,
    alerts: Vec<Arc<dyn AlertSink>>,
    stores: Vec<Arc<dyn ResultStore>>,
) {
    while let Some(report) = reports.recv().await {
        for alert in &alerts {
            alert.notify(&report).await;
        }
        for store in &stores {
            if let Err(e) = store.store(&report).await {
                warn!(step = %report.step, error = %e, "result store write failed");
            }
        }
    }
    debug!("report channel closed, dispatch loop exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::VigieResult;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn report(status: Status) -> TaskReport {
        TaskReport {
            suite: "s".to_string(),
            case: "c".to_string(),
            step: "step".to_string(),
            step_hash: "hash".to_string(),
            result: VigieResult {
                status,
                description: String::new(),
                timestamp: Utc::now(),
                outcomes: Vec::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_failing_set_tracks_transitions() {
        let sink = LogAlertSink::new();
        sink.notify(&report(Status::Failure)).await;
        assert_eq!(sink.failing.lock().await.len(), 1);

        // Repeated failure does not re-insert.
        sink.notify(&report(Status::Timeout)).await;
        assert_eq!(sink.failing.lock().await.len(), 1);

        sink.notify(&report(Status::Success)).await;
        assert!(sink.failing.lock().await.is_empty());
    }

    struct FailingStore(AtomicUsize);

    #[async_trait]
    impl ResultStore for FailingStore {
        async fn store(&self, _report: &TaskReport) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("disk on fire")
        }
    }

    #[tokio::test]
    async fn test_store_failure_never_blocks_dispatch() {
        let (tx, rx) = mpsc::channel(4);
        let store = Arc::new(FailingStore(AtomicUsize::new(0)));
        let dispatch = tokio::spawn(dispatch_reports(rx, Vec::new(), vec![store.clone()]));

        tx.send(report(Status::Success)).await.unwrap();
        tx.send(report(Status::Failure)).await.unwrap();
        drop(tx);
        dispatch.await.unwrap();

        assert_eq!(store.0.load(Ordering::SeqCst), 2);
    }
}
