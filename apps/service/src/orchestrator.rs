//! Orchestrator - coordinates all components
//!
//! Owns the importer, the scheduler manager and the report dispatch
//! loop. A reload builds a whole new manager from the reimported suites
//! and swaps it in only after the old one is fully stopped, so tasks
//! never change under a firing timer.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use vigie::importer::{tasks_for, Importer, SuiteMap};
use vigie::probe::ProbeRegistry;
use vigie::report::TaskReport;
use vigie::scheduler::TickerPoolManager;
use vigie::sink::{dispatch_reports, AlertSink, LogAlertSink, LogStore, ResultStore};
use vigie::teststruct::{snapshot_suite, SuiteSnapshot};

use crate::config::Config;
use crate::definitions::load_definitions;

pub struct Orchestrator {
    config: Config,
    importer: Importer,
    suites: SuiteMap,
    manager: TickerPoolManager,
    report_tx: mpsc::Sender<TaskReport>,
    dispatch_handle: JoinHandle<()>,
}

impl Orchestrator {
    /// Import every suite definition, build the scheduler and start
    /// ticking.
    pub async fn start(config: Config) -> Result<Self> {
        let importer = Importer::new(ProbeRegistry::with_builtins());
        let definitions = load_definitions(&config.tests.directory)?;
        let suites = importer.import(definitions);

        let (report_tx, report_rx) = mpsc::channel(config.engine.report_buffer);
        let alerts: Vec<Arc<dyn AlertSink>> = vec![Arc::new(LogAlertSink::new())];
        let stores: Vec<Arc<dyn ResultStore>> = vec![Arc::new(LogStore)];
        let dispatch_handle = tokio::spawn(dispatch_reports(report_rx, alerts, stores));

        let tasks = tasks_for(&suites).await;
        let mut manager = TickerPoolManager::from_tasks(tasks, report_tx.clone()).await;
        manager.start();
        info!(
            suites = suites.len(),
            pools = manager.pool_count(),
            tasks = manager.task_count().await,
            "monitoring started"
        );

        Ok(Self { config, importer, suites, manager, report_tx, dispatch_handle })
    }

    /// Re-read definitions and atomically swap in a new scheduler.
    /// Steps whose definition is unchanged keep their status and
    /// history.
    pub async fn reload(&mut self) -> Result<()> {
        let definitions = load_definitions(&self.config.tests.directory)?;
        let suites = self.importer.reimport(definitions, &self.suites).await;
        let tasks = tasks_for(&suites).await;

        let mut next = TickerPoolManager::from_tasks(tasks, self.report_tx.clone()).await;
        self.manager.stop_all();
        next.start();
        info!(
            suites = suites.len(),
            pools = next.pool_count(),
            tasks = next.task_count().await,
            "reload complete"
        );

        self.manager = next;
        self.suites = suites;
        Ok(())
    }

    /// Read-side status view; every lock is released before returning.
    pub async fn snapshots(&self) -> Vec<SuiteSnapshot> {
        let mut snapshots = Vec::with_capacity(self.suites.len());
        for suite in self.suites.values() {
            snapshots.push(snapshot_suite(suite).await);
        }
        snapshots
    }

    pub fn stop(&mut self) {
        self.manager.stop_all();
        self.dispatch_handle.abort();
        info!("monitoring stopped");
    }
}
