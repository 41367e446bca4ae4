//! Frequency-bucketed scheduler.
//!
//! One ticker pool per distinct TestStep frequency. On each tick a pool
//! spreads its tasks across the tick window instead of bursting them,
//! bounding instantaneous outbound fan-out. A reload never mutates a
//! running pool: it builds a whole new manager and swaps it in after
//! stopping the old one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::executor::TaskExecutor;
use crate::report::TaskReport;
use crate::teststruct::Task;

/// Frequencies above this get a randomized start so long-interval pools
/// are not all silent, then all bursting, after boot.
const JITTER_THRESHOLD: Duration = Duration::from_secs(59);
const JITTER_MAX_MS: u64 = 10_000;

/// Timer-driven batch of tasks sharing one execution frequency.
pub struct TickerPool {
    frequency: Duration,
    tasks: Arc<RwLock<Vec<Task>>>,
    executor: Arc<TaskExecutor>,
    report_tx: mpsc::Sender<TaskReport>,
    handle: Option<JoinHandle<()>>,
}

impl TickerPool {
    /// Frequencies of 1ms and below are rejected.
    pub fn new(
        frequency: Duration,
        executor: Arc<TaskExecutor>,
        report_tx: mpsc::Sender<TaskReport>,
    ) -> Result<Self, ConfigError> {
        if frequency <= Duration::from_millis(1) {
            return Err(ConfigError::InvalidFrequency(frequency));
        }
        Ok(Self {
            frequency,
            tasks: Arc::new(RwLock::new(Vec::new())),
            executor,
            report_tx,
            handle: None,
        })
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub async fn add_task(&self, task: Task) {
        self.tasks.write().await.push(task);
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the pool's tick loop. Idempotent.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let frequency = self.frequency;
        let tasks = self.tasks.clone();
        let executor = self.executor.clone();
        let report_tx = self.report_tx.clone();

        // Long-interval pools run one pass right away, after a random
        // offset, instead of staying silent for a whole period.
        let startup_jitter = if frequency > JITTER_THRESHOLD {
            Some(Duration::from_millis(rand::thread_rng().gen_range(0..=JITTER_MAX_MS)))
        } else {
            None
        };

        self.handle = Some(tokio::spawn(async move {
            if let Some(jitter) = startup_jitter {
                debug!(frequency = ?frequency, jitter = ?jitter, "startup pass after jitter");
                tokio::time::sleep(jitter).await;
                run_pass(&tasks, frequency, &executor, &report_tx).await;
            }

            let mut timer = tokio::time::interval(frequency);
            // The first tick of an interval completes immediately.
            timer.tick().await;
            loop {
                timer.tick().await;
                run_pass(&tasks, frequency, &executor, &report_tx).await;
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TickerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One tick: dispatch every task fire-and-forget, pausing
/// `frequency / task_count` between dispatches.
async fn run_pass(
    tasks: &Arc<RwLock<Vec<Task>>>,
    frequency: Duration,
    executor: &Arc<TaskExecutor>,
    report_tx: &mpsc::Sender<TaskReport>,
) {
    let batch = tasks.read().await.clone();
    if batch.is_empty() {
        return;
    }

    let spacing = frequency / batch.len() as u32;
    let last = batch.len() - 1;
    for (index, task) in batch.into_iter().enumerate() {
        let executor = executor.clone();
        let report_tx = report_tx.clone();
        tokio::spawn(async move {
            let report = executor.execute(&task).await;
            if report_tx.send(report).await.is_err() {
                warn!("report channel closed, dropping result");
            }
        });
        if index < last {
            tokio::time::sleep(spacing).await;
        }
    }
}

/// Owns every ticker pool; routes tasks by their step's frequency.
pub struct TickerPoolManager {
    pools: HashMap<Duration, TickerPool>,
    executor: Arc<TaskExecutor>,
    report_tx: mpsc::Sender<TaskReport>,
    started: bool,
}

impl TickerPoolManager {
    pub fn new(report_tx: mpsc::Sender<TaskReport>) -> Self {
        Self {
            pools: HashMap::new(),
            executor: Arc::new(TaskExecutor::new()),
            report_tx,
            started: false,
        }
    }

    /// Build a manager holding every given task; a task whose frequency
    /// cannot back a pool is logged and dropped, its siblings unaffected.
    pub async fn from_tasks(
        tasks: Vec<Task>,
        report_tx: mpsc::Sender<TaskReport>,
    ) -> Self {
        let mut manager = Self::new(report_tx);
        for task in tasks {
            let name = task.step.read().await.name.clone();
            if let Err(e) = manager.add_task(task).await {
                warn!(step = %name, error = %e, "step will never be scheduled");
            }
        }
        manager
    }

    /// Create the pool for a frequency if it does not exist yet. Pools
    /// added while the manager runs start immediately.
    pub fn add_pool(&mut self, frequency: Duration) -> Result<(), ConfigError> {
        if self.pools.contains_key(&frequency) {
            return Ok(());
        }
        let mut pool =
            TickerPool::new(frequency, self.executor.clone(), self.report_tx.clone())?;
        if self.started {
            pool.start();
        }
        debug!(frequency = ?frequency, "ticker pool created");
        self.pools.insert(frequency, pool);
        Ok(())
    }

    /// Route a task to the pool matching its step's frequency, creating
    /// the pool on demand.
    pub async fn add_task(&mut self, task: Task) -> Result<(), ConfigError> {
        let frequency = task.step.read().await.frequency;
        self.add_pool(frequency)?;
        if let Some(pool) = self.pools.get(&frequency) {
            pool.add_task(task).await;
        }
        Ok(())
    }

    pub fn start(&mut self) {
        self.started = true;
        for pool in self.pools.values_mut() {
            pool.start();
        }
        info!(pools = self.pools.len(), "scheduler started");
    }

    pub fn stop_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.stop();
        }
        self.started = false;
        info!(pools = self.pools.len(), "scheduler stopped");
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub async fn task_count(&self) -> usize {
        let mut count = 0;
        for pool in self.pools.values() {
            count += pool.task_count().await;
        }
        count
    }
}
