//! TestSuite → TestCase → TestStep tree.
//!
//! Each level carries its own `tokio::sync::RwLock`; locks are always
//! acquired in Suite → Case → Step order. Readers take short read locks
//! and work on released snapshots.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::assertion::Assert;
use crate::probe::Probe;
use crate::report::VigieResult;
use crate::status::Status;

/// Recent results kept per step.
pub const RESULT_HISTORY: usize = 50;

/// The smallest schedulable unit: one probe binding plus its assertions.
pub struct TestStep {
    pub name: String,
    /// Content hash of the definition; reimport equality check.
    pub hash: String,
    pub probe: Arc<dyn Probe>,
    pub probe_kind: String,
    pub frequency: Duration,
    pub timeout: Duration,
    pub retry: u32,
    pub retry_delay: Duration,
    pub assertions: Vec<Assert>,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub results: VecDeque<VigieResult>,
}

impl TestStep {
    /// Record one execution, bumping `last_change` only when the status
    /// actually moved.
    pub fn record(&mut self, result: VigieResult) {
        self.last_attempt = Some(result.timestamp);
        if result.status != self.status {
            self.status = result.status;
            self.last_change = result.timestamp;
        }
        if self.results.len() == RESULT_HISTORY {
            self.results.pop_front();
        }
        self.results.push_back(result);
    }

    /// Carry runtime state over from a previous incarnation with the
    /// same identity hash (reimport of an unchanged definition).
    pub fn adopt(&mut self, previous: &TestStep) {
        debug_assert_eq!(self.hash, previous.hash);
        self.status = previous.status;
        self.last_change = previous.last_change;
        self.last_attempt = previous.last_attempt;
        self.results = previous.results.clone();
    }
}

/// Named group of TestSteps. Status is the binary roll-up of its steps.
pub struct TestCase {
    pub name: String,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub steps: Vec<Arc<RwLock<TestStep>>>,
}

impl TestCase {
    pub fn set_status(&mut self, status: Status) {
        if status != self.status {
            self.status = status;
            self.last_change = Utc::now();
        }
    }
}

/// Named group of TestCases. Same status rules as TestCase.
pub struct TestSuite {
    pub name: String,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub cases: Vec<Arc<RwLock<TestCase>>>,
}

impl TestSuite {
    pub fn set_status(&mut self, status: Status) {
        if status != self.status {
            self.status = status;
            self.last_change = Utc::now();
        }
    }
}

/// Non-owning triple into the tree; the unit handed to the scheduler.
#[derive(Clone)]
pub struct Task {
    pub suite: Arc<RwLock<TestSuite>>,
    pub case: Arc<RwLock<TestCase>>,
    pub step: Arc<RwLock<TestStep>>,
}

impl Task {
    pub fn new(
        suite: Arc<RwLock<TestSuite>>,
        case: Arc<RwLock<TestCase>>,
        step: Arc<RwLock<TestStep>>,
    ) -> Self {
        Self { suite, case, step }
    }

    /// Acquire all three write guards in Suite → Case → Step order, for
    /// callers needing a consistent cross-level update.
    pub async fn write_all(
        &self,
    ) -> (
        RwLockWriteGuard<'_, TestSuite>,
        RwLockWriteGuard<'_, TestCase>,
        RwLockWriteGuard<'_, TestStep>,
    ) {
        let suite = self.suite.write().await;
        let case = self.case.write().await;
        let step = self.step.write().await;
        (suite, case, step)
    }
}

/// Identity hash of a step definition: probe binding plus assertions
/// plus name. Two imports are the same step iff the hashes match.
pub fn identity_hash(
    name: &str,
    probe_kind: &str,
    probe_config: &serde_json::Value,
    frequency: Duration,
    timeout: Duration,
    assertion_sources: &[String],
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update([0]);
    hasher.update(probe_kind.as_bytes());
    hasher.update([0]);
    hasher.update(probe_config.to_string().as_bytes());
    hasher.update(frequency.as_nanos().to_le_bytes());
    hasher.update(timeout.as_nanos().to_le_bytes());
    for source in assertion_sources {
        hasher.update([0]);
        hasher.update(source.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Point-in-time view of a step, safe to hold without any lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub name: String,
    pub hash: String,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSnapshot {
    pub name: String,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub steps: Vec<StepSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteSnapshot {
    pub name: String,
    pub status: Status,
    pub last_change: DateTime<Utc>,
    pub cases: Vec<CaseSnapshot>,
}

/// Snapshot a whole suite, taking each read lock briefly and never
/// across levels (snapshot-then-release).
pub async fn snapshot_suite(suite: &Arc<RwLock<TestSuite>>) -> SuiteSnapshot {
    let (name, status, last_change, cases) = {
        let guard = suite.read().await;
        (guard.name.clone(), guard.status, guard.last_change, guard.cases.clone())
    };

    let mut case_snapshots = Vec::with_capacity(cases.len());
    for case in cases {
        let (name, status, last_change, steps) = {
            let guard = case.read().await;
            (guard.name.clone(), guard.status, guard.last_change, guard.steps.clone())
        };

        let mut step_snapshots = Vec::with_capacity(steps.len());
        for step in steps {
            let guard = step.read().await;
            let failures = guard
                .results
                .back()
                .map(VigieResult::failures)
                .unwrap_or_default();
            step_snapshots.push(StepSnapshot {
                name: guard.name.clone(),
                hash: guard.hash.clone(),
                status: guard.status,
                last_change: guard.last_change,
                last_attempt: guard.last_attempt,
                failures,
            });
        }

        case_snapshots.push(CaseSnapshot { name, status, last_change, steps: step_snapshots });
    }

    SuiteSnapshot { name, status, last_change, cases: case_snapshots }
}
