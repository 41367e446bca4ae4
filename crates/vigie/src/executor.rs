//! Task executor: runs exactly one Task to completion.
//!
//! Worst-case latency is bounded by a fail-safe deadline equal to the
//! step's frequency: the probe attempt races a frequency-length timer
//! and the loser is abandoned, never cancelled. A probe that ignores its
//! own timeout still yields a `Timeout` result one scheduling period
//! after dispatch, so the step is retried next tick instead of hanging.
//! The deadline is frequency-based even when the configured timeout is
//! longer; frequency acts as the hard staleness bound.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::assertion::{evaluate, Assert, AssertResult};
use crate::probe::{Probe, ProbeCode, ProbeOutcome};
use crate::report::{OutcomeResult, TaskReport, VigieResult};
use crate::status::Status;
use crate::teststruct::Task;

#[derive(Default)]
pub struct TaskExecutor;

impl TaskExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run one task: probe invocation (with retries) under the fail-safe
    /// deadline, assertion scoring of every outcome, then status
    /// propagation up the suite tree.
    pub async fn execute(&self, task: &Task) -> TaskReport {
        let (probe, timeout, frequency, retry, retry_delay, assertions) = {
            let step = task.step.read().await;
            (
                step.probe.clone(),
                step.timeout,
                step.frequency,
                step.retry,
                step.retry_delay,
                step.assertions.clone(),
            )
        };

        // Spawned so a panicking probe is trapped as a JoinError instead
        // of tearing down the pool's tick loop.
        let attempt =
            tokio::spawn(run_attempts(probe, timeout, retry, retry_delay, assertions));

        let result = tokio::select! {
            joined = attempt => match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, "probe execution faulted");
                    VigieResult::errored(format!("probe execution faulted: {e}"))
                }
            },
            () = tokio::time::sleep(frequency) => {
                debug!(frequency = ?frequency, "fail-safe deadline elapsed, abandoning probe");
                VigieResult::timed_out(frequency)
            }
        };

        self.apply(task, result).await
    }

    /// Record the result on the step and roll statuses up, taking write
    /// locks in Suite -> Case -> Step order.
    async fn apply(&self, task: &Task, result: VigieResult) -> TaskReport {
        let (mut suite, mut case, mut step) = task.write_all().await;

        step.record(result.clone());
        let step_name = step.name.clone();
        let step_hash = step.hash.clone();
        let step_status = step.status;
        drop(step);

        // We still hold the case write lock, so sibling steps can only be
        // read here, never be mid-update.
        let mut step_statuses = Vec::with_capacity(case.steps.len());
        for sibling in &case.steps {
            if Arc::ptr_eq(sibling, &task.step) {
                step_statuses.push(step_status);
            } else {
                step_statuses.push(sibling.read().await.status);
            }
        }
        case.set_status(Status::rollup(step_statuses));
        let case_name = case.name.clone();
        let case_status = case.status;

        let mut case_statuses = Vec::with_capacity(suite.cases.len());
        for sibling in &suite.cases {
            if Arc::ptr_eq(sibling, &task.case) {
                case_statuses.push(case_status);
            } else {
                case_statuses.push(sibling.read().await.status);
            }
        }
        suite.set_status(Status::rollup(case_statuses));
        let suite_name = suite.name.clone();

        TaskReport { suite: suite_name, case: case_name, step: step_name, step_hash, result }
    }
}

/// Probe attempt loop: up to `1 + retry` runs, pausing `retry_delay`
/// between non-successful attempts.
async fn run_attempts(
    probe: Arc<dyn Probe>,
    timeout: Duration,
    retry: u32,
    retry_delay: Duration,
    assertions: Vec<Assert>,
) -> VigieResult {
    let mut remaining = retry;
    loop {
        let outcomes = probe.run(timeout).await;
        let result = judge(outcomes, &assertions);
        if result.status == Status::Success || remaining == 0 {
            return result;
        }
        remaining -= 1;
        tokio::time::sleep(retry_delay).await;
    }
}

/// Score every outcome against the assertion list and fold the results.
///
/// Terminal outcomes (`Failure`, `Timeout`, unrecognized `Error`) skip
/// assertions: there is no result body worth asserting on. A recognized
/// error still asserts, because "the target returned code X" can itself
/// be the desired condition.
fn judge(outcomes: Vec<ProbeOutcome>, assertions: &[Assert]) -> VigieResult {
    if outcomes.is_empty() {
        return VigieResult::errored("probe returned no outcomes".to_string());
    }

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        let (status, assert_results) = match outcome.code {
            ProbeCode::Failure => (Status::Failure, Vec::new()),
            ProbeCode::Timeout => (Status::Timeout, Vec::new()),
            ProbeCode::Error if !outcome.recognized => (Status::Error, Vec::new()),
            _ => {
                let assert_results: Vec<AssertResult> =
                    assertions.iter().map(|a| evaluate(a, &outcome.fields)).collect();
                let status = if assert_results.iter().all(|r| r.success) {
                    Status::Success
                } else {
                    Status::AssertFailure
                };
                (status, assert_results)
            }
        };

        results.push(OutcomeResult {
            subtest: outcome.subtest,
            status,
            response_time: outcome.response_time,
            error: outcome.error,
            assert_results,
        });
    }

    VigieResult::from_outcomes(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::parse;
    use crate::teststruct::{identity_hash, TestCase, TestStep, TestSuite};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::RwLock;

    /// Probe replaying a scripted sequence of outcome batches; the last
    /// batch repeats once the script runs out.
    struct ScriptedProbe {
        script: Mutex<VecDeque<Vec<ProbeOutcome>>>,
        last: Vec<ProbeOutcome>,
    }

    impl ScriptedProbe {
        fn new(batches: Vec<Vec<ProbeOutcome>>) -> Arc<Self> {
            let last = batches.last().cloned().unwrap_or_default();
            Arc::new(Self { script: Mutex::new(batches.into()), last })
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn run(&self, _timeout: Duration) -> Vec<ProbeOutcome> {
            self.script.lock().unwrap().pop_front().unwrap_or_else(|| self.last.clone())
        }
    }

    /// Probe that never completes, not even for its own timeout.
    struct StuckProbe;

    #[async_trait]
    impl Probe for StuckProbe {
        fn name(&self) -> &'static str {
            "stuck"
        }

        async fn run(&self, _timeout: Duration) -> Vec<ProbeOutcome> {
            futures::future::pending().await
        }
    }

    struct PanickingProbe;

    #[async_trait]
    impl Probe for PanickingProbe {
        fn name(&self) -> &'static str {
            "panicking"
        }

        async fn run(&self, _timeout: Duration) -> Vec<ProbeOutcome> {
            panic!("probe blew up");
        }
    }

    fn make_task(probe: Arc<dyn Probe>, assertions: &[&str], frequency: Duration) -> Task {
        let assertions: Vec<Assert> =
            assertions.iter().flat_map(|a| parse(a).unwrap()).collect();
        let sources: Vec<String> = assertions.iter().map(|a| a.source.clone()).collect();
        let hash = identity_hash(
            "step",
            probe.name(),
            &json!({}),
            frequency,
            Duration::from_secs(5),
            &sources,
        );

        let step = Arc::new(RwLock::new(TestStep {
            name: "step".to_string(),
            hash,
            probe,
            probe_kind: "scripted".to_string(),
            frequency,
            timeout: Duration::from_secs(5),
            retry: 0,
            retry_delay: Duration::from_millis(10),
            assertions,
            status: Status::NotDefined,
            last_change: Utc::now(),
            last_attempt: None,
            results: VecDeque::new(),
        }));
        let case = Arc::new(RwLock::new(TestCase {
            name: "case".to_string(),
            status: Status::NotDefined,
            last_change: Utc::now(),
            steps: vec![step.clone()],
        }));
        let suite = Arc::new(RwLock::new(TestSuite {
            name: "suite".to_string(),
            status: Status::NotDefined,
            last_change: Utc::now(),
            cases: vec![case.clone()],
        }));
        Task::new(suite, case, step)
    }

    fn success_outcome(subtest: &str, fields: serde_json::Value) -> ProbeOutcome {
        ProbeOutcome::success(subtest, Duration::from_millis(10)).with_fields(fields)
    }

    #[tokio::test]
    async fn test_all_outcomes_judged_and_worst_wins() {
        let probe = ScriptedProbe::new(vec![vec![
            success_outcome("10.0.0.1", json!({"reachable": true})),
            ProbeOutcome::failure("10.0.0.2", "connection refused".to_string()),
            success_outcome("10.0.0.3", json!({"reachable": true})),
        ]]);
        let task = make_task(probe, &["reachable == true"], Duration::from_secs(30));

        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.outcomes.len(), 3);
        assert_eq!(report.result.status, Status::Failure);
        assert_eq!(report.result.outcomes[0].status, Status::Success);
        assert_eq!(report.result.outcomes[1].status, Status::Failure);
    }

    #[tokio::test]
    async fn test_terminal_outcomes_skip_assertions() {
        let probe = ScriptedProbe::new(vec![vec![
            ProbeOutcome::failure("a", "down".to_string()),
            ProbeOutcome::timeout("b", Duration::from_secs(1)),
            ProbeOutcome::error("c", "broken".to_string()),
        ]]);
        let task = make_task(probe, &["reachable == true"], Duration::from_secs(30));

        let report = TaskExecutor::new().execute(&task).await;
        assert!(report.result.outcomes.iter().all(|o| o.assert_results.is_empty()));
        // Error short-circuits the fold.
        assert_eq!(report.result.status, Status::Error);
    }

    #[tokio::test]
    async fn test_recognized_error_still_asserts() {
        let outcome = ProbeOutcome::error("https://api", "http status 503".to_string())
            .handled()
            .with_fields(json!({"code": 503}));
        let probe = ScriptedProbe::new(vec![vec![outcome]]);
        let task = make_task(probe, &["code == 503"], Duration::from_secs(30));

        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.status, Status::Success);
        assert_eq!(report.result.outcomes[0].assert_results.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_assertion_yields_assert_failure() {
        let probe =
            ScriptedProbe::new(vec![vec![success_outcome("t", json!({"code": 404}))]]);
        let task = make_task(probe, &["code == 200"], Duration::from_secs(30));

        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.status, Status::AssertFailure);
        let message = &report.result.outcomes[0].assert_results[0].message;
        assert!(message.contains("200") && message.contains("404"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_probe_times_out_at_frequency() {
        let frequency = Duration::from_secs(10);
        let task = make_task(Arc::new(StuckProbe), &[], frequency);

        let started = tokio::time::Instant::now();
        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.status, Status::Timeout);
        assert_eq!(started.elapsed(), frequency);
    }

    #[tokio::test]
    async fn test_panicking_probe_becomes_error() {
        let task = make_task(Arc::new(PanickingProbe), &[], Duration::from_secs(30));
        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.status, Status::Error);
        assert_eq!(task.step.read().await.status, Status::Error);
    }

    #[tokio::test]
    async fn test_retry_recovers_within_one_execution() {
        let probe = ScriptedProbe::new(vec![
            vec![ProbeOutcome::failure("t", "transient".to_string())],
            vec![success_outcome("t", json!({"reachable": true}))],
        ]);
        let task = make_task(probe, &["reachable == true"], Duration::from_secs(30));
        task.step.write().await.retry = 1;

        let report = TaskExecutor::new().execute(&task).await;
        assert_eq!(report.result.status, Status::Success);
    }

    #[tokio::test]
    async fn test_status_propagates_and_recovers() {
        let probe = ScriptedProbe::new(vec![
            vec![success_outcome("t", json!({"code": 500}))],
            vec![success_outcome("t", json!({"code": 200}))],
        ]);
        let task = make_task(probe, &["code == 200"], Duration::from_secs(30));
        let executor = TaskExecutor::new();

        executor.execute(&task).await;
        assert_eq!(task.step.read().await.status, Status::AssertFailure);
        assert_eq!(task.case.read().await.status, Status::Failure);
        assert_eq!(task.suite.read().await.status, Status::Failure);

        executor.execute(&task).await;
        assert_eq!(task.step.read().await.status, Status::Success);
        assert_eq!(task.case.read().await.status, Status::Success);
        assert_eq!(task.suite.read().await.status, Status::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_executions_are_not_prevented() {
        // Two dispatches of the same step may overlap when a previous
        // fail-safe deadline has not elapsed; both must complete.
        let frequency = Duration::from_secs(5);
        let task = make_task(Arc::new(StuckProbe), &[], frequency);
        let executor = Arc::new(TaskExecutor::new());

        let first = tokio::spawn({
            let executor = executor.clone();
            let task = task.clone();
            async move { executor.execute(&task).await }
        });
        let second = tokio::spawn({
            let executor = executor.clone();
            let task = task.clone();
            async move { executor.execute(&task).await }
        });

        let first = first.await.unwrap();
        let second = second.await.unwrap();
        assert_eq!(first.result.status, Status::Timeout);
        assert_eq!(second.result.status, Status::Timeout);
        assert_eq!(task.step.read().await.results.len(), 2);
    }
}
