use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assertion::AssertResult;
use crate::status::Status;

/// Result of judging one probe outcome against the step's assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeResult {
    /// Sub-identifier of the outcome (resolved address, URL, ...).
    pub subtest: String,
    pub status: Status,
    pub response_time: Duration,
    pub error: Option<String>,
    pub assert_results: Vec<AssertResult>,
}

impl OutcomeResult {
    /// Failure detail strings for alerting: probe errors plus failed
    /// assertion messages.
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if let Some(error) = &self.error {
            failures.push(format!("{}: {}", self.subtest, error));
        }
        for assert_result in &self.assert_results {
            if !assert_result.success {
                failures.push(format!("{}: {}", self.subtest, assert_result.message));
            }
        }
        failures
    }
}

/// Record of one TestStep execution: every per-outcome result plus the
/// folded status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VigieResult {
    pub status: Status,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub outcomes: Vec<OutcomeResult>,
}

impl VigieResult {
    /// Fold per-outcome results into one record; the ranked worst
    /// outcome status wins.
    pub fn from_outcomes(outcomes: Vec<OutcomeResult>) -> Self {
        let status = Status::worst(outcomes.iter().map(|o| o.status));
        let description = match status {
            Status::Success => format!("{} outcome(s) passed", outcomes.len()),
            _ => outcomes
                .iter()
                .flat_map(OutcomeResult::failures)
                .collect::<Vec<_>>()
                .join("; "),
        };
        Self { status, description, timestamp: Utc::now(), outcomes }
    }

    /// Synthetic record for a run the fail-safe deadline cut short.
    pub fn timed_out(frequency: Duration) -> Self {
        Self {
            status: Status::Timeout,
            description: format!("probe exceeded the fail-safe deadline of {frequency:?}"),
            timestamp: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    /// Synthetic record for a run that faulted inside the probe.
    pub fn errored(detail: String) -> Self {
        Self {
            status: Status::Error,
            description: detail,
            timestamp: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    pub fn failures(&self) -> Vec<String> {
        if self.outcomes.is_empty() && self.status != Status::Success {
            return vec![self.description.clone()];
        }
        self.outcomes.iter().flat_map(OutcomeResult::failures).collect()
    }
}

/// Everything collaborators need about one completed task: identity for
/// diffing failing sets and tagging time-series writes, plus the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub suite: String,
    pub case: String,
    pub step: String,
    pub step_hash: String,
    pub result: VigieResult,
}
