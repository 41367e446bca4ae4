//! Builds the TestSuite tree from deserialized definitions.
//!
//! A malformed step (unknown probe kind, bad frequency, unparsable
//! assertion) is logged and skipped; it never rejects the rest of the
//! import. Reimports match steps by identity hash and carry the runtime
//! state of unchanged steps over, so a no-op reload resets nothing.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::assertion::{parse, Assert};
use crate::duration::parse_duration;
use crate::error::ConfigError;
use crate::probe::ProbeRegistry;
use crate::status::Status;
use crate::teststruct::{identity_hash, Task, TestCase, TestStep, TestSuite};

const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Deserialize)]
pub struct SuiteDefinition {
    pub name: String,
    #[serde(default)]
    pub testcases: Vec<CaseDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaseDefinition {
    pub name: String,
    #[serde(default)]
    pub teststeps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    pub probe: ProbeDefinition,
    #[serde(default)]
    pub assertions: Vec<String>,
    /// Duration string (`"30s"`); probe default when absent.
    pub frequency: Option<String>,
    pub timeout: Option<String>,
    #[serde(default)]
    pub retry: u32,
    pub retrydelay: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeDefinition {
    #[serde(rename = "type")]
    pub kind: String,
    /// Remaining keys, handed raw to the probe constructor.
    #[serde(flatten)]
    pub config: serde_json::Value,
}

/// Suite map handed to the scheduler; keyed by suite name.
pub type SuiteMap = HashMap<String, Arc<RwLock<TestSuite>>>;

pub struct Importer {
    registry: ProbeRegistry,
}

impl Importer {
    pub fn new(registry: ProbeRegistry) -> Self {
        Self { registry }
    }

    /// Build the suite tree from definitions, skipping invalid steps.
    pub fn import(&self, definitions: Vec<SuiteDefinition>) -> SuiteMap {
        let mut suites = HashMap::new();
        for definition in definitions {
            let name = definition.name.clone();
            suites.insert(name, self.build_suite(definition));
        }
        suites
    }

    /// Rebuild the tree from definitions, adopting runtime state from
    /// any previous step whose identity hash is unchanged.
    pub async fn reimport(
        &self,
        definitions: Vec<SuiteDefinition>,
        previous: &SuiteMap,
    ) -> SuiteMap {
        let mut by_hash: HashMap<String, Arc<RwLock<TestStep>>> = HashMap::new();
        for suite in previous.values() {
            let cases = suite.read().await.cases.clone();
            for case in cases {
                let steps = case.read().await.steps.clone();
                for step in steps {
                    let hash = step.read().await.hash.clone();
                    by_hash.insert(hash, step);
                }
            }
        }

        let suites = self.import(definitions);
        for suite in suites.values() {
            let cases = suite.read().await.cases.clone();
            for case in cases {
                let steps = case.read().await.steps.clone();
                for step in steps {
                    let hash = step.read().await.hash.clone();
                    if let Some(old) = by_hash.get(&hash) {
                        let old = old.read().await;
                        step.write().await.adopt(&old);
                    }
                }
            }
        }
        suites
    }

    fn build_suite(&self, definition: SuiteDefinition) -> Arc<RwLock<TestSuite>> {
        let mut cases = Vec::with_capacity(definition.testcases.len());
        for case_definition in definition.testcases {
            let mut steps = Vec::with_capacity(case_definition.teststeps.len());
            for step_definition in case_definition.teststeps {
                let step_name = step_definition.name.clone();
                match self.build_step(step_definition) {
                    Ok(step) => steps.push(Arc::new(RwLock::new(step))),
                    Err(e) => warn!(
                        suite = %definition.name,
                        case = %case_definition.name,
                        step = %step_name,
                        error = %e,
                        "step rejected"
                    ),
                }
            }
            cases.push(Arc::new(RwLock::new(TestCase {
                name: case_definition.name,
                status: Status::NotDefined,
                last_change: Utc::now(),
                steps,
            })));
        }

        Arc::new(RwLock::new(TestSuite {
            name: definition.name,
            status: Status::NotDefined,
            last_change: Utc::now(),
            cases,
        }))
    }

    fn build_step(&self, definition: StepDefinition) -> Result<TestStep, ConfigError> {
        let probe = self.registry.build(&definition.probe.kind, &definition.probe.config)?;

        let frequency = match &definition.frequency {
            Some(raw) => parse_duration(raw)?,
            None => probe.default_frequency(),
        };
        if frequency <= Duration::from_millis(1) {
            return Err(ConfigError::InvalidFrequency(frequency));
        }
        let timeout = match &definition.timeout {
            Some(raw) => parse_duration(raw)?,
            None => probe.default_timeout(),
        };
        let retry_delay = match &definition.retrydelay {
            Some(raw) => parse_duration(raw)?,
            None => DEFAULT_RETRY_DELAY,
        };

        let mut assertions: Vec<Assert> = Vec::new();
        for source in &definition.assertions {
            assertions.extend(parse(source)?);
        }

        let hash = identity_hash(
            &definition.name,
            &definition.probe.kind,
            &definition.probe.config,
            frequency,
            timeout,
            &definition.assertions,
        );

        Ok(TestStep {
            name: definition.name,
            hash,
            probe_kind: definition.probe.kind,
            probe,
            frequency,
            timeout,
            retry: definition.retry,
            retry_delay,
            assertions,
            status: Status::NotDefined,
            last_change: Utc::now(),
            last_attempt: None,
            results: VecDeque::new(),
        })
    }
}

/// Flatten the suite tree into the task list fed to the scheduler.
pub async fn tasks_for(suites: &SuiteMap) -> Vec<Task> {
    let mut tasks = Vec::new();
    for suite in suites.values() {
        let cases = suite.read().await.cases.clone();
        for case in cases {
            let steps = case.read().await.steps.clone();
            for step in steps {
                tasks.push(Task::new(suite.clone(), case.clone(), step));
            }
        }
    }
    tasks
}
