//! Probe contract and built-in probes.
//!
//! A probe is a pluggable protocol client performing one check and
//! returning one or more outcomes (e.g. one per resolved address). Probe
//! kinds are looked up through an explicit [`ProbeRegistry`] so separate
//! engine instances never share state.

pub mod http;
pub mod icmp;
pub mod tcp;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Raw status reported by a probe for one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeCode {
    Success,
    Failure,
    Timeout,
    Error,
}

/// One outcome of a probe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub code: ProbeCode,

    /// A handled protocol-level error (e.g. an HTTP 5xx): the target
    /// answered, so assertions still run against the fields.
    pub recognized: bool,

    /// Error text for failed or errored outcomes.
    pub error: Option<String>,

    pub response_time: Duration,

    /// Sub-identifier when one check fans out, e.g. a resolved address.
    pub subtest: String,

    /// Structured, path-queryable result body assertions evaluate against.
    pub fields: serde_json::Value,
}

impl ProbeOutcome {
    pub fn success(subtest: impl Into<String>, response_time: Duration) -> Self {
        Self {
            code: ProbeCode::Success,
            recognized: false,
            error: None,
            response_time,
            subtest: subtest.into(),
            fields: serde_json::Value::Null,
        }
    }

    pub fn failure(subtest: impl Into<String>, error: String) -> Self {
        Self {
            code: ProbeCode::Failure,
            recognized: false,
            error: Some(error),
            response_time: Duration::ZERO,
            subtest: subtest.into(),
            fields: serde_json::Value::Null,
        }
    }

    pub fn timeout(subtest: impl Into<String>, after: Duration) -> Self {
        Self {
            code: ProbeCode::Timeout,
            recognized: false,
            error: Some(format!("probe timed out after {after:?}")),
            response_time: after,
            subtest: subtest.into(),
            fields: serde_json::Value::Null,
        }
    }

    pub fn error(subtest: impl Into<String>, error: String) -> Self {
        Self {
            code: ProbeCode::Error,
            recognized: false,
            error: Some(error),
            response_time: Duration::ZERO,
            subtest: subtest.into(),
            fields: serde_json::Value::Null,
        }
    }

    pub fn with_fields(mut self, fields: serde_json::Value) -> Self {
        self.fields = fields;
        self
    }

    /// Mark the outcome as a handled error, keeping it assertable.
    pub fn handled(mut self) -> Self {
        self.recognized = true;
        self
    }
}

/// Contract every probe exposes to the task executor.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &'static str;

    fn default_frequency(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn default_timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    /// Run the check, honoring `timeout` internally. Implementations
    /// report timeouts as outcomes, never as hangs.
    async fn run(&self, timeout: Duration) -> Vec<ProbeOutcome>;
}

/// Constructor building a probe instance from its raw definition.
pub type ProbeConstructor =
    fn(&serde_json::Value) -> Result<Arc<dyn Probe>, ConfigError>;

/// Explicit probe-kind table, owned by whoever imports definitions.
#[derive(Default)]
pub struct ProbeRegistry {
    constructors: HashMap<String, ProbeConstructor>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding all built-in probe kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("http", http::HttpProbe::from_config);
        registry.register("tcp", tcp::TcpProbe::from_config);
        registry.register("icmp", icmp::IcmpProbe::from_config);
        registry
    }

    pub fn register(&mut self, kind: &str, constructor: ProbeConstructor) {
        self.constructors.insert(kind.to_string(), constructor);
    }

    /// Build a probe of the given kind from its raw configuration.
    pub fn build(
        &self,
        kind: &str,
        config: &serde_json::Value,
    ) -> Result<Arc<dyn Probe>, ConfigError> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| ConfigError::UnknownProbe(kind.to_string()))?;
        constructor(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_probe_kind() {
        let registry = ProbeRegistry::with_builtins();
        let err = registry.build("dns-over-carrier-pigeon", &json!({})).err().unwrap();
        assert!(matches!(err, ConfigError::UnknownProbe(_)));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ProbeRegistry::with_builtins();
        let probe = registry
            .build("http", &json!({"url": "https://example.com"}))
            .unwrap();
        assert_eq!(probe.name(), "http");

        let probe = registry
            .build("tcp", &json!({"host": "example.com", "port": 443}))
            .unwrap();
        assert_eq!(probe.name(), "tcp");
    }

    #[test]
    fn test_registries_are_independent() {
        let empty = ProbeRegistry::new();
        assert!(empty.build("http", &json!({"url": "https://example.com"})).is_err());
    }
}
