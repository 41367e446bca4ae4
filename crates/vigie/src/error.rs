use std::time::Duration;

use thiserror::Error;

/// Errors raised while importing or parsing test definitions.
///
/// Every variant is an import-time problem: it rejects the offending
/// TestStep and nothing else. Runtime conditions (unreachable targets,
/// timeouts, failed assertions) are statuses, not errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid frequency {0:?}: must be greater than 1ms")]
    InvalidFrequency(Duration),

    #[error("invalid duration {0:?}: expected <number><ms|s|m|h>")]
    InvalidDuration(String),

    #[error("malformed assertion {expr:?}: {reason}")]
    MalformedAssertion { expr: String, reason: String },

    #[error("unknown assertion method {0:?}")]
    UnknownMethod(String),

    #[error("unknown probe type {0:?}")]
    UnknownProbe(String),

    #[error("invalid configuration for probe {probe:?}: {reason}")]
    ProbeConfig { probe: String, reason: String },
}
