//! Assertion engine.
//!
//! Turns raw assertion expressions (`"result.code == 200"`) into typed
//! predicates and evaluates them against a probe's structured result:
//! - `parse` tokenizes the expression and classifies the value once into
//!   a closed tagged union, expanding `Contains` over arrays
//! - `evaluate` extracts the value at the predicate's path and runs the
//!   method's comparison, producing pass/fail plus a failure message

mod eval;
mod parse;
mod value;

pub use eval::evaluate;
pub use parse::{AssertMethod, parse};
pub use value::AssertValue;

use serde::{Deserialize, Serialize};

/// One typed predicate against a probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct Assert {
    /// Dotted path into the result body (`"result.code"`).
    pub key: String,
    pub method: AssertMethod,
    pub value: AssertValue,
    /// Element order matters for equality over lists.
    pub ordered: bool,
    /// Value is duration-typed; failure messages render as durations.
    pub duration: bool,
    /// Original expression text, kept for reporting.
    pub source: String,
}

/// Outcome of evaluating one predicate. An empty message means success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertResult {
    /// The condition that was evaluated, as written by the user.
    pub assertion: String,
    pub success: bool,
    pub message: String,
}

impl AssertResult {
    pub fn pass(assertion: &str) -> Self {
        Self { assertion: assertion.to_string(), success: true, message: String::new() }
    }

    pub fn fail(assertion: &str, message: String) -> Self {
        Self { assertion: assertion.to_string(), success: false, message }
    }
}
