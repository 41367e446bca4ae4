use super::value::{extract_path, Extracted};
use super::{Assert, AssertMethod, AssertResult, AssertValue};
use crate::duration::format_millis;

/// Evaluate one predicate against a probe's structured result body.
///
/// A missing key fails the assertion; it never errors. Every comparison
/// returns an optional failure message, absence meaning the predicate
/// passed.
pub fn evaluate(assert: &Assert, body: &serde_json::Value) -> AssertResult {
    let Some(actual) = extract_path(body, &assert.key) else {
        return AssertResult::fail(
            &assert.source,
            format!("key {} not found in result", assert.key),
        );
    };

    let failure = match assert.method {
        AssertMethod::Equal | AssertMethod::OrderedEqual => check_equal(assert, &actual, false),
        AssertMethod::NotEqual => check_equal(assert, &actual, true),
        AssertMethod::Contains => check_contains(assert, &actual),
        AssertMethod::LessThan
        | AssertMethod::LessThanOrEqual
        | AssertMethod::GreaterThan
        | AssertMethod::GreaterThanOrEqual => check_ordering(assert, &actual),
    };

    match failure {
        None => AssertResult::pass(&assert.source),
        Some(message) => AssertResult::fail(&assert.source, message),
    }
}

fn failure_message(assert: &Assert, actual: &Extracted) -> String {
    let actual_text = if assert.duration {
        actual.as_number().map(format_millis).unwrap_or_else(|| actual.to_string())
    } else {
        actual.to_string()
    };
    format!(
        "expected {} {} {}, got {}",
        assert.key,
        assert.method.symbol(),
        assert.value,
        actual_text
    )
}

fn check_equal(assert: &Assert, actual: &Extracted, negate: bool) -> Option<String> {
    let equal = values_equal(&assert.value, actual, assert.ordered);
    if equal != negate { None } else { Some(failure_message(assert, actual)) }
}

fn values_equal(expected: &AssertValue, actual: &Extracted, ordered: bool) -> bool {
    match (expected, actual) {
        (AssertValue::List(expected), Extracted::List(actual)) => {
            if ordered {
                expected == actual
            } else {
                // Order-independent set equality: sort both sides.
                let mut lhs = expected.clone();
                let mut rhs = actual.clone();
                lhs.sort();
                rhs.sort();
                lhs == rhs
            }
        }
        (AssertValue::List(_), _) | (_, Extracted::List(_)) => false,
        _ => match (expected.as_number(), actual.as_number()) {
            (Some(lhs), Some(rhs)) => lhs == rhs,
            _ => expected.to_string() == actual.to_string(),
        },
    }
}

fn check_contains(assert: &Assert, actual: &Extracted) -> Option<String> {
    let needle = assert.value.to_string();
    let found = match actual {
        Extracted::List(items) => items.iter().any(|item| item == &needle),
        Extracted::Str(s) => s.contains(&needle),
        Extracted::Number(_) | Extracted::Bool(_) => {
            return Some(format!(
                "cannot apply {} to scalar value at {}",
                assert.method.symbol(),
                assert.key
            ));
        }
    };
    if found { None } else { Some(failure_message(assert, actual)) }
}

fn check_ordering(assert: &Assert, actual: &Extracted) -> Option<String> {
    let Some(rhs) = assert.value.as_number() else {
        return Some(format!(
            "value {} is not comparable with {}",
            assert.value,
            assert.method.symbol()
        ));
    };
    let Some(lhs) = actual.as_number() else {
        return Some(format!("value at {} is not numeric: {}", assert.key, actual));
    };

    let passed = match assert.method {
        AssertMethod::LessThan => lhs < rhs,
        AssertMethod::LessThanOrEqual => lhs <= rhs,
        AssertMethod::GreaterThan => lhs > rhs,
        AssertMethod::GreaterThanOrEqual => lhs >= rhs,
        _ => unreachable!("check_ordering only handles ordering methods"),
    };

    if passed { None } else { Some(failure_message(assert, actual)) }
}
