use std::time::Duration;

use crate::duration::parse_duration;
use crate::error::ConfigError;

/// Typed assertion value, classified exactly once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum AssertValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Duration(Duration),
    List(Vec<String>),
}

impl AssertValue {
    /// Classify a raw value token. Order matters: quoted string, then
    /// duration, boolean, number, array, and finally plain string.
    pub fn classify(raw: &str, quoted: bool) -> Result<Self, ConfigError> {
        if quoted {
            return Ok(AssertValue::Str(raw.to_string()));
        }
        if let Ok(duration) = parse_duration(raw) {
            return Ok(AssertValue::Duration(duration));
        }
        if let Ok(boolean) = raw.parse::<bool>() {
            return Ok(AssertValue::Bool(boolean));
        }
        if let Ok(number) = raw.parse::<f64>() {
            return Ok(AssertValue::Number(number));
        }
        if raw.starts_with('[') {
            return Self::classify_array(raw);
        }
        Ok(AssertValue::Str(raw.to_string()))
    }

    fn classify_array(raw: &str) -> Result<Self, ConfigError> {
        let parsed: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            ConfigError::MalformedAssertion {
                expr: raw.to_string(),
                reason: format!("invalid array value: {e}"),
            }
        })?;

        let items = match parsed {
            serde_json::Value::Array(items) => items,
            _ => {
                return Err(ConfigError::MalformedAssertion {
                    expr: raw.to_string(),
                    reason: "expected an array value".to_string(),
                });
            }
        };

        let mut elements = Vec::with_capacity(items.len());
        for item in items {
            match item {
                serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                    // Reserved in the expression grammar, never supported.
                    return Err(ConfigError::MalformedAssertion {
                        expr: raw.to_string(),
                        reason: "nested arrays are not supported".to_string(),
                    });
                }
                serde_json::Value::String(s) => elements.push(s),
                other => elements.push(other.to_string()),
            }
        }

        Ok(AssertValue::List(elements))
    }

    /// Numeric view of the value, durations expressed in milliseconds.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AssertValue::Number(n) => Some(*n),
            AssertValue::Duration(d) => Some(d.as_secs_f64() * 1_000.0),
            AssertValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for AssertValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssertValue::Str(s) => write!(f, "{s}"),
            AssertValue::Number(n) => write!(f, "{n}"),
            AssertValue::Bool(b) => write!(f, "{b}"),
            AssertValue::Duration(d) => {
                write!(f, "{}", crate::duration::format_millis(d.as_secs_f64() * 1_000.0))
            }
            AssertValue::List(items) => write!(f, "[{}]", items.join(",")),
        }
    }
}

/// Value extracted from a probe result body, re-expressed as the same
/// closed set of shapes the comparisons understand.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    Str(String),
    Number(f64),
    Bool(bool),
    List(Vec<String>),
}

impl Extracted {
    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(Extracted::Str(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(Extracted::Number),
            serde_json::Value::Bool(b) => Some(Extracted::Bool(*b)),
            serde_json::Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        serde_json::Value::String(s) => list.push(s.clone()),
                        serde_json::Value::Array(_) | serde_json::Value::Object(_) => return None,
                        other => list.push(other.to_string()),
                    }
                }
                Some(Extracted::List(list))
            }
            _ => None,
        }
    }

    /// Numeric view; duration-formatted strings count as milliseconds.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Extracted::Number(n) => Some(*n),
            Extracted::Str(s) => match parse_duration(s) {
                Ok(d) => Some(d.as_secs_f64() * 1_000.0),
                Err(_) => s.parse().ok(),
            },
            _ => None,
        }
    }
}

impl std::fmt::Display for Extracted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Extracted::Str(s) => write!(f, "{s}"),
            Extracted::Number(n) => write!(f, "{n}"),
            Extracted::Bool(b) => write!(f, "{b}"),
            Extracted::List(items) => write!(f, "[{}]", items.join(",")),
        }
    }
}

/// Walk a dotted path through the result body. Array elements are
/// addressed by numeric segment (`"addresses.0"`).
pub fn extract_path(root: &serde_json::Value, path: &str) -> Option<Extracted> {
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Extracted::from_json(current)
}
