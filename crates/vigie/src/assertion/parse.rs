use serde::{Deserialize, Serialize};

use super::value::AssertValue;
use super::Assert;
use crate::error::ConfigError;

/// Comparison method of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssertMethod {
    Equal,
    NotEqual,
    OrderedEqual,
    Contains,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl AssertMethod {
    /// Resolve a verb token: symbol, short name or long name.
    fn resolve(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "==" | "eq" | "equal" => Some(AssertMethod::Equal),
            "!=" | "ne" | "notequal" => Some(AssertMethod::NotEqual),
            "#==" | "oeq" | "orderedequal" => Some(AssertMethod::OrderedEqual),
            "$$" | "in" | "contains" => Some(AssertMethod::Contains),
            "<" | "lt" | "lessthan" => Some(AssertMethod::LessThan),
            "<=" | "le" | "lessthanorequal" => Some(AssertMethod::LessThanOrEqual),
            ">" | "gt" | "greaterthan" => Some(AssertMethod::GreaterThan),
            ">=" | "ge" | "greaterthanorequal" => Some(AssertMethod::GreaterThanOrEqual),
            _ => None,
        }
    }

    /// Symbol used in failure messages.
    pub fn symbol(self) -> &'static str {
        match self {
            AssertMethod::Equal => "==",
            AssertMethod::NotEqual => "!=",
            AssertMethod::OrderedEqual => "#==",
            AssertMethod::Contains => "$$",
            AssertMethod::LessThan => "<",
            AssertMethod::LessThanOrEqual => "<=",
            AssertMethod::GreaterThan => ">",
            AssertMethod::GreaterThanOrEqual => ">=",
        }
    }
}

/// One token of an assertion expression.
struct Token {
    text: String,
    quoted: bool,
}

/// Split on whitespace, grouping double-quoted runs into one token.
fn tokenize(expr: &str) -> Result<Vec<Token>, ConfigError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;

    for c in expr.chars() {
        match c {
            '"' => {
                if in_quotes {
                    in_quotes = false;
                } else {
                    in_quotes = true;
                    quoted = true;
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() || quoted {
                    tokens.push(Token { text: std::mem::take(&mut current), quoted });
                    quoted = false;
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err(ConfigError::MalformedAssertion {
            expr: expr.to_string(),
            reason: "unterminated quote".to_string(),
        });
    }
    if !current.is_empty() || quoted {
        tokens.push(Token { text: current, quoted });
    }

    Ok(tokens)
}

/// Parse one assertion expression into typed predicates.
///
/// The grammar is `<path> <verb> <value>`. `Contains` over an array value
/// expands into one predicate per element, all of which must pass.
pub fn parse(expr: &str) -> Result<Vec<Assert>, ConfigError> {
    let tokens = tokenize(expr)?;
    if tokens.len() != 3 {
        return Err(ConfigError::MalformedAssertion {
            expr: expr.to_string(),
            reason: format!("expected 3 tokens (path verb value), found {}", tokens.len()),
        });
    }

    let key = tokens[0].text.clone();
    let method = AssertMethod::resolve(&tokens[1].text)
        .ok_or_else(|| ConfigError::UnknownMethod(tokens[1].text.clone()))?;
    let value = AssertValue::classify(&tokens[2].text, tokens[2].quoted)?;

    match (method, value) {
        (AssertMethod::Contains, AssertValue::List(items)) => items
            .iter()
            .map(|item| {
                // Elements were never quoted, re-classify each scalar.
                let element = AssertValue::classify(item, false)?;
                Ok(build(&key, AssertMethod::Contains, element, expr))
            })
            .collect::<Result<Vec<_>, ConfigError>>(),
        (method, value) => Ok(vec![build(&key, method, value, expr)]),
    }
}

fn build(key: &str, method: AssertMethod, value: AssertValue, source: &str) -> Assert {
    let duration = matches!(value, AssertValue::Duration(_));
    Assert {
        key: key.to_string(),
        method,
        value,
        ordered: method == AssertMethod::OrderedEqual,
        duration,
        source: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_equality() {
        let asserts = parse("result.code == 200").unwrap();
        assert_eq!(asserts.len(), 1);
        assert_eq!(asserts[0].key, "result.code");
        assert_eq!(asserts[0].method, AssertMethod::Equal);
        assert_eq!(asserts[0].value, AssertValue::Number(200.0));
        assert!(!asserts[0].ordered);
        assert!(!asserts[0].duration);
    }

    #[test]
    fn test_verb_aliases() {
        for verb in ["==", "eq", "EQUAL"] {
            let asserts = parse(&format!("code {verb} 1")).unwrap();
            assert_eq!(asserts[0].method, AssertMethod::Equal);
        }
        for verb in ["<=", "le", "lessthanorequal"] {
            let asserts = parse(&format!("time {verb} 3")).unwrap();
            assert_eq!(asserts[0].method, AssertMethod::LessThanOrEqual);
        }
    }

    #[test]
    fn test_contains_expands_array() {
        let asserts = parse(r#"tags $$ ["a","b"]"#).unwrap();
        assert_eq!(asserts.len(), 2);
        assert!(asserts.iter().all(|a| a.method == AssertMethod::Contains));
        assert_eq!(asserts[0].value, AssertValue::Str("a".into()));
        assert_eq!(asserts[1].value, AssertValue::Str("b".into()));
    }

    #[test]
    fn test_contains_numeric_array() {
        let asserts = parse("ports $$ [1,2,3]").unwrap();
        assert_eq!(asserts.len(), 3);
        assert_eq!(asserts[0].value, AssertValue::Number(1.0));
    }

    #[test]
    fn test_duration_flag_set() {
        let asserts = parse("responsetime < 500ms").unwrap();
        assert!(asserts[0].duration);
        assert_eq!(
            asserts[0].value,
            AssertValue::Duration(std::time::Duration::from_millis(500))
        );
    }

    #[test]
    fn test_quoted_multiword_value() {
        let asserts = parse(r#"body.title == "hello world""#).unwrap();
        assert_eq!(asserts[0].value, AssertValue::Str("hello world".into()));
    }

    #[test]
    fn test_unknown_verb_rejected() {
        assert!(matches!(parse("a ~= b"), Err(ConfigError::UnknownMethod(_))));
    }

    #[test]
    fn test_wrong_arity_rejected() {
        assert!(matches!(parse("a =="), Err(ConfigError::MalformedAssertion { .. })));
        assert!(matches!(parse("a == b c"), Err(ConfigError::MalformedAssertion { .. })));
    }

    #[test]
    fn test_ordered_flag() {
        let asserts = parse(r#"tags #== ["a","b"]"#).unwrap();
        assert!(asserts[0].ordered);
        let asserts = parse(r#"tags == ["a","b"]"#).unwrap();
        assert!(!asserts[0].ordered);
    }
}
