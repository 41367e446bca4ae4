//! Duration-string grammar shared by test definitions and assertions.
//!
//! Accepted forms: `<number><unit>` where unit is `ms`, `s`, `m` or `h`,
//! e.g. `"500ms"`, `"2s"`, `"2m"`, `"3h"`. A bare number is not a
//! duration; anything else is rejected.

use std::time::Duration;

use crate::error::ConfigError;

/// Parse a duration string, rejecting anything outside the grammar.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();

    let unit_start = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| ConfigError::InvalidDuration(raw.to_string()))?;

    let (number, unit) = trimmed.split_at(unit_start);
    let number: f64 = number
        .parse()
        .map_err(|_| ConfigError::InvalidDuration(raw.to_string()))?;
    if !number.is_finite() || number < 0.0 {
        return Err(ConfigError::InvalidDuration(raw.to_string()));
    }

    let millis = match unit {
        "ms" => number,
        "s" => number * 1_000.0,
        "m" => number * 60_000.0,
        "h" => number * 3_600_000.0,
        _ => return Err(ConfigError::InvalidDuration(raw.to_string())),
    };

    Ok(Duration::from_nanos((millis * 1_000_000.0) as u64))
}

/// True if the string matches the duration grammar.
pub fn is_duration(raw: &str) -> bool {
    parse_duration(raw).is_ok()
}

/// Render a millisecond quantity the way duration-flagged assertion
/// messages expect it (`1500 -> "1.5s"`, `250 -> "250ms"`).
pub fn format_millis(millis: f64) -> String {
    if millis >= 3_600_000.0 {
        format!("{}h", trim_zeros(millis / 3_600_000.0))
    } else if millis >= 60_000.0 {
        format!("{}m", trim_zeros(millis / 60_000.0))
    } else if millis >= 1_000.0 {
        format!("{}s", trim_zeros(millis / 1_000.0))
    } else {
        format!("{}ms", trim_zeros(millis))
    }
}

fn trim_zeros(value: f64) -> String {
    let formatted = format!("{value:.3}");
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_durations() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("3h").unwrap(), Duration::from_secs(10_800));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_rejects_out_of_grammar() {
        assert!(matches!(parse_duration("abc"), Err(ConfigError::InvalidDuration(_))));
        assert!(matches!(parse_duration("10"), Err(ConfigError::InvalidDuration(_))));
        assert!(matches!(parse_duration("10d"), Err(ConfigError::InvalidDuration(_))));
        assert!(matches!(parse_duration(""), Err(ConfigError::InvalidDuration(_))));
        assert!(matches!(parse_duration("-5s"), Err(ConfigError::InvalidDuration(_))));
    }

    #[test]
    fn test_format_millis() {
        assert_eq!(format_millis(250.0), "250ms");
        assert_eq!(format_millis(1_500.0), "1.5s");
        assert_eq!(format_millis(90_000.0), "1.5m");
        assert_eq!(format_millis(7_200_000.0), "2h");
    }
}
