//! Lenient timestamp parsing for API payloads.
//!
//! The feed API is not consistent about timestamp formats: some records carry
//! RFC 3339 strings, some carry naive date-times, some only a date. Values that
//! cannot be parsed become `None` instead of failing the whole record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Parse a timestamp string in any of the formats the API emits.
pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Serde adapter: `#[serde(default, deserialize_with = "timestamp::lenient")]`.
pub fn lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => parse(&s),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_rfc3339() {
        let dt = parse("2024-01-15T10:00:00Z").unwrap();
        assert_eq!(dt.day(), 15);
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_offset_is_normalized_to_utc() {
        let dt = parse("2024-01-15T12:00:00+02:00").unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn test_parse_naive_forms() {
        assert!(parse("2024-01-15T10:00:00").is_some());
        assert!(parse("2024-01-15T10:00:00.123456").is_some());
        assert!(parse("2024-01-15 10:00:00").is_some());
        assert_eq!(parse("2024-01-15").unwrap().hour(), 0);
    }

    #[test]
    fn test_parse_garbage_is_none() {
        assert!(parse("").is_none());
        assert!(parse("yesterday").is_none());
        assert!(parse("2024-13-45").is_none());
    }
}
