//! Parameter decoding shared by the tools.

use {
    chrono::{DateTime, Utc},
    serde::de::DeserializeOwned,
    serde_json::Value,
};

use crate::error::{Error, Result};

/// Messages fetched when `limit` is absent or not positive.
pub const DEFAULT_LIMIT: u32 = 10;

/// Decode call arguments into `T`. A missing argument object is treated as
/// `{}` so tools without required fields accept it.
pub(crate) fn parse<T: DeserializeOwned>(params: Value) -> Result<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(params).map_err(|e| Error::invalid(e.to_string()))
}

/// Parse an RFC 3339 timestamp and normalise it to UTC.
pub(crate) fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            Error::invalid(format!(
                "{field} '{raw}' is not an RFC 3339 timestamp (e.g. 2024-01-02T09:00:00Z): {e}"
            ))
        })
}

pub(crate) fn require_text<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid(format!("{field} must not be empty")));
    }
    Ok(trimmed)
}

pub(crate) fn effective_limit(limit: Option<i64>) -> u32 {
    match limit {
        Some(n) if n > 0 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => DEFAULT_LIMIT,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*, chrono::TimeZone, davgate_common::ErrorKind, rstest::rstest,
        serde::Deserialize,
    };

    #[rstest]
    #[case("2024-01-02T09:00:00Z", 9)]
    #[case("2024-01-02T10:00:00+01:00", 9)]
    #[case(" 2024-01-02T04:00:00-05:00 ", 9)]
    fn instants_normalise_to_utc(#[case] raw: &str, #[case] hour: u32) {
        let parsed = parse_instant("start_time", raw).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap());
    }

    #[rstest]
    #[case("2024-01-02 09:00")]
    #[case("tomorrow")]
    #[case("")]
    fn malformed_instants_are_validation_errors(#[case] raw: &str) {
        let err = parse_instant("start_time", raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("start_time"));
    }

    #[rstest]
    #[case(None, 10)]
    #[case(Some(0), 10)]
    #[case(Some(-4), 10)]
    #[case(Some(3), 3)]
    #[case(Some(i64::MAX), u32::MAX)]
    fn limits(#[case] raw: Option<i64>, #[case] expected: u32) {
        assert_eq!(effective_limit(raw), expected);
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Args {
        to: String,
    }

    #[test]
    fn missing_field_is_validation_error() {
        let err = parse::<Args>(serde_json::json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("`to`"));
    }

    #[test]
    fn null_params_decode_as_empty_object() {
        #[derive(Deserialize)]
        struct Optional {
            limit: Option<i64>,
        }
        let args: Optional = parse(Value::Null).unwrap();
        assert!(args.limit.is_none());
    }

    #[test]
    fn blank_text_is_rejected() {
        assert!(require_text("summary", "  ").is_err());
        assert_eq!(require_text("summary", " Standup ").unwrap(), "Standup");
    }
}
