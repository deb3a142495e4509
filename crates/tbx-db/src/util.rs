use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Column codecs shared by the repositories. Everything returns a plain
/// message on failure; each repo folds it into its own domain error.

pub fn to_rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub fn from_rfc3339(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| format!("bad timestamp column {value}: {err}"))
}

/// Sensors and solution steps live in JSON text columns.
pub fn encode_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|err| err.to_string())
}

pub fn decode_json<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_str(value).map_err(|err| err.to_string())
}

/// Statuses, roles, data formats and event sources are stored under their
/// snake_case serde names, so a row reads the same as an exported record.
pub fn encode_enum<T: Serialize>(value: &T) -> Result<String, String> {
    match serde_json::to_value(value).map_err(|err| err.to_string())? {
        Value::String(name) => Ok(name),
        other => Err(format!("not a string-encoded enum: {other}")),
    }
}

pub fn decode_enum<T: DeserializeOwned>(value: &str) -> Result<T, String> {
    serde_json::from_value(Value::String(value.to_string())).map_err(|err| err.to_string())
}

/// SQLite integers are i64; file sizes and record counts cross through these
/// so an out-of-range value fails loudly instead of wrapping.
pub fn size_to_column(value: u64) -> Result<i64, String> {
    i64::try_from(value).map_err(|_| format!("size {value} exceeds the integer column range"))
}

pub fn column_to_size(value: i64) -> Result<u64, String> {
    u64::try_from(value).map_err(|_| format!("negative size column: {value}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tbx_core::types::enums::SessionStatus;

    #[test]
    fn enum_columns_use_snake_case_names() {
        assert_eq!(
            encode_enum(&SessionStatus::DataUploaded).unwrap(),
            "data_uploaded"
        );
        let status: SessionStatus = decode_enum("analysis_complete").unwrap();
        assert_eq!(status, SessionStatus::AnalysisComplete);
        assert!(decode_enum::<SessionStatus>("no_such_status").is_err());
    }

    #[test]
    fn sizes_round_trip_through_integer_columns() {
        let stored = size_to_column(5_000_000_000).unwrap();
        assert_eq!(column_to_size(stored).unwrap(), 5_000_000_000);
        assert!(size_to_column(u64::MAX).is_err());
        assert!(column_to_size(-1).is_err());
    }

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        assert_eq!(from_rfc3339(&to_rfc3339(&now)).unwrap(), now);
        assert!(from_rfc3339("yesterday-ish").is_err());
    }
}
