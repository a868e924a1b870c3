//! Canonical event schema: the normalized event record, its column set, and
//! timestamp handling.
//!
//! Column names follow ECS-style dotted notation (`host.name`, `user.name`)
//! and are used verbatim as JSON keys on the wire.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

// =============================================================================
// Columns
// =============================================================================

/// A recognized column of the canonical event schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Timestamp,
    Dataset,
    Category,
    Action,
    Outcome,
    HostName,
    UserName,
    SourceIp,
    DestinationIp,
    ProcessName,
    ProcessTarget,
    GrantedAccess,
    CommandLine,
    Message,
    Raw,
}

impl Column {
    /// Every recognized column, in schema order.
    pub const ALL: [Column; 15] = [
        Column::Timestamp,
        Column::Dataset,
        Column::Category,
        Column::Action,
        Column::Outcome,
        Column::HostName,
        Column::UserName,
        Column::SourceIp,
        Column::DestinationIp,
        Column::ProcessName,
        Column::ProcessTarget,
        Column::GrantedAccess,
        Column::CommandLine,
        Column::Message,
        Column::Raw,
    ];

    /// The dotted wire name of this column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Timestamp => "@timestamp",
            Column::Dataset => "event.dataset",
            Column::Category => "event.category",
            Column::Action => "event.action",
            Column::Outcome => "event.outcome",
            Column::HostName => "host.name",
            Column::UserName => "user.name",
            Column::SourceIp => "source.ip",
            Column::DestinationIp => "destination.ip",
            Column::ProcessName => "process.name",
            Column::ProcessTarget => "process.target",
            Column::GrantedAccess => "process.granted_access",
            Column::CommandLine => "process.command_line",
            Column::Message => "message",
            Column::Raw => "raw",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Column::ALL.into_iter().find(|c| c.as_str() == name)
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Normalized event
// =============================================================================

/// One normalized security event.
///
/// Only the timestamp is mandatory. Every other field is `None` when the
/// source record did not carry it; no placeholder values are invented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    #[serde(rename = "@timestamp")]
    pub timestamp: String,
    #[serde(rename = "event.dataset", default, deserialize_with = "lenient_string")]
    pub dataset: Option<String>,
    #[serde(rename = "event.category", default, deserialize_with = "lenient_string")]
    pub category: Option<String>,
    /// Stringified source event-type identifier (e.g. a Windows event id).
    #[serde(rename = "event.action", default, deserialize_with = "lenient_string")]
    pub action: Option<String>,
    #[serde(rename = "event.outcome", default, deserialize_with = "lenient_string")]
    pub outcome: Option<String>,
    #[serde(rename = "host.name", default, deserialize_with = "lenient_string")]
    pub host_name: Option<String>,
    #[serde(rename = "user.name", default, deserialize_with = "lenient_string")]
    pub user_name: Option<String>,
    #[serde(rename = "source.ip", default, deserialize_with = "lenient_string")]
    pub source_ip: Option<String>,
    #[serde(rename = "destination.ip", default, deserialize_with = "lenient_string")]
    pub destination_ip: Option<String>,
    #[serde(rename = "process.name", default, deserialize_with = "lenient_string")]
    pub process_name: Option<String>,
    #[serde(rename = "process.target", default, deserialize_with = "lenient_string")]
    pub process_target: Option<String>,
    #[serde(rename = "process.granted_access", default, deserialize_with = "lenient_string")]
    pub granted_access: Option<String>,
    #[serde(rename = "process.command_line", default, deserialize_with = "lenient_string")]
    pub command_line: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: Option<String>,
    /// The untouched source record, kept for traceability.
    #[serde(default)]
    pub raw: serde_json::Value,
}

impl NormalizedEvent {
    /// An event carrying only a timestamp.
    pub fn at(timestamp: impl Into<String>) -> Self {
        NormalizedEvent {
            timestamp: timestamp.into(),
            dataset: None,
            category: None,
            action: None,
            outcome: None,
            host_name: None,
            user_name: None,
            source_ip: None,
            destination_ip: None,
            process_name: None,
            process_target: None,
            granted_access: None,
            command_line: None,
            message: None,
            raw: serde_json::Value::Null,
        }
    }

    /// String value of a column. `raw` is not a string column and always
    /// yields `None`.
    pub fn get(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Timestamp => return Some(&self.timestamp),
            Column::Dataset => &self.dataset,
            Column::Category => &self.category,
            Column::Action => &self.action,
            Column::Outcome => &self.outcome,
            Column::HostName => &self.host_name,
            Column::UserName => &self.user_name,
            Column::SourceIp => &self.source_ip,
            Column::DestinationIp => &self.destination_ip,
            Column::ProcessName => &self.process_name,
            Column::ProcessTarget => &self.process_target,
            Column::GrantedAccess => &self.granted_access,
            Column::CommandLine => &self.command_line,
            Column::Message => &self.message,
            Column::Raw => return None,
        };
        value.as_deref()
    }

    /// The parsed timestamp, or `None` if it is not a recognized format.
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Accept strings, numbers and booleans for optional text columns.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => scalar_to_string(&v)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected a scalar value, found {v}"))),
    }
}

/// Convert a scalar JSON value to its string form. Objects, arrays and null
/// have no string form.
pub fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// =============================================================================
// Timestamp helpers
// =============================================================================

/// Parse a timestamp string. Tries RFC 3339 first, then ISO 8601 variants:
/// offsets without a colon, minute precision and `,` as the decimal
/// separator. Strings without an offset are assumed to be UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim().replace(',', ".");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%d %H:%M%z",
    ];
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    const NAIVE_FORMATS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    let naive = s.strip_suffix(['Z', 'z']).unwrap_or(s.as_str());
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Interpret a numeric epoch value. Values above 1e12 are taken as
/// milliseconds.
pub fn timestamp_from_epoch(v: f64) -> Option<DateTime<Utc>> {
    if !v.is_finite() {
        return None;
    }
    let millis = if v.abs() > 1e12 { v } else { v * 1000.0 };
    Utc.timestamp_millis_opt(millis as i64).single()
}

/// Render a timestamp as RFC 3339 with a `Z` suffix, keeping sub-second
/// precision only when present.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_column_names_round_trip() {
        for column in Column::ALL {
            assert_eq!(Column::from_name(column.as_str()), Some(column));
        }
        assert_eq!(Column::from_name("process.parent.name"), None);
    }

    #[test]
    fn test_numeric_action_is_stringified() {
        let v = json!({"@timestamp": "2024-07-10T12:30:00Z", "event.action": 4625});
        let event: NormalizedEvent = serde_json::from_value(v).unwrap();
        assert_eq!(event.action.as_deref(), Some("4625"));
    }

    #[test]
    fn test_nested_value_in_text_column_is_rejected() {
        let v = json!({"@timestamp": "2024-07-10T12:30:00Z", "host.name": {"x": 1}});
        assert!(serde_json::from_value::<NormalizedEvent>(v).is_err());
    }

    #[test]
    fn test_parse_timestamp_rfc3339() {
        let ts = parse_timestamp("2024-07-10T12:30:00Z").unwrap();
        assert_eq!(ts.timestamp(), 1720614600);
    }

    #[test]
    fn test_parse_timestamp_offset() {
        let ts = parse_timestamp("2024-07-10T14:30:00+02:00").unwrap();
        assert_eq!(ts.timestamp(), 1720614600);
    }

    #[test]
    fn test_parse_timestamp_naive() {
        assert_eq!(
            parse_timestamp("2024-07-10T12:30:00").unwrap().timestamp(),
            1720614600
        );
        assert_eq!(
            parse_timestamp("2024-07-10 12:30:00").unwrap().timestamp(),
            1720614600
        );
    }

    #[test]
    fn test_parse_timestamp_fractional() {
        let ts = parse_timestamp("2024-07-10 12:30:00.250").unwrap();
        assert_eq!(ts.timestamp_millis(), 1720614600250);
    }

    #[test]
    fn test_parse_timestamp_offset_without_colon() {
        let ts = parse_timestamp("2024-07-10T12:30:00+0000").unwrap();
        assert_eq!(ts.timestamp(), 1720614600);
        let ts = parse_timestamp("2024-07-10T14:30:00.5+0200").unwrap();
        assert_eq!(ts.timestamp_millis(), 1720614600500);
    }

    #[test]
    fn test_parse_timestamp_minute_precision() {
        for s in [
            "2024-07-10T12:30Z",
            "2024-07-10T12:30",
            "2024-07-10 12:30",
            "2024-07-10T14:30+02:00",
            "2024-07-10T14:30+0200",
        ] {
            assert_eq!(parse_timestamp(s).map(|t| t.timestamp()), Some(1720614600), "{s}");
        }
    }

    #[test]
    fn test_parse_timestamp_comma_decimal() {
        let ts = parse_timestamp("2024-07-10T12:30:00,5Z").unwrap();
        assert_eq!(ts.timestamp_millis(), 1720614600500);
        let ts = parse_timestamp("2024-07-10 12:30:00,250").unwrap();
        assert_eq!(ts.timestamp_millis(), 1720614600250);
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("").is_none());
    }

    #[test]
    fn test_epoch_seconds_and_millis() {
        assert_eq!(
            timestamp_from_epoch(1720614600.0).unwrap().timestamp(),
            1720614600
        );
        assert_eq!(
            timestamp_from_epoch(1720614600000.0).unwrap().timestamp(),
            1720614600
        );
        assert!(timestamp_from_epoch(f64::NAN).is_none());
    }

    #[test]
    fn test_format_timestamp() {
        let ts = parse_timestamp("2024-07-10T14:30:00+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-07-10T12:30:00Z");
    }

    #[test]
    fn test_event_serializes_with_dotted_names() {
        let mut event = NormalizedEvent::at("2024-07-10T12:30:00Z");
        event.host_name = Some("HOST01".into());
        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["@timestamp"], json!("2024-07-10T12:30:00Z"));
        assert_eq!(v["host.name"], json!("HOST01"));
        assert_eq!(v["user.name"], serde_json::Value::Null);
    }

    #[test]
    fn test_event_deserializes_partial_record() {
        let v = json!({"@timestamp": "2024-07-10T12:30:00Z", "user.name": "alice"});
        let event: NormalizedEvent = serde_json::from_value(v).unwrap();
        assert_eq!(event.get(Column::UserName), Some("alice"));
        assert_eq!(event.get(Column::HostName), None);
        assert_eq!(event.get(Column::Timestamp), Some("2024-07-10T12:30:00Z"));
    }
}
