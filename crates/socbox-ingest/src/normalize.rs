//! Normalization of raw Windows / Mordor-style records into `NormalizedEvent`.
//!
//! Source records vary wildly (Sysmon exports, Security channel dumps,
//! Winlogbeat documents). Each canonical field is resolved from an ordered
//! list of candidate paths; the first candidate holding a non-empty scalar
//! wins. Records without a usable timestamp are dropped.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::schema::{
    NormalizedEvent, format_timestamp, parse_timestamp, scalar_to_string, timestamp_from_epoch,
};

// =============================================================================
// Candidate field paths
// =============================================================================

const TIMESTAMP_FIELDS: &[&str] = &[
    "@timestamp",
    "Timestamp",
    "timestamp",
    "winlog.time_created",
    "TimeCreated",
    "UtcTime",
    "EventTime",
    "EventReceivedTime",
];

const PROVIDER_FIELDS: &[&str] = &["winlog.provider_name", "Channel", "source"];
const EVENT_ID_FIELDS: &[&str] = &["winlog.event_id", "EventID"];

const HOST_FIELDS: &[&str] = &[
    "host.name",
    "Computer",
    "winlog.computer_name",
    "Hostname",
];

const USER_FIELDS: &[&str] = &[
    "user.name",
    "winlog.event_data.TargetUserName",
    "winlog.event_data.SubjectUserName",
    "TargetUserName",
    "SubjectUserName",
    "AccountName",
];

const SOURCE_IP_FIELDS: &[&str] = &["source.ip", "winlog.event_data.IpAddress", "IpAddress"];

const DESTINATION_IP_FIELDS: &[&str] = &[
    "destination.ip",
    "winlog.event_data.DestinationIp",
    "DestinationIp",
];

// Sysmon ProcessAccess (event 10) carries SourceImage/TargetImage instead of Image.
const PROCESS_NAME_FIELDS: &[&str] = &[
    "process.name",
    "winlog.event_data.Image",
    "Image",
    "ProcessName",
    "SourceImage",
    "TargetImage",
];

const PROCESS_TARGET_FIELDS: &[&str] = &[
    "process.target",
    "winlog.event_data.TargetImage",
    "TargetImage",
];

const GRANTED_ACCESS_FIELDS: &[&str] = &[
    "process.granted_access",
    "winlog.event_data.GrantedAccess",
    "GrantedAccess",
];

const COMMAND_LINE_FIELDS: &[&str] = &[
    "process.command_line",
    "winlog.event_data.CommandLine",
    "CommandLine",
];

const MESSAGE_FIELDS: &[&str] = &[
    "message",
    "winlog.message",
    "Message",
    "winlog.event_data.ScriptBlockText",
    "ScriptBlockText",
];

const STATUS_FIELDS: &[&str] = &["winlog.event_data.Status", "Status"];

const AUTH_EVENT_IDS: &[&str] = &["4624", "4625", "4768", "4769", "4771", "4776"];
const PROCESS_EVENT_IDS: &[&str] = &["1", "4688"];

// =============================================================================
// Record normalization
// =============================================================================

/// Normalize one raw record. Returns `None` when no candidate field yields a
/// parseable timestamp.
pub fn normalize_record(record: &Value, dataset: &str) -> Option<NormalizedEvent> {
    let timestamp = TIMESTAMP_FIELDS
        .iter()
        .find_map(|path| lookup(record, path).and_then(timestamp_value))?;

    let provider = first_string(record, PROVIDER_FIELDS)
        .unwrap_or_default()
        .to_lowercase();
    let event_id = first_string(record, EVENT_ID_FIELDS);

    let mut user_name = first_string(record, USER_FIELDS);
    if let Some(user) = user_name.as_mut()
        && !user.contains('\\')
        && let Some(domain) = first_string(record, &["Domain"])
    {
        *user = format!("{domain}\\{user}");
    }

    let outcome = event_id
        .as_deref()
        .and_then(|id| infer_outcome(record, id))
        .map(str::to_string)
        .or_else(|| first_string(record, &["event.outcome"]));

    Some(NormalizedEvent {
        timestamp,
        dataset: Some(dataset.to_string()),
        category: Some(infer_category(&provider, event_id.as_deref()).to_string()),
        action: event_id,
        outcome,
        host_name: first_string(record, HOST_FIELDS),
        user_name,
        source_ip: first_string(record, SOURCE_IP_FIELDS),
        destination_ip: first_string(record, DESTINATION_IP_FIELDS),
        process_name: first_string(record, PROCESS_NAME_FIELDS),
        process_target: first_string(record, PROCESS_TARGET_FIELDS),
        granted_access: first_string(record, GRANTED_ACCESS_FIELDS),
        command_line: first_string(record, COMMAND_LINE_FIELDS),
        message: first_string(record, MESSAGE_FIELDS),
        raw: record.clone(),
    })
}

/// Result of normalizing a batch of raw records.
#[derive(Debug, Default)]
pub struct Normalized {
    pub events: Vec<NormalizedEvent>,
    /// Records dropped for lack of a usable timestamp.
    pub skipped: usize,
}

/// Normalize a batch of records and sort the result deterministically.
pub fn normalize_records(records: &[Value], dataset: &str) -> Normalized {
    let mut out = Normalized::default();
    for record in records {
        match normalize_record(record, dataset) {
            Some(event) => out.events.push(event),
            None => out.skipped += 1,
        }
    }
    sort_events(&mut out.events);
    out
}

/// Stable sort by (timestamp, dataset, action). Events with unparseable
/// timestamps sort after all others, keeping their relative order.
pub fn sort_events(events: &mut [NormalizedEvent]) {
    events.sort_by(|a, b| {
        let by_time = match (a.instant(), b.instant()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_time
            .then_with(|| a.dataset.cmp(&b.dataset))
            .then_with(|| a.action.cmp(&b.action))
    });
}

fn infer_category(provider: &str, event_id: Option<&str>) -> &'static str {
    let id = event_id.unwrap_or("");
    if provider.contains("security") || AUTH_EVENT_IDS.contains(&id) {
        "auth"
    } else if provider.contains("sysmon") || PROCESS_EVENT_IDS.contains(&id) {
        "process"
    } else if provider.contains("dns") {
        "dns"
    } else if ["proxy", "http", "web"].iter().any(|p| provider.contains(p)) {
        "web"
    } else if provider.contains("network") {
        "network"
    } else {
        "other"
    }
}

/// Authentication outcome implied by well-known Windows event ids.
fn infer_outcome(record: &Value, event_id: &str) -> Option<&'static str> {
    match event_id {
        "4625" | "4771" => Some("failure"),
        "4624" | "4768" | "4769" => Some("success"),
        "4776" => {
            let status = first_string(record, STATUS_FIELDS)?;
            if matches!(status.to_ascii_lowercase().as_str(), "0x0" | "0") {
                Some("success")
            } else {
                Some("failure")
            }
        }
        _ => None,
    }
}

fn timestamp_value(v: &Value) -> Option<String> {
    let dt = match v {
        Value::String(s) => parse_timestamp(s)?,
        Value::Number(n) => timestamp_from_epoch(n.as_f64()?)?,
        _ => return None,
    };
    Some(format_timestamp(&dt))
}

fn first_string(record: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| {
        lookup(record, path)
            .and_then(scalar_to_string)
            .filter(|s| !s.trim().is_empty())
    })
}

/// Resolve a field by name. A flat key (`"host.name"` as one key) takes
/// precedence over dot-separated traversal of nested objects.
fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let obj = record.as_object()?;
    if let Some(v) = obj.get(path) {
        return Some(v);
    }
    if !path.contains('.') {
        return None;
    }
    path.split('.')
        .try_fold(record, |current, part| current.as_object()?.get(part))
}

// =============================================================================
// Raw record files
// =============================================================================

/// Read JSON objects from a file holding NDJSON, a JSON array of objects, or
/// a single JSON object. Non-object items are ignored.
pub fn read_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_records(&text)
}

/// Parse raw records from text; see [`read_records`].
pub fn parse_records(text: &str) -> Result<Vec<Value>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    // NDJSON first: every non-blank line must parse on its own.
    if text.contains('\n') {
        let lines: std::result::Result<Vec<Value>, _> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(serde_json::from_str::<Value>)
            .collect();
        if let Ok(values) = lines {
            return Ok(values.into_iter().filter(Value::is_object).collect());
        }
    }

    match serde_json::from_str::<Value>(text).map_err(IngestError::Document)? {
        Value::Array(items) => Ok(items.into_iter().filter(Value::is_object).collect()),
        obj @ Value::Object(_) => Ok(vec![obj]),
        _ => Ok(Vec::new()),
    }
}

/// Records gathered from a directory tree.
#[derive(Debug, Default)]
pub struct RecordSet {
    pub records: Vec<Value>,
    pub files: usize,
    /// Per-file read/parse errors; the offending files contribute no records.
    pub errors: Vec<String>,
}

/// Read every `.json` / `.jsonl` file under `dir` (recursively), in path order.
pub fn read_records_dir(dir: &Path) -> Result<RecordSet> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, out)?;
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("json" | "jsonl")
            ) {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut paths = Vec::new();
    walk(dir, &mut paths)?;
    paths.sort();

    let mut set = RecordSet::default();
    for path in paths {
        match read_records(&path) {
            Ok(records) => {
                tracing::debug!(
                    path = %path.display(),
                    records = records.len(),
                    "read raw records"
                );
                set.files += 1;
                set.records.extend(records);
            }
            Err(e) => set.errors.push(format!("{}: {e}", path.display())),
        }
    }
    Ok(set)
}
