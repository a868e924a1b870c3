//! Typed parameter blocks for each rule.
//!
//! Parameter blocks are deserialized from the `parameters.<rule_id>` mapping
//! of the detection config. Absent options take the documented defaults and
//! unrecognized options are ignored. Every block is validated once, when the
//! engine is built, so rules never re-check their options while evaluating.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

/// Common behavior of rule parameter blocks.
pub trait RuleParams: DeserializeOwned + Default {
    /// Check value ranges that the type system does not capture.
    fn validate(&self) -> Result<(), String>;
}

/// Deserialize and validate a parameter block. `None` and YAML `null` both
/// mean "all defaults".
pub fn parse_params<P: RuleParams>(value: Option<&serde_yaml::Value>) -> Result<P, String> {
    let params = match value {
        None | Some(serde_yaml::Value::Null) => P::default(),
        Some(v) if !v.is_mapping() => {
            return Err("parameter block must be a mapping".to_string());
        }
        Some(v) => serde_yaml::from_value(v.clone()).map_err(|e| e.to_string())?,
    };
    params.validate()?;
    Ok(params)
}

// =============================================================================
// Sensitive process access
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessAccessParams {
    /// Action code of process-access events (Sysmon event 10).
    #[serde(deserialize_with = "scalar_string")]
    pub action_code: String,
    /// Case-insensitive suffixes identifying sensitive target processes.
    #[serde(deserialize_with = "scalar_string_list")]
    pub target_processes: Vec<String>,
    pub min_events: usize,
    pub max_samples: usize,
}

impl Default for ProcessAccessParams {
    fn default() -> Self {
        ProcessAccessParams {
            action_code: "10".to_string(),
            target_processes: vec!["\\lsass.exe".to_string()],
            min_events: 1,
            max_samples: 10,
        }
    }
}

impl RuleParams for ProcessAccessParams {
    fn validate(&self) -> Result<(), String> {
        non_empty_list("target_processes", &self.target_processes)?;
        at_least_one("min_events", self.min_events)?;
        at_least_one("max_samples", self.max_samples)
    }
}

// =============================================================================
// Suspicious script content
// =============================================================================

/// Default script-content keywords: common PowerShell download-cradle,
/// obfuscation and credential-theft markers.
pub const DEFAULT_SCRIPT_KEYWORDS: &[&str] = &[
    "invoke-mimikatz",
    "invoke-expression",
    "downloadstring",
    "downloadfile",
    "net.webclient",
    "frombase64string",
    "-encodedcommand",
    "invoke-shellcode",
    "reflection.assembly",
    "virtualalloc",
    "bypass",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptContentParams {
    /// Action codes of script-engine telemetry (PowerShell 4104 script blocks).
    #[serde(deserialize_with = "scalar_string_list")]
    pub event_codes: Vec<String>,
    #[serde(deserialize_with = "scalar_string_list")]
    pub keywords: Vec<String>,
    /// Distinct keywords a single message must contain to count as a hit.
    pub min_keyword_hits: usize,
    pub min_events: usize,
    pub max_samples: usize,
}

impl Default for ScriptContentParams {
    fn default() -> Self {
        ScriptContentParams {
            event_codes: vec!["4104".to_string()],
            keywords: DEFAULT_SCRIPT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            min_keyword_hits: 1,
            min_events: 1,
            max_samples: 10,
        }
    }
}

impl RuleParams for ScriptContentParams {
    fn validate(&self) -> Result<(), String> {
        non_empty_list("event_codes", &self.event_codes)?;
        non_empty_list("keywords", &self.keywords)?;
        at_least_one("min_keyword_hits", self.min_keyword_hits)?;
        at_least_one("min_events", self.min_events)?;
        at_least_one("max_samples", self.max_samples)
    }
}

// =============================================================================
// Repeated authentication failure
// =============================================================================

/// Entity key used to partition authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthGrouping {
    /// One account attacked from one address.
    #[default]
    UserSourceIp,
    /// One account failing on one host.
    HostUser,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthFailureParams {
    pub window_minutes: u32,
    pub failures_threshold: usize,
    pub group_by: AuthGrouping,
    /// `event.outcome` values (case-insensitive) counted as failures.
    #[serde(deserialize_with = "scalar_string_list")]
    pub failure_outcomes: Vec<String>,
    pub max_samples: usize,
}

impl Default for AuthFailureParams {
    fn default() -> Self {
        AuthFailureParams {
            window_minutes: 10,
            failures_threshold: 8,
            group_by: AuthGrouping::UserSourceIp,
            failure_outcomes: vec!["failure".to_string()],
            max_samples: 10,
        }
    }
}

impl RuleParams for AuthFailureParams {
    fn validate(&self) -> Result<(), String> {
        at_least_one("window_minutes", self.window_minutes as usize)?;
        at_least_one("failures_threshold", self.failures_threshold)?;
        non_empty_list("failure_outcomes", &self.failure_outcomes)?;
        at_least_one("max_samples", self.max_samples)
    }
}

// =============================================================================
// Validation and lenient scalar helpers
// =============================================================================

fn at_least_one(name: &str, value: usize) -> Result<(), String> {
    if value == 0 {
        return Err(format!("'{name}' must be at least 1"));
    }
    Ok(())
}

fn non_empty_list(name: &str, values: &[String]) -> Result<(), String> {
    if values.is_empty() {
        return Err(format!("'{name}' must not be empty"));
    }
    if values.iter().any(|v| v.is_empty()) {
        return Err(format!("'{name}' must not contain empty strings"));
    }
    Ok(())
}

fn yaml_scalar_to_string(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Accept `10` as well as `"10"` for code-like options.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let v = serde_yaml::Value::deserialize(deserializer)?;
    yaml_scalar_to_string(&v).ok_or_else(|| D::Error::custom("expected a string or number"))
}

/// A list of scalars, or a single scalar treated as a one-element list.
fn scalar_string_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::Sequence(items) => items
            .iter()
            .map(|item| {
                yaml_scalar_to_string(item)
                    .ok_or_else(|| D::Error::custom("expected a list of strings or numbers"))
            })
            .collect(),
        other => yaml_scalar_to_string(&other)
            .map(|s| vec![s])
            .ok_or_else(|| D::Error::custom("expected a list of strings or numbers")),
    }
}
