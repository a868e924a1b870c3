//! Detection configuration: which rules run, in which order, with which
//! parameters.
//!
//! ```yaml
//! enabled:
//!   - suspicious_process_access
//!   - brute_force_auth
//! parameters:
//!   suspicious_process_access:
//!     target_processes: ["\\lsass.exe"]
//!     min_events: 1
//!   brute_force_auth:
//!     window_minutes: 10
//!     failures_threshold: 8
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{DetectError, Result};

/// Parsed detection configuration.
///
/// `enabled` is order-significant and may repeat an id; a repeated id runs
/// that rule again and keeps both outputs. Parameter blocks are kept as raw
/// YAML here and turned into typed parameters when the engine is built.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub enabled: Vec<String>,
    pub parameters: BTreeMap<String, serde_yaml::Value>,
}

impl DetectionConfig {
    /// A config enabling the given rule ids with default parameters.
    pub fn new<I, S>(enabled: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DetectionConfig {
            enabled: enabled.into_iter().map(Into::into).collect(),
            parameters: BTreeMap::new(),
        }
    }

    /// Set the parameter block for a rule id.
    pub fn with_parameters(mut self, rule_id: &str, block: serde_yaml::Value) -> Self {
        self.parameters.insert(rule_id.to_string(), block);
        self
    }

    /// The first parameter block found under any of the given names.
    pub fn parameters_for<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Option<&serde_yaml::Value> {
        names.into_iter().find_map(|name| self.parameters.get(name))
    }
}

/// Parse a detection config from a YAML string. An empty document is an
/// empty config.
pub fn parse_detection_config(yaml: &str) -> Result<DetectionConfig> {
    if yaml.trim().is_empty() {
        return Ok(DetectionConfig::default());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
    if value.is_null() {
        return Ok(DetectionConfig::default());
    }
    Ok(serde_yaml::from_value(value)?)
}

/// Parse a detection config from a YAML file.
pub fn parse_detection_config_file(path: &Path) -> Result<DetectionConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| DetectError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_detection_config(&content)
}
