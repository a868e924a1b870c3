//! Alert types produced by detection rules.
//!
//! An alert is self-contained: it owns copies of every value it reports and
//! holds no reference into the corpus it was computed from. Serialized, each
//! alert is one JSON object (one line in an NDJSON alert stream).

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{DetectError, Result};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity role -> value pairs identifying what an alert is about
/// (`host`, `user`, `source_process`, ...).
///
/// Insertion order is preserved on output so alerts from the same rule
/// always list their entities the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities(Vec<(String, String)>);

impl Entities {
    pub fn new() -> Self {
        Entities(Vec::new())
    }

    /// Build from parallel role and value slices.
    pub fn from_roles<S: AsRef<str>>(roles: &[&str], values: &[S]) -> Self {
        Entities(
            roles
                .iter()
                .zip(values)
                .map(|(r, v)| (r.to_string(), v.as_ref().to_string()))
                .collect(),
        )
    }

    pub fn push(&mut self, role: impl Into<String>, value: impl Into<String>) {
        self.0.push((role.into(), value.into()));
    }

    pub fn get(&self, role: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(r, v)| (r.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Entities {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (role, value) in &self.0 {
            map.serialize_entry(role, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Entities {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct EntitiesVisitor;

        impl<'de> Visitor<'de> for EntitiesVisitor {
            type Value = Entities;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of entity roles to string values")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Entities, A::Error> {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((role, value)) = access.next_entry::<String, String>()? {
                    pairs.push((role, value));
                }
                Ok(Entities(pairs))
            }
        }

        deserializer.deserialize_map(EntitiesVisitor)
    }
}

/// Supporting evidence for an alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Number of events that contributed to the alert.
    pub count: usize,
    /// The earliest contributing events, projected to a few columns.
    pub samples: Vec<Map<String, Value>>,
    /// Rule-specific evidence, flattened into the evidence object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Evidence {
    pub fn new(count: usize, samples: Vec<Map<String, Value>>) -> Self {
        Evidence {
            count,
            samples,
            extra: Map::new(),
        }
    }

    /// Attach a rule-specific evidence entry.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}

/// One detection alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Identifier of the rule that produced the alert.
    pub rule_id: String,
    pub severity: Severity,
    /// Human-readable summary.
    pub title: String,
    /// Timestamp of the earliest contributing event.
    pub timestamp: String,
    pub entities: Entities,
    pub evidence: Evidence,
}

/// Parse newline-delimited JSON alerts. Blank lines are skipped.
pub fn parse_alerts_ndjson(input: &str) -> Result<Vec<Alert>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| DetectError::AlertJson {
                line: idx + 1,
                source,
            })
        })
        .collect()
}
