//! Static rule registry.
//!
//! The set of rules is closed and known at compile time. Each [`RuleId`] has
//! exactly one [`RuleEntry`] in a read-only table; adding a rule means adding
//! a variant, a table row, and its module under [`crate::rules`].

use std::fmt;

use socbox_ingest::Column;

use crate::alert::Severity;
use crate::params::{AuthFailureParams, ProcessAccessParams, ScriptContentParams, parse_params};
use crate::rules::{
    CompiledRule, RepeatedAuthFailure, SensitiveProcessAccess, SuspiciousScriptContent,
};

/// Identifier of a registered rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleId {
    SuspiciousProcessAccess,
    SuspiciousScriptContent,
    BruteForceAuth,
}

impl RuleId {
    pub const ALL: [RuleId; 3] = [
        RuleId::SuspiciousProcessAccess,
        RuleId::SuspiciousScriptContent,
        RuleId::BruteForceAuth,
    ];

    /// Canonical identifier, as written on alerts.
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::SuspiciousProcessAccess => "suspicious_process_access",
            RuleId::SuspiciousScriptContent => "suspicious_script_content",
            RuleId::BruteForceAuth => "brute_force_auth",
        }
    }

    /// Resolve a canonical identifier or one of its aliases.
    pub fn from_str(s: &str) -> Option<Self> {
        RuleId::ALL
            .into_iter()
            .find(|id| id.as_str() == s || id.entry().aliases.iter().any(|a| *a == s))
    }

    pub fn entry(&self) -> &'static RuleEntry {
        match self {
            RuleId::SuspiciousProcessAccess => &REGISTRY[0],
            RuleId::SuspiciousScriptContent => &REGISTRY[1],
            RuleId::BruteForceAuth => &REGISTRY[2],
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a compiled rule from an optional raw parameter block.
pub type BuildFn = fn(Option<&serde_yaml::Value>) -> Result<CompiledRule, String>;

/// One row of the registry.
pub struct RuleEntry {
    pub id: RuleId,
    /// Alternative identifiers accepted in `enabled`.
    pub aliases: &'static [&'static str],
    pub title: &'static str,
    pub severity: Severity,
    pub description: &'static str,
    pub build: BuildFn,
}

impl RuleEntry {
    /// Columns the rule requires with its default parameters.
    pub fn default_columns(&self) -> Vec<Column> {
        (self.build)(None)
            .map(|rule| rule.required_columns())
            .unwrap_or_default()
    }
}

impl fmt::Debug for RuleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEntry")
            .field("id", &self.id)
            .field("aliases", &self.aliases)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

static REGISTRY: [RuleEntry; 3] = [
    RuleEntry {
        id: RuleId::SuspiciousProcessAccess,
        aliases: &["sensitive_process_access"],
        title: SensitiveProcessAccess::TITLE,
        severity: Severity::High,
        description: "Process-access events whose target process ends with a sensitive suffix, \
                      grouped by host, user, source and target process.",
        build: build_process_access,
    },
    RuleEntry {
        id: RuleId::SuspiciousScriptContent,
        aliases: &[],
        title: SuspiciousScriptContent::TITLE,
        severity: Severity::Medium,
        description: "Script-block telemetry containing configured keywords, grouped by host \
                      and user.",
        build: build_script_content,
    },
    RuleEntry {
        id: RuleId::BruteForceAuth,
        aliases: &["repeated_auth_failure"],
        title: RepeatedAuthFailure::TITLE,
        severity: Severity::High,
        description: "Authentication failures for one entity reaching a threshold inside a \
                      sliding time window.",
        build: build_auth_failure,
    },
];

fn build_process_access(value: Option<&serde_yaml::Value>) -> Result<CompiledRule, String> {
    parse_params::<ProcessAccessParams>(value)
        .map(|p| CompiledRule::SensitiveProcessAccess(SensitiveProcessAccess::new(p)))
}

fn build_script_content(value: Option<&serde_yaml::Value>) -> Result<CompiledRule, String> {
    parse_params::<ScriptContentParams>(value)
        .map(|p| CompiledRule::SuspiciousScriptContent(SuspiciousScriptContent::new(p)))
}

fn build_auth_failure(value: Option<&serde_yaml::Value>) -> Result<CompiledRule, String> {
    parse_params::<AuthFailureParams>(value)
        .map(|p| CompiledRule::RepeatedAuthFailure(RepeatedAuthFailure::new(p)))
}

/// All registered rules, in registration order.
pub fn entries() -> &'static [RuleEntry] {
    &REGISTRY
}

/// Find a rule by canonical id or alias.
pub fn lookup(name: &str) -> Option<&'static RuleEntry> {
    RuleId::from_str(name).map(|id| id.entry())
}
