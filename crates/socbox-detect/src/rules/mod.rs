//! Detection rules and the machinery they share.
//!
//! Every rule is a pure batch computation over the corpus in three phases:
//!
//! 1. **Schema guard**: if the corpus lacks a column the rule needs, the rule
//!    yields no alerts. This is a precondition check, not an error.
//! 2. **Filter**: keep the events matching the rule's trigger.
//! 3. **Group & threshold**: partition the hits by an entity key, drop groups
//!    below the rule's threshold, and emit one alert per remaining group with
//!    the group's events in chronological order.

pub mod auth_failure;
pub mod process_access;
pub mod script_content;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use socbox_ingest::{Column, Corpus, NormalizedEvent};

use crate::alert::Alert;
use crate::error::{RuleFailure, Stage};
use crate::registry::RuleId;

pub use auth_failure::RepeatedAuthFailure;
pub use process_access::SensitiveProcessAccess;
pub use script_content::SuspiciousScriptContent;

// =============================================================================
// Compiled rules
// =============================================================================

/// A rule with validated parameters, ready to evaluate.
#[derive(Debug, Clone)]
pub enum CompiledRule {
    SensitiveProcessAccess(SensitiveProcessAccess),
    SuspiciousScriptContent(SuspiciousScriptContent),
    RepeatedAuthFailure(RepeatedAuthFailure),
}

impl CompiledRule {
    pub fn id(&self) -> RuleId {
        match self {
            CompiledRule::SensitiveProcessAccess(_) => RuleId::SuspiciousProcessAccess,
            CompiledRule::SuspiciousScriptContent(_) => RuleId::SuspiciousScriptContent,
            CompiledRule::RepeatedAuthFailure(_) => RuleId::BruteForceAuth,
        }
    }

    /// Columns the corpus must carry for this rule to produce alerts.
    pub fn required_columns(&self) -> Vec<Column> {
        match self {
            CompiledRule::SensitiveProcessAccess(r) => r.required_columns(),
            CompiledRule::SuspiciousScriptContent(r) => r.required_columns(),
            CompiledRule::RepeatedAuthFailure(r) => r.required_columns(),
        }
    }

    /// Evaluate against the corpus. Alerts come back in group-key order.
    pub fn evaluate(&self, corpus: &Corpus) -> Result<Vec<Alert>, RuleFailure> {
        if corpus.is_empty() {
            return Ok(Vec::new());
        }
        let missing = corpus.missing_columns(&self.required_columns());
        if !missing.is_empty() {
            tracing::debug!(
                rule = self.id().as_str(),
                missing = ?missing.iter().map(Column::as_str).collect::<Vec<_>>(),
                "schema guard: required columns absent, skipping"
            );
            return Ok(Vec::new());
        }

        match self {
            CompiledRule::SensitiveProcessAccess(r) => r.evaluate(corpus),
            CompiledRule::SuspiciousScriptContent(r) => r.evaluate(corpus),
            CompiledRule::RepeatedAuthFailure(r) => r.evaluate(corpus),
        }
    }
}

// =============================================================================
// Group Key
// =============================================================================

/// Composite entity key: one value per grouping column.
///
/// Derives `Ord` so groups are visited in a stable, data-only order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(pub Vec<String>);

impl GroupKey {
    /// Extract the key from an event. Returns `None` when any key column is
    /// missing; such events belong to no group.
    pub fn extract(event: &NormalizedEvent, columns: &[Column]) -> Option<Self> {
        columns
            .iter()
            .map(|c| event.get(*c).map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(GroupKey)
    }
}

/// Partition events by entity key, preserving corpus order within a group.
pub fn group_events<'a>(
    events: impl IntoIterator<Item = &'a NormalizedEvent>,
    columns: &[Column],
) -> BTreeMap<GroupKey, Vec<&'a NormalizedEvent>> {
    let mut groups: BTreeMap<GroupKey, Vec<&'a NormalizedEvent>> = BTreeMap::new();
    for event in events {
        if let Some(key) = GroupKey::extract(event, columns) {
            groups.entry(key).or_default().push(event);
        }
    }
    groups
}

// =============================================================================
// Chronological ordering
// =============================================================================

/// An event paired with its parsed timestamp.
#[derive(Debug, Clone, Copy)]
pub struct Timed<'a> {
    pub at: DateTime<Utc>,
    pub event: &'a NormalizedEvent,
}

/// Sort a group by timestamp. The sort is stable, so events sharing a
/// timestamp stay in corpus order. An unparseable timestamp is a rule
/// failure: ordering and "first seen" would otherwise be wrong silently.
pub fn sort_chronologically<'a>(
    events: &[&'a NormalizedEvent],
) -> Result<Vec<Timed<'a>>, RuleFailure> {
    let mut timed = events
        .iter()
        .map(|event| {
            event
                .instant()
                .map(|at| Timed { at, event })
                .ok_or_else(|| {
                    RuleFailure::new(
                        Stage::Group,
                        format!("cannot parse @timestamp '{}'", event.timestamp),
                    )
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    timed.sort_by_key(|t| t.at);
    Ok(timed)
}

// =============================================================================
// Evidence helpers
// =============================================================================

/// Project an event onto a few columns for an evidence sample. Missing
/// values become JSON null; the raw payload is never included.
pub fn project(event: &NormalizedEvent, columns: &[Column]) -> Map<String, Value> {
    columns
        .iter()
        .filter(|c| **c != Column::Raw)
        .map(|c| {
            let value = event
                .get(*c)
                .map(|s| Value::String(s.to_string()))
                .unwrap_or(Value::Null);
            (c.as_str().to_string(), value)
        })
        .collect()
}

/// The first `max` events of a sorted group, projected.
pub fn samples(group: &[Timed<'_>], columns: &[Column], max: usize) -> Vec<Map<String, Value>> {
    group
        .iter()
        .take(max)
        .map(|t| project(t.event, columns))
        .collect()
}

/// Case-insensitive suffix match against any of the (already lower-cased)
/// suffixes.
pub fn ends_with_any(value: &str, suffixes_lc: &[String]) -> bool {
    let value = value.to_lowercase();
    suffixes_lc.iter().any(|s| value.ends_with(s.as_str()))
}
