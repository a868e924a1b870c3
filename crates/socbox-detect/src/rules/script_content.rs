//! Script-block telemetry (PowerShell 4104) containing tradecraft keywords.

use serde_json::Value;
use socbox_ingest::{Column, Corpus};

use crate::alert::{Alert, Entities, Evidence, Severity};
use crate::error::RuleFailure;
use crate::params::ScriptContentParams;
use crate::registry::RuleId;
use crate::rules::{Timed, group_events, samples, sort_chronologically};

const GROUP_COLUMNS: [Column; 2] = [Column::HostName, Column::UserName];

const ENTITY_ROLES: [&str; 2] = ["host", "user"];

const SAMPLE_COLUMNS: [Column; 4] = [
    Column::Timestamp,
    Column::Action,
    Column::ProcessName,
    Column::Message,
];

/// Messages scanned for `keywords_observed`.
const KEYWORD_SCAN_LIMIT: usize = 50;
const MAX_KEYWORDS_OBSERVED: usize = 10;
/// Sampled messages are cut to this many characters.
const MAX_SAMPLE_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone)]
pub struct SuspiciousScriptContent {
    params: ScriptContentParams,
    /// Configured keywords paired with their lower-cased form, deduplicated
    /// case-insensitively, in configuration order.
    keywords: Vec<(String, String)>,
}

impl SuspiciousScriptContent {
    pub const TITLE: &'static str = "Suspicious script content";

    pub fn new(params: ScriptContentParams) -> Self {
        let mut keywords: Vec<(String, String)> = Vec::new();
        for keyword in &params.keywords {
            let lower = keyword.to_lowercase();
            if !keywords.iter().any(|(_, seen)| *seen == lower) {
                keywords.push((keyword.clone(), lower));
            }
        }
        SuspiciousScriptContent { params, keywords }
    }

    pub fn params(&self) -> &ScriptContentParams {
        &self.params
    }

    pub fn required_columns(&self) -> Vec<Column> {
        vec![
            Column::Timestamp,
            Column::Action,
            Column::Message,
            Column::HostName,
            Column::UserName,
        ]
    }

    /// Number of distinct configured keywords contained in the message.
    pub fn keyword_hits(&self, message: &str) -> usize {
        let message = message.to_lowercase();
        self.keywords
            .iter()
            .filter(|(_, kw)| message.contains(kw.as_str()))
            .count()
    }

    pub fn evaluate(&self, corpus: &Corpus) -> Result<Vec<Alert>, RuleFailure> {
        let hits = corpus.events().iter().filter(|e| {
            e.action
                .as_deref()
                .is_some_and(|a| self.params.event_codes.iter().any(|c| c == a))
                && e
                    .message
                    .as_deref()
                    .is_some_and(|m| self.keyword_hits(m) >= self.params.min_keyword_hits)
        });

        let mut alerts = Vec::new();
        for (key, group) in group_events(hits, &GROUP_COLUMNS) {
            if group.len() < self.params.min_events {
                continue;
            }
            let sorted = sort_chronologically(&group)?;

            let mut sampled = samples(&sorted, &SAMPLE_COLUMNS, self.params.max_samples);
            for sample in &mut sampled {
                if let Some(Value::String(message)) = sample.get_mut(Column::Message.as_str()) {
                    truncate_chars(message, MAX_SAMPLE_MESSAGE_CHARS);
                }
            }

            let evidence = Evidence::new(group.len(), sampled)
                .with("keywords_observed", self.keywords_observed(&sorted))
                .with("min_keyword_hits", self.params.min_keyword_hits);

            alerts.push(Alert {
                rule_id: RuleId::SuspiciousScriptContent.as_str().to_string(),
                severity: Severity::Medium,
                title: Self::TITLE.to_string(),
                timestamp: sorted[0].event.timestamp.clone(),
                entities: Entities::from_roles(&ENTITY_ROLES, key.0.as_slice()),
                evidence,
            });
        }
        Ok(alerts)
    }

    /// Configured keywords seen in the group's first messages, in
    /// configuration order.
    fn keywords_observed(&self, group: &[Timed<'_>]) -> Vec<String> {
        let messages: Vec<String> = group
            .iter()
            .filter_map(|t| t.event.message.as_deref())
            .take(KEYWORD_SCAN_LIMIT)
            .map(str::to_lowercase)
            .collect();
        self.keywords
            .iter()
            .filter(|(_, kw)| messages.iter().any(|m| m.contains(kw.as_str())))
            .map(|(original, _)| original.clone())
            .take(MAX_KEYWORDS_OBSERVED)
            .collect()
    }
}

fn truncate_chars(s: &mut String, max: usize) {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
        s.push_str("...");
    }
}
