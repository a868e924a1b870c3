//! Access to a sensitive process, such as a credential store being opened by
//! another process (Sysmon event 10 against `lsass.exe`).

use socbox_ingest::{Column, Corpus};

use crate::alert::{Alert, Entities, Evidence, Severity};
use crate::error::RuleFailure;
use crate::params::ProcessAccessParams;
use crate::registry::RuleId;
use crate::rules::{ends_with_any, group_events, samples, sort_chronologically};

const GROUP_COLUMNS: [Column; 4] = [
    Column::HostName,
    Column::UserName,
    Column::ProcessName,
    Column::ProcessTarget,
];

const ENTITY_ROLES: [&str; 4] = ["host", "user", "source_process", "target_process"];

const SAMPLE_COLUMNS: [Column; 4] = [
    Column::Timestamp,
    Column::ProcessName,
    Column::ProcessTarget,
    Column::GrantedAccess,
];

#[derive(Debug, Clone)]
pub struct SensitiveProcessAccess {
    params: ProcessAccessParams,
    /// Lower-cased copy of `params.target_processes`.
    suffixes: Vec<String>,
}

impl SensitiveProcessAccess {
    pub const TITLE: &'static str = "Suspicious ProcessAccess to sensitive target process";

    pub fn new(params: ProcessAccessParams) -> Self {
        let suffixes = params
            .target_processes
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        SensitiveProcessAccess { params, suffixes }
    }

    pub fn params(&self) -> &ProcessAccessParams {
        &self.params
    }

    pub fn required_columns(&self) -> Vec<Column> {
        vec![
            Column::Timestamp,
            Column::Action,
            Column::ProcessName,
            Column::ProcessTarget,
            Column::HostName,
            Column::UserName,
        ]
    }

    pub fn evaluate(&self, corpus: &Corpus) -> Result<Vec<Alert>, RuleFailure> {
        let hits = corpus.events().iter().filter(|e| {
            e.action.as_deref() == Some(self.params.action_code.as_str())
                && e
                    .process_target
                    .as_deref()
                    .is_some_and(|target| ends_with_any(target, &self.suffixes))
        });

        let mut alerts = Vec::new();
        for (key, group) in group_events(hits, &GROUP_COLUMNS) {
            if group.len() < self.params.min_events {
                continue;
            }
            let sorted = sort_chronologically(&group)?;
            alerts.push(Alert {
                rule_id: RuleId::SuspiciousProcessAccess.as_str().to_string(),
                severity: Severity::High,
                title: Self::TITLE.to_string(),
                timestamp: sorted[0].event.timestamp.clone(),
                entities: Entities::from_roles(&ENTITY_ROLES, key.0.as_slice()),
                evidence: Evidence::new(
                    group.len(),
                    samples(&sorted, &SAMPLE_COLUMNS, self.params.max_samples),
                ),
            });
        }
        Ok(alerts)
    }
}
