//! Repeated authentication failures for one entity inside a sliding window.
//!
//! Per entity, failures are walked in time order while a queue holds the
//! failures of the window ending at the current one, `(t - window, t]`.
//! The densest such window (earliest on ties) is the peak. An entity fires
//! once for the whole batch when its peak reaches `failures_threshold`.

use std::collections::VecDeque;

use chrono::Duration;
use socbox_ingest::{Column, Corpus, format_timestamp};

use crate::alert::{Alert, Entities, Evidence, Severity};
use crate::error::RuleFailure;
use crate::params::{AuthFailureParams, AuthGrouping};
use crate::registry::RuleId;
use crate::rules::{Timed, group_events, samples, sort_chronologically};

const SAMPLE_COLUMNS: [Column; 6] = [
    Column::Timestamp,
    Column::HostName,
    Column::UserName,
    Column::SourceIp,
    Column::Action,
    Column::Outcome,
];

impl AuthGrouping {
    fn columns(&self) -> [Column; 2] {
        match self {
            AuthGrouping::UserSourceIp => [Column::UserName, Column::SourceIp],
            AuthGrouping::HostUser => [Column::HostName, Column::UserName],
        }
    }

    fn roles(&self) -> [&'static str; 2] {
        match self {
            AuthGrouping::UserSourceIp => ["user", "source_ip"],
            AuthGrouping::HostUser => ["host", "user"],
        }
    }
}

/// The densest window found in one entity's failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeakWindow {
    /// Index of the first failure in the window.
    pub start: usize,
    /// Index of the last failure in the window (inclusive).
    pub end: usize,
}

impl PeakWindow {
    pub fn count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Find the peak window over chronologically sorted failures. Returns
/// `None` for an empty slice.
pub fn peak_window(failures: &[Timed<'_>], window: Duration) -> Option<PeakWindow> {
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut peak: Option<PeakWindow> = None;

    for (idx, failure) in failures.iter().enumerate() {
        queue.push_back(idx);
        while let Some(&front) = queue.front() {
            if failure.at - failures[front].at >= window {
                queue.pop_front();
            } else {
                break;
            }
        }
        let start = queue.front().copied().unwrap_or(idx);
        let candidate = PeakWindow { start, end: idx };
        if peak.is_none_or(|p| candidate.count() > p.count()) {
            peak = Some(candidate);
        }
    }
    peak
}

#[derive(Debug, Clone)]
pub struct RepeatedAuthFailure {
    params: AuthFailureParams,
    /// Lower-cased copy of `params.failure_outcomes`.
    outcomes: Vec<String>,
}

impl RepeatedAuthFailure {
    pub const TITLE: &'static str = "Repeated authentication failures";

    pub fn new(params: AuthFailureParams) -> Self {
        let outcomes = params
            .failure_outcomes
            .iter()
            .map(|o| o.to_lowercase())
            .collect();
        RepeatedAuthFailure { params, outcomes }
    }

    pub fn params(&self) -> &AuthFailureParams {
        &self.params
    }

    pub fn required_columns(&self) -> Vec<Column> {
        let mut columns = vec![Column::Timestamp, Column::Outcome];
        columns.extend(self.params.group_by.columns());
        columns
    }

    pub fn evaluate(&self, corpus: &Corpus) -> Result<Vec<Alert>, RuleFailure> {
        let window = Duration::minutes(i64::from(self.params.window_minutes));
        let grouping = self.params.group_by;

        let failures = corpus.events().iter().filter(|e| {
            e.outcome
                .as_deref()
                .is_some_and(|o| self.outcomes.contains(&o.to_lowercase()))
        });

        let mut alerts = Vec::new();
        for (key, group) in group_events(failures, &grouping.columns()) {
            if group.len() < self.params.failures_threshold {
                continue;
            }
            let sorted = sort_chronologically(&group)?;
            let Some(peak) = peak_window(&sorted, window) else {
                continue;
            };
            if peak.count() < self.params.failures_threshold {
                continue;
            }
            let in_window = &sorted[peak.start..=peak.end];
            tracing::trace!(
                entity = ?key.0,
                peak = peak.count(),
                total = sorted.len(),
                "authentication failure threshold reached"
            );

            let evidence = Evidence::new(
                peak.count(),
                samples(in_window, &SAMPLE_COLUMNS, self.params.max_samples),
            )
            .with("window_minutes", self.params.window_minutes)
            .with("window_start", format_timestamp(&in_window[0].at))
            .with("window_end", format_timestamp(&in_window[in_window.len() - 1].at))
            .with("total_failures", sorted.len());

            alerts.push(Alert {
                rule_id: RuleId::BruteForceAuth.as_str().to_string(),
                severity: Severity::High,
                title: Self::TITLE.to_string(),
                timestamp: in_window[0].event.timestamp.clone(),
                entities: Entities::from_roles(&grouping.roles(), key.0.as_slice()),
                evidence,
            });
        }
        Ok(alerts)
    }
}
