//! Entity pivots for alert triage.

use serde::Serialize;
use socbox_ingest::{Corpus, NormalizedEvent, format_timestamp};

/// Exact-match filters on entity columns. Unset filters match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilter {
    pub user: Option<String>,
    pub host: Option<String>,
    pub source_ip: Option<String>,
}

impl EntityFilter {
    pub fn matches(&self, event: &NormalizedEvent) -> bool {
        fn check(filter: &Option<String>, value: &Option<String>) -> bool {
            filter.as_ref().is_none_or(|f| value.as_ref() == Some(f))
        }
        check(&self.user, &event.user_name)
            && check(&self.host, &event.host_name)
            && check(&self.source_ip, &event.source_ip)
    }
}

/// Activity summary for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityContext {
    pub events_count: usize,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
}

/// Count the corpus events matching `filter` and report the earliest and
/// latest of their timestamps. Events with unparseable timestamps are
/// counted but do not move `first_seen`/`last_seen`.
pub fn entity_context(corpus: &Corpus, filter: &EntityFilter) -> EntityContext {
    let mut events_count = 0;
    let mut first = None;
    let mut last = None;
    for event in corpus.events().iter().filter(|e| filter.matches(e)) {
        events_count += 1;
        if let Some(at) = event.instant() {
            first = Some(first.map_or(at, |f: chrono::DateTime<chrono::Utc>| f.min(at)));
            last = Some(last.map_or(at, |l: chrono::DateTime<chrono::Utc>| l.max(at)));
        }
    }
    EntityContext {
        events_count,
        first_seen: first.as_ref().map(format_timestamp),
        last_seen: last.as_ref().map(format_timestamp),
    }
}
