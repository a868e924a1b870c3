//! In-memory event corpus.
//!
//! A `Corpus` is a read-only table of normalized events plus its schema: the
//! set of columns that appear in at least one row. Detection rules consult the
//! schema before touching the rows, so a corpus produced from a source that
//! only fills part of the canonical schema degrades to "no data" rather than
//! to an error.

use std::collections::BTreeSet;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde_json::Value;

use crate::error::{IngestError, Result};
use crate::schema::{Column, NormalizedEvent};

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    events: Vec<NormalizedEvent>,
    columns: BTreeSet<Column>,
}

impl Corpus {
    /// Build a corpus from fully-typed events. A non-empty corpus built this
    /// way carries every canonical column; an empty one carries none.
    pub fn new(events: Vec<NormalizedEvent>) -> Self {
        let columns = if events.is_empty() {
            BTreeSet::new()
        } else {
            Column::ALL.into_iter().collect()
        };
        Corpus { events, columns }
    }

    /// Build a corpus with an explicit (possibly partial) schema.
    ///
    /// `@timestamp` is always part of the schema of a non-empty corpus.
    pub fn with_columns(
        columns: impl IntoIterator<Item = Column>,
        events: Vec<NormalizedEvent>,
    ) -> Self {
        let mut columns: BTreeSet<Column> = columns.into_iter().collect();
        if !events.is_empty() {
            columns.insert(Column::Timestamp);
        }
        Corpus { events, columns }
    }

    /// Parse newline-delimited JSON events.
    pub fn from_ndjson_str(input: &str) -> Result<Self> {
        Self::from_ndjson_reader(input.as_bytes())
    }

    /// Read a newline-delimited JSON events file.
    pub fn from_ndjson_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|source| IngestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let corpus = Self::from_ndjson_reader(BufReader::new(file))?;
        tracing::debug!(
            path = %path.display(),
            events = corpus.len(),
            columns = corpus.columns.len(),
            "loaded event corpus"
        );
        Ok(corpus)
    }

    /// Read newline-delimited JSON events from any buffered reader.
    ///
    /// Blank lines are skipped. The schema is the union of recognized keys
    /// across all rows, whether or not their values are null.
    pub fn from_ndjson_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut events = Vec::new();
        let mut columns = BTreeSet::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_num = idx + 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line).map_err(|source| IngestError::Json {
                line: line_num,
                source,
            })?;
            let obj = value
                .as_object()
                .ok_or(IngestError::NotAnObject { line: line_num })?;
            if !obj.get("@timestamp").is_some_and(Value::is_string) {
                return Err(IngestError::MissingTimestamp { line: line_num });
            }
            columns.extend(obj.keys().filter_map(|k| Column::from_name(k)));

            let event: NormalizedEvent =
                serde_json::from_value(value).map_err(|source| IngestError::Json {
                    line: line_num,
                    source,
                })?;
            events.push(event);
        }

        Ok(Corpus { events, columns })
    }

    /// Write the events as newline-delimited JSON.
    pub fn write_ndjson<W: Write>(&self, mut writer: W) -> Result<()> {
        for event in &self.events {
            serde_json::to_writer(&mut writer, event).map_err(IngestError::Document)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn columns(&self) -> &BTreeSet<Column> {
        &self.columns
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains(&column)
    }

    /// True when every listed column is part of the schema.
    pub fn has_columns(&self, required: &[Column]) -> bool {
        required.iter().all(|c| self.columns.contains(c))
    }

    /// Required columns absent from the schema, in the order given.
    pub fn missing_columns(&self, required: &[Column]) -> Vec<Column> {
        required
            .iter()
            .copied()
            .filter(|c| !self.columns.contains(c))
            .collect()
    }
}

impl FromIterator<NormalizedEvent> for Corpus {
    fn from_iter<I: IntoIterator<Item = NormalizedEvent>>(iter: I) -> Self {
        Corpus::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_corpus_has_no_columns() {
        let corpus = Corpus::new(Vec::new());
        assert!(corpus.is_empty());
        assert!(corpus.columns().is_empty());
        assert!(!corpus.has_column(Column::Timestamp));
    }

    #[test]
    fn test_typed_corpus_has_every_column() {
        let corpus = Corpus::new(vec![NormalizedEvent::at("2024-01-01T00:00:00Z")]);
        assert!(corpus.has_columns(&Column::ALL));
    }

    #[test]
    fn test_with_columns_always_keeps_timestamp() {
        let corpus = Corpus::with_columns(
            [Column::UserName],
            vec![NormalizedEvent::at("2024-01-01T00:00:00Z")],
        );
        assert!(corpus.has_column(Column::Timestamp));
        assert!(corpus.has_column(Column::UserName));
        assert_eq!(
            corpus.missing_columns(&[Column::UserName, Column::HostName, Column::Message]),
            vec![Column::HostName, Column::Message]
        );
    }

    #[test]
    fn test_ndjson_schema_is_union_of_keys() {
        let input = r#"
{"@timestamp": "2024-01-01T00:00:00Z", "user.name": "alice"}

{"@timestamp": "2024-01-01T00:00:01Z", "host.name": null, "custom.field": 1}
"#;
        let corpus = Corpus::from_ndjson_str(input).unwrap();
        assert_eq!(corpus.len(), 2);
        let cols: Vec<Column> = corpus.columns().iter().copied().collect();
        assert_eq!(
            cols,
            vec![Column::Timestamp, Column::HostName, Column::UserName]
        );
        assert_eq!(corpus.events()[1].host_name, None);
    }

    #[test]
    fn test_ndjson_missing_timestamp() {
        let input = "{\"@timestamp\": \"2024-01-01T00:00:00Z\"}\n{\"user.name\": \"bob\"}\n";
        let err = Corpus::from_ndjson_str(input).unwrap_err();
        assert!(matches!(err, IngestError::MissingTimestamp { line: 2 }));
    }

    #[test]
    fn test_ndjson_null_timestamp_is_missing() {
        let err = Corpus::from_ndjson_str("{\"@timestamp\": null}").unwrap_err();
        assert!(matches!(err, IngestError::MissingTimestamp { line: 1 }));
    }

    #[test]
    fn test_ndjson_invalid_json_reports_line() {
        let err = Corpus::from_ndjson_str("{\"@timestamp\": \"x\"}\n{nope").unwrap_err();
        assert!(matches!(err, IngestError::Json { line: 2, .. }));
    }

    #[test]
    fn test_ndjson_rejects_non_object() {
        let err = Corpus::from_ndjson_str("[1, 2]").unwrap_err();
        assert!(matches!(err, IngestError::NotAnObject { line: 1 }));
    }

    #[test]
    fn test_write_ndjson() {
        let mut event = NormalizedEvent::at("2024-01-01T00:00:00Z");
        event.user_name = Some("alice".into());
        let corpus = Corpus::new(vec![event.clone(), event]);

        let mut out = Vec::new();
        corpus.write_ndjson(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 2);

        let reread = Corpus::from_ndjson_str(&text).unwrap();
        assert_eq!(reread.events(), corpus.events());
        assert!(reread.has_columns(&Column::ALL));
    }
}
