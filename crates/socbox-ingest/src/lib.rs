//! # socbox-ingest
//!
//! Canonical event schema and ingestion for the socbox detection pipeline.
//!
//! - **Schema**: [`NormalizedEvent`], a flat ECS-style record where only the
//!   timestamp is mandatory, and [`Column`], the closed set of recognized
//!   column names.
//! - **Normalization**: raw Windows / Mordor-style JSON records are mapped
//!   onto the schema from ordered lists of candidate source fields.
//! - **Corpus**: [`Corpus`], the read-only table of events (plus its column
//!   set) that detection rules evaluate against.
//!
//! ## Quick Start
//!
//! ```rust
//! use socbox_ingest::{Column, Corpus, normalize_records};
//! use serde_json::json;
//!
//! let records = vec![json!({
//!     "@timestamp": "2020-01-01T00:00:00Z",
//!     "EventID": 4625,
//!     "TargetUserName": "alice",
//!     "IpAddress": "10.0.0.5"
//! })];
//!
//! let normalized = normalize_records(&records, "mordor");
//! let corpus = Corpus::new(normalized.events);
//! assert_eq!(corpus.len(), 1);
//! assert_eq!(corpus.events()[0].get(Column::Outcome), Some("failure"));
//! ```

pub mod corpus;
pub mod error;
pub mod normalize;
pub mod schema;

pub use corpus::Corpus;
pub use error::{IngestError, Result};
pub use normalize::{
    Normalized, RecordSet, normalize_record, normalize_records, parse_records, read_records,
    read_records_dir, sort_events,
};
pub use schema::{Column, NormalizedEvent, format_timestamp, parse_timestamp};
