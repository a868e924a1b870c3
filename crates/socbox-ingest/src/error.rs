use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading raw records or building a corpus.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON on line {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid JSON document: {0}")]
    Document(#[source] serde_json::Error),

    #[error("line {line}: event has no '@timestamp' string")]
    MissingTimestamp { line: usize },

    #[error("line {line}: expected a JSON object")]
    NotAnObject { line: usize },

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
