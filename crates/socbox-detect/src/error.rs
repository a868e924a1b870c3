//! Detection error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the detection engine.
///
/// Unknown rule identifiers and bad parameter blocks are configuration
/// errors and abort the run before any rule executes. Rule failures carry
/// the offending rule id and the evaluation stage; the engine never swallows
/// them into a partial result.
#[derive(Debug, Error)]
pub enum DetectError {
    /// An enabled rule id has no registered implementation.
    #[error("unknown rule id '{0}'")]
    UnknownRule(String),

    /// A rule's parameter block failed to deserialize or validate.
    #[error("invalid parameters for rule '{rule_id}': {message}")]
    InvalidParameters { rule_id: String, message: String },

    /// The detection configuration document is malformed.
    #[error("invalid detection config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rule failed while evaluating the corpus.
    #[error("rule '{rule_id}' failed during {stage}: {message}")]
    RuleExecution {
        rule_id: String,
        stage: Stage,
        message: String,
    },

    /// An alert line could not be parsed.
    #[error("invalid alert on line {line}: {source}")]
    AlertJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl DetectError {
    /// True for errors caused by the detection configuration rather than by
    /// the data or a rule.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            DetectError::UnknownRule(_)
                | DetectError::InvalidParameters { .. }
                | DetectError::Config(_)
        )
    }
}

/// Phase of a rule's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Filter,
    Group,
    Evidence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Filter => "filter",
            Stage::Group => "group",
            Stage::Evidence => "evidence",
        })
    }
}

/// A failure raised inside a rule, before it is tagged with the rule id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleFailure {
    pub stage: Stage,
    pub message: String,
}

impl RuleFailure {
    pub fn new(stage: Stage, message: impl Into<String>) -> Self {
        RuleFailure {
            stage,
            message: message.into(),
        }
    }

    /// Attach the rule id, producing the engine-level error.
    pub fn into_error(self, rule_id: &str) -> DetectError {
        DetectError::RuleExecution {
            rule_id: rule_id.to_string(),
            stage: self.stage,
            message: self.message,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, DetectError>;
