//! # socbox-detect
//!
//! Batch detection engine for normalized security telemetry.
//!
//! This crate consumes the [`Corpus`](socbox_ingest::Corpus) produced by
//! [`socbox_ingest`] and evaluates a configured set of detection rules
//! against it, producing grouped, evidenced [`Alert`]s.
//!
//! ## Architecture
//!
//! - **Registry**: a closed, static table mapping rule ids to their builders.
//! - **Parameters**: each rule has a typed parameter block with documented
//!   defaults, validated once when the engine is built.
//! - **Rules**: pure functions of the corpus. Each guards its required
//!   columns, filters, groups by an entity key, applies a threshold and emits
//!   one alert per qualifying group.
//! - **Engine**: runs the enabled rules in order and concatenates their
//!   alerts without reordering, merging or deduplicating them.
//!
//! ## Quick Start
//!
//! ```rust
//! use socbox_detect::{DetectionConfig, run};
//! use socbox_ingest::{Corpus, NormalizedEvent};
//!
//! let mut event = NormalizedEvent::at("2024-03-01T10:00:00Z");
//! event.action = Some("4104".into());
//! event.host_name = Some("WS01".into());
//! event.user_name = Some("alice".into());
//! event.message = Some("IEX (New-Object Net.WebClient).DownloadString('http://x')".into());
//!
//! let corpus = Corpus::new(vec![event]);
//! let config = DetectionConfig::new(["suspicious_script_content"]);
//! let alerts = run(&corpus, &config).unwrap();
//!
//! assert_eq!(alerts.len(), 1);
//! assert_eq!(alerts[0].entities.get("host"), Some("WS01"));
//! ```

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod registry;
pub mod rules;
pub mod triage;

pub use alert::{Alert, Entities, Evidence, Severity, parse_alerts_ndjson};
pub use config::{DetectionConfig, parse_detection_config, parse_detection_config_file};
pub use engine::{Engine, run};
pub use error::{DetectError, Result, RuleFailure, Stage};
pub use params::{
    AuthFailureParams, AuthGrouping, ProcessAccessParams, RuleParams, ScriptContentParams,
};
pub use registry::{RuleEntry, RuleId, entries, lookup};
pub use rules::{CompiledRule, GroupKey};
pub use triage::{EntityContext, EntityFilter, entity_context};
