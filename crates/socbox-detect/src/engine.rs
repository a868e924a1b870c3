//! Detection engine: resolves the enabled rules and runs them over a corpus.
//!
//! The `Engine` holds an ordered list of compiled rules. Building it from a
//! [`DetectionConfig`] resolves every rule id and validates every parameter
//! block up front, so a bad configuration fails before any rule executes.

use socbox_ingest::Corpus;

use crate::alert::Alert;
use crate::config::DetectionConfig;
use crate::error::{DetectError, Result};
use crate::registry;
use crate::rules::CompiledRule;

/// The detection engine.
///
/// Rules run sequentially in the order they were added. The output is the
/// concatenation of each rule's alerts, in rule order; nothing is reordered,
/// merged or deduplicated.
///
/// # Example
///
/// ```rust
/// use socbox_detect::{Engine, parse_detection_config};
/// use socbox_ingest::Corpus;
///
/// let config = parse_detection_config(r#"
/// enabled: [suspicious_process_access]
/// parameters:
///   suspicious_process_access:
///     target_processes: ['\lsass.exe']
/// "#).unwrap();
///
/// let corpus = Corpus::from_ndjson_str(r#"{"@timestamp":"2024-03-01T10:00:00Z","event.action":"10","host.name":"WS01","user.name":"alice","process.name":"procdump.exe","process.target":"C:\\Windows\\System32\\lsass.exe"}"#).unwrap();
///
/// let engine = Engine::from_config(&config).unwrap();
/// let alerts = engine.run(&corpus).unwrap();
/// assert_eq!(alerts.len(), 1);
/// assert_eq!(alerts[0].rule_id, "suspicious_process_access");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Engine {
    rules: Vec<CompiledRule>,
}

impl Engine {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Engine { rules: Vec::new() }
    }

    /// Build an engine from a detection config.
    ///
    /// A rule's parameters are looked up under the name used in `enabled`,
    /// then under its canonical id, then under its aliases.
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        let mut engine = Engine::new();
        for name in &config.enabled {
            let entry =
                registry::lookup(name).ok_or_else(|| DetectError::UnknownRule(name.clone()))?;
            let names = std::iter::once(name.as_str())
                .chain(std::iter::once(entry.id.as_str()))
                .chain(entry.aliases.iter().copied());
            engine.add_rule(name, config.parameters_for(names))?;
        }
        Ok(engine)
    }

    /// Resolve a rule by id or alias and add it with the given parameters.
    pub fn add_rule(&mut self, name: &str, parameters: Option<&serde_yaml::Value>) -> Result<()> {
        let entry =
            registry::lookup(name).ok_or_else(|| DetectError::UnknownRule(name.to_string()))?;
        let compiled =
            (entry.build)(parameters).map_err(|message| DetectError::InvalidParameters {
                rule_id: entry.id.as_str().to_string(),
                message,
            })?;
        self.rules.push(compiled);
        Ok(())
    }

    /// Add a pre-compiled rule directly.
    pub fn add_compiled_rule(&mut self, rule: CompiledRule) {
        self.rules.push(rule);
    }

    /// Run every rule over the corpus and concatenate their alerts.
    ///
    /// The first failing rule aborts the run; no partial result is returned.
    pub fn run(&self, corpus: &Corpus) -> Result<Vec<Alert>> {
        let mut alerts = Vec::new();
        for rule in &self.rules {
            let rule_id = rule.id();
            let produced = rule
                .evaluate(corpus)
                .map_err(|failure| failure.into_error(rule_id.as_str()))?;
            tracing::debug!(rule = rule_id.as_str(), alerts = produced.len(), "rule evaluated");
            alerts.extend(produced);
        }
        Ok(alerts)
    }

    /// Number of rules loaded.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Access the compiled rules.
    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }
}

/// Build an engine from `config` and run it over `corpus`.
pub fn run(corpus: &Corpus, config: &DetectionConfig) -> Result<Vec<Alert>> {
    Engine::from_config(config)?.run(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RuleId;
    use socbox_ingest::NormalizedEvent;

    fn lsass_access(ts: &str) -> NormalizedEvent {
        let mut e = NormalizedEvent::at(ts);
        e.action = Some("10".into());
        e.host_name = Some("WS01".into());
        e.user_name = Some("alice".into());
        e.process_name = Some("procdump.exe".into());
        e.process_target = Some("C:\\Windows\\System32\\lsass.exe".into());
        e
    }

    #[test]
    fn test_unknown_rule_fails_before_running() {
        let config = DetectionConfig::new(["suspicious_process_access", "unknown_rule_id"]);
        let err = Engine::from_config(&config).unwrap_err();
        assert!(matches!(err, DetectError::UnknownRule(ref id) if id == "unknown_rule_id"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_invalid_parameters_name_canonical_rule() {
        let config = DetectionConfig::new(["repeated_auth_failure"]).with_parameters(
            "repeated_auth_failure",
            serde_yaml::from_str("window_minutes: 0").unwrap(),
        );
        let err = Engine::from_config(&config).unwrap_err();
        match err {
            DetectError::InvalidParameters { rule_id, message } => {
                assert_eq!(rule_id, "brute_force_auth");
                assert!(message.contains("window_minutes"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_alias_picks_up_canonical_parameters() {
        let config = DetectionConfig::new(["sensitive_process_access"]).with_parameters(
            "suspicious_process_access",
            serde_yaml::from_str("min_events: 2").unwrap(),
        );
        let engine = Engine::from_config(&config).unwrap();
        let corpus = Corpus::new(vec![lsass_access("2024-03-01T10:00:00Z")]);
        assert!(engine.run(&corpus).unwrap().is_empty());
    }

    #[test]
    fn test_duplicates_run_twice() {
        let config =
            DetectionConfig::new(["suspicious_process_access", "sensitive_process_access"]);
        let engine = Engine::from_config(&config).unwrap();
        assert_eq!(engine.rule_count(), 2);
        assert!(engine.rules().iter().all(|r| r.id() == RuleId::SuspiciousProcessAccess));

        let corpus = Corpus::new(vec![lsass_access("2024-03-01T10:00:00Z")]);
        let alerts = engine.run(&corpus).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0], alerts[1]);
    }

    #[test]
    fn test_rule_failure_carries_rule_id() {
        let corpus = Corpus::new(vec![lsass_access("not a time")]);
        let err = run(&corpus, &DetectionConfig::new(["suspicious_process_access"])).unwrap_err();
        match err {
            DetectError::RuleExecution { rule_id, stage, .. } => {
                assert_eq!(rule_id, "suspicious_process_access");
                assert_eq!(stage, crate::error::Stage::Group);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_engine() {
        let corpus = Corpus::new(vec![lsass_access("2024-03-01T10:00:00Z")]);
        assert!(Engine::new().run(&corpus).unwrap().is_empty());
    }
}
