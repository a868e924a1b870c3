mod helpers;

use helpers::{logon_failure, process_access, script_block};
use socbox_detect::{
    DetectError, DetectionConfig, Engine, Stage, parse_detection_config,
    parse_detection_config_file, run,
};
use socbox_ingest::{Corpus, NormalizedEvent};
use std::io::Write;

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn unknown_rule_is_configuration_error() {
    let corpus = Corpus::new(vec![process_access(
        "2024-03-01T10:00:00Z",
        "WS01",
        "alice",
        "procdump.exe",
        "C:\\Windows\\System32\\lsass.exe",
    )]);
    let err = run(&corpus, &DetectionConfig::new(["unknown_rule_id"])).unwrap_err();
    assert!(err.is_configuration_error());
    assert!(err.to_string().contains("unknown_rule_id"));
}

#[test]
fn unknown_rule_after_valid_rule_still_aborts() {
    let config = parse_detection_config("enabled: [brute_force_auth, lateral_movement]").unwrap();
    let err = Engine::from_config(&config).unwrap_err();
    assert!(matches!(err, DetectError::UnknownRule(ref id) if id == "lateral_movement"));
}

#[test]
fn rule_ids_are_case_sensitive() {
    let config = DetectionConfig::new(["Suspicious_Process_Access"]);
    assert!(matches!(
        Engine::from_config(&config),
        Err(DetectError::UnknownRule(_))
    ));
}

#[test]
fn invalid_parameter_block() {
    let yaml = r#"
enabled: [suspicious_script_content]
parameters:
  suspicious_script_content:
    keywords: []
"#;
    let config = parse_detection_config(yaml).unwrap();
    let err = Engine::from_config(&config).unwrap_err();
    assert!(err.is_configuration_error());
    assert!(matches!(
        err,
        DetectError::InvalidParameters { ref rule_id, .. } if rule_id == "suspicious_script_content"
    ));
}

#[test]
fn parameters_of_disabled_rules_are_not_validated() {
    let yaml = r#"
enabled: [suspicious_process_access]
parameters:
  brute_force_auth:
    window_minutes: -5
"#;
    let config = parse_detection_config(yaml).unwrap();
    assert!(Engine::from_config(&config).is_ok());
}

#[test]
fn null_parameter_block_means_defaults() {
    let yaml = "enabled: [brute_force_auth]\nparameters:\n  brute_force_auth:\n";
    let config = parse_detection_config(yaml).unwrap();
    assert_eq!(Engine::from_config(&config).unwrap().rule_count(), 1);
}

#[test]
fn malformed_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "enabled: {{ not: a list }}").unwrap();
    let err = parse_detection_config_file(file.path()).unwrap_err();
    assert!(matches!(err, DetectError::Config(_)));
}

// =============================================================================
// Rule execution errors
// =============================================================================

#[test]
fn unparseable_timestamp_in_matching_group_fails_loudly() {
    let corpus = Corpus::new(vec![
        logon_failure("2024-03-01T10:00:00Z", "bob", "10.0.0.5"),
        logon_failure("yesterday", "bob", "10.0.0.5"),
    ]);
    let yaml =
        "enabled: [brute_force_auth]\nparameters:\n  brute_force_auth:\n    failures_threshold: 2\n";
    let config = parse_detection_config(yaml).unwrap();
    let err = run(&corpus, &config).unwrap_err();
    assert!(!err.is_configuration_error());
    match err {
        DetectError::RuleExecution {
            rule_id,
            stage,
            message,
        } => {
            assert_eq!(rule_id, "brute_force_auth");
            assert_eq!(stage, Stage::Group);
            assert!(message.contains("yesterday"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn failing_rule_aborts_the_whole_run() {
    let corpus = Corpus::new(vec![
        process_access("2024-03-01T10:00:00Z", "WS01", "alice", "procdump.exe", "lsass.exe"),
        script_block("not-a-time", "WS01", "alice", "bypass"),
    ]);
    let config = DetectionConfig::new(["suspicious_process_access", "suspicious_script_content"]);
    let err = run(&corpus, &config).unwrap_err();
    assert!(matches!(
        err,
        DetectError::RuleExecution { ref rule_id, .. } if rule_id == "suspicious_script_content"
    ));
}

#[test]
fn bad_timestamps_outside_any_group_are_ignored() {
    let mut stray = NormalizedEvent::at("garbage");
    stray.message = Some("unrelated".into());
    let corpus = Corpus::new(vec![
        stray,
        script_block("2024-03-01T10:00:00Z", "WS01", "alice", "bypass"),
    ]);
    let alerts = run(&corpus, &DetectionConfig::new(["suspicious_script_content"])).unwrap();
    assert_eq!(alerts.len(), 1);
}
