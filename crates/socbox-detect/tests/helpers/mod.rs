#![allow(dead_code)]

use socbox_detect::{Alert, DetectionConfig, Engine, parse_detection_config};
use socbox_ingest::{Column, Corpus, NormalizedEvent};

pub fn engine_from_yaml(yaml: &str) -> Engine {
    let config = parse_detection_config(yaml).unwrap();
    Engine::from_config(&config).unwrap()
}

pub fn detect(yaml: &str, events: Vec<NormalizedEvent>) -> Vec<Alert> {
    engine_from_yaml(yaml).run(&Corpus::new(events)).unwrap()
}

pub fn detect_all(events: Vec<NormalizedEvent>) -> Vec<Alert> {
    let config = DetectionConfig::new([
        "suspicious_process_access",
        "suspicious_script_content",
        "brute_force_auth",
    ]);
    Engine::from_config(&config)
        .unwrap()
        .run(&Corpus::new(events))
        .unwrap()
}

pub fn process_access(
    ts: &str,
    host: &str,
    user: &str,
    source: &str,
    target: &str,
) -> NormalizedEvent {
    let mut e = NormalizedEvent::at(ts);
    e.dataset = Some("sysmon".into());
    e.category = Some("process".into());
    e.action = Some("10".into());
    e.host_name = Some(host.into());
    e.user_name = Some(user.into());
    e.process_name = Some(source.into());
    e.process_target = Some(target.into());
    e.granted_access = Some("0x1410".into());
    e
}

pub fn script_block(ts: &str, host: &str, user: &str, message: &str) -> NormalizedEvent {
    let mut e = NormalizedEvent::at(ts);
    e.dataset = Some("powershell".into());
    e.action = Some("4104".into());
    e.host_name = Some(host.into());
    e.user_name = Some(user.into());
    e.process_name = Some("powershell.exe".into());
    e.message = Some(message.into());
    e
}

pub fn logon_failure(ts: &str, user: &str, source_ip: &str) -> NormalizedEvent {
    let mut e = NormalizedEvent::at(ts);
    e.dataset = Some("security".into());
    e.category = Some("auth".into());
    e.action = Some("4625".into());
    e.outcome = Some("failure".into());
    e.host_name = Some("DC01".into());
    e.user_name = Some(user.into());
    e.source_ip = Some(source_ip.into());
    e
}

/// A corpus whose schema lacks `column`.
pub fn corpus_without(column: Column, events: Vec<NormalizedEvent>) -> Corpus {
    let columns = Column::ALL.iter().copied().filter(|c| *c != column);
    Corpus::with_columns(columns, events)
}
