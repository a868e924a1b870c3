use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde_json::Value;
use socbox_detect::{Alert, EntityContext, EntityFilter, entity_context};
use socbox_ingest::Corpus;

/// Entity roles that get a triage pivot in case files.
const PIVOT_ROLES: &[&str] = &["host", "user", "source_ip"];

/// Triage context for one entity of an alert.
pub struct Pivot {
    pub role: String,
    pub value: String,
    pub context: EntityContext,
}

/// Result of writing case files.
pub struct ReportResult {
    pub written: Vec<PathBuf>,
}

/// Case file name for the alert at `index` (zero-based) in the alert stream.
pub fn case_file_name(index: usize, alert: &Alert) -> String {
    format!("{:04}-{}.md", index + 1, alert.rule_id)
}

/// Compute triage pivots for the alert's host, user and source address.
pub fn pivots(alert: &Alert, corpus: &Corpus) -> Vec<Pivot> {
    alert
        .entities
        .iter()
        .filter(|(role, _)| PIVOT_ROLES.iter().any(|r| r == role))
        .map(|(role, value)| {
            let mut filter = EntityFilter::default();
            match role {
                "host" => filter.host = Some(value.to_string()),
                "user" => filter.user = Some(value.to_string()),
                _ => filter.source_ip = Some(value.to_string()),
            }
            Pivot {
                role: role.to_string(),
                value: value.to_string(),
                context: entity_context(corpus, &filter),
            }
        })
        .collect()
}

/// Render one alert as a Markdown case document.
pub fn render_case(alert: &Alert, pivots: &[Pivot]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", alert.title);
    out.push('\n');
    let _ = writeln!(out, "- **Rule:** `{}`", alert.rule_id);
    let _ = writeln!(out, "- **Severity:** {}", alert.severity);
    let _ = writeln!(out, "- **First seen:** {}", alert.timestamp);
    out.push('\n');

    out.push_str("## Entities\n\n");
    if alert.entities.is_empty() {
        out.push_str("_none_\n");
    } else {
        out.push_str("| Role | Value |\n|------|-------|\n");
        for (role, value) in alert.entities.iter() {
            let _ = writeln!(out, "| {} | `{}` |", cell(role), cell(value));
        }
    }
    out.push('\n');

    out.push_str("## Evidence\n\n");
    let _ = writeln!(out, "- **Contributing events:** {}", alert.evidence.count);
    for (key, value) in &alert.evidence.extra {
        let _ = writeln!(out, "- **{key}:** {}", inline_value(value));
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "### Samples ({} of {})\n",
        alert.evidence.samples.len(),
        alert.evidence.count
    );
    for sample in &alert.evidence.samples {
        let json = serde_json::to_string_pretty(sample).unwrap_or_default();
        let _ = writeln!(out, "```json\n{json}\n```\n");
    }

    if !pivots.is_empty() {
        out.push_str("## Triage context\n\n");
        out.push_str("| Entity | Value | Events | First seen | Last seen |\n");
        out.push_str("|--------|-------|--------|------------|-----------|\n");
        for p in pivots {
            let _ = writeln!(
                out,
                "| {} | `{}` | {} | {} | {} |",
                cell(&p.role),
                cell(&p.value),
                p.context.events_count,
                p.context.first_seen.as_deref().unwrap_or("-"),
                p.context.last_seen.as_deref().unwrap_or("-"),
            );
        }
    }

    let mut out = out.trim_end().to_string();
    out.push('\n');
    out
}

/// Render every alert into `outdir`, one file per alert.
pub fn write_cases(
    alerts: &[Alert],
    outdir: &Path,
    corpus: Option<&Corpus>,
) -> std::io::Result<ReportResult> {
    std::fs::create_dir_all(outdir)?;
    let mut written = Vec::with_capacity(alerts.len());
    for (index, alert) in alerts.iter().enumerate() {
        let context = corpus.map(|c| pivots(alert, c)).unwrap_or_default();
        let path = outdir.join(case_file_name(index, alert));
        std::fs::write(&path, render_case(alert, &context))?;
        tracing::debug!(path = %path.display(), rule = %alert.rule_id, "case file written");
        written.push(path);
    }
    Ok(ReportResult { written })
}

fn inline_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell(s: &str) -> String {
    s.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;
    use serde_json::{Map, json};
    use socbox_detect::{Entities, Evidence, Severity};
    use socbox_ingest::NormalizedEvent;

    fn alert() -> Alert {
        let mut sample = Map::new();
        sample.insert("@timestamp".into(), json!("2024-03-01T10:00:00Z"));
        sample.insert("process.name".into(), json!("procdump.exe"));
        Alert {
            rule_id: "suspicious_process_access".into(),
            severity: Severity::High,
            title: "Suspicious ProcessAccess to sensitive target process".into(),
            timestamp: "2024-03-01T10:00:00Z".into(),
            entities: Entities::from_roles(&["host", "user"], &["WS01", "alice"]),
            evidence: Evidence::new(3, vec![sample]).with("window_minutes", 10),
        }
    }

    #[test]
    fn case_file_names_are_numbered() {
        assert_eq!(case_file_name(0, &alert()), "0001-suspicious_process_access.md");
        assert_eq!(case_file_name(41, &alert()), "0042-suspicious_process_access.md");
    }

    #[test]
    fn render_without_context() {
        assert_snapshot!(render_case(&alert(), &[]), @r#"
        # Suspicious ProcessAccess to sensitive target process

        - **Rule:** `suspicious_process_access`
        - **Severity:** high
        - **First seen:** 2024-03-01T10:00:00Z

        ## Entities

        | Role | Value |
        |------|-------|
        | host | `WS01` |
        | user | `alice` |

        ## Evidence

        - **Contributing events:** 3
        - **window_minutes:** 10

        ### Samples (1 of 3)

        ```json
        {
          "@timestamp": "2024-03-01T10:00:00Z",
          "process.name": "procdump.exe"
        }
        ```
        "#);
    }

    #[test]
    fn render_with_context() {
        let mut a = NormalizedEvent::at("2024-03-01T09:00:00Z");
        a.host_name = Some("WS01".into());
        a.user_name = Some("alice".into());
        let mut b = NormalizedEvent::at("2024-03-01T11:30:00Z");
        b.host_name = Some("WS01".into());
        b.user_name = Some("bob".into());
        let corpus = Corpus::new(vec![a, b]);

        let alert = alert();
        let rendered = render_case(&alert, &pivots(&alert, &corpus));
        let context = rendered
            .split("## Triage context")
            .nth(1)
            .unwrap_or_default();
        assert_snapshot!(context.trim(), @r"
        | Entity | Value | Events | First seen | Last seen |
        |--------|-------|--------|------------|-----------|
        | host | `WS01` | 2 | 2024-03-01T09:00:00Z | 2024-03-01T11:30:00Z |
        | user | `alice` | 1 | 2024-03-01T09:00:00Z | 2024-03-01T09:00:00Z |
        ");
    }

    #[test]
    fn pipes_in_values_are_escaped() {
        let mut alert = alert();
        alert.entities = Entities::from_roles(&["user"], &["a|b"]);
        assert!(render_case(&alert, &[]).contains("| user | `a\\|b` |"));
    }

    #[test]
    fn write_cases_creates_one_file_per_alert() {
        let dir = tempfile::tempdir().unwrap();
        let outdir = dir.path().join("cases");
        let result = write_cases(&[alert(), alert()], &outdir, None).unwrap();
        assert_eq!(result.written.len(), 2);
        assert!(outdir.join("0002-suspicious_process_access.md").exists());
    }
}
