mod report;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use socbox_detect::{
    Alert, Engine, EntityFilter, entity_context, entries, parse_alerts_ndjson,
    parse_detection_config_file,
};
use socbox_ingest::{Corpus, RecordSet, normalize_records, read_records, read_records_dir};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "socbox")]
#[command(about = "Normalize security telemetry, run detections and render case reports")]
#[command(version)]
struct Cli {
    /// Log filter for diagnostics on stderr (e.g. `info`, `socbox_detect=debug`)
    #[arg(long, global = true, env = "SOCBOX_LOG", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize raw JSON / NDJSON records into canonical events
    ///
    /// INPUT may be a single file or a directory (searched recursively for
    /// .json and .jsonl files). Events are written as NDJSON, sorted by time.
    Normalize {
        /// Raw record file or directory
        input: PathBuf,

        /// Dataset name recorded in `event.dataset`
        #[arg(short, long, default_value = "mordor")]
        dataset: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the enabled detection rules over a normalized event corpus
    Detect {
        /// Detection config YAML (`enabled` + `parameters`)
        #[arg(short, long)]
        config: PathBuf,

        /// Normalized events (NDJSON)
        #[arg(short, long)]
        events: PathBuf,

        /// Output file for alerts (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Pretty-print alerts for reading on a terminal. The output is not
        /// NDJSON, so it cannot be passed to `report` or written with `--output`.
        #[arg(short, long, conflicts_with = "output")]
        pretty: bool,
    },

    /// List the registered detection rules
    Rules,

    /// Summarize the activity of an entity in a normalized event corpus
    Context {
        /// Normalized events (NDJSON)
        #[arg(short, long)]
        events: PathBuf,

        #[arg(long)]
        user: Option<String>,

        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        source_ip: Option<String>,
    },

    /// Render one Markdown case file per alert
    Report {
        /// Alerts (NDJSON), as written by `detect`
        #[arg(short, long)]
        alerts: PathBuf,

        /// Directory for the case files
        #[arg(short, long, default_value = "reports/cases")]
        outdir: PathBuf,

        /// Normalized events; adds a triage context section to each case
        #[arg(short, long)]
        events: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Normalize {
            input,
            dataset,
            output,
        } => cmd_normalize(input, dataset, output),
        Commands::Detect {
            config,
            events,
            output,
            pretty,
        } => cmd_detect(config, events, output, pretty),
        Commands::Rules => cmd_rules(),
        Commands::Context {
            events,
            user,
            host,
            source_ip,
        } => cmd_context(events, EntityFilter { user, host, source_ip }),
        Commands::Report {
            alerts,
            outdir,
            events,
        } => cmd_report(alerts, outdir, events),
    }
}

fn init_logging(filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_new(filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_normalize(input: PathBuf, dataset: String, output: Option<PathBuf>) {
    let set = if input.is_dir() {
        match read_records_dir(&input) {
            Ok(set) => set,
            Err(e) => {
                eprintln!("Error reading {}: {e}", input.display());
                process::exit(1);
            }
        }
    } else {
        match read_records(&input) {
            Ok(records) => RecordSet {
                records,
                files: 1,
                errors: Vec::new(),
            },
            Err(e) => {
                eprintln!("Error reading {}: {e}", input.display());
                process::exit(1);
            }
        }
    };

    for err in &set.errors {
        tracing::warn!("{err}");
    }

    let normalized = normalize_records(&set.records, &dataset);
    let corpus = Corpus::new(normalized.events);

    let mut writer = open_output(output.as_deref());
    let written = corpus
        .write_ndjson(&mut writer)
        .map_err(|e| e.to_string())
        .and_then(|()| writer.flush().map_err(|e| e.to_string()));
    if let Err(e) = written {
        eprintln!("Error writing events: {e}");
        process::exit(1);
    }

    tracing::info!(
        files = set.files,
        records = set.records.len(),
        events = corpus.len(),
        skipped = normalized.skipped,
        "normalization complete"
    );
}

fn cmd_detect(config_path: PathBuf, events_path: PathBuf, output: Option<PathBuf>, pretty: bool) {
    let config = match parse_detection_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading {}: {e}", config_path.display());
            process::exit(1);
        }
    };
    let engine = match Engine::from_config(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            process::exit(1);
        }
    };
    let corpus = load_corpus(&events_path);

    tracing::info!(
        rules = engine.rule_count(),
        events = corpus.len(),
        "running detections"
    );

    let alerts = match engine.run(&corpus) {
        Ok(alerts) => alerts,
        Err(e) => {
            eprintln!("Detection failed: {e}");
            process::exit(1);
        }
    };

    let mut writer = open_output(output.as_deref());
    for alert in &alerts {
        write_json(&mut writer, alert, pretty);
    }
    if let Err(e) = writer.flush() {
        eprintln!("Error writing alerts: {e}");
        process::exit(1);
    }

    tracing::info!(alerts = alerts.len(), "detection complete");
}

fn cmd_rules() {
    for entry in entries() {
        let columns: Vec<&str> = entry.default_columns().iter().map(|c| c.as_str()).collect();
        println!("{} [{}]", entry.id, entry.severity);
        println!("  {}", entry.title);
        println!("  {}", entry.description);
        if !entry.aliases.is_empty() {
            println!("  aliases: {}", entry.aliases.join(", "));
        }
        println!("  requires: {}", columns.join(", "));
    }
}

fn cmd_context(events_path: PathBuf, filter: EntityFilter) {
    let corpus = load_corpus(&events_path);
    let context = entity_context(&corpus, &filter);
    let mut stdout = io::stdout().lock();
    write_json(&mut stdout, &context, true);
}

fn cmd_report(alerts_path: PathBuf, outdir: PathBuf, events_path: Option<PathBuf>) {
    let alerts = load_alerts(&alerts_path);
    let corpus = events_path.as_deref().map(load_corpus);

    match report::write_cases(&alerts, &outdir, corpus.as_ref()) {
        Ok(result) => {
            eprintln!(
                "Wrote {} case file(s) to {}",
                result.written.len(),
                outdir.display()
            );
        }
        Err(e) => {
            eprintln!("Error writing reports to {}: {e}", outdir.display());
            process::exit(1);
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn load_corpus(path: &Path) -> Corpus {
    match Corpus::from_ndjson_file(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading events from {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn load_alerts(path: &Path) -> Vec<Alert> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            process::exit(1);
        }
    };
    match parse_alerts_ndjson(&text) {
        Ok(alerts) => alerts,
        Err(e) => {
            eprintln!("Error parsing {}: {e}", path.display());
            process::exit(1);
        }
    }
}

fn open_output(path: Option<&Path>) -> Box<dyn Write> {
    match path {
        Some(path) => match File::create(path) {
            Ok(f) => Box::new(BufWriter::new(f)),
            Err(e) => {
                eprintln!("Error creating {}: {e}", path.display());
                process::exit(1);
            }
        },
        None => Box::new(BufWriter::new(io::stdout().lock())),
    }
}

fn write_json(writer: &mut impl Write, value: &impl serde::Serialize, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    let result = match json {
        Ok(j) => writeln!(writer, "{j}"),
        Err(e) => {
            eprintln!("JSON serialization error: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = result {
        eprintln!("Error writing output: {e}");
        process::exit(1);
    }
}
