use std::io::{self, Write};

use serde::Serialize;
use tracing::{debug, info};

use crate::app::{CheckSummary, ProgressEvent, ProgressSink, RunSummary};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Human,
    Json,
}

pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => debug!("{}", event.message),
        }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &RunSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

pub fn print_summary(summary: &RunSummary) {
    println!("{CYAN}asm-track {} ({}){RESET}", summary.run_date, summary.project_root);
    if let Some(discovery) = &summary.discovery {
        println!(
            "{GREEN}discovered: {}{RESET}  notes: {}",
            discovery.discovered, discovery.notes
        );
    }
    if let Some(ingest) = &summary.ingest {
        println!(
            "{GREEN}ingested: {} submissions, {} rows{RESET}",
            ingest.ingested.len(),
            ingest.rows_added
        );
        for rejected in &ingest.rejected {
            println!("{YELLOW}  rejected {}: {}{RESET}", rejected.name, rejected.reason);
        }
    }
    for (stage, check) in [
        ("public in ENA", &summary.release),
        ("linked", &summary.linkage),
        ("public in NCBI", &summary.mirror),
    ] {
        if let Some(check) = check {
            print_check(stage, check);
        }
    }
    if let Some(phases) = &summary.phases {
        println!("{CYAN}phases{RESET}");
        println!("  releasing sequences: {}", phases.releasing_sequences);
        println!("  processing at NCBI:  {}", phases.processing_at_ncbi);
        println!("  releasing GCAs:      {}", phases.releasing_gcas);
        println!("{GREEN}  public:              {}{RESET}", phases.public);
        if phases.duplicate_names > 0 {
            println!("{YELLOW}  duplicate names:     {}{RESET}", phases.duplicate_names);
        }
    }
    println!("ledger rows: {}", summary.ledger_rows);
}

fn print_check(stage: &str, check: &CheckSummary) {
    println!(
        "{GREEN}{stage}: {} of {} updated{RESET}, {} left for next run",
        check.updated, check.examined, check.unresolved
    );
    if check.reference_errors > 0 {
        println!("{YELLOW}  reference table gaps: {}{RESET}", check.reference_errors);
    }
    if check.unverified > 0 {
        println!("{YELLOW}  accepted without project/sample: {}{RESET}", check.unverified);
    }
    for error in &check.status_errors {
        let status = error
            .status
            .map(|status| status.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{YELLOW}  {} [{status}] {}{RESET}", error.key, error.message);
    }
}
