use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use assembly_tracker::app::Tracker;
use assembly_tracker::config::{Config, ConfigLoader, ResolvedConfig};
use assembly_tracker::domain::Action;
use assembly_tracker::ena::EnaHttpClient;
use assembly_tracker::error::TrackerError;
use assembly_tracker::ledger::DATE_FORMAT;
use assembly_tracker::ncbi::NcbiHttpClient;
use assembly_tracker::output::{self, JsonOutput, LogSink, OutputMode};
use assembly_tracker::store::Workspace;
use assembly_tracker::submissions::{
    AssemblyStatus, PipelineRun, SqliteSubmissionStore, SubmissionStore,
};

#[derive(Parser)]
#[command(name = "asm-track")]
#[command(about = "Track genome assemblies from submission to public release at ENA and NCBI")]
#[command(version, author)]
struct Cli {
    #[arg(
        short,
        long,
        help = "Project whose ledger lives in <workingdir>/<project>-tracking-files/"
    )]
    project: String,

    #[arg(short, long)]
    config: Option<String>,

    #[arg(short, long, default_value = ".")]
    workingdir: Utf8PathBuf,

    #[arg(short, long, value_enum)]
    action: Action,

    #[arg(long, help = "Print the run summary as JSON on stdout")]
    json: bool,

    #[arg(long, help = "Run date (YYYY-MM-DD) stamped on rows released by this run")]
    date: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(tracker) = report.downcast_ref::<TrackerError>() {
            return ExitCode::from(map_exit_code(tracker));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TrackerError) -> u8 {
    match error {
        TrackerError::MissingConfig
        | TrackerError::ConfigRead(_)
        | TrackerError::ConfigParse(_)
        | TrackerError::MissingInput(_)
        | TrackerError::InvalidDate(_) => 2,
        TrackerError::SubmissionStore(_) | TrackerError::EnaHttp(_) | TrackerError::NcbiHttp(_) => {
            3
        }
        TrackerError::LedgerLocked(_) => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let run_date = parse_run_date(cli.date.as_deref())?;
    let config = load_config(cli.config.as_deref(), &cli.workingdir)?;
    let workspace = Workspace::new(&cli.workingdir, &cli.project);
    info!(project = %cli.project, root = %workspace.root(), action = ?cli.action, "starting run");

    let ena = EnaHttpClient::new(&config)?;
    let ncbi = NcbiHttpClient::new(&config)?;
    let tracked_names = config.tracked_names.clone();

    if matches!(cli.action, Action::Sql | Action::All) {
        let database = config
            .database_path
            .as_ref()
            .ok_or_else(|| TrackerError::MissingInput("database.path".to_string()))?;
        let store = SqliteSubmissionStore::open(database)?;
        let tracker = Tracker::new(workspace, tracked_names, ena, ncbi, store);
        execute(&tracker, cli.action, run_date, output_mode)
    } else {
        let tracker = Tracker::new(workspace, tracked_names, ena, ncbi, NopStore);
        execute(&tracker, cli.action, run_date, output_mode)
    }
}

fn execute<S: SubmissionStore>(
    tracker: &Tracker<EnaHttpClient, NcbiHttpClient, S>,
    action: Action,
    run_date: NaiveDate,
    output_mode: OutputMode,
) -> miette::Result<()> {
    match output_mode {
        OutputMode::Json => {
            let summary = tracker.run(action, run_date, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Human => {
            let summary = tracker.run(action, run_date, &LogSink)?;
            output::print_summary(&summary);
        }
    }
    Ok(())
}

fn parse_run_date(value: Option<&str>) -> Result<NaiveDate, TrackerError> {
    match value {
        Some(value) => NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
            .map_err(|_| TrackerError::InvalidDate(value.to_string())),
        None => Ok(Local::now().date_naive()),
    }
}

fn load_config(
    path: Option<&str>,
    workdir: &camino::Utf8Path,
) -> Result<ResolvedConfig, TrackerError> {
    match ConfigLoader::resolve(path, workdir) {
        Err(TrackerError::MissingConfig) => ConfigLoader::resolve_config(
            Config::default(),
            workdir,
            std::env::var("NCBI_API_KEY").ok(),
        ),
        other => other,
    }
}

struct NopStore;

impl SubmissionStore for NopStore {
    fn pipeline_runs(&self, _alias_pattern: &str) -> Result<Vec<PipelineRun>, TrackerError> {
        Err(TrackerError::SubmissionStore(
            "submission store not configured".to_string(),
        ))
    }

    fn assembly_status(&self, _name: &str) -> Result<Vec<AssemblyStatus>, TrackerError> {
        Err(TrackerError::SubmissionStore(
            "submission store not configured".to_string(),
        ))
    }
}
