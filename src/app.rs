use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{AccessionType, Action, Phase};
use crate::ena::EnaClient;
use crate::error::TrackerError;
use crate::journal::{CheckJournal, CheckKind};
use crate::ledger::{Ledger, LedgerRow};
use crate::ncbi::NcbiClient;
use crate::stages::discovery::{
    discover, read_discovered, read_tracked_names, write_discovered, write_notes,
};
use crate::stages::ingest::{IngestReport, ingest};
use crate::stages::linkage::check_linkage;
use crate::stages::mirror::check_mirror;
use crate::stages::release::check_release;
use crate::stages::report::{build_report, write_reports};
use crate::stages::{Progress, StatusError};
use crate::store::Workspace;
use crate::submissions::SubmissionStore;

pub const RELEASE_VALIDATION_FILE: &str = "release_validation.txt";
pub const LINKAGE_VALIDATION_FILE: &str = "linkage_validation.txt";
pub const MIRROR_VALIDATION_FILE: &str = "mirror_validation.txt";

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverySummary {
    pub discovered: usize,
    pub notes: usize,
    pub file: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckSummary {
    pub examined: usize,
    pub updated: usize,
    pub unresolved: usize,
    pub status_errors: Vec<StatusError>,
    pub reference_errors: usize,
    pub unverified: usize,
}

impl CheckSummary {
    fn from_progress(progress: &Progress, examined: usize, status_errors: &[StatusError]) -> Self {
        Self {
            examined,
            updated: progress.updated.len(),
            unresolved: progress.unresolved.len(),
            status_errors: status_errors.to_vec(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseCounts {
    pub releasing_sequences: usize,
    pub processing_at_ncbi: usize,
    pub releasing_gcas: usize,
    pub public: usize,
    pub duplicate_names: usize,
    pub history_appended: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub project_root: String,
    pub run_date: NaiveDate,
    pub discovery: Option<DiscoverySummary>,
    pub ingest: Option<IngestReport>,
    pub release: Option<CheckSummary>,
    pub linkage: Option<CheckSummary>,
    pub mirror: Option<CheckSummary>,
    pub phases: Option<PhaseCounts>,
    pub ledger_rows: usize,
}

pub struct Tracker<E: EnaClient, N: NcbiClient, S: SubmissionStore> {
    workspace: Workspace,
    tracked_names: Option<Utf8PathBuf>,
    ena: E,
    ncbi: N,
    store: S,
}

impl<E: EnaClient, N: NcbiClient, S: SubmissionStore> Tracker<E, N, S> {
    pub fn new(
        workspace: Workspace,
        tracked_names: Option<Utf8PathBuf>,
        ena: E,
        ncbi: N,
        store: S,
    ) -> Self {
        Self {
            workspace,
            tracked_names,
            ena,
            ncbi,
            store,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn run(
        &self,
        action: Action,
        run_date: NaiveDate,
        sink: &dyn ProgressSink,
    ) -> Result<RunSummary, TrackerError> {
        let _lock = self.workspace.lock()?;
        let ledger_path = self.workspace.ledger_path();
        let mut ledger = Ledger::load(&ledger_path)?;
        info!(rows = ledger.len(), path = %ledger_path, "ledger loaded");

        let mut summary = RunSummary {
            project_root: self.workspace.root().to_string(),
            run_date,
            discovery: None,
            ingest: None,
            release: None,
            linkage: None,
            mirror: None,
            phases: None,
            ledger_rows: ledger.len(),
        };

        if matches!(action, Action::Sql | Action::All) {
            summary.discovery = Some(self.discover(&ledger, sink)?);
        }
        if matches!(action, Action::Add | Action::All) {
            let started = Instant::now();
            let submissions = read_discovered(&self.workspace.discovered_path())?;
            let outcome = ingest(&ledger, &submissions, &self.ena, sink);
            ledger = self.persist(&ledger, outcome.ledger)?;
            finished(sink, "ingest", started);
            summary.ingest = Some(outcome.report);
        }
        if matches!(action, Action::Track | Action::All) {
            let (tracked, checks) = self.track(ledger, run_date, sink)?;
            ledger = tracked;
            summary.release = Some(checks.release);
            summary.linkage = Some(checks.linkage);
            summary.mirror = Some(checks.mirror);
            summary.phases = Some(self.report(&ledger, run_date)?);
        }

        summary.ledger_rows = ledger.len();
        Ok(summary)
    }

    fn discover(
        &self,
        ledger: &Ledger,
        sink: &dyn ProgressSink,
    ) -> Result<DiscoverySummary, TrackerError> {
        let started = Instant::now();
        let names_path = self
            .tracked_names
            .as_ref()
            .ok_or_else(|| TrackerError::MissingInput("tracked_names".to_string()))?;
        let tracked = read_tracked_names(names_path)?;
        let report = discover(&tracked, ledger, &self.store, sink);

        let path = self.workspace.discovered_path();
        write_discovered(&path, &report.discovered)?;
        write_notes(&self.workspace.discovery_notes_path(), &report.notes)?;
        finished(sink, "discovery", started);
        info!(
            discovered = report.discovered.len(),
            notes = report.notes.len(),
            "discovery finished"
        );
        Ok(DiscoverySummary {
            discovered: report.discovered.len(),
            notes: report.notes.len(),
            file: path.to_string(),
        })
    }

    fn track(
        &self,
        ledger: Ledger,
        run_date: NaiveDate,
        sink: &dyn ProgressSink,
    ) -> Result<(Ledger, TrackChecks), TrackerError> {
        let journal_path = self.workspace.journal_path();
        let mut journal = CheckJournal::load(&journal_path)?;

        let started = Instant::now();
        let examined = pending(&ledger, |row| !row.status().public_in_ena().is_set());
        let outcome = check_release(&ledger, &self.ena, run_date, sink);
        let ledger = self.persist(&ledger, outcome.ledger)?;
        let report = outcome.report;
        Workspace::write_table(
            &self.workspace.report_path(RELEASE_VALIDATION_FILE),
            &report.validations,
        )?;
        record(&mut journal, CheckKind::Release, run_date, &report.progress);
        let mut release =
            CheckSummary::from_progress(&report.progress, examined, &report.status_errors);
        release.reference_errors = report.reference_errors.len();
        log_status_errors("release", &report.status_errors);
        finished(sink, "release", started);

        let started = Instant::now();
        let examined = pending(&ledger, |row| !row.status().fully_linked());
        let outcome = check_linkage(&ledger, &self.ena, sink);
        let ledger = self.persist(&ledger, outcome.ledger)?;
        let report = outcome.report;
        Workspace::write_table(
            &self.workspace.report_path(LINKAGE_VALIDATION_FILE),
            &report.validations,
        )?;
        record(&mut journal, CheckKind::Linkage, run_date, &report.progress);
        let linkage =
            CheckSummary::from_progress(&report.progress, examined, &report.status_errors);
        log_status_errors("linkage", &report.status_errors);
        finished(sink, "linkage", started);

        let started = Instant::now();
        let examined = pending(&ledger, |row| {
            row.status().public_in_ena().is_set() && !row.status().public_in_ncbi().is_set()
        });
        let outcome = check_mirror(&ledger, &self.ncbi, sink);
        let ledger = self.persist(&ledger, outcome.ledger)?;
        let report = outcome.report;
        Workspace::write_table(
            &self.workspace.report_path(MIRROR_VALIDATION_FILE),
            &report.validations,
        )?;
        record(&mut journal, CheckKind::Mirror, run_date, &report.progress);
        let mut mirror = CheckSummary::from_progress(
            &report.progress,
            examined.saturating_sub(report.skipped.len()),
            &report.status_errors,
        );
        mirror.unverified = report.unverified.len();
        log_status_errors("mirror", &report.status_errors);
        finished(sink, "mirror", started);

        journal.save(&journal_path)?;
        Ok((
            ledger,
            TrackChecks {
                release,
                linkage,
                mirror,
            },
        ))
    }

    fn report(&self, ledger: &Ledger, run_date: NaiveDate) -> Result<PhaseCounts, TrackerError> {
        let report = build_report(ledger);
        let written = write_reports(&report, &self.workspace, run_date)?;
        for duplicate in &report.duplicates {
            warn!(name = %duplicate.name, rows = duplicate.rows, "name appears in more than one group");
        }
        Ok(PhaseCounts {
            releasing_sequences: report.count(Phase::ReleasingSequences),
            processing_at_ncbi: report.count(Phase::ProcessingAtNcbi),
            releasing_gcas: report.count(Phase::ReleasingGcas),
            public: report.count(Phase::Public),
            duplicate_names: report.duplicates.len(),
            history_appended: written.history_appended,
        })
    }

    fn persist(&self, previous: &Ledger, next: Ledger) -> Result<Ledger, TrackerError> {
        if &next != previous {
            next.save(&self.workspace.ledger_path())?;
            info!(rows = next.len(), "ledger saved");
        }
        Ok(next)
    }
}

struct TrackChecks {
    release: CheckSummary,
    linkage: CheckSummary,
    mirror: CheckSummary,
}

fn pending(ledger: &Ledger, filter: impl Fn(&LedgerRow) -> bool) -> usize {
    ledger.rows().iter().filter(|row| filter(row)).count()
}

fn record(journal: &mut CheckJournal, check: CheckKind, date: NaiveDate, progress: &Progress) {
    let unresolved = progress.unresolved.iter().copied().collect::<BTreeSet<_>>();
    let resolved = progress
        .updated
        .iter()
        .copied()
        .filter(|key| !unresolved.contains(key))
        .collect::<Vec<(u32, AccessionType)>>();
    journal.record(check, date, &progress.unresolved, &resolved);
}

fn log_status_errors(stage: &str, errors: &[StatusError]) {
    for error in errors {
        warn!(stage, key = %error.key, status = ?error.status, "{}", error.message);
    }
}

fn finished(sink: &dyn ProgressSink, stage: &str, started: Instant) {
    sink.event(ProgressEvent {
        message: format!("stage={stage}; done"),
        elapsed: Some(started.elapsed()),
    });
}
