use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{AccessionType, Phase};
use crate::error::TrackerError;
use crate::ledger::{Ledger, LedgerRow};
use crate::store::Workspace;

pub const PUBLIC_GCAS_FILE: &str = "public_gcas.txt";
pub const RELEASING_SEQUENCES_FILE: &str = "releasing_sequences.txt";
pub const PROCESSING_AT_NCBI_FILE: &str = "processing_at_ncbi.txt";
pub const RELEASING_GCAS_FILE: &str = "releasing_gcas.txt";
pub const DUPLICATE_NAMES_FILE: &str = "duplicate_names.txt";

// An index group holds at most Contigs, Chromosomes and GCA.
const MAX_ROWS_PER_NAME: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseRow {
    pub index: u32,
    pub name: String,
    pub accession: String,
    pub version: u32,
    pub project: String,
    pub sample_id: String,
    pub scientific_name: Option<String>,
    pub phase: Phase,
    pub public_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateName {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub accession: String,
    pub name: String,
    pub added: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    pub phases: Vec<PhaseRow>,
    pub duplicates: Vec<DuplicateName>,
}

impl StatusReport {
    pub fn in_phase(&self, phase: Phase) -> Vec<&PhaseRow> {
        self.phases.iter().filter(|row| row.phase == phase).collect()
    }

    pub fn count(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|row| row.phase == phase).count()
    }
}

pub fn classify<'a>(group: &[&'a LedgerRow]) -> Option<(&'a LedgerRow, Phase)> {
    let lead = group
        .iter()
        .find(|row| row.accession_type == AccessionType::Gca)
        .or_else(|| group.iter().find(|row| row.uses_analysis()))
        .copied()?;
    let sequences = || {
        group
            .iter()
            .filter(|row| row.accession_type.is_sequence_level())
    };
    let awaiting_mirror = |row: &LedgerRow| {
        row.status().public_in_ena().is_set() && !row.status().public_in_ncbi().is_set()
    };
    // Primary and binned metagenome assemblies never get a mirror assembly record.
    let lead_awaits_mirror = !lead.assembly_type.uses_analysis() && awaiting_mirror(lead);

    let phase = if sequences().any(|row| !row.status().public_in_ena().is_set()) {
        Phase::ReleasingSequences
    } else if sequences().any(|row| awaiting_mirror(*row)) || lead_awaits_mirror {
        Phase::ProcessingAtNcbi
    } else if !lead.status().public_in_ena().is_set() {
        Phase::ReleasingGcas
    } else {
        Phase::Public
    };
    Some((lead, phase))
}

pub fn build_report(ledger: &Ledger) -> StatusReport {
    let phases = ledger
        .groups()
        .values()
        .filter_map(|group| classify(group))
        .map(|(lead, phase)| PhaseRow {
            index: lead.index,
            name: lead.name.clone(),
            accession: if lead.uses_analysis() && lead.accessions.trim().is_empty() {
                lead.analysis_id.clone().unwrap_or_default()
            } else {
                lead.accessions.clone()
            },
            version: lead.version,
            project: lead.project.clone(),
            sample_id: lead.sample_id.clone(),
            scientific_name: lead.scientific_name.clone(),
            phase,
            public_date: lead.status().public_date(),
        })
        .collect();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in ledger.rows() {
        *counts.entry(row.name.as_str()).or_default() += 1;
    }
    let duplicates = counts
        .into_iter()
        .filter(|(_, rows)| *rows > MAX_ROWS_PER_NAME)
        .map(|(name, rows)| DuplicateName {
            name: name.to_string(),
            rows,
        })
        .collect();

    StatusReport { phases, duplicates }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WrittenReports {
    pub files: Vec<String>,
    pub history_appended: usize,
}

pub fn write_reports(
    report: &StatusReport,
    workspace: &Workspace,
    run_date: NaiveDate,
) -> Result<WrittenReports, TrackerError> {
    let mut written = WrittenReports::default();
    for (file, phase) in [
        (PUBLIC_GCAS_FILE, Phase::Public),
        (RELEASING_SEQUENCES_FILE, Phase::ReleasingSequences),
        (PROCESSING_AT_NCBI_FILE, Phase::ProcessingAtNcbi),
        (RELEASING_GCAS_FILE, Phase::ReleasingGcas),
    ] {
        let path = workspace.report_path(file);
        Workspace::write_table(&path, &report.in_phase(phase))?;
        written.files.push(path.to_string());
    }
    let path = workspace.report_path(DUPLICATE_NAMES_FILE);
    Workspace::write_table(&path, &report.duplicates)?;
    written.files.push(path.to_string());

    written.history_appended = append_history(report, workspace, run_date)?;
    info!(
        files = written.files.len(),
        history_appended = written.history_appended,
        "reports written"
    );
    Ok(written)
}

fn append_history(
    report: &StatusReport,
    workspace: &Workspace,
    run_date: NaiveDate,
) -> Result<usize, TrackerError> {
    let path = workspace.public_history_path();
    let exists = path.as_std_path().exists();
    let mut known = BTreeSet::new();
    if exists {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(path.as_std_path())?;
        for entry in reader.deserialize::<HistoryEntry>() {
            known.insert(entry?.accession);
        }
    }

    let fresh = report
        .in_phase(Phase::Public)
        .into_iter()
        .filter(|row| !known.contains(&row.accession))
        .map(|row| HistoryEntry {
            accession: row.accession.clone(),
            name: row.name.clone(),
            added: run_date,
        })
        .collect::<Vec<_>>();
    if fresh.is_empty() {
        return Ok(0);
    }

    let has_header = exists && !known.is_empty();
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(!has_header)
        .from_writer(Vec::new());
    for entry in &fresh {
        writer.serialize(entry)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| TrackerError::Table(err.to_string()))?;
    if has_header {
        Workspace::append_bytes(&path, &bytes)?;
    } else {
        Workspace::write_bytes_atomic(&path, &bytes)?;
    }
    Ok(fresh.len())
}
