use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionType, Check, strip_version};
use crate::ledger::{Ledger, LedgerRow};
use crate::ncbi::NcbiClient;
use crate::stages::{Progress, StageOutcome, StatusError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorValidation {
    pub index: u32,
    pub accession_type: AccessionType,
    pub lookup: String,
    pub found: bool,
    pub project_ok: Option<Check>,
    pub sample_ok: Option<Check>,
}

impl MirrorValidation {
    fn passed(&self) -> bool {
        self.found
            && [self.project_ok, self.sample_ok]
                .into_iter()
                .flatten()
                .all(Check::passed)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MirrorReport {
    pub validations: Vec<MirrorValidation>,
    pub status_errors: Vec<StatusError>,
    pub unverified: Vec<(u32, AccessionType)>,
    pub skipped: Vec<(u32, AccessionType)>,
    pub progress: Progress,
}

pub fn check_mirror<N: NcbiClient + ?Sized>(
    ledger: &Ledger,
    ncbi: &N,
    sink: &dyn ProgressSink,
) -> StageOutcome<MirrorReport> {
    let mut report = MirrorReport::default();
    let mut released = BTreeSet::new();

    for row in ledger
        .rows()
        .iter()
        .filter(|row| {
            row.status().public_in_ena().is_set() && !row.status().public_in_ncbi().is_set()
        })
    {
        let expects_record = row.accession_type.is_sequence_level()
            || row.assembly_type.has_mirror_assembly();
        if row.uses_analysis() || !expects_record {
            debug!(index = row.index, assembly_type = %row.assembly_type, "no mirror record expected");
            report.skipped.push(row.key());
            continue;
        }
        sink.event(ProgressEvent::message(format!(
            "mirror; {} {}",
            row.accession_type, row.accessions
        )));

        let validation = if row.accession_type.is_sequence_level() {
            check_sequence(row, ncbi, &mut report)
        } else {
            check_assembly(row, ncbi, &mut report)
        };
        match validation {
            Some(validation) if validation.passed() => {
                info!(index = row.index, accession = %row.accessions, "public at mirror");
                released.insert(row.key());
                report.progress.updated.push(row.key());
                report.validations.push(validation);
            }
            Some(validation) => {
                report.progress.unresolved.push(row.key());
                report.validations.push(validation);
            }
            None => report.progress.unresolved.push(row.key()),
        }
    }

    let ledger = ledger.with_status_updates(|row, status| {
        if released.contains(&row.key()) {
            status.mark_public_in_ncbi();
        }
    });
    StageOutcome { ledger, report }
}

fn check_sequence<N: NcbiClient + ?Sized>(
    row: &LedgerRow,
    ncbi: &N,
    report: &mut MirrorReport,
) -> Option<MirrorValidation> {
    let Some(first) = row.first_accession() else {
        report
            .status_errors
            .push(StatusError::new(&row.accessions, "empty accession range"));
        return None;
    };
    let summary = match ncbi.sequence_summary(&first) {
        Ok(summary) => summary,
        Err(err) => {
            warn!(accession = %first, error = %err, "sequence summary lookup failed");
            report.status_errors.push(StatusError::from_error(&first, &err));
            return None;
        }
    };
    let mut validation = MirrorValidation {
        index: row.index,
        accession_type: row.accession_type,
        lookup: first.clone(),
        found: summary.is_some(),
        project_ok: None,
        sample_ok: None,
    };
    let Some(summary) = summary else {
        return Some(validation);
    };

    validation.project_ok = reported_check(summary.bioproject.as_deref(), &row.project);
    validation.sample_ok = reported_check(summary.biosample.as_deref(), &row.sample_id);
    if validation.project_ok.is_none() && validation.sample_ok.is_none() {
        warn!(
            index = row.index,
            accession = %first,
            "mirror record has no project or sample; accepted on presence"
        );
        report.unverified.push(row.key());
    }
    Some(validation)
}

fn check_assembly<N: NcbiClient + ?Sized>(
    row: &LedgerRow,
    ncbi: &N,
    report: &mut MirrorReport,
) -> Option<MirrorValidation> {
    let accession = format!("{}.{}", strip_version(row.accessions.trim()), row.version);
    let assembly = match ncbi.assembly_report(&accession) {
        Ok(assembly) => assembly,
        Err(err) => {
            warn!(accession = %accession, error = %err, "dataset report lookup failed");
            report
                .status_errors
                .push(StatusError::from_error(&accession, &err));
            return None;
        }
    };
    Some(MirrorValidation {
        index: row.index,
        accession_type: row.accession_type,
        lookup: accession,
        found: assembly.is_some(),
        project_ok: assembly.as_ref().map(|assembly| {
            reported_check(assembly.bioproject.as_deref(), &row.project).unwrap_or(Check::Error)
        }),
        sample_ok: assembly.as_ref().map(|assembly| {
            reported_check(assembly.biosample.as_deref(), &row.sample_id).unwrap_or(Check::Error)
        }),
    })
}

fn reported_check(reported: Option<&str>, expected: &str) -> Option<Check> {
    reported
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| Check::from_bool(value == expected.trim()))
}
