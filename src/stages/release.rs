use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionType, Check, strip_version};
use crate::ena::{EnaClient, LinkOwner, LinkType, SummaryDataType, SummaryRecord};
use crate::ledger::{Ledger, LedgerRow};
use crate::stages::links::{LinkIndex, link_target};
use crate::stages::{Progress, StageOutcome, StatusError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseValidation {
    pub index: u32,
    pub accession_type: AccessionType,
    pub accessions: String,
    pub lookup: String,
    pub data_type: Option<String>,
    pub version_ok: Option<Check>,
    pub project_ok: Option<Check>,
    pub sample_ok: Option<Check>,
    pub taxon_prj_ok: Option<Check>,
    pub taxon_sp_ok: Option<Check>,
    pub range_ok: Option<Check>,
    pub analysis_linked: Option<Check>,
    pub released: bool,
}

impl ReleaseValidation {
    fn new(row: &LedgerRow, lookup: &str) -> Self {
        Self {
            index: row.index,
            accession_type: row.accession_type,
            accessions: row.accessions.clone(),
            lookup: lookup.to_string(),
            data_type: None,
            version_ok: None,
            project_ok: None,
            sample_ok: None,
            taxon_prj_ok: None,
            taxon_sp_ok: None,
            range_ok: None,
            analysis_linked: None,
            released: false,
        }
    }

    fn checks(&self) -> impl Iterator<Item = Check> + '_ {
        [
            self.version_ok,
            self.project_ok,
            self.sample_ok,
            self.taxon_prj_ok,
            self.taxon_sp_ok,
            self.range_ok,
            self.analysis_linked,
        ]
        .into_iter()
        .flatten()
    }

    pub fn passed(&self) -> bool {
        let mut checks = self.checks().peekable();
        checks.peek().is_some() && checks.all(Check::passed)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReleaseReport {
    pub validations: Vec<ReleaseValidation>,
    pub status_errors: Vec<StatusError>,
    pub reference_errors: Vec<StatusError>,
    pub progress: Progress,
}

pub fn check_release<E: EnaClient + ?Sized>(
    ledger: &Ledger,
    ena: &E,
    run_date: NaiveDate,
    sink: &dyn ProgressSink,
) -> StageOutcome<ReleaseReport> {
    let pending = ledger
        .rows()
        .iter()
        .filter(|row| !row.status().public_in_ena().is_set())
        .collect::<Vec<_>>();
    let mut report = ReleaseReport::default();
    if pending.is_empty() {
        return StageOutcome {
            ledger: ledger.clone(),
            report,
        };
    }

    let projects = pending.iter().map(|row| row.project.clone()).collect();
    let samples = pending.iter().map(|row| row.sample_id.clone()).collect();
    let links = LinkIndex::build(ena, &projects, &samples, sink);
    report.status_errors.extend(links.errors().iter().cloned());

    let mut released = BTreeSet::new();
    for row in pending {
        sink.event(ProgressEvent::message(format!(
            "release; {} {}",
            row.accession_type, row.accessions
        )));
        let validation = if row.uses_analysis() {
            validate_analysis(row, ena, &links, &mut report)
        } else {
            validate_sequence(row, ena, &links, &mut report)
        };
        let Some(mut validation) = validation else {
            report.progress.unresolved.push(row.key());
            continue;
        };
        if validation.passed() {
            validation.released = true;
            released.insert(row.key());
            report.progress.updated.push(row.key());
            info!(index = row.index, accession = %row.accessions, "public at archive");
        } else {
            debug!(index = row.index, accession = %row.accessions, "not yet public at archive");
            report.progress.unresolved.push(row.key());
        }
        report.validations.push(validation);
    }

    let ledger = ledger.with_status_updates(|row, status| {
        if released.contains(&row.key()) {
            status.mark_public_in_ena(run_date);
        }
    });
    StageOutcome { ledger, report }
}

fn validate_sequence<E: EnaClient + ?Sized>(
    row: &LedgerRow,
    ena: &E,
    links: &LinkIndex,
    report: &mut ReleaseReport,
) -> Option<ReleaseValidation> {
    let Some((lookup, link_type)) = link_target(row) else {
        warn!(index = row.index, accession = %row.accessions, "no lookup key for row");
        report.status_errors.push(StatusError::new(
            &row.accessions,
            "cannot derive a lookup accession",
        ));
        return None;
    };
    let records = match ena.summary(&lookup) {
        Ok(records) => records,
        Err(err) => {
            warn!(accession = %lookup, error = %err, "summary lookup failed");
            report
                .status_errors
                .push(StatusError::from_error(&lookup, &err));
            return None;
        }
    };
    let record = select_record(&records, &lookup)?;

    let mut validation = ReleaseValidation::new(row, &lookup);
    validation.data_type = record.data_type.clone();
    let data_type = match record.data_type() {
        Some(SummaryDataType::Other) | None => return Some(validation),
        Some(data_type) => data_type,
    };

    if matches!(data_type, SummaryDataType::Assembly | SummaryDataType::ContigSet) {
        validation.version_ok = Some(match record.version() {
            Some(version) => Check::from_bool(version == row.version),
            None => Check::Error,
        });
    }
    let carries_links = matches!(
        data_type,
        SummaryDataType::ContigSet | SummaryDataType::Sequence
    );
    if carries_links || present(record.project.as_deref()) {
        validation.project_ok = Some(field_check(record.project.as_deref(), &row.project));
    }
    if carries_links || present(record.sample.as_deref()) {
        validation.sample_ok = Some(field_check(record.sample.as_deref(), &row.sample_id));
    }

    let reported_tax = record.tax_id.as_deref();
    validation.taxon_prj_ok = Some(taxon_check(
        links,
        LinkOwner::Project,
        &row.project,
        link_type,
        &lookup,
        reported_tax,
        &mut report.reference_errors,
    ));
    validation.taxon_sp_ok = Some(taxon_check(
        links,
        LinkOwner::Sample,
        &row.sample_id,
        link_type,
        &lookup,
        reported_tax,
        &mut report.reference_errors,
    ));

    // Chromosome versions are not reported by the summary, only the range.
    if row.accession_type == AccessionType::Chromosomes {
        validation.range_ok = Some(
            row.range()
                .and_then(|range| {
                    links.sequence_range_within(LinkOwner::Sample, &row.sample_id, &range)
                })
                .unwrap_or(Check::Error),
        );
    }
    Some(validation)
}

fn validate_analysis<E: EnaClient + ?Sized>(
    row: &LedgerRow,
    ena: &E,
    links: &LinkIndex,
    report: &mut ReleaseReport,
) -> Option<ReleaseValidation> {
    let (analysis_id, _) = link_target(row)?;
    let record = match ena.analysis(&analysis_id) {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(analysis = %analysis_id, "analysis not public yet");
            return None;
        }
        Err(err) => {
            warn!(analysis = %analysis_id, error = %err, "analysis lookup failed");
            report
                .status_errors
                .push(StatusError::from_error(&analysis_id, &err));
            return None;
        }
    };

    let mut validation = ReleaseValidation::new(row, &analysis_id);
    validation.data_type = Some("ANALYSIS".to_string());
    validation.project_ok = Some(field_check(record.study_accession.as_deref(), &row.project));
    validation.sample_ok = Some(field_check(record.sample_accession.as_deref(), &row.sample_id));
    validation.analysis_linked = Some(links.contains(
        LinkOwner::Project,
        &row.project,
        LinkType::Analysis,
        &analysis_id,
    ));
    Some(validation)
}

fn select_record<'a>(records: &'a [SummaryRecord], lookup: &str) -> Option<&'a SummaryRecord> {
    records
        .iter()
        .find(|record| {
            record
                .accession
                .as_deref()
                .is_some_and(|accession| strip_version(accession.trim()) == lookup)
        })
        .or_else(|| records.first())
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.trim().is_empty())
}

fn field_check(reported: Option<&str>, expected: &str) -> Check {
    match reported.map(str::trim).filter(|value| !value.is_empty()) {
        Some(reported) => Check::from_bool(reported == expected.trim()),
        None => Check::Error,
    }
}

fn taxon_check(
    links: &LinkIndex,
    owner: LinkOwner,
    owner_accession: &str,
    link_type: LinkType,
    lookup: &str,
    reported: Option<&str>,
    errors: &mut Vec<StatusError>,
) -> Check {
    match links.tax_id(owner, owner_accession, link_type, lookup) {
        None => {
            errors.push(StatusError::new(
                &format!("{owner_accession}/{lookup}"),
                format!("{lookup} missing from {link_type} links"),
            ));
            Check::Error
        }
        Some(expected) => match (reported, expected) {
            (Some(reported), Some(expected)) => Check::from_bool(reported.trim() == expected.trim()),
            _ => Check::Error,
        },
    }
}
