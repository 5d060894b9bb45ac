use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionType, AssemblyType, SubmissionName, strip_version};
use crate::ena::{EnaClient, TaxonRecord};
use crate::ledger::{Ledger, LedgerRow, NewRow};
use crate::stages::discovery::DiscoveredSubmission;
use crate::stages::{StageOutcome, StatusError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedSubmission {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub ingested: Vec<String>,
    pub rows_added: usize,
    pub skipped_known: Vec<String>,
    pub rejected: Vec<RejectedSubmission>,
    pub status_errors: Vec<StatusError>,
}

pub fn ingest<E: EnaClient + ?Sized>(
    ledger: &Ledger,
    submissions: &[DiscoveredSubmission],
    ena: &E,
    sink: &dyn ProgressSink,
) -> StageOutcome<IngestReport> {
    let mut report = IngestReport::default();
    let mut known = ledger
        .names()
        .into_iter()
        .map(str::to_string)
        .collect::<BTreeSet<_>>();
    let mut next_index = ledger.max_index().map_or(1, |max| max + 1);
    let mut taxa: BTreeMap<String, Option<TaxonRecord>> = BTreeMap::new();
    let mut new_rows = Vec::new();

    for submission in submissions {
        let name = submission.name.trim();
        if known.contains(name) {
            report.skipped_known.push(name.to_string());
            continue;
        }
        let parsed = match prepare(submission) {
            Ok(parsed) => parsed,
            Err(reason) => {
                warn!(submission = %name, reason = %reason, "submission rejected");
                report.rejected.push(RejectedSubmission {
                    name: name.to_string(),
                    reason,
                });
                continue;
            }
        };
        sink.event(ProgressEvent::message(format!("ingest; {name}")));

        let taxon = taxa
            .entry(parsed.sample.clone())
            .or_insert_with(|| lookup_taxon(ena, &parsed.sample, &mut report.status_errors))
            .clone()
            .unwrap_or_default();

        let index = next_index;
        next_index += 1;
        let ranges = [
            (AccessionType::Contigs, parsed.contigs.clone()),
            (AccessionType::Chromosomes, parsed.chromosomes.clone()),
            (AccessionType::Gca, Some(parsed.gca.clone())),
        ];
        let mut added = 0usize;
        for (accession_type, accessions) in ranges {
            let Some(accessions) = accessions else {
                continue;
            };
            new_rows.push(LedgerRow::from(NewRow {
                name: parsed.name.to_string(),
                index,
                accession_type,
                accessions,
                analysis_id: parsed.analysis_id.clone(),
                version: parsed.name.version(),
                project: parsed.project.clone(),
                sample_id: parsed.sample.clone(),
                tax_id: taxon.tax_id.clone(),
                scientific_name: taxon.scientific_name.clone(),
                assembly_type: parsed.assembly_type,
            }));
            added += 1;
        }
        info!(submission = %name, index, rows = added, "ingested submission");
        report.rows_added += added;
        report.ingested.push(name.to_string());
        known.insert(name.to_string());
    }

    StageOutcome {
        ledger: ledger.concat(new_rows),
        report,
    }
}

struct Prepared {
    name: SubmissionName,
    assembly_type: AssemblyType,
    project: String,
    sample: String,
    gca: String,
    contigs: Option<String>,
    chromosomes: Option<String>,
    analysis_id: Option<String>,
}

fn prepare(submission: &DiscoveredSubmission) -> Result<Prepared, String> {
    let name = submission
        .name
        .parse::<SubmissionName>()
        .map_err(|err| err.to_string())?;
    let assembly_type = non_empty(&submission.assembly_type)
        .ok_or_else(|| "missing assembly type".to_string())?
        .parse::<AssemblyType>()
        .map_err(|err| err.to_string())?;
    let project = non_empty(&submission.project).ok_or_else(|| "missing project".to_string())?;
    let sample = non_empty(&submission.sample).ok_or_else(|| "missing sample".to_string())?;
    let analysis_id = non_empty(&submission.analysis_id);
    let gca = non_empty(&submission.gca_accession)
        .map(|gca| strip_version(&gca).to_string())
        .unwrap_or_default();
    if gca.is_empty() && !(assembly_type.uses_analysis() && analysis_id.is_some()) {
        return Err("missing GCA accession".to_string());
    }

    Ok(Prepared {
        name,
        assembly_type,
        project,
        sample,
        gca,
        contigs: non_empty(&submission.contig_range),
        chromosomes: non_empty(&submission.chromosome_range),
        analysis_id,
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn lookup_taxon<E: EnaClient + ?Sized>(
    ena: &E,
    sample: &str,
    errors: &mut Vec<StatusError>,
) -> Option<TaxonRecord> {
    match ena.sample_taxon(sample) {
        Ok(Some(taxon)) => Some(taxon),
        Ok(None) => {
            warn!(sample, "no taxon found for sample");
            errors.push(StatusError::new(sample, "sample not found"));
            None
        }
        Err(err) => {
            warn!(sample, error = %err, "taxon lookup failed");
            errors.push(StatusError::from_error(sample, &err));
            None
        }
    }
}
