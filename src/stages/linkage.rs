use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionType, Check};
use crate::ena::{EnaClient, LinkOwner};
use crate::ledger::{Ledger, LedgerRow};
use crate::stages::links::{LinkIndex, link_target};
use crate::stages::{Progress, StageOutcome, StatusError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkageValidation {
    pub index: u32,
    pub accession_type: AccessionType,
    pub accessions: String,
    pub project_linked: Check,
    pub sample_linked: Check,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkageReport {
    pub validations: Vec<LinkageValidation>,
    pub status_errors: Vec<StatusError>,
    pub progress: Progress,
}

pub fn check_linkage<E: EnaClient + ?Sized>(
    ledger: &Ledger,
    ena: &E,
    sink: &dyn ProgressSink,
) -> StageOutcome<LinkageReport> {
    let pending = ledger
        .rows()
        .iter()
        .filter(|row| !row.status().fully_linked())
        .collect::<Vec<_>>();
    let mut report = LinkageReport::default();
    if pending.is_empty() {
        return StageOutcome {
            ledger: ledger.clone(),
            report,
        };
    }

    let projects = pending
        .iter()
        .filter(|row| !row.status().linked_to_project().is_set())
        .map(|row| row.project.clone())
        .collect();
    let samples = pending
        .iter()
        .filter(|row| !row.status().linked_to_sample().is_set())
        .map(|row| row.sample_id.clone())
        .collect();
    let links = LinkIndex::build(ena, &projects, &samples, sink);
    report.status_errors.extend(links.errors().iter().cloned());

    let mut results = BTreeMap::new();
    for row in pending {
        sink.event(ProgressEvent::message(format!(
            "linkage; {} {}",
            row.accession_type, row.accessions
        )));
        let validation = LinkageValidation {
            index: row.index,
            accession_type: row.accession_type,
            accessions: row.accessions.clone(),
            project_linked: if row.status().linked_to_project().is_set() {
                Check::True
            } else {
                linked(&links, LinkOwner::Project, &row.project, row)
            },
            sample_linked: if row.status().linked_to_sample().is_set() {
                Check::True
            } else {
                linked(&links, LinkOwner::Sample, &row.sample_id, row)
            },
        };
        let changed = (validation.project_linked.passed() && !row.status().linked_to_project().is_set())
            || (validation.sample_linked.passed() && !row.status().linked_to_sample().is_set());
        let complete = validation.project_linked.passed() && validation.sample_linked.passed();
        if changed {
            info!(
                index = row.index,
                accession = %row.accessions,
                project = %validation.project_linked,
                sample = %validation.sample_linked,
                "linkage updated"
            );
            report.progress.updated.push(row.key());
        }
        if !complete {
            debug!(index = row.index, accession = %row.accessions, "linkage incomplete");
            report.progress.unresolved.push(row.key());
        }
        results.insert(row.key(), (validation.project_linked, validation.sample_linked));
        report.validations.push(validation);
    }

    let ledger = ledger.with_status_updates(|row, status| {
        if let Some((project, sample)) = results.get(&row.key()) {
            if project.passed() {
                status.mark_linked_to_project();
            }
            if sample.passed() {
                status.mark_linked_to_sample();
            }
        }
    });
    StageOutcome { ledger, report }
}

fn linked(links: &LinkIndex, owner: LinkOwner, owner_accession: &str, row: &LedgerRow) -> Check {
    if row.accession_type == AccessionType::Chromosomes && !row.uses_analysis() {
        return row
            .range()
            .and_then(|range| links.sequence_range_within(owner, owner_accession, &range))
            .unwrap_or(Check::Error);
    }
    match link_target(row) {
        Some((accession, link_type)) => links.contains(owner, owner_accession, link_type, &accession),
        None => Check::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Flag;
    use crate::ena::LinkType;
    use crate::output::LogSink;
    use crate::stages::fixtures::{MockEna, index5_ledger};

    #[test]
    fn all_rows_linked_when_links_present() {
        let ledger = index5_ledger();
        let ena = MockEna::publishing(&ledger);
        let outcome = check_linkage(&ledger, &ena, &LogSink);
        for row in outcome.ledger.rows() {
            assert!(row.status().fully_linked(), "{}", row.accessions);
            // only the two linkage flags move
            assert_eq!(row.status().public_in_ena(), Flag::No);
            assert!(row.status().public_date().is_none());
        }
        assert!(outcome.report.progress.unresolved.is_empty());
    }

    #[test]
    fn partial_linkage_is_kept_and_retried() {
        let ledger = index5_ledger();
        let mut ena = MockEna::publishing(&ledger);
        ena.links
            .remove(&(LinkOwner::Sample, "SAMEA1".to_string(), LinkType::WgsSet));
        let first = check_linkage(&ledger, &ena, &LogSink);
        let contigs = &first.ledger.rows()[0];
        assert_eq!(contigs.status().linked_to_project(), Flag::Yes);
        assert_eq!(contigs.status().linked_to_sample(), Flag::No);
        assert_eq!(first.report.progress.unresolved, vec![(5, AccessionType::Contigs)]);

        // links disappear upstream: flags never go back to N
        let second = check_linkage(&first.ledger, &MockEna::default(), &LogSink);
        assert_eq!(second.ledger.rows()[0].status().linked_to_project(), Flag::Yes);
        assert_eq!(
            first.ledger.to_bytes().unwrap(),
            second.ledger.to_bytes().unwrap()
        );
    }

    #[test]
    fn failed_links_lookup_is_an_error() {
        let ledger = index5_ledger();
        let mut ena = MockEna::publishing(&ledger);
        ena.failing.insert("SAMEA1".to_string());
        let outcome = check_linkage(&ledger, &ena, &LogSink);
        assert!(outcome
            .report
            .validations
            .iter()
            .all(|validation| validation.sample_linked == Check::Error));
        assert_eq!(outcome.report.status_errors.len(), LinkType::ALL.len());
    }
}
