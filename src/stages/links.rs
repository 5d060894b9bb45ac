use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{AccessionRange, AccessionType, Check, strip_version, wgs_set_id};
use crate::ena::{EnaClient, LinkOwner, LinkType};
use crate::ledger::LedgerRow;
use crate::stages::StatusError;

type OwnerKey = (LinkOwner, String);

pub fn link_target(row: &LedgerRow) -> Option<(String, LinkType)> {
    if row.uses_analysis() {
        let analysis = row.analysis_id.as_deref()?.trim();
        return Some((analysis.to_string(), LinkType::Analysis));
    }
    let first = row.first_accession()?;
    match row.accession_type {
        AccessionType::Contigs => wgs_set_id(&first).map(|set| (set, LinkType::WgsSet)),
        AccessionType::Chromosomes => Some((first, LinkType::Sequence)),
        AccessionType::Gca => Some((strip_version(&first).to_string(), LinkType::Assembly)),
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkIndex {
    // accession (version stripped) -> reported tax id
    tables: BTreeMap<(OwnerKey, LinkType), BTreeMap<String, Option<String>>>,
    errors: Vec<StatusError>,
}

impl LinkIndex {
    pub fn build<E: EnaClient + ?Sized>(
        ena: &E,
        projects: &BTreeSet<String>,
        samples: &BTreeSet<String>,
        sink: &dyn ProgressSink,
    ) -> LinkIndex {
        let mut index = LinkIndex::default();
        let owners = projects
            .iter()
            .map(|project| (LinkOwner::Project, project))
            .chain(samples.iter().map(|sample| (LinkOwner::Sample, sample)));
        for (owner, accession) in owners {
            if accession.trim().is_empty() {
                continue;
            }
            sink.event(ProgressEvent::message(format!(
                "links; {owner:?} {accession}"
            )));
            for link_type in LinkType::ALL {
                index.fetch(ena, owner, accession, link_type);
            }
        }
        index
    }

    fn fetch<E: EnaClient + ?Sized>(
        &mut self,
        ena: &E,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) {
        match ena.links(owner, accession, link_type) {
            Ok(records) => {
                debug!(owner = ?owner, accession, link_type = %link_type, count = records.len(), "links fetched");
                let table = records
                    .into_iter()
                    .map(|record| (strip_version(record.accession.trim()).to_string(), record.tax_id))
                    .collect();
                self.insert(owner, accession, link_type, table);
            }
            Err(err) => {
                warn!(owner = ?owner, accession, link_type = %link_type, error = %err, "links lookup failed");
                self.errors.push(StatusError::from_error(
                    &format!("{accession}/{link_type}"),
                    &err,
                ));
            }
        }
    }

    pub fn insert(
        &mut self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
        table: BTreeMap<String, Option<String>>,
    ) {
        self.tables
            .insert(((owner, accession.to_string()), link_type), table);
    }

    pub fn errors(&self) -> &[StatusError] {
        &self.errors
    }

    fn table(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) -> Option<&BTreeMap<String, Option<String>>> {
        self.tables
            .get(&((owner, accession.to_string()), link_type))
    }

    pub fn contains(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
        linked: &str,
    ) -> Check {
        match self.table(owner, accession, link_type) {
            Some(table) => Check::from_bool(table.contains_key(strip_version(linked.trim()))),
            None => Check::Error,
        }
    }

    pub fn tax_id(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
        linked: &str,
    ) -> Option<Option<&str>> {
        self.table(owner, accession, link_type)?
            .get(strip_version(linked.trim()))
            .map(|tax| tax.as_deref())
    }

    pub fn sequence_range_within(
        &self,
        owner: LinkOwner,
        accession: &str,
        bounds: &AccessionRange,
    ) -> Option<Check> {
        let table = self.table(owner, accession, LinkType::Sequence)?;
        let reduced = AccessionRange::reduce(
            table
                .keys()
                .map(String::as_str)
                .filter(|linked| bounds.contains(linked)),
        );
        Some(Check::from_bool(reduced.as_ref() == Some(bounds)))
    }
}
