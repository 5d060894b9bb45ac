use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::domain::{AccessionType, AssemblyType, strip_version, wgs_set_id};
use crate::ena::{
    AnalysisRecord, EnaClient, LinkOwner, LinkRecord, LinkType, SummaryRecord, TaxonRecord,
};
use crate::error::TrackerError;
use crate::ledger::{Ledger, LedgerRow, NewRow};
use crate::ncbi::{AssemblyReport, NcbiClient, SequenceSummary};

pub const TAX_ID: &str = "562";

pub fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

pub fn row(
    index: u32,
    accession_type: AccessionType,
    accessions: &str,
    version: u32,
) -> LedgerRow {
    LedgerRow::from(NewRow {
        name: format!("asm{index}.{version}"),
        index,
        accession_type,
        accessions: accessions.to_string(),
        analysis_id: None,
        version,
        project: "PRJEB1".to_string(),
        sample_id: "SAMEA1".to_string(),
        tax_id: Some(TAX_ID.to_string()),
        scientific_name: Some("Escherichia coli".to_string()),
        assembly_type: AssemblyType::CloneOrIsolate,
    })
}

pub fn index5_ledger() -> Ledger {
    Ledger::from_rows(vec![
        row(5, AccessionType::Contigs, "ABCD01000001-ABCD01000010", 1),
        row(5, AccessionType::Chromosomes, "LR123456-LR123460", 1),
        row(5, AccessionType::Gca, "GCA_900000001", 1),
    ])
}

#[derive(Debug, Default)]
pub struct MockEna {
    pub taxa: BTreeMap<String, TaxonRecord>,
    pub summaries: BTreeMap<String, Vec<SummaryRecord>>,
    pub links: BTreeMap<(LinkOwner, String, LinkType), Vec<LinkRecord>>,
    pub analyses: BTreeMap<String, AnalysisRecord>,
    pub failing: BTreeSet<String>,
}

impl MockEna {
    pub fn publishing(ledger: &Ledger) -> Self {
        let mut mock = MockEna::default();
        for row in ledger.rows() {
            mock.taxa.insert(
                row.sample_id.clone(),
                TaxonRecord {
                    tax_id: Some(TAX_ID.to_string()),
                    scientific_name: Some("Escherichia coli".to_string()),
                },
            );
            if row.uses_analysis() {
                let analysis = row.analysis_id.clone().unwrap_or_default();
                mock.analyses.insert(
                    analysis.clone(),
                    AnalysisRecord {
                        analysis_accession: analysis.clone(),
                        study_accession: Some(row.project.clone()),
                        sample_accession: Some(row.sample_id.clone()),
                        tax_id: Some(TAX_ID.to_string()),
                        first_public: None,
                    },
                );
                mock.link_both(row, LinkType::Analysis, &[analysis.as_str()]);
                continue;
            }
            let Some(range) = row.range() else {
                continue;
            };
            match row.accession_type {
                AccessionType::Contigs => {
                    let set = wgs_set_id(&range.first).unwrap_or_default();
                    mock.add_summary(&set, "CONTIGSET", Some(row.version), row);
                    mock.link_both(row, LinkType::WgsSet, &[set.as_str()]);
                }
                AccessionType::Chromosomes => {
                    mock.add_summary(&range.first, "SEQUENCE", None, row);
                    let mut linked = vec![range.first.clone()];
                    if range.last != range.first {
                        linked.push(range.last.clone());
                    }
                    let linked = linked.iter().map(String::as_str).collect::<Vec<_>>();
                    mock.link_both(row, LinkType::Sequence, &linked);
                }
                AccessionType::Gca => {
                    let accession = strip_version(&range.first).to_string();
                    mock.add_summary(&accession, "ASSEMBLY", Some(row.version), row);
                    let versioned = format!("{accession}.{}", row.version);
                    mock.link_both(row, LinkType::Assembly, &[versioned.as_str()]);
                }
            }
        }
        mock
    }

    fn add_summary(
        &mut self,
        accession: &str,
        data_type: &str,
        version: Option<u32>,
        row: &LedgerRow,
    ) {
        self.summaries.insert(
            accession.to_string(),
            vec![SummaryRecord {
                accession: Some(accession.to_string()),
                data_type: Some(data_type.to_string()),
                version: version.map(|version| version.to_string()),
                project: Some(row.project.clone()),
                sample: Some(row.sample_id.clone()),
                tax_id: Some(TAX_ID.to_string()),
                scientific_name: None,
                status: Some("public".to_string()),
            }],
        );
    }

    fn link_both(&mut self, row: &LedgerRow, link_type: LinkType, accessions: &[&str]) {
        for (owner, parent) in [
            (LinkOwner::Project, &row.project),
            (LinkOwner::Sample, &row.sample_id),
        ] {
            let entry = self
                .links
                .entry((owner, parent.clone(), link_type))
                .or_default();
            for accession in accessions {
                entry.push(LinkRecord {
                    accession: accession.to_string(),
                    tax_id: Some(TAX_ID.to_string()),
                });
            }
        }
    }

    pub fn set_version(&mut self, accession: &str, version: u32) {
        for record in self.summaries.entry(accession.to_string()).or_default() {
            record.version = Some(version.to_string());
        }
    }

    fn fail_if_listed(&self, key: &str) -> Result<(), TrackerError> {
        if self.failing.contains(key) {
            return Err(TrackerError::EnaStatus {
                status: 500,
                message: format!("{key} unavailable"),
            });
        }
        Ok(())
    }
}

impl EnaClient for MockEna {
    fn sample_taxon(&self, sample: &str) -> Result<Option<TaxonRecord>, TrackerError> {
        self.fail_if_listed(sample)?;
        Ok(self.taxa.get(sample).cloned())
    }

    fn summary(&self, accession: &str) -> Result<Vec<SummaryRecord>, TrackerError> {
        self.fail_if_listed(accession)?;
        Ok(self.summaries.get(accession).cloned().unwrap_or_default())
    }

    fn links(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) -> Result<Vec<LinkRecord>, TrackerError> {
        self.fail_if_listed(accession)?;
        Ok(self
            .links
            .get(&(owner, accession.to_string(), link_type))
            .cloned()
            .unwrap_or_default())
    }

    fn analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>, TrackerError> {
        self.fail_if_listed(analysis_id)?;
        Ok(self.analyses.get(analysis_id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MockNcbi {
    pub sequences: BTreeMap<String, SequenceSummary>,
    pub assemblies: BTreeMap<String, AssemblyReport>,
}

impl MockNcbi {
    pub fn publishing(ledger: &Ledger) -> Self {
        let mut mock = MockNcbi::default();
        for row in ledger.rows() {
            let Some(first) = row.first_accession() else {
                continue;
            };
            if row.accession_type.is_sequence_level() {
                mock.sequences.insert(
                    first.clone(),
                    SequenceSummary {
                        accession: first,
                        bioproject: Some(row.project.clone()),
                        biosample: Some(row.sample_id.clone()),
                    },
                );
            } else {
                let versioned = format!("{}.{}", strip_version(&first), row.version);
                mock.assemblies.insert(
                    versioned.clone(),
                    AssemblyReport {
                        accession: versioned,
                        bioproject: Some(row.project.clone()),
                        biosample: Some(row.sample_id.clone()),
                    },
                );
            }
        }
        mock
    }
}

impl NcbiClient for MockNcbi {
    fn sequence_summary(&self, accession: &str) -> Result<Option<SequenceSummary>, TrackerError> {
        Ok(self.sequences.get(accession).cloned())
    }

    fn assembly_report(&self, accession: &str) -> Result<Option<AssemblyReport>, TrackerError> {
        Ok(self.assemblies.get(accession).cloned())
    }
}
