use std::collections::BTreeMap;
use std::fs;

use assert_matches::assert_matches;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::NaiveDate;
use rusqlite::Connection;

use assembly_tracker::app::Tracker;
use assembly_tracker::domain::{AccessionType, Action, Flag};
use assembly_tracker::ena::{
    AnalysisRecord, EnaClient, LinkOwner, LinkRecord, LinkType, SummaryRecord, TaxonRecord,
};
use assembly_tracker::error::TrackerError;
use assembly_tracker::journal::{CheckJournal, CheckKind};
use assembly_tracker::ledger::Ledger;
use assembly_tracker::ncbi::{AssemblyReport, NcbiClient, SequenceSummary};
use assembly_tracker::output::JsonOutput;
use assembly_tracker::store::Workspace;
use assembly_tracker::submissions::SqliteSubmissionStore;

const PROJECT: &str = "PRJEB1";
const SAMPLE: &str = "SAMEA1";
const TAX: &str = "562";

#[derive(Default)]
struct MockEna {
    published: bool,
}

fn summary(accession: &str, data_type: &str, version: Option<&str>) -> SummaryRecord {
    SummaryRecord {
        accession: Some(accession.to_string()),
        data_type: Some(data_type.to_string()),
        version: version.map(str::to_string),
        project: Some(PROJECT.to_string()),
        sample: Some(SAMPLE.to_string()),
        tax_id: Some(TAX.to_string()),
        ..SummaryRecord::default()
    }
}

fn link(accession: &str) -> LinkRecord {
    LinkRecord {
        accession: accession.to_string(),
        tax_id: Some(TAX.to_string()),
    }
}

impl EnaClient for MockEna {
    fn sample_taxon(&self, _sample: &str) -> Result<Option<TaxonRecord>, TrackerError> {
        Ok(Some(TaxonRecord {
            tax_id: Some(TAX.to_string()),
            scientific_name: Some("Escherichia coli".to_string()),
        }))
    }

    fn summary(&self, accession: &str) -> Result<Vec<SummaryRecord>, TrackerError> {
        if !self.published {
            return Ok(Vec::new());
        }
        Ok(match accession {
            "ABCD01" => vec![summary(accession, "CONTIGSET", Some("1"))],
            "LR123456" => vec![summary(accession, "SEQUENCE", None)],
            "GCA_900000001" => vec![summary(accession, "ASSEMBLY", Some("1"))],
            _ => Vec::new(),
        })
    }

    fn links(
        &self,
        _owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) -> Result<Vec<LinkRecord>, TrackerError> {
        if !self.published || (accession != PROJECT && accession != SAMPLE) {
            return Ok(Vec::new());
        }
        Ok(match link_type {
            LinkType::WgsSet => vec![link("ABCD01")],
            LinkType::Sequence => vec![link("LR123456"), link("LR123458"), link("LR123460")],
            LinkType::Assembly => vec![link("GCA_900000001.1")],
            LinkType::Analysis => Vec::new(),
        })
    }

    fn analysis(&self, _analysis_id: &str) -> Result<Option<AnalysisRecord>, TrackerError> {
        Ok(None)
    }
}

#[derive(Default)]
struct MockNcbi {
    sequences: BTreeMap<String, SequenceSummary>,
    assemblies: BTreeMap<String, AssemblyReport>,
}

impl MockNcbi {
    fn published() -> Self {
        let mut mock = MockNcbi::default();
        for accession in ["ABCD01000001", "LR123456"] {
            mock.sequences.insert(
                accession.to_string(),
                SequenceSummary {
                    accession: accession.to_string(),
                    bioproject: Some(PROJECT.to_string()),
                    biosample: Some(SAMPLE.to_string()),
                },
            );
        }
        mock.assemblies.insert(
            "GCA_900000001.1".to_string(),
            AssemblyReport {
                accession: "GCA_900000001.1".to_string(),
                bioproject: Some(PROJECT.to_string()),
                biosample: Some(SAMPLE.to_string()),
            },
        );
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

fn seeded_store() -> SqliteSubmissionStore {
    let conn = Connection::open_in_memory().unwrap();
    SqliteSubmissionStore::init_schema(&conn).unwrap();
    conn.execute(
        "INSERT INTO pipeline_status VALUES ('asm5_run', 'asm5.1', 'COMPLETED')",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO assembly_status VALUES ('asm5.1', 4, 'GCA_900000001.1',
         'ABCD01000001-ABCD01000010', 'LR123456-LR123460', 'PRJEB1', 'SAMEA1',
         'clone or isolate', NULL)",
        [],
    )
    .unwrap();
    SqliteSubmissionStore::from_connection(conn)
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn setup(root: &Utf8Path) -> (Workspace, Utf8PathBuf) {
    let names = root.join("names.txt");
    fs::write(names.as_std_path(), "name\nasm5.1\n").unwrap();
    (Workspace::new(root, "darwin"), names)
}

fn utf8_root(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap()
}

#[test]
fn all_action_takes_submission_to_public() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_root(&temp);
    let (workspace, names) = setup(&root);
    let ena = MockEna { published: true };
    let tracker = Tracker::new(
        workspace.clone(),
        Some(names),
        ena,
        MockNcbi::published(),
        seeded_store(),
    );

    let summary = tracker.run(Action::All, run_date(), &JsonOutput).unwrap();
    assert_eq!(summary.discovery.as_ref().unwrap().discovered, 1);
    assert_eq!(summary.ingest.as_ref().unwrap().rows_added, 3);
    assert_eq!(summary.release.as_ref().unwrap().updated, 3);
    assert_eq!(summary.linkage.as_ref().unwrap().updated, 3);
    assert_eq!(summary.mirror.as_ref().unwrap().updated, 3);
    let phases = summary.phases.as_ref().unwrap();
    assert_eq!(phases.public, 1);
    assert_eq!(phases.history_appended, 1);

    let ledger = Ledger::load(&workspace.ledger_path()).unwrap();
    assert_eq!(ledger.len(), 3);
    for row in ledger.rows() {
        assert_eq!(row.index, 1);
        assert_eq!(row.version, 1);
        assert_eq!(row.status().public_in_ena(), Flag::Yes);
        assert_eq!(row.status().public_in_ncbi(), Flag::Yes);
        assert!(row.status().fully_linked());
        assert_eq!(row.status().public_date(), Some(run_date()));
    }

    // the lock is released once the run returns
    assert!(!workspace.root().join(".tracker.lock").as_std_path().exists());
}

#[test]
fn track_rerun_leaves_ledger_byte_identical() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_root(&temp);
    let (workspace, names) = setup(&root);
    let ena = MockEna { published: true };
    let tracker = Tracker::new(
        workspace.clone(),
        Some(names),
        ena,
        MockNcbi::published(),
        seeded_store(),
    );
    tracker.run(Action::Sql, run_date(), &JsonOutput).unwrap();
    tracker.run(Action::Add, run_date(), &JsonOutput).unwrap();
    tracker.run(Action::Track, run_date(), &JsonOutput).unwrap();
    let first = fs::read(workspace.ledger_path().as_std_path()).unwrap();

    let later = run_date().succ_opt().unwrap();
    let summary = tracker.run(Action::Track, later, &JsonOutput).unwrap();
    let second = fs::read(workspace.ledger_path().as_std_path()).unwrap();
    assert_eq!(first, second);
    assert_eq!(summary.release.unwrap().examined, 0);
    assert_eq!(summary.phases.unwrap().history_appended, 0);
}

#[test]
fn unpublished_rows_are_journaled_per_attempt() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_root(&temp);
    let (workspace, names) = setup(&root);
    let tracker = Tracker::new(
        workspace.clone(),
        Some(names),
        MockEna::default(),
        MockNcbi::default(),
        seeded_store(),
    );
    tracker.run(Action::All, run_date(), &JsonOutput).unwrap();
    tracker
        .run(Action::Track, run_date().succ_opt().unwrap(), &JsonOutput)
        .unwrap();

    let ledger = Ledger::load(&workspace.ledger_path()).unwrap();
    assert!(ledger
        .rows()
        .iter()
        .all(|row| row.status().public_in_ena() == Flag::No));

    let journal = CheckJournal::load(&workspace.journal_path()).unwrap();
    let entry = journal
        .get((1, AccessionType::Gca), CheckKind::Release)
        .unwrap();
    assert_eq!(entry.attempt_count, 2);
    assert_eq!(entry.last_checked, run_date().succ_opt().unwrap());
    // nothing is public at the archive yet, so the mirror is never asked
    assert!(journal.get((1, AccessionType::Contigs), CheckKind::Mirror).is_none());
}

#[test]
fn concurrent_run_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_root(&temp);
    let (workspace, names) = setup(&root);
    let tracker = Tracker::new(
        workspace.clone(),
        Some(names),
        MockEna::default(),
        MockNcbi::default(),
        seeded_store(),
    );

    let _held = workspace.lock().unwrap();
    let err = tracker.run(Action::Track, run_date(), &JsonOutput).unwrap_err();
    assert_matches!(err, TrackerError::LedgerLocked(_));
}

#[test]
fn discovery_without_names_file_is_missing_input() {
    let temp = tempfile::tempdir().unwrap();
    let root = utf8_root(&temp);
    let tracker = Tracker::new(
        Workspace::new(&root, "darwin"),
        None,
        MockEna::default(),
        MockNcbi::default(),
        seeded_store(),
    );
    let err = tracker.run(Action::Sql, run_date(), &JsonOutput).unwrap_err();
    assert_matches!(err, TrackerError::MissingInput(_));
}
