use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use assembly_tracker::error::TrackerError;
use assembly_tracker::ledger::Ledger;
use assembly_tracker::store::Workspace;

const LEDGER: &str = "\tname\tindex\taccession_type\taccessions\tanalysis ID\tversion\tproject\tsample ID\ttax_id\tscientific_name\tassembly_type\tPublic in ENA\tPublic in NCBI\tLinked to Project\tLinked to Sample\tpublicly available date\n\
0\tasm5.1\t5\tContigs\tABCD01000001-ABCD01000010\t\t1\tPRJEB1\tSAMEA1\t562\tEscherichia coli\tclone or isolate\tY\tN\tY\tY\t2026-10-01\n\
1\tasm5.1\t5\tChromosomes\tLR123456-LR123460\t\t1\tPRJEB1\tSAMEA1\t562\tEscherichia coli\tclone or isolate\tN\tN\tN\tN\t\n\
2\tasm5.1\t5\tGCA\tGCA_900000001\t\t1\tPRJEB1\tSAMEA1\t562\tEscherichia coli\tclone or isolate\tN\tN\tN\tN\t\n";

fn workspace(temp: &tempfile::TempDir) -> Workspace {
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    Workspace::new(&root, "darwin")
}

#[test]
fn ledger_survives_save_and_load_unchanged() {
    let temp = tempfile::tempdir().unwrap();
    let workspace = workspace(&temp);
    workspace.ensure_root().unwrap();
    fs::write(workspace.ledger_path().as_std_path(), LEDGER).unwrap();

    let ledger = Ledger::load(&workspace.ledger_path()).unwrap();
    assert_eq!(ledger.len(), 3);
    ledger.save(&workspace.ledger_path()).unwrap();
    let written = fs::read_to_string(workspace.ledger_path().as_std_path()).unwrap();
    assert_eq!(written, LEDGER);
}

#[test]
fn missing_ledger_loads_empty() {
    let temp = tempfile::tempdir().unwrap();
    let ledger = Ledger::load(&workspace(&temp).ledger_path()).unwrap();
    assert!(ledger.is_empty());
}

#[test]
fn atomic_write_leaves_no_temp_files() {
    let temp = tempfile::tempdir().unwrap();
    let workspace = workspace(&temp);
    let path = workspace.report_path("public_gcas.txt");
    Workspace::write_bytes_atomic(&path, b"one\n").unwrap();
    Workspace::write_bytes_atomic(&path, b"two\n").unwrap();

    let entries = fs::read_dir(workspace.root().as_std_path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(entries, vec!["public_gcas.txt".to_string()]);
    assert_eq!(fs::read_to_string(path.as_std_path()).unwrap(), "two\n");
}

#[test]
fn lock_is_exclusive_until_dropped() {
    let temp = tempfile::tempdir().unwrap();
    let workspace = workspace(&temp);
    let lock = workspace.lock().unwrap();
    assert_matches!(workspace.lock(), Err(TrackerError::LedgerLocked(_)));
    drop(lock);
    assert!(workspace.lock().is_ok());
}
