use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tempfile::Builder;

use crate::error::TrackerError;

pub const LEDGER_FILE: &str = "tracking_file.txt";
pub const DISCOVERED_FILE: &str = "discovered_submissions.txt";
pub const DISCOVERY_NOTES_FILE: &str = "discovery_notes.txt";
pub const JOURNAL_FILE: &str = "check_journal.txt";
pub const PUBLIC_HISTORY_FILE: &str = "public_gcas_history.txt";
const LOCK_FILE: &str = ".tracker.lock";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    pub fn new(workdir: &Utf8Path, project: &str) -> Self {
        Self {
            root: workdir.join(format!("{project}-tracking-files")),
        }
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn ledger_path(&self) -> Utf8PathBuf {
        self.root.join(LEDGER_FILE)
    }

    pub fn discovered_path(&self) -> Utf8PathBuf {
        self.root.join(DISCOVERED_FILE)
    }

    pub fn discovery_notes_path(&self) -> Utf8PathBuf {
        self.root.join(DISCOVERY_NOTES_FILE)
    }

    pub fn journal_path(&self) -> Utf8PathBuf {
        self.root.join(JOURNAL_FILE)
    }

    pub fn report_path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    pub fn public_history_path(&self) -> Utf8PathBuf {
        self.root.join(PUBLIC_HISTORY_FILE)
    }

    pub fn ensure_root(&self) -> Result<(), TrackerError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))
    }

    pub fn lock(&self) -> Result<RunLock, TrackerError> {
        self.ensure_root()?;
        let path = self.root.join(LOCK_FILE);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path.as_std_path())
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::AlreadyExists => TrackerError::LedgerLocked(path.to_string()),
                _ => TrackerError::Filesystem(format!("create {path}: {err}")),
            })?;
        writeln!(file, "pid={}", std::process::id())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        Ok(RunLock { path })
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), TrackerError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".asm-track")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("persist {path}: {err}")))?;
        Ok(())
    }

    pub fn write_table<T: Serialize>(path: &Utf8Path, rows: &[T]) -> Result<(), TrackerError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());
        for row in rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| TrackerError::Table(err.to_string()))?;
        Self::write_bytes_atomic(path, &bytes)
    }

    pub fn append_bytes(path: &Utf8Path, content: &[u8]) -> Result<(), TrackerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("open {path}: {err}")))?;
        file.write_all(content)
            .map_err(|err| TrackerError::Filesystem(err.to_string()))
    }
}

#[derive(Debug)]
pub struct RunLock {
    path: Utf8PathBuf,
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(self.path.as_std_path());
    }
}
