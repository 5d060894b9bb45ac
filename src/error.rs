use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TrackerError {
    #[error("invalid accession type: {0}")]
    InvalidAccessionType(String),

    #[error("invalid assembly type: {0}")]
    InvalidAssemblyType(String),

    #[error("invalid status flag: {0} (expected Y or N)")]
    InvalidFlag(String),

    #[error("submission name has no numeric version suffix: {0}")]
    InvalidSubmissionName(String),

    #[error("invalid accession range: {0}")]
    InvalidAccessionRange(String),

    #[error("invalid date: {0} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    #[error("missing config file asm-track.json in working directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("missing input file: {0}")]
    MissingInput(String),

    #[error("malformed ledger at line {line}: {message}")]
    LedgerFormat { line: u64, message: String },

    #[error("ledger is locked by another run: {0}")]
    #[diagnostic(help("remove the lock file if no other tracker run is active"))]
    LedgerLocked(String),

    #[error("submission store error: {0}")]
    SubmissionStore(String),

    #[error("ENA request failed: {0}")]
    EnaHttp(String),

    #[error("ENA returned status {status}: {message}")]
    EnaStatus { status: u16, message: String },

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("unexpected response payload: {0}")]
    Payload(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("table error: {0}")]
    Table(String),
}

impl TrackerError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TrackerError::EnaStatus { status, .. } | TrackerError::NcbiStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<csv::Error> for TrackerError {
    fn from(err: csv::Error) -> Self {
        TrackerError::Table(err.to_string())
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::SubmissionStore(err.to_string())
    }
}
