pub mod discovery;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod ingest;
pub mod linkage;
pub mod links;
pub mod mirror;
pub mod release;
pub mod report;

use serde::Serialize;

use crate::domain::AccessionType;
use crate::error::TrackerError;
use crate::ledger::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusError {
    pub key: String,
    pub status: Option<u16>,
    pub message: String,
}

impl StatusError {
    pub fn from_error(key: &str, err: &TrackerError) -> Self {
        Self {
            key: key.to_string(),
            status: err.status(),
            message: err.to_string(),
        }
    }

    pub fn new(key: &str, message: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            status: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageOutcome<R> {
    pub ledger: Ledger,
    pub report: R,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Progress {
    pub updated: Vec<(u32, AccessionType)>,
    pub unresolved: Vec<(u32, AccessionType)>,
}
