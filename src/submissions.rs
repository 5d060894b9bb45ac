use camino::Utf8Path;
use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub const COMPLETED_STATE: &str = "COMPLETED";
pub const READY_STATUS: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub alias: String,
    pub submission_name: String,
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyStatus {
    pub name: String,
    pub status_id: i64,
    pub gca_accession: Option<String>,
    pub contig_range: Option<String>,
    pub chromosome_range: Option<String>,
    pub project: Option<String>,
    pub sample: Option<String>,
    pub assembly_type: Option<String>,
    pub analysis_id: Option<String>,
}

pub trait SubmissionStore {
    fn pipeline_runs(&self, alias_pattern: &str) -> Result<Vec<PipelineRun>, TrackerError>;
    fn assembly_status(&self, name: &str) -> Result<Vec<AssemblyStatus>, TrackerError>;
}

pub struct SqliteSubmissionStore {
    conn: Connection,
}

impl SqliteSubmissionStore {
    pub fn open(path: &Utf8Path) -> Result<Self, TrackerError> {
        if !path.as_std_path().exists() {
            return Err(TrackerError::MissingInput(path.to_string()));
        }
        let conn = Connection::open_with_flags(path.as_std_path(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS pipeline_status (
                alias TEXT NOT NULL,
                submission_name TEXT NOT NULL,
                state TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS assembly_status (
                name TEXT NOT NULL,
                status_id INTEGER NOT NULL,
                gc_accession TEXT,
                contig_range TEXT,
                chromosome_range TEXT,
                project_id TEXT,
                sample_id TEXT,
                assembly_type TEXT,
                analysis_id TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_assembly_status_name ON assembly_status(name)",
            [],
        )?;
        Ok(())
    }
}

impl SubmissionStore for SqliteSubmissionStore {
    fn pipeline_runs(&self, alias_pattern: &str) -> Result<Vec<PipelineRun>, TrackerError> {
        let mut stmt = self.conn.prepare(
            "SELECT alias, submission_name, state FROM pipeline_status
             WHERE alias LIKE ?1 ORDER BY alias",
        )?;
        let rows = stmt.query_map(params![alias_pattern], |row| {
            Ok(PipelineRun {
                alias: row.get(0)?,
                submission_name: row.get(1)?,
                state: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn assembly_status(&self, name: &str) -> Result<Vec<AssemblyStatus>, TrackerError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, status_id, gc_accession, contig_range, chromosome_range,
                    project_id, sample_id, assembly_type, analysis_id
             FROM assembly_status WHERE name = ?1",
        )?;
        let rows = stmt.query_map(params![name], |row| {
            Ok(AssemblyStatus {
                name: row.get(0)?,
                status_id: row.get(1)?,
                gca_accession: row.get(2)?,
                contig_range: row.get(3)?,
                chromosome_range: row.get(4)?,
                project: row.get(5)?,
                sample: row.get(6)?,
                assembly_type: row.get(7)?,
                analysis_id: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
