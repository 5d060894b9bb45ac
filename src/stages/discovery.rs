use std::collections::{BTreeMap, BTreeSet};
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::error::TrackerError;
use crate::ledger::Ledger;
use crate::store::Workspace;
use crate::submissions::{AssemblyStatus, COMPLETED_STATE, READY_STATUS, SubmissionStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredSubmission {
    pub name: String,
    pub gca_accession: Option<String>,
    pub contig_range: Option<String>,
    pub chromosome_range: Option<String>,
    pub project: Option<String>,
    pub sample: Option<String>,
    pub assembly_type: Option<String>,
    pub analysis_id: Option<String>,
}

impl From<AssemblyStatus> for DiscoveredSubmission {
    fn from(status: AssemblyStatus) -> Self {
        Self {
            name: status.name,
            gca_accession: status.gca_accession,
            contig_range: status.contig_range,
            chromosome_range: status.chromosome_range,
            project: status.project,
            sample: status.sample,
            assembly_type: status.assembly_type,
            analysis_id: status.analysis_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryNote {
    pub name: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub discovered: Vec<DiscoveredSubmission>,
    pub notes: Vec<DiscoveryNote>,
}

pub fn search_pattern(name: &str) -> Result<String, String> {
    let parts = name.trim().split('.').collect::<Vec<_>>();
    if parts.iter().any(|part| part.is_empty()) {
        return Err("unexpected format: empty name segment".to_string());
    }
    match parts.as_slice() {
        [prefix, _] => Ok(format!("{prefix}%")),
        [prefix, segment, _] => Ok(format!("{prefix}.{segment}%")),
        _ => Err(format!(
            "unexpected format: {} dot-separated segments",
            parts.len()
        )),
    }
}

pub fn read_tracked_names(path: &Utf8Path) -> Result<Vec<String>, TrackerError> {
    if !path.as_std_path().exists() {
        return Err(TrackerError::MissingInput(path.to_string()));
    }
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| TrackerError::Filesystem(format!("read {path}: {err}")))?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());
    let mut names = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let Some(value) = record.get(0).map(str::trim) else {
            continue;
        };
        if value.is_empty() || (line == 0 && value.eq_ignore_ascii_case("name")) {
            continue;
        }
        names.push(value.to_string());
    }
    Ok(names)
}

pub fn discover<S: SubmissionStore + ?Sized>(
    tracked: &[String],
    ledger: &Ledger,
    store: &S,
    sink: &dyn ProgressSink,
) -> DiscoveryReport {
    let known = ledger.names();
    let mut discovered: BTreeMap<String, DiscoveredSubmission> = BTreeMap::new();
    let mut notes = Vec::new();
    let mut seen_patterns = BTreeSet::new();

    for name in tracked {
        let pattern = match search_pattern(name) {
            Ok(pattern) => pattern,
            Err(note) => {
                warn!(name = %name, note = %note, "skipping tracked name");
                notes.push(DiscoveryNote {
                    name: name.clone(),
                    note,
                });
                continue;
            }
        };
        if !seen_patterns.insert(pattern.clone()) {
            continue;
        }
        sink.event(ProgressEvent::message(format!("discovery; pattern {pattern}")));

        let runs = match store.pipeline_runs(&pattern) {
            Ok(runs) => runs,
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "pipeline status lookup failed");
                notes.push(DiscoveryNote {
                    name: name.clone(),
                    note: format!("pipeline status lookup failed: {err}"),
                });
                continue;
            }
        };

        let completed = runs
            .into_iter()
            .filter(|run| run.state == COMPLETED_STATE)
            .map(|run| run.submission_name)
            .collect::<BTreeSet<_>>();
        if completed.is_empty() {
            debug!(pattern = %pattern, "no completed pipeline runs");
            continue;
        }

        for submission in completed {
            if known.contains(submission.as_str()) || discovered.contains_key(&submission) {
                continue;
            }
            match store.assembly_status(&submission) {
                Ok(statuses) => {
                    let ready = statuses
                        .into_iter()
                        .find(|status| status.status_id == READY_STATUS);
                    match ready {
                        Some(status) => {
                            info!(submission = %submission, "discovered submission");
                            discovered.insert(submission, status.into());
                        }
                        None => debug!(submission = %submission, "submission not ready"),
                    }
                }
                Err(err) => {
                    warn!(submission = %submission, error = %err, "assembly status lookup failed");
                    notes.push(DiscoveryNote {
                        name: submission.clone(),
                        note: format!("assembly status lookup failed: {err}"),
                    });
                }
            }
        }
    }

    DiscoveryReport {
        discovered: discovered.into_values().collect(),
        notes,
    }
}

pub fn write_discovered(
    path: &Utf8Path,
    submissions: &[DiscoveredSubmission],
) -> Result<(), TrackerError> {
    Workspace::write_table(path, submissions)
}

pub fn read_discovered(path: &Utf8Path) -> Result<Vec<DiscoveredSubmission>, TrackerError> {
    if !path.as_std_path().exists() {
        return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path.as_std_path())?;
    Ok(reader
        .deserialize::<DiscoveredSubmission>()
        .collect::<Result<Vec<_>, _>>()?)
}

pub fn write_notes(path: &Utf8Path, notes: &[DiscoveryNote]) -> Result<(), TrackerError> {
    Workspace::write_table(path, notes)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::output::LogSink;
    use crate::submissions::PipelineRun;

    #[derive(Default)]
    struct MockStore {
        runs: Vec<PipelineRun>,
        statuses: Vec<AssemblyStatus>,
        queried: RefCell<Vec<String>>,
    }

    impl SubmissionStore for MockStore {
        fn pipeline_runs(&self, alias_pattern: &str) -> Result<Vec<PipelineRun>, TrackerError> {
            self.queried.borrow_mut().push(alias_pattern.to_string());
            let prefix = alias_pattern.trim_end_matches('%');
            Ok(self
                .runs
                .iter()
                .filter(|run| run.alias.starts_with(prefix))
                .cloned()
                .collect())
        }

        fn assembly_status(&self, name: &str) -> Result<Vec<AssemblyStatus>, TrackerError> {
            Ok(self
                .statuses
                .iter()
                .filter(|status| status.name == name)
                .cloned()
                .collect())
        }
    }

    fn run(alias: &str, name: &str, state: &str) -> PipelineRun {
        PipelineRun {
            alias: alias.to_string(),
            submission_name: name.to_string(),
            state: state.to_string(),
        }
    }

    fn status(name: &str, status_id: i64) -> AssemblyStatus {
        AssemblyStatus {
            name: name.to_string(),
            status_id,
            gca_accession: Some("GCA_900000003.1".to_string()),
            ..AssemblyStatus::default()
        }
    }

    #[test]
    fn patterns_by_segment_count() {
        assert_eq!(search_pattern("toolkit.2").unwrap(), "toolkit%");
        assert_eq!(search_pattern("ilToolkit.hap1.3").unwrap(), "ilToolkit.hap1%");
        assert!(search_pattern("toolkit").is_err());
        assert!(search_pattern("a.b.c.d").is_err());
        assert!(search_pattern("toolkit.").is_err());
    }

    #[test]
    fn only_completed_ready_and_unknown_names_are_discovered() {
        let store = MockStore {
            runs: vec![
                run("toolkit_a", "toolkit.2", "COMPLETED"),
                run("toolkit_b", "toolkit.3", "COMPLETED"),
                run("toolkit_c", "toolkit.4", "RUNNING"),
                run("toolkit_d", "toolkit.5", "COMPLETED"),
            ],
            statuses: vec![status("toolkit.3", 4), status("toolkit.5", 2)],
            ..MockStore::default()
        };
        let ledger = Ledger::default();
        let tracked = vec![
            "toolkit.2".to_string(),
            "toolkit.9".to_string(),
            "weird".to_string(),
        ];

        let report = discover(&tracked, &ledger, &store, &LogSink);
        assert_eq!(report.discovered.len(), 1);
        assert_eq!(report.discovered[0].name, "toolkit.3");
        assert_eq!(report.notes.len(), 1);
        assert_eq!(report.notes[0].name, "weird");
        // both tracked names share a pattern, so the store is queried once
        assert_eq!(store.queried.borrow().as_slice(), ["toolkit%"]);
    }

    #[test]
    fn tracked_names_sheet_with_header() {
        let temp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("names.txt")).unwrap();
        fs::write(path.as_std_path(), "name\tcomment\ntoolkit.2\tfirst\n\nother.1.1\n").unwrap();
        let names = read_tracked_names(&path).unwrap();
        assert_eq!(names, vec!["toolkit.2", "other.1.1"]);
    }

    #[test]
    fn discovered_file_round_trips_empty_ranges() {
        let temp = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(temp.path().join("found.txt")).unwrap();
        let rows = vec![DiscoveredSubmission::from(status("toolkit.3", 4))];
        write_discovered(&path, &rows).unwrap();
        let loaded = read_discovered(&path).unwrap();
        assert_eq!(loaded, rows);
        assert!(loaded[0].contig_range.is_none());
    }
}
