use std::collections::BTreeMap;
use std::fs;

use camino::Utf8Path;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::AccessionType;
use crate::error::TrackerError;
use crate::store::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Release,
    Linkage,
    Mirror,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub index: u32,
    pub accession_type: AccessionType,
    pub check: CheckKind,
    pub last_checked: NaiveDate,
    pub attempt_count: u32,
}

type JournalKey = (u32, AccessionType, CheckKind);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckJournal {
    entries: BTreeMap<JournalKey, JournalEntry>,
}

impl CheckJournal {
    pub fn load(path: &Utf8Path) -> Result<Self, TrackerError> {
        if !path.as_std_path().exists() {
            return Ok(Self::default());
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("open {path}: {err}")))?;
        let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_reader(file);
        let mut entries = BTreeMap::new();
        for entry in reader.deserialize::<JournalEntry>() {
            let entry = entry?;
            entries.insert((entry.index, entry.accession_type, entry.check), entry);
        }
        Ok(Self { entries })
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), TrackerError> {
        let entries = self.entries.values().collect::<Vec<_>>();
        Workspace::write_table(path, &entries)
    }

    pub fn get(&self, key: (u32, AccessionType), check: CheckKind) -> Option<&JournalEntry> {
        self.entries.get(&(key.0, key.1, check))
    }

    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> {
        self.entries.values()
    }

    pub fn record(
        &mut self,
        check: CheckKind,
        date: NaiveDate,
        unresolved: &[(u32, AccessionType)],
        resolved: &[(u32, AccessionType)],
    ) {
        for (index, accession_type) in resolved {
            self.entries.remove(&(*index, *accession_type, check));
        }
        for (index, accession_type) in unresolved {
            let entry = self
                .entries
                .entry((*index, *accession_type, check))
                .or_insert_with(|| JournalEntry {
                    index: *index,
                    accession_type: *accession_type,
                    check,
                    last_checked: date,
                    attempt_count: 0,
                });
            entry.last_checked = date;
            entry.attempt_count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    #[test]
    fn attempts_accumulate_and_clear_on_success() {
        let mut journal = CheckJournal::default();
        let day1 = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let day2 = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        let key = (7, AccessionType::Gca);

        journal.record(CheckKind::Release, day1, &[key], &[]);
        journal.record(CheckKind::Release, day2, &[key], &[]);
        let entry = journal.get(key, CheckKind::Release).unwrap();
        assert_eq!(entry.attempt_count, 2);
        assert_eq!(entry.last_checked, day2);
        assert!(journal.get(key, CheckKind::Mirror).is_none());

        journal.record(CheckKind::Release, day2, &[], &[key]);
        assert!(journal.get(key, CheckKind::Release).is_none());
    }

    #[test]
    fn journal_survives_save_and_load() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("journal.txt")).unwrap();
        let mut journal = CheckJournal::default();
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        journal.record(CheckKind::Linkage, day, &[(3, AccessionType::Chromosomes)], &[]);
        journal.save(&path).unwrap();

        let loaded = CheckJournal::load(&path).unwrap();
        assert_eq!(loaded, journal);
    }
}
