use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{Read, Write};

use camino::Utf8Path;
use chrono::NaiveDate;
use csv::StringRecord;
use serde::Serialize;

use crate::domain::{AccessionRange, AccessionType, AssemblyType, Flag};
use crate::error::TrackerError;
use crate::store::Workspace;

pub const COL_NAME: &str = "name";
pub const COL_INDEX: &str = "index";
pub const COL_ACCESSION_TYPE: &str = "accession_type";
pub const COL_ACCESSIONS: &str = "accessions";
pub const COL_ANALYSIS_ID: &str = "analysis ID";
pub const COL_VERSION: &str = "version";
pub const COL_PROJECT: &str = "project";
pub const COL_SAMPLE_ID: &str = "sample ID";
pub const COL_TAX_ID: &str = "tax_id";
pub const COL_SCIENTIFIC_NAME: &str = "scientific_name";
pub const COL_ASSEMBLY_TYPE: &str = "assembly_type";
pub const COL_PUBLIC_IN_ENA: &str = "Public in ENA";
pub const COL_PUBLIC_IN_NCBI: &str = "Public in NCBI";
pub const COL_LINKED_TO_PROJECT: &str = "Linked to Project";
pub const COL_LINKED_TO_SAMPLE: &str = "Linked to Sample";
pub const COL_PUBLIC_DATE: &str = "publicly available date";

pub const COLUMNS: [&str; 16] = [
    COL_NAME,
    COL_INDEX,
    COL_ACCESSION_TYPE,
    COL_ACCESSIONS,
    COL_ANALYSIS_ID,
    COL_VERSION,
    COL_PROJECT,
    COL_SAMPLE_ID,
    COL_TAX_ID,
    COL_SCIENTIFIC_NAME,
    COL_ASSEMBLY_TYPE,
    COL_PUBLIC_IN_ENA,
    COL_PUBLIC_IN_NCBI,
    COL_LINKED_TO_PROJECT,
    COL_LINKED_TO_SAMPLE,
    COL_PUBLIC_DATE,
];

const REQUIRED: [&str; 12] = [
    COL_NAME,
    COL_INDEX,
    COL_ACCESSION_TYPE,
    COL_ACCESSIONS,
    COL_VERSION,
    COL_PROJECT,
    COL_SAMPLE_ID,
    COL_ASSEMBLY_TYPE,
    COL_PUBLIC_IN_ENA,
    COL_PUBLIC_IN_NCBI,
    COL_LINKED_TO_PROJECT,
    COL_LINKED_TO_SAMPLE,
];

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Fields stay private: `mark_*` is the only way to change them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowStatus {
    public_in_ena: Flag,
    public_in_ncbi: Flag,
    linked_to_project: Flag,
    linked_to_sample: Flag,
    public_date: Option<NaiveDate>,
}

impl RowStatus {
    fn pending() -> Self {
        Self {
            public_in_ena: Flag::No,
            public_in_ncbi: Flag::No,
            linked_to_project: Flag::No,
            linked_to_sample: Flag::No,
            public_date: None,
        }
    }

    // Keeps every flag already raised in `self`, whatever `next` says.
    fn raised_by(&self, next: RowStatus) -> RowStatus {
        let raise = |current: Flag, next: Flag| {
            if current.is_set() {
                current
            } else {
                next
            }
        };
        RowStatus {
            public_in_ena: raise(self.public_in_ena, next.public_in_ena),
            public_in_ncbi: raise(self.public_in_ncbi, next.public_in_ncbi),
            linked_to_project: raise(self.linked_to_project, next.linked_to_project),
            linked_to_sample: raise(self.linked_to_sample, next.linked_to_sample),
            public_date: self.public_date.or(next.public_date),
        }
    }

    pub fn public_in_ena(&self) -> Flag {
        self.public_in_ena
    }

    pub fn public_in_ncbi(&self) -> Flag {
        self.public_in_ncbi
    }

    pub fn linked_to_project(&self) -> Flag {
        self.linked_to_project
    }

    pub fn linked_to_sample(&self) -> Flag {
        self.linked_to_sample
    }

    pub fn public_date(&self) -> Option<NaiveDate> {
        self.public_date
    }

    pub fn mark_public_in_ena(&mut self, date: NaiveDate) {
        if !self.public_in_ena.is_set() {
            self.public_in_ena.raise();
            self.public_date = Some(date);
        }
    }

    pub fn mark_public_in_ncbi(&mut self) {
        self.public_in_ncbi.raise();
    }

    pub fn mark_linked_to_project(&mut self) {
        self.linked_to_project.raise();
    }

    pub fn mark_linked_to_sample(&mut self) {
        self.linked_to_sample.raise();
    }

    pub fn fully_linked(&self) -> bool {
        self.linked_to_project.is_set() && self.linked_to_sample.is_set()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRow {
    pub name: String,
    pub index: u32,
    pub accession_type: AccessionType,
    pub accessions: String,
    pub analysis_id: Option<String>,
    pub version: u32,
    pub project: String,
    pub sample_id: String,
    pub tax_id: Option<String>,
    pub scientific_name: Option<String>,
    pub assembly_type: AssemblyType,
    status: RowStatus,
}

impl LedgerRow {
    pub fn status(&self) -> &RowStatus {
        &self.status
    }

    pub fn range(&self) -> Option<AccessionRange> {
        self.accessions.parse().ok()
    }

    pub fn first_accession(&self) -> Option<String> {
        self.range().map(|range| range.first)
    }

    pub fn uses_analysis(&self) -> bool {
        self.assembly_type.uses_analysis()
            && self
                .analysis_id
                .as_deref()
                .is_some_and(|id| !id.trim().is_empty())
    }

    pub fn key(&self) -> (u32, AccessionType) {
        (self.index, self.accession_type)
    }

    fn to_record(&self, position: usize) -> Vec<String> {
        vec![
            position.to_string(),
            self.name.clone(),
            self.index.to_string(),
            self.accession_type.to_string(),
            self.accessions.clone(),
            self.analysis_id.clone().unwrap_or_default(),
            self.version.to_string(),
            self.project.clone(),
            self.sample_id.clone(),
            self.tax_id.clone().unwrap_or_default(),
            self.scientific_name.clone().unwrap_or_default(),
            self.assembly_type.to_string(),
            self.status.public_in_ena.to_string(),
            self.status.public_in_ncbi.to_string(),
            self.status.linked_to_project.to_string(),
            self.status.linked_to_sample.to_string(),
            self.status
                .public_date
                .map(|date| date.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        ]
    }
}

pub struct NewRow {
    pub name: String,
    pub index: u32,
    pub accession_type: AccessionType,
    pub accessions: String,
    pub analysis_id: Option<String>,
    pub version: u32,
    pub project: String,
    pub sample_id: String,
    pub tax_id: Option<String>,
    pub scientific_name: Option<String>,
    pub assembly_type: AssemblyType,
}

impl From<NewRow> for LedgerRow {
    fn from(row: NewRow) -> Self {
        Self {
            name: row.name,
            index: row.index,
            accession_type: row.accession_type,
            accessions: row.accessions,
            analysis_id: row.analysis_id,
            version: row.version,
            project: row.project,
            sample_id: row.sample_id,
            tax_id: row.tax_id,
            scientific_name: row.scientific_name,
            assembly_type: row.assembly_type,
            status: RowStatus::pending(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    rows: Vec<LedgerRow>,
}

impl Ledger {
    pub fn from_rows(rows: Vec<LedgerRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn max_index(&self) -> Option<u32> {
        self.rows.iter().map(|row| row.index).max()
    }

    pub fn names(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|row| row.name.as_str()).collect()
    }

    pub fn groups(&self) -> BTreeMap<u32, Vec<&LedgerRow>> {
        let mut groups: BTreeMap<u32, Vec<&LedgerRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.index).or_default().push(row);
        }
        groups
    }

    pub fn concat(&self, extra: Vec<LedgerRow>) -> Ledger {
        let mut rows = self.rows.clone();
        rows.extend(extra);
        Ledger { rows }
    }

    pub fn with_status_updates<F>(&self, mut update: F) -> Ledger
    where
        F: FnMut(&LedgerRow, &mut RowStatus),
    {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut status = row.status.clone();
                update(row, &mut status);
                LedgerRow {
                    status: row.status.raised_by(status),
                    ..row.clone()
                }
            })
            .collect();
        Ledger { rows }
    }

    pub fn load(path: &Utf8Path) -> Result<Ledger, TrackerError> {
        if !path.as_std_path().exists() {
            return Ok(Ledger::default());
        }
        let file = fs::File::open(path.as_std_path())
            .map_err(|err| TrackerError::Filesystem(format!("open {path}: {err}")))?;
        Ledger::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Ledger, TrackerError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);
        let headers = reader.headers()?.clone();
        let columns = ColumnMap::new(&headers)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            rows.push(columns.parse_row(&record).map_err(|message| {
                TrackerError::LedgerFormat { line, message }
            })?);
        }
        Ok(Ledger { rows })
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), TrackerError> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        let mut header = vec![""];
        header.extend(COLUMNS);
        writer.write_record(&header)?;
        for (position, row) in self.rows.iter().enumerate() {
            writer.write_record(row.to_record(position))?;
        }
        writer
            .flush()
            .map_err(|err| TrackerError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TrackerError> {
        let mut buffer = Vec::new();
        self.to_writer(&mut buffer)?;
        Ok(buffer)
    }

    pub fn save(&self, path: &Utf8Path) -> Result<(), TrackerError> {
        Workspace::write_bytes_atomic(path, &self.to_bytes()?)
    }
}

struct ColumnMap {
    positions: HashMap<String, usize>,
}

impl ColumnMap {
    fn new(headers: &StringRecord) -> Result<Self, TrackerError> {
        let positions = headers
            .iter()
            .enumerate()
            .map(|(pos, name)| (name.trim().to_string(), pos))
            .collect::<HashMap<_, _>>();
        for required in REQUIRED {
            if !positions.contains_key(required) {
                return Err(TrackerError::LedgerFormat {
                    line: 1,
                    message: format!("missing column `{required}`"),
                });
            }
        }
        Ok(Self { positions })
    }

    fn get<'r>(&self, record: &'r StringRecord, column: &str) -> &'r str {
        self.positions
            .get(column)
            .and_then(|pos| record.get(*pos))
            .map(str::trim)
            .unwrap_or("")
    }

    fn optional(&self, record: &StringRecord, column: &str) -> Option<String> {
        let value = self.get(record, column);
        (!value.is_empty() && value != "nan").then(|| value.to_string())
    }

    fn parse_row(&self, record: &StringRecord) -> Result<LedgerRow, String> {
        let index = parse_integer(self.get(record, COL_INDEX), COL_INDEX)?;
        let version = parse_integer(self.get(record, COL_VERSION), COL_VERSION)?;
        let accession_type = self
            .get(record, COL_ACCESSION_TYPE)
            .parse::<AccessionType>()
            .map_err(|err| err.to_string())?;
        let assembly_type = self
            .get(record, COL_ASSEMBLY_TYPE)
            .parse::<AssemblyType>()
            .map_err(|err| err.to_string())?;
        let flag = |column: &str| {
            self.get(record, column)
                .parse::<Flag>()
                .map_err(|err| format!("{column}: {err}"))
        };
        let public_date = match self.optional(record, COL_PUBLIC_DATE) {
            Some(value) => Some(
                NaiveDate::parse_from_str(&value, DATE_FORMAT)
                    .map_err(|_| format!("{COL_PUBLIC_DATE}: invalid date `{value}`"))?,
            ),
            None => None,
        };

        Ok(LedgerRow {
            name: self.get(record, COL_NAME).to_string(),
            index,
            accession_type,
            accessions: self.get(record, COL_ACCESSIONS).to_string(),
            analysis_id: self.optional(record, COL_ANALYSIS_ID),
            version,
            project: self.get(record, COL_PROJECT).to_string(),
            sample_id: self.get(record, COL_SAMPLE_ID).to_string(),
            tax_id: self.optional(record, COL_TAX_ID),
            scientific_name: self.optional(record, COL_SCIENTIFIC_NAME),
            assembly_type,
            status: RowStatus {
                public_in_ena: flag(COL_PUBLIC_IN_ENA)?,
                public_in_ncbi: flag(COL_PUBLIC_IN_NCBI)?,
                linked_to_project: flag(COL_LINKED_TO_PROJECT)?,
                linked_to_sample: flag(COL_LINKED_TO_SAMPLE)?,
                public_date,
            },
        })
    }
}

// pandas writes integer columns holding NaN as floats, so `3.0` is accepted.
fn parse_integer(value: &str, column: &str) -> Result<u32, String> {
    let trimmed = value.strip_suffix(".0").unwrap_or(value);
    trimmed
        .parse::<u32>()
        .map_err(|_| format!("{column}: expected an integer, found `{value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEGACY: &str = "\tname\tindex\taccession_type\taccessions\tversion\tproject\tsample ID\tassembly_type\tPublic in ENA\tPublic in NCBI\tLinked to Project\tLinked to Sample\n\
0\ttoolkit.2\t4.0\tGCA\tGCA_900000002\t2\tPRJEB1\tSAMEA1\tclone or isolate\tN\tN\tY\tN\n";

    #[test]
    fn legacy_ledger_without_optional_columns() {
        let ledger = Ledger::from_reader(LEGACY.as_bytes()).unwrap();
        assert_eq!(ledger.len(), 1);
        let row = &ledger.rows()[0];
        assert_eq!(row.index, 4);
        assert_eq!(row.accession_type, AccessionType::Gca);
        assert!(row.analysis_id.is_none());
        assert!(row.status().linked_to_project().is_set());
        assert!(row.status().public_date().is_none());
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let err = Ledger::from_reader("\tname\tindex\n0\ta.1\t1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrackerError::LedgerFormat { line: 1, .. }));
    }

    #[test]
    fn public_date_is_stamped_once() {
        let mut status = RowStatus::pending();
        let first = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let later = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        status.mark_public_in_ena(first);
        status.mark_public_in_ena(later);
        assert_eq!(status.public_date(), Some(first));
    }

    #[test]
    fn replacing_a_status_cannot_lower_flags() {
        let ledger = Ledger::from_reader(LEGACY.as_bytes()).unwrap();
        let released = ledger.with_status_updates(|_, status| {
            status.mark_public_in_ena(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        });
        let blank = RowStatus::pending();
        let reset = released.with_status_updates(|_, status| *status = blank.clone());
        let status = reset.rows()[0].status();
        assert!(status.public_in_ena().is_set());
        assert!(status.linked_to_project().is_set());
        assert!(status.public_date().is_some());
        assert_eq!(reset, released);
    }
}
