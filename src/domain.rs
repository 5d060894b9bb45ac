use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

static WGS_CONTIG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z]{4,6}[0-9]{2})[0-9]{6,}$").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccessionType {
    Contigs,
    Chromosomes,
    #[serde(rename = "GCA")]
    Gca,
}

impl AccessionType {
    pub const ALL: [AccessionType; 3] = [
        AccessionType::Contigs,
        AccessionType::Chromosomes,
        AccessionType::Gca,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessionType::Contigs => "Contigs",
            AccessionType::Chromosomes => "Chromosomes",
            AccessionType::Gca => "GCA",
        }
    }

    pub fn is_sequence_level(self) -> bool {
        !matches!(self, AccessionType::Gca)
    }
}

impl fmt::Display for AccessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessionType {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Contigs" => Ok(AccessionType::Contigs),
            "Chromosomes" => Ok(AccessionType::Chromosomes),
            "GCA" => Ok(AccessionType::Gca),
            _ => Err(TrackerError::InvalidAccessionType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssemblyType {
    #[serde(rename = "clone or isolate")]
    CloneOrIsolate,
    #[serde(rename = "Metagenome-Assembled Genome (MAG)")]
    Mag,
    #[serde(rename = "primary metagenome")]
    PrimaryMetagenome,
    #[serde(rename = "binned metagenome")]
    BinnedMetagenome,
}

impl AssemblyType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssemblyType::CloneOrIsolate => "clone or isolate",
            AssemblyType::Mag => "Metagenome-Assembled Genome (MAG)",
            AssemblyType::PrimaryMetagenome => "primary metagenome",
            AssemblyType::BinnedMetagenome => "binned metagenome",
        }
    }

    pub fn uses_analysis(self) -> bool {
        matches!(
            self,
            AssemblyType::PrimaryMetagenome | AssemblyType::BinnedMetagenome
        )
    }

    pub fn has_mirror_assembly(self) -> bool {
        matches!(self, AssemblyType::CloneOrIsolate | AssemblyType::Mag)
    }
}

impl fmt::Display for AssemblyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssemblyType {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        match normalized.to_ascii_lowercase().as_str() {
            "clone or isolate" | "isolate" | "clone" => Ok(AssemblyType::CloneOrIsolate),
            "metagenome-assembled genome (mag)" | "mag" => Ok(AssemblyType::Mag),
            "primary metagenome" => Ok(AssemblyType::PrimaryMetagenome),
            "binned metagenome" => Ok(AssemblyType::BinnedMetagenome),
            _ => Err(TrackerError::InvalidAssemblyType(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "Y")]
    Yes,
    #[default]
    #[serde(rename = "N")]
    No,
}

impl Flag {
    pub fn is_set(self) -> bool {
        matches!(self, Flag::Yes)
    }

    pub fn raise(&mut self) {
        *self = Flag::Yes;
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flag::Yes => "Y",
            Flag::No => "N",
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flag {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Y" | "y" => Ok(Flag::Yes),
            "N" | "n" | "" => Ok(Flag::No),
            _ => Err(TrackerError::InvalidFlag(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Check {
    True,
    False,
    Error,
}

impl Check {
    pub fn from_bool(value: bool) -> Self {
        if value { Check::True } else { Check::False }
    }

    pub fn passed(self) -> bool {
        matches!(self, Check::True)
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::True => f.write_str("True"),
            Check::False => f.write_str("False"),
            Check::Error => f.write_str("Error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubmissionName {
    name: String,
    version: u32,
}

impl SubmissionName {
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Display for SubmissionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for SubmissionName {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = value.trim();
        let version = name
            .rsplit_once('.')
            .filter(|(prefix, _)| !prefix.is_empty())
            .and_then(|(_, suffix)| suffix.parse::<u32>().ok())
            .ok_or_else(|| TrackerError::InvalidSubmissionName(value.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AccessionRange {
    pub first: String,
    pub last: String,
}

impl AccessionRange {
    pub fn single(accession: &str) -> Self {
        Self {
            first: accession.to_string(),
            last: accession.to_string(),
        }
    }

    pub fn reduce<'a, I>(accessions: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut first: Option<&str> = None;
        let mut last: Option<&str> = None;
        for accession in accessions {
            if first.is_none_or(|current| compare_accessions(accession, current).is_lt()) {
                first = Some(accession);
            }
            if last.is_none_or(|current| compare_accessions(accession, current).is_gt()) {
                last = Some(accession);
            }
        }
        Some(Self {
            first: first?.to_string(),
            last: last?.to_string(),
        })
    }

    pub fn contains(&self, accession: &str) -> bool {
        let accession = strip_version(accession);
        compare_accessions(accession, &self.first).is_ge()
            && compare_accessions(accession, &self.last).is_le()
    }
}

impl fmt::Display for AccessionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.first == self.last {
            f.write_str(&self.first)
        } else {
            write!(f, "{}-{}", self.first, self.last)
        }
    }
}

impl FromStr for AccessionRange {
    type Err = TrackerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(TrackerError::InvalidAccessionRange(value.to_string()));
        }
        let (first, last) = match trimmed.split_once('-') {
            Some((first, last)) => (first.trim(), last.trim()),
            None => (trimmed, trimmed),
        };
        if first.is_empty() || last.is_empty() || last.contains('-') {
            return Err(TrackerError::InvalidAccessionRange(value.to_string()));
        }
        Ok(Self {
            first: first.to_string(),
            last: last.to_string(),
        })
    }
}

pub fn compare_accessions(a: &str, b: &str) -> Ordering {
    let (pa, na) = split_accession(a);
    let (pb, nb) = split_accession(b);
    pa.cmp(pb)
        .then_with(|| na.len().cmp(&nb.len()))
        .then_with(|| na.cmp(nb))
        .then_with(|| a.cmp(b))
}

fn split_accession(accession: &str) -> (&str, &str) {
    let prefix = alpha_prefix(accession);
    let rest = &accession[prefix.len()..];
    let digits = rest.split('.').next().unwrap_or(rest);
    (prefix, digits.trim_start_matches('0'))
}

fn alpha_prefix(accession: &str) -> &str {
    let end = accession
        .find(|ch: char| !ch.is_ascii_alphabetic() && ch != '_')
        .unwrap_or(accession.len());
    &accession[..end]
}

pub fn wgs_set_id(contig: &str) -> Option<String> {
    WGS_CONTIG
        .captures(contig.trim())
        .and_then(|caps| caps.get(1))
        .map(|set| set.as_str().to_string())
}

pub fn strip_version(accession: &str) -> &str {
    match accession.rsplit_once('.') {
        Some((head, tail)) if !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()) => {
            head
        }
        _ => accession,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    #[serde(rename = "Releasing sequences")]
    ReleasingSequences,
    #[serde(rename = "Processing at NCBI")]
    ProcessingAtNcbi,
    #[serde(rename = "Releasing GCAs")]
    ReleasingGcas,
    #[serde(rename = "Public")]
    Public,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::ReleasingSequences => "Releasing sequences",
            Phase::ProcessingAtNcbi => "Processing at NCBI",
            Phase::ReleasingGcas => "Releasing GCAs",
            Phase::Public => "Public",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Action {
    Sql,
    Add,
    Track,
    All,
}
