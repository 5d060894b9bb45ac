use std::fmt;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::error::TrackerError;
use crate::http;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LinkType {
    WgsSet,
    Sequence,
    Assembly,
    Analysis,
}

impl LinkType {
    pub const ALL: [LinkType; 4] = [
        LinkType::WgsSet,
        LinkType::Sequence,
        LinkType::Assembly,
        LinkType::Analysis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LinkType::WgsSet => "wgs_set",
            LinkType::Sequence => "sequence",
            LinkType::Assembly => "assembly",
            LinkType::Analysis => "analysis",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum LinkOwner {
    Project,
    Sample,
}

impl LinkOwner {
    fn portal_result(self) -> &'static str {
        match self {
            LinkOwner::Project => "study",
            LinkOwner::Sample => "sample",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaxonRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDataType {
    Assembly,
    ContigSet,
    Sequence,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    #[serde(default)]
    pub accession: Option<String>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub version: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub sample: Option<String>,
    #[serde(default, alias = "taxon", deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub scientific_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SummaryRecord {
    pub fn data_type(&self) -> Option<SummaryDataType> {
        let value = self.data_type.as_deref()?.trim();
        if value.is_empty() {
            return None;
        }
        Some(match value.to_ascii_uppercase().as_str() {
            "ASSEMBLY" => SummaryDataType::Assembly,
            "CONTIGSET" => SummaryDataType::ContigSet,
            "SEQUENCE" => SummaryDataType::Sequence,
            _ => SummaryDataType::Other,
        })
    }

    pub fn version(&self) -> Option<u32> {
        self.version.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Deserialize)]
struct SummaryEnvelope {
    #[serde(default)]
    summaries: Vec<SummaryRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkRecord {
    #[serde(alias = "analysis_accession", alias = "assembly_accession")]
    pub accession: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnalysisRecord {
    pub analysis_accession: String,
    #[serde(default)]
    pub study_accession: Option<String>,
    #[serde(default)]
    pub sample_accession: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub first_public: Option<String>,
}

pub trait EnaClient: Send + Sync {
    fn sample_taxon(&self, sample: &str) -> Result<Option<TaxonRecord>, TrackerError>;
    fn summary(&self, accession: &str) -> Result<Vec<SummaryRecord>, TrackerError>;
    fn links(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) -> Result<Vec<LinkRecord>, TrackerError>;
    fn analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>, TrackerError>;
}

#[derive(Debug, Clone)]
pub struct EnaHttpClient {
    client: Client,
    portal_base: String,
    browser_base: String,
}

impl EnaHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, TrackerError> {
        let client = http::build_client(
            http::base_headers()?,
            config.timeout_secs,
            TrackerError::EnaHttp,
        )?;
        Ok(Self {
            client,
            portal_base: config.endpoints.ena_portal.trim_end_matches('/').to_string(),
            browser_base: config.endpoints.ena_browser.trim_end_matches('/').to_string(),
        })
    }

    fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TrackerError> {
        let response = http::send_with_retries(
            || self.client.get(url).query(query),
            TrackerError::EnaHttp,
        )?;
        http::read_text(response, TrackerError::EnaHttp, ena_status)
    }

    fn portal_search<T: DeserializeOwned>(
        &self,
        result: &str,
        query: &str,
        fields: &str,
    ) -> Result<Vec<T>, TrackerError> {
        let url = format!("{}/search", self.portal_base);
        let text = self.get_text(
            &url,
            &[
                ("result", result),
                ("query", query),
                ("fields", fields),
                ("format", "json"),
            ],
        )?;
        parse_records(&text)
    }
}

impl EnaClient for EnaHttpClient {
    fn sample_taxon(&self, sample: &str) -> Result<Option<TaxonRecord>, TrackerError> {
        let query = format!("sample_accession=\"{sample}\" OR secondary_sample_accession=\"{sample}\"");
        let records: Vec<TaxonRecord> =
            self.portal_search("sample", &query, "tax_id,scientific_name")?;
        Ok(records.into_iter().next())
    }

    fn summary(&self, accession: &str) -> Result<Vec<SummaryRecord>, TrackerError> {
        let url = format!("{}/summary/{}", self.browser_base, accession);
        let text = self.get_text(&url, &[])?;
        parse_summary(&text)
    }

    fn links(
        &self,
        owner: LinkOwner,
        accession: &str,
        link_type: LinkType,
    ) -> Result<Vec<LinkRecord>, TrackerError> {
        let url = format!("{}/links/{}", self.portal_base, owner.portal_result());
        let text = self.get_text(
            &url,
            &[
                ("accession", accession),
                ("result", link_type.as_str()),
                ("fields", "accession,tax_id"),
                ("format", "json"),
            ],
        )?;
        parse_records(&text)
    }

    fn analysis(&self, analysis_id: &str) -> Result<Option<AnalysisRecord>, TrackerError> {
        let query = format!("analysis_accession=\"{analysis_id}\"");
        let records: Vec<AnalysisRecord> = self.portal_search(
            "analysis",
            &query,
            "analysis_accession,study_accession,sample_accession,tax_id,first_public",
        )?;
        Ok(records.into_iter().next())
    }
}

fn ena_status(status: u16, message: String) -> TrackerError {
    TrackerError::EnaStatus { status, message }
}

pub fn parse_summary(text: &str) -> Result<Vec<SummaryRecord>, TrackerError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let envelope: SummaryEnvelope =
        serde_json::from_str(text).map_err(|err| TrackerError::Payload(err.to_string()))?;
    Ok(envelope.summaries)
}

pub fn parse_records<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, TrackerError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(|err| TrackerError::Payload(err.to_string()))
}

// The portal sends tax ids and versions as strings, the browser as numbers.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}
