use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ResolvedConfig;
use crate::error::TrackerError;
use crate::http;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequenceSummary {
    pub accession: String,
    pub bioproject: Option<String>,
    pub biosample: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub accession: String,
    pub bioproject: Option<String>,
    pub biosample: Option<String>,
}

pub trait NcbiClient: Send + Sync {
    fn sequence_summary(&self, accession: &str) -> Result<Option<SequenceSummary>, TrackerError>;
    fn assembly_report(&self, accession: &str) -> Result<Option<AssemblyReport>, TrackerError>;
}

#[derive(Debug, Clone)]
pub struct NcbiHttpClient {
    client: Client,
    datasets_base: String,
    eutils_base: String,
    api_key: Option<String>,
}

impl NcbiHttpClient {
    pub fn new(config: &ResolvedConfig) -> Result<Self, TrackerError> {
        let mut headers = http::base_headers()?;
        headers.insert("X-Datasets-Client", HeaderValue::from_static("asm-track"));
        headers.insert(
            "X-Datasets-Client-Version",
            HeaderValue::from_str(env!("CARGO_PKG_VERSION"))
                .map_err(|err| TrackerError::Filesystem(err.to_string()))?,
        );
        if let Some(api_key) = &config.ncbi_api_key {
            headers.insert(
                "api-key",
                HeaderValue::from_str(api_key)
                    .map_err(|err| TrackerError::ConfigParse(err.to_string()))?,
            );
        }

        let client = http::build_client(headers, config.timeout_secs, TrackerError::NcbiHttp)?;
        Ok(Self {
            client,
            datasets_base: config.endpoints.ncbi_datasets.trim_end_matches('/').to_string(),
            eutils_base: config.endpoints.ncbi_eutils.trim_end_matches('/').to_string(),
            api_key: config.ncbi_api_key.clone(),
        })
    }
}

impl NcbiClient for NcbiHttpClient {
    fn sequence_summary(&self, accession: &str) -> Result<Option<SequenceSummary>, TrackerError> {
        let url = format!("{}/esummary.fcgi", self.eutils_base);
        let response = http::send_with_retries(
            || {
                let mut request = self.client.get(&url).query(&[
                    ("db", "nuccore"),
                    ("id", accession),
                    ("retmode", "json"),
                ]);
                if let Some(key) = &self.api_key {
                    request = request.query(&[("api_key", key.as_str())]);
                }
                request
            },
            TrackerError::NcbiHttp,
        )?;
        let text = http::read_text(response, TrackerError::NcbiHttp, ncbi_status)?;
        parse_esummary(&text)
    }

    fn assembly_report(&self, accession: &str) -> Result<Option<AssemblyReport>, TrackerError> {
        let url = format!(
            "{}/genome/accession/{}/dataset_report",
            self.datasets_base, accession
        );
        let response =
            http::send_with_retries(|| self.client.get(&url), TrackerError::NcbiHttp)?;
        let text = http::read_text(response, TrackerError::NcbiHttp, ncbi_status)?;
        parse_dataset_report(&text)
    }
}

fn ncbi_status(status: u16, message: String) -> TrackerError {
    TrackerError::NcbiStatus { status, message }
}

#[derive(Debug, Deserialize)]
struct DatasetReportEnvelope {
    #[serde(default)]
    reports: Vec<DatasetReport>,
}

#[derive(Debug, Deserialize)]
struct DatasetReport {
    accession: String,
    #[serde(default)]
    assembly_info: Option<AssemblyInfo>,
}

#[derive(Debug, Deserialize)]
struct AssemblyInfo {
    #[serde(default)]
    bioproject_accession: Option<String>,
    #[serde(default)]
    biosample: Option<BiosampleRef>,
}

#[derive(Debug, Deserialize)]
struct BiosampleRef {
    #[serde(default)]
    accession: Option<String>,
}

pub fn parse_dataset_report(text: &str) -> Result<Option<AssemblyReport>, TrackerError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let envelope: DatasetReportEnvelope =
        serde_json::from_str(text).map_err(|err| TrackerError::Payload(err.to_string()))?;
    Ok(envelope.reports.into_iter().next().map(|report| {
        let info = report.assembly_info;
        AssemblyReport {
            accession: report.accession,
            bioproject: info.as_ref().and_then(|info| info.bioproject_accession.clone()),
            biosample: info
                .and_then(|info| info.biosample)
                .and_then(|biosample| biosample.accession),
        }
    }))
}

pub fn parse_esummary(text: &str) -> Result<Option<SequenceSummary>, TrackerError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(text).map_err(|err| TrackerError::Payload(err.to_string()))?;
    let Some(result) = value.get("result") else {
        return Ok(None);
    };
    let uid = result
        .get("uids")
        .and_then(Value::as_array)
        .and_then(|uids| uids.first())
        .and_then(Value::as_str);
    let Some(document) = uid.and_then(|uid| result.get(uid)) else {
        return Ok(None);
    };
    if document.get("error").is_some() {
        return Ok(None);
    }
    let text_field = |key: &str| {
        document
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    Ok(Some(SequenceSummary {
        accession: text_field("accessionversion")
            .or_else(|| text_field("caption"))
            .unwrap_or_default(),
        bioproject: text_field("bioproject"),
        biosample: text_field("biosample"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_report_extracts_project_and_sample() {
        let body = r#"{"reports": [{"accession": "GCA_900000001.1",
            "assembly_info": {"bioproject_accession": "PRJEB1",
                              "biosample": {"accession": "SAMEA1"}}}],
            "total_count": 1}"#;
        let report = parse_dataset_report(body).unwrap().unwrap();
        assert_eq!(report.bioproject.as_deref(), Some("PRJEB1"));
        assert_eq!(report.biosample.as_deref(), Some("SAMEA1"));
    }

    #[test]
    fn empty_dataset_report_is_none() {
        assert!(parse_dataset_report("{}").unwrap().is_none());
    }

    #[test]
    fn esummary_document_and_missing_id() {
        let body = r#"{"header": {}, "result": {"uids": ["2000"],
            "2000": {"uid": "2000", "caption": "LR123456", "accessionversion": "LR123456.1"}}}"#;
        let summary = parse_esummary(body).unwrap().unwrap();
        assert_eq!(summary.accession, "LR123456.1");
        assert!(summary.bioproject.is_none());

        let missing = r#"{"header": {}, "result": {"uids": []}}"#;
        assert!(parse_esummary(missing).unwrap().is_none());
    }
}
