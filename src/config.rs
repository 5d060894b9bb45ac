use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

pub const DEFAULT_CONFIG_FILE: &str = "asm-track.json";

pub const ENA_PORTAL_BASE: &str = "https://www.ebi.ac.uk/ena/portal/api";
pub const ENA_BROWSER_BASE: &str = "https://www.ebi.ac.uk/ena/browser/api";
pub const NCBI_DATASETS_BASE: &str = "https://api.ncbi.nlm.nih.gov/datasets/v2";
pub const NCBI_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub tracked_names: Option<String>,
    #[serde(default)]
    pub ncbi_api_key: Option<String>,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    #[serde(default = "default_ena_portal")]
    pub ena_portal: String,
    #[serde(default = "default_ena_browser")]
    pub ena_browser: String,
    #[serde(default = "default_ncbi_datasets")]
    pub ncbi_datasets: String,
    #[serde(default = "default_ncbi_eutils")]
    pub ncbi_eutils: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            ena_portal: default_ena_portal(),
            ena_browser: default_ena_browser(),
            ncbi_datasets: default_ncbi_datasets(),
            ncbi_eutils: default_ncbi_eutils(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub database_path: Option<Utf8PathBuf>,
    pub tracked_names: Option<Utf8PathBuf>,
    pub ncbi_api_key: Option<String>,
    pub endpoints: EndpointConfig,
    pub timeout_secs: u64,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>, workdir: &Utf8Path) -> Result<ResolvedConfig, TrackerError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => workdir.join(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Err(TrackerError::MissingConfig);
        }

        let content = fs::read_to_string(config_path.as_std_path())
            .map_err(|_| TrackerError::ConfigRead(config_path.clone().into_std_path_buf()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| TrackerError::ConfigParse(err.to_string()))?;

        let env_key = std::env::var("NCBI_API_KEY").ok();
        Self::resolve_config(config, workdir, env_key)
    }

    pub fn resolve_config(
        config: Config,
        workdir: &Utf8Path,
        env_api_key: Option<String>,
    ) -> Result<ResolvedConfig, TrackerError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(TrackerError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let ncbi_api_key = env_api_key
            .filter(|key| !key.trim().is_empty())
            .or(config.ncbi_api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        Ok(ResolvedConfig {
            schema_version,
            database_path: config
                .database
                .map(|database| resolve_path(workdir, &database.path)),
            tracked_names: config
                .tracked_names
                .as_deref()
                .map(|path| resolve_path(workdir, path)),
            ncbi_api_key,
            endpoints: config.endpoints,
            timeout_secs: config.http.timeout_secs,
        })
    }
}

fn resolve_path(workdir: &Utf8Path, path: &str) -> Utf8PathBuf {
    let path = Utf8PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        workdir.join(path)
    }
}

fn default_ena_portal() -> String {
    ENA_PORTAL_BASE.to_string()
}

fn default_ena_browser() -> String {
    ENA_BROWSER_BASE.to_string()
}

fn default_ncbi_datasets() -> String {
    NCBI_DATASETS_BASE.to_string()
}

fn default_ncbi_eutils() -> String {
    NCBI_EUTILS_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    60
}
