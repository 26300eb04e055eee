use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const NOTICE_123_URL: &str = "https://pe.usps.com/text/dmm300/Notice123.htm";
pub const CPG_TABLE_HEADING: &str = "Country Price Groups and Weight Limits";
pub const FCPIS_RATE_TABLE_HEADING: &str =
    "First-Class Package International Service Price Groups";
pub const DEFAULT_TABLE_WALK_LIMIT: usize = 24;
pub const DEFAULT_DESTINATIONS_PATH: &str = "data/discogs-shipping-destinations.htm";

// pe.usps.com answers non-browser clients with an error page
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Subheaders on the discogs destinations widget that share the
/// `region-name` class with real destinations.
pub const IGNORE_REGION_NAMES: [&str; 8] = [
    "North America",
    "Central America",
    "South America",
    "Central Asia",
    "South-Eastern Asia",
    "Western Asia",
    "Eastern Asia",
    "Southern Asia",
];

pub const PLACEHOLDER_VALUES: [&str; 5] = ["n/a", "-", "–", "—", ""];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", path.display())]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid config value: {0}")]
    Value(String),
}

/// Every tunable the ingest runs depend on. Anything absent from a config
/// file keeps its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub notice123_url: String,
    pub cpg_heading: String,
    pub rates_heading: String,
    pub rates_table_count: usize,
    /// Elements visited after a heading before giving up on finding its tables.
    pub table_walk_limit: usize,
    /// Heading texts that label groups of tables rather than a table.
    pub ignore_headings: Vec<String>,
    /// First-column labels of price group rows that are not countries.
    pub ignore_row_labels: Vec<String>,
    pub ignore_region_names: Vec<String>,
    pub placeholder_values: Vec<String>,
    pub destinations_path: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: Option<u64>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            notice123_url: NOTICE_123_URL.to_string(),
            cpg_heading: CPG_TABLE_HEADING.to_string(),
            rates_heading: FCPIS_RATE_TABLE_HEADING.to_string(),
            rates_table_count: 2,
            table_walk_limit: DEFAULT_TABLE_WALK_LIMIT,
            ignore_headings: Vec::new(),
            ignore_row_labels: Vec::new(),
            ignore_region_names: IGNORE_REGION_NAMES.iter().map(|s| s.to_string()).collect(),
            placeholder_values: PLACEHOLDER_VALUES.iter().map(|s| s.to_string()).collect(),
            destinations_path: PathBuf::from(DEFAULT_DESTINATIONS_PATH),
            user_agent: BROWSER_USER_AGENT.to_string(),
            request_timeout_secs: Some(30),
        }
    }
}

impl IngestConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: IngestConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.table_walk_limit == 0 {
            return Err(ConfigError::Value(
                "table_walk_limit must be greater than 0".to_string(),
            ));
        }
        if self.rates_table_count == 0 {
            return Err(ConfigError::Value(
                "rates_table_count must be greater than 0".to_string(),
            ));
        }
        if self.rates_table_count > self.table_walk_limit {
            return Err(ConfigError::Value(format!(
                "rates_table_count ({}) cannot exceed table_walk_limit ({})",
                self.rates_table_count, self.table_walk_limit
            )));
        }
        Ok(self)
    }

    pub fn is_placeholder(&self, value: &str) -> bool {
        self.placeholder_values
            .iter()
            .any(|p| p.eq_ignore_ascii_case(value.trim()))
    }
}
