use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use fills_engine::{FetchSettings, HarvestConfig, OverlapPolicy, RetryPolicy};
use fills_logging::{fills_info, fills_warn};
use serde::{Deserialize, Serialize};

use crate::Cli;

/// Store path used when neither the flags nor the config file name one.
pub const DEFAULT_OUTPUT: &str = "goldsky/orderFilled.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OverlapArg {
    StoreTail,
    BatchLocal,
}

impl From<OverlapArg> for OverlapPolicy {
    fn from(arg: OverlapArg) -> Self {
        match arg {
            OverlapArg::StoreTail => OverlapPolicy::StoreTail,
            OverlapArg::BatchLocal => OverlapPolicy::BatchLocal,
        }
    }
}

/// Optional settings read from a RON file. Every field may be left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub at_once: Option<usize>,
    pub output: Option<PathBuf>,
    pub endpoint: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub max_response_bytes: Option<u64>,
    pub retry_delay_secs: Option<u64>,
    pub max_attempts: Option<usize>,
    pub overlap: Option<OverlapArg>,
    pub run_label: Option<String>,
}

/// Read a RON config file. Missing or unparseable files yield the defaults.
pub fn load_file_config(path: &Path) -> FileConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            fills_warn!("Config file {:?} not found, using defaults", path);
            return FileConfig::default();
        }
        Err(err) => {
            fills_warn!("Failed to read config from {:?}: {}", path, err);
            return FileConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            fills_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            fills_warn!("Failed to parse config from {:?}: {}", path, err);
            FileConfig::default()
        }
    }
}

/// Everything the binary needs for one run.
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub output: PathBuf,
    pub fetch: FetchSettings,
    pub harvest: HarvestConfig,
}

impl AppSettings {
    /// Flags win over the file, the file wins over defaults.
    pub fn resolve(cli: &Cli, file: FileConfig) -> Self {
        let mut fetch = FetchSettings::default();
        if let Some(endpoint) = cli.endpoint.clone().or(file.endpoint) {
            fetch.endpoint = endpoint;
        }
        if let Some(secs) = file.connect_timeout_secs {
            fetch.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = file.request_timeout_secs {
            fetch.request_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = file.max_response_bytes {
            fetch.max_bytes = bytes;
        }

        let mut retry = RetryPolicy::default();
        if let Some(secs) = cli.retry_delay_secs.or(file.retry_delay_secs) {
            retry.delay = Duration::from_secs(secs);
        }
        retry.max_attempts = cli.max_attempts.or(file.max_attempts);

        let mut harvest = HarvestConfig {
            retry,
            ..HarvestConfig::default()
        };
        if let Some(page_size) = cli.at_once.or(file.at_once) {
            harvest.page_size = page_size.max(1);
        }
        if let Some(overlap) = cli.overlap.or(file.overlap) {
            harvest.overlap = overlap.into();
        }
        if let Some(label) = file.run_label {
            harvest.run_label = label;
        }

        let output = cli
            .output
            .clone()
            .or(file.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

        Self {
            output,
            fetch,
            harvest,
        }
    }
}
