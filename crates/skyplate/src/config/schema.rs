use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{PollConfig, ResultFile, UploadOptions};
use crate::secrets::{KeySources, DEFAULT_API_KEY_ENV_VAR};

pub const CONFIG_VERSION: &str = "1.0";
pub const DEFAULT_API_URL: &str = "https://nova.astrometry.net/api/";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default)]
    pub poll: PollSettings,
    #[serde(default)]
    pub http: HttpConfig,
    /// Where bodies of failed HTTP responses are saved. Current directory when unset.
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub upload: UploadOptions,
    #[serde(default)]
    pub results: ResultsConfig,
    /// Custom star catalog JSON. The built-in catalog is used when unset.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_api_key_env_var() -> Option<String> {
    Some(DEFAULT_API_KEY_ENV_VAR.to_string())
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_concurrency() -> usize {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            api_url: default_api_url(),
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            poll: PollSettings::default(),
            http: HttpConfig::default(),
            diagnostics_dir: None,
            output_directory: default_output_directory(),
            concurrency: default_concurrency(),
            upload: UploadOptions::default(),
            results: ResultsConfig::default(),
            catalog_path: None,
        }
    }
}

impl Config {
    pub fn key_sources(&self) -> KeySources<'_> {
        KeySources {
            direct: self.api_key.as_deref(),
            file: self.api_key_file.as_deref(),
            env_var: self.api_key_env_var.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSettings {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Zero disables the deadline.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    1800
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl From<PollSettings> for PollConfig {
    fn from(settings: PollSettings) -> Self {
        PollConfig {
            interval: Duration::from_secs(settings.interval_secs),
            timeout: (settings.timeout_secs > 0).then(|| Duration::from_secs(settings.timeout_secs)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// What to keep from a solved job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsConfig {
    /// Result files to download next to the JSON artifacts.
    #[serde(default = "default_result_files")]
    pub files: Vec<ResultFile>,
    #[serde(default = "default_true")]
    pub write_calibration: bool,
    #[serde(default = "default_true")]
    pub write_annotations: bool,
    #[serde(default = "default_true")]
    pub write_overlay: bool,
}

fn default_result_files() -> Vec<ResultFile> {
    vec![ResultFile::Wcs]
}

fn default_true() -> bool {
    true
}

impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            files: default_result_files(),
            write_calibration: true,
            write_annotations: true,
            write_overlay: true,
        }
    }
}
