use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::config::schema::{Config, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

const APP_DIR: &str = "skyplate";
const CONFIG_FILE: &str = "config.json";

/// `<config dir>/skyplate/config.json`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = load_config_from_str(&content)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Loads `path` if given, else the default location if it exists, else
/// built-in defaults.
pub fn load_config_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }

    match default_config_path() {
        Some(default) if default.is_file() => load_config(default),
        _ => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

/// Checks what the schema cannot express. Also run after CLI overrides.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    let url = url::Url::parse(&config.api_url)
        .map_err(|e| invalid(format!("Invalid api_url '{}': {}", config.api_url, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!(
            "api_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.poll.interval_secs == 0 {
        return Err(invalid("poll.interval_secs must be at least 1".into()));
    }
    if config.poll.timeout_secs != 0 && config.poll.timeout_secs < config.poll.interval_secs {
        return Err(invalid(format!(
            "poll.timeout_secs ({}) is shorter than poll.interval_secs ({})",
            config.poll.timeout_secs, config.poll.interval_secs
        )));
    }

    if config.http.connect_timeout_secs == 0 || config.http.request_timeout_secs == 0 {
        return Err(invalid("http timeouts must be at least 1 second".into()));
    }

    if config.concurrency == 0 {
        return Err(invalid("concurrency must be at least 1".into()));
    }

    config
        .upload
        .clone()
        .with_inferred_scale_type()
        .validate()
        .map_err(|e| invalid(format!("upload: {}", e)))?;

    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Validation { message }
}
