//! API key resolution.
//!
//! The key can come from three places, checked in order:
//!
//! 1. A direct value (`api_key` in the config or `--api-key`)
//! 2. A file (`api_key_file`), with `~` expanded
//! 3. An environment variable (`api_key_env_var`, default `ASTROMETRY_API_KEY`)

use std::fs;

use secrecy::{ExposeSecret, SecretString};

/// Environment variable read when no other key source is configured.
pub const DEFAULT_API_KEY_ENV_VAR: &str = "ASTROMETRY_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No API key configured (set api_key, api_key_file, or the {DEFAULT_API_KEY_ENV_VAR} environment variable)")]
    NoSourceProvided,

    #[error("Failed to read API key from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },

    #[error("API key from {origin} is empty")]
    Empty { origin: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Where to look for the API key. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySources<'a> {
    pub direct: Option<&'a str>,
    pub file: Option<&'a str>,
    pub env_var: Option<&'a str>,
}

impl<'a> KeySources<'a> {
    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(self.direct, self.file, self.env_var)
    }
}

/// Resolves a secret from the first configured source.
///
/// A source that is configured but fails (unreadable file, unset variable)
/// is an error; later sources are not consulted.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    let direct = non_empty(direct);
    let file_path = non_empty(file_path);
    let env_var = non_empty(env_var);

    if let Some(value) = direct {
        return checked(value.trim(), "the direct value");
    }

    if let Some(path) = file_path {
        let expanded = expand_home(path);
        let content = fs::read_to_string(&expanded).map_err(|e| SecretError::FileReadError {
            path: expanded.clone(),
            source: e,
        })?;
        return checked(content.trim(), &format!("file '{}'", expanded));
    }

    if let Some(name) = env_var {
        return match std::env::var(name) {
            Ok(value) => checked(value.trim(), &format!("${}", name)),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

fn checked(value: &str, origin: &str) -> Result<SecretString> {
    if value.is_empty() {
        return Err(SecretError::Empty {
            origin: origin.to_string(),
        });
    }
    Ok(SecretString::from(value.to_string()))
}

/// Short, loggable fingerprint of a secret.
pub fn fingerprint(secret: &SecretString) -> String {
    crate::sanitize::redact_token(secret.expose_secret())
}

/// Expands a leading `~` to the home directory. `~user` is not supported.
pub fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            let home = home.to_string_lossy();
            if path == "~" {
                return home.into_owned();
            }
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
