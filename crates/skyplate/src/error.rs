use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkyplateError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("Input not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Invalid input '{path}': {reason}")]
    InvalidInput { path: PathBuf, reason: String },
}

/// Failures raised while talking to the plate-solving service.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection or transport failure before an HTTP status was received.
    #[error("Network error calling '{service}': {message}")]
    Network { service: String, message: String },

    /// Non-success HTTP status. `diagnostic` is where the response body was saved.
    #[error("HTTP {status} from '{service}'{}", .diagnostic.as_ref().map(|p| format!(" (body saved to {})", p.display())).unwrap_or_default())]
    Http {
        service: String,
        status: u16,
        diagnostic: Option<PathBuf>,
    },

    #[error("Malformed response from '{service}': {reason}")]
    MalformedResponse { service: String, reason: String },

    #[error("Server error from '{service}': {message}")]
    Server { service: String, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out after {elapsed:?} waiting for {waiting_for}")]
    PollTimeout {
        waiting_for: String,
        elapsed: Duration,
    },

    #[error("Cancelled while waiting for {0}")]
    Cancelled(String),

    #[error("Submission {0} finished without producing a job")]
    SubmissionEmpty(u64),

    #[error("Job {job_id} failed to solve")]
    JobFailed { job_id: u64 },

    #[error("Invalid upload options: {0}")]
    InvalidOptions(String),

    #[error("Failed to encode request: {0}")]
    Encoding(String),

    #[error("Invalid WCS header: {0}")]
    InvalidWcs(String),

    #[error("Failed to read '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Whether a caller-side retry policy may reasonably try the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network { .. } => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether a batch should stop instead of moving on to the next image.
    pub fn aborts_batch(&self) -> bool {
        matches!(self, ClientError::Auth(_) | ClientError::Cancelled(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse catalog JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Invalid catalog: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SkyplateError>;
