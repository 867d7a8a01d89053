pub mod client;
pub mod config;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod progress;
pub mod sanitize;
pub mod secrets;

pub use client::{NovaClient, PollConfig, ResultBundle, SolveOutcome, SubmissionPoller, UploadOptions};
pub use config::{load_config, load_config_or_default, Config};
pub use error::{CatalogError, ClientError, ConfigError, OutputError, Result, SkyplateError};
pub use geometry::{Catalog, CompiledOverlay, GeometryCompiler};
pub use pipeline::{BatchSummary, ImageOutcome, ImageReport, ImageSource, SolvePipeline};
pub use secrets::{resolve_secret, SecretError};
