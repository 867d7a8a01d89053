use std::path::PathBuf;

use crate::client::{PollConfig, UploadOptions};
use crate::config::{Config, ResultsConfig};

/// The parts of `Config` a solve run needs, resolved once.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_directory: PathBuf,
    pub poll: PollConfig,
    pub upload: UploadOptions,
    pub results: ResultsConfig,
    pub concurrency: usize,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            output_directory: config.output_directory.clone(),
            poll: config.poll.into(),
            upload: config.upload.clone().with_inferred_scale_type(),
            results: config.results.clone(),
            concurrency: config.concurrency.max(1),
        }
    }
}
