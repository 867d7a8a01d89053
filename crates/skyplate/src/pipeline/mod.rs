//! Per-image solve runs and batches: upload, poll, fetch, compile, write.

pub mod config;
pub mod discover;
pub mod output;
pub mod report;
pub mod runner;

pub use config::PipelineConfig;
pub use discover::{discover_images, is_solvable_image};
pub use output::ArtifactWriter;
pub use report::{BatchSummary, ImageOutcome, ImageReport};
pub use runner::{BatchView, ImageSource, SolvePipeline, SolveTask};
