use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::join_all;
use log::{error, info, warn};
use secrecy::SecretString;
use serde::Serialize;
use tracing::{info_span, Instrument};

use crate::client::{JobStatus, NovaClient, ResultFetcher, SolveOutcome, SubmissionPoller};
use crate::error::{ClientError, OutputError};
use crate::geometry::GeometryCompiler;
use crate::progress::{LogProgress, ProgressEvent, ProgressReporter};
use crate::sanitize;

use super::config::PipelineConfig;
use super::output::ArtifactWriter;
use super::report::{BatchSummary, ImageOutcome, ImageReport};

/// Where an image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    File(PathBuf),
    Url(String),
}

impl ImageSource {
    /// Name safe to log.
    pub fn label(&self) -> String {
        match self {
            ImageSource::File(path) => sanitize::redact_path(path),
            ImageSource::Url(url) => sanitize::redact_url(url),
        }
    }

    /// Artifact file stem: the file stem, or the last URL path segment.
    pub fn stem(&self) -> String {
        let raw = match self {
            ImageSource::File(path) => path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
            ImageSource::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|u| u.trim_end_matches('/').rsplit('/').next())
                .map(|segment| match segment.rsplit_once('.') {
                    Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                    _ => segment.to_string(),
                })
                .unwrap_or_default(),
        };

        let cleaned: String = raw
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "image".to_string()
        } else {
            cleaned
        }
    }
}

/// One unit of batch work.
#[derive(Debug, Clone)]
pub struct SolveTask {
    pub source: ImageSource,
    pub stem: String,
}

impl SolveTask {
    pub fn new(source: ImageSource) -> Self {
        let stem = source.stem();
        Self { source, stem }
    }

    /// Tasks for a batch, numbering repeated stems so artifacts never collide.
    ///
    /// A numbered stem skips any name another input already carries, so
    /// `frame`, `frame` and `frame_2` become `frame`, `frame_3` and `frame_2`.
    pub fn for_sources(sources: Vec<ImageSource>) -> Vec<SolveTask> {
        let mut tasks: Vec<SolveTask> = sources.into_iter().map(SolveTask::new).collect();
        let natural: HashSet<String> = tasks.iter().map(|t| t.stem.clone()).collect();
        let mut assigned: HashSet<String> = HashSet::new();

        for task in &mut tasks {
            if assigned.insert(task.stem.clone()) {
                continue;
            }
            let mut n = 2;
            loop {
                let candidate = format!("{}_{}", task.stem, n);
                if !natural.contains(&candidate) && assigned.insert(candidate.clone()) {
                    task.stem = candidate;
                    break;
                }
                n += 1;
            }
        }
        tasks
    }
}

pub struct SolvePipeline {
    config: Arc<PipelineConfig>,
    compiler: Arc<GeometryCompiler>,
    writer: ArtifactWriter,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl SolvePipeline {
    pub fn new(config: Arc<PipelineConfig>, compiler: Arc<GeometryCompiler>) -> Self {
        let writer = ArtifactWriter::new(&config.output_directory);
        Self {
            config,
            compiler,
            writer,
            progress: None,
        }
    }

    /// Sends every event to `progress` instead of the per-image log reporter.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn reporter(&self, label: &str) -> Arc<dyn ProgressReporter> {
        match &self.progress {
            Some(progress) => Arc::clone(progress),
            None => Arc::new(LogProgress::new(label)),
        }
    }

    /// Solves one image and collects its artifacts.
    ///
    /// Solver failures and per-image errors are recorded in the report.
    /// Only errors that should stop a batch (bad credentials, cancellation)
    /// are returned as `Err`.
    pub async fn solve(
        &self,
        client: &mut NovaClient,
        api_key: &SecretString,
        task: &SolveTask,
        cancel: &AtomicBool,
    ) -> Result<ImageReport, ClientError> {
        let mut report = ImageReport::new(task.source.label(), task.stem.clone());
        let progress = self.reporter(&report.source);
        let span = info_span!(
            "solve",
            run_id = %report.run_id,
            image = %report.source,
            submission_id = tracing::field::Empty,
            job_id = tracing::field::Empty,
        );

        let result = self
            .solve_inner(client, api_key, task, cancel, progress.as_ref(), &mut report)
            .instrument(span)
            .await;

        if let Err(e) = result {
            progress.report(ProgressEvent::Failed {
                error: e.to_string(),
            });
            if e.aborts_batch() {
                return Err(e);
            }
            warn!("{}: {}", report.source, e);
            report.outcome = ImageOutcome::Errored {
                error: e.to_string(),
            };
        }

        report.finish();
        Ok(report)
    }

    async fn solve_inner(
        &self,
        client: &mut NovaClient,
        api_key: &SecretString,
        task: &SolveTask,
        cancel: &AtomicBool,
        progress: &dyn ProgressReporter,
        report: &mut ImageReport,
    ) -> Result<(), ClientError> {
        if client.session().is_none() {
            client.login(api_key).await.map_err(|e| match e {
                ClientError::Server { message, .. } => ClientError::Auth(message),
                other => other,
            })?;
        }
        let client: &NovaClient = client;

        let submission_id = match &task.source {
            ImageSource::File(path) => client.upload_file(path, &self.config.upload).await?,
            ImageSource::Url(url) => client.url_upload(url, &self.config.upload).await?,
        };
        report.submission_id = Some(submission_id);
        tracing::Span::current().record("submission_id", submission_id);

        let poller = SubmissionPoller::new(client, self.config.poll, progress);
        let outcome = poller.run(submission_id, cancel).await?;
        report.job_id = outcome.job_id();
        if let Some(job_id) = report.job_id {
            tracing::Span::current().record("job_id", job_id);
        }

        match outcome {
            SolveOutcome::Solved { job_id, .. } => {
                report.outcome = ImageOutcome::Solved;
                self.collect(client, job_id, progress, report).await;
            }
            SolveOutcome::JobFailed { job_id, .. } => {
                info!("{}: job {} did not solve", report.source, job_id);
                report.outcome = ImageOutcome::JobFailed;
            }
            SolveOutcome::SubmissionEmpty { .. } => {
                report.outcome = ImageOutcome::SubmissionEmpty;
            }
        }
        Ok(())
    }

    /// Collects artifacts for a job solved earlier.
    pub async fn fetch_job(
        &self,
        client: &NovaClient,
        job_id: u64,
        stem: &str,
    ) -> Result<ImageReport, ClientError> {
        let mut report = ImageReport::new(format!("job {}", job_id), stem);
        report.job_id = Some(job_id);
        let progress = self.reporter(&report.source);
        let span = info_span!("fetch", run_id = %report.run_id, job_id);

        async {
            match client.job_status(job_id).await? {
                JobStatus::Success => {
                    report.outcome = ImageOutcome::Solved;
                    self.collect(client, job_id, progress.as_ref(), &mut report)
                        .await;
                }
                JobStatus::Failure => report.outcome = ImageOutcome::JobFailed,
                status => {
                    warn!("Job {} is not finished yet ({:?})", job_id, status);
                    report.outcome = ImageOutcome::Unfinished;
                }
            }
            Ok::<(), ClientError>(())
        }
        .instrument(span)
        .await?;

        report.finish();
        Ok(report)
    }

    /// Fetches results, compiles the overlay and writes artifacts.
    /// Nothing here fails the image; gaps are listed in the report.
    async fn collect(
        &self,
        client: &NovaClient,
        job_id: u64,
        progress: &dyn ProgressReporter,
        report: &mut ImageReport,
    ) {
        let fetcher = ResultFetcher::new(client, progress);
        let bundle = fetcher.fetch_all(job_id).await;
        report
            .missing_artifacts
            .extend(bundle.failures.iter().map(|(artifact, _)| artifact.clone()));

        let wanted = &self.config.results.files;
        let files = fetcher.fetch_files(job_id, wanted).await;
        for file in wanted {
            if !files.iter().any(|(f, _)| f == file) {
                report.missing_artifacts.push(file.name().to_string());
            }
        }
        for (file, bytes) in &files {
            let written = self.writer.write_bytes(&report.stem, file.file_suffix(), bytes);
            record(report, file.name(), written);
        }

        let stem = report.stem.clone();
        if let Some(annotations) = &bundle.annotations {
            let overlay = self.compiler.compile(annotations, bundle.degrees_per_pixel());
            progress.report(ProgressEvent::OverlayCompiled {
                edges: overlay.edges.len(),
                unresolved: overlay.unresolved.len(),
            });
            report.constellation_lines = overlay.edges.len();

            if self.config.results.write_overlay {
                let written = self.writer.write_json(&stem, "_overlay.json", &overlay);
                record(report, "overlay", written);
            }
            if self.config.results.write_annotations {
                let written = self.writer.write_json(&stem, "_annotations.json", annotations);
                record(report, "annotations", written);
            }
        }

        if self.config.results.write_calibration {
            if let Some(calibration) = &bundle.calibration {
                let written = self.writer.write_json(&stem, "_calibration.json", calibration);
                record(report, "calibration", written);
            }
        }

        let written = self.writer.write_json(&stem, "_results.json", &bundle);
        record(report, "results", written);
    }

    /// Solves every source, `concurrency` at a time.
    ///
    /// Each worker builds its own client with `make_client` and logs in
    /// once. Per-image failures are recorded and the batch moves on; a
    /// rejected API key or cancellation stops every worker.
    pub async fn run_batch<F>(
        &self,
        make_client: F,
        api_key: &SecretString,
        sources: Vec<ImageSource>,
        cancel: &AtomicBool,
    ) -> BatchSummary
    where
        F: Fn() -> Result<NovaClient, ClientError>,
    {
        let tasks = SolveTask::for_sources(sources);
        let total = tasks.len();
        let workers = self.config.concurrency.clamp(1, total.max(1));
        info!("Solving {} image(s) with {} worker(s)", total, workers);

        let queue = Mutex::new(tasks.into_iter().enumerate().collect::<VecDeque<_>>());
        let abort: Mutex<Option<String>> = Mutex::new(None);

        let results = join_all((0..workers).map(|worker| {
            self.worker(worker, &make_client, api_key, &queue, &abort, cancel)
        }))
        .await;

        let mut reports: Vec<(usize, ImageReport)> = results.into_iter().flatten().collect();
        reports.sort_by_key(|(index, _)| *index);

        let summary = BatchSummary {
            skipped: total - reports.len(),
            reports: reports.into_iter().map(|(_, report)| report).collect(),
            aborted: abort.into_inner().unwrap_or_default(),
        };
        info!(
            "Batch finished: {} solved, {} failed, {} errored, {} skipped",
            summary.solved(),
            summary.failed(),
            summary.errored(),
            summary.skipped
        );
        summary
    }

    async fn worker<F>(
        &self,
        worker: usize,
        make_client: &F,
        api_key: &SecretString,
        queue: &Mutex<VecDeque<(usize, SolveTask)>>,
        abort: &Mutex<Option<String>>,
        cancel: &AtomicBool,
    ) -> Vec<(usize, ImageReport)>
    where
        F: Fn() -> Result<NovaClient, ClientError>,
    {
        let mut done = Vec::new();
        let mut client = match make_client() {
            Ok(client) => client,
            Err(e) => {
                error!("Worker {} could not create a client: {}", worker, e);
                set_abort(abort, e.to_string());
                return done;
            }
        };

        loop {
            let stopped = cancel.load(Ordering::Acquire)
                || abort.lock().map(|a| a.is_some()).unwrap_or(true);
            if stopped {
                break;
            }
            let next = queue.lock().ok().and_then(|mut q| q.pop_front());
            let Some((index, task)) = next else {
                break;
            };

            match self.solve(&mut client, api_key, &task, cancel).await {
                Ok(report) => done.push((index, report)),
                Err(e) => {
                    error!("Stopping batch: {}", e);
                    done.push((index, ImageReport::new(task.source.label(), task.stem).errored(&e)));
                    set_abort(abort, e.to_string());
                    break;
                }
            }
        }
        done
    }
}

fn set_abort(abort: &Mutex<Option<String>>, reason: String) {
    if let Ok(mut slot) = abort.lock() {
        slot.get_or_insert(reason);
    }
}

fn record(report: &mut ImageReport, artifact: &str, written: Result<PathBuf, OutputError>) {
    match written {
        Ok(path) => report.artifacts.push(path),
        Err(e) => {
            warn!("Could not save {}: {}", artifact, e);
            report.missing_artifacts.push(artifact.to_string());
        }
    }
}

/// Serializable view of a batch for `--json` style output.
#[derive(Debug, Serialize)]
pub struct BatchView<'a> {
    pub solved: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub reports: &'a [ImageReport],
}

impl<'a> From<&'a BatchSummary> for BatchView<'a> {
    fn from(summary: &'a BatchSummary) -> Self {
        Self {
            solved: summary.solved(),
            failed: summary.failed(),
            errored: summary.errored(),
            skipped: summary.skipped,
            reports: &summary.reports,
        }
    }
}
