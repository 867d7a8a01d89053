use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info, warn};
use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter};

use skyplate::client::{
    AnnotationRecord, JobStatus, NovaClient, SubmissionPoller, Survey, TanWcs,
};
use skyplate::config::{load_config_or_default, validate_config, Config};
use skyplate::geometry::{Catalog, GeometryCompiler};
use skyplate::pipeline::{
    discover_images, ArtifactWriter, BatchSummary, BatchView, ImageOutcome, ImageReport,
    ImageSource, PipelineConfig, SolvePipeline,
};
use skyplate::progress::LogProgress;
use skyplate::sanitize;
use skyplate::secrets;
use skyplate::SkyplateError;

#[derive(Parser)]
#[command(
    name = "skyplate",
    about = "Plate-solve images with astrometry.net and compile constellation overlays",
    version
)]
struct Cli {
    /// Config file (default: <config dir>/skyplate/config.json)
    #[arg(long, global = true, env = "SKYPLATE_CONFIG")]
    config: Option<PathBuf>,

    /// API key; overrides the config's key sources
    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directory for artifacts
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Seconds between status requests
    #[arg(long, global = true)]
    poll_interval: Option<u64>,

    /// Seconds to wait for a solve before giving up (0 waits forever)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Log filter when RUST_LOG is unset, e.g. `debug` or `skyplate=trace`
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SurveyArg {
    Sdss,
    Galex,
}

impl From<SurveyArg> for Survey {
    fn from(arg: SurveyArg) -> Self {
        match arg {
            SurveyArg::Sdss => Survey::Sdss,
            SurveyArg::Galex => Survey::Galex,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Solve image files, or every image under the given directories
    Solve {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Images solved at once, each with its own session
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Exit successfully even when some images did not solve
        #[arg(long)]
        allow_failures: bool,
    },
    /// Have the service fetch and solve an image from a URL
    SolveUrl {
        url: String,
        #[arg(long)]
        allow_failures: bool,
    },
    /// Show the state of a submission or job
    Status {
        #[arg(long, conflicts_with = "job", required_unless_present = "job")]
        submission: Option<u64>,
        #[arg(long)]
        job: Option<u64>,
        /// Keep polling until the submission or job finishes
        #[arg(long)]
        wait: bool,
    },
    /// Download results and compile the overlay for a solved job
    Fetch {
        job_id: u64,
        /// Artifact file stem (default: job-<id>)
        #[arg(long)]
        name: Option<String>,
    },
    /// Compile an overlay from a saved annotations file, offline
    Annotate {
        annotations: PathBuf,
        /// Pixel scale in degrees per pixel
        #[arg(long)]
        pixel_scale: Option<f64>,
    },
    /// Download survey imagery covering the field of a solved `.wcs` file
    Plot {
        wcs: PathBuf,
        #[arg(long, value_enum, default_value_t = SurveyArg::Sdss)]
        survey: SurveyArg,
    },
    /// List job ids, by tag or for the logged-in user
    Jobs {
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, requires = "tag")]
        exact: bool,
    },
}

/// Installs the log bridge and a fmt subscriber writing to stderr.
fn init_logging(level: &str, format: LogFormat) -> Result<(), String> {
    tracing_log::LogTracer::init().map_err(|e| format!("Failed to bridge log records: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| format!("Invalid log filter '{}': {}", level, e))?;

    let result = match format {
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).json()),
        ),
    };
    result.map_err(|e| format!("Failed to install subscriber: {}", e))
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(key) = &cli.api_key {
        config.api_key = Some(key.clone());
    }
    if let Some(url) = &cli.api_url {
        config.api_url = url.clone();
    }
    if let Some(output) = &cli.output {
        config.output_directory = output.clone();
    }
    if let Some(interval) = cli.poll_interval {
        config.poll.interval_secs = interval;
    }
    if let Some(timeout) = cli.timeout {
        config.poll.timeout_secs = timeout;
    }
    if let Command::Solve {
        concurrency: Some(n),
        ..
    } = &cli.command
    {
        config.concurrency = *n;
    }
}

fn install_cancel_handler() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    if let Err(e) = ctrlc::set_handler(move || {
        if !flag.swap(true, Ordering::AcqRel) {
            eprintln!("Cancelling, waiting for the current request to return...");
        }
    }) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    cancel
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, cli.log_format) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, SkyplateError> {
    let mut config = load_config_or_default(cli.config.as_deref())?;
    apply_overrides(&mut config, &cli);
    validate_config(&config)?;

    let cancel = install_cancel_handler();

    match &cli.command {
        Command::Solve {
            paths,
            allow_failures,
            ..
        } => {
            let images = discover_images(paths)?;
            if images.is_empty() {
                warn!("No images found");
                return Ok(ExitCode::SUCCESS);
            }
            let sources = images.into_iter().map(ImageSource::File).collect();
            let summary = solve_batch(&config, sources, &cancel).await?;
            Ok(exit_code(&summary, *allow_failures))
        }
        Command::SolveUrl {
            url,
            allow_failures,
        } => {
            let summary = solve_batch(&config, vec![ImageSource::Url(url.clone())], &cancel).await?;
            Ok(exit_code(&summary, *allow_failures))
        }
        Command::Status {
            submission,
            job,
            wait,
        } => {
            let client = logged_in_client(&config).await?;
            status(&client, &config, *submission, *job, *wait, &cancel).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch { job_id, name } => {
            let client = logged_in_client(&config).await?;
            let pipeline = build_pipeline(&config)?;
            let stem = name.clone().unwrap_or_else(|| format!("job-{}", job_id));
            let report = pipeline.fetch_job(&client, *job_id, &stem).await?;
            print_report(&report);
            Ok(if report.outcome.is_solved() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Annotate {
            annotations,
            pixel_scale,
        } => {
            annotate(&config, annotations, *pixel_scale)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Plot { wcs, survey } => {
            let path = survey_plot(&config, wcs, (*survey).into()).await?;
            println!("wrote {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Jobs { tag, exact } => {
            let client = logged_in_client(&config).await?;
            let jobs = match tag {
                Some(tag) => client.jobs_by_tag(tag, *exact).await?,
                None => client.my_jobs().await?,
            };
            for job in jobs {
                println!("{}", job);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_pipeline(config: &Config) -> Result<SolvePipeline, SkyplateError> {
    let catalog = Catalog::load(config.catalog_path.as_deref())?;
    Ok(SolvePipeline::new(
        Arc::new(PipelineConfig::from_config(config)),
        Arc::new(GeometryCompiler::new(catalog)),
    ))
}

async fn logged_in_client(config: &Config) -> Result<NovaClient, SkyplateError> {
    let api_key = config.key_sources().resolve()?;
    info!("Using API key {}", secrets::fingerprint(&api_key));
    let mut client = NovaClient::from_config(config)?;
    client.login(&api_key).await?;
    Ok(client)
}

async fn solve_batch(
    config: &Config,
    sources: Vec<ImageSource>,
    cancel: &AtomicBool,
) -> Result<BatchSummary, SkyplateError> {
    let api_key = config.key_sources().resolve()?;
    info!(
        "Solving against {} with API key {}",
        sanitize::redact_url(&config.api_url),
        secrets::fingerprint(&api_key)
    );

    let pipeline = build_pipeline(config)?;
    let summary = pipeline
        .run_batch(|| NovaClient::from_config(config), &api_key, sources, cancel)
        .await;

    for report in &summary.reports {
        print_report(report);
    }
    if let Some(reason) = &summary.aborted {
        error!("Batch stopped early: {}", reason);
    }

    let writer = ArtifactWriter::new(&config.output_directory);
    if let Err(e) = writer.write_json("batch", "_summary.json", &BatchView::from(&summary)) {
        warn!("Could not save batch summary: {}", e);
    }
    Ok(summary)
}

fn exit_code(summary: &BatchSummary, allow_failures: bool) -> ExitCode {
    if summary.has_errors() || (!allow_failures && summary.failed() > 0) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_report(report: &ImageReport) {
    let outcome = match &report.outcome {
        ImageOutcome::Solved => "solved".to_string(),
        ImageOutcome::JobFailed => "job failed".to_string(),
        ImageOutcome::SubmissionEmpty => "no job created".to_string(),
        ImageOutcome::Unfinished => "not finished".to_string(),
        ImageOutcome::Errored { error } => format!("error: {}", error),
    };
    let job = report
        .job_id
        .map(|id| format!(" (job {})", id))
        .unwrap_or_default();
    println!("{}: {}{}", report.source, outcome, job);

    if report.outcome.is_solved() {
        println!("  constellation lines: {}", report.constellation_lines);
        for path in &report.artifacts {
            println!("  wrote {}", path.display());
        }
        if !report.missing_artifacts.is_empty() {
            println!("  unavailable: {}", report.missing_artifacts.join(", "));
        }
    }
}

async fn status(
    client: &NovaClient,
    config: &Config,
    submission: Option<u64>,
    job: Option<u64>,
    wait: bool,
    cancel: &AtomicBool,
) -> Result<(), SkyplateError> {
    let progress = LogProgress::new("status");
    let poller = SubmissionPoller::new(client, config.poll.into(), &progress);

    if let Some(submission_id) = submission {
        if wait {
            let outcome = poller.run(submission_id, cancel).await?;
            println!("submission {}: {:?}", submission_id, outcome);
            return Ok(());
        }
        let status = client.submission_status(submission_id).await?;
        println!(
            "submission {}: {}",
            submission_id,
            if status.processing_finished {
                "finished"
            } else {
                "processing"
            }
        );
        let jobs: Vec<String> = status
            .jobs
            .iter()
            .map(|j| j.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string()))
            .collect();
        println!("  jobs: [{}]", jobs.join(", "));
        return Ok(());
    }

    if let Some(job_id) = job {
        let job_status = if wait {
            if poller.run_job(job_id, cancel).await? {
                JobStatus::Success
            } else {
                JobStatus::Failure
            }
        } else {
            client.job_status(job_id).await?
        };
        println!("job {}: {:?}", job_id, job_status);

        if job_status == JobStatus::Success {
            if let Ok(calibration) = client.calibration(job_id).await {
                println!(
                    "  ra {:.4} dec {:.4} scale {:.3}\"/px orientation {:.1}",
                    calibration.ra, calibration.dec, calibration.pixscale, calibration.orientation
                );
            }
        }
    }
    Ok(())
}

async fn survey_plot(
    config: &Config,
    wcs_path: &Path,
    survey: Survey,
) -> Result<PathBuf, SkyplateError> {
    let header = std::fs::read(wcs_path)
        .map_err(|_| SkyplateError::InputNotFound(wcs_path.to_path_buf()))?;
    let wcs = TanWcs::from_header(&header)?;

    let client = logged_in_client(config).await?;
    let plot = client.survey_plot(survey, &wcs).await?;

    let stem = wcs_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("field")
        .to_string();
    let suffix = format!("_{}.png", survey.name());
    Ok(ArtifactWriter::new(&config.output_directory).write_bytes(&stem, &suffix, &plot)?)
}

/// Saved annotations: either the service response or a bare list.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnnotationsFile {
    Response { annotations: Vec<AnnotationRecord> },
    List(Vec<AnnotationRecord>),
}

fn annotate(
    config: &Config,
    annotations_path: &Path,
    pixel_scale: Option<f64>,
) -> Result<(), SkyplateError> {
    let content = std::fs::read_to_string(annotations_path)
        .map_err(|_| SkyplateError::InputNotFound(annotations_path.to_path_buf()))?;
    let parsed = serde_json::from_str::<AnnotationsFile>(&content).map_err(|e| {
        SkyplateError::InvalidInput {
            path: annotations_path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;
    let annotations = match parsed {
        AnnotationsFile::Response { annotations } | AnnotationsFile::List(annotations) => {
            annotations
        }
    };
    let annotations: Vec<AnnotationRecord> =
        annotations.into_iter().filter(|a| a.is_valid()).collect();

    let catalog = Catalog::load(config.catalog_path.as_deref())?;
    let overlay = GeometryCompiler::new(catalog).compile(&annotations, pixel_scale);

    let stem = annotations_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches("_annotations").to_string())
        .unwrap_or_else(|| "annotations".to_string());
    let path = ArtifactWriter::new(&config.output_directory).write_json(
        &stem,
        "_overlay.json",
        &overlay,
    )?;

    for edge in &overlay.edges {
        let label = edge.label().unwrap_or_default().replace('\n', ", ");
        println!(
            "{} {} - {}: {:.1}px {}",
            edge.constellation, edge.from, edge.to, edge.pixel_distance, label
        );
    }
    if !overlay.unresolved.is_empty() {
        println!("unresolved: {}", overlay.unresolved.join(", "));
    }
    println!("wrote {}", path.display());
    Ok(())
}
