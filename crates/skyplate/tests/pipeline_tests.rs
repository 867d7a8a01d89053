//! Solve runs end to end against a scripted service, writing into a
//! temporary output directory.

mod common;

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde_json::Value;
use tempfile::TempDir;

use common::*;
use skyplate::client::results::ResultFile;
use skyplate::client::{PollConfig, ResultFetcher};
use skyplate::pipeline::{PipelineConfig, SolveTask};
use skyplate::progress::{NoopProgress, ProgressEvent, RecordingProgress};
use skyplate::{Catalog, Config, GeometryCompiler, ImageOutcome, ImageSource, SolvePipeline};

fn api_key() -> SecretString {
    SecretString::from("test-api-key".to_string())
}

fn pipeline_config(output: &Path, concurrency: usize) -> PipelineConfig {
    let config = Config {
        output_directory: output.to_path_buf(),
        concurrency,
        ..Config::default()
    };
    let mut pipeline = PipelineConfig::from_config(&config);
    pipeline.poll = PollConfig {
        interval: Duration::from_millis(5),
        timeout: Some(Duration::from_secs(10)),
    };
    pipeline
}

fn pipeline(config: PipelineConfig) -> SolvePipeline {
    SolvePipeline::new(
        Arc::new(config),
        Arc::new(GeometryCompiler::new(Catalog::builtin())),
    )
    .with_progress(Arc::new(NoopProgress))
}

fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, b"\xff\xd8\xff\xe0 fake jpeg").unwrap();
    path
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn test_fetcher_records_partial_failures() {
    let exchange = ScriptedExchange::new();
    exchange
        .json("jobs/7/calibration", calibration())
        .json("jobs/7/tags", tags(&["Betelgeuse"]))
        .json("jobs/7/machine_tags", tags(&[]))
        .json("jobs/7/objects_in_field", objects_in_field(&["Betelgeuse"]))
        .reply(
            "jobs/7/annotations",
            Reply::Status(500, "Internal Server Error".to_string()),
        )
        .json("jobs/7/info", job_info())
        .file("wcs_file/7", b"SIMPLE");
    let client = client(&exchange);

    let progress = RecordingProgress::new();
    let fetcher = ResultFetcher::new(&client, &progress);
    let bundle = fetcher.fetch_all(7).await;

    assert!(bundle.calibration.is_some());
    assert!(bundle.info.is_some());
    assert_eq!(bundle.tags.as_deref(), Some(&["Betelgeuse".to_string()][..]));
    assert!(bundle.annotations.is_none());
    assert!(!bundle.is_complete());
    assert_eq!(bundle.failures.len(), 1);
    assert_eq!(bundle.failures[0].0, "annotations");
    assert!((bundle.degrees_per_pixel().unwrap() - 0.01).abs() < 1e-12);

    let unavailable: Vec<_> = progress
        .events()
        .into_iter()
        .filter(|e| matches!(e, ProgressEvent::ArtifactFetched { available: false, .. }))
        .collect();
    assert_eq!(unavailable.len(), 1);

    let files = fetcher
        .fetch_files(7, &[ResultFile::Wcs, ResultFile::Kmz])
        .await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, ResultFile::Wcs);
}

#[tokio::test]
async fn test_solve_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "input/orion.jpg");
    let output = dir.path().join("out");

    let exchange = ScriptedExchange::new();
    script_solved(&exchange, 100, 200);

    let progress = Arc::new(RecordingProgress::new());
    let pipeline = pipeline(pipeline_config(&output, 1)).with_progress(progress.clone());
    let mut client = client(&exchange);
    let task = SolveTask::new(ImageSource::File(image));

    let report = pipeline
        .solve(&mut client, &api_key(), &task, &AtomicBool::new(false))
        .await
        .unwrap();

    assert_eq!(report.outcome, ImageOutcome::Solved);
    assert_eq!(report.submission_id, Some(100));
    assert_eq!(report.job_id, Some(200));
    assert_eq!(report.constellation_lines, 1);
    assert!(report.missing_artifacts.is_empty(), "{:?}", report.missing_artifacts);
    assert!(report.finished_at.is_some());

    for name in [
        "orion.wcs",
        "orion_overlay.json",
        "orion_annotations.json",
        "orion_calibration.json",
        "orion_results.json",
    ] {
        let path = output.join(name);
        assert!(path.exists(), "missing {}", name);
        assert!(report.artifacts.contains(&path));
    }

    let overlay = read_json(&output.join("orion_overlay.json"));
    let edge = &overlay["edges"][0];
    assert_eq!(edge["constellation"], "Ori");
    assert!((edge["angular_separation"].as_f64().unwrap() - 0.04).abs() < 1e-9);
    assert!(edge["physical_separation"].as_f64().unwrap() > 0.0);

    let calibration = read_json(&output.join("orion_calibration.json"));
    assert_eq!(calibration["pixscale"], 36.0);
    assert_eq!(std::fs::read(output.join("orion.wcs")).unwrap(), b"SIMPLE  =                    T");

    assert!(progress
        .events()
        .contains(&ProgressEvent::OverlayCompiled {
            edges: 1,
            unresolved: overlay["unresolved"].as_array().unwrap().len(),
        }));
}

#[tokio::test]
async fn test_solve_records_missing_artifacts() {
    let dir = TempDir::new().unwrap();
    let image = write_image(dir.path(), "m42.jpg");

    let exchange = ScriptedExchange::new();
    exchange
        .json("login", login_ok(SESSION))
        .json("upload", upload_ok(1))
        .json("submissions/1", submission_finished(&[Some(2)]))
        .json("jobs/2", job_status("success"))
        .json("jobs/2/calibration", calibration())
        .json("jobs/2/info", job_info());

    let mut config = pipeline_config(dir.path(), 1);
    config.results.files = vec![ResultFile::Wcs, ResultFile::Kmz];
    let pipeline = pipeline(config);
    let mut client = client(&exchange);

    let report = pipeline
        .solve(
            &mut client,
            &api_key(),
            &SolveTask::new(ImageSource::File(image)),
            &AtomicBool::new(false),
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, ImageOutcome::Solved);
    for missing in ["annotations", "tags", "wcs", "kmz"] {
        assert!(
            report.missing_artifacts.iter().any(|m| m == missing),
            "{} not reported missing",
            missing
        );
    }
    assert!(!dir.path().join("m42_overlay.json").exists());
    assert!(dir.path().join("m42_calibration.json").exists());
    assert!(dir.path().join("m42_results.json").exists());
}

#[tokio::test]
async fn test_solver_failures_are_outcomes() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    exchange
        .json("login", login_ok(SESSION))
        .json("url_upload", upload_ok(5))
        .json("url_upload", upload_ok(6))
        .json("submissions/5", submission_finished(&[None]))
        .json("submissions/6", submission_finished(&[Some(60)]))
        .json("jobs/60", job_status("failure"));

    let pipeline = pipeline(pipeline_config(dir.path(), 1));
    let mut client = client(&exchange);
    let cancel = AtomicBool::new(false);

    let empty = pipeline
        .solve(
            &mut client,
            &api_key(),
            &SolveTask::new(ImageSource::Url("https://example.com/a.jpg".into())),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(empty.outcome, ImageOutcome::SubmissionEmpty);
    assert_eq!(empty.job_id, None);

    let failed = pipeline
        .solve(
            &mut client,
            &api_key(),
            &SolveTask::new(ImageSource::Url("https://example.com/b.jpg".into())),
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(failed.outcome, ImageOutcome::JobFailed);
    assert_eq!(failed.job_id, Some(60));
    assert!(failed.artifacts.is_empty());

    // One login serves both images.
    assert_eq!(exchange.count("login"), 1);
}

#[tokio::test]
async fn test_fetch_job_collects_existing_job() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    exchange.json("jobs/200", job_status("success"));
    script_results(&exchange, 200);

    let pipeline = pipeline(pipeline_config(dir.path(), 1));
    let client = client(&exchange);

    let report = pipeline.fetch_job(&client, 200, "job_200").await.unwrap();
    assert_eq!(report.outcome, ImageOutcome::Solved);
    assert!(dir.path().join("job_200_overlay.json").exists());
    assert!(dir.path().join("job_200.wcs").exists());
}

#[tokio::test]
async fn test_fetch_job_unfinished() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    exchange.json("jobs/201", job_status("solving"));

    let pipeline = pipeline(pipeline_config(dir.path(), 1));
    let report = pipeline
        .fetch_job(&client(&exchange), 201, "job_201")
        .await
        .unwrap();
    assert_eq!(report.outcome, ImageOutcome::Unfinished);
    assert!(report.artifacts.is_empty());
}

#[tokio::test]
async fn test_batch_stops_on_rejected_key() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    exchange.json("login", server_error("bad apikey"));

    let pipeline = pipeline(pipeline_config(dir.path(), 1));
    let sources = vec![
        ImageSource::File(write_image(dir.path(), "a.jpg")),
        ImageSource::File(write_image(dir.path(), "b.jpg")),
        ImageSource::File(write_image(dir.path(), "c.jpg")),
    ];

    let summary = pipeline
        .run_batch(
            || Ok(client(&exchange)),
            &api_key(),
            sources,
            &AtomicBool::new(false),
        )
        .await;

    assert_eq!(summary.reports.len(), 1);
    assert!(summary.reports[0].outcome.is_error());
    assert_eq!(summary.skipped, 2);
    assert!(summary.aborted.as_deref().unwrap().contains("bad apikey"));
    assert!(summary.has_errors());
    assert_eq!(exchange.count("upload"), 0);
}

#[tokio::test]
async fn test_batch_continues_past_image_errors() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    script_solved(&exchange, 100, 200);
    exchange.reply("upload", Reply::Status(500, "boom".to_string()));
    // Queue order: the first upload succeeds, the second hits the 500.
    let pipeline = pipeline(pipeline_config(dir.path(), 1));
    let sources = vec![
        ImageSource::File(write_image(dir.path(), "first.jpg")),
        ImageSource::File(write_image(dir.path(), "second.jpg")),
    ];

    let summary = pipeline
        .run_batch(
            || Ok(client(&exchange)),
            &api_key(),
            sources,
            &AtomicBool::new(false),
        )
        .await;

    assert_eq!(summary.reports.len(), 2);
    assert_eq!(summary.reports[0].stem, "first");
    assert!(summary.reports[0].outcome.is_solved());
    assert_eq!(summary.reports[1].stem, "second");
    assert!(summary.reports[1].outcome.is_error());
    assert!(summary.aborted.is_none());
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.solved(), 1);
    assert_eq!(summary.errored(), 1);
}

#[tokio::test]
async fn test_concurrent_batch_numbers_duplicate_stems() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();
    script_solved(&exchange, 100, 200);

    let pipeline = pipeline(pipeline_config(&dir.path().join("out"), 2));
    let sources = vec![
        ImageSource::File(write_image(dir.path(), "night1/m42.jpg")),
        ImageSource::File(write_image(dir.path(), "night2/m42.jpg")),
    ];

    let summary = pipeline
        .run_batch(
            || Ok(client(&exchange)),
            &api_key(),
            sources,
            &AtomicBool::new(false),
        )
        .await;

    assert_eq!(summary.solved(), 2);
    assert_eq!(summary.reports[0].stem, "m42");
    assert_eq!(summary.reports[1].stem, "m42_2");
    assert!(dir.path().join("out/m42.wcs").exists());
    assert!(dir.path().join("out/m42_2.wcs").exists());
    assert!((1..=2).contains(&exchange.count("login")));
}

#[tokio::test]
async fn test_cancelled_batch_skips_everything() {
    let dir = TempDir::new().unwrap();
    let exchange = ScriptedExchange::new();

    let pipeline = pipeline(pipeline_config(dir.path(), 2));
    let sources = vec![
        ImageSource::Url("https://example.com/a.jpg".into()),
        ImageSource::Url("https://example.com/b.jpg".into()),
    ];

    let summary = pipeline
        .run_batch(
            || Ok(client(&exchange)),
            &api_key(),
            sources,
            &AtomicBool::new(true),
        )
        .await;

    assert!(summary.reports.is_empty());
    assert_eq!(summary.skipped, 2);
    assert!(summary.has_errors());
    assert!(exchange.calls().is_empty());
}
