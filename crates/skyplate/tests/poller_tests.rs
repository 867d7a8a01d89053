//! Submission/job polling against scripted status sequences.

mod common;

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use common::*;
use skyplate::client::{PollConfig, PollState, SolveOutcome, SubmissionPoller};
use skyplate::progress::RecordingProgress;
use skyplate::ClientError;

fn fast(timeout: Option<Duration>) -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(5),
        timeout,
    }
}

#[tokio::test]
async fn test_poll_until_solved_in_order() {
    let exchange = ScriptedExchange::new();
    exchange
        .json("submissions/11", submission_pending())
        .json("submissions/11", submission_finished(&[Some(42)]))
        .json("jobs/42", job_status("solving"))
        .json("jobs/42", job_status("success"));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(Some(Duration::from_secs(10))), &progress);
    let cancel = AtomicBool::new(false);

    let outcome = poller.run(11, &cancel).await.unwrap();
    assert_eq!(
        outcome,
        SolveOutcome::Solved {
            submission_id: 11,
            job_id: 42
        }
    );
    assert_eq!(
        progress.states(),
        vec![
            PollState::Uploaded(11),
            PollState::SubmissionPending(11),
            PollState::SubmissionFinished(11),
            PollState::JobDiscovered(42),
            PollState::JobPending(42),
            PollState::JobSucceeded(42),
        ]
    );
    assert_eq!(exchange.count("submissions/11"), 2);
    assert_eq!(exchange.count("jobs/42"), 2);
}

#[tokio::test]
async fn test_job_not_discovered_before_submission_finishes() {
    // A job id shows up while the submission is still processing.
    let exchange = ScriptedExchange::new();
    exchange
        .json(
            "submissions/12",
            serde_json::json!({"processing_finished": null, "jobs": [43]}),
        )
        .json("submissions/12", submission_pending())
        .json("submissions/12", submission_finished(&[Some(43)]))
        .json("jobs/43", job_status("success"));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    poller.run(12, &AtomicBool::new(false)).await.unwrap();

    assert_eq!(exchange.count("submissions/12"), 3);
    let states = progress.states();
    let finished = states
        .iter()
        .position(|s| *s == PollState::SubmissionFinished(12))
        .unwrap();
    let discovered = states
        .iter()
        .position(|s| *s == PollState::JobDiscovered(43))
        .unwrap();
    assert!(finished < discovered);
}

#[tokio::test]
async fn test_finished_without_job_is_submission_empty() {
    let exchange = ScriptedExchange::new();
    exchange.json("submissions/13", submission_finished(&[None]));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    let outcome = poller.run(13, &AtomicBool::new(false)).await.unwrap();
    assert_eq!(outcome, SolveOutcome::SubmissionEmpty { submission_id: 13 });
    assert_eq!(outcome.job_id(), None);
    assert!(matches!(
        outcome.into_result(),
        Err(ClientError::SubmissionEmpty(13))
    ));
    assert_eq!(progress.states().last(), Some(&PollState::SubmissionEmpty(13)));
    assert!(exchange.calls().iter().all(|c| !c.path.starts_with("api/jobs/")));
}

#[tokio::test]
async fn test_first_existing_job_is_followed() {
    let exchange = ScriptedExchange::new();
    exchange
        .json("submissions/14", submission_finished(&[None, Some(8), Some(9)]))
        .json("jobs/8", job_status("failure"));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    let outcome = poller.run(14, &AtomicBool::new(false)).await.unwrap();
    assert_eq!(
        outcome,
        SolveOutcome::JobFailed {
            submission_id: 14,
            job_id: 8
        }
    );
    assert_eq!(exchange.count("jobs/9"), 0);
}

#[tokio::test]
async fn test_unknown_job_status_keeps_waiting() {
    let exchange = ScriptedExchange::new();
    exchange
        .json("jobs/50", job_status("reticulating"))
        .json("jobs/50", job_status("success"));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    assert!(poller.run_job(50, &AtomicBool::new(false)).await.unwrap());
    assert_eq!(exchange.count("jobs/50"), 2);
}

#[tokio::test]
async fn test_deadline_is_poll_timeout() {
    let exchange = ScriptedExchange::new();
    exchange.json("submissions/15", submission_pending());

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(
        &client,
        fast(Some(Duration::from_millis(40))),
        &progress,
    );

    match poller.run(15, &AtomicBool::new(false)).await.unwrap_err() {
        ClientError::PollTimeout {
            waiting_for,
            elapsed,
        } => {
            assert_eq!(waiting_for, "submission 15");
            assert!(elapsed >= Duration::from_millis(40));
        }
        other => panic!("Expected PollTimeout, got {:?}", other),
    }
    assert!(exchange.count("submissions/15") >= 2);
}

#[tokio::test]
async fn test_cancel_stops_before_any_request() {
    let exchange = ScriptedExchange::new();
    exchange.json("submissions/16", submission_pending());

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    let err = poller.run(16, &AtomicBool::new(true)).await.unwrap_err();
    assert!(matches!(err, ClientError::Cancelled(_)));
    assert!(err.aborts_batch());
    assert!(exchange.calls().is_empty());
}

#[tokio::test]
async fn test_status_errors_propagate() {
    let exchange = ScriptedExchange::new();
    exchange.json("submissions/17", server_error("no such submission"));

    let client = client(&exchange);
    let progress = RecordingProgress::new();
    let poller = SubmissionPoller::new(&client, fast(None), &progress);

    let err = poller.run(17, &AtomicBool::new(false)).await.unwrap_err();
    assert!(matches!(err, ClientError::Server { .. }));
}
