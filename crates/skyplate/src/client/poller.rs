//! Drives a submission to a terminal job state.
//!
//! ```text
//! Uploaded -> SubmissionPending -> SubmissionFinished -> JobDiscovered -> JobPending -> JobSucceeded
//!                                          |                                  \-> JobFailed
//!                                          \-> SubmissionEmpty
//! ```
//!
//! Both waits poll at the same configured interval, stop at a deadline, and
//! observe a cancellation flag between attempts.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::api::NovaClient;
use super::types::JobStatus;
use crate::error::ClientError;
use crate::progress::{ProgressEvent, ProgressReporter};

/// Longest single sleep, so cancellation is noticed promptly.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Uploaded(u64),
    SubmissionPending(u64),
    SubmissionFinished(u64),
    SubmissionEmpty(u64),
    JobDiscovered(u64),
    JobPending(u64),
    JobSucceeded(u64),
    JobFailed(u64),
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::SubmissionEmpty(_) | PollState::JobSucceeded(_) | PollState::JobFailed(_)
        )
    }
}

impl fmt::Display for PollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollState::Uploaded(id) => write!(f, "submission {} uploaded", id),
            PollState::SubmissionPending(id) => write!(f, "submission {} processing", id),
            PollState::SubmissionFinished(id) => write!(f, "submission {} finished", id),
            PollState::SubmissionEmpty(id) => write!(f, "submission {} produced no job", id),
            PollState::JobDiscovered(id) => write!(f, "job {} discovered", id),
            PollState::JobPending(id) => write!(f, "job {} solving", id),
            PollState::JobSucceeded(id) => write!(f, "job {} solved", id),
            PollState::JobFailed(id) => write!(f, "job {} failed", id),
        }
    }
}

/// Terminal result of a solve. Failures here are results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved { submission_id: u64, job_id: u64 },
    JobFailed { submission_id: u64, job_id: u64 },
    SubmissionEmpty { submission_id: u64 },
}

impl SolveOutcome {
    pub fn job_id(&self) -> Option<u64> {
        match self {
            SolveOutcome::Solved { job_id, .. } | SolveOutcome::JobFailed { job_id, .. } => {
                Some(*job_id)
            }
            SolveOutcome::SubmissionEmpty { .. } => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved { .. })
    }

    /// Converts terminal failures into errors, for callers that want `?`.
    pub fn into_result(self) -> Result<u64, ClientError> {
        match self {
            SolveOutcome::Solved { job_id, .. } => Ok(job_id),
            SolveOutcome::JobFailed { job_id, .. } => Err(ClientError::JobFailed { job_id }),
            SolveOutcome::SubmissionEmpty { submission_id } => {
                Err(ClientError::SubmissionEmpty(submission_id))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Wait between status requests, for submissions and jobs alike.
    pub interval: Duration,
    /// Overall budget for one `run`. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

pub struct SubmissionPoller<'a> {
    client: &'a NovaClient,
    config: PollConfig,
    progress: &'a dyn ProgressReporter,
}

/// Deadline and cancellation shared by both waits of one run.
struct Budget<'c> {
    started: Instant,
    deadline: Option<Instant>,
    cancel: &'c AtomicBool,
}

impl<'a> SubmissionPoller<'a> {
    pub fn new(
        client: &'a NovaClient,
        config: PollConfig,
        progress: &'a dyn ProgressReporter,
    ) -> Self {
        Self {
            client,
            config,
            progress,
        }
    }

    fn budget<'c>(&self, cancel: &'c AtomicBool) -> Budget<'c> {
        let started = Instant::now();
        Budget {
            started,
            deadline: self.config.timeout.map(|t| started + t),
            cancel,
        }
    }

    fn enter(&self, state: PollState) {
        debug!("Poll state -> {}", state);
        self.progress.report(ProgressEvent::State(state));
    }

    /// Waits for an uploaded submission to finish and its first job to end.
    pub async fn run(
        &self,
        submission_id: u64,
        cancel: &AtomicBool,
    ) -> Result<SolveOutcome, ClientError> {
        let budget = self.budget(cancel);
        self.enter(PollState::Uploaded(submission_id));

        let job_id = match self.wait_for_submission(submission_id, &budget).await? {
            Some(job_id) => job_id,
            None => {
                warn!(
                    "Submission {} finished without a job (likely failed to process)",
                    submission_id
                );
                self.enter(PollState::SubmissionEmpty(submission_id));
                return Ok(SolveOutcome::SubmissionEmpty { submission_id });
            }
        };

        self.enter(PollState::JobDiscovered(job_id));
        let solved = self.wait_for_job(job_id, &budget).await?;
        Ok(if solved {
            SolveOutcome::Solved {
                submission_id,
                job_id,
            }
        } else {
            SolveOutcome::JobFailed {
                submission_id,
                job_id,
            }
        })
    }

    /// Waits for a job that is already known, skipping the submission stage.
    ///
    /// Returns `true` when the job solved and `false` when it failed.
    pub async fn run_job(&self, job_id: u64, cancel: &AtomicBool) -> Result<bool, ClientError> {
        let budget = self.budget(cancel);
        self.enter(PollState::JobDiscovered(job_id));
        self.wait_for_job(job_id, &budget).await
    }

    async fn wait_for_submission(
        &self,
        submission_id: u64,
        budget: &Budget<'_>,
    ) -> Result<Option<u64>, ClientError> {
        self.enter(PollState::SubmissionPending(submission_id));
        let waiting_for = format!("submission {}", submission_id);

        loop {
            check_cancelled(budget, &waiting_for)?;
            let status = self.client.submission_status(submission_id).await?;

            if status.processing_finished {
                self.enter(PollState::SubmissionFinished(submission_id));
                let job_id = status.first_job();
                if let Some(job_id) = job_id {
                    info!("Submission {} selected job {}", submission_id, job_id);
                }
                return Ok(job_id);
            }

            debug!(
                "Submission {} still processing ({} job slot(s) so far)",
                submission_id,
                status.jobs.len()
            );
            self.pause(budget, &waiting_for).await?;
        }
    }

    async fn wait_for_job(&self, job_id: u64, budget: &Budget<'_>) -> Result<bool, ClientError> {
        self.enter(PollState::JobPending(job_id));
        let waiting_for = format!("job {}", job_id);

        loop {
            check_cancelled(budget, &waiting_for)?;
            match self.client.job_status(job_id).await? {
                JobStatus::Success => {
                    info!("Job {} succeeded", job_id);
                    self.enter(PollState::JobSucceeded(job_id));
                    return Ok(true);
                }
                JobStatus::Failure => {
                    warn!("Job {} failed to solve", job_id);
                    self.enter(PollState::JobFailed(job_id));
                    return Ok(false);
                }
                JobStatus::Unknown => {
                    warn!("Job {} reported an unrecognized status; still waiting", job_id);
                }
                status => debug!("Job {} is {:?}", job_id, status),
            }
            self.pause(budget, &waiting_for).await?;
        }
    }

    /// Sleeps one interval in short slices, failing on cancel or deadline.
    async fn pause(&self, budget: &Budget<'_>, waiting_for: &str) -> Result<(), ClientError> {
        let wake = Instant::now() + self.config.interval;

        loop {
            check_cancelled(budget, waiting_for)?;

            let now = Instant::now();
            if let Some(deadline) = budget.deadline {
                if now >= deadline {
                    return Err(ClientError::PollTimeout {
                        waiting_for: waiting_for.to_string(),
                        elapsed: now.duration_since(budget.started),
                    });
                }
            }
            if now >= wake {
                return Ok(());
            }

            let mut slice = (wake - now).min(CANCEL_CHECK_SLICE);
            if let Some(deadline) = budget.deadline {
                slice = slice.min(deadline - now);
            }
            tokio::time::sleep(slice).await;
        }
    }
}

fn check_cancelled(budget: &Budget<'_>, waiting_for: &str) -> Result<(), ClientError> {
    if budget.cancel.load(Ordering::Acquire) {
        return Err(ClientError::Cancelled(waiting_for.to_string()));
    }
    Ok(())
}
