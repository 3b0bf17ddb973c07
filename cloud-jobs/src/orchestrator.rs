//! Submit, poll until terminal, report.

use std::time::Duration;

use log::*;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{job_error, Error, JobErrorKind};
use crate::traits::job::JobStrategy;
use crate::types::job::{Job, JobStatus};

/// Poll cadence used when the caller does not pick one.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Fallback reason for a failed job whose service gave no message.
pub const UNKNOWN_FAILURE_REASON: &str = "Unknown error";

/// Whether `run` waits for a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Wait,
    /// Return right after submission without polling.
    Detach,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        job_id: String,
        artifact_locator: Option<String>,
    },
    Failed {
        job_id: String,
        reason: String,
    },
    Detached {
        job_id: String,
    },
}

impl JobOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            JobOutcome::Completed { job_id, .. }
            | JobOutcome::Failed { job_id, .. }
            | JobOutcome::Detached { job_id } => job_id,
        }
    }
}

/// Drives any [`JobStrategy`] through the job state machine.
///
/// Polls at a fixed cadence until the job is terminal. An optional maximum
/// wait and an optional cancellation token are both checked on every tick;
/// without them the loop runs until the service reports a terminal status.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    poll_interval: Duration,
    max_wait: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Orchestrator {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            max_wait: None,
            cancel: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub async fn run<S>(&self, strategy: &S, mode: RunMode) -> Result<JobOutcome, Error>
    where
        S: JobStrategy + ?Sized,
    {
        let job_id = strategy.submit().await?;
        info!("Submitted job {}", job_id);

        if mode == RunMode::Detach {
            return Ok(JobOutcome::Detached { job_id });
        }

        let statuses = strategy.status_map();
        let deadline = self.max_wait.map(|max_wait| Instant::now() + max_wait);
        let mut job = Job::new(job_id);

        loop {
            self.check_tick(&job, deadline)?;

            let poll = strategy.poll(&job.job_id).await?;
            let status = statuses.resolve(&poll.status)?;
            job.apply(status, poll)?;
            debug!("Job {} is {}", job.job_id, job.status);

            match job.status {
                JobStatus::Completed => {
                    info!("Job {} completed", job.job_id);
                    return Ok(JobOutcome::Completed {
                        job_id: job.job_id,
                        artifact_locator: job.artifact_locator,
                    });
                }
                JobStatus::Failed => {
                    let reason = job
                        .failure_reason
                        .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string());
                    warn!("Job {} failed: {}", job.job_id, reason);
                    return Ok(JobOutcome::Failed {
                        job_id: job.job_id,
                        reason,
                    });
                }
                JobStatus::Submitted | JobStatus::InProgress => {}
            }

            let pause = match deadline {
                Some(deadline) => self
                    .poll_interval
                    .min(deadline.saturating_duration_since(Instant::now())),
                None => self.poll_interval,
            };
            self.sleep(&job, pause).await?;
        }
    }

    fn check_tick(&self, job: &Job, deadline: Option<Instant>) -> Result<(), Error> {
        if self.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            return Err(self.cancelled(job));
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                warn!("Job {} exceeded its maximum wait", job.job_id);
                return Err(job_error(
                    JobErrorKind::DeadlineExceeded,
                    &format!(
                        "job {} still {} after the maximum wait",
                        job.job_id, job.status
                    ),
                ));
            }
        }
        Ok(())
    }

    async fn sleep(&self, job: &Job, pause: Duration) -> Result<(), Error> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(self.cancelled(job)),
                    _ = tokio::time::sleep(pause) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(pause).await;
                Ok(())
            }
        }
    }

    fn cancelled(&self, job: &Job) -> Error {
        info!("Job {} polling cancelled", job.job_id);
        job_error(
            JobErrorKind::Cancelled,
            &format!("stopped waiting for job {}", job.job_id),
        )
    }
}
