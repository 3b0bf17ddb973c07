//! Job lifecycle types.

use std::fmt;
use std::str::FromStr;

use crate::error::{protocol_error, Error, ProtocolErrorKind};

/// Lifecycle state of a remote asynchronous job.
///
/// Jobs start as `Submitted`, move through `InProgress` while the service
/// works, and end in `Completed` or `Failed`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Submitted,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "SUBMITTED",
            JobStatus::InProgress => "IN_PROGRESS",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether a poll may move a job from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Submitted | JobStatus::InProgress => next != JobStatus::Submitted,
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(JobStatus::Submitted),
            "IN_PROGRESS" => Ok(JobStatus::InProgress),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(protocol_error(
                ProtocolErrorKind::UnrecognizedStatus,
                &format!("unknown job status '{}'", other),
            )),
        }
    }
}

/// Maps a service's raw status strings onto [`JobStatus`].
///
/// Each capability has its own vocabulary (`QUEUED`, `InProgress`, ...).
/// Anything not registered is a protocol error, never a guess.
#[derive(Debug, Clone, Default)]
pub struct StatusMap {
    entries: Vec<(String, JobStatus)>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, raw: &str, status: JobStatus) -> Self {
        self.entries.push((raw.to_string(), status));
        self
    }

    pub fn resolve(&self, raw: &str) -> Result<JobStatus, Error> {
        self.entries
            .iter()
            .find(|(name, _)| name == raw)
            .map(|(_, status)| *status)
            .ok_or_else(|| {
                protocol_error(
                    ProtocolErrorKind::UnrecognizedStatus,
                    &format!("service reported unrecognized status '{}'", raw),
                )
            })
    }
}

/// One status observation returned by a strategy's poll.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPoll {
    /// Raw status string as the service reported it.
    pub status: String,
    pub artifact_locator: Option<String>,
    pub failure_reason: Option<String>,
}

impl JobPoll {
    pub fn status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            ..Default::default()
        }
    }

    pub fn with_artifact(mut self, locator: &str) -> Self {
        self.artifact_locator = Some(locator.to_string());
        self
    }

    pub fn with_failure(mut self, reason: &str) -> Self {
        self.failure_reason = Some(reason.to_string());
        self
    }
}

/// A submitted job, mutated only by polling.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub artifact_locator: Option<String>,
    pub failure_reason: Option<String>,
}

impl Job {
    pub fn new(job_id: String) -> Self {
        Self {
            job_id,
            status: JobStatus::Submitted,
            artifact_locator: None,
            failure_reason: None,
        }
    }

    /// Apply a resolved poll result.
    pub fn apply(&mut self, status: JobStatus, poll: JobPoll) -> Result<(), Error> {
        if !self.status.can_transition_to(status) {
            return Err(protocol_error(
                ProtocolErrorKind::InvalidTransition,
                &format!("job {} cannot move from {} to {}", self.job_id, self.status, status),
            ));
        }

        self.status = status;
        if poll.artifact_locator.is_some() {
            self.artifact_locator = poll.artifact_locator;
        }
        if poll.failure_reason.is_some() {
            self.failure_reason = poll.failure_reason;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_terminal_states_accept_no_transition() {
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            for next in [
                JobStatus::Submitted,
                JobStatus::InProgress,
                JobStatus::Completed,
                JobStatus::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_in_progress_self_loop_is_allowed() {
        assert!(JobStatus::InProgress.can_transition_to(JobStatus::InProgress));
        assert!(JobStatus::Submitted.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::InProgress.can_transition_to(JobStatus::Submitted));
    }

    #[test]
    fn test_completed_job_is_never_resurrected() {
        let mut job = Job::new("job-1".to_string());
        job.apply(JobStatus::Completed, JobPoll::status("COMPLETED").with_artifact("s3://b/k"))
            .unwrap();

        let err = job
            .apply(JobStatus::InProgress, JobPoll::status("IN_PROGRESS"))
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Protocol(ProtocolErrorKind::InvalidTransition));
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.artifact_locator.as_deref(), Some("s3://b/k"));
    }

    #[test]
    fn test_status_map_rejects_unknown_values() {
        let map = StatusMap::new()
            .with("InProgress", JobStatus::InProgress)
            .with("Completed", JobStatus::Completed);

        assert_eq!(map.resolve("Completed").unwrap(), JobStatus::Completed);
        let err = map.resolve("Paused").unwrap_err();
        assert_eq!(err.error_kind, ErrorKind::Protocol(ProtocolErrorKind::UnrecognizedStatus));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        assert_eq!("IN_PROGRESS".parse::<JobStatus>().unwrap(), JobStatus::InProgress);
        assert_eq!(JobStatus::Failed.to_string(), "FAILED");
        assert!("DONE".parse::<JobStatus>().is_err());
    }
}
