//! Job strategy trait.

use crate::types::job::{JobPoll, StatusMap};
use crate::Error;
use async_trait::async_trait;

/// Capability-specific half of an asynchronous job.
///
/// The orchestrator owns the lifecycle; a strategy only knows how to shape
/// the submit and status requests for one service and how that service names
/// its statuses. Transcription and video generation each provide one.
#[async_trait]
pub trait JobStrategy: Send + Sync {
    /// Submit the job. Called exactly once per run; returns the job id.
    async fn submit(&self) -> Result<String, Error>;

    /// Fetch the current status of `job_id`.
    async fn poll(&self, job_id: &str) -> Result<JobPoll, Error>;

    /// The service's status vocabulary.
    fn status_map(&self) -> StatusMap;
}
