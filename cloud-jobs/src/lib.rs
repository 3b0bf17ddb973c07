//! Job orchestration and artifact handling for managed cloud services.
//!
//! This crate provides the service-agnostic pieces the tool handlers share:
//! - A job state machine and an orchestrator that drives any [`traits::job::JobStrategy`]
//!   through submit, poll and terminal states, with optional deadline and cancellation
//! - A retrying, streamed artifact fetcher and an uploader into any [`traits::storage::ObjectStore`]
//! - `scheme://bucket/key` locator parsing
//! - Speaker-attributed transcript reconstruction
//!
//! Service-specific request shaping lives with the handlers; nothing here
//! knows which cloud API it is talking to.

pub mod error;
pub mod fetcher;
pub mod locator;
pub mod orchestrator;
pub mod traits;
pub mod transcript;
pub mod types;
pub mod uploader;

// Re-export commonly used types
pub use error::{Error, ErrorKind};
pub use locator::ObjectLocator;
pub use orchestrator::{JobOutcome, Orchestrator, RunMode};
