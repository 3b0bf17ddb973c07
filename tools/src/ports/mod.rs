//! Service ports used by the handlers.
//!
//! Each trait covers the calls one tool family needs from a managed service.
//! [`crate::gateway::ApiClient`] implements all of them over HTTP; tests use
//! mocks.

pub mod code_interpreter;
pub mod function;
pub mod transcription;
pub mod video;

pub use code_interpreter::CodeInterpreterApi;
pub use function::FunctionApi;
pub use transcription::TranscriptionApi;
pub use video::VideoGenerationApi;

use cloud_jobs::traits::storage::ObjectStore;

/// Everything a client handed out by the toolbox's factory must support.
pub trait CloudClient:
    TranscriptionApi + VideoGenerationApi + FunctionApi + CodeInterpreterApi + ObjectStore
{
}

impl<T> CloudClient for T where
    T: TranscriptionApi + VideoGenerationApi + FunctionApi + CodeInterpreterApi + ObjectStore
{
}
