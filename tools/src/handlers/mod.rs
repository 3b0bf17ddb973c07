//! One handler per tool.
//!
//! A handler owns a [`cloud_auth::client::ClientLease`] and the shared
//! [`ToolSettings`]. Every invocation validates its parameters, resolves the
//! call's credentials, ensures the lease's slots and then talks to the
//! services through the port traits. `extract_frame` only downloads over
//! HTTP and has no lease.

pub mod create_bucket;
pub mod download_object;
pub mod extract_frame;
pub mod generate_video;
pub mod invoke_code;
pub mod invoke_function;
pub mod transcribe_audio;
pub mod upload_object;

#[cfg(test)]
pub(crate) mod test_support;

pub use create_bucket::CreateBucketHandler;
pub use download_object::DownloadObjectHandler;
pub use extract_frame::ExtractFrameHandler;
pub use generate_video::GenerateVideoHandler;
pub use invoke_code::InvokeCodeHandler;
pub use invoke_function::InvokeFunctionHandler;
pub use transcribe_audio::TranscribeAudioHandler;
pub use upload_object::UploadObjectHandler;

use async_trait::async_trait;
use cloud_jobs::error::Error;

use crate::output::ToolResponse;
use crate::params::ToolParameters;

/// Service names used to build endpoints.
pub mod services {
    pub const S3: &str = "s3";
    pub const TRANSCRIBE: &str = "transcribe";
    pub const BEDROCK_RUNTIME: &str = "bedrock-runtime";
    pub const LAMBDA: &str = "lambda";
    pub const CODE_INTERPRETER: &str = "bedrock-agentcore";
    pub const CODE_INTERPRETER_CONTROL: &str = "bedrock-agentcore-control";
}

#[async_trait]
pub trait Tool: Send {
    fn name(&self) -> &'static str;

    /// Run one invocation. Takes `&mut self`: a handler never serves two
    /// calls at once.
    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error>;
}
