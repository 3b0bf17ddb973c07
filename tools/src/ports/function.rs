use async_trait::async_trait;
use cloud_jobs::error::Error;

pub const DEFAULT_INVOCATION_TYPE: &str = "RequestResponse";

/// One serverless function call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeFunction {
    pub function_name: String,
    pub payload: Vec<u8>,
    /// `RequestResponse`, `Event` or `DryRun`.
    pub invocation_type: String,
    pub qualifier: Option<String>,
    pub include_logs: bool,
    /// Already base64-encoded client context.
    pub client_context: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionResponse {
    pub status_code: u16,
    pub executed_version: Option<String>,
    /// Set when the function itself raised, e.g. `Unhandled`.
    pub function_error: Option<String>,
    /// Base64-encoded log tail, present when logs were requested.
    pub log_result: Option<String>,
    pub payload: Vec<u8>,
}

#[async_trait]
pub trait FunctionApi: Send + Sync {
    async fn invoke_function(&self, request: InvokeFunction) -> Result<FunctionResponse, Error>;
}
