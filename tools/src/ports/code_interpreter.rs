use async_trait::async_trait;
use cloud_jobs::error::Error;
use serde_json::Value;

/// Session lifetime requested for new sandbox sessions.
pub const SESSION_TIMEOUT_SECS: u64 = 900;

#[derive(Debug, Clone, PartialEq)]
pub struct CreateCodeInterpreter {
    pub name: String,
    pub description: String,
    /// `PUBLIC` or `SANDBOX`.
    pub network_mode: String,
}

#[async_trait]
pub trait CodeInterpreterApi: Send + Sync {
    /// Returns the new interpreter's id.
    async fn create_code_interpreter(&self, request: CreateCodeInterpreter) -> Result<String, Error>;

    /// Returns the new session's id.
    async fn start_session(&self, code_interpreter_id: &str, timeout_secs: u64) -> Result<String, Error>;

    /// Run one sandbox tool (`executeCode`, `executeCommand`, ...) and return
    /// its result document.
    async fn invoke_tool(
        &self,
        code_interpreter_id: &str,
        session_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, Error>;
}
