//! Command and code execution in a managed sandbox.
//!
//! An interpreter and a session are created on demand and their ids are
//! returned, so later calls can reuse the same sandbox state.

use std::sync::Arc;

use async_trait::async_trait;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use log::*;
use serde_json::{json, Value};

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::ports::code_interpreter::{
    CodeInterpreterApi, CreateCodeInterpreter, SESSION_TIMEOUT_SECS,
};
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "invoke_code";

const CONTROL_SLOT: &str = "control";
const DATA_SLOT: &str = "data";

const EXECUTE_COMMAND: &str = "executeCommand";
const EXECUTE_CODE: &str = "executeCode";

#[derive(Debug, Clone, PartialEq)]
struct CodeRequest {
    command: Option<String>,
    /// Language and source, always together.
    code: Option<(String, String)>,
    session_id: Option<String>,
    code_interpreter_id: Option<String>,
}

impl CodeRequest {
    fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let command = params.str("command");
        let code = match (params.str("code"), params.str("language")) {
            (Some(code), Some(language)) => Some((language, code)),
            (Some(_), None) => {
                return Err(validation_error(
                    ValidationErrorKind::MissingParameter,
                    "'language' is required when 'code' is given",
                ))
            }
            (None, _) => None,
        };
        if command.is_none() && code.is_none() {
            return Err(validation_error(
                ValidationErrorKind::MissingParameter,
                "either 'command' or 'code' must be provided",
            ));
        }

        Ok(Self {
            command,
            code,
            session_id: params.str("session_id"),
            code_interpreter_id: params.str("code_interpreter_id"),
        })
    }
}

fn interpreter_name() -> String {
    format!("code_interpreter_{}", chrono::Utc::now().timestamp())
}

pub struct InvokeCodeHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> InvokeCodeHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Self {
        Self {
            settings,
            lease: ClientLease::new(factory)
                .with_slot(CONTROL_SLOT, services::CODE_INTERPRETER_CONTROL)
                .with_slot(DATA_SLOT, services::CODE_INTERPRETER),
        }
    }
}

impl<F> InvokeCodeHandler<F>
where
    F: ClientFactory,
    F::Client: CodeInterpreterApi,
{
    /// Runs the request and returns the success record.
    async fn execute(&mut self, request: CodeRequest, params: &ToolParameters) -> Result<Value, Error> {
        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let data = self.lease.get(DATA_SLOT)?;

        let code_interpreter_id = match request.code_interpreter_id {
            Some(id) => id,
            None => {
                let control = self.lease.get(CONTROL_SLOT)?;
                let id = control
                    .create_code_interpreter(CreateCodeInterpreter {
                        name: interpreter_name(),
                        description: "code-interpreter with network access".to_string(),
                        network_mode: "PUBLIC".to_string(),
                    })
                    .await?;
                info!("Created code interpreter {}", id);
                id
            }
        };

        let session_id = match request.session_id {
            Some(id) => id,
            None => {
                let id = data
                    .start_session(&code_interpreter_id, SESSION_TIMEOUT_SECS)
                    .await?;
                debug!("Started session {} on {}", id, code_interpreter_id);
                id
            }
        };

        let mut results = Vec::new();
        if let Some(command) = &request.command {
            let result = data
                .invoke_tool(
                    &code_interpreter_id,
                    &session_id,
                    EXECUTE_COMMAND,
                    json!({ "command": command }),
                )
                .await?;
            results.push(json!({ "type": "command", "result": result }));
        }
        if let Some((language, code)) = &request.code {
            let result = data
                .invoke_tool(
                    &code_interpreter_id,
                    &session_id,
                    EXECUTE_CODE,
                    json!({ "language": language, "code": code }),
                )
                .await?;
            results.push(json!({ "type": "code", "result": result }));
        }

        Ok(json!({
            "status": "success",
            "session_id": session_id,
            "code_interpreter_id": code_interpreter_id,
            "results": results,
        }))
    }
}

#[async_trait]
impl<F> Tool for InvokeCodeHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: CodeInterpreterApi + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    /// Failures after validation are reported inside the record as
    /// `{"status": "error", "reason": ...}` rather than as an `Err`.
    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let format = params.result_format()?;
        let request = CodeRequest::from_params(params)?;

        let record = match self.execute(request, params).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Code interpreter call failed: {}", e);
                json!({ "status": "error", "reason": e.message() })
            }
        };

        let summary = serde_json::to_string_pretty(&record)?;
        Ok(ToolResponse::record(format, record, summary))
    }
}
