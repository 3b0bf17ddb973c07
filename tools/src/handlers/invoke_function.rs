//! Direct invocation of a serverless function with a JSON payload.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use cloud_auth::client::{ClientFactory, ClientLease};
use cloud_jobs::error::{validation_error, Error, ValidationErrorKind};
use log::*;
use serde_json::{json, Map, Value};

use super::{services, Tool};
use crate::output::ToolResponse;
use crate::params::ToolParameters;
use crate::ports::function::{FunctionApi, FunctionResponse, InvokeFunction, DEFAULT_INVOCATION_TYPE};
use crate::settings::ToolSettings;

pub const TOOL_NAME: &str = "invoke_function";

const LAMBDA_SLOT: &str = "lambda";

const INVOCATION_TYPES: &[&str] = &["RequestResponse", "Event", "DryRun"];

#[derive(Debug, Clone, PartialEq)]
struct FunctionRequest {
    invoke: InvokeFunction,
}

impl FunctionRequest {
    fn from_params(params: &ToolParameters) -> Result<Self, Error> {
        let function_name = params.require_str("lambda_name")?;
        let payload = params.json("payload_json")?.unwrap_or_else(|| json!({}));
        let client_context = params
            .json("client_context_json")?
            .filter(|context| !context.is_null())
            .map(|context| serde_json::to_vec(&context).map(|bytes| BASE64.encode(bytes)))
            .transpose()?;

        let invocation_type = params
            .str("invocation_type")
            .unwrap_or_else(|| DEFAULT_INVOCATION_TYPE.to_string());
        if !INVOCATION_TYPES.contains(&invocation_type.as_str()) {
            return Err(validation_error(
                ValidationErrorKind::InvalidParameter,
                &format!(
                    "invocation_type '{}' must be one of {}",
                    invocation_type,
                    INVOCATION_TYPES.join(", ")
                ),
            ));
        }

        Ok(Self {
            invoke: InvokeFunction {
                function_name,
                payload: serde_json::to_vec(&payload)?,
                invocation_type,
                qualifier: params.str("qualifier"),
                include_logs: params.bool("include_logs", false)?,
                client_context,
            },
        })
    }

    /// The result record plus its text rendering.
    fn record(&self, response: &FunctionResponse) -> (Value, String) {
        let invoke = &self.invoke;
        let mut record = Map::new();
        record.insert("function_name".into(), json!(invoke.function_name));
        record.insert("status_code".into(), json!(response.status_code));
        record.insert("executed_version".into(), json!(response.executed_version));
        record.insert("invocation_type".into(), json!(invoke.invocation_type));
        if let Some(qualifier) = &invoke.qualifier {
            record.insert("qualifier".into(), json!(qualifier));
        }

        let response_text = String::from_utf8_lossy(&response.payload).into_owned();
        let response_json = serde_json::from_str::<Value>(&response_text).ok();
        let text = match &response_json {
            Some(value) => {
                record.insert("response_json".into(), value.clone());
                value.to_string()
            }
            None if !response_text.is_empty() => {
                record.insert("response_text".into(), json!(response_text));
                response_text
            }
            None => format!(
                "Invoked {} (status {})",
                invoke.function_name, response.status_code
            ),
        };

        if invoke.include_logs {
            if let Some(logs) = &response.log_result {
                record.insert("logs".into(), json!(decode_logs(logs)));
            }
        }
        if let Some(function_error) = &response.function_error {
            record.insert("function_error".into(), json!(function_error));
        }

        (Value::Object(record), text)
    }
}

fn decode_logs(encoded: &str) -> String {
    match BASE64.decode(encoded.trim()) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) => {
            debug!("Log tail is not valid base64: {}", e);
            "Failed to decode logs".to_string()
        }
    }
}

pub struct InvokeFunctionHandler<F: ClientFactory> {
    settings: Arc<ToolSettings>,
    lease: ClientLease<F>,
}

impl<F: ClientFactory> InvokeFunctionHandler<F> {
    pub fn new(settings: Arc<ToolSettings>, factory: F) -> Self {
        Self {
            settings,
            lease: ClientLease::new(factory).with_slot(LAMBDA_SLOT, services::LAMBDA),
        }
    }
}

#[async_trait]
impl<F> Tool for InvokeFunctionHandler<F>
where
    F: ClientFactory + 'static,
    F::Client: FunctionApi + 'static,
{
    fn name(&self) -> &'static str {
        TOOL_NAME
    }

    async fn invoke(&mut self, params: &ToolParameters) -> Result<ToolResponse, Error> {
        let request = FunctionRequest::from_params(params)?;
        let credentials = self.settings.resolve_credentials(params);
        self.lease.ensure_all(&credentials)?;
        let lambda = self.lease.get(LAMBDA_SLOT)?;

        let response = lambda.invoke_function(request.invoke.clone()).await?;
        if let Some(function_error) = &response.function_error {
            warn!(
                "Function {} reported {}",
                request.invoke.function_name, function_error
            );
        }

        let (record, text) = request.record(&response);
        Ok(ToolResponse::new().with_json(record).with_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{settings, MockCloud, MockFactory};
    use super::*;
    use cloud_jobs::error::ErrorKind;

    fn request(params: ToolParameters) -> FunctionRequest {
        FunctionRequest::from_params(&params.with("lambda_name", "resize")).unwrap()
    }

    #[test]
    fn test_defaults() {
        let request = request(ToolParameters::default());

        assert_eq!(request.invoke.payload, b"{}".to_vec());
        assert_eq!(request.invoke.invocation_type, "RequestResponse");
        assert_eq!(request.invoke.client_context, None);
        assert!(!request.invoke.include_logs);
    }

    #[test]
    fn test_payload_accepts_inline_or_string_json() {
        let inline = request(ToolParameters::default().with("payload_json", json!({"a": 1})));
        let encoded = request(ToolParameters::default().with("payload_json", r#"{"a": 1}"#));

        assert_eq!(inline.invoke.payload, br#"{"a":1}"#.to_vec());
        assert_eq!(encoded.invoke.payload, inline.invoke.payload);
    }

    #[test]
    fn test_client_context_is_base64_json() {
        let request = request(
            ToolParameters::default().with("client_context_json", r#"{"custom": {"k": "v"}}"#),
        );

        let encoded = request.invoke.client_context.unwrap();
        let decoded: Value = serde_json::from_slice(&BASE64.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, json!({"custom": {"k": "v"}}));
    }

    #[test]
    fn test_invalid_parameters() {
        for params in [
            ToolParameters::default(),
            ToolParameters::default()
                .with("lambda_name", "f")
                .with("payload_json", "{not json"),
            ToolParameters::default()
                .with("lambda_name", "f")
                .with("invocation_type", "Later"),
        ] {
            assert!(matches!(
                FunctionRequest::from_params(&params).unwrap_err().error_kind,
                ErrorKind::Validation(_)
            ));
        }
    }

    #[test]
    fn test_record_with_json_response_and_logs() {
        let request = request(
            ToolParameters::default()
                .with("qualifier", "live")
                .with("include_logs", true),
        );
        let response = FunctionResponse {
            status_code: 200,
            executed_version: Some("7".to_string()),
            log_result: Some(BASE64.encode("START RequestId\nEND")),
            payload: br#"{"ok": true}"#.to_vec(),
            ..Default::default()
        };

        let (record, text) = request.record(&response);

        assert_eq!(
            record,
            json!({
                "function_name": "resize",
                "status_code": 200,
                "executed_version": "7",
                "invocation_type": "RequestResponse",
                "qualifier": "live",
                "response_json": {"ok": true},
                "logs": "START RequestId\nEND",
            })
        );
        assert_eq!(text, r#"{"ok":true}"#);
    }

    #[test]
    fn test_record_text_fallbacks() {
        let request = request(ToolParameters::default().with("invocation_type", "Event"));

        let (record, text) = request.record(&FunctionResponse {
            status_code: 202,
            ..Default::default()
        });
        assert_eq!(text, "Invoked resize (status 202)");
        assert!(record.get("response_text").is_none());

        let (record, text) = request.record(&FunctionResponse {
            status_code: 200,
            function_error: Some("Unhandled".to_string()),
            payload: b"plain words".to_vec(),
            ..Default::default()
        });
        assert_eq!(text, "plain words");
        assert_eq!(record["response_text"], "plain words");
        assert_eq!(record["function_error"], "Unhandled");
    }

    #[test]
    fn test_undecodable_logs() {
        assert_eq!(decode_logs("***"), "Failed to decode logs");
    }

    #[tokio::test]
    async fn test_invoke_returns_record_and_text() {
        let factory = MockFactory::new(|_, credentials| {
            assert_eq!(credentials.region(), "eu-west-1");
            let mut cloud = MockCloud::new();
            cloud
                .expect_invoke_function()
                .withf(|request| request.function_name == "resize")
                .times(1)
                .returning(|_| {
                    Ok(FunctionResponse {
                        status_code: 200,
                        payload: b"[1,2]".to_vec(),
                        ..Default::default()
                    })
                });
            cloud
        });

        let mut handler = InvokeFunctionHandler::new(settings(), factory);
        let response = handler
            .invoke(
                &ToolParameters::default()
                    .with("lambda_name", "resize")
                    .with("aws_region", "eu-west-1"),
            )
            .await
            .unwrap();

        assert_eq!(response.json_content().unwrap()["response_json"], json!([1, 2]));
        assert_eq!(response.text_content(), "[1,2]");
    }
}
