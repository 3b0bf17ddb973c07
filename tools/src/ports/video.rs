use async_trait::async_trait;
use cloud_jobs::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Start request for an asynchronous model invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAsyncInvoke {
    pub model_id: String,
    pub model_input: Value,
    pub output_data_config: OutputDataConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDataConfig {
    pub s3_output_data_config: S3OutputDataConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3OutputDataConfig {
    pub s3_uri: String,
}

impl OutputDataConfig {
    pub fn s3(s3_uri: &str) -> Self {
        Self {
            s3_output_data_config: S3OutputDataConfig {
                s3_uri: s3_uri.to_string(),
            },
        }
    }
}

/// State of an asynchronous invocation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncInvocation {
    #[serde(default)]
    pub invocation_arn: Option<String>,
    pub status: String,
    #[serde(default)]
    pub failure_message: Option<String>,
    #[serde(default)]
    pub output_data_config: Option<OutputDataConfig>,
}

impl AsyncInvocation {
    pub fn output_uri(&self) -> Option<&str> {
        self.output_data_config
            .as_ref()
            .map(|config| config.s3_output_data_config.s3_uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

#[async_trait]
pub trait VideoGenerationApi: Send + Sync {
    /// Returns the invocation ARN.
    async fn start_async_invoke(&self, request: StartAsyncInvoke) -> Result<String, Error>;

    async fn get_async_invoke(&self, invocation_arn: &str) -> Result<AsyncInvocation, Error>;
}
