//! Asynchronous model invocation on the runtime REST API.

use async_trait::async_trait;
use cloud_jobs::error::Error;
use log::*;
use reqwest::{Method, Request};
use serde::Deserialize;

use super::{missing_field, read_json, ApiClient, JSON_CONTENT_TYPE};
use crate::ports::video::{AsyncInvocation, StartAsyncInvoke, VideoGenerationApi};

const ASYNC_INVOKE: &str = "async-invoke";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAsyncInvokeResponse {
    #[serde(default)]
    invocation_arn: Option<String>,
}

#[async_trait]
impl VideoGenerationApi for ApiClient {
    async fn start_async_invoke(&self, request: StartAsyncInvoke) -> Result<String, Error> {
        debug!(
            "Starting async invocation of {} writing to {}",
            request.model_id, request.output_data_config.s3_output_data_config.s3_uri
        );

        let url = self.url(&[ASYNC_INVOKE])?;
        let response = self
            .send(self.json_request(Method::POST, url, JSON_CONTENT_TYPE, &request)?)
            .await?;
        let started: StartAsyncInvokeResponse = read_json(response).await?;
        let arn = started
            .invocation_arn
            .filter(|arn| !arn.is_empty())
            .ok_or_else(|| missing_field("invocationArn"))?;

        info!("Started async invocation {}", arn);
        Ok(arn)
    }

    async fn get_async_invoke(&self, invocation_arn: &str) -> Result<AsyncInvocation, Error> {
        let url = self.url(&[ASYNC_INVOKE, invocation_arn])?;
        let response = self.send(Request::new(Method::GET, url)).await?;
        let invocation: AsyncInvocation = read_json(response).await?;

        debug!("Async invocation {} is {}", invocation_arn, invocation.status);
        Ok(invocation)
    }
}
