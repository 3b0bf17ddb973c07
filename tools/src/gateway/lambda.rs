//! Serverless function invocation.

use async_trait::async_trait;
use cloud_jobs::error::Error;
use log::*;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request};

use super::{response_header, set_header, ApiClient, JSON_CONTENT_TYPE};
use crate::ports::function::{FunctionApi, FunctionResponse, InvokeFunction};

const API_VERSION: &str = "2015-03-31";

#[async_trait]
impl FunctionApi for ApiClient {
    async fn invoke_function(&self, request: InvokeFunction) -> Result<FunctionResponse, Error> {
        let mut url = self.url(&[API_VERSION, "functions", &request.function_name, "invocations"])?;
        if let Some(qualifier) = &request.qualifier {
            url.query_pairs_mut().append_pair("Qualifier", qualifier);
        }

        let mut http_request = Request::new(Method::POST, url);
        http_request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        set_header(&mut http_request, "x-amz-invocation-type", &request.invocation_type)?;
        if request.include_logs {
            set_header(&mut http_request, "x-amz-log-type", "Tail")?;
        }
        if let Some(context) = &request.client_context {
            set_header(&mut http_request, "x-amz-client-context", context)?;
        }
        *http_request.body_mut() = Some(request.payload.clone().into());

        debug!(
            "Invoking function {} ({})",
            request.function_name, request.invocation_type
        );
        let response = self.send(http_request).await?;

        let status_code = response.status().as_u16();
        let executed_version = response_header(&response, "x-amz-executed-version");
        let function_error = response_header(&response, "x-amz-function-error");
        let log_result = response_header(&response, "x-amz-log-result");
        let payload = response.bytes().await?.to_vec();

        if let Some(kind) = &function_error {
            warn!("Function {} raised {}", request.function_name, kind);
        }

        Ok(FunctionResponse {
            status_code,
            executed_version,
            function_error,
            log_result,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::client;
    use super::*;
    use cloud_jobs::error::{ErrorKind, RemoteErrorKind};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_invoke_sends_headers_and_reads_response() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/2015-03-31/functions/resize/invocations")
            .match_query(Matcher::UrlEncoded("Qualifier".into(), "live".into()))
            .match_header("x-amz-invocation-type", "RequestResponse")
            .match_header("x-amz-log-type", "Tail")
            .match_header("x-amz-client-context", "eyJhIjoxfQ==")
            .match_body(r#"{"width":64}"#)
            .with_status(200)
            .with_header("x-amz-executed-version", "7")
            .with_header("x-amz-log-result", "U1RBUlQ=")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let response = client(&server.url(), "lambda")
            .invoke_function(InvokeFunction {
                function_name: "resize".to_string(),
                payload: br#"{"width":64}"#.to_vec(),
                invocation_type: "RequestResponse".to_string(),
                qualifier: Some("live".to_string()),
                include_logs: true,
                client_context: Some("eyJhIjoxfQ==".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.executed_version.as_deref(), Some("7"));
        assert_eq!(response.log_result.as_deref(), Some("U1RBUlQ="));
        assert_eq!(response.payload, br#"{"ok":true}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_function_is_not_found() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/2015-03-31/functions/ghost/invocations")
            .with_status(404)
            .with_body(r#"{"Type":"User","Message":"Function not found: ghost"}"#)
            .create_async()
            .await;

        let err = client(&server.url(), "lambda")
            .invoke_function(InvokeFunction {
                function_name: "ghost".to_string(),
                invocation_type: "Event".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.error_kind, ErrorKind::Remote(RemoteErrorKind::NotFound));
        assert!(err.message().contains("Function not found"));
    }
}
