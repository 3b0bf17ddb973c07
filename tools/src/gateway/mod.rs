//! HTTP clients for the managed services behind the tools.
//!
//! One [`ApiClient`] talks to one service endpoint in one region with one set
//! of credentials. It implements every port trait; which ones make sense
//! depends on the service it was built for. Requests are signed by the
//! configured [`RequestSigner`] right before they are sent.

mod agentcore;
mod bedrock;
mod lambda;
mod s3;
mod transcribe;

pub use agentcore::{decode_event_stream, EventMessage};

use std::sync::Arc;

use cloud_auth::client::ClientFactory;
use cloud_auth::credentials::CredentialRecord;
use cloud_auth::error::{client_error as auth_client_error, ClientErrorKind as AuthClientErrorKind};
use cloud_auth::http::{HttpClientBuilder, HttpClientConfig, MiddlewareClient, RequestSigner};
use cloud_jobs::error::{
    protocol_error, remote_error, status_error, transport_error, validation_error,
    ClientErrorKind, Error, ErrorKind, ProtocolErrorKind, RemoteErrorKind, TransportErrorKind,
    ValidationErrorKind,
};
use log::*;
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::settings::ToolSettings;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds one [`ApiClient`] per service from an endpoint template.
///
/// Every client gets its own HTTP connection pool, released when the client
/// is dropped.
#[derive(Clone)]
pub struct ApiClientFactory {
    endpoint_template: String,
    http: HttpClientConfig,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl ApiClientFactory {
    pub fn new(endpoint_template: &str, http: HttpClientConfig) -> Self {
        Self {
            endpoint_template: endpoint_template.to_string(),
            http,
            signer: None,
        }
    }

    pub fn from_settings(settings: &ToolSettings) -> Self {
        Self::new(&settings.endpoint_template, settings.http.clone())
    }

    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Endpoint for `service` in `region`.
    pub fn endpoint_for(&self, service: &str, region: &str) -> Result<Url, cloud_auth::Error> {
        let endpoint = self
            .endpoint_template
            .replace("{service}", service)
            .replace("{region}", region);

        let url = Url::parse(&endpoint).map_err(|e| {
            warn!("Invalid endpoint '{}' for {}: {:?}", endpoint, service, e);
            auth_client_error(
                AuthClientErrorKind::Construction,
                &format!("invalid endpoint '{}': {}", endpoint, e),
            )
        })?;
        if url.cannot_be_a_base() {
            return Err(auth_client_error(
                AuthClientErrorKind::Construction,
                &format!("endpoint '{}' cannot carry a path", endpoint),
            ));
        }
        Ok(url)
    }
}

impl ClientFactory for ApiClientFactory {
    type Client = ApiClient;

    fn create(&self, service: &str, credentials: &CredentialRecord) -> Result<ApiClient, cloud_auth::Error> {
        let endpoint = self.endpoint_for(service, credentials.region())?;
        let builder = HttpClientBuilder::from_config(self.http.clone());

        Ok(ApiClient {
            http: builder.build()?,
            single_attempt: builder.build_single_attempt()?,
            service: service.to_string(),
            endpoint,
            credentials: credentials.clone(),
            signer: self.signer.clone(),
        })
    }
}

/// A client bound to one service endpoint, region and credential record.
///
/// Most calls go through `http`, which retries transient failures. Calls whose
/// caller already runs a retry loop, such as object uploads, go through
/// `single_attempt` so every attempt is exactly one request.
pub struct ApiClient {
    http: MiddlewareClient,
    single_attempt: MiddlewareClient,
    service: String,
    endpoint: Url,
    credentials: CredentialRecord,
    signer: Option<Arc<dyn RequestSigner>>,
}

impl ApiClient {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        self.credentials.region()
    }

    /// The endpoint with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| Error {
                source: Some(format!("endpoint {} cannot carry a path", self.endpoint).into()),
                error_kind: ErrorKind::Client(ClientErrorKind::Construction),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn json_request<T: Serialize>(
        &self,
        method: Method,
        url: Url,
        content_type: &'static str,
        body: &T,
    ) -> Result<Request, Error> {
        let mut request = Request::new(method, url);
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        *request.body_mut() = Some(serde_json::to_vec(body)?.into());
        Ok(request)
    }

    /// Sign and send without looking at the status code.
    async fn execute(&self, request: Request) -> Result<Response, Error> {
        self.execute_on(&self.http, request).await
    }

    async fn execute_on(&self, http: &MiddlewareClient, mut request: Request) -> Result<Response, Error> {
        if let Some(signer) = &self.signer {
            signer.sign(&mut request, &self.service, &self.credentials)?;
        }

        let method = request.method().clone();
        let url = request.url().clone();
        trace!("{} {}", method, url);

        http.execute(request).await.map_err(|e| {
            warn!("{} {} request to {} failed: {:?}", method, url.path(), self.service, e);
            Error::from(e)
        })
    }

    /// Sign, send and turn any non-success status into an error.
    async fn send(&self, request: Request) -> Result<Response, Error> {
        let response = self.execute(request).await?;
        self.check_status(response).await
    }

    /// Like [`send`](Self::send), but never retried here.
    async fn send_once(&self, request: Request) -> Result<Response, Error> {
        let response = self.execute_on(&self.single_attempt, request).await?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> Result<Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let err = service_error(status, &body);
        error!("{} answered {}: {}", self.service, status, err.message());
        Err(err)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, Error> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        warn!("Failed to parse service response: {:?}", e);
        Error::from(e)
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(value).map_err(|e| {
        warn!("Invalid value for header {}: {:?}", name, e);
        invalid_parameter(&format!("'{}' is not a valid header value", name))
    })
}

fn set_header(request: &mut Request, name: &'static str, value: &str) -> Result<(), Error> {
    let value = header_value(name, value)?;
    request
        .headers_mut()
        .insert(HeaderName::from_static(name), value);
    Ok(())
}

fn response_header(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|value| !value.is_empty())
}

/// Turn an error answer into an [`Error`], using the service's error code when
/// the body carries one (JSON `__type`/`code` or XML `<Code>`).
fn service_error(status: StatusCode, body: &str) -> Error {
    let (code, message) = error_details(body);
    let message = match (&code, message) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.clone(),
        (None, Some(message)) => message,
        (None, None) => body.trim().to_string(),
    };

    match code.as_deref() {
        Some("ThrottlingException" | "TooManyRequestsException" | "SlowDown" | "RequestTimeout") => {
            transport_error(TransportErrorKind::Network, &format!("{}: {}", status, message))
        }
        Some(code) if !status.is_server_error() => match remote_kind_for_code(code) {
            Some(kind) => remote_error(kind, &format!("{}: {}", status, message)),
            None => status_error(status, &message),
        },
        _ => status_error(status, &message),
    }
}

fn remote_kind_for_code(code: &str) -> Option<RemoteErrorKind> {
    match code {
        "AccessDenied" | "AccessDeniedException" | "UnrecognizedClientException"
        | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken" => {
            Some(RemoteErrorKind::AccessDenied)
        }
        "NoSuchBucket" | "NoSuchKey" | "NotFound" | "NotFoundException"
        | "ResourceNotFoundException" => Some(RemoteErrorKind::NotFound),
        "BucketAlreadyExists" | "BucketAlreadyOwnedByYou" | "ConflictException" => {
            Some(RemoteErrorKind::AlreadyExists)
        }
        _ => None,
    }
}

/// Error code and message from a JSON or XML error body.
fn error_details(body: &str) -> (Option<String>, Option<String>) {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        let text = |names: &[&str]| {
            names
                .iter()
                .find_map(|name| fields.get(*name).and_then(Value::as_str))
                .map(str::to_string)
        };
        let code = text(&["__type", "code", "Code"])
            .map(|code| code.rsplit('#').next().unwrap_or_default().to_string())
            .filter(|code| !code.is_empty());
        return (code, text(&["message", "Message"]));
    }

    (xml_tag(body, "Code"), xml_tag(body, "Message"))
}

fn xml_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].trim().to_string()).filter(|value| !value.is_empty())
}

fn missing_field(field: &str) -> Error {
    protocol_error(
        ProtocolErrorKind::MalformedResponse,
        &format!("response is missing '{}'", field),
    )
}

fn invalid_parameter(message: &str) -> Error {
    validation_error(ValidationErrorKind::InvalidParameter, message)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A factory pointing every service at `server_url`, without middleware
    /// retries.
    pub fn factory(server_url: &str) -> ApiClientFactory {
        ApiClientFactory::new(
            server_url,
            HttpClientConfig {
                max_retries: 0,
                ..HttpClientConfig::default()
            },
        )
    }

    pub fn client(server_url: &str, service: &str) -> ApiClient {
        factory(server_url)
            .create(service, &CredentialRecord::anonymous("us-east-1"))
            .unwrap()
    }
}
