//! Error types for the `cloud-jobs` crate.
//!
//! Errors are modeled as a root `Error` holding an `error_kind` tree, the same
//! way every layer of this workspace does it. Handlers in `tools` return this
//! type directly; the kind tree tells callers whether a failure came from bad
//! input, the network, the remote service, or a protocol violation.

use cloud_auth::error::{Error as CloudAuthError, ErrorKind as CloudAuthErrorKind, HttpErrorKind};
use reqwest::StatusCode;
use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for job, fetch and storage operations.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Bad caller input. Detected before any network call and never retried.
    Validation(ValidationErrorKind),
    Transport(TransportErrorKind),
    /// The service answered but reported a business failure.
    Remote(RemoteErrorKind),
    /// The service answered with something we cannot interpret.
    Protocol(ProtocolErrorKind),
    Job(JobErrorKind),
    Client(ClientErrorKind),
    Internal(InternalErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum ValidationErrorKind {
    MissingParameter,
    InvalidParameter,
    MalformedLocator,
    ConflictingModes,
}

#[derive(Debug, PartialEq)]
pub enum TransportErrorKind {
    Network,
    Timeout,
    RetriesExhausted { attempts: u32 },
}

#[derive(Debug, PartialEq)]
pub enum RemoteErrorKind {
    JobFailed,
    AccessDenied,
    NotFound,
    AlreadyExists,
    Service,
}

#[derive(Debug, PartialEq)]
pub enum ProtocolErrorKind {
    UnrecognizedStatus,
    InvalidTransition,
    MalformedResponse,
}

#[derive(Debug, PartialEq)]
pub enum JobErrorKind {
    DeadlineExceeded,
    Cancelled,
}

#[derive(Debug, PartialEq)]
pub enum ClientErrorKind {
    Construction,
}

/// Local failures unrelated to the remote side, such as scratch file I/O.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Io,
}

impl Error {
    /// Whether the failure is a transient transport problem worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.error_kind,
            ErrorKind::Transport(TransportErrorKind::Network)
                | ErrorKind::Transport(TransportErrorKind::Timeout)
        )
    }

    /// The innermost message, without the kind prefix.
    pub fn message(&self) -> String {
        self.source
            .as_ref()
            .map(|source| source.to_string())
            .unwrap_or_else(|| format!("{:?}", self.error_kind))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let category = match &self.error_kind {
            ErrorKind::Validation(_) => "Validation error",
            ErrorKind::Transport(_) => "Transport error",
            ErrorKind::Remote(_) => "Remote service error",
            ErrorKind::Protocol(_) => "Protocol error",
            ErrorKind::Job(_) => "Job error",
            ErrorKind::Client(_) => "Client error",
            ErrorKind::Internal(_) => "Internal error",
        };
        let kind = match &self.error_kind {
            ErrorKind::Validation(kind) => format!("{:?}", kind),
            ErrorKind::Transport(kind) => format!("{:?}", kind),
            ErrorKind::Remote(kind) => format!("{:?}", kind),
            ErrorKind::Protocol(kind) => format!("{:?}", kind),
            ErrorKind::Job(kind) => format!("{:?}", kind),
            ErrorKind::Client(kind) => format!("{:?}", kind),
            ErrorKind::Internal(kind) => format!("{:?}", kind),
        };
        match &self.source {
            Some(source) => write!(f, "{} ({}): {}", category, kind, source),
            None => write!(f, "{} ({})", category, kind),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

fn kind_for_reqwest(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Transport(TransportErrorKind::Timeout)
    } else if err.is_builder() {
        // Raised before any network call, typically for an unusable URL.
        ErrorKind::Validation(ValidationErrorKind::MalformedLocator)
    } else if err.is_decode() {
        ErrorKind::Protocol(ProtocolErrorKind::MalformedResponse)
    } else {
        ErrorKind::Transport(TransportErrorKind::Network)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error {
            error_kind: kind_for_reqwest(&err),
            source: Some(Box::new(err)),
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        let error_kind = match &err {
            reqwest_middleware::Error::Reqwest(inner) => kind_for_reqwest(inner),
            reqwest_middleware::Error::Middleware(_) => {
                ErrorKind::Transport(TransportErrorKind::Network)
            }
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Protocol(ProtocolErrorKind::MalformedResponse),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Internal(InternalErrorKind::Io),
        }
    }
}

// This is where errors from the `cloud-auth` layer are translated.
impl From<CloudAuthError> for Error {
    fn from(err: CloudAuthError) -> Self {
        let error_kind = match &err.error_kind {
            CloudAuthErrorKind::Http(HttpErrorKind::Network)
            | CloudAuthErrorKind::Http(HttpErrorKind::RequestFailed) => {
                ErrorKind::Transport(TransportErrorKind::Network)
            }
            CloudAuthErrorKind::Http(HttpErrorKind::BuilderFailed)
            | CloudAuthErrorKind::Client(_)
            | CloudAuthErrorKind::Credential(_) => ErrorKind::Client(ClientErrorKind::Construction),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

/// Helper function to create validation errors.
pub fn validation_error(kind: ValidationErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Validation(kind),
    }
}

/// Helper function to create transport errors.
pub fn transport_error(kind: TransportErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Transport(kind),
    }
}

/// Helper function to create remote service errors.
pub fn remote_error(kind: RemoteErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Remote(kind),
    }
}

/// Helper function to create protocol errors.
pub fn protocol_error(kind: ProtocolErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Protocol(kind),
    }
}

/// Helper function to create job lifecycle errors.
pub fn job_error(kind: JobErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Job(kind),
    }
}

/// Classify a non-success HTTP status.
///
/// 408, 429 and 5xx are transient transport failures; every other status is
/// a remote-service answer and is reported with the service's message.
pub fn status_error(status: StatusCode, message: &str) -> Error {
    let message = if message.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, message)
    };

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        return transport_error(TransportErrorKind::Network, &message);
    }

    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteErrorKind::AccessDenied,
        StatusCode::NOT_FOUND => RemoteErrorKind::NotFound,
        StatusCode::CONFLICT => RemoteErrorKind::AlreadyExists,
        _ => RemoteErrorKind::Service,
    };
    remote_error(kind, &message)
}
