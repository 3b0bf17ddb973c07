//! Errors raised while building, leasing or signing for service clients.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    Credential(CredentialErrorKind),
    Client(ClientErrorKind),
    Http(HttpErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum CredentialErrorKind {
    /// Raised by a [`crate::http::RequestSigner`] that cannot sign.
    SigningFailed,
}

/// Errors from client lease operations.
#[derive(Debug, PartialEq)]
pub enum ClientErrorKind {
    /// The slot was never registered on the lease.
    UnknownSlot,
    /// The slot is registered but `ensure` has not populated it.
    NotReady,
    /// The factory failed to build the client.
    Construction,
}

#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let detail = self
            .source
            .as_ref()
            .map(|source| format!(": {}", source))
            .unwrap_or_default();
        match &self.error_kind {
            ErrorKind::Credential(kind) => write!(f, "Credential error: {:?}{}", kind, detail),
            ErrorKind::Client(kind) => write!(f, "Client error: {:?}{}", kind, detail),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}{}", kind, detail),
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

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Http(HttpErrorKind::Network),
        }
    }
}

/// For [`crate::http::RequestSigner`] implementations.
pub fn credential_error(kind: CredentialErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Credential(kind),
    }
}

pub fn client_error(kind: ClientErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Client(kind),
    }
}
