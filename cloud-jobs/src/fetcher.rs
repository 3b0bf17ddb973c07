//! Streamed downloads with bounded retries.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cloud_auth::http::RetryAfterPolicy;
use futures_util::StreamExt;
use log::*;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::error::{
    status_error, validation_error, Error, ErrorKind, TransportErrorKind, ValidationErrorKind,
};

/// Attempts made by a fetch when the caller does not pick a budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `max_attempts` attempts have failed transiently.
///
/// The attempt number (starting at 1) is passed to `operation`. Between
/// attempts the task sleeps for the policy's backoff delay. Exhaustion yields
/// `Transport(RetriesExhausted)` wrapping the last failure.
pub async fn retry_transient<T, F, Fut>(
    max_attempts: u32,
    backoff: &RetryAfterPolicy,
    mut operation: F,
) -> Result<T, Error>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= max_attempts {
                    warn!("Giving up after {} attempts: {}", attempt, err);
                    return Err(Error {
                        source: Some(Box::new(err)),
                        error_kind: ErrorKind::Transport(TransportErrorKind::RetriesExhausted {
                            attempts: attempt,
                        }),
                    });
                }
                let delay = backoff.delay_for(attempt - 1);
                warn!(
                    "Attempt {}/{} failed ({}), retrying in {:?}",
                    attempt, max_attempts, err, delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// A downloaded body and the media type the server reported for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// A download spooled into a scratch directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SpooledFile {
    pub path: PathBuf,
    pub length: u64,
    pub content_type: Option<String>,
}

/// Scoped scratch directory, removed when dropped.
///
/// Removal happens on every exit path, including early returns through `?`
/// and panics that unwind. Removing an already empty directory is fine.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self, Error> {
        let dir = tempfile::Builder::new().prefix("cloud-tools-").tempdir()?;
        debug!("Created scratch directory {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory now and report any failure.
    pub fn close(self) -> Result<(), Error> {
        self.dir.close()?;
        Ok(())
    }
}

/// Downloads remote artifacts over HTTP(S).
///
/// Every attempt starts from an empty buffer (or a truncated file), so a
/// failed partial transfer never leaks into the next attempt.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_attempts: u32,
    backoff: RetryAfterPolicy,
}

impl Fetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: RetryAfterPolicy::new(DEFAULT_MAX_ATTEMPTS)
                .with_max_delay(Duration::from_secs(30)),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, backoff: RetryAfterPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &RetryAfterPolicy {
        &self.backoff
    }

    /// Download `source_uri` into memory.
    pub async fn fetch(&self, source_uri: &str) -> Result<Payload, Error> {
        let url = parse_source(source_uri)?;
        debug!("Fetching {}", url);
        retry_transient(self.max_attempts, &self.backoff, |_| self.fetch_once(&url)).await
    }

    /// Download `source_uri` into `file_name` inside `scratch`.
    pub async fn fetch_to_file(
        &self,
        source_uri: &str,
        scratch: &ScratchDir,
        file_name: &str,
    ) -> Result<SpooledFile, Error> {
        let url = parse_source(source_uri)?;
        let path = scratch.path().join(file_name);
        debug!("Spooling {} to {}", url, path.display());
        retry_transient(self.max_attempts, &self.backoff, |_| {
            self.fetch_once_to_file(&url, &path)
        })
        .await
    }

    async fn send(&self, url: &Url) -> Result<reqwest::Response, Error> {
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body.trim()));
        }
        Ok(response)
    }

    async fn fetch_once(&self, url: &Url) -> Result<Payload, Error> {
        let response = self.send(url).await?;
        let content_type = content_type(&response);

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            bytes.extend_from_slice(&chunk?);
        }

        Ok(Payload {
            bytes,
            content_type,
        })
    }

    async fn fetch_once_to_file(&self, url: &Url, path: &Path) -> Result<SpooledFile, Error> {
        let response = self.send(url).await?;
        let content_type = content_type(&response);

        let mut file = tokio::fs::File::create(path).await?;
        let mut length = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            length += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(SpooledFile {
            path: path.to_path_buf(),
            length,
            content_type,
        })
    }
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Parse a download source, accepting only http and https URLs.
pub fn parse_source(source_uri: &str) -> Result<Url, Error> {
    let url = Url::parse(source_uri).map_err(|e| Error {
        source: Some(Box::new(e)),
        error_kind: ErrorKind::Validation(ValidationErrorKind::MalformedLocator),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(validation_error(
            ValidationErrorKind::MalformedLocator,
            &format!("unsupported scheme '{}' in {}", other, source_uri),
        )),
    }
}
