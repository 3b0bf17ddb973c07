//! Process-wide settings shared by every handler.

use std::time::Duration;

use cloud_auth::credentials::{resolve, CredentialRecord, StoredCredentials};
use cloud_auth::http::{HttpClientBuilder, HttpClientConfig, RetryAfterPolicy};
use cloud_jobs::error::Error;
use cloud_jobs::fetcher::{Fetcher, DEFAULT_MAX_ATTEMPTS};
use cloud_jobs::orchestrator::{Orchestrator, DEFAULT_POLL_INTERVAL};
use cloud_jobs::uploader::DEFAULT_KEY_PREFIX;
use secrecy::SecretString;
use service::config::{Config, DEFAULT_ENDPOINT_TEMPLATE};

use crate::params::ToolParameters;

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub credentials: StoredCredentials,
    /// `{service}` and `{region}` are substituted per client.
    pub endpoint_template: String,
    pub poll_interval: Duration,
    pub job_max_wait: Option<Duration>,
    pub fetch_max_attempts: u32,
    /// First delay of the fetch retry backoff; doubles per attempt.
    pub fetch_base_delay: Duration,
    pub upload_key_prefix: String,
    pub http: HttpClientConfig,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            credentials: StoredCredentials::default(),
            endpoint_template: DEFAULT_ENDPOINT_TEMPLATE.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            job_max_wait: None,
            fetch_max_attempts: DEFAULT_MAX_ATTEMPTS,
            fetch_base_delay: Duration::from_secs(1),
            upload_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            http: HttpClientConfig::default(),
        }
    }
}

impl From<&Config> for ToolSettings {
    fn from(config: &Config) -> Self {
        Self {
            credentials: StoredCredentials {
                access_key_id: config.aws_access_key_id.clone(),
                secret_access_key: config.aws_secret_access_key().map(SecretString::new),
                region: config.aws_region.clone(),
            },
            endpoint_template: config.endpoint_template().to_string(),
            poll_interval: config.poll_interval(),
            job_max_wait: config.job_max_wait(),
            fetch_max_attempts: config.fetch_max_attempts,
            upload_key_prefix: config.upload_key_prefix().to_string(),
            http: HttpClientConfig {
                timeout: config.http_timeout(),
                max_retries: config.http_max_retries,
                ..HttpClientConfig::default()
            },
            ..Self::default()
        }
    }
}

impl ToolSettings {
    /// Settings that point every service at `endpoint`, for tests against a
    /// local mock server. Polling and retries are immediate.
    pub fn for_endpoint(endpoint: &str) -> Self {
        Self {
            endpoint_template: endpoint.to_string(),
            poll_interval: Duration::from_millis(1),
            fetch_base_delay: Duration::ZERO,
            http: HttpClientConfig {
                max_retries: 0,
                ..HttpClientConfig::default()
            },
            ..Self::default()
        }
    }

    /// Credentials for one call: per-call overrides over the stored defaults.
    pub fn resolve_credentials(&self, params: &ToolParameters) -> CredentialRecord {
        resolve(&self.credentials, &params.credential_overrides())
    }

    pub fn fetcher(&self) -> Result<Fetcher, Error> {
        let client = HttpClientBuilder::from_config(self.http.clone()).build_plain()?;
        let backoff = RetryAfterPolicy::new(self.fetch_max_attempts)
            .with_base_delay(self.fetch_base_delay)
            .with_max_delay(Duration::from_secs(30));
        Ok(Fetcher::new(client)
            .with_max_attempts(self.fetch_max_attempts)
            .with_backoff(backoff))
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.poll_interval).with_max_wait(self.job_max_wait)
    }
}
