//! Service HTTP clients: a plain `reqwest` client, optionally wrapped in the
//! transient-retry middleware.

use std::time::Duration;

use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;

use super::RetryAfterPolicy;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    /// Whole-request timeout, body included.
    pub timeout: Duration,
    /// Retries after the first attempt. Zero disables the retry middleware.
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            user_agent: format!("cloud-tools/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub type MiddlewareClient = reqwest_middleware::ClientWithMiddleware;

/// Builds clients from an [`HttpClientConfig`].
///
/// [`build`](Self::build) is for service calls and retries transient
/// failures with exponential backoff. [`build_plain`](Self::build_plain) is for
/// streamed downloads, where the caller owns the retry loop and a replayed
/// request would restart the stream. [`build_single_attempt`](Self::build_single_attempt)
/// has the middleware interface without the retry layer, for service calls
/// whose caller runs its own retry loop.
#[derive(Debug, Clone, Default)]
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn from_config(config: HttpClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub fn build_plain(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(CONNECT_TIMEOUT.min(self.config.timeout))
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent.as_str())
            .build()
    }

    pub fn build_single_attempt(&self) -> Result<MiddlewareClient, reqwest::Error> {
        Ok(ClientBuilder::new(self.build_plain()?).build())
    }

    pub fn build(&self) -> Result<MiddlewareClient, reqwest::Error> {
        let client = self.build_plain()?;
        let mut builder = ClientBuilder::new(client);
        if self.config.max_retries > 0 {
            let policy = RetryAfterPolicy::new(self.config.max_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(policy));
        }
        Ok(builder.build())
    }
}
