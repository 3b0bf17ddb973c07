use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::time::Duration;

/// Endpoint used for every service unless overridden. `{service}` and
/// `{region}` are substituted per client.
pub const DEFAULT_ENDPOINT_TEMPLATE: &str = "https://{service}.{region}.amazonaws.com";

/// Object key prefix for files uploaded on behalf of a tool.
pub const DEFAULT_UPLOAD_KEY_PREFIX: &str = "transcribe-files/";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Default access key id, used when an invocation does not supply one.
    #[arg(long, env)]
    pub aws_access_key_id: Option<String>,

    /// Default secret access key, used when an invocation does not supply one.
    #[arg(long, env, hide_env_values = true)]
    aws_secret_access_key: Option<String>,

    /// Default region. Falls back to us-east-1 when neither this nor the
    /// invocation names one.
    #[arg(long, env)]
    pub aws_region: Option<String>,

    /// Endpoint URL template for service clients.
    /// Override in tests to point at a mock server.
    #[arg(long, env, default_value = DEFAULT_ENDPOINT_TEMPLATE)]
    endpoint_template: String,

    /// Seconds between status polls of an asynchronous job, at least 1
    #[arg(long, env, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: u64,

    /// Give up waiting for an asynchronous job after this many seconds.
    /// Unset means wait until the job reaches a terminal status.
    #[arg(long, env)]
    pub job_max_wait_secs: Option<u64>,

    /// Total download attempts for remote artifacts
    #[arg(long, env, default_value_t = 3)]
    pub fetch_max_attempts: u32,

    /// Timeout in seconds for a single HTTP request
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Retries applied by the HTTP middleware to transient service failures
    #[arg(long, env, default_value_t = 3)]
    pub http_max_retries: u32,

    /// Key prefix for objects uploaded without an explicit key
    #[arg(long, env, default_value = DEFAULT_UPLOAD_KEY_PREFIX)]
    upload_key_prefix: String,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Name of the tool to invoke (e.g. transcribe_audio)
    #[arg(short, long, env = "CLOUD_TOOL")]
    pub tool: Option<String>,

    /// Tool parameters as a JSON object
    #[arg(short, long, env = "CLOUD_TOOL_PARAMS", default_value = "{}")]
    pub params: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn aws_secret_access_key(&self) -> Option<String> {
        self.aws_secret_access_key.clone()
    }

    pub fn set_endpoint_template(mut self, template: String) -> Self {
        self.endpoint_template = template;
        self
    }

    pub fn endpoint_template(&self) -> &str {
        &self.endpoint_template
    }

    pub fn upload_key_prefix(&self) -> &str {
        &self.upload_key_prefix
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_max_wait(&self) -> Option<Duration> {
        self.job_max_wait_secs.map(Duration::from_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply_without_flags() {
        let config = Config::try_parse_from(["cloud_tools_rs"]).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.fetch_max_attempts, 3);
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.job_max_wait(), None);
        assert_eq!(config.upload_key_prefix(), "transcribe-files/");
        assert_eq!(config.endpoint_template(), DEFAULT_ENDPOINT_TEMPLATE);
    }

    #[test]
    fn test_invocation_flags_are_parsed() {
        let config = Config::try_parse_from([
            "cloud_tools_rs",
            "--tool",
            "create_bucket",
            "--params",
            r#"{"bucket_name":"demo"}"#,
            "--job-max-wait-secs",
            "600",
            "-l",
            "DEBUG",
        ])
        .unwrap();

        assert_eq!(config.tool.as_deref(), Some("create_bucket"));
        assert_eq!(config.params, r#"{"bucket_name":"demo"}"#);
        assert_eq!(config.job_max_wait(), Some(Duration::from_secs(600)));
        assert_eq!(config.log_level_filter, LevelFilter::Debug);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        assert!(Config::try_parse_from(["cloud_tools_rs", "--poll-interval-secs", "0"]).is_err());

        let config =
            Config::try_parse_from(["cloud_tools_rs", "--poll-interval-secs", "1"]).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        assert!(Config::try_parse_from(["cloud_tools_rs", "-l", "LOUD"]).is_err());
    }

    #[test]
    fn test_set_endpoint_template() {
        let config = Config::try_parse_from(["cloud_tools_rs"])
            .unwrap()
            .set_endpoint_template("http://127.0.0.1:1234".to_string());

        assert_eq!(config.endpoint_template(), "http://127.0.0.1:1234");
    }
}
