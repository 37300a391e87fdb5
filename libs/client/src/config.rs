use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use maxbot_core::API_VERSION;
use thiserror::Error;

use crate::retry::RetrySettings;

const DEFAULT_BASE_URL: &str = "https://maxbot.yourdomain.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Connection settings fixed at client construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientConfig {
    base_url: String,
    api_key: String,
    api_version: String,
    request_timeout: Duration,
    user_agent: String,
    retry: RetrySettings,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            api_version: API_VERSION.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("maxbot-client/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetrySettings::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn retry(&self) -> &RetrySettings {
        &self.retry
    }

    /// Reads `MAXBOT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] but resolves variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("MAXBOT_API_KEY")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("MAXBOT_API_KEY"))?;
        let mut config = Self::new(api_key);

        if let Some(base) = lookup("MAXBOT_BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base;
        }
        if let Some(version) = lookup("MAXBOT_API_VERSION").filter(|v| !v.trim().is_empty()) {
            config.api_version = version;
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "MAXBOT_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        let mut retry = RetrySettings::default();
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "MAXBOT_MAX_RETRIES")? {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: "MAXBOT_MAX_RETRIES",
                    value: attempts.to_string(),
                });
            }
            retry.max_attempts = attempts;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MAXBOT_RETRY_DELAY_MS")? {
            retry.delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "MAXBOT_RATE_LIMIT_DELAY_MS")? {
            retry.rate_limit_delay = Duration::from_millis(ms);
        }
        config.retry = retry;

        Ok(config)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .finish()
    }
}

pub(crate) fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(None),
    }
}
