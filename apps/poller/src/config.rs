use anyhow::{Context, Result};
use maxbot_client::{ClientConfig, PollingConfig};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub client: ClientConfig,
    pub polling: PollingConfig,
    /// Reply to text messages with the same text.
    pub echo: bool,
}

impl PollerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let client = ClientConfig::from_lookup(&lookup).context("client configuration")?;
        let polling = PollingConfig::from_lookup(&lookup).context("polling configuration")?;
        let echo = lookup("MAXBOT_ECHO")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        Ok(Self {
            client,
            polling,
            echo,
        })
    }
}
