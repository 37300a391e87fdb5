use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use maxbot_security::WebhookVerifier;

pub const DEFAULT_PATH: &str = "/maxbot/webhook";

#[derive(Clone)]
pub struct IngressConfig {
    pub addr: SocketAddr,
    pub path: String,
    pub secret: Option<String>,
    pub insecure: bool,
    pub event_buffer: usize,
    pub max_body_bytes: usize,
}

impl IngressConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = var("BIND")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse::<SocketAddr>()
            .context("invalid BIND address")?;

        let path = var("MAXBOT_WEBHOOK_PATH").unwrap_or_else(|| DEFAULT_PATH.into());
        if !path.starts_with('/') {
            bail!("MAXBOT_WEBHOOK_PATH must start with '/', got {path:?}");
        }

        let secret = var("MAXBOT_WEBHOOK_SECRET");
        let insecure = var("MAXBOT_WEBHOOK_INSECURE")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if secret.is_none() && !insecure {
            bail!("MAXBOT_WEBHOOK_SECRET must be set (or MAXBOT_WEBHOOK_INSECURE=1)");
        }

        let event_buffer = match var("MAXBOT_EVENT_BUFFER") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .with_context(|| format!("invalid MAXBOT_EVENT_BUFFER {raw:?}"))?,
            None => 100,
        };
        let max_body_bytes = match var("MAXBOT_MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid MAXBOT_MAX_BODY_BYTES {raw:?}"))?,
            None => 1 << 20,
        };

        Ok(Self {
            addr,
            path,
            secret,
            insecure,
            event_buffer,
            max_body_bytes,
        })
    }

    pub fn verifier(&self) -> WebhookVerifier {
        match &self.secret {
            Some(secret) => WebhookVerifier::with_secret(secret.clone()),
            None => WebhookVerifier::insecure(),
        }
    }
}

impl std::fmt::Debug for IngressConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngressConfig")
            .field("addr", &self.addr)
            .field("path", &self.path)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("insecure", &self.insecure)
            .field("event_buffer", &self.event_buffer)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}
