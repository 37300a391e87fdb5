use std::fmt;

use http::{Method, StatusCode};
use maxbot_core::WebhookEvent;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::signature::verify_signature;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("invalid HTTP method, expected POST")]
    MethodNotAllowed,
    #[error("missing X-Signature header")]
    MissingSignature,
    #[error("invalid webhook signature")]
    SignatureInvalid,
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[source] serde_json::Error),
    #[error("missing event type")]
    MissingEventType,
}

impl WebhookError {
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Turns a raw webhook delivery into a verified event.
///
/// Without a secret the verifier runs in insecure mode: signatures are not
/// checked and every request logs a warning. Use [`WebhookVerifier::insecure`]
/// to ask for that explicitly.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
}

impl WebhookVerifier {
    /// An empty secret counts as no secret.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self::new(Some(secret.into()))
    }

    pub fn insecure() -> Self {
        Self { secret: None }
    }

    pub fn is_insecure(&self) -> bool {
        self.secret.is_none()
    }

    /// Checks, in order: method, signature presence, signature over the raw
    /// bytes, JSON shape, event type. Nothing is decoded before the signature
    /// has been accepted.
    pub fn handle(
        &self,
        method: &Method,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookEvent, WebhookError> {
        if method != Method::POST {
            return Err(WebhookError::MethodNotAllowed);
        }

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(WebhookError::MissingSignature)?;

        match &self.secret {
            Some(secret) => {
                if !verify_signature(secret, signature, body) {
                    debug!(body_len = body.len(), "webhook signature mismatch");
                    return Err(WebhookError::SignatureInvalid);
                }
            }
            None => warn!("webhook secret not set, skipping signature verification"),
        }

        let event: WebhookEvent =
            serde_json::from_slice(body).map_err(WebhookError::MalformedPayload)?;
        if event.kind.is_empty() {
            return Err(WebhookError::MissingEventType);
        }

        info!(
            event_type = %event.kind,
            chat_id = %event.chat.id,
            update_id = event.update_id,
            "webhook event received"
        );
        Ok(event)
    }
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
