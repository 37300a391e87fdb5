use http::StatusCode;
use maxbot_core::ErrorClass;
use thiserror::Error;

/// Upper bound for the body text kept on a generic HTTP error.
pub const MAX_ERROR_TEXT: usize = 512;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("create request failed: {0}")]
    Build(String),
    #[error("encode request body failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("invalid chat ID")]
    InvalidChatId,
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("API error {code}: {message}")]
    Api {
        status: StatusCode,
        code: i64,
        message: String,
    },
    #[error("API error {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("decode response failed: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("operation cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ClientError::Build(_) => ErrorClass::Construction,
            ClientError::Encode(_) | ClientError::Decode(_) => ErrorClass::Encoding,
            ClientError::InvalidChatId | ClientError::EmptyMessage => ErrorClass::Validation,
            ClientError::Network(_) => ErrorClass::Network,
            ClientError::Api { status, .. } | ClientError::Http { status, .. } => {
                ErrorClass::from_status(*status)
            }
            ClientError::Cancelled => ErrorClass::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// HTTP status of a remote failure, if the error came from a response.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } | ClientError::Http { status, .. } => Some(*status),
            ClientError::Network(err) => err.status(),
            _ => None,
        }
    }

    pub(crate) fn http(status: StatusCode, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        ClientError::Http {
            status,
            body: truncate(&text, MAX_ERROR_TEXT),
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
