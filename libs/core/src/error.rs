use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error document returned by the platform on failures.
///
/// ```
/// use maxbot_core::ApiError;
///
/// let doc: ApiError = serde_json::from_str(r#"{"code":404,"message":"chat not found"}"#).unwrap();
/// assert_eq!(doc.to_string(), "API error 404: chat not found");
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.details.as_deref().filter(|d| !d.is_empty()) {
            Some(details) => write!(f, "API error {}: {} ({details})", self.code, self.message),
            None => write!(f, "API error {}: {}", self.code, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Retry-relevant category of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Caller misuse while building the request.
    Construction,
    /// Body could not be encoded, or a response did not match the expected shape.
    Encoding,
    /// Connect/read failure or timeout.
    Network,
    RateLimited,
    Unauthorized,
    /// Rejected input, e.g. an invalid chat id.
    Validation,
    Server,
    Cancelled,
}

impl ErrorClass {
    /// Derives the class of a non-2xx HTTP status.
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::TOO_MANY_REQUESTS => ErrorClass::RateLimited,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorClass::Unauthorized,
            s if s.is_server_error() => ErrorClass::Server,
            _ => ErrorClass::Validation,
        }
    }

    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorClass::Network | ErrorClass::RateLimited | ErrorClass::Server
        )
    }

    /// Stable label used for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Construction => "construction",
            ErrorClass::Encoding => "encoding",
            ErrorClass::Network => "network",
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::Unauthorized => "unauthorized",
            ErrorClass::Validation => "validation",
            ErrorClass::Server => "server",
            ErrorClass::Cancelled => "cancelled",
        }
    }
}
