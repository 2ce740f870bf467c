use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::time::Duration;

/// The main error type for the bridge
///
/// Variants follow the delivery-reliability taxonomy: boundary rejections
/// (signature, freshness, duplicate, validation) are terminal and never
/// retried, while network, rate-limit and server failures are transient.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Webhook is too old")]
    StaleWebhook { age_secs: u64 },

    #[error("Duplicate webhook")]
    DuplicateWebhook { event_type: String, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by upstream API")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Upstream server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("Upstream API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<BridgeError>,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Error body returned by the webhook endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

impl BridgeError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Classify a non-success upstream HTTP status.
    ///
    /// 429 becomes [`BridgeError::RateLimited`], 500/502/503/504 become
    /// [`BridgeError::Server`], anything else is a terminal [`BridgeError::Api`].
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        match status {
            429 => Self::RateLimited { retry_after },
            500 | 502 | 503 | 504 => Self::Server {
                status,
                message: message.into(),
            },
            _ => Self::Api {
                status,
                message: message.into(),
            },
        }
    }

    /// Whether the failure is transient and eligible for another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }

    /// Upstream-provided delay hint, only present on 429 responses
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Upstream HTTP status carried by this error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::RetriesExhausted { source, .. } => source.upstream_status(),
            _ => None,
        }
    }

    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature => StatusCode::UNAUTHORIZED,
            Self::StaleWebhook { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::DuplicateWebhook { .. } => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Network(_) | Self::Server { .. } | Self::Api { .. } => StatusCode::BAD_GATEWAY,
            Self::RetriesExhausted { .. } => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Internal(_) | Self::Anyhow(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message that is safe to hand back to a webhook sender.
    ///
    /// Client errors expose their message; server-side failures are
    /// reduced to a generic string and only logged in full.
    fn safe_message(&self) -> String {
        match self {
            Self::MissingSignature
            | Self::InvalidSignature
            | Self::StaleWebhook { .. }
            | Self::DuplicateWebhook { .. }
            | Self::Validation(_) => self.to_string(),
            Self::RateLimited { .. } => "Too many requests".to_string(),
            Self::Network(_)
            | Self::Server { .. }
            | Self::Api { .. }
            | Self::RetriesExhausted { .. } => "Upstream request failed".to_string(),
            Self::Config(_) | Self::Internal(_) | Self::Anyhow(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let body = Json(ErrorResponse {
            error: self.safe_message(),
        });
        (status, body).into_response()
    }
}

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            BridgeError::Validation(format!("JSON error: {}", err))
        } else {
            BridgeError::Internal(format!("JSON serialization error: {}", err))
        }
    }
}

impl From<reqwest::Error> for BridgeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BridgeError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            BridgeError::Network(format!("Connection error: {}", err))
        } else if err.is_request() || err.is_body() {
            BridgeError::Network(format!("Request error: {}", err))
        } else if let Some(status) = err.status() {
            BridgeError::from_status(status.as_u16(), err.to_string(), None)
        } else if err.is_decode() {
            BridgeError::Internal(format!("Failed to decode response: {}", err))
        } else {
            BridgeError::Internal(format!("HTTP client error: {}", err))
        }
    }
}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionRefused
            | ErrorKind::BrokenPipe
            | ErrorKind::TimedOut
            | ErrorKind::UnexpectedEof
            | ErrorKind::NotConnected => BridgeError::Network(err.to_string()),
            _ => BridgeError::Internal(format!("I/O error: {}", err)),
        }
    }
}
