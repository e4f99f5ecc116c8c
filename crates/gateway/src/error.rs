use std::time::Duration;

use inspecta_core::error::CoreError;

/// Errors from the backend gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Input rejected before any network call. Never retried.
    #[error(transparent)]
    Validation(#[from] CoreError),

    /// No response within the capability's timeout.
    #[error("Request timed out after {}ms", .after.as_millis())]
    Timeout { after: Duration },

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("Backend error ({status}): {body}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not match the expected shape.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Session socket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}

impl GatewayError {
    /// Transport-level failures the HTTP wrapper retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Network(_) | Self::Http { .. }
        )
    }

    /// HTTP status, when the backend answered with one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
