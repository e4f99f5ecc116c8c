//! HTTP client wrapper: bounded timeout plus a small linear-backoff
//! retry budget.
//!
//! Every backend call goes through [`send_with_retry`]. A request is
//! rebuilt for each attempt (multipart bodies are single-use), so the
//! caller passes a builder closure rather than a finished request. The
//! deadline covers the whole exchange, response body included.

use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// Base delay of the linear backoff (`base_delay * attempt`).
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(600);

/// Timeout and retry budget of one backend capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    /// Per-attempt deadline for the full exchange, body included.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: u32,
    pub base_delay: Duration,
}

impl RequestPolicy {
    pub const fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            timeout,
            retries,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }

    pub const fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RequestPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(20), 1)
    }
}

/// Send a request with timeout and retry, returning the response body.
///
/// `build` is called once per attempt. An error from `build` is returned
/// immediately without retry. Timeouts, transport failures and non-2xx
/// statuses are retried up to `policy.retries` times, sleeping
/// `base_delay * attempt` between attempts; the last error is returned
/// once the budget is spent.
pub async fn send_with_retry<F>(
    operation: &'static str,
    policy: &RequestPolicy,
    build: F,
) -> Result<Vec<u8>, GatewayError>
where
    F: Fn() -> Result<reqwest::RequestBuilder, GatewayError>,
{
    let max_attempts = policy.retries + 1;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let request = build()?;

        match send_once(request, policy.timeout).await {
            Ok(body) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "Request succeeded after retry");
                }
                return Ok(body);
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying",
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if max_attempts > 1 {
                    tracing::error!(operation, attempts = attempt, error = %e, "Request failed after all retries");
                } else {
                    tracing::warn!(operation, error = %e, "Request failed");
                }
                return Err(e);
            }
        }
    }
}

/// Execute a single attempt: send, check the status, read the body.
async fn send_once(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<Vec<u8>, GatewayError> {
    let exchange = async {
        let response = request.timeout(timeout).send().await?;
        ensure_success(response).await
    };
    match tokio::time::timeout(timeout, exchange).await {
        Ok(Err(GatewayError::Network(e))) if e.is_timeout() => {
            Err(GatewayError::Timeout { after: timeout })
        }
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout { after: timeout }),
    }
}

/// Read the body of a successful response, or fail with a
/// [`GatewayError::Http`] carrying the status and body text.
async fn ensure_success(response: reqwest::Response) -> Result<Vec<u8>, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(GatewayError::Http {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.bytes().await?.to_vec())
}

/// Decode a JSON response body into the expected type.
pub fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, GatewayError> {
    serde_json::from_slice(body).map_err(|e| GatewayError::Decode(e.to_string()))
}
