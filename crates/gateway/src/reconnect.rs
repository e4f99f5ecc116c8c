//! Capped exponential backoff for the session socket.
//!
//! [`reconnect_loop`] dials the socket until it connects, the attempt
//! budget runs out, or the [`CancellationToken`] fires.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::socket::{SessionConnection, SessionSocket};

/// Backoff parameters for socket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Wait after the first failed dial, and after a dropped connection.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Consecutive failed dials before giving up. `None` retries until
    /// cancelled.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts: None,
        }
    }
}

/// Delay schedule for one reconnect run.
#[derive(Debug, Clone)]
pub struct Backoff<'a> {
    config: &'a ReconnectConfig,
    current: Duration,
    attempts: u32,
}

impl<'a> Backoff<'a> {
    pub fn new(config: &'a ReconnectConfig) -> Self {
        Self {
            config,
            current: config.initial_delay,
            attempts: 0,
        }
    }

    /// Failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a failed attempt and return how long to wait before the
    /// next one, or `None` when the attempt budget is spent.
    pub fn fail(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.config.max_attempts.is_some_and(|max| self.attempts >= max) {
            return None;
        }
        let wait = self.current;
        let grown = self.current.mul_f64(self.config.multiplier.max(1.0));
        self.current = grown.min(self.config.max_delay);
        Some(wait)
    }
}

/// Dial `socket` with backoff.
///
/// Returns `None` if `cancel` fires or the attempt budget is spent
/// before a connection succeeds.
pub async fn reconnect_loop(
    socket: &SessionSocket,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<SessionConnection> {
    let session_id = socket.session_id();
    let mut backoff = Backoff::new(config);

    loop {
        let dialed = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!(session_id, "Session socket dial cancelled");
                return None;
            }
            dialed = socket.connect() => dialed,
        };

        let err = match dialed {
            Ok(conn) => {
                if backoff.attempts() > 0 {
                    tracing::info!(session_id, failed_attempts = backoff.attempts(), "Session socket connected after retries");
                }
                return Some(conn);
            }
            Err(e) => e,
        };

        let Some(wait) = backoff.fail() else {
            tracing::error!(session_id, attempts = backoff.attempts(), error = %err, "Giving up on session socket");
            return None;
        };
        tracing::warn!(
            session_id,
            attempt = backoff.attempts(),
            retry_in_ms = wait.as_millis() as u64,
            error = %err,
            "Session socket dial failed",
        );

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(wait) => {}
        }
    }
}
