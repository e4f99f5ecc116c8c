//! Session socket processing loop.
//!
//! Reads frames from the session socket, parses them into
//! [`SessionMessage`]s and forwards the ones the workflow cares about as
//! [`SessionSignal`]s. [`watch_session`] wraps the loop with reconnect
//! and cancellation.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use inspecta_core::analysis::DEFAULT_ABORT_REASON;

use crate::messages::{parse_message, AnalyzeResultData, SessionMessage};
use crate::reconnect::{reconnect_loop, ReconnectConfig};
use crate::socket::SessionSocket;

/// What the workflow hears from the session socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionSignal {
    AnalyzeStarted,
    AnalyzeFinished(AnalyzeResultData),
    /// Terminal: the session was voided server-side.
    Aborted { reason: String },
}

/// Why [`process_messages`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// Socket closed or failed; worth reconnecting.
    Closed,
    /// An abort was forwarded; nothing more to listen for.
    Aborted,
    Cancelled,
    /// The signal receiver was dropped.
    ReceiverGone,
}

/// Process frames until the socket closes, an abort arrives, or
/// `cancel` fires.
pub async fn process_messages<S>(
    ws_stream: &mut S,
    session_id: &str,
    signal_tx: &mpsc::UnboundedSender<SessionSignal>,
    cancel: &CancellationToken,
) -> StreamEnd
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return StreamEnd::Cancelled,
            frame = ws_stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let Some(signal) = handle_text_message(&text, session_id) else {
                    continue;
                };
                let aborted = matches!(signal, SessionSignal::Aborted { .. });
                if signal_tx.send(signal).is_err() {
                    return StreamEnd::ReceiverGone;
                }
                if aborted {
                    return StreamEnd::Aborted;
                }
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(session_id, ?frame, "Session socket closed");
                return StreamEnd::Closed;
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::warn!(session_id, error = %e, "Session socket receive error");
                return StreamEnd::Closed;
            }
            None => return StreamEnd::Closed,
        }
    }
}

fn handle_text_message(text: &str, session_id: &str) -> Option<SessionSignal> {
    match parse_message(text) {
        Ok(SessionMessage::AnalyzeStart { .. }) => {
            tracing::debug!(session_id, "Backend analysis started");
            Some(SessionSignal::AnalyzeStarted)
        }
        Ok(SessionMessage::AnalyzeResult(data)) => {
            tracing::debug!(
                session_id,
                cached = data.cached,
                images_in_session = data.images_in_session,
                "Backend analysis finished",
            );
            Some(SessionSignal::AnalyzeFinished(data))
        }
        Ok(SessionMessage::SessionAborted { reason }) => {
            let reason = reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ABORT_REASON.to_string());
            tracing::warn!(session_id, reason = %reason, "Session aborted by backend");
            Some(SessionSignal::Aborted { reason })
        }
        Ok(SessionMessage::Unknown) => {
            tracing::trace!(session_id, raw_message = %text, "Ignoring unknown session event");
            None
        }
        Err(e) => {
            tracing::warn!(
                session_id,
                error = %e,
                raw_message = %text,
                "Failed to parse session message",
            );
            None
        }
    }
}

/// Listen on `socket` until aborted or cancelled, reconnecting whenever
/// the socket drops.
pub async fn watch_session(
    socket: SessionSocket,
    config: ReconnectConfig,
    cancel: CancellationToken,
    signal_tx: mpsc::UnboundedSender<SessionSignal>,
) {
    loop {
        let Some(mut conn) = reconnect_loop(&socket, &config, &cancel).await else {
            return;
        };

        match process_messages(&mut conn.ws_stream, socket.session_id(), &signal_tx, &cancel).await
        {
            StreamEnd::Closed => {
                tracing::debug!(session_id = socket.session_id(), "Session socket dropped; reconnecting");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(config.initial_delay) => {}
                }
            }
            end => {
                tracing::debug!(session_id = socket.session_id(), ?end, "Session watcher stopped");
                return;
            }
        }
    }
}
