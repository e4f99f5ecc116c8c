//! Bridges the session socket into the store.
//!
//! Server-pushed aborts take the same one-shot abort path as an abort
//! signal in an analysis result. Signals that arrive after the session
//! was reset are dropped.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use inspecta_core::types::SessionId;
use inspecta_gateway::listener::{watch_session, SessionSignal};
use inspecta_gateway::reconnect::ReconnectConfig;
use inspecta_gateway::socket::SessionSocket;

use crate::state::SharedStore;

/// Start watching `session_id` on `url`. Cancel the returned token to
/// stop both the socket task and the signal consumer.
pub fn spawn_session_watcher(
    store: SharedStore,
    session_id: SessionId,
    url: String,
    reconnect: ReconnectConfig,
) -> CancellationToken {
    let cancel = CancellationToken::new();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();

    let socket = SessionSocket::new(session_id.as_str(), url);
    tokio::spawn(watch_session(socket, reconnect, cancel.clone(), signal_tx));
    tokio::spawn(apply_signals(store, session_id, signal_rx, cancel.clone()));

    cancel
}

/// Apply session signals to `store` until the channel closes or
/// `cancel` fires.
pub async fn apply_signals(
    store: SharedStore,
    session_id: SessionId,
    mut signal_rx: mpsc::UnboundedReceiver<SessionSignal>,
    cancel: CancellationToken,
) {
    loop {
        let signal = tokio::select! {
            _ = cancel.cancelled() => return,
            signal = signal_rx.recv() => match signal {
                Some(signal) => signal,
                None => return,
            },
        };

        match signal {
            SessionSignal::Aborted { reason } => {
                let applied = store.update_if_session(&session_id, |s| s.abort(reason));
                match applied {
                    Some(true) => tracing::warn!(session_id = %session_id, "Session aborted by server"),
                    Some(false) => tracing::debug!(session_id = %session_id, "Server abort ignored; already aborted"),
                    None => tracing::debug!(session_id = %session_id, "Server abort for a previous session ignored"),
                }
                return;
            }
            SessionSignal::AnalyzeStarted => {
                tracing::trace!(session_id = %session_id, "Server started an analysis");
            }
            SessionSignal::AnalyzeFinished(data) => {
                tracing::debug!(
                    session_id = %session_id,
                    images_in_session = data.images_in_session,
                    fraud_flags = data.fraud_flags.len(),
                    "Server finished an analysis",
                );
            }
        }
    }
}
