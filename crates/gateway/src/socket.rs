//! WebSocket client for the per-session event channel.
//!
//! [`SessionSocket`] holds the address of one session's socket. Call
//! [`SessionSocket::connect`] to open a live [`SessionConnection`].

use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::GatewayError;

/// Raw stream type of an open session socket.
pub type SessionStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Address of one inspection session's event socket.
#[derive(Debug, Clone)]
pub struct SessionSocket {
    session_id: String,
    url: String,
}

/// An open session socket.
pub struct SessionConnection {
    pub session_id: String,
    pub ws_stream: SessionStream,
}

impl SessionSocket {
    /// * `url` - full socket URL, e.g. `ws://host:8000/ws/inspection/<id>`.
    pub fn new(session_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            url: url.into(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn connect(&self) -> Result<SessionConnection, GatewayError> {
        let (ws_stream, _response) = connect_async(self.url.as_str()).await.map_err(|e| {
            GatewayError::WebSocket(format!("Failed to connect to {}: {e}", self.url))
        })?;

        tracing::info!(session_id = %self.session_id, url = %self.url, "Session socket connected");

        Ok(SessionConnection {
            session_id: self.session_id.clone(),
            ws_stream,
        })
    }
}
