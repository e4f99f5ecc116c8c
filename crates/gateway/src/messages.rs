//! Session WebSocket message types and parser.
//!
//! The backend pushes flat JSON objects tagged by an `"event"` field,
//! e.g. `{"event": "session:aborted", "reason": "FRAUD"}`.

use serde::Deserialize;

/// All session events the backend pushes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event")]
pub enum SessionMessage {
    /// The backend started analysing a photo of this session.
    #[serde(rename = "analyze:start")]
    AnalyzeStart {
        #[serde(default)]
        session_id: Option<String>,
    },

    /// A photo analysis finished.
    #[serde(rename = "analyze:result")]
    AnalyzeResult(AnalyzeResultData),

    /// The session was declared void (by the backend or a peer session).
    #[serde(rename = "session:aborted")]
    SessionAborted {
        #[serde(default)]
        reason: Option<String>,
    },

    /// Any event this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Payload of `analyze:result`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AnalyzeResultData {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cached: bool,
    #[serde(default)]
    pub images_in_session: u32,
    #[serde(default)]
    pub fraud_flags: Vec<String>,
    #[serde(default)]
    pub review_flags: Vec<String>,
    #[serde(default)]
    pub aborted: bool,
}

/// Parse a raw text frame into a [`SessionMessage`].
pub fn parse_message(text: &str) -> Result<SessionMessage, serde_json::Error> {
    serde_json::from_str(text)
}
