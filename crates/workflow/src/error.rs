use inspecta_core::error::CoreError;
use inspecta_gateway::GatewayError;

use crate::busy::Operation;

/// Errors from workflow operations.
///
/// Every variant leaves the session at an interactive step; none is
/// fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The same operation is already in flight; the trigger is ignored.
    #[error("{0} is already in progress")]
    Busy(Operation),

    #[error("No plate recorded for this inspection")]
    MissingPlate,

    /// The session was reset while the request was in flight; the
    /// response was discarded.
    #[error("Session changed while the request was in flight")]
    SessionChanged,
}

impl WorkflowError {
    /// Message suitable for a step-local error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Gateway(GatewayError::Timeout { .. }) => {
                "The server took too long to answer. Please try again.".to_string()
            }
            Self::Gateway(GatewayError::Network(_)) => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            Self::Gateway(GatewayError::Http { status, .. }) => {
                format!("The server rejected the request ({status}). Please try again.")
            }
            other => other.to_string(),
        }
    }
}
