//! Workflow events broadcast to renderers.

use serde::Serialize;

use inspecta_core::analysis::QualityStatus;
use inspecta_core::photo::PhotoKey;
use inspecta_core::step::Step;
use inspecta_core::types::SessionId;

/// Capacity of the workflow event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A state change renderers may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StepChanged { from: Step, to: Step },

    /// A step-local error message was raised.
    ErrorRaised { message: String },

    PhotoAnalyzed {
        photo_key: PhotoKey,
        quality: Option<QualityStatus>,
    },

    Aborted { reason: String },

    Finalized { inspection_id: Option<String> },

    /// A fresh session started after reset.
    SessionReset { session_id: SessionId },
}
