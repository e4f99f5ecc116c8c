//! Inspection workflow: the controller that drives the state store
//! through the backend gateway, plus the step renderer.

pub mod busy;
pub mod controller;
pub mod error;
pub mod events;
pub mod state;
pub mod view;
pub mod watcher;

pub use controller::{
    CaptureOutcome, ControllerOptions, IdentityOutcome, InspectionController, VehicleOutcome,
};
pub use error::WorkflowError;
pub use events::WorkflowEvent;
pub use view::{render, Action, StepView};
