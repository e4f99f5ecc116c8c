//! Inspecta domain core.
//!
//! Pure, synchronous building blocks of the vehicle-inspection wizard:
//! step definitions, photo slots, backend analysis payloads, input
//! validation, the photo quality gate, and the [`store::InspectionStore`]
//! every front end renders from. No I/O happens in this crate.

pub mod analysis;
pub mod error;
pub mod photo;
pub mod preview;
pub mod quality_gate;
pub mod step;
pub mod store;
pub mod types;
pub mod validation;
pub mod vehicle;
