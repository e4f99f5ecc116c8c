//! Backend gateway for the vehicle-inspection client.
//!
//! HTTP wrapper with timeout and retry, one typed method per backend
//! capability, a short-lived plate-lookup cache, upload preparation and
//! the session event socket.

pub mod api;
pub mod backend;
pub mod cache;
pub mod error;
pub mod http;
pub mod listener;
pub mod messages;
pub mod reconnect;
pub mod socket;
pub mod types;
pub mod upload;

pub use api::{BackendApi, GatewayPolicies};
pub use backend::InspectionBackend;
pub use error::GatewayError;
