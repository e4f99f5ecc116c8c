//! Identity and vehicle records returned by the backend lookups.

use serde::{Deserialize, Serialize};

/// Vehicle registry entry from `GET /inspection/verify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub plate: String,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    /// Owner's identification document, when the registry has one.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub history: Option<serde_json::Value>,
}

impl VehicleRecord {
    /// `true` when the registry names an owner whose document differs
    /// from `document`.
    pub fn owner_mismatch(&self, document: &str) -> bool {
        match self.id.as_deref().map(str::trim) {
            Some(owner_id) if !owner_id.is_empty() => owner_id != document.trim(),
            _ => false,
        }
    }
}

/// Snapshot from `GET /vehicle/history`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleHistory {
    pub plate: String,
    #[serde(default)]
    pub infractions: u32,
    #[serde(default)]
    pub previous_owners: u32,
    #[serde(default)]
    pub tech_ok: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Identity accepted by `POST /identity/verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub name: String,
    pub document: String,
    #[serde(default)]
    pub matched_driver: Option<serde_json::Value>,
}

/// Holder and vehicle, recorded once both lookups succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub name: String,
    pub id_number: String,
    pub plate: String,
}
