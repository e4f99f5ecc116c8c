//! Request and response shapes of the backend HTTP surface that are not
//! part of the domain core.

use serde::{Deserialize, Serialize};

use inspecta_core::photo::{GeoPoint, PhotoFile, PhotoKey};
use inspecta_core::quality_gate::QualityThresholds;
use inspecta_core::types::SessionId;
use inspecta_core::vehicle::VehicleRecord;

/// `GET /model/info`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub build: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
}

/// Label vocabularies the detectors emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSets {
    #[serde(default)]
    pub damage_labels: Vec<String>,
    #[serde(default)]
    pub part_labels: Vec<String>,
}

/// `GET /health`: status, thresholds, feature switches, vocabularies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthInfo {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model_version: Option<String>,
    #[serde(default)]
    pub quality_thresholds: Option<QualityThresholds>,
    #[serde(default)]
    pub debug_images_enabled: bool,
    #[serde(default)]
    pub pdf_enabled: bool,
    #[serde(default)]
    pub labels: Option<LabelSets>,
    #[serde(default)]
    pub config_version: Option<i64>,
}

/// `GET /inspection/verify?plate=`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleLookup {
    pub found: bool,
    #[serde(default)]
    pub data: Option<VehicleRecord>,
}

impl VehicleLookup {
    /// The record, only when the backend reports it found one.
    pub fn record(&self) -> Option<&VehicleRecord> {
        if self.found {
            self.data.as_ref()
        } else {
            None
        }
    }
}

/// `POST /identity/verify`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityVerification {
    pub valid: bool,
    #[serde(default)]
    pub matched_driver: Option<serde_json::Value>,
}

/// Optional detector confidence overrides sent with analyze/finalize.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceOverrides {
    pub damage: Option<f64>,
    pub parts: Option<f64>,
}

/// Payload of `POST /inspection/analyze`.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub session_id: SessionId,
    pub plate: String,
    pub photo_key: PhotoKey,
    pub file: PhotoFile,
    pub geo: Option<GeoPoint>,
    pub note: Option<String>,
    pub confidence: ConfidenceOverrides,
    pub debug: bool,
}

/// Payload of `POST /inspection/finalize`.
#[derive(Debug, Clone)]
pub struct FinalizeRequest {
    pub session_id: SessionId,
    pub plate: String,
    pub confidence: ConfidenceOverrides,
}
