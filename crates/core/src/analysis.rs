//! Backend-origin analysis payloads: per-photo analysis and the
//! consolidated finalize result.
//!
//! Both are treated as immutable once stored. A retake replaces the
//! per-photo result wholesale; a second finalize overwrites the first.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::quality_gate::{classify_sharpness, QualityThresholds};

/// Reason recorded when the backend flags an abort without saying why.
pub const DEFAULT_ABORT_REASON: &str = "ABORT";

/// Metric key the backend uses for Laplacian variance in `preproc_metrics`.
pub const METRIC_LAPLACIAN_VAR: &str = "laplacian_var";

// ---------------------------------------------------------------------------
// Quality status
// ---------------------------------------------------------------------------

/// Backend sharpness classification of a captured photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityStatus {
    Ok,
    Warn,
    Blur,
    VeryBlur,
    /// Any value this client does not recognise. Never blocks.
    #[serde(other)]
    Unknown,
}

impl QualityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Blur => "blur",
            Self::VeryBlur => "very_blur",
            Self::Unknown => "unknown",
        }
    }
}

// ---------------------------------------------------------------------------
// Per-photo analysis
// ---------------------------------------------------------------------------

/// A detected damage region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageBox {
    pub label: String,
    pub confidence: f64,
    /// `[x1, y1, x2, y2]` in source-image pixels.
    #[serde(default, rename = "box")]
    pub bbox: Vec<f64>,
}

/// Presence of a vehicle part in the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPresence {
    pub present: bool,
    pub confidence: f64,
    #[serde(default, rename = "box")]
    pub bbox: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScratchCandidate {
    #[serde(rename = "box")]
    pub bbox: Vec<i64>,
    #[serde(default)]
    pub aspect: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScratchInfo {
    pub count: u32,
    #[serde(default)]
    pub scratch_candidates: Vec<ScratchCandidate>,
}

/// Result of `POST /inspection/analyze` for one photo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub damage: Vec<DamageBox>,
    #[serde(default)]
    pub parts_presence: BTreeMap<String, PartPresence>,
    #[serde(default)]
    pub missing_parts: Vec<String>,
    #[serde(default)]
    pub color_match: Option<bool>,
    #[serde(default)]
    pub exif_geo: Option<Vec<f64>>,
    #[serde(default)]
    pub fraud_flags: Vec<String>,
    #[serde(default)]
    pub review_flags: Vec<String>,
    #[serde(default)]
    pub aborted: bool,
    #[serde(default)]
    pub abort_reason: Option<String>,
    #[serde(default)]
    pub images_in_session: u32,
    #[serde(default)]
    pub preproc_metrics: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub scratch: ScratchInfo,
    #[serde(default)]
    pub quality_status: Option<QualityStatus>,
    #[serde(default)]
    pub debug_images: Option<BTreeMap<String, String>>,
}

impl AnalysisResult {
    /// The abort reason when this result voids the inspection.
    pub fn abort_signal(&self) -> Option<String> {
        abort_reason(Some(self.aborted), self.abort_reason.as_deref())
    }

    /// Quality status to gate on.
    ///
    /// The backend's own status wins. When it is absent, the Laplacian
    /// variance in `preproc_metrics` is classified against `thresholds`.
    pub fn effective_quality(&self, thresholds: Option<&QualityThresholds>) -> Option<QualityStatus> {
        if let Some(status) = self.quality_status {
            return Some(status);
        }
        let thresholds = thresholds?;
        let variance = self.preproc_metrics.get(METRIC_LAPLACIAN_VAR)?.as_f64()?;
        Some(classify_sharpness(variance, thresholds))
    }
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

/// Result of `POST /inspection/finalize`: the consolidated verdict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinalizeResult {
    #[serde(default)]
    pub inspection_id: Option<String>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub plate: Option<String>,
    #[serde(default)]
    pub damage_detections: Vec<DamageBox>,
    #[serde(default)]
    pub parts_presence: BTreeMap<String, PartPresence>,
    #[serde(default)]
    pub missing_parts: Vec<String>,
    #[serde(default)]
    pub verdict: Option<serde_json::Value>,
    #[serde(default)]
    pub color_match: Option<bool>,
    #[serde(default)]
    pub fraud_flags: Vec<String>,
    #[serde(default)]
    pub review_flags: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub report_markdown: Option<String>,
    #[serde(default)]
    pub aborted: Option<bool>,
    #[serde(default)]
    pub abort_reason: Option<String>,
    #[serde(default)]
    pub vehicle: Option<serde_json::Value>,
    #[serde(default)]
    pub vehicle_history: Option<serde_json::Value>,
    #[serde(default)]
    pub identity_validated: Option<bool>,
}

impl FinalizeResult {
    pub fn abort_signal(&self) -> Option<String> {
        abort_reason(self.aborted, self.abort_reason.as_deref())
    }
}

fn abort_reason(aborted: Option<bool>, reason: Option<&str>) -> Option<String> {
    if aborted != Some(true) {
        return None;
    }
    Some(
        reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or(DEFAULT_ABORT_REASON)
            .to_string(),
    )
}
