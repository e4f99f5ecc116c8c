//! Photo quality gate: thresholds, sharpness classification, the
//! blocking policy applied on photo steps, and the per-session summary.

use serde::{Deserialize, Serialize};

use crate::analysis::QualityStatus;
use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Laplacian variance below which a photo is `very_blur`.
pub const DEFAULT_VERY_BLUR_BELOW: f64 = 50.0;
/// Laplacian variance below which a photo is `blur`.
pub const DEFAULT_BLUR_BELOW: f64 = 100.0;
/// Laplacian variance below which a photo is `warn`.
pub const DEFAULT_WARN_BELOW: f64 = 150.0;
/// Minimum accepted frame size.
pub const DEFAULT_MIN_WIDTH: u32 = 600;
pub const DEFAULT_MIN_HEIGHT: u32 = 400;

/// Quality thresholds published by the backend health endpoint.
///
/// Read-only reference data. Missing fields fall back to the defaults
/// above so a partial payload still yields a usable gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    #[serde(default = "default_very_blur_below")]
    pub very_blur_below: f64,
    #[serde(default = "default_blur_below")]
    pub blur_below: f64,
    #[serde(default = "default_warn_below")]
    pub warn_below: f64,
    #[serde(default = "default_min_width")]
    pub min_width: u32,
    #[serde(default = "default_min_height")]
    pub min_height: u32,
}

fn default_very_blur_below() -> f64 {
    DEFAULT_VERY_BLUR_BELOW
}
fn default_blur_below() -> f64 {
    DEFAULT_BLUR_BELOW
}
fn default_warn_below() -> f64 {
    DEFAULT_WARN_BELOW
}
fn default_min_width() -> u32 {
    DEFAULT_MIN_WIDTH
}
fn default_min_height() -> u32 {
    DEFAULT_MIN_HEIGHT
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            very_blur_below: DEFAULT_VERY_BLUR_BELOW,
            blur_below: DEFAULT_BLUR_BELOW,
            warn_below: DEFAULT_WARN_BELOW,
            min_width: DEFAULT_MIN_WIDTH,
            min_height: DEFAULT_MIN_HEIGHT,
        }
    }
}

impl QualityThresholds {
    /// Thresholds must be non-negative and ordered
    /// `very_blur_below <= blur_below <= warn_below`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.very_blur_below < 0.0 {
            return Err(CoreError::Validation(format!(
                "very_blur_below must be >= 0, got {}",
                self.very_blur_below
            )));
        }
        if self.very_blur_below > self.blur_below || self.blur_below > self.warn_below {
            return Err(CoreError::Validation(format!(
                "Thresholds must be ordered very_blur ({}) <= blur ({}) <= warn ({})",
                self.very_blur_below, self.blur_below, self.warn_below
            )));
        }
        Ok(())
    }
}

/// Classify a Laplacian variance. Higher = sharper.
pub fn classify_sharpness(variance: f64, thresholds: &QualityThresholds) -> QualityStatus {
    if variance < thresholds.very_blur_below {
        QualityStatus::VeryBlur
    } else if variance < thresholds.blur_below {
        QualityStatus::Blur
    } else if variance < thresholds.warn_below {
        QualityStatus::Warn
    } else {
        QualityStatus::Ok
    }
}

// ---------------------------------------------------------------------------
// Gate policy
// ---------------------------------------------------------------------------

/// Outcome of running the quality gate on a photo step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward progress allowed.
    Pass,
    /// Blocked, but a one-time "continue anyway" is available.
    Overridable,
    /// Blocked until the slot is retaken.
    RetakeRequired,
}

impl GateDecision {
    pub fn allows_advance(self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Apply the gate to a slot's quality status.
///
/// `very_blur` always requires a retake; `blur` blocks unless the user
/// has overridden this capture; everything else passes, including a
/// slot with no analysis yet.
pub fn evaluate_gate(status: Option<QualityStatus>, overridden: bool) -> GateDecision {
    match status {
        Some(QualityStatus::VeryBlur) => GateDecision::RetakeRequired,
        Some(QualityStatus::Blur) if overridden => GateDecision::Pass,
        Some(QualityStatus::Blur) => GateDecision::Overridable,
        _ => GateDecision::Pass,
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Counts of slot statuses across a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualitySummary {
    pub total: usize,
    pub ok: usize,
    pub warn: usize,
    pub blur: usize,
    pub very_blur: usize,
    /// Captured photos without a (recognised) status yet.
    pub pending: usize,
}

pub fn compute_summary<I>(statuses: I) -> QualitySummary
where
    I: IntoIterator<Item = Option<QualityStatus>>,
{
    let mut summary = QualitySummary::default();
    for status in statuses {
        summary.total += 1;
        match status {
            Some(QualityStatus::Ok) => summary.ok += 1,
            Some(QualityStatus::Warn) => summary.warn += 1,
            Some(QualityStatus::Blur) => summary.blur += 1,
            Some(QualityStatus::VeryBlur) => summary.very_blur += 1,
            Some(QualityStatus::Unknown) | None => summary.pending += 1,
        }
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
