//! Inspection wizard step definitions and navigation rules.
//!
//! The wizard runs over a fixed order of sixteen steps. Users move
//! forward and back between the navigable ones; the transient steps
//! (`VERIFYING_ID`, `VERIFYING_VEHICLE`, `FINALIZING`) are entered and
//! left only by backend responses.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::photo::{PhotoKey, PHOTO_ORDER};

/// A wizard step. Exactly one is active per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step", content = "photo")]
pub enum Step {
    Welcome,
    AskId,
    VerifyingId,
    AskPlate,
    VerifyingVehicle,
    ShowVehicle,
    Photo(PhotoKey),
    QualityCheck,
    DamageDetection,
    Finalizing,
    Results,
}

/// Total number of steps in the wizard (six photo steps included).
pub const TOTAL_STEPS: usize = 16;

/// Every step in wizard order.
pub const STEP_ORDER: [Step; TOTAL_STEPS] = [
    Step::Welcome,
    Step::AskId,
    Step::VerifyingId,
    Step::AskPlate,
    Step::VerifyingVehicle,
    Step::ShowVehicle,
    Step::Photo(PHOTO_ORDER[0]),
    Step::Photo(PHOTO_ORDER[1]),
    Step::Photo(PHOTO_ORDER[2]),
    Step::Photo(PHOTO_ORDER[3]),
    Step::Photo(PHOTO_ORDER[4]),
    Step::Photo(PHOTO_ORDER[5]),
    Step::QualityCheck,
    Step::DamageDetection,
    Step::Finalizing,
    Step::Results,
];

impl Step {
    /// Zero-based position in [`STEP_ORDER`].
    pub fn ordinal(self) -> usize {
        match self {
            Self::Welcome => 0,
            Self::AskId => 1,
            Self::VerifyingId => 2,
            Self::AskPlate => 3,
            Self::VerifyingVehicle => 4,
            Self::ShowVehicle => 5,
            Self::Photo(key) => 6 + key.index(),
            Self::QualityCheck => 12,
            Self::DamageDetection => 13,
            Self::Finalizing => 14,
            Self::Results => 15,
        }
    }

    pub fn from_ordinal(n: usize) -> Result<Self, CoreError> {
        STEP_ORDER.get(n).copied().ok_or_else(|| {
            CoreError::Validation(format!(
                "Invalid step ordinal {n}. Must be below {}",
                STEP_ORDER.len()
            ))
        })
    }

    /// Upper-case identifier used in logs and views.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Welcome => "WELCOME",
            Self::AskId => "ASK_ID",
            Self::VerifyingId => "VERIFYING_ID",
            Self::AskPlate => "ASK_PLATE",
            Self::VerifyingVehicle => "VERIFYING_VEHICLE",
            Self::ShowVehicle => "SHOW_VEHICLE",
            Self::Photo(PhotoKey::Front) => "PHOTO_FRONT",
            Self::Photo(PhotoKey::Rear) => "PHOTO_REAR",
            Self::Photo(PhotoKey::Left) => "PHOTO_LEFT",
            Self::Photo(PhotoKey::Right) => "PHOTO_RIGHT",
            Self::Photo(PhotoKey::Dashboard) => "PHOTO_DASHBOARD",
            Self::Photo(PhotoKey::Vin) => "PHOTO_VIN",
            Self::QualityCheck => "QUALITY_CHECK",
            Self::DamageDetection => "DAMAGE_DETECTION",
            Self::Finalizing => "FINALIZING",
            Self::Results => "RESULTS",
        }
    }

    pub fn photo_key(self) -> Option<PhotoKey> {
        match self {
            Self::Photo(key) => Some(key),
            _ => None,
        }
    }

    /// Steps entered while a backend call is in flight.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            Self::VerifyingId | Self::VerifyingVehicle | Self::Finalizing
        )
    }

    /// Where a user "next" action leads, if the step allows one.
    ///
    /// `None` for steps whose exit is driven by a backend response
    /// (identity and plate submission, finalize) or that are terminal.
    pub fn forward_target(self) -> Option<Self> {
        match self {
            Self::Welcome => Some(Self::AskId),
            Self::ShowVehicle => Some(Self::Photo(PhotoKey::Front)),
            Self::Photo(key) => Some(key.next().map_or(Self::QualityCheck, Self::Photo)),
            Self::QualityCheck => Some(Self::DamageDetection),
            Self::AskId
            | Self::VerifyingId
            | Self::AskPlate
            | Self::VerifyingVehicle
            | Self::DamageDetection
            | Self::Finalizing
            | Self::Results => None,
        }
    }

    /// Where a user "back" action leads, if the step allows one.
    ///
    /// Back skips the transient steps: leaving the first photo step
    /// returns to the vehicle summary, leaving the plate form returns
    /// to the identity form.
    pub fn back_target(self) -> Option<Self> {
        match self {
            Self::AskId => Some(Self::Welcome),
            Self::AskPlate => Some(Self::AskId),
            Self::ShowVehicle => Some(Self::AskPlate),
            Self::Photo(key) => Some(key.prev().map_or(Self::ShowVehicle, Self::Photo)),
            Self::QualityCheck => Some(Self::Photo(PhotoKey::Vin)),
            Self::DamageDetection => Some(Self::QualityCheck),
            Self::Results => Some(Self::DamageDetection),
            Self::Welcome | Self::VerifyingId | Self::VerifyingVehicle | Self::Finalizing => None,
        }
    }

    /// One-based progress position, for "step N of M" displays.
    pub fn progress(self) -> (usize, usize) {
        (self.ordinal() + 1, STEP_ORDER.len())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
