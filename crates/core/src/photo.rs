//! Photo slots: the six required vehicle views and the captured payloads
//! that fill them.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Photo keys
// ---------------------------------------------------------------------------

/// One of the six fixed photo positions an inspection requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhotoKey {
    Front,
    Rear,
    Left,
    Right,
    Dashboard,
    Vin,
}

/// Capture order of the photo steps.
pub const PHOTO_ORDER: [PhotoKey; 6] = [
    PhotoKey::Front,
    PhotoKey::Rear,
    PhotoKey::Left,
    PhotoKey::Right,
    PhotoKey::Dashboard,
    PhotoKey::Vin,
];

impl PhotoKey {
    /// Parse the wire name used by the backend (`photo_key` form field).
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "front" => Ok(Self::Front),
            "rear" => Ok(Self::Rear),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "dashboard" => Ok(Self::Dashboard),
            "vin" => Ok(Self::Vin),
            _ => Err(CoreError::Validation(format!(
                "Unknown photo key '{s}'. Must be one of: front, rear, left, right, dashboard, vin"
            ))),
        }
    }

    /// Wire name sent to the backend.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Rear => "rear",
            Self::Left => "left",
            Self::Right => "right",
            Self::Dashboard => "dashboard",
            Self::Vin => "vin",
        }
    }

    /// Zero-based position in [`PHOTO_ORDER`].
    pub fn index(self) -> usize {
        match self {
            Self::Front => 0,
            Self::Rear => 1,
            Self::Left => 2,
            Self::Right => 3,
            Self::Dashboard => 4,
            Self::Vin => 5,
        }
    }

    pub fn next(self) -> Option<Self> {
        PHOTO_ORDER.get(self.index() + 1).copied()
    }

    pub fn prev(self) -> Option<Self> {
        self.index().checked_sub(1).map(|i| PHOTO_ORDER[i])
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Front => "Front",
            Self::Rear => "Rear",
            Self::Left => "Left side",
            Self::Right => "Right side",
            Self::Dashboard => "Dashboard / odometer",
            Self::Vin => "VIN / engine",
        }
    }

    /// Framing hint shown while the slot is being captured.
    pub fn helper(self) -> &'static str {
        match self {
            Self::Front => "Full front view from about 2 m",
            Self::Rear => "Full rear view",
            Self::Left => "Left side at 45 degrees",
            Self::Right => "Right side at 45 degrees",
            Self::Dashboard => "Dashboard with the odometer visible",
            Self::Vin => "VIN plate or engine number, legible",
        }
    }
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

/// Position captured at shot time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(CoreError::Validation(format!(
                "Coordinates out of range: lat {lat}, lon {lon}"
            )));
        }
        Ok(Self { lat, lon })
    }
}

// ---------------------------------------------------------------------------
// Captured payload
// ---------------------------------------------------------------------------

/// Largest accepted capture (8 MiB).
pub const MAX_PHOTO_BYTES: usize = 8 * 1024 * 1024;

/// A captured image as handed over by the camera or file picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Guess the content type from the file extension.
    pub fn content_type_for(file_name: &str) -> &'static str {
        let lower = file_name.to_ascii_lowercase();
        match lower.rsplit_once('.').map(|(_, ext)| ext) {
            Some("jpg" | "jpeg") => "image/jpeg",
            Some("png") => "image/png",
            Some("webp") => "image/webp",
            Some("heic") => "image/heic",
            _ => "application/octet-stream",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reject captures that are not images, are empty, or exceed
/// [`MAX_PHOTO_BYTES`].
pub fn validate_photo_intake(file: &PhotoFile) -> Result<(), CoreError> {
    if !file.content_type.starts_with("image/") {
        return Err(CoreError::Validation(format!(
            "'{}' is not an image (content type '{}')",
            file.file_name, file.content_type
        )));
    }
    if file.is_empty() {
        return Err(CoreError::Validation(format!(
            "'{}' is empty",
            file.file_name
        )));
    }
    if file.len() > MAX_PHOTO_BYTES {
        return Err(CoreError::Validation(format!(
            "'{}' is {} bytes; the limit is 8 MB",
            file.file_name,
            file.len()
        )));
    }
    Ok(())
}
