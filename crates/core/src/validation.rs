//! Client-side input rules for identity and plate submission.
//!
//! Everything here runs before any network call; a failure is a
//! [`CoreError::Validation`] and never reaches the gateway.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;

/// Accepted plate shape after normalisation: 5 to 7 ASCII alphanumerics.
pub const PLATE_PATTERN: &str = r"^[A-Z0-9]{5,7}$";

static PLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PLATE_PATTERN).expect("valid regex"));

// ---------------------------------------------------------------------------
// Plate
// ---------------------------------------------------------------------------

/// Upper-case and trim a plate. Punctuation is kept, so it fails
/// [`validate_plate`] rather than being silently stripped.
pub fn normalize_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Normalise and validate a plate, returning the normalised form.
pub fn validate_plate(raw: &str) -> Result<String, CoreError> {
    let plate = normalize_plate(raw);
    if !PLATE_RE.is_match(&plate) {
        return Err(CoreError::Validation(format!(
            "Plate '{plate}' must be 5 to 7 letters or digits"
        )));
    }
    Ok(plate)
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity form payload, already trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct IdentityInput {
    #[validate(length(min = 3, message = "name must be at least 3 characters"))]
    pub name: String,
    #[validate(length(min = 5, message = "document must be at least 5 characters"))]
    pub document: String,
}

impl IdentityInput {
    /// Trim both fields and check their lengths.
    pub fn parse(name: &str, document: &str) -> Result<Self, CoreError> {
        let input = Self {
            name: name.trim().to_string(),
            document: document.trim().to_string(),
        };
        input
            .validate()
            .map_err(|e| CoreError::Validation(format_validation_errors(&e)))?;
        Ok(input)
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    let mut parts: Vec<String> = errors
        .field_errors()
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => msg.to_string(),
                None => format!("{field} is invalid"),
            })
        })
        .collect();
    parts.sort();
    parts.join("; ")
}
