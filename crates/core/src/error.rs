#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Inspection aborted: {0}")]
    Aborted(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
