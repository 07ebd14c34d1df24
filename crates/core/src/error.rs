/// Domain-level errors shared by every nativedoc crate.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A hierarchy segment is missing, or empty once sanitized.
    #[error("Hierarchy resolution failed: {0}")]
    Resolution(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
