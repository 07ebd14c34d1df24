use nativedoc_client::ClientError;
use nativedoc_core::error::CoreError;
use nativedoc_store::StoreError;

/// Errors surfaced by builder and runtime sessions.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl DeskError {
    /// The doc definition does not exist yet (an empty state, not a fault).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Core(CoreError::NotFound { .. }) => true,
            Self::Store(StoreError::Core(CoreError::NotFound { .. })) => true,
            Self::Client(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Text shown in a panel's status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Client(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
