use crate::db::backend::BackendError;
use thiserror::Error as ThisError;

///
/// Error
///
/// Runtime error taxonomy for the query layer. Validation errors surface
/// immediately; transient backend errors are retried by the transaction
/// envelope before they surface.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// Builder or handle misuse.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Operation disallowed for the query's current configuration.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A unique retrieval matched more than one result.
    #[error("expected at most one result, but the query matched multiple")]
    NotUnique,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl Error {
    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether retrying inside the transaction envelope may help.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Backend(backend) if backend.transient)
    }
}
