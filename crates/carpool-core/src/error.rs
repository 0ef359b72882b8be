use thiserror::Error;
use uuid::Uuid;

pub type CoreResult<T> = Result<T, CoreError>;

/// Everything a ride or request operation can refuse with. None of these are
/// retried here; the caller decides what to do with them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input
    #[error("{0}")]
    Validation(String),

    /// Unknown ride, request or user
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The caller lacks authority over the ride or request
    #[error("{0}")]
    Forbidden(String),

    /// The operation does not apply in the current lifecycle or request state
    #[error("{0}")]
    InvalidState(String),

    /// An outstanding request already exists for this passenger and ride
    #[error("{0}")]
    Conflict(String),

    /// No seats left at accept time
    #[error("ride {0} has no seats remaining")]
    Capacity(Uuid),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }
}
