use plotweave_core::error::CoreError;

/// Failure of a repository operation that enforces domain rules.
///
/// Plain CRUD calls return `sqlx::Error` directly; anything that can also
/// reject input on business grounds returns this.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: plotweave_core::types::DbId) -> Self {
        StoreError::Core(CoreError::NotFound { entity, id })
    }

    pub(crate) fn constraint(msg: impl Into<String>) -> Self {
        StoreError::Core(CoreError::ConstraintViolation(msg.into()))
    }
}
