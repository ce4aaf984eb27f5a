use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    /// A structural rule of the story graph was broken (e.g. binding shape).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// A multi-step unit of work was aborted and reverted.
    #[error("Transaction failed: {0}")]
    TransactionFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
