//! History ledger rules: capacity, the rollback point tag, and field limits.

use crate::error::CoreError;

/// Hard cap on ledger entries kept per project.
pub const MAX_HISTORY_ENTRIES: i64 = 5;

/// Operation type recorded for the entry written after a successful rollback.
pub const ROLLBACK_POINT_OPERATION: &str = "rollback_point";

/// Maximum allowed length for an operation type token.
pub const MAX_OPERATION_TYPE_LENGTH: usize = 64;

/// Maximum allowed length for an operation description.
pub const MAX_OPERATION_DESCRIPTION_LENGTH: usize = 500;

/// Rollback teardown deletes collected actions in chunks of this size.
pub const ACTION_DELETE_BATCH_SIZE: usize = 500;

/// Entries to keep before inserting a new one so the ledger never exceeds
/// [`MAX_HISTORY_ENTRIES`].
pub const fn retained_before_insert() -> i64 {
    MAX_HISTORY_ENTRIES - 1
}

pub fn validate_operation_type(operation_type: &str) -> Result<(), CoreError> {
    if operation_type.trim().is_empty() {
        return Err(CoreError::Validation(
            "operation_type must not be empty".to_string(),
        ));
    }
    if operation_type.chars().count() > MAX_OPERATION_TYPE_LENGTH {
        return Err(CoreError::Validation(format!(
            "operation_type must not exceed {MAX_OPERATION_TYPE_LENGTH} characters"
        )));
    }
    if operation_type.chars().any(char::is_whitespace) {
        return Err(CoreError::Validation(
            "operation_type must be a single token without whitespace".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_operation_description(description: Option<&str>) -> Result<(), CoreError> {
    match description {
        Some(d) if d.chars().count() > MAX_OPERATION_DESCRIPTION_LENGTH => {
            Err(CoreError::Validation(format!(
                "operation_description must not exceed {MAX_OPERATION_DESCRIPTION_LENGTH} characters"
            )))
        }
        _ => Ok(()),
    }
}

/// Description of the rollback point entry, truncated to fit the column.
pub fn rollback_point_description(target_description: Option<&str>) -> String {
    let target = target_description.unwrap_or("earlier state");
    let full = format!("Before rollback to \"{target}\"");
    if full.chars().count() <= MAX_OPERATION_DESCRIPTION_LENGTH {
        return full;
    }
    full.chars()
        .take(MAX_OPERATION_DESCRIPTION_LENGTH - 1)
        .chain(std::iter::once('…'))
        .collect()
}
