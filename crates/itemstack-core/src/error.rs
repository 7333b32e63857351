//! Conversion of executor failures into storage errors.

use itemstack_model::error::{StorageError, StorageErrorCode};

use crate::executor::ExecutorError;

/// Convert an executor error into a storage error.
///
/// The store's "already exists" and "not found" failures keep their meaning;
/// everything else becomes `ExecutorError` with the original as source.
#[must_use]
pub fn executor_error_to_storage(e: ExecutorError) -> StorageError {
    let code = match &e {
        ExecutorError::AlreadyExists(_) => StorageErrorCode::AlreadyExists,
        ExecutorError::NotFound(_) => StorageErrorCode::NotFound,
        _ => StorageErrorCode::ExecutorError,
    };
    StorageError::with_message(code, e.to_string()).with_source(e)
}
