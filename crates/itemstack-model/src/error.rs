//! Storage error types.
//!
//! Every facade operation reports a [`StorageError`] carrying one
//! [`StorageErrorCode`], a message and, for store failures, the underlying
//! error as `source`.

use std::fmt;

/// Well-known storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StorageErrorCode {
    /// The table definition is invalid.
    #[default]
    SchemaError,
    /// A table with the same name already exists.
    AlreadyExists,
    /// The table does not exist.
    NotFound,
    /// The conditions cannot be served by the physical layout.
    QueryError,
    /// A value cannot be encoded or decoded.
    EncodingError,
    /// The column store failed to run a statement.
    ExecutorError,
    /// The feature is not implemented.
    Unsupported,
}

impl StorageErrorCode {
    /// Returns the short error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaError => "SchemaError",
            Self::AlreadyExists => "AlreadyExists",
            Self::NotFound => "NotFound",
            Self::QueryError => "QueryError",
            Self::EncodingError => "EncodingError",
            Self::ExecutorError => "ExecutorError",
            Self::Unsupported => "Unsupported",
        }
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by a storage operation.
#[derive(Debug)]
pub struct StorageError {
    /// The error code.
    pub code: StorageErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl StorageError {
    /// Create a new `StorageError` from an error code.
    #[must_use]
    pub fn new(code: StorageErrorCode) -> Self {
        Self {
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new `StorageError` with a custom message.
    #[must_use]
    pub fn with_message(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // -- Convenience constructors --

    /// Invalid table definition.
    #[must_use]
    pub fn schema(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::SchemaError, message)
    }

    /// Table already exists.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::AlreadyExists, message)
    }

    /// Table not found.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::NotFound, message)
    }

    /// Conditions not servable by the physical layout.
    #[must_use]
    pub fn query(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::QueryError, message)
    }

    /// Value encoding or decoding failure.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::EncodingError, message)
    }

    /// Column store failure.
    #[must_use]
    pub fn executor(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::ExecutorError, message)
    }

    /// Feature not implemented.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::with_message(StorageErrorCode::Unsupported, message)
    }
}

/// Create a `StorageError` from an error code.
///
/// # Examples
///
/// ```
/// use itemstack_model::storage_error;
/// use itemstack_model::error::StorageErrorCode;
///
/// let err = storage_error!(QueryError);
/// assert_eq!(err.code, StorageErrorCode::QueryError);
///
/// let err = storage_error!(NotFound, "Table not found");
/// assert_eq!(err.message, "Table not found");
/// ```
#[macro_export]
macro_rules! storage_error {
    ($code:ident) => {
        $crate::error::StorageError::new($crate::error::StorageErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::StorageError::with_message($crate::error::StorageErrorCode::$code, $msg)
    };
}
