//! Error types for the array storage client
//!
//! Every failing engine call is translated at the call site into one of
//! these kinds, carrying the engine's message. We use `thiserror` for
//! automatic `Display` and `Error` trait implementations.
//!
//! An `Incomplete` query is a [`QueryStatus`](crate::QueryStatus), not an
//! error, and never appears in this taxonomy.

use std::io;
use thiserror::Error;

/// Result type alias for array storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the array storage client
#[derive(Debug, Error)]
pub enum Error {
    /// Handle construction failed
    #[error("allocation failed: {0}")]
    Allocation(String),

    /// The engine rejected an operation; carries the engine's message
    #[error("engine error: {0}")]
    Engine(String),

    /// Unknown config key, bad enum conversion, or malformed argument
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Missing metadata key, enumeration, or group member
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation requires an opened handle, or one opened in another mode
    #[error("handle not open: {0}")]
    NotOpen(String),

    /// Buffer datatype or size disagrees with the schema
    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        /// Field (attribute or dimension) the buffer was bound to
        field: String,
        /// What the schema implies
        expected: String,
        /// What the caller supplied
        actual: String,
    },

    /// I/O error from config files or VFS operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed config file content
    #[error("parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Shorthand for a [`Error::TypeMismatch`] over a named field
    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Error::TypeMismatch {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_engine() {
        let err = Error::Engine("domain is not set".to_string());
        assert!(err.to_string().contains("engine error"));
        assert!(err.to_string().contains("domain is not set"));
    }

    #[test]
    fn test_error_display_not_open() {
        let err = Error::NotOpen("array opened in Read mode, operation requires Write".into());
        let msg = err.to_string();
        assert!(msg.contains("not open"));
        assert!(msg.contains("requires Write"));
    }

    #[test]
    fn test_error_display_type_mismatch() {
        let err = Error::type_mismatch("a1", "Int32 x1", "Float64 x1");
        let msg = err.to_string();
        assert!(msg.contains("a1"));
        assert!(msg.contains("Int32 x1"));
        assert!(msg.contains("Float64 x1"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_error() -> Result<i32> {
            Err(Error::NotFound("key 'x'".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
