//! Error types for fibernav.
//!
//! Only precondition and configuration problems are errors. A walk leaving
//! the grid or a degenerate direction is normal control flow and never
//! reaches this type.

use thiserror::Error;

/// The main error type for fibernav operations.
#[derive(Error, Debug)]
pub enum FiberNavError {
    /// Tracking was requested without a loaded direction field
    #[error("No direction field loaded - attach a tensor or maxima field before seeding")]
    MissingField,

    /// Input size does not match expected size
    #[error("Invalid input size: expected {expected}, got {actual}")]
    InvalidInputSize {
        /// Expected size
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Index out of bounds
    #[error("Index out of bounds: index {index}, length {length}")]
    IndexOutOfBounds {
        /// The index that was accessed
        index: usize,
        /// The valid length
        length: usize,
    },

    /// Binary serialization error occurred
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON serialization error occurred
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with custom message
    #[error("{0}")]
    Other(String),
}

/// A specialized `Result` type for fibernav operations.
pub type Result<T> = std::result::Result<T, FiberNavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FiberNavError::MissingField;
        assert!(err.to_string().starts_with("No direction field loaded"));

        let err = FiberNavError::InvalidInputSize {
            expected: 1000,
            actual: 999,
        };
        assert_eq!(err.to_string(), "Invalid input size: expected 1000, got 999");

        let err = FiberNavError::IndexOutOfBounds {
            index: 12,
            length: 8,
        };
        assert_eq!(err.to_string(), "Index out of bounds: index 12, length 8");
    }

    #[test]
    fn test_json_error_conversion() {
        fn parse() -> Result<serde_json::Value> {
            Ok(serde_json::from_str("{not json")?)
        }

        assert!(matches!(parse(), Err(FiberNavError::Json(_))));
    }
}
