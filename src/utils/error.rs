//! Error types for the leaf-severity crate.
//!
//! Uses thiserror for ergonomic error definitions. Shape and configuration
//! problems are reported at construction time as `Error::Model`; numerical
//! divergence during training is deliberately *not* represented here, it
//! propagates through loss values instead.

use thiserror::Error;

/// Main error type for leaf-severity operations
#[derive(Error, Debug)]
pub enum Error {
    /// Model construction or shape error
    #[error("Model error: {0}")]
    Model(String),

    /// Error during a training run
    #[error("Training error: {0}")]
    Training(String),

    /// Error during evaluation
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Convenience Result type for leaf-severity operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Model("branch widths do not divide".to_string());
        assert_eq!(err.to_string(), "Model error: branch widths do not divide");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_result_type() {
        let ok: Result<i32> = Ok(1);
        assert!(ok.is_ok());

        let bad: Result<i32> = Err(Error::InvalidArgument("empty".to_string()));
        assert!(bad.is_err());
    }
}
