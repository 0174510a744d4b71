//! Core error types for chromasim.

use thiserror::Error;

/// Result type alias using `ChromaError`.
pub type ChromaResult<T> = std::result::Result<T, ChromaError>;

/// Generic boxed error for external error sources.
pub type GenericError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for chromasim operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChromaError {
    /// Invalid configuration: unknown function name, malformed expression tree,
    /// missing required key.
    #[error("ConfigError: {0}")]
    ConfigError(String),

    /// An operation was called before the state it depends on exists.
    #[error("PreconditionError: {0}")]
    PreconditionError(String),

    /// Type mismatch between a column and a function.
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Column not found in a schema.
    #[error("ColumnNotFound: {0}")]
    ColumnNotFound(String),

    /// Query plan construction or execution failed.
    #[error("ExecutionError: {0}")]
    ExecutionError(String),

    /// Dataset discovery or decoding failed.
    #[error("StorageError: {0}")]
    StorageError(String),

    /// Internal error (bug in chromasim).
    #[error("InternalError: {0}")]
    InternalError(String),

    /// IO error.
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),

    /// Arrow error.
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow_schema::ArrowError),

    /// Parquet error.
    #[error("ParquetError: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    /// JSON serialization error.
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("SerdeYamlError: {0}")]
    SerdeYamlError(#[from] serde_yaml::Error),

    /// External error from third-party libraries.
    #[error("ExternalError: {0}")]
    ExternalError(GenericError),
}

impl ChromaError {
    /// Create a new `ConfigError`.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new `PreconditionError`.
    pub fn precondition<S: Into<String>>(msg: S) -> Self {
        Self::PreconditionError(msg.into())
    }

    /// Create a new `TypeError`.
    pub fn type_error<S: Into<String>>(msg: S) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a new `ColumnNotFound` error.
    pub fn column_not_found<S: Into<String>>(name: S) -> Self {
        Self::ColumnNotFound(name.into())
    }

    /// Create a new `ExecutionError`.
    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(msg.into())
    }

    /// Create a planning error (using `ExecutionError`).
    pub fn planning<S: Into<String>>(msg: S) -> Self {
        Self::ExecutionError(format!("PlanningError: {}", msg.into()))
    }

    /// Create a new `StorageError`.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::StorageError(msg.into())
    }

    /// Create a new `InternalError`.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Whether this error stems from invalid configuration.
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::ConfigError(_))
    }

    /// Whether this error is an ordering or degenerate-state violation.
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::PreconditionError(_))
    }
}

/// Ensure a condition holds, returning an `ExecutionError` if not.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $variant:ident: $($msg:tt)*) => {
        if !$cond {
            return Err($crate::ChromaError::$variant(format!($($msg)*)));
        }
    };
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::ChromaError::ExecutionError($msg.to_string()));
        }
    };
}

/// Return early with a `ConfigError`.
#[macro_export]
macro_rules! config_err {
    ($($arg:tt)*) => {
        return Err($crate::ChromaError::ConfigError(format!($($arg)*)))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_positive(n: i64) -> ChromaResult<i64> {
        ensure!(n > 0, PreconditionError: "expected positive value, got {}", n);
        Ok(n)
    }

    fn reject(name: &str) -> ChromaResult<()> {
        config_err!("unknown function '{}'", name)
    }

    #[test]
    fn test_error_display() {
        let err = ChromaError::config("unknown function 'frobnicate'");
        assert_eq!(err.to_string(), "ConfigError: unknown function 'frobnicate'");
    }

    #[test]
    fn test_error_classification() {
        assert!(ChromaError::config("x").is_config());
        assert!(ChromaError::precondition("x").is_precondition());
        assert!(!ChromaError::execution("x").is_config());
    }

    #[test]
    fn test_ensure_macro() {
        assert_eq!(check_positive(3).unwrap(), 3);
        assert!(check_positive(0).unwrap_err().is_precondition());
    }

    #[test]
    fn test_config_err_macro() {
        let err = reject("frobnicate").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: ChromaError = io.into();
        assert!(matches!(err, ChromaError::IoError(_)));
    }
}
