//! Error types for escuchar operations.
//!
//! Provides rich error context for library consumers.

use std::fmt;

/// Main error type for escuchar operations.
///
/// Covers the failure modes of the recommendation pipeline: malformed catalog
/// records, dimension mismatches between fit-time and query-time data, and
/// transforms invoked before fitting.
///
/// # Examples
///
/// ```
/// use escuchar::error::EscucharError;
///
/// let err = EscucharError::DimensionMismatch {
///     expected: "12 columns".to_string(),
///     actual: "11 columns".to_string(),
/// };
/// assert!(err.to_string().contains("dimension mismatch"));
/// ```
#[derive(Debug)]
pub enum EscucharError {
    /// Matrix/vector dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// A catalog record is missing a required audio descriptor,
    /// or carries a non-finite value for it.
    MalformedRecord {
        /// Identifier of the offending track
        track_id: String,
        /// Name of the missing or invalid field
        field: String,
    },

    /// Transform called on an estimator that has not been fitted.
    NotFitted {
        /// Which component was used before fitting
        what: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// Serialization/deserialization error, including pipeline
    /// version mismatches on load.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for EscucharError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscucharError::DimensionMismatch { expected, actual } => {
                write!(f, "dimension mismatch: expected {expected}, got {actual}")
            }
            EscucharError::MalformedRecord { track_id, field } => {
                write!(f, "malformed record {track_id}: missing or invalid descriptor '{field}'")
            }
            EscucharError::NotFitted { what } => {
                write!(f, "{what} is not fitted; call fit() first")
            }
            EscucharError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(f, "invalid hyperparameter: {param} = {value}, expected {constraint}")
            }
            EscucharError::Io(e) => write!(f, "I/O error: {e}"),
            EscucharError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            EscucharError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EscucharError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EscucharError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EscucharError {
    fn from(err: std::io::Error) -> Self {
        EscucharError::Io(err)
    }
}

impl From<&str> for EscucharError {
    fn from(msg: &str) -> Self {
        EscucharError::Other(msg.to_string())
    }
}

impl From<String> for EscucharError {
    fn from(msg: String) -> Self {
        EscucharError::Other(msg)
    }
}

impl EscucharError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create a not-fitted error for the named component
    #[must_use]
    pub fn not_fitted(what: &str) -> Self {
        Self::NotFitted {
            what: what.to_string(),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, EscucharError>;
