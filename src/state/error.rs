//! Error types for state store operations

use std::fmt;

/// Result type alias for state store operations
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing persisted state
#[derive(Debug)]
pub enum StateError {
    /// I/O error (file access, rename, etc.)
    IoError(std::io::Error),

    /// A record exists but cannot be decoded
    CorruptRecord(String),

    /// Record serialization failed
    SerializationError(String),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::IoError(err) => write!(f, "I/O error: {}", err),
            StateError::CorruptRecord(msg) => write!(f, "corrupt state record: {}", msg),
            StateError::SerializationError(msg) => {
                write!(f, "state serialization error: {}", msg)
            }
        }
    }
}

impl std::error::Error for StateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StateError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::IoError(err)
    }
}

impl From<serde_json::Error> for StateError {
    fn from(err: serde_json::Error) -> Self {
        StateError::SerializationError(err.to_string())
    }
}
