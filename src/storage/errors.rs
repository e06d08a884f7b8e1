use std::fmt;
use std::io;

/// Program storage errors
#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    /// No program stored under the id
    NotFound { id: String },

    /// A program already exists under the id
    AlreadyExists { id: String },

    /// Id is empty or contains characters other than `[A-Za-z0-9_-]`
    InvalidId { id: String },

    /// Error serializing or deserializing a record
    SerializationError { details: String },

    /// Error accessing the underlying storage medium
    IOError { operation: String, details: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::NotFound { id } => write!(f, "Program not found: {}", id),

            StorageError::AlreadyExists { id } => write!(f, "Program already exists: {}", id),

            StorageError::InvalidId { id } => write!(
                f,
                "Invalid program id '{}': use letters, digits, '_' or '-'",
                id
            ),

            StorageError::SerializationError { details } => {
                write!(f, "Serialization error: {}", details)
            }

            StorageError::IOError { operation, details } => {
                write!(f, "I/O error during {}: {}", operation, details)
            }
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(err: io::Error) -> Self {
        StorageError::IOError {
            operation: "unknown".to_string(),
            details: err.to_string(),
        }
    }
}

impl std::error::Error for StorageError {}

/// Maps an IO error to a StorageError
pub fn io_to_storage_error(operation: &str, error: io::Error) -> StorageError {
    StorageError::IOError {
        operation: operation.to_string(),
        details: error.to_string(),
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
