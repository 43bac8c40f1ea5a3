//! Error types for the application-metrics stack assembler.
//!
//! This module provides the error hierarchy for every stage of producing a
//! template: configuration loading, assembly of the resource graph, and
//! storage of the rendered cloud assembly.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the stack assembler.
#[derive(Debug, Error)]
pub enum StackError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Assembly failures: the embedded resource graph is structurally invalid.
    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    /// Assembly store errors.
    #[error("Assembly store error: {0}")]
    Store(#[from] StoreError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A notification destination is not a valid email address.
    #[error("Invalid notification email: {email}")]
    InvalidEmail {
        /// The rejected entry.
        email: String,
    },
}

/// Structural failures raised while assembling the resource graph.
///
/// Every variant points at an authoring mistake in the embedded constants;
/// none of them can be recovered from at run time.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Two constructs allocated the same logical id.
    #[error("Duplicate logical id: {logical_id}")]
    DuplicateLogicalId {
        /// The clashing logical id.
        logical_id: String,
    },

    /// A property references a logical id that is not declared.
    #[error("Resource '{from}' references undeclared '{target}'")]
    DanglingReference {
        /// Resource holding the reference.
        from: String,
        /// Missing target.
        target: String,
    },

    /// An embedded constant is out of range.
    #[error("Invalid constant for {construct}: {message}")]
    InvalidConstant {
        /// Construct path owning the constant.
        construct: String,
        /// What is wrong with it.
        message: String,
    },

    /// A tokenized string referenced a token that was never registered.
    #[error("Unknown token index {index} in rendered string")]
    UnknownToken {
        /// Index found in the placeholder.
        index: usize,
    },

    /// A property value could not be serialized.
    #[error("Failed to serialize {what}: {message}")]
    Serialization {
        /// What was being serialized.
        what: String,
        /// Serializer message.
        message: String,
    },
}

/// Assembly store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Stored assembly is corrupted.
    #[error("Assembly is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Lock acquisition failed.
    #[error("Failed to acquire assembly lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// Lock is held by another process.
    #[error("Assembly is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Local filesystem write failed.
    #[error("Failed to write assembly: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },

    /// S3 backend error.
    #[error("S3 assembly backend error: {message}")]
    S3Error {
        /// Description of the S3 error.
        message: String,
    },

    /// Serialization error.
    #[error("Assembly serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// Manifest version mismatch.
    #[error("Manifest version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected manifest version.
        expected: String,
        /// Found manifest version.
        found: String,
    },
}

/// Result type alias for assembler operations.
pub type Result<T> = std::result::Result<T, StackError>;

impl StackError {
    /// Returns true if this error came from the assembler itself.
    #[must_use]
    pub const fn is_assembly_failure(&self) -> bool {
        matches!(self, Self::Assembly(_))
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::LockFailed { .. } | StoreError::S3Error { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl AssemblyError {
    /// Creates an invalid-constant error.
    #[must_use]
    pub fn invalid_constant(construct: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstant {
            construct: construct.into(),
            message: message.into(),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            what: what.into(),
            message: message.to_string(),
        }
    }
}

impl StoreError {
    /// Creates an S3 error with the given message.
    #[must_use]
    pub fn s3(message: impl Into<String>) -> Self {
        Self::S3Error {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Creates a local write error with the given message.
    #[must_use]
    pub fn write(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assembly_failure_classification() {
        let err = StackError::from(AssemblyError::DuplicateLogicalId {
            logical_id: String::from("table"),
        });
        assert!(err.is_assembly_failure());
        assert!(!err.is_retryable());

        let err = StackError::from(StoreError::s3("timeout"));
        assert!(!err.is_assembly_failure());
        assert!(err.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = AssemblyError::DanglingReference {
            from: String::from("Function"),
            target: String::from("table"),
        };
        assert_eq!(
            err.to_string(),
            "Resource 'Function' references undeclared 'table'"
        );
    }
}
