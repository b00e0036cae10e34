//! Unified error types for the agenda workflow.
//!
//! Workflow errors are terminal and synchronous: they are returned to the
//! caller with a precise message and never retried or swallowed. Each variant
//! maps onto a response status (400/403/404/409) and a process exit code.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for agenda operations.
#[derive(Error, Debug)]
pub enum AgendaError {
    /// Malformed input: missing field, reason too short, blank committee.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The caller's permission level is below the operation's minimum.
    #[error("insufficient permission: {message}")]
    InsufficientPermission { message: String },

    /// Unknown proposal, document, or request id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Operation attempted from a status that does not permit it.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Duplicate pending request, replayed decision, or lost update race.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// I/O errors from the state file or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON or TOML serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// A repository lock was poisoned by a panicking writer.
    #[error("lock poisoned: {message}")]
    Lock { message: String },
}

/// A specialized Result type for agenda operations.
pub type Result<T> = std::result::Result<T, AgendaError>;

impl AgendaError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an insufficient permission error.
    pub fn insufficient_permission(message: impl Into<String>) -> Self {
        Self::InsufficientPermission {
            message: message.into(),
        }
    }

    /// Create a not found error for the given entity kind.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a lock error.
    pub fn lock(message: impl Into<String>) -> Self {
        Self::Lock {
            message: message.into(),
        }
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::InsufficientPermission { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::InvalidState { .. } | Self::Conflict { .. } => 409,
            Self::Storage { .. } | Self::Serde { .. } | Self::Config { .. } | Self::Lock { .. } => {
                500
            }
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.status_code() {
            400 => exit_codes::VALIDATION,
            403 => exit_codes::FORBIDDEN,
            404 => exit_codes::NOT_FOUND,
            409 => exit_codes::CONFLICT,
            _ => exit_codes::INTERNAL,
        }
    }

    /// Whether the caller can fix this by changing input or waiting for
    /// another party (as opposed to an infrastructure failure).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

impl From<io::Error> for AgendaError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for AgendaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the agenda CLI.
pub mod exit_codes {
    /// The operation succeeded.
    pub const SUCCESS: i32 = 0;

    /// Storage, serialization, or config failure.
    pub const INTERNAL: i32 = 1;

    /// Malformed input (400).
    pub const VALIDATION: i32 = 2;

    /// Permission level too low (403).
    pub const FORBIDDEN: i32 = 3;

    /// Unknown id (404).
    pub const NOT_FOUND: i32 = 4;

    /// Invalid state or conflict (409).
    pub const CONFLICT: i32 = 5;
}
