//! Error types for kb
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, unknown task, board not initialized)
//! - 3: Rejected by the event log (duplicate ids)
//! - 4: Operation failed (IO, serialization, lock timeout)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the kb CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const REJECTED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for board operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Board not initialized: {0}")]
    BoardNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Drop target not found: {0}")]
    UnknownDropTarget(String),

    // Rejected by the log (exit code 3)
    #[error("Task already exists: {0}")]
    DuplicateTask(String),

    #[error("Chat message already exists: {0}")]
    DuplicateMessage(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::BoardNotFound(_)
            | Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::UnknownColumn(_)
            | Error::TaskNotFound(_)
            | Error::UnknownDropTarget(_) => exit_codes::USER_ERROR,

            // Log rejections
            Error::DuplicateTask(_) | Error::DuplicateMessage(_) => exit_codes::REJECTED,

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::Watch(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured details for the JSON error envelope
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::TaskNotFound(id) | Error::UnknownDropTarget(id) | Error::DuplicateTask(id) => {
                Some(serde_json::json!({ "task_id": id }))
            }
            Error::DuplicateMessage(id) => Some(serde_json::json!({ "message_id": id })),
            Error::BoardNotFound(path) | Error::LockFailed(path) => {
                Some(serde_json::json!({ "path": path }))
            }
            _ => None,
        }
    }
}

/// Result type alias for board operations
pub type Result<T> = std::result::Result<T, Error>;
