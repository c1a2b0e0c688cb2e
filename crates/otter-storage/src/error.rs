//! Error types for otter-storage
//!
//! Domain failures (bad key, store unavailable) never show up here: they are
//! reported to script code through the `fail` callback. These errors are the
//! ones the host raises as exceptions.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Raised to script code as a `TypeError`
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Async work queued without a Tokio runtime to run it on
    #[error("Async work queued without Tokio runtime")]
    NoRuntime,

    /// The application context could not resolve a directory
    #[error("Context error: {0}")]
    Context(String),

    #[error("Unknown op: {0}")]
    UnknownOp(String),

    #[error("Op already registered: {0}")]
    DuplicateOp(String),
}

impl StorageError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError(message.into())
    }

    pub fn context(message: impl Into<String>) -> Self {
        Self::Context(message.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
