//! Error codes reported by the preferences engine.
//!
//! The numeric values are part of the script-facing contract: they are handed
//! to `fail` callbacks unchanged.

use thiserror::Error;

pub const E_OK: i32 = 0;
pub const E_BASE: i32 = -1000;
pub const E_ERROR: i32 = E_BASE - 1;
pub const E_KEY_EMPTY: i32 = E_BASE - 6;
pub const E_KEY_EXCEED_MAX_LENGTH: i32 = E_BASE - 7;
pub const E_VALUE_EXCEED_MAX_LENGTH: i32 = E_BASE - 8;
pub const E_KEY_EXCEED_LENGTH_LIMIT: i32 = E_BASE - 16;
pub const E_VALUE_EXCEED_LENGTH_LIMIT: i32 = E_BASE - 17;
pub const E_DEFAULT_EXCEED_LENGTH_LIMIT: i32 = E_BASE - 18;

pub type PrefsResult<T> = Result<T, PrefsError>;

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Key is empty")]
    KeyEmpty,

    #[error("Key exceeds {max} bytes")]
    KeyTooLong { max: usize },

    #[error("Value exceeds {max} bytes")]
    ValueTooLong { max: usize },

    #[error("Invalid preferences path: {0}")]
    InvalidPath(String),

    #[error("Malformed preferences file {path}: {message}")]
    Malformed { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrefsError {
    /// Numeric engine code for this error.
    pub fn code(&self) -> i32 {
        match self {
            PrefsError::KeyEmpty => E_KEY_EMPTY,
            PrefsError::KeyTooLong { .. } => E_KEY_EXCEED_MAX_LENGTH,
            PrefsError::ValueTooLong { .. } => E_VALUE_EXCEED_MAX_LENGTH,
            PrefsError::InvalidPath(_)
            | PrefsError::Malformed { .. }
            | PrefsError::Serialization(_)
            | PrefsError::Io(_) => E_ERROR,
        }
    }
}
