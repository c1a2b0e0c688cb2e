//! Result codes handed to `fail` callbacks

use otter_prefs::errno::{
    E_DEFAULT_EXCEED_LENGTH_LIMIT, E_ERROR, E_KEY_EMPTY, E_KEY_EXCEED_LENGTH_LIMIT, E_OK,
    E_VALUE_EXCEED_LENGTH_LIMIT,
};
use std::fmt;

/// Outcome of one storage request.
///
/// Engine codes the bridge has no message for are carried as `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResultCode {
    Ok,
    Error,
    KeyEmpty,
    KeyExceedLengthLimit,
    ValueExceedLengthLimit,
    DefaultExceedLengthLimit,
    Other(i32),
}

impl ResultCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            E_OK => ResultCode::Ok,
            E_ERROR => ResultCode::Error,
            E_KEY_EMPTY => ResultCode::KeyEmpty,
            E_KEY_EXCEED_LENGTH_LIMIT => ResultCode::KeyExceedLengthLimit,
            E_VALUE_EXCEED_LENGTH_LIMIT => ResultCode::ValueExceedLengthLimit,
            E_DEFAULT_EXCEED_LENGTH_LIMIT => ResultCode::DefaultExceedLengthLimit,
            other => ResultCode::Other(other),
        }
    }

    /// Numeric code passed as the second `fail` argument
    pub fn code(self) -> i32 {
        match self {
            ResultCode::Ok => E_OK,
            ResultCode::Error => E_ERROR,
            ResultCode::KeyEmpty => E_KEY_EMPTY,
            ResultCode::KeyExceedLengthLimit => E_KEY_EXCEED_LENGTH_LIMIT,
            ResultCode::ValueExceedLengthLimit => E_VALUE_EXCEED_LENGTH_LIMIT,
            ResultCode::DefaultExceedLengthLimit => E_DEFAULT_EXCEED_LENGTH_LIMIT,
            ResultCode::Other(code) => code,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ResultCode::Ok
    }

    /// Message passed as the first `fail` argument.
    ///
    /// These strings are matched by existing scripts and must not change.
    pub fn message(self) -> &'static str {
        match self {
            ResultCode::KeyEmpty => "The key string is null or empty.",
            ResultCode::KeyExceedLengthLimit => "The key string length should shorter than 32.",
            ResultCode::ValueExceedLengthLimit => {
                "The value string length should shorter than 128."
            }
            ResultCode::DefaultExceedLengthLimit => {
                "The default string length should shorter than 128."
            }
            _ => "unknown err",
        }
    }
}

impl From<i32> for ResultCode {
    fn from(code: i32) -> Self {
        ResultCode::from_code(code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
