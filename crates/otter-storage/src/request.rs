//! Parsing of the options object passed to every storage op

use crate::code::ResultCode;
use crate::error::{StorageError, StorageResult};
use crate::value::{JsFunction, JsValue, ValueType};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Set,
    Delete,
    Clear,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Get,
        Operation::Set,
        Operation::Delete,
        Operation::Clear,
    ];

    /// Script-visible function name
    pub fn name(self) -> &'static str {
        match self {
            Operation::Get => "get",
            Operation::Set => "set",
            Operation::Delete => "delete",
            Operation::Clear => "clear",
        }
    }

    fn uses_key(self) -> bool {
        !matches!(self, Operation::Clear)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Script callbacks registered for one request.
///
/// Owned by the request and dropped with it, whichever branch ran.
#[derive(Debug, Default)]
pub struct Callbacks {
    pub success: Option<JsFunction>,
    pub fail: Option<JsFunction>,
    pub complete: Option<JsFunction>,
}

/// One storage request, from parse to completion
#[derive(Debug)]
pub struct Request {
    pub(crate) op: Operation,
    pub(crate) key: String,
    pub(crate) value: String,
    pub(crate) default: String,
    pub(crate) callbacks: Callbacks,
    pub(crate) code: ResultCode,
    /// String handed to `success`
    pub(crate) output: String,
}

impl Request {
    /// Parse the op arguments.
    ///
    /// Errors here are thrown to the caller synchronously. A missing or empty
    /// key is not one of them: it marks the request `KeyEmpty` and surfaces
    /// through `fail` like any other domain error.
    pub fn parse(op: Operation, args: &[JsValue]) -> StorageResult<Self> {
        let [options] = args else {
            return Err(StorageError::type_error("Not enough arguments, expected 1."));
        };
        if options.type_of() != ValueType::Object {
            return Err(StorageError::type_error(
                "Wrong argument type, object expected.",
            ));
        }

        let key = parse_string(options, "key");
        let value = parse_string(options, "value");
        let default = parse_string(options, "default");

        let callbacks = Callbacks {
            success: parse_function(options, "success")?,
            fail: parse_function(options, "fail")?,
            complete: parse_function(options, "complete")?,
        };

        let code = if op.uses_key() && key.is_empty() {
            ResultCode::KeyEmpty
        } else {
            ResultCode::Error
        };

        Ok(Self {
            op,
            key,
            value,
            default,
            callbacks,
            code,
            output: String::new(),
        })
    }

    pub fn op(&self) -> Operation {
        self.op
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn code(&self) -> ResultCode {
        self.code
    }
}

fn parse_string(options: &JsValue, name: &str) -> String {
    options.get(name).map(JsValue::to_host_string).unwrap_or_default()
}

fn parse_function(options: &JsValue, name: &str) -> StorageResult<Option<JsFunction>> {
    match options.get(name) {
        None => Ok(None),
        Some(value) if value.is_nullish() => Ok(None),
        Some(JsValue::Function(f)) => Ok(Some(f.clone())),
        Some(_) => Err(StorageError::type_error(
            "Wrong argument, function expected.",
        )),
    }
}
