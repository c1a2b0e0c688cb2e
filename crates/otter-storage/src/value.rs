//! Script values crossing the host boundary.
//!
//! `JsValue` is what the host hands to an op as arguments and what callbacks
//! receive. Function values are reference-counted handles: cloning one keeps
//! the underlying script function alive, dropping the last clone releases it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

type Callable = dyn Fn(&[JsValue]) + Send + Sync;

/// Handle to a script function
#[derive(Clone)]
pub struct JsFunction {
    inner: Arc<Callable>,
}

impl JsFunction {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[JsValue]) + Send + Sync + 'static,
    {
        Self { inner: Arc::new(f) }
    }

    /// Call the function, discarding its result
    pub fn call(&self, args: &[JsValue]) {
        (self.inner)(args)
    }

    /// Number of live handles to this function
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[Function]")
    }
}

/// Type tag of a [`JsValue`], as reported by the host's `typeof`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Function,
}

#[derive(Clone, Debug, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Object(BTreeMap<String, JsValue>),
    Function(JsFunction),
}

impl JsValue {
    /// Build an object from `(name, value)` pairs
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, JsValue)>,
    {
        JsValue::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Set a property, turning non-objects into an empty object first
    pub fn with(mut self, name: impl Into<String>, value: impl Into<JsValue>) -> Self {
        if !matches!(self, JsValue::Object(_)) {
            self = JsValue::Object(BTreeMap::new());
        }
        if let JsValue::Object(props) = &mut self {
            props.insert(name.into(), value.into());
        }
        self
    }

    pub fn type_of(&self) -> ValueType {
        match self {
            JsValue::Undefined => ValueType::Undefined,
            JsValue::Null => ValueType::Null,
            JsValue::Bool(_) => ValueType::Boolean,
            JsValue::Number(_) => ValueType::Number,
            JsValue::String(_) => ValueType::String,
            JsValue::Object(_) => ValueType::Object,
            JsValue::Function(_) => ValueType::Function,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, JsValue::Undefined)
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, JsValue::Undefined | JsValue::Null)
    }

    /// Named property of an object; `None` for missing properties and non-objects
    pub fn get(&self, name: &str) -> Option<&JsValue> {
        match self {
            JsValue::Object(props) => props.get(name),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            JsValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            JsValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            JsValue::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Host string conversion: strings pass through, anything else is `""`
    pub fn to_host_string(&self) -> String {
        self.as_str().map(str::to_string).unwrap_or_default()
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) | (JsValue::Null, JsValue::Null) => true,
            (JsValue::Bool(a), JsValue::Bool(b)) => a == b,
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => a == b,
            (JsValue::Function(a), JsValue::Function(b)) => Arc::ptr_eq(&a.inner, &b.inner),
            _ => false,
        }
    }
}

impl From<serde_json::Value> for JsValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => JsValue::Null,
            serde_json::Value::Bool(b) => JsValue::Bool(b),
            serde_json::Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => JsValue::String(s),
            serde_json::Value::Array(items) => JsValue::object(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), JsValue::from(v))),
            ),
            serde_json::Value::Object(map) => {
                JsValue::object(map.into_iter().map(|(k, v)| (k, JsValue::from(v))))
            }
        }
    }
}

impl From<&str> for JsValue {
    fn from(value: &str) -> Self {
        JsValue::String(value.to_string())
    }
}

impl From<String> for JsValue {
    fn from(value: String) -> Self {
        JsValue::String(value)
    }
}

impl From<bool> for JsValue {
    fn from(value: bool) -> Self {
        JsValue::Bool(value)
    }
}

impl From<f64> for JsValue {
    fn from(value: f64) -> Self {
        JsValue::Number(value)
    }
}

impl From<i32> for JsValue {
    fn from(value: i32) -> Self {
        JsValue::Number(value as f64)
    }
}

impl From<JsFunction> for JsValue {
    fn from(value: JsFunction) -> Self {
        JsValue::Function(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_object() {
        let value = JsValue::from(json!({ "key": "a", "n": 3, "list": ["x"] }));
        assert_eq!(value.type_of(), ValueType::Object);
        assert_eq!(value.get("key").and_then(JsValue::as_str), Some("a"));
        assert_eq!(value.get("n").and_then(JsValue::as_f64), Some(3.0));
        assert_eq!(
            value.get("list").and_then(|l| l.get("0")),
            Some(&JsValue::from("x"))
        );
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn test_host_string_conversion() {
        assert_eq!(JsValue::from("abc").to_host_string(), "abc");
        assert_eq!(JsValue::from(12).to_host_string(), "");
        assert_eq!(JsValue::Null.to_host_string(), "");
    }

    #[test]
    fn test_function_handles() {
        let f = JsFunction::new(|_| {});
        assert_eq!(f.handle_count(), 1);
        let value = JsValue::from(json!({})).with("success", f.clone());
        assert_eq!(f.handle_count(), 2);
        assert_eq!(value.get("success").map(JsValue::type_of), Some(ValueType::Function));
        drop(value);
        assert_eq!(f.handle_count(), 1);
    }
}
