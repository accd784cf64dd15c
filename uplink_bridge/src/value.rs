//! Host runtime values
//!
//! The bridge speaks to its host in dynamically shaped values: the
//! arguments of every call and every resolved result are a `Value`.

use std::collections::BTreeMap;

use crate::buffer::HostBuffer;
use crate::error::StorageError;
use crate::registry::HandleRef;

pub type Map = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Buffer(HostBuffer),
    Array(Vec<Value>),
    Object(Map),
    Handle(HandleRef),
    Error(StorageError),
}

impl Value {
    /// Build an object from `(key, value)` pairs.
    pub fn object<'a>(entries: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Self::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Buffer(_) => "buffer",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Handle(_) => "handle",
            Self::Error(_) => "error",
        }
    }

    #[must_use]
    pub fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Integral numbers only.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 => {
                Some(*n as i64)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn as_handle(&self) -> Option<HandleRef> {
        match self {
            Self::Handle(h) => Some(*h),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&StorageError> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Property of an object value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u64> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_precision_loss)]
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<HostBuffer> for Value {
    fn from(buffer: HostBuffer) -> Self {
        Self::Buffer(buffer)
    }
}

impl From<HandleRef> for Value {
    fn from(handle: HandleRef) -> Self {
        Self::Handle(handle)
    }
}

impl From<StorageError> for Value {
    fn from(error: StorageError) -> Self {
        Self::Error(error)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_must_be_integral() {
        assert_eq!(Value::Number(3.0).as_i64(), Some(3));
        assert_eq!(Value::Number(-1.0).as_i64(), Some(-1));
        assert_eq!(Value::Number(1.5).as_i64(), None);
        assert_eq!(Value::Number(f64::NAN).as_i64(), None);
        assert_eq!(Value::from("3").as_i64(), None);
    }

    #[test]
    fn object_builder_and_lookup() {
        let value = Value::object([("name", Value::from("b")), ("created", Value::from(5i64))]);
        assert_eq!(value.get("name").and_then(Value::as_str), Some("b"));
        assert_eq!(value.get("created").and_then(Value::as_i64), Some(5));
        assert!(value.get("missing").is_none());
    }

    #[test]
    fn none_becomes_null() {
        assert_eq!(Value::from(None::<String>), Value::Null);
        assert!(Value::Null.is_nullish());
        assert!(Value::Undefined.is_nullish());
    }
}
