//! Scalar values storable in a document.
//!
//! This is the closed set of leaf values a register or sequence element
//! can hold. Branch values (child maps, lists, text, counters) are not
//! values; they are objects referenced by id, created with `MakeObject`.
//!
//! Scalar type fidelity is preserved end to end: a `Bool` written as a
//! mark value is still a `Bool` after save/load, never a string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive values in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// Null/empty value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed 64-bit integer
    Int(i64),
    /// Unsigned 64-bit integer
    Uint(u64),
    /// 64-bit float
    F64(f64),
    /// UTF-8 string
    Str(String),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Counter total (the sum of increments, see `object::register`)
    Counter(i64),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
}

impl ScalarValue {
    /// Returns the type name as a string, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScalarValue::Null => "null",
            ScalarValue::Bool(_) => "bool",
            ScalarValue::Int(_) => "int",
            ScalarValue::Uint(_) => "uint",
            ScalarValue::F64(_) => "f64",
            ScalarValue::Str(_) => "str",
            ScalarValue::Bytes(_) => "bytes",
            ScalarValue::Counter(_) => "counter",
            ScalarValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Attempts to convert to a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to convert to a signed integer.
    ///
    /// `Int`, `Counter` and `Timestamp` all read as integers; `Uint` does
    /// when it fits.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ScalarValue::Int(n) | ScalarValue::Counter(n) | ScalarValue::Timestamp(n) => Some(*n),
            ScalarValue::Uint(n) => i64::try_from(*n).ok(),
            _ => None,
        }
    }

    /// Attempts to convert to a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to convert to raw bytes
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ScalarValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// JSON export of this value. Bytes render as an array of numbers,
    /// counters and timestamps as plain integers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ScalarValue::Null => serde_json::Value::Null,
            ScalarValue::Bool(b) => serde_json::Value::Bool(*b),
            ScalarValue::Int(n) | ScalarValue::Counter(n) | ScalarValue::Timestamp(n) => {
                serde_json::Value::from(*n)
            }
            ScalarValue::Uint(n) => serde_json::Value::from(*n),
            ScalarValue::F64(x) => serde_json::Number::from_f64(*x)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ScalarValue::Str(s) => serde_json::Value::String(s.clone()),
            ScalarValue::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|x| serde_json::Value::from(*x)).collect())
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "null"),
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Int(n) => write!(f, "{n}"),
            ScalarValue::Uint(n) => write!(f, "{n}"),
            ScalarValue::F64(x) => write!(f, "{x}"),
            ScalarValue::Str(s) => write!(f, "{s}"),
            ScalarValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            ScalarValue::Counter(n) => write!(f, "{n}"),
            ScalarValue::Timestamp(n) => write!(f, "{n}"),
        }
    }
}

// Convenient From implementations for common types
impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Bool(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Int(value)
    }
}

impl From<i32> for ScalarValue {
    fn from(value: i32) -> Self {
        ScalarValue::Int(value as i64)
    }
}

impl From<u64> for ScalarValue {
    fn from(value: u64) -> Self {
        ScalarValue::Uint(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::F64(value)
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Str(value)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Str(value.to_string())
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(value: Vec<u8>) -> Self {
        ScalarValue::Bytes(value)
    }
}
