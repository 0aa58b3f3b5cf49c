//! # Record Values
//!
//! Generic nested key/value tree used for every replicated record.
//!
//! ## Why Not Static Types?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The set of fields per entity is configuration (a GraphQL selection),  │
//! │  not code. Records therefore stay a closed sum type:                   │
//! │                                                                         │
//! │     Value::Null                                                         │
//! │     Value::Scalar(Bool | Int | Float | Text)                            │
//! │     Value::Object(key → Value)        keys unique per level             │
//! │     Value::Array([Value])                                               │
//! │                                                                         │
//! │  Columns are derived by flattening (see `row`), never by a struct.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value as Json;

// =============================================================================
// Scalar
// =============================================================================

/// A leaf value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(x: f64) -> Self {
        Scalar::Float(x)
    }
}

// =============================================================================
// Value
// =============================================================================

/// A nested record value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Scalar(Scalar),
    Object(BTreeMap<String, Value>),
    Array(Vec<Value>),
}

impl Value {
    /// Builds an object from key/value pairs. Later duplicates win.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Shorthand for a text scalar.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Scalar(Scalar::Text(s.into()))
    }

    /// Shorthand for an integer scalar.
    pub fn int(i: i64) -> Self {
        Value::Scalar(Scalar::Int(i))
    }

    /// Returns true for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Looks up a top-level key of an object. `None` for non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Returns the text of a text scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(Scalar::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns the scalar if this is a leaf.
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns a copy of this record with `key` set at the first level.
    ///
    /// Non-object values are returned unchanged.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Value::Object(map) = &mut self {
            map.insert(key.into(), value);
        }
        self
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

// =============================================================================
// JSON Conversions
// =============================================================================

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Scalar(Scalar::Bool(b)),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Scalar(Scalar::Int(i)),
                // u64 beyond i64::MAX and real numbers
                None => Value::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Json::String(s) => Value::Scalar(Scalar::Text(s)),
            Json::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Json {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Json::Null,
            Value::Scalar(Scalar::Bool(b)) => Json::Bool(*b),
            Value::Scalar(Scalar::Int(i)) => Json::from(*i),
            Value::Scalar(Scalar::Float(x)) => {
                serde_json::Number::from_f64(*x).map_or(Json::Null, Json::Number)
            }
            Value::Scalar(Scalar::Text(s)) => Json::String(s.clone()),
            Value::Array(items) => Json::Array(items.iter().map(Json::from).collect()),
            Value::Object(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Json::from(v)))
                    .collect(),
            ),
        }
    }
}
