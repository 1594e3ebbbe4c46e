//! Dynamic field values.
//!
//! `Value` is what a record stores. It mirrors the JSON data model, plus two
//! shaped leaves: timestamps and nested records.
use std::fmt;

use chrono::{DateTime, FixedOffset, SecondsFormat};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::record::Record;

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(OrderedFloat<f64>),
    String(String),
    Timestamp(DateTime<FixedOffset>),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Record(Box<Record>),
}

impl Value {
    /// Name of the value's runtime type; records report their shape name.
    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Record(record) => record.shape().name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }
    pub fn as_i64(&self) -> Option<i64> {
        match self { Value::Integer(i) => Some(*i), _ => None }
    }
    /// Integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(f.0),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self { Value::String(s) => Some(s), _ => None }
    }
    pub fn as_timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        match self { Value::Timestamp(t) => Some(t), _ => None }
    }
    pub fn as_list(&self) -> Option<&[Value]> {
        match self { Value::List(xs) => Some(xs), _ => None }
    }
    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self { Value::Map(m) => Some(m), _ => None }
    }
    pub fn as_record(&self) -> Option<&Record> {
        match self { Value::Record(r) => Some(r), _ => None }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => f.0 != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(xs) => !xs.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Timestamp(_) | Value::Record(_) => true,
        }
    }

    /// Plain text rendering: strings as-is, everything else as compact JSON.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            other => other.to_json().to_string(),
        }
    }

    /// Full JSON projection. Nested records are flattened all the way down.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Integer(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(f.0)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::String(s) => Json::String(s.clone()),
            Value::Timestamp(t) => Json::String(render_timestamp(t)),
            Value::List(xs) => Json::Array(xs.iter().map(Value::to_json).collect()),
            Value::Map(m) => Json::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Value::Record(record) => record.to_json(),
        }
    }
}

pub(crate) fn render_timestamp(t: &DateTime<FixedOffset>) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `f` truncated toward zero, if the result fits an `i64`.
pub(crate) fn float_to_i64(f: f64) -> Option<i64> {
    // 2^63; `i64::MAX as f64` rounds up to it
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    let t = f.trunc();
    (t >= -LIMIT && t < LIMIT).then_some(t as i64)
}

/// Structural equality, except that an integer equals a float holding the
/// same integral number (`2 == 2.0`).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Integer(i), Value::Float(f)) | (Value::Float(f), Value::Integer(i)) => {
                f.0.fract() == 0.0 && float_to_i64(f.0) == Some(*i)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERSIONS
// ————————————————————————————————————————————————————————————————————————————

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(|f| Value::Float(OrderedFloat(f))).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::String(s),
            Json::Array(xs) => Value::List(xs.into_iter().map(Value::from).collect()),
            Json::Object(m) => Value::Map(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}
impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}
impl From<i32> for Value {
    fn from(i: i32) -> Self { Value::Integer(i as i64) }
}
impl From<u32> for Value {
    fn from(i: u32) -> Self { Value::Integer(i as i64) }
}
impl From<f64> for Value {
    fn from(f: f64) -> Self { Value::Float(OrderedFloat(f)) }
}
impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}
impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}
impl From<DateTime<FixedOffset>> for Value {
    fn from(t: DateTime<FixedOffset>) -> Self { Value::Timestamp(t) }
}
impl From<Vec<Value>> for Value {
    fn from(xs: Vec<Value>) -> Self { Value::List(xs) }
}
impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self { Value::Map(m) }
}
impl From<Record> for Value {
    fn from(r: Record) -> Self { Value::Record(Box::new(r)) }
}

// ————————————————————————————————————————————————————————————————————————————
// SERDE
// ————————————————————————————————————————————————————————————————————————————

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(f.0),
            Value::String(s) => serializer.serialize_str(s),
            Value::Timestamp(t) => serializer.serialize_str(&render_timestamp(t)),
            Value::List(xs) => {
                let mut seq = serializer.serialize_seq(Some(xs.len()))?;
                for x in xs {
                    seq.serialize_element(x)?;
                }
                seq.end()
            }
            Value::Map(m) => {
                let mut map = serializer.serialize_map(Some(m.len()))?;
                for (k, v) in m {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Value::Record(record) => record.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_split_into_integer_and_float() {
        assert_eq!(Value::from(json!(3)), Value::Integer(3));
        assert_eq!(Value::from(json!(3.5)), Value::Float(OrderedFloat(3.5)));
        // too large for i64
        assert!(matches!(Value::from(json!(u64::MAX)), Value::Float(_)));
    }

    #[test]
    fn integral_floats_equal_integers() {
        assert_eq!(Value::from(2), Value::from(2.0));
        assert_eq!(Value::from(2.0), Value::from(2));
        assert_ne!(Value::from(2), Value::from(2.5));
        assert_ne!(Value::from(i64::MAX), Value::from(i64::MAX as f64));
        assert_ne!(Value::from(1), Value::from(true));
        assert_eq!(Value::from(json!({"r": [1]})), Value::from(json!({"r": [1.0]})));
    }

    #[test]
    fn to_json_preserves_nesting() {
        let raw = json!({"a": [1, "two", null], "b": {"c": true, "d": 1.25}});
        assert_eq!(Value::from(raw.clone()).to_json(), raw);
    }

    #[test]
    fn render_leaves_strings_unquoted() {
        assert_eq!(Value::from("abc").render(), "abc");
        assert_eq!(Value::from("abc").to_string(), "\"abc\"");
        assert_eq!(Value::from(vec![Value::from(1), Value::Null]).render(), "[1,null]");
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from(0.5).is_truthy());
        assert!(Value::from(vec![Value::Null]).is_truthy());
    }

    #[test]
    fn timestamps_serialize_as_rfc3339() {
        let t = DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z").unwrap();
        assert_eq!(Value::from(t).to_json(), json!("2024-05-01T12:30:00Z"));
        let text = serde_json::to_string(&Value::from(t)).unwrap();
        assert_eq!(text, "\"2024-05-01T12:30:00Z\"");
    }
}
