//! Field types and the raw-input constructors used for coercion.
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use ordered_float::OrderedFloat;

use crate::error::{ConstraintError, Error, Result};
use crate::record::Record;
use crate::shape::Shape;
use crate::value::{Value, float_to_i64};

#[derive(Clone)]
pub enum FieldType {
    Any,
    Null,
    Bool,
    Integer,
    Float,
    String,
    Timestamp,
    List,
    Map,
    /// A nested record of the given shape. Constructible from a raw mapping.
    Record(Arc<Shape>),
}

impl FieldType {
    pub fn name(&self) -> &str {
        match self {
            FieldType::Any => "any",
            FieldType::Null => "null",
            FieldType::Bool => "bool",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::String => "string",
            FieldType::Timestamp => "timestamp",
            FieldType::List => "list",
            FieldType::Map => "map",
            FieldType::Record(shape) => shape.name(),
        }
    }

    /// Look up a builtin type by its name.
    pub fn builtin(name: &str) -> Option<FieldType> {
        Some(match name {
            "any" => FieldType::Any,
            "null" => FieldType::Null,
            "bool" => FieldType::Bool,
            "integer" => FieldType::Integer,
            "float" => FieldType::Float,
            "string" => FieldType::String,
            "timestamp" => FieldType::Timestamp,
            "list" => FieldType::List,
            "map" => FieldType::Map,
            _ => return None,
        })
    }

    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::Null, Value::Null) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::Integer, Value::Integer(_)) => true,
            (FieldType::Float, Value::Float(_)) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Timestamp, Value::Timestamp(_)) => true,
            (FieldType::List, Value::List(_)) => true,
            (FieldType::Map, Value::Map(_)) => true,
            (FieldType::Record(shape), Value::Record(record)) => Arc::ptr_eq(shape, record.shape()),
            _ => false,
        }
    }

    /// Convert `value` into this type. A value that already matches is
    /// returned unchanged.
    pub fn coerce(&self, field: &str, value: Value) -> Result<Value> {
        if self.matches(&value) {
            return Ok(value);
        }
        let fail = |value: &Value, reason: &str| -> Error {
            ConstraintError::Coercion {
                field: field.to_string(),
                expected: format!("a `{}`", self.name()),
                actual: value.type_name().to_string(),
                value: value.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };
        if let FieldType::Record(shape) = self {
            return match value {
                Value::Map(raw) => Record::new(shape, raw).map(Value::from),
                other => Err(fail(&other, "nested records are built from a mapping")),
            };
        }
        let coerced = match (self, &value) {
            (FieldType::Integer, Value::Bool(b)) => Value::Integer(*b as i64),
            (FieldType::Integer, Value::Float(f)) => match float_to_i64(f.0) {
                Some(i) => Value::Integer(i),
                None => return Err(fail(&value, "out of range for a 64-bit integer")),
            },
            (FieldType::Integer, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(error) => return Err(fail(&value, &error.to_string())),
            },
            (FieldType::Float, Value::Integer(i)) => Value::Float(OrderedFloat(*i as f64)),
            (FieldType::Float, Value::Bool(b)) => Value::Float(OrderedFloat(*b as i64 as f64)),
            (FieldType::Float, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(f) => Value::Float(OrderedFloat(f)),
                Err(error) => return Err(fail(&value, &error.to_string())),
            },
            (FieldType::String, other) => Value::String(other.render()),
            (FieldType::Bool, other) => Value::Bool(other.is_truthy()),
            (FieldType::Timestamp, Value::String(s)) => match DateTime::parse_from_rfc3339(s.trim()) {
                Ok(t) => Value::Timestamp(t),
                Err(error) => return Err(fail(&value, &error.to_string())),
            },
            (FieldType::Timestamp, Value::Integer(secs)) => match DateTime::from_timestamp(*secs, 0) {
                Some(t) => Value::Timestamp(t.fixed_offset()),
                None => return Err(fail(&value, "unix timestamp out of range")),
            },
            (FieldType::List, Value::String(s)) => {
                Value::List(s.chars().map(|c| Value::String(c.to_string())).collect())
            }
            (FieldType::List, Value::Map(m)) => {
                Value::List(m.keys().map(|k| Value::String(k.clone())).collect())
            }
            (_, _) => return Err(fail(&value, "no conversion exists")),
        };
        Ok(coerced)
    }
}

impl fmt::Debug for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Record(shape) => write!(f, "Record({})", shape.name()),
            other => f.write_str(other.name()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One type, or a non-empty set of alternatives ("is one of").
#[derive(Clone, Debug)]
pub struct TypeSet(Vec<FieldType>);

impl TypeSet {
    pub fn one_of(types: impl IntoIterator<Item = FieldType>) -> Self {
        TypeSet(types.into_iter().collect())
    }
    pub fn types(&self) -> &[FieldType] {
        &self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn matches(&self, value: &Value) -> bool {
        self.0.iter().any(|ty| ty.matches(value))
    }

    /// First alternative that accepts `value` as-is wins; otherwise the
    /// first alternative whose conversion succeeds.
    pub fn coerce(&self, field: &str, value: Value) -> Result<Value> {
        if self.matches(&value) {
            return Ok(value);
        }
        let mut first_error = None;
        for ty in &self.0 {
            match ty.coerce(field, value.clone()) {
                Ok(coerced) => return Ok(coerced),
                Err(error) => {
                    first_error.get_or_insert(error);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| ConstraintError::EmptyTypeSet.into()))
    }

    /// "a `integer`" or "one of [`integer`, `null`]"; used in messages.
    pub fn describe(&self) -> String {
        match self.0.as_slice() {
            [single] => format!("a `{single}`"),
            many => format!(
                "one of [{}]",
                many.iter().map(|ty| format!("`{ty}`")).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

impl From<FieldType> for TypeSet {
    fn from(ty: FieldType) -> Self {
        TypeSet(vec![ty])
    }
}

impl From<Vec<FieldType>> for TypeSet {
    fn from(types: Vec<FieldType>) -> Self {
        TypeSet(types)
    }
}

impl<const N: usize> From<[FieldType; N]> for TypeSet {
    fn from(types: [FieldType; N]) -> Self {
        TypeSet(types.into())
    }
}

impl From<Arc<Shape>> for TypeSet {
    fn from(shape: Arc<Shape>) -> Self {
        TypeSet(vec![FieldType::Record(shape)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coerce(ty: FieldType, value: impl Into<Value>) -> Result<Value> {
        ty.coerce("f", value.into())
    }

    #[test]
    fn integer_conversions() {
        assert_eq!(coerce(FieldType::Integer, " 42 ").unwrap(), Value::Integer(42));
        assert_eq!(coerce(FieldType::Integer, 3.9).unwrap(), Value::Integer(3));
        assert_eq!(coerce(FieldType::Integer, true).unwrap(), Value::Integer(1));
        let error = coerce(FieldType::Integer, "forty").unwrap_err();
        assert!(matches!(error, Error::Constraint(ConstraintError::Coercion { .. })));
    }

    #[test]
    fn out_of_range_floats_are_not_clamped() {
        for raw in [1e30, -1e30, 9_223_372_036_854_775_808.0, f64::NAN, f64::INFINITY] {
            let error = coerce(FieldType::Integer, raw).unwrap_err();
            assert!(
                matches!(error, Error::Constraint(ConstraintError::Coercion { ref reason, .. }) if reason == "out of range for a 64-bit integer"),
                "{raw} was accepted"
            );
        }
        assert_eq!(coerce(FieldType::Integer, -9_223_372_036_854_775_808.0).unwrap(), Value::Integer(i64::MIN));
        assert_eq!(coerce(FieldType::Integer, -3.9).unwrap(), Value::Integer(-3));
    }

    #[test]
    fn string_conversion_renders_anything() {
        assert_eq!(coerce(FieldType::String, 7).unwrap(), Value::from("7"));
        assert_eq!(coerce(FieldType::String, false).unwrap(), Value::from("false"));
    }

    #[test]
    fn timestamp_from_text_and_seconds() {
        let parsed = coerce(FieldType::Timestamp, "2024-01-02T03:04:05+02:00").unwrap();
        assert_eq!(parsed.render(), "2024-01-02T03:04:05+02:00");
        let epoch = coerce(FieldType::Timestamp, 0).unwrap();
        assert_eq!(epoch.render(), "1970-01-01T00:00:00Z");
        assert!(coerce(FieldType::Timestamp, "yesterday").is_err());
    }

    #[test]
    fn null_has_no_conversions() {
        assert!(coerce(FieldType::Integer, Value::Null).is_err());
        assert_eq!(coerce(FieldType::Null, Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn type_set_prefers_exact_match() {
        let set = TypeSet::from([FieldType::String, FieldType::Integer]);
        assert_eq!(set.coerce("f", Value::from(5)).unwrap(), Value::Integer(5));
        // no exact match: first successful alternative
        assert_eq!(set.coerce("f", Value::from(true)).unwrap(), Value::from("true"));
    }

    #[test]
    fn describe_single_and_many() {
        assert_eq!(TypeSet::from(FieldType::Integer).describe(), "a `integer`");
        assert_eq!(
            TypeSet::from([FieldType::Integer, FieldType::Null]).describe(),
            "one of [`integer`, `null`]"
        );
    }
}
