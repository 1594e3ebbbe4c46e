//! Guarded records.
//!
//! Every write goes through [`Record::set`] (or construction), every removal
//! through [`Record::delete`]; both are checked against the record's shape.
//! The assignment pipeline, in order:
//!
//! 1. unknown field → `StructuralError::UnknownField`
//! 2. coercion, when the spec asks for it
//! 3. type check
//! 4. immutability
//! 5. choices
//! 6. predicate
//! 7. commit
//!
//! A failing stage leaves the record untouched.
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::{ConstraintError, Mutation, Result, StructuralError};
use crate::path_de;
use crate::shape::Shape;
use crate::value::Value;

#[derive(Clone)]
pub struct Record {
    shape: Arc<Shape>,
    values: IndexMap<String, Value>,
    /// Fields whose current value is the shape's declared default.
    defaulted: HashSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Construct,
    Update,
}

impl Record {
    /// Build a record from keyword-style values.
    ///
    /// Declared defaults are seeded first; `Null` inputs count as "not
    /// supplied". After every value is assigned, all required fields must be
    /// present, otherwise one error lists every missing field.
    pub fn new<I, K, V>(shape: &Arc<Shape>, fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = Record {
            shape: Arc::clone(shape),
            values: shape.defaults().clone(),
            defaulted: shape.defaults().keys().cloned().collect(),
        };
        for (field, value) in fields {
            let value = value.into();
            if value.is_null() {
                continue;
            }
            record.assign(field.into(), value, Phase::Construct)?;
        }
        record.check_required()?;
        Ok(record)
    }

    /// Build a record from one raw mapping, e.g. a parsed JSON document.
    ///
    /// The entries are copied out of `document` and assigned like keyword
    /// values; with a `Json` shape each one is coerced into its declared type,
    /// so nested objects become nested records.
    pub fn from_document(shape: &Arc<Shape>, document: &serde_json::Value) -> Result<Self> {
        let serde_json::Value::Object(raw) = document else {
            return Err(ConstraintError::NotAMapping {
                shape: shape.name().to_string(),
                actual: json_type_name(document).to_string(),
            }
            .into());
        };
        Record::new(shape, raw.iter().map(|(k, v)| (k.clone(), Value::from(v.clone()))))
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    // ————————————————————————————————————————————————————————————————————————
    // MUTATION
    // ————————————————————————————————————————————————————————————————————————

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.assign(field.into(), value.into(), Phase::Update)
    }

    /// Remove the value of a mutable field. Returns the removed value, if
    /// the field held one.
    pub fn delete(&mut self, field: &str) -> Result<Option<Value>> {
        let Some(spec) = self.shape.spec(field) else {
            return Err(self.shape.unknown_field(field));
        };
        if spec.is_immutable() {
            tracing::debug!(shape = %self.shape.name(), field, "rejected delete of immutable field");
            return Err(StructuralError::Immutable {
                shape: self.shape.name().to_string(),
                field: field.to_string(),
                op: Mutation::Delete,
                from_default: self.defaulted.contains(field),
            }
            .into());
        }
        self.defaulted.remove(field);
        Ok(self.values.shift_remove(field))
    }

    fn assign(&mut self, field: String, value: Value, phase: Phase) -> Result<()> {
        self.run_pipeline(&field, value, phase).inspect_err(|error| {
            tracing::debug!(shape = %self.shape.name(), field = %field, %error, "rejected assignment");
        })
    }

    fn run_pipeline(&mut self, field: &str, value: Value, phase: Phase) -> Result<()> {
        let shape = Arc::clone(&self.shape);
        let Some(spec) = shape.spec(field) else {
            return Err(shape.unknown_field(field));
        };
        let value = spec.coerce_value(field, value)?;
        spec.check_type(field, &value)?;
        if spec.is_immutable() && self.values.contains_key(field) {
            // a declared default may be replaced once, while constructing
            let replacing_default = phase == Phase::Construct && self.defaulted.contains(field);
            if !replacing_default {
                return Err(StructuralError::Immutable {
                    shape: shape.name().to_string(),
                    field: field.to_string(),
                    op: Mutation::Assign,
                    from_default: self.defaulted.contains(field),
                }
                .into());
            }
        }
        spec.check_choice(field, &value)?;
        spec.check_predicate(field, &value)?;

        tracing::trace!(shape = %shape.name(), field, value = %value, "assigned");
        self.defaulted.remove(field);
        self.values.insert(field.to_string(), value);
        Ok(())
    }

    /// Fail with every required field that has no value.
    pub fn check_required(&self) -> Result<()> {
        let missing = self
            .shape
            .fields()
            .filter(|(name, spec)| spec.is_required() && !self.values.contains_key(*name))
            .map(|(name, _)| name.to_string())
            .collect::<Vec<_>>();
        if missing.is_empty() {
            return Ok(());
        }
        Err(StructuralError::MissingRequired {
            shape: self.shape.name().to_string(),
            fields: missing,
        }
        .into())
    }

    // ————————————————————————————————————————————————————————————————————————
    // READS
    // ————————————————————————————————————————————————————————————————————————

    pub fn get(&self, field: &str) -> Result<&Value> {
        if self.shape.spec(field).is_none() {
            return Err(self.shape.unknown_field(field));
        }
        self.values.get(field).ok_or_else(|| {
            StructuralError::Unset {
                shape: self.shape.name().to_string(),
                field: field.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, field: &str) -> bool {
        self.values.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Every field holding a value, in declaration order.
    pub fn attributes(&self) -> IndexMap<&str, &Value> {
        self.shape
            .fields()
            .filter_map(|(name, _)| self.values.get(name).map(|value| (name, value)))
            .collect()
    }

    /// Like [`Record::attributes`], with nested records replaced by their
    /// own attributes. Only one level is flattened.
    pub fn flattened(&self) -> IndexMap<String, Value> {
        self.attributes()
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Value::Record(child) => Value::Map(
                        child
                            .attributes()
                            .into_iter()
                            .map(|(k, v)| (k.to_string(), v.clone()))
                            .collect(),
                    ),
                    other => other.clone(),
                };
                (name.to_string(), value)
            })
            .collect()
    }

    /// JSON projection; nested records are flattened all the way down.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.attributes()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_json()))
                .collect(),
        )
    }

    /// Project the record onto a serde type.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(path_de::from_value_with_path(self.to_json())?)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value as Json;
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(n) if n.is_i64() => "integer",
        Json::Number(_) => "float",
        Json::String(_) => "string",
        Json::Array(_) => "list",
        Json::Object(_) => "map",
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shape, &other.shape) && self.values == other.values
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct(self.shape.name());
        for (name, value) in self.attributes() {
            out.field(name, value);
        }
        out.finish()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let attributes = self.attributes();
        let mut map = serializer.serialize_map(Some(attributes.len()))?;
        for (name, value) in attributes {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
