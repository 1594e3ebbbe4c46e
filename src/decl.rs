//! Shape declarations read from a JSON document.
//!
//! ```json
//! {
//!   "shapes": {
//!     "Point": { "flavor": "strict", "fields": { "x": "integer", "y": "integer" } },
//!     "Route": {
//!       "flavor": "json",
//!       "fields": {
//!         "from": "Point",
//!         "to": "Point",
//!         "label": { "type": ["string", "null"], "required": false, "pattern": "^[a-z]+$" }
//!       },
//!       "defaults": { "label": "main" }
//!     }
//!   }
//! }
//! ```
//!
//! A field is either a type (a builtin name, another shape's name, or a list
//! of them) or a spec object. `pattern`, `minimum` and `maximum` compile into
//! the field's predicate: strings must match `pattern`; numbers are bounded by
//! value, strings, lists and maps by length. Builtin type names cannot be
//! used as shape names.
//!
//! Loading is one-way; shapes are never written back out.
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::error::{ConstraintError, Error};
use crate::path_de;
use crate::shape::{Flavor, Shape};
use crate::spec::{Declared, FieldSpec, Predicate};
use crate::ty::{FieldType, TypeSet};
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Error, Debug)]
pub enum DeclarationError {
    #[error("invalid declaration document {0}")]
    Parse(#[source] ConstraintError),

    #[error("`{shape}` refers to unknown type `{name}`")]
    UnknownType { shape: String, name: String },

    #[error("shape name `{name}` is reserved for a builtin type")]
    ReservedName { name: String },

    #[error("shapes refer to each other in a cycle: {}", .chain.join(" → "))]
    Cycle { chain: Vec<String> },

    #[error("`{shape}.{field}`: invalid pattern: {message}")]
    Pattern {
        shape: String,
        field: String,
        message: String,
    },

    #[error("`{shape}.{field}`: {source}")]
    Field {
        shape: String,
        field: String,
        #[source]
        source: Error,
    },

    #[error("`{shape}`: {source}")]
    Shape {
        shape: String,
        #[source]
        source: Error,
    },
}

/// Every shape of a declaration document, resolved.
#[derive(Debug, Default)]
pub struct Declarations {
    shapes: IndexMap<String, Arc<Shape>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    shapes: IndexMap<String, RawShape>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawShape {
    #[serde(default)]
    flavor: Flavor,
    fields: IndexMap<String, RawField>,
    #[serde(default)]
    defaults: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawField {
    Bare(RawTypes),
    Spec(RawSpec),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTypes {
    One(String),
    Many(Vec<String>),
}

/// Flags and choices stay untyped here so they can be checked with
/// constraint errors instead of parse errors.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    #[serde(rename = "type")]
    types: RawTypes,
    required: Option<serde_json::Value>,
    immutable: Option<serde_json::Value>,
    coerce: Option<serde_json::Value>,
    choices: Option<serde_json::Value>,
    pattern: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl FromStr for Declarations {
    type Err = DeclarationError;

    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let raw = path_de::from_str_with_path::<RawDocument>(src).map_err(DeclarationError::Parse)?;
        if let Some(name) = raw.shapes.keys().find(|name| FieldType::builtin(name).is_some()) {
            return Err(DeclarationError::ReservedName { name: name.clone() });
        }
        let mut resolver = Resolver {
            raw: &raw.shapes,
            done: IndexMap::new(),
            visiting: Vec::new(),
        };
        for name in raw.shapes.keys() {
            resolver.resolve_shape(name, name)?;
        }
        // report shapes in declaration order, not dependency order
        let shapes = raw
            .shapes
            .keys()
            .filter_map(|name| resolver.done.get(name).map(|shape| (name.clone(), Arc::clone(shape))))
            .collect();
        Ok(Declarations { shapes })
    }
}

impl Declarations {
    pub fn get(&self, name: &str) -> Option<&Arc<Shape>> {
        self.shapes.get(name)
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shapes.keys().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.shapes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

struct Resolver<'a> {
    raw: &'a IndexMap<String, RawShape>,
    done: IndexMap<String, Arc<Shape>>,
    visiting: Vec<String>,
}

impl Resolver<'_> {
    fn resolve_shape(&mut self, referrer: &str, name: &str) -> Result<Arc<Shape>, DeclarationError> {
        if let Some(shape) = self.done.get(name) {
            return Ok(Arc::clone(shape));
        }
        if let Some(start) = self.visiting.iter().position(|n| n == name) {
            let mut chain = self.visiting[start..].to_vec();
            chain.push(name.to_string());
            return Err(DeclarationError::Cycle { chain });
        }
        let raw_shapes = self.raw;
        let Some(raw) = raw_shapes.get(name) else {
            return Err(DeclarationError::UnknownType {
                shape: referrer.to_string(),
                name: name.to_string(),
            });
        };

        self.visiting.push(name.to_string());
        let mut builder = Shape::builder(name).flavor(raw.flavor);
        for (field, raw_field) in &raw.fields {
            let declared = self.lower_field(name, field, raw_field)?;
            builder = builder.field(field, declared);
        }
        for (field, value) in &raw.defaults {
            builder = builder.default_value(field, Value::from(value.clone()));
        }
        let shape = builder.build().map_err(|source| DeclarationError::Shape {
            shape: name.to_string(),
            source,
        })?;
        self.visiting.pop();

        self.done.insert(name.to_string(), Arc::clone(&shape));
        Ok(shape)
    }

    fn type_set(&mut self, shape: &str, raw: &RawTypes) -> Result<TypeSet, DeclarationError> {
        let names = match raw {
            RawTypes::One(name) => std::slice::from_ref(name),
            RawTypes::Many(names) => names.as_slice(),
        };
        let mut types = Vec::with_capacity(names.len());
        for name in names {
            let ty = match FieldType::builtin(name) {
                Some(builtin) => builtin,
                None => FieldType::Record(self.resolve_shape(shape, name)?),
            };
            types.push(ty);
        }
        Ok(TypeSet::from(types))
    }

    fn lower_field(&mut self, shape: &str, field: &str, raw: &RawField) -> Result<Declared, DeclarationError> {
        let in_field = |source: Error| DeclarationError::Field {
            shape: shape.to_string(),
            field: field.to_string(),
            source,
        };
        let spec = match raw {
            RawField::Bare(types) => return Ok(Declared::Bare(self.type_set(shape, types)?)),
            RawField::Spec(spec) => spec,
        };
        let mut builder = FieldSpec::builder(self.type_set(shape, &spec.types)?);
        if let Some(required) = flag("required", &spec.required).map_err(|e| in_field(e.into()))? {
            builder = builder.required(required);
        }
        if let Some(immutable) = flag("immutable", &spec.immutable).map_err(|e| in_field(e.into()))? {
            builder = builder.immutable(immutable);
        }
        if let Some(coerce) = flag("coerce", &spec.coerce).map_err(|e| in_field(e.into()))? {
            builder = builder.coerce(coerce);
        }
        match &spec.choices {
            None => {}
            Some(serde_json::Value::Array(choices)) => {
                builder = builder.choices(choices.iter().cloned().map(Value::from));
            }
            Some(other) => {
                return Err(in_field(
                    ConstraintError::NotAList {
                        attribute: "choices".to_string(),
                        actual: Value::from(other.clone()).type_name().to_string(),
                    }
                    .into(),
                ));
            }
        }
        if let Some(predicate) = compile_predicate(shape, field, spec)? {
            builder = builder.with_predicate(predicate);
        }
        builder.build().map(Declared::Spec).map_err(in_field)
    }
}

fn flag(attribute: &str, raw: &Option<serde_json::Value>) -> Result<Option<bool>, ConstraintError> {
    match raw {
        None => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ConstraintError::NotABoolean {
            attribute: attribute.to_string(),
            actual: Value::from(other.clone()).type_name().to_string(),
        }),
    }
}

fn compile_predicate(shape: &str, field: &str, spec: &RawSpec) -> Result<Option<Predicate>, DeclarationError> {
    let pattern = match spec.pattern.as_deref() {
        None => None,
        Some(src) => Some(Regex::new(src).map_err(|error| DeclarationError::Pattern {
            shape: shape.to_string(),
            field: field.to_string(),
            message: error.to_string(),
        })?),
    };
    let (minimum, maximum) = (spec.minimum, spec.maximum);
    if pattern.is_none() && minimum.is_none() && maximum.is_none() {
        return Ok(None);
    }
    Ok(Some(Predicate::new(move |value: &Value| {
        if let (Some(rx), Some(text)) = (&pattern, value.as_str()) {
            if !rx.is_match(text) {
                return false;
            }
        }
        let measure = match value {
            Value::Integer(_) | Value::Float(_) => value.as_f64(),
            Value::String(s) => Some(s.chars().count() as f64),
            Value::List(xs) => Some(xs.len() as f64),
            Value::Map(m) => Some(m.len() as f64),
            _ => None,
        };
        match measure {
            Some(n) => minimum.map_or(true, |min| n >= min) && maximum.map_or(true, |max| n <= max),
            None => true,
        }
    })))
}
