//! Declared record types.
//!
//! A `Shape` is built once per record type and then shared immutably
//! (usually from a `once_cell::sync::Lazy` static):
//!
//! ```
//! use std::sync::Arc;
//! use once_cell::sync::Lazy;
//! use shape_guard::{FieldType, Record, Shape};
//!
//! static POINT: Lazy<Arc<Shape>> = Lazy::new(|| {
//!     Shape::strict("Point")
//!         .field("x", FieldType::Integer)
//!         .field("y", FieldType::Integer)
//!         .build()
//!         .expect("valid shape")
//! });
//!
//! let point = Record::new(&POINT, [("x", 1), ("y", 2)]).unwrap();
//! assert_eq!(point.to_json(), serde_json::json!({"x": 1, "y": 2}));
//! ```
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result, StructuralError};
use crate::lower;
use crate::spec::{Declared, FieldSpec};
use crate::value::Value;

/// How unset spec flags are defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    /// Fields are optional and mutable unless declared otherwise.
    #[default]
    Guarded,
    /// Fields are required and immutable unless declared otherwise.
    Strict,
    /// `Strict`, and raw values are coerced into the declared type.
    Json,
}

#[derive(Debug)]
pub struct Shape {
    name: String,
    flavor: Flavor,
    specs: IndexMap<String, FieldSpec>,
    defaults: IndexMap<String, Value>,
}

impl Shape {
    pub fn builder(name: impl Into<String>) -> ShapeBuilder {
        ShapeBuilder {
            name: name.into(),
            flavor: Flavor::default(),
            fields: IndexMap::new(),
            defaults: Vec::new(),
        }
    }
    pub fn guarded(name: impl Into<String>) -> ShapeBuilder {
        Self::builder(name).flavor(Flavor::Guarded)
    }
    pub fn strict(name: impl Into<String>) -> ShapeBuilder {
        Self::builder(name).flavor(Flavor::Strict)
    }
    pub fn json(name: impl Into<String>) -> ShapeBuilder {
        Self::builder(name).flavor(Flavor::Json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn flavor(&self) -> Flavor {
        self.flavor
    }
    /// Effective spec of `field`, after flavor defaulting.
    pub fn spec(&self, field: &str) -> Option<&FieldSpec> {
        self.specs.get(field)
    }
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.specs.iter().map(|(name, spec)| (name.as_str(), spec))
    }
    pub fn field_names(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }
    pub fn defaults(&self) -> &IndexMap<String, Value> {
        &self.defaults
    }
    pub fn len(&self) -> usize {
        self.specs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub(crate) fn unknown_field(&self, field: &str) -> Error {
        StructuralError::UnknownField {
            shape: self.name.clone(),
            field: field.to_string(),
            available: self.field_names(),
        }
        .into()
    }
}

#[derive(Debug)]
pub struct ShapeBuilder {
    name: String,
    flavor: Flavor,
    fields: IndexMap<String, Declared>,
    defaults: Vec<(String, Value)>,
}

impl ShapeBuilder {
    pub fn flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = flavor;
        self
    }

    /// Declare a field as a bare type, a type set, a nested shape, or a full
    /// `FieldSpec`. Redeclaring a name replaces the earlier declaration.
    pub fn field(mut self, name: impl Into<String>, declared: impl Into<Declared>) -> Self {
        self.fields.insert(name.into(), declared.into());
        self
    }

    /// Value a field holds when construction does not supply one.
    pub fn default_value(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.push((name.into(), value.into()));
        self
    }

    /// Resolve the effective spec map and validate declared defaults.
    pub fn build(self) -> Result<Arc<Shape>> {
        let specs = lower::resolve_all(self.flavor, self.fields)?;
        let mut shape = Shape {
            name: self.name,
            flavor: self.flavor,
            specs,
            defaults: IndexMap::new(),
        };
        for (field, value) in self.defaults {
            let Some(spec) = shape.spec(&field) else {
                return Err(shape.unknown_field(&field));
            };
            let value = spec.admit(&field, value)?;
            shape.defaults.insert(field, value);
        }
        tracing::debug!(
            shape = %shape.name,
            flavor = ?shape.flavor,
            fields = shape.specs.len(),
            defaults = shape.defaults.len(),
            "resolved shape"
        );
        Ok(Arc::new(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConstraintError;
    use crate::ty::FieldType;

    #[test]
    fn defaults_must_name_declared_fields() {
        let error = Shape::guarded("Config")
            .field("port", FieldType::Integer)
            .default_value("host", "localhost")
            .build()
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Structural(StructuralError::UnknownField { ref field, ref available, .. })
                if field == "host" && available == &["port".to_string()]
        ));
    }

    #[test]
    fn defaults_are_validated_against_their_spec() {
        let error = Shape::guarded("Config")
            .field("port", FieldType::Integer)
            .default_value("port", "eighty")
            .build()
            .unwrap_err();
        assert!(matches!(error, Error::Constraint(ConstraintError::TypeMismatch { .. })));
    }

    #[test]
    fn json_defaults_are_coerced() {
        let shape = Shape::json("Config")
            .field("port", FieldType::Integer)
            .default_value("port", "8080")
            .build()
            .unwrap();
        assert_eq!(shape.defaults().get("port"), Some(&Value::Integer(8080)));
    }

    #[test]
    fn flavor_is_applied_once_at_build() {
        let shape = Shape::strict("Point")
            .field("x", FieldType::Integer)
            .field("y", FieldType::Integer)
            .build()
            .unwrap();
        assert_eq!(shape.flavor(), Flavor::Strict);
        assert!(shape.fields().all(|(_, spec)| spec.is_required() && spec.is_immutable()));
        assert_eq!(shape.field_names(), ["x", "y"]);
    }
}
