//! Per-field constraint bundles.
use std::fmt;
use std::sync::Arc;

use crate::error::{ConstraintError, Error, Result};
use crate::shape::Shape;
use crate::ty::{FieldType, TypeSet};
use crate::value::Value;

/// A single-argument check run on every assigned value.
///
/// The function may return anything convertible into a [`Value`]; only
/// `Value::Bool` is a valid answer; any other return is reported as
/// [`ConstraintError::PredicateNotBool`].
#[derive(Clone)]
pub struct Predicate(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

impl Predicate {
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&Value) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Predicate(Arc::new(move |value: &Value| -> Value { f(value).into() }))
    }

    pub fn call(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Predicate(..)")
    }
}

/// The validated contract of one field.
///
/// `required`, `immutable` and `coerce` are tri-state: `None` defers to the
/// owning shape's flavor (see [`crate::shape::Flavor`]).
#[derive(Clone, Debug)]
pub struct FieldSpec {
    types: TypeSet,
    required: Option<bool>,
    immutable: Option<bool>,
    choices: Option<Vec<Value>>,
    predicate: Option<Predicate>,
    coerce: Option<bool>,
}

impl FieldSpec {
    pub fn builder(types: impl Into<TypeSet>) -> FieldSpecBuilder {
        FieldSpecBuilder {
            types: types.into(),
            required: None,
            immutable: None,
            choices: None,
            predicate: None,
            coerce: None,
        }
    }

    /// The spec a bare type declaration stands for.
    pub fn bare(types: impl Into<TypeSet>) -> Result<Self> {
        Self::builder(types).build()
    }

    pub fn types(&self) -> &TypeSet { &self.types }
    pub fn required(&self) -> Option<bool> { self.required }
    pub fn immutable(&self) -> Option<bool> { self.immutable }
    pub fn coerce(&self) -> Option<bool> { self.coerce }
    pub fn choices(&self) -> Option<&[Value]> { self.choices.as_deref() }
    pub fn predicate(&self) -> Option<&Predicate> { self.predicate.as_ref() }

    pub fn is_required(&self) -> bool { self.required.unwrap_or(false) }
    pub fn is_immutable(&self) -> bool { self.immutable.unwrap_or(false) }
    pub fn coerces(&self) -> bool { self.coerce.unwrap_or(false) }

    /// Copy with unset flags filled in; explicit flags win.
    pub(crate) fn with_defaults(
        self,
        required: Option<bool>,
        immutable: Option<bool>,
        coerce: Option<bool>,
    ) -> Self {
        FieldSpec {
            required: self.required.or(required),
            immutable: self.immutable.or(immutable),
            coerce: self.coerce.or(coerce),
            ..self
        }
    }

    // ————————————————————————————————————————————————————————————————————————
    // PIPELINE STAGES (order is owned by `Record::assign`)
    // ————————————————————————————————————————————————————————————————————————

    pub(crate) fn coerce_value(&self, field: &str, value: Value) -> Result<Value> {
        if self.coerces() {
            self.types.coerce(field, value)
        } else {
            Ok(value)
        }
    }

    pub(crate) fn check_type(&self, field: &str, value: &Value) -> Result<()> {
        if self.types.matches(value) {
            return Ok(());
        }
        Err(ConstraintError::TypeMismatch {
            field: field.to_string(),
            expected: self.types.describe(),
            actual: value.type_name().to_string(),
            value: value.to_string(),
        }
        .into())
    }

    pub(crate) fn check_choice(&self, field: &str, value: &Value) -> Result<()> {
        let Some(choices) = &self.choices else { return Ok(()) };
        if choices.contains(value) {
            return Ok(());
        }
        Err(ConstraintError::InvalidChoice {
            field: field.to_string(),
            actual: value.type_name().to_string(),
            value: value.to_string(),
            choices: choices.iter().map(Value::to_string).collect(),
        }
        .into())
    }

    pub(crate) fn check_predicate(&self, field: &str, value: &Value) -> Result<()> {
        let Some(predicate) = &self.predicate else { return Ok(()) };
        match predicate.call(value) {
            Value::Bool(true) => Ok(()),
            Value::Bool(false) => Err(ConstraintError::PredicateFailed {
                field: field.to_string(),
                actual: value.type_name().to_string(),
                value: value.to_string(),
            }
            .into()),
            other => Err(ConstraintError::PredicateNotBool {
                field: field.to_string(),
                returned: other.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Every stage except immutability; used for declared defaults.
    pub(crate) fn admit(&self, field: &str, value: Value) -> Result<Value> {
        let value = self.coerce_value(field, value)?;
        self.check_type(field, &value)?;
        self.check_choice(field, &value)?;
        self.check_predicate(field, &value)?;
        Ok(value)
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpecBuilder {
    types: TypeSet,
    required: Option<bool>,
    immutable: Option<bool>,
    choices: Option<Vec<Value>>,
    predicate: Option<Predicate>,
    coerce: Option<bool>,
}

impl FieldSpecBuilder {
    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }
    pub fn immutable(mut self, immutable: bool) -> Self {
        self.immutable = Some(immutable);
        self
    }
    pub fn coerce(mut self, coerce: bool) -> Self {
        self.coerce = Some(coerce);
        self
    }
    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }
    pub fn predicate<F, R>(mut self, f: F) -> Self
    where
        F: Fn(&Value) -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        self.predicate = Some(Predicate::new(f));
        self
    }
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Validate eagerly: non-empty type set, every choice of a declared type.
    pub fn build(self) -> Result<FieldSpec> {
        if self.types.is_empty() {
            return Err(Error::Constraint(ConstraintError::EmptyTypeSet));
        }
        if let Some(choices) = &self.choices {
            if let Some(bad) = choices.iter().find(|choice| !self.types.matches(choice)) {
                return Err(ConstraintError::ChoiceTypeMismatch {
                    choice: bad.to_string(),
                    actual: bad.type_name().to_string(),
                    expected: self.types.describe(),
                }
                .into());
            }
        }
        Ok(FieldSpec {
            types: self.types,
            required: self.required,
            immutable: self.immutable,
            choices: self.choices,
            predicate: self.predicate,
            coerce: self.coerce,
        })
    }
}

/// What a shape declares for a field: a bare type, or a full spec.
#[derive(Clone, Debug)]
pub enum Declared {
    Bare(TypeSet),
    Spec(FieldSpec),
}

impl From<FieldSpec> for Declared {
    fn from(spec: FieldSpec) -> Self {
        Declared::Spec(spec)
    }
}

impl From<TypeSet> for Declared {
    fn from(types: TypeSet) -> Self {
        Declared::Bare(types)
    }
}

impl From<FieldType> for Declared {
    fn from(ty: FieldType) -> Self {
        Declared::Bare(ty.into())
    }
}

impl From<Arc<Shape>> for Declared {
    fn from(shape: Arc<Shape>) -> Self {
        Declared::Bare(shape.into())
    }
}

impl<const N: usize> From<[FieldType; N]> for Declared {
    fn from(types: [FieldType; N]) -> Self {
        Declared::Bare(types.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_type_set_is_rejected() {
        let error = FieldSpec::builder(Vec::<FieldType>::new()).build().unwrap_err();
        assert_eq!(error, Error::Constraint(ConstraintError::EmptyTypeSet));
    }

    #[test]
    fn choices_must_match_the_type() {
        let error = FieldSpec::builder(FieldType::Integer)
            .choices([Value::from(1), Value::from("two")])
            .build()
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Constraint(ConstraintError::ChoiceTypeMismatch { ref actual, .. }) if actual == "string"
        ));
    }

    #[test]
    fn flags_stay_unset_until_resolved() {
        let spec = FieldSpec::builder(FieldType::String).immutable(false).build().unwrap();
        assert_eq!(spec.required(), None);
        assert_eq!(spec.immutable(), Some(false));
        let spec = spec.with_defaults(Some(true), Some(true), None);
        assert!(spec.is_required());
        assert!(!spec.is_immutable());
        assert!(!spec.coerces());
    }

    #[test]
    fn predicate_outcomes() {
        let spec = FieldSpec::builder(FieldType::Integer)
            .predicate(|v: &Value| v.as_i64().is_some_and(|n| n > 0))
            .build()
            .unwrap();
        assert!(spec.check_predicate("n", &Value::from(3)).is_ok());
        assert!(matches!(
            spec.check_predicate("n", &Value::from(-3)),
            Err(Error::Constraint(ConstraintError::PredicateFailed { .. }))
        ));

        let sloppy = FieldSpec::builder(FieldType::Integer)
            .predicate(|v: &Value| v.clone())
            .build()
            .unwrap();
        assert!(matches!(
            sloppy.check_predicate("n", &Value::from(3)),
            Err(Error::Constraint(ConstraintError::PredicateNotBool { ref returned, .. })) if returned == "integer"
        ));
    }
}
