//! Error kinds raised by the engine.
//!
//! Two families, both fatal to the operation that raised them:
//! - [`StructuralError`]: the caller and the declared shape disagree
//!   (unknown field, missing required fields, touching an immutable field).
//! - [`ConstraintError`]: the data or the constraint configuration is
//!   invalid (type mismatch, choice, predicate, coercion, malformed spec).
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Structural,
    Constraint,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Structural(_) => ErrorKind::Structural,
            Error::Constraint(_) => ErrorKind::Constraint,
        }
    }
    pub fn is_structural(&self) -> bool {
        self.kind() == ErrorKind::Structural
    }
    pub fn is_constraint(&self) -> bool {
        self.kind() == ErrorKind::Constraint
    }
}

/// Which mutation was attempted on an immutable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Assign,
    Delete,
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mutation::Assign => f.write_str("changed"),
            Mutation::Delete => f.write_str("deleted"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error(
        "`{shape}` has no field `{field}`; declare it or check the spelling \
         (available fields: {})", .available.join(", ")
    )]
    UnknownField {
        shape: String,
        field: String,
        available: Vec<String>,
    },

    #[error("`{shape}` is missing required fields: {}", .fields.join(", "))]
    MissingRequired { shape: String, fields: Vec<String> },

    #[error("`{shape}.{field}` is immutable; it can't be {op}{}", default_note(.from_default))]
    Immutable {
        shape: String,
        field: String,
        op: Mutation,
        from_default: bool,
    },

    #[error("`{shape}.{field}` has no value")]
    Unset { shape: String, field: String },
}

fn default_note(from_default: &bool) -> &'static str {
    if *from_default { " (it was initially set by a default value)" } else { "" }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("`{field}` must be {expected}, but a `{actual}` was provided with the exact value {value}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: String,
        value: String,
    },

    #[error("`{field}` was not one of the valid choices; got `{actual}` {value}, available choices are [{}]",
        .choices.join(", "))]
    InvalidChoice {
        field: String,
        actual: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("`{field}` failed its predicate; got `{actual}` {value}")]
    PredicateFailed {
        field: String,
        actual: String,
        value: String,
    },

    #[error("the predicate for `{field}` must return a bool, but it returned a `{returned}`")]
    PredicateNotBool { field: String, returned: String },

    #[error("`{field}` could not be coerced into {expected} from `{actual}` {value}: {reason}")]
    Coercion {
        field: String,
        expected: String,
        actual: String,
        value: String,
        reason: String,
    },

    #[error("`{shape}` must be built from a mapping, but a `{actual}` was provided")]
    NotAMapping { shape: String, actual: String },

    #[error("at path {path} → {message}")]
    Deserialize { path: String, message: String },

    #[error("a field spec needs at least one type")]
    EmptyTypeSet,

    #[error("choice {choice} of type `{actual}` is not {expected}")]
    ChoiceTypeMismatch {
        choice: String,
        actual: String,
        expected: String,
    },

    #[error("field spec `{attribute}` must be a bool, but a `{actual}` was provided")]
    NotABoolean { attribute: String, actual: String },

    #[error("field spec `{attribute}` must be a list, but a `{actual}` was provided")]
    NotAList { attribute: String, actual: String },
}
