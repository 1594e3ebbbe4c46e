//! Runtime field validation for declared record shapes.
//!
//! Declare a [`Shape`] once per record type, then build [`Record`]s against
//! it. Every assignment runs the field's [`FieldSpec`]: optional coercion,
//! type check, immutability, choices, predicate; construction additionally
//! checks that every required field ended up with a value.
//!
//! Three flavors control how unset spec flags are filled in:
//! [`Flavor::Guarded`] (optional, mutable), [`Flavor::Strict`] (required,
//! immutable) and [`Flavor::Json`] (strict, coercing raw values).
pub mod decl;
pub mod error;
pub mod lower;
pub mod path_de;
pub mod record;
pub mod shape;
pub mod shaped;
pub mod spec;
pub mod ty;
pub mod value;

pub use decl::{DeclarationError, Declarations};
pub use error::{ConstraintError, Error, ErrorKind, Mutation, Result, StructuralError};
pub use record::Record;
pub use shape::{Flavor, Shape, ShapeBuilder};
pub use shaped::Shaped;
pub use spec::{Declared, FieldSpec, FieldSpecBuilder, Predicate};
pub use ty::{FieldType, TypeSet};
pub use value::Value;
