//! Static Rust types backed by a shape.
use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::record::Record;
use crate::shape::Shape;

/// A serde type whose raw input is validated by a [`Shape`] before it is
/// decoded.
///
/// ```
/// use std::sync::Arc;
/// use once_cell::sync::Lazy;
/// use serde::Deserialize;
/// use shape_guard::{FieldType, Shape, Shaped};
///
/// static USER: Lazy<Arc<Shape>> = Lazy::new(|| {
///     Shape::json("User").field("id", FieldType::Integer).build().expect("valid shape")
/// });
///
/// #[derive(Deserialize)]
/// struct User {
///     id: i64,
/// }
///
/// impl Shaped for User {
///     fn shape() -> &'static Arc<Shape> {
///         &USER
///     }
/// }
///
/// let user = User::from_document(&serde_json::json!({"id": "7"})).unwrap();
/// assert_eq!(user.id, 7);
/// ```
pub trait Shaped: DeserializeOwned {
    fn shape() -> &'static Arc<Shape>;

    fn from_document(document: &serde_json::Value) -> Result<Self> {
        Record::from_document(Self::shape(), document)?.deserialize()
    }

    fn from_record(record: &Record) -> Result<Self> {
        record.deserialize()
    }
}
