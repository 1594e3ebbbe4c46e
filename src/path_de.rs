use serde::de::DeserializeOwned;

use crate::error::ConstraintError;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, ConstraintError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(into_constraint_error)
}

pub fn from_value_with_path<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ConstraintError> {
    serde_path_to_error::deserialize::<_, T>(value).map_err(into_constraint_error)
}

fn into_constraint_error(err: serde_path_to_error::Error<serde_json::Error>) -> ConstraintError {
    let path = err.path().to_string();
    ConstraintError::Deserialize { path, message: err.into_inner().to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Outer {
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Inner {
        count: u8,
    }

    #[test]
    fn errors_carry_the_failing_path() {
        let error = from_value_with_path::<Outer>(json!({"inner": {"count": "x"}})).unwrap_err();
        let ConstraintError::Deserialize { path, .. } = error else { panic!("unexpected {error:?}") };
        assert_eq!(path, "inner.count");

        let error = from_str_with_path::<Outer>(r#"{"inner": {}}"#).unwrap_err();
        assert!(error.to_string().contains("missing field `count`"));
    }
}
