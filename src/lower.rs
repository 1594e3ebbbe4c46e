//! Lower field declarations into the effective spec map of a shape.
//!
//! Runs once per shape, inside `ShapeBuilder::build`:
//! - bare types become a `FieldSpec` with every optional constraint unset;
//! - the flavor then fills in whatever the declaration left unset.
use indexmap::IndexMap;

use crate::error::Result;
use crate::shape::Flavor;
use crate::spec::{Declared, FieldSpec};

pub fn resolve(flavor: Flavor, declared: Declared) -> Result<FieldSpec> {
    let spec = match declared {
        Declared::Bare(types) => FieldSpec::bare(types)?,
        Declared::Spec(spec) => spec,
    };
    Ok(apply_flavor(flavor, spec))
}

pub fn resolve_all<I>(flavor: Flavor, declared: I) -> Result<IndexMap<String, FieldSpec>>
where
    I: IntoIterator<Item = (String, Declared)>,
{
    declared
        .into_iter()
        .map(|(name, decl)| Ok((name, resolve(flavor, decl)?)))
        .collect()
}

// Strict: required + immutable unless opted out.
// Json:   Strict + coerce unless opted out.
fn apply_flavor(flavor: Flavor, spec: FieldSpec) -> FieldSpec {
    match flavor {
        Flavor::Guarded => spec,
        Flavor::Strict => spec.with_defaults(Some(true), Some(true), None),
        Flavor::Json => spec.with_defaults(Some(true), Some(true), Some(true)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::FieldType;

    fn flags(spec: &FieldSpec) -> (Option<bool>, Option<bool>, Option<bool>) {
        (spec.required(), spec.immutable(), spec.coerce())
    }

    #[test]
    fn guarded_keeps_bare_types_loose() {
        let spec = resolve(Flavor::Guarded, FieldType::Integer.into()).unwrap();
        assert_eq!(flags(&spec), (None, None, None));
        assert!(!spec.is_required() && !spec.is_immutable());
    }

    #[test]
    fn strict_tightens_unset_flags_only() {
        let bare = resolve(Flavor::Strict, FieldType::Integer.into()).unwrap();
        assert_eq!(flags(&bare), (Some(true), Some(true), None));

        let opted_out = FieldSpec::builder(FieldType::Integer).required(false).build().unwrap();
        let spec = resolve(Flavor::Strict, opted_out.into()).unwrap();
        assert_eq!(flags(&spec), (Some(false), Some(true), None));
    }

    #[test]
    fn json_also_turns_on_coercion() {
        let bare = resolve(Flavor::Json, FieldType::String.into()).unwrap();
        assert_eq!(flags(&bare), (Some(true), Some(true), Some(true)));

        let no_coerce = FieldSpec::builder(FieldType::String).coerce(false).build().unwrap();
        let spec = resolve(Flavor::Json, no_coerce.into()).unwrap();
        assert_eq!(flags(&spec), (Some(true), Some(true), Some(false)));
    }

    #[test]
    fn resolve_all_keeps_declaration_order() {
        let specs = resolve_all(
            Flavor::Strict,
            vec![
                ("b".to_string(), FieldType::Integer.into()),
                ("a".to_string(), FieldType::String.into()),
            ],
        )
        .unwrap();
        assert_eq!(specs.keys().collect::<Vec<_>>(), ["b", "a"]);
    }
}
