//! Lookups over `apollo-compiler` schemas shared by the IDE features.

use apollo_compiler::ast::{DirectiveList, FieldDefinition};
use apollo_compiler::schema::{Component, ExtendedType};
use apollo_compiler::Schema;
use std::collections::HashSet;

const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

/// The reason given by `@deprecated`, if present
pub(crate) fn deprecation_reason(directives: &DirectiveList) -> Option<String> {
    let directive = directives.get("deprecated")?;
    let reason = directive
        .specified_argument_by_name("reason")
        .and_then(|value| value.as_str())
        .unwrap_or(DEFAULT_DEPRECATION_REASON);
    Some(reason.to_string())
}

pub(crate) const fn type_kind(ty: &ExtendedType) -> &'static str {
    match ty {
        ExtendedType::Scalar(_) => "Scalar",
        ExtendedType::Object(_) => "Object",
        ExtendedType::Interface(_) => "Interface",
        ExtendedType::Union(_) => "Union",
        ExtendedType::Enum(_) => "Enum",
        ExtendedType::InputObject(_) => "Input Object",
    }
}

/// Fields declared on an object or interface type
pub(crate) fn fields_of<'a>(schema: &'a Schema, type_name: &str) -> Vec<&'a FieldDefinition> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(object)) => {
            object.fields.values().map(definition).collect()
        }
        Some(ExtendedType::Interface(interface)) => {
            interface.fields.values().map(definition).collect()
        }
        _ => Vec::new(),
    }
}

fn definition(field: &Component<FieldDefinition>) -> &FieldDefinition {
    field
}

/// Whether selections can be made on the named type
pub(crate) fn is_composite(schema: &Schema, type_name: &str) -> bool {
    matches!(
        schema.types.get(type_name),
        Some(ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_))
    )
}

/// The type a field selection resolves to, by name
pub(crate) fn field_type_name(schema: &Schema, parent_type: &str, field: &str) -> Option<String> {
    schema
        .type_field(parent_type, field)
        .ok()
        .map(|definition| definition.ty.inner_named_type().to_string())
}

/// Object types a value of the named type can have at runtime
pub(crate) fn possible_types<'a>(schema: &'a Schema, type_name: &'a str) -> HashSet<&'a str> {
    match schema.types.get(type_name) {
        Some(ExtendedType::Object(_)) => HashSet::from([type_name]),
        Some(ExtendedType::Interface(_)) => schema
            .types
            .iter()
            .filter_map(|(name, ty)| match ty {
                ExtendedType::Object(object)
                    if object
                        .implements_interfaces
                        .iter()
                        .any(|interface| interface.as_str() == type_name) =>
                {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect(),
        Some(ExtendedType::Union(union_type)) => {
            union_type.members.iter().map(|member| member.as_str()).collect()
        }
        _ => HashSet::new(),
    }
}

/// Whether a fragment on `condition` may be spread where `parent_type` is
/// selected. Unknown parent types accept every fragment.
pub(crate) fn can_spread(schema: &Schema, parent_type: &str, condition: &str) -> bool {
    let parent = possible_types(schema, parent_type);
    parent.is_empty() || !parent.is_disjoint(&possible_types(schema, condition))
}

pub(crate) fn is_introspection_type(name: &str) -> bool {
    name.starts_with("__")
}
