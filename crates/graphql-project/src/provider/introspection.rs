//! Introspection result types and their conversion to SDL.

use serde::Deserialize;
use std::fmt::{self, Write};

/// Standard introspection query, nesting type references deep enough for
/// wrappers like `[[String!]!]!`
pub const INTROSPECTION_QUERY: &str = r"
query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types {
      ...FullType
    }
    directives {
      name
      description
      locations
      args {
        ...InputValue
      }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args {
      ...InputValue
    }
    type {
      ...TypeRef
    }
    isDeprecated
    deprecationReason
  }
  inputFields {
    ...InputValue
  }
  interfaces {
    ...TypeRef
  }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes {
    ...TypeRef
  }
}

fragment InputValue on __InputValue {
  name
  description
  type {
    ...TypeRef
  }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
";

/// Query used to fetch a federated service's own SDL
pub const SERVICE_SDL_QUERY: &str = "query ServiceSDL { _service { sdl } }";

/// The `data` member of an introspection response
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionData {
    #[serde(rename = "__schema")]
    pub schema: IntrospectionSchema,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    pub query_type: Option<NamedRef>,
    pub mutation_type: Option<NamedRef>,
    pub subscription_type: Option<NamedRef>,
    pub types: Vec<IntrospectionType>,
    #[serde(default)]
    pub directives: Vec<IntrospectionDirective>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionType {
    pub kind: TypeKind,
    pub name: String,
    pub description: Option<String>,
    pub fields: Option<Vec<IntrospectionField>>,
    pub input_fields: Option<Vec<InputValue>>,
    pub interfaces: Option<Vec<TypeRef>>,
    pub enum_values: Option<Vec<EnumValue>>,
    pub possible_types: Option<Vec<TypeRef>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionField {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumValue {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_deprecated: bool,
    pub deprecation_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionDirective {
    pub name: String,
    pub description: Option<String>,
    pub locations: Vec<String>,
    #[serde(default)]
    pub args: Vec<InputValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    pub name: Option<String>,
    pub of_type: Option<Box<TypeRef>>,
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, &self.of_type) {
            (TypeKind::NonNull, Some(inner)) => write!(f, "{inner}!"),
            (TypeKind::List, Some(inner)) => write!(f, "[{inner}]"),
            _ => f.write_str(self.name.as_deref().unwrap_or_default()),
        }
    }
}

const BUILTIN_SCALARS: &[&str] = &["Int", "Float", "String", "Boolean", "ID"];
const BUILTIN_DIRECTIVES: &[&str] = &["skip", "include", "deprecated", "specifiedBy"];

/// Print an introspection result as SDL.
///
/// Built-in scalars, directives and `__` types are left out.
#[must_use]
pub fn introspection_to_sdl(schema: &IntrospectionSchema) -> String {
    SdlPrinter(schema).to_string()
}

struct SdlPrinter<'a>(&'a IntrospectionSchema);

impl fmt::Display for SdlPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.0;
        let roots = [
            ("query", &schema.query_type, "Query"),
            ("mutation", &schema.mutation_type, "Mutation"),
            ("subscription", &schema.subscription_type, "Subscription"),
        ];

        if roots
            .iter()
            .any(|(_, root, default)| root.as_ref().is_some_and(|r| r.name != *default))
        {
            f.write_str("schema {\n")?;
            for (operation, root, _) in &roots {
                if let Some(root) = root {
                    writeln!(f, "  {operation}: {}", root.name)?;
                }
            }
            f.write_str("}\n\n")?;
        }

        for directive in &schema.directives {
            if BUILTIN_DIRECTIVES.contains(&directive.name.as_str()) {
                continue;
            }
            write_description(f, directive.description.as_deref(), "")?;
            write!(f, "directive @{}", directive.name)?;
            write_arguments(f, &directive.args)?;
            writeln!(f, " on {}\n", directive.locations.join(" | "))?;
        }

        for ty in &schema.types {
            if ty.name.starts_with("__") || BUILTIN_SCALARS.contains(&ty.name.as_str()) {
                continue;
            }
            write_type(f, ty)?;
            f.write_str("\n\n")?;
        }
        Ok(())
    }
}

fn write_type(f: &mut impl Write, ty: &IntrospectionType) -> fmt::Result {
    write_description(f, ty.description.as_deref(), "")?;
    match ty.kind {
        TypeKind::Scalar => write!(f, "scalar {}", ty.name),
        TypeKind::Object | TypeKind::Interface => {
            let keyword = if ty.kind == TypeKind::Object {
                "type"
            } else {
                "interface"
            };
            write!(f, "{keyword} {}", ty.name)?;
            let interfaces = ty.interfaces.as_deref().unwrap_or_default();
            if !interfaces.is_empty() {
                let names: Vec<String> = interfaces.iter().map(ToString::to_string).collect();
                write!(f, " implements {}", names.join(" & "))?;
            }
            f.write_str(" {\n")?;
            for field in ty.fields.as_deref().unwrap_or_default() {
                write_description(f, field.description.as_deref(), "  ")?;
                write!(f, "  {}", field.name)?;
                write_arguments(f, &field.args)?;
                write!(f, ": {}", field.type_ref)?;
                write_deprecation(f, field.is_deprecated, field.deprecation_reason.as_deref())?;
                f.write_char('\n')?;
            }
            f.write_char('}')
        }
        TypeKind::Union => {
            let members: Vec<String> = ty
                .possible_types
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect();
            write!(f, "union {} = {}", ty.name, members.join(" | "))
        }
        TypeKind::Enum => {
            writeln!(f, "enum {} {{", ty.name)?;
            for value in ty.enum_values.as_deref().unwrap_or_default() {
                write_description(f, value.description.as_deref(), "  ")?;
                write!(f, "  {}", value.name)?;
                write_deprecation(f, value.is_deprecated, value.deprecation_reason.as_deref())?;
                f.write_char('\n')?;
            }
            f.write_char('}')
        }
        TypeKind::InputObject => {
            writeln!(f, "input {} {{", ty.name)?;
            for field in ty.input_fields.as_deref().unwrap_or_default() {
                write_description(f, field.description.as_deref(), "  ")?;
                write!(f, "  {}: {}", field.name, field.type_ref)?;
                if let Some(default) = &field.default_value {
                    write!(f, " = {default}")?;
                }
                f.write_char('\n')?;
            }
            f.write_char('}')
        }
        TypeKind::List | TypeKind::NonNull => Ok(()),
    }
}

fn write_arguments(f: &mut impl Write, args: &[InputValue]) -> fmt::Result {
    if args.is_empty() {
        return Ok(());
    }
    f.write_char('(')?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}: {}", arg.name, arg.type_ref)?;
        if let Some(default) = &arg.default_value {
            write!(f, " = {default}")?;
        }
    }
    f.write_char(')')
}

fn write_deprecation(f: &mut impl Write, deprecated: bool, reason: Option<&str>) -> fmt::Result {
    match (deprecated, reason) {
        (false, _) => Ok(()),
        (true, Some(reason)) => write!(f, " @deprecated(reason: \"{}\")", escape_string(reason)),
        (true, None) => f.write_str(" @deprecated"),
    }
}

fn write_description(f: &mut impl Write, description: Option<&str>, indent: &str) -> fmt::Result {
    match description {
        Some(desc) if !desc.is_empty() => {
            writeln!(f, "{indent}\"{}\"", escape_string(desc))
        }
        _ => Ok(()),
    }
}

fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
