use crate::provider::ServerSchema;
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use apollo_parser::{cst, Parser};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Directives understood by the client runtime without a server declaration
pub const CLIENT_DIRECTIVES_SDL: &str = r"
directive @client(always: Boolean) on FIELD | FRAGMENT_DEFINITION | INLINE_FRAGMENT
directive @export(as: String!) on FIELD
directive @connection(key: String!, filter: [String!]) on FIELD
directive @nonreactive on FIELD | FRAGMENT_SPREAD | INLINE_FRAGMENT
directive @defer(if: Boolean, label: String) on FRAGMENT_SPREAD | INLINE_FRAGMENT
";

const CLIENT_DIRECTIVE_NAMES: &[&str] = &["client", "export", "connection", "nonreactive", "defer"];

/// Fields that only exist in the client, keyed by type name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientOnlyFields {
    fields: HashMap<String, HashSet<String>>,
}

impl ClientOnlyFields {
    #[must_use]
    pub fn is_client_only(&self, type_name: &str, field_name: &str) -> bool {
        self.fields
            .get(type_name)
            .is_some_and(|fields| fields.contains(field_name))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn insert(&mut self, type_name: String, field_name: String) {
        self.fields.entry(type_name).or_default().insert(field_name);
    }
}

/// The server schema extended with the project's client-side type system
#[derive(Debug, Clone)]
pub struct MergedSchema {
    schema: Arc<Valid<Schema>>,
    client_only: ClientOnlyFields,
    client_directives_injected: bool,
}

impl MergedSchema {
    #[must_use]
    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    #[must_use]
    pub const fn client_only(&self) -> &ClientOnlyFields {
        &self.client_only
    }

    #[must_use]
    pub fn is_client_only(&self, type_name: &str, field_name: &str) -> bool {
        self.client_only.is_client_only(type_name, field_name)
    }

    #[must_use]
    pub const fn client_directives_injected(&self) -> bool {
        self.client_directives_injected
    }
}

/// Extend a server schema with client type system definitions.
///
/// The server schema is rebuilt from its SDL so extensions have definitions to
/// attach to. The client directives are added only when neither the server
/// nor the client declares a directive with one of their names.
#[must_use]
pub fn merge(server: &ServerSchema, client_definitions: &[String]) -> MergedSchema {
    let server_sources = server.sdl_sources();

    let declared: HashSet<String> = server_sources
        .iter()
        .map(|source| source.sdl.as_str())
        .chain(client_definitions.iter().map(String::as_str))
        .flat_map(declared_directives)
        .collect();
    let inject = !CLIENT_DIRECTIVE_NAMES
        .iter()
        .any(|name| declared.contains(*name));

    let mut builder = Schema::builder().adopt_orphan_extensions();
    for source in &server_sources {
        builder = builder.parse(source.sdl.as_str(), source.origin.as_str());
    }
    if inject {
        builder = builder.parse(CLIENT_DIRECTIVES_SDL, "client-directives.graphql");
    }
    for (i, definition) in client_definitions.iter().enumerate() {
        builder = builder.parse(definition.as_str(), format!("client-{i}.graphql"));
    }

    let schema = match builder.build() {
        Ok(schema) => schema,
        Err(with_errors) => {
            tracing::warn!(
                errors = with_errors.errors.len(),
                "Client schema extensions could not be fully applied"
            );
            with_errors.partial
        }
    };
    let schema = schema.validate().unwrap_or_else(|with_errors| {
        tracing::debug!(
            errors = with_errors.errors.len(),
            "Merged schema has validation errors"
        );
        Valid::assume_valid(with_errors.partial)
    });

    let client_only = client_only_fields(client_definitions);
    tracing::debug!(
        client_definitions = client_definitions.len(),
        inject,
        "Merged client schema"
    );

    MergedSchema {
        schema: Arc::new(schema),
        client_only,
        client_directives_injected: inject,
    }
}

fn declared_directives(sdl: &str) -> Vec<String> {
    let tree = Parser::new(sdl).parse();
    tree.document()
        .definitions()
        .filter_map(|definition| match definition {
            cst::Definition::DirectiveDefinition(directive) => {
                Some(directive.name()?.text().to_string())
            }
            _ => None,
        })
        .collect()
}

fn client_only_fields(client_definitions: &[String]) -> ClientOnlyFields {
    let mut fields = ClientOnlyFields::default();
    for definition in client_definitions {
        let tree = Parser::new(definition).parse();
        for definition in tree.document().definitions() {
            let cst::Definition::ObjectTypeExtension(extension) = definition else {
                continue;
            };
            let Some(type_name) = extension.name() else {
                continue;
            };
            let Some(field_definitions) = extension.fields_definition() else {
                continue;
            };
            for field in field_definitions.field_definitions() {
                if let Some(name) = field.name() {
                    fields.insert(type_name.text().to_string(), name.text().to_string());
                }
            }
        }
    }
    fields
}
