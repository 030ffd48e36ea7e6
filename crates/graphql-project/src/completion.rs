#![allow(clippy::too_many_lines)]

use crate::document::{trimmed_span, FragmentInfo};
use crate::schema_info::{
    can_spread, deprecation_reason, field_type_name, fields_of, is_composite,
    is_introspection_type, type_kind,
};
use crate::visit::{has_directive, operation_type};
use crate::{MergedSchema, ParsedDocument, Position};
use apollo_compiler::ast::{DirectiveLocation, InputValueDefinition, OperationType};
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::{Node, Schema};
use apollo_parser::cst::{self, CstNode};
use std::collections::HashSet;

/// Locations accepted after `on` in a directive definition
const DIRECTIVE_LOCATIONS: &[&str] = &[
    "QUERY",
    "MUTATION",
    "SUBSCRIPTION",
    "FIELD",
    "FRAGMENT_DEFINITION",
    "FRAGMENT_SPREAD",
    "INLINE_FRAGMENT",
    "VARIABLE_DEFINITION",
    "SCHEMA",
    "SCALAR",
    "OBJECT",
    "FIELD_DEFINITION",
    "ARGUMENT_DEFINITION",
    "INTERFACE",
    "UNION",
    "ENUM",
    "ENUM_VALUE",
    "INPUT_OBJECT",
    "INPUT_FIELD_DEFINITION",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionItemKind {
    Field,
    Type,
    Fragment,
    Directive,
    DirectiveLocation,
    EnumValue,
    Argument,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertTextFormat {
    PlainText,
    Snippet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionItemKind,
    pub detail: Option<String>,
    pub documentation: Option<String>,
    pub deprecated: bool,
    pub insert_text: Option<String>,
    pub insert_text_format: InsertTextFormat,
}

impl CompletionItem {
    pub fn new(label: impl Into<String>, kind: CompletionItemKind) -> Self {
        Self {
            label: label.into(),
            kind,
            detail: None,
            documentation: None,
            deprecated: false,
            insert_text: None,
            insert_text_format: InsertTextFormat::PlainText,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_documentation(mut self, documentation: Option<String>) -> Self {
        self.documentation = documentation;
        self
    }

    #[must_use]
    pub const fn with_deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: String) -> Self {
        self.insert_text = Some(snippet);
        self.insert_text_format = InsertTextFormat::Snippet;
        self
    }
}

/// Whether suggestions are plain names or expanded snippets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompletionMode {
    Raw,
    #[default]
    Snippet,
}

#[derive(Debug, Clone, PartialEq)]
enum CompletionContext {
    FieldSelection {
        parent_type: String,
        already_selected_fields: Vec<String>,
        is_in_alias: bool,
        in_client: bool,
    },
    FragmentSpread {
        parent_type: String,
    },
    TypeCondition,
    Directive {
        location: DirectiveLocation,
    },
    Argument {
        parent_type: String,
        field_name: String,
        provided: Vec<String>,
    },
    ArgumentValue {
        parent_type: String,
        field_name: String,
        argument: String,
    },
    DirectiveDefinitionLocation,
}

/// Suggests completions at a cursor inside a GraphQL document
#[derive(Debug, Default)]
pub struct CompletionProvider {
    mode: CompletionMode,
}

impl CompletionProvider {
    #[must_use]
    pub const fn new(mode: CompletionMode) -> Self {
        Self { mode }
    }

    /// Completions at a host position.
    ///
    /// `fragments` are the fragment definitions known to the project.
    #[must_use]
    pub fn complete(
        &self,
        document: &ParsedDocument,
        position: Position,
        schema: &MergedSchema,
        fragments: &[FragmentInfo],
    ) -> Vec<CompletionItem> {
        let Some(byte_offset) = document.offset_at(position) else {
            return Vec::new();
        };

        let doc = document.document();
        let Some(context) =
            Self::determine_completion_context(&doc, byte_offset, document.text(), schema.schema())
        else {
            return Vec::new();
        };
        tracing::trace!(?context, "Completion context");

        self.generate_completions(context, schema, fragments)
    }

    fn determine_completion_context(
        doc: &cst::Document,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
    ) -> Option<CompletionContext> {
        if Self::in_directive_definition_locations(doc, byte_offset, source) {
            return Some(CompletionContext::DirectiveDefinitionLocation);
        }

        doc.definitions().find_map(|def| match def {
            cst::Definition::OperationDefinition(op) => {
                Self::check_operation_for_context(&op, byte_offset, source, schema)
            }
            cst::Definition::FragmentDefinition(frag) => {
                Self::check_fragment_for_context(&frag, byte_offset, source, schema)
            }
            _ => None,
        })
    }

    /// Whether the cursor follows `on` in a directive definition
    fn in_directive_definition_locations(
        doc: &cst::Document,
        byte_offset: usize,
        source: &str,
    ) -> bool {
        doc.definitions().any(|def| {
            let cst::Definition::DirectiveDefinition(directive) = def else {
                return false;
            };
            let range = directive.syntax().text_range();
            let (start, end): (usize, usize) = (range.start().into(), range.end().into());
            if byte_offset < start {
                return false;
            }
            let tail = source.get(end.min(byte_offset)..byte_offset).unwrap_or_default();
            if !tail.chars().all(|c| c.is_whitespace() || c == '|') {
                return false;
            }
            source
                .get(start..byte_offset.min(end))
                .unwrap_or_default()
                .split(|c: char| c.is_whitespace() || c == '|')
                .any(|word| word == "on")
        })
    }

    fn check_operation_for_context(
        op: &cst::OperationDefinition,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
    ) -> Option<CompletionContext> {
        if !Self::node_contains(op, byte_offset) {
            return None;
        }

        let op_type = operation_type(op);
        if let Some(directives) = op.directives() {
            if Self::node_contains(&directives, byte_offset) {
                let location = match op_type {
                    OperationType::Query => DirectiveLocation::Query,
                    OperationType::Mutation => DirectiveLocation::Mutation,
                    OperationType::Subscription => DirectiveLocation::Subscription,
                };
                return Some(CompletionContext::Directive { location });
            }
        }

        let selection_set = op.selection_set()?;
        let root = schema.root_operation(op_type)?;
        Self::check_selection_set_for_context(
            &selection_set,
            byte_offset,
            source,
            schema,
            root.as_str(),
            false,
        )
    }

    fn check_fragment_for_context(
        frag: &cst::FragmentDefinition,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
    ) -> Option<CompletionContext> {
        if !Self::node_contains(frag, byte_offset) {
            return None;
        }

        if let Some(directives) = frag.directives() {
            if Self::node_contains(&directives, byte_offset) {
                return Some(CompletionContext::Directive {
                    location: DirectiveLocation::FragmentDefinition,
                });
            }
        }

        let type_cond = frag.type_condition()?;
        if Self::in_type_condition(&type_cond, frag.selection_set().as_ref(), byte_offset) {
            return Some(CompletionContext::TypeCondition);
        }

        let type_name = type_cond.named_type()?.name()?.text().to_string();
        let in_client = has_directive(frag.directives(), "client");
        let selection_set = frag.selection_set()?;
        Self::check_selection_set_for_context(
            &selection_set,
            byte_offset,
            source,
            schema,
            &type_name,
            in_client,
        )
    }

    fn check_selection_set_for_context(
        selection_set: &cst::SelectionSet,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
        parent_type: &str,
        in_client: bool,
    ) -> Option<CompletionContext> {
        if !Self::node_contains(selection_set, byte_offset) {
            return None;
        }

        // Field names already selected, except the one under the cursor
        let already_selected_fields: Vec<String> = selection_set
            .selections()
            .filter_map(|selection| match selection {
                cst::Selection::Field(field) if !Self::node_contains(&field, byte_offset) => {
                    field.name().map(|name| name.text().to_string())
                }
                _ => None,
            })
            .collect();

        for selection in selection_set.selections() {
            match selection {
                cst::Selection::Field(field) => {
                    if !Self::node_contains(&field, byte_offset) {
                        continue;
                    }
                    if let Some(context) = Self::check_field_for_context(
                        &field,
                        byte_offset,
                        source,
                        schema,
                        parent_type,
                        in_client,
                    ) {
                        return Some(context);
                    }

                    // On the field name itself
                    let has_alias = field.alias().is_some();
                    return Some(CompletionContext::FieldSelection {
                        parent_type: parent_type.to_string(),
                        already_selected_fields: if has_alias {
                            Vec::new()
                        } else {
                            already_selected_fields
                        },
                        is_in_alias: has_alias,
                        in_client,
                    });
                }
                cst::Selection::FragmentSpread(spread) => {
                    if !Self::node_contains(&spread, byte_offset) {
                        continue;
                    }
                    if let Some(directives) = spread.directives() {
                        if Self::node_contains(&directives, byte_offset) {
                            return Some(CompletionContext::Directive {
                                location: DirectiveLocation::FragmentSpread,
                            });
                        }
                    }
                    return Some(CompletionContext::FragmentSpread {
                        parent_type: parent_type.to_string(),
                    });
                }
                cst::Selection::InlineFragment(inline_frag) => {
                    if let Some(context) = Self::check_inline_fragment_for_context(
                        &inline_frag,
                        byte_offset,
                        source,
                        schema,
                        parent_type,
                        in_client,
                    ) {
                        return Some(context);
                    }
                }
            }
        }

        // Dots before the cursor start a fragment spread, not a field
        let start = byte_offset.saturating_sub(10);
        let text_before = source.get(start..byte_offset).unwrap_or_default();
        if text_before.trim_end().ends_with('.') {
            return Some(CompletionContext::FragmentSpread {
                parent_type: parent_type.to_string(),
            });
        }

        Some(CompletionContext::FieldSelection {
            parent_type: parent_type.to_string(),
            already_selected_fields,
            is_in_alias: false,
            in_client,
        })
    }

    fn check_field_for_context(
        field: &cst::Field,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
        parent_type: &str,
        in_client: bool,
    ) -> Option<CompletionContext> {
        let field_name = field.name()?.text().to_string();

        if let Some(arguments) = field.arguments() {
            if Self::node_contains(&arguments, byte_offset) {
                return Some(Self::argument_context(
                    &arguments,
                    byte_offset,
                    parent_type,
                    field_name,
                ));
            }
        }

        if let Some(directives) = field.directives() {
            if Self::node_contains(&directives, byte_offset) {
                return Some(CompletionContext::Directive {
                    location: DirectiveLocation::Field,
                });
            }
        }

        let selection_set = field.selection_set()?;
        let nested_type = field_type_name(schema, parent_type, &field_name)?;
        Self::check_selection_set_for_context(
            &selection_set,
            byte_offset,
            source,
            schema,
            &nested_type,
            in_client || has_directive(field.directives(), "client"),
        )
    }

    fn argument_context(
        arguments: &cst::Arguments,
        byte_offset: usize,
        parent_type: &str,
        field_name: String,
    ) -> CompletionContext {
        let mut provided = Vec::new();
        let mut current = None;
        for argument in arguments.arguments() {
            let Some(name) = argument.name() else {
                continue;
            };
            let (name_start, name_end) = trimmed_span(&name);
            if name_start <= byte_offset {
                current = Some(argument.clone());
            }
            if !(name_start..=name_end).contains(&byte_offset) {
                provided.push(name.text().to_string());
            }
        }

        // Past the colon of the last argument started before the cursor, and
        // not past its value
        if let Some(argument) = current {
            let after_colon = argument.colon_token().is_some_and(|colon| {
                let colon_end: usize = colon.text_range().end().into();
                byte_offset >= colon_end
            });
            let value_done = argument
                .value()
                .is_some_and(|value| trimmed_span(&value).1 < byte_offset);
            if after_colon && !value_done {
                if let Some(name) = argument.name() {
                    return CompletionContext::ArgumentValue {
                        parent_type: parent_type.to_string(),
                        field_name,
                        argument: name.text().to_string(),
                    };
                }
            }
        }

        CompletionContext::Argument {
            parent_type: parent_type.to_string(),
            field_name,
            provided,
        }
    }

    fn check_inline_fragment_for_context(
        inline_frag: &cst::InlineFragment,
        byte_offset: usize,
        source: &str,
        schema: &Schema,
        parent_type: &str,
        in_client: bool,
    ) -> Option<CompletionContext> {
        if !Self::node_contains(inline_frag, byte_offset) {
            return None;
        }

        if let Some(directives) = inline_frag.directives() {
            if Self::node_contains(&directives, byte_offset) {
                return Some(CompletionContext::Directive {
                    location: DirectiveLocation::InlineFragment,
                });
            }
        }

        if let Some(type_cond) = inline_frag.type_condition() {
            if Self::in_type_condition(&type_cond, inline_frag.selection_set().as_ref(), byte_offset)
            {
                return Some(CompletionContext::TypeCondition);
            }
        }

        let type_name = inline_frag
            .type_condition()
            .and_then(|type_cond| type_cond.named_type())
            .and_then(|named| named.name())
            .map_or_else(|| parent_type.to_string(), |name| name.text().to_string());

        let selection_set = inline_frag.selection_set()?;
        Self::check_selection_set_for_context(
            &selection_set,
            byte_offset,
            source,
            schema,
            &type_name,
            in_client || has_directive(inline_frag.directives(), "client"),
        )
    }

    /// Inclusive at the end, so a cursor right after a node still counts
    fn node_contains(node: &impl CstNode, byte_offset: usize) -> bool {
        let (start, end) = trimmed_span(node);
        byte_offset >= start && byte_offset <= end
    }

    /// Between `on` and the selection set
    fn in_type_condition(
        type_cond: &cst::TypeCondition,
        selection_set: Option<&cst::SelectionSet>,
        byte_offset: usize,
    ) -> bool {
        let (start, _) = trimmed_span(type_cond);
        let before_selection = selection_set.is_none_or(|selection_set| {
            let (selection_start, _) = trimmed_span(selection_set);
            byte_offset < selection_start
        });
        byte_offset > start && before_selection
    }

    fn generate_completions(
        &self,
        context: CompletionContext,
        schema: &MergedSchema,
        fragments: &[FragmentInfo],
    ) -> Vec<CompletionItem> {
        match context {
            CompletionContext::FieldSelection {
                parent_type,
                already_selected_fields,
                is_in_alias,
                in_client,
            } => self.complete_fields(
                &parent_type,
                schema,
                &already_selected_fields,
                is_in_alias,
                in_client,
            ),
            CompletionContext::FragmentSpread { parent_type } => {
                Self::complete_fragments(schema.schema(), &parent_type, fragments)
            }
            CompletionContext::TypeCondition => Self::complete_types(schema.schema()),
            CompletionContext::Directive { location } => {
                self.complete_directives(schema.schema(), location)
            }
            CompletionContext::Argument {
                parent_type,
                field_name,
                provided,
            } => self.complete_arguments(schema.schema(), &parent_type, &field_name, &provided),
            CompletionContext::ArgumentValue {
                parent_type,
                field_name,
                argument,
            } => Self::complete_enum_values(schema.schema(), &parent_type, &field_name, &argument),
            CompletionContext::DirectiveDefinitionLocation => DIRECTIVE_LOCATIONS
                .iter()
                .map(|location| CompletionItem::new(*location, CompletionItemKind::DirectiveLocation))
                .collect(),
        }
    }

    fn complete_fields(
        &self,
        parent_type: &str,
        schema: &MergedSchema,
        already_selected_fields: &[String],
        is_in_alias: bool,
        in_client: bool,
    ) -> Vec<CompletionItem> {
        let graphql_schema = schema.schema();
        if !is_composite(graphql_schema, parent_type) {
            return Vec::new();
        }

        let mut items = Vec::new();
        for field in fields_of(graphql_schema, parent_type) {
            let name = field.name.as_str();
            if !is_in_alias && already_selected_fields.iter().any(|f| f == name) {
                continue;
            }

            let client_only = schema.is_client_only(parent_type, name);
            let detail = if client_only {
                format!("{} (local)", field.ty)
            } else {
                field.ty.to_string()
            };
            let mut item = CompletionItem::new(name, CompletionItemKind::Field)
                .with_detail(detail)
                .with_documentation(field.description.as_ref().map(ToString::to_string))
                .with_deprecated(deprecation_reason(&field.directives).is_some());

            if self.mode == CompletionMode::Snippet {
                let mut snippet = name.to_string();
                let mut tab_stop = 1;
                Self::push_required_arguments(&mut snippet, &field.arguments, &mut tab_stop);
                if client_only && !in_client {
                    snippet.push_str(" @client");
                }
                if is_composite(graphql_schema, field.ty.inner_named_type()) {
                    snippet.push_str(" {\n  $0\n}");
                }
                if snippet != name {
                    item = item.with_snippet(snippet);
                }
            }
            items.push(item);
        }

        if !already_selected_fields.iter().any(|f| f == "__typename") || is_in_alias {
            items.push(
                CompletionItem::new("__typename", CompletionItemKind::Field)
                    .with_detail("String!")
                    .with_documentation(Some(
                        "The name of the current Object type at runtime.".to_string(),
                    )),
            );
        }

        items
    }

    /// Appends `(arg: $1, ...)` for arguments that must be provided
    fn push_required_arguments(
        snippet: &mut String,
        arguments: &[Node<InputValueDefinition>],
        tab_stop: &mut usize,
    ) {
        let required: Vec<_> = arguments
            .iter()
            .filter(|arg| arg.ty.is_non_null() && arg.default_value.is_none())
            .collect();
        if required.is_empty() {
            return;
        }
        let rendered: Vec<String> = required
            .iter()
            .map(|arg| {
                let rendered = format!("{}: ${tab_stop}", arg.name);
                *tab_stop += 1;
                rendered
            })
            .collect();
        snippet.push('(');
        snippet.push_str(&rendered.join(", "));
        snippet.push(')');
    }

    /// Fragments whose type condition can apply to `parent_type`, one per name
    fn complete_fragments(
        schema: &Schema,
        parent_type: &str,
        fragments: &[FragmentInfo],
    ) -> Vec<CompletionItem> {
        let mut seen = HashSet::new();
        fragments
            .iter()
            .filter(|fragment| can_spread(schema, parent_type, &fragment.type_condition))
            .filter(|fragment| seen.insert(fragment.name.as_str()))
            .map(|fragment| {
                CompletionItem::new(&fragment.name, CompletionItemKind::Fragment)
                    .with_detail(format!("on {}", fragment.type_condition))
            })
            .collect()
    }

    fn complete_types(schema: &Schema) -> Vec<CompletionItem> {
        schema
            .types
            .iter()
            .filter(|(name, _)| {
                !is_introspection_type(name.as_str()) && is_composite(schema, name.as_str())
            })
            .map(|(name, ty)| {
                CompletionItem::new(name.as_str(), CompletionItemKind::Type)
                    .with_detail(type_kind(ty))
                    .with_documentation(ty.description().map(ToString::to_string))
            })
            .collect()
    }

    fn complete_directives(
        &self,
        schema: &Schema,
        location: DirectiveLocation,
    ) -> Vec<CompletionItem> {
        schema
            .directive_definitions
            .values()
            .filter(|directive| directive.locations.contains(&location))
            .map(|directive| {
                let item = CompletionItem::new(directive.name.as_str(), CompletionItemKind::Directive)
                    .with_documentation(directive.description.as_ref().map(ToString::to_string));
                if self.mode == CompletionMode::Raw {
                    return item;
                }
                let mut snippet = directive.name.to_string();
                Self::push_required_arguments(&mut snippet, &directive.arguments, &mut 1);
                if snippet == directive.name.as_str() {
                    item
                } else {
                    item.with_snippet(snippet)
                }
            })
            .collect()
    }

    fn complete_arguments(
        &self,
        schema: &Schema,
        parent_type: &str,
        field_name: &str,
        provided: &[String],
    ) -> Vec<CompletionItem> {
        let Ok(field) = schema.type_field(parent_type, field_name) else {
            return Vec::new();
        };

        field
            .arguments
            .iter()
            .filter(|arg| !provided.iter().any(|p| p == arg.name.as_str()))
            .map(|arg| {
                let item = CompletionItem::new(arg.name.as_str(), CompletionItemKind::Argument)
                    .with_detail(arg.ty.to_string())
                    .with_documentation(arg.description.as_ref().map(ToString::to_string))
                    .with_deprecated(deprecation_reason(&arg.directives).is_some());
                match self.mode {
                    CompletionMode::Raw => item,
                    CompletionMode::Snippet => item.with_snippet(format!("{}: $1", arg.name)),
                }
            })
            .collect()
    }

    fn complete_enum_values(
        schema: &Schema,
        parent_type: &str,
        field_name: &str,
        argument: &str,
    ) -> Vec<CompletionItem> {
        let Ok(field) = schema.type_field(parent_type, field_name) else {
            return Vec::new();
        };
        let Some(arg) = field.arguments.iter().find(|arg| arg.name == argument) else {
            return Vec::new();
        };
        let Some(ExtendedType::Enum(enum_type)) = schema.types.get(arg.ty.inner_named_type())
        else {
            return Vec::new();
        };

        enum_type
            .values
            .values()
            .map(|value| {
                CompletionItem::new(value.value.as_str(), CompletionItemKind::EnumValue)
                    .with_detail(enum_type.name.as_str())
                    .with_documentation(value.description.as_ref().map(ToString::to_string))
                    .with_deprecated(deprecation_reason(&value.directives).is_some())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_schema::merge;
    use crate::provider::{SchemaSource, ServerSchema};
    use crate::validation::tests::document_at;

    const SCHEMA: &str = r#"
type Query {
  hero(episode: Episode): Character
  droid(id: ID!): Droid
  search(text: String!, first: Int = 10): [Character]
}

enum Episode {
  NEWHOPE
  EMPIRE
  JEDI @deprecated(reason: "Spoilers")
}

interface Character {
  id: ID!
  name: String
}

type Droid implements Character {
  id: ID!
  "The droid's designation"
  name: String
  primaryFunction: String
  friends: [Character]
}

type Human implements Character {
  id: ID!
  name: String
}

directive @cached(ttl: Int!) on FIELD | QUERY
"#;

    fn schema() -> MergedSchema {
        let server = ServerSchema::from_sources(vec![SchemaSource::new("schema.graphql", SCHEMA)])
            .unwrap();
        merge(
            &server,
            &["extend type Droid { isFavorite: Boolean }".to_string()],
        )
    }

    const CURSOR: &str = "‸";

    /// Complete at the cursor marker in `body`
    fn complete_at(mode: CompletionMode, body: &str, fragments: &[FragmentInfo]) -> Vec<CompletionItem> {
        let offset = body.find(CURSOR).expect("fixture has a cursor");
        let text = body.replacen(CURSOR, "", 1);
        let line = text[..offset].matches('\n').count();
        let character = offset - text[..offset].rfind('\n').map_or(0, |i| i + 1);
        let document = document_at(&text, 1, 1);
        CompletionProvider::new(mode).complete(
            &document,
            Position::new(line, character),
            &schema(),
            fragments,
        )
    }

    fn labels(items: &[CompletionItem]) -> Vec<&str> {
        items.iter().map(|item| item.label.as_str()).collect()
    }

    fn item<'a>(items: &'a [CompletionItem], label: &str) -> &'a CompletionItem {
        items
            .iter()
            .find(|item| item.label == label)
            .unwrap_or_else(|| panic!("no completion for {label}: {:?}", labels(items)))
    }

    #[test]
    fn test_root_fields() {
        let items = complete_at(CompletionMode::Raw, "query Q {\n  ‸\n}", &[]);
        let labels = labels(&items);
        assert!(labels.contains(&"hero"));
        assert!(labels.contains(&"droid"));
        assert!(labels.contains(&"search"));
        assert!(items.iter().all(|item| item.insert_text.is_none()));
    }

    #[test]
    fn test_nested_fields_skip_already_selected() {
        let items = complete_at(
            CompletionMode::Raw,
            "query Q {\n  droid(id: 1) {\n    name\n    ‸\n  }\n}",
            &[],
        );
        let labels = labels(&items);
        assert!(labels.contains(&"primaryFunction"));
        assert!(labels.contains(&"isFavorite"));
        assert!(!labels.contains(&"name"));
        assert_eq!(
            item(&items, "isFavorite").detail.as_deref(),
            Some("Boolean (local)")
        );
        assert_eq!(
            item(&items, "primaryFunction").detail.as_deref(),
            Some("String")
        );
    }

    #[test]
    fn test_snippets_fill_arguments_and_braces() {
        let items = complete_at(CompletionMode::Snippet, "query Q {\n  ‸\n}", &[]);

        let droid = item(&items, "droid");
        assert_eq!(droid.insert_text_format, InsertTextFormat::Snippet);
        assert_eq!(droid.insert_text.as_deref(), Some("droid(id: $1) {\n  $0\n}"));

        // Only non-null arguments without defaults are pre-filled
        let search = item(&items, "search");
        assert_eq!(
            search.insert_text.as_deref(),
            Some("search(text: $1) {\n  $0\n}")
        );

        let hero = item(&items, "hero");
        assert_eq!(hero.insert_text.as_deref(), Some("hero {\n  $0\n}"));
    }

    #[test]
    fn test_snippet_adds_client_directive() {
        let items = complete_at(
            CompletionMode::Snippet,
            "query Q {\n  droid(id: 1) {\n    ‸\n  }\n}",
            &[],
        );
        assert_eq!(
            item(&items, "isFavorite").insert_text.as_deref(),
            Some("isFavorite @client")
        );
        let name = item(&items, "name");
        assert!(name.insert_text.is_none());
        assert_eq!(name.documentation.as_deref(), Some("The droid's designation"));

        let items = complete_at(
            CompletionMode::Snippet,
            "query Q {\n  droid(id: 1) @client {\n    ‸\n  }\n}",
            &[],
        );
        assert!(item(&items, "isFavorite").insert_text.is_none());
    }

    #[test]
    fn test_interface_fields() {
        let items = complete_at(CompletionMode::Raw, "query Q {\n  hero {\n    ‸\n  }\n}", &[]);
        let labels = labels(&items);
        assert!(labels.contains(&"id"));
        assert!(labels.contains(&"name"));
        assert!(labels.contains(&"__typename"));
        assert!(!labels.contains(&"primaryFunction"));
    }

    #[test]
    fn test_inline_fragment_narrows_type() {
        let items = complete_at(
            CompletionMode::Raw,
            "query Q {\n  hero {\n    ... on Droid {\n      ‸\n    }\n  }\n}",
            &[],
        );
        assert!(labels(&items).contains(&"primaryFunction"));
    }

    #[test]
    fn test_arguments() {
        let items = complete_at(CompletionMode::Raw, "query Q {\n  search(‸) { id }\n}", &[]);
        assert_eq!(labels(&items), vec!["text", "first"]);
        assert_eq!(items[0].detail.as_deref(), Some("String!"));

        let items = complete_at(
            CompletionMode::Raw,
            "query Q {\n  search(text: \"r2\", ‸) { id }\n}",
            &[],
        );
        assert_eq!(labels(&items), vec!["first"]);
    }

    #[test]
    fn test_enum_argument_values() {
        let items = complete_at(
            CompletionMode::Raw,
            "query Q {\n  hero(episode: ‸) { id }\n}",
            &[],
        );
        assert_eq!(labels(&items), vec!["NEWHOPE", "EMPIRE", "JEDI"]);
        assert!(item(&items, "JEDI").deprecated);
        assert_eq!(item(&items, "EMPIRE").detail.as_deref(), Some("Episode"));
    }

    #[test]
    fn test_directives_filtered_by_location() {
        let items = complete_at(CompletionMode::Raw, "query Q {\n  hero @‸ { id }\n}", &[]);
        let labels = labels(&items);
        assert!(labels.contains(&"cached"));
        assert!(labels.contains(&"client"));
        assert!(labels.contains(&"include"));
        assert!(!labels.contains(&"deprecated"));
        assert!(!labels.contains(&"defer"));

        let items = complete_at(CompletionMode::Snippet, "query Q {\n  hero @‸ { id }\n}", &[]);
        assert_eq!(item(&items, "cached").insert_text.as_deref(), Some("cached(ttl: $1)"));
    }

    fn fragment(name: &str, type_condition: &str, uri: &str) -> FragmentInfo {
        FragmentInfo {
            name: name.to_string(),
            type_condition: type_condition.to_string(),
            uri: uri.to_string(),
            text: format!("fragment {name} on {type_condition} {{ id }}"),
            name_range: crate::Range::default(),
            range: crate::Range::default(),
        }
    }

    #[test]
    fn test_fragment_spreads() {
        let fragments = vec![fragment("DroidFields", "Droid", "file:///src/fragments.ts")];
        let items = complete_at(
            CompletionMode::Raw,
            "query Q {\n  droid(id: 1) {\n    ...‸\n  }\n}",
            &fragments,
        );
        assert_eq!(labels(&items), vec!["DroidFields"]);
        assert_eq!(items[0].detail.as_deref(), Some("on Droid"));
    }

    #[test]
    fn test_fragment_spreads_match_parent_type_once() {
        let fragments = vec![
            fragment("DroidFields", "Droid", "file:///src/a.ts"),
            fragment("HumanFields", "Human", "file:///src/a.ts"),
            fragment("CharacterFields", "Character", "file:///src/b.ts"),
            fragment("DroidFields", "Droid", "file:///src/c.ts"),
        ];

        let on_droid = complete_at(
            CompletionMode::Raw,
            "query Q {\n  droid(id: 1) {\n    ...‸\n  }\n}",
            &fragments,
        );
        assert_eq!(labels(&on_droid), vec!["DroidFields", "CharacterFields"]);

        let on_character = complete_at(
            CompletionMode::Raw,
            "query Q {\n  hero {\n    ...‸\n  }\n}",
            &fragments,
        );
        assert_eq!(
            labels(&on_character),
            vec!["DroidFields", "HumanFields", "CharacterFields"]
        );
    }

    #[test]
    fn test_type_conditions() {
        let items = complete_at(CompletionMode::Raw, "fragment F on ‸ { id }", &[]);
        let labels = labels(&items);
        assert!(labels.contains(&"Droid"));
        assert!(labels.contains(&"Character"));
        assert!(!labels.contains(&"Episode"));
        assert!(!labels.contains(&"String"));
    }

    #[test]
    fn test_directive_definition_locations() {
        let items = complete_at(
            CompletionMode::Raw,
            "directive @local on FIELD | ‸",
            &[],
        );
        assert!(labels(&items).contains(&"FIELD_DEFINITION"));
        assert!(items
            .iter()
            .all(|item| item.kind == CompletionItemKind::DirectiveLocation));
    }

    #[test]
    fn test_position_outside_document() {
        let document = document_at("query Q { hero { id } }", 4, 1);
        let items = CompletionProvider::default().complete(
            &document,
            Position::new(0, 0),
            &schema(),
            &[],
        );
        assert!(items.is_empty());
    }
}
