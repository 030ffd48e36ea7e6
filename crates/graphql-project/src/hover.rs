#![allow(clippy::format_push_string)]

use crate::document::{trimmed_span, FragmentInfo};
use crate::schema_info::{deprecation_reason, field_type_name, fields_of, type_kind};
use crate::visit::{operation_keyword, operation_type};
use crate::{MergedSchema, ParsedDocument, Position, Range};
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::Schema;
use apollo_parser::cst::{self, CstNode};

/// Information to display when hovering over a GraphQL element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoverInfo {
    /// Markdown formatted content to display
    pub contents: String,
    /// Host range of the hovered element
    pub range: Option<Range>,
}

impl HoverInfo {
    #[must_use]
    pub const fn new(contents: String, range: Option<Range>) -> Self {
        Self { contents, range }
    }
}

/// Type of GraphQL element at a position
#[derive(Debug, Clone, PartialEq)]
enum ElementType {
    Field {
        field_name: String,
        parent_type: String,
    },
    TypeReference {
        type_name: String,
    },
    Argument {
        arg_name: String,
        field_name: String,
        parent_type: String,
    },
    Variable {
        var_name: String,
    },
    FragmentSpread {
        fragment_name: String,
    },
    FragmentDefinition {
        fragment_name: String,
        type_condition: String,
    },
    Directive {
        directive_name: String,
    },
    EnumValue {
        value_name: String,
        enum_type: String,
    },
    Operation {
        operation_type: &'static str,
        operation_name: Option<String>,
    },
}

/// Hover information provider
#[derive(Debug, Default)]
pub struct HoverProvider;

impl HoverProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Hover information for a host position inside `document`
    #[must_use]
    pub fn hover(
        &self,
        document: &ParsedDocument,
        position: Position,
        schema: &MergedSchema,
        fragments: &[FragmentInfo],
    ) -> Option<HoverInfo> {
        let byte_offset = document.offset_at(position)?;
        let doc = document.document();
        let (element, range) =
            Self::find_element_at_position(&doc, byte_offset, document, schema.schema())?;

        let contents = Self::generate_hover_content(element, schema, fragments)?;
        Some(HoverInfo::new(contents, Some(range)))
    }

    fn find_element_at_position(
        doc: &cst::Document,
        byte_offset: usize,
        document: &ParsedDocument,
        schema: &Schema,
    ) -> Option<(ElementType, Range)> {
        doc.definitions().find_map(|definition| match definition {
            cst::Definition::OperationDefinition(op) => {
                Self::check_operation(&op, byte_offset, document, schema)
            }
            cst::Definition::FragmentDefinition(frag) => {
                Self::check_fragment(&frag, byte_offset, document, schema)
            }
            cst::Definition::ObjectTypeDefinition(def) => {
                Self::check_field_definitions(def.fields_definition(), byte_offset, document)
            }
            cst::Definition::ObjectTypeExtension(ext) => {
                Self::check_field_definitions(ext.fields_definition(), byte_offset, document)
            }
            _ => None,
        })
    }

    fn on_node(node: &impl CstNode, byte_offset: usize) -> bool {
        let (start, end) = trimmed_span(node);
        byte_offset >= start && byte_offset < end
    }

    fn check_operation(
        op: &cst::OperationDefinition,
        byte_offset: usize,
        document: &ParsedDocument,
        schema: &Schema,
    ) -> Option<(ElementType, Range)> {
        if !Self::on_node(op, byte_offset) {
            return None;
        }

        let op_type = operation_type(op);
        let keyword = op.operation_type();
        let on_keyword = keyword.as_ref().is_some_and(|k| Self::on_node(k, byte_offset));
        let on_name = op.name().as_ref().is_some_and(|n| Self::on_node(n, byte_offset));
        if on_keyword || on_name {
            let range = match (op.name(), keyword) {
                (Some(name), _) if on_name => document.node_range(&name),
                (_, Some(keyword)) => document.node_range(&keyword),
                _ => document.node_range(op),
            };
            return Some((
                ElementType::Operation {
                    operation_type: operation_keyword(op_type),
                    operation_name: op.name().map(|n| n.text().to_string()),
                },
                range,
            ));
        }

        if let Some(definitions) = op.variable_definitions() {
            for definition in definitions.variable_definitions() {
                if let Some(name) = definition.variable().and_then(|v| v.name()) {
                    if Self::on_node(&name, byte_offset) {
                        return Some((
                            ElementType::Variable {
                                var_name: name.text().to_string(),
                            },
                            document.node_range(&name),
                        ));
                    }
                }
                if let Some(element) = definition
                    .ty()
                    .and_then(|ty| Self::check_type(&ty, byte_offset, document))
                {
                    return Some(element);
                }
            }
        }

        if let Some(element) = Self::check_directives(op.directives(), byte_offset, document) {
            return Some(element);
        }

        let root = schema.root_operation(op_type)?;
        Self::check_selection_set(
            &op.selection_set()?,
            byte_offset,
            root.as_str(),
            document,
            schema,
        )
    }

    fn check_fragment(
        frag: &cst::FragmentDefinition,
        byte_offset: usize,
        document: &ParsedDocument,
        schema: &Schema,
    ) -> Option<(ElementType, Range)> {
        if !Self::on_node(frag, byte_offset) {
            return None;
        }

        let type_name = frag
            .type_condition()
            .and_then(|tc| tc.named_type())
            .and_then(|nt| nt.name());

        if let Some(name) = frag.fragment_name().and_then(|n| n.name()) {
            if Self::on_node(&name, byte_offset) {
                return Some((
                    ElementType::FragmentDefinition {
                        fragment_name: name.text().to_string(),
                        type_condition: type_name
                            .as_ref()
                            .map(|n| n.text().to_string())
                            .unwrap_or_default(),
                    },
                    document.node_range(&name),
                ));
            }
        }

        let type_name = type_name?;
        if Self::on_node(&type_name, byte_offset) {
            return Some((
                ElementType::TypeReference {
                    type_name: type_name.text().to_string(),
                },
                document.node_range(&type_name),
            ));
        }

        if let Some(element) = Self::check_directives(frag.directives(), byte_offset, document) {
            return Some(element);
        }

        Self::check_selection_set(
            &frag.selection_set()?,
            byte_offset,
            type_name.text().as_str(),
            document,
            schema,
        )
    }

    fn check_selection_set(
        selection_set: &cst::SelectionSet,
        byte_offset: usize,
        parent_type: &str,
        document: &ParsedDocument,
        schema: &Schema,
    ) -> Option<(ElementType, Range)> {
        for selection in selection_set.selections() {
            if !Self::on_node(&selection, byte_offset) {
                continue;
            }
            match selection {
                cst::Selection::Field(field) => {
                    let name = field.name()?;
                    if Self::on_node(&name, byte_offset) {
                        return Some((
                            ElementType::Field {
                                field_name: name.text().to_string(),
                                parent_type: parent_type.to_string(),
                            },
                            document.node_range(&name),
                        ));
                    }

                    if let Some(element) = field.arguments().and_then(|arguments| {
                        Self::check_arguments(
                            &arguments,
                            byte_offset,
                            name.text().as_str(),
                            parent_type,
                            document,
                            schema,
                        )
                    }) {
                        return Some(element);
                    }

                    if let Some(element) =
                        Self::check_directives(field.directives(), byte_offset, document)
                    {
                        return Some(element);
                    }

                    let nested_type = field_type_name(schema, parent_type, name.text().as_str())?;
                    return Self::check_selection_set(
                        &field.selection_set()?,
                        byte_offset,
                        &nested_type,
                        document,
                        schema,
                    );
                }
                cst::Selection::FragmentSpread(spread) => {
                    if let Some(name) = spread.fragment_name().and_then(|n| n.name()) {
                        if Self::on_node(&name, byte_offset) {
                            return Some((
                                ElementType::FragmentSpread {
                                    fragment_name: name.text().to_string(),
                                },
                                document.node_range(&name),
                            ));
                        }
                    }
                    return Self::check_directives(spread.directives(), byte_offset, document);
                }
                cst::Selection::InlineFragment(inline_frag) => {
                    let type_name = inline_frag
                        .type_condition()
                        .and_then(|tc| tc.named_type())
                        .and_then(|nt| nt.name());
                    if let Some(name) = &type_name {
                        if Self::on_node(name, byte_offset) {
                            return Some((
                                ElementType::TypeReference {
                                    type_name: name.text().to_string(),
                                },
                                document.node_range(name),
                            ));
                        }
                    }
                    if let Some(element) =
                        Self::check_directives(inline_frag.directives(), byte_offset, document)
                    {
                        return Some(element);
                    }
                    let type_name =
                        type_name.map_or_else(|| parent_type.to_string(), |n| n.text().to_string());
                    return Self::check_selection_set(
                        &inline_frag.selection_set()?,
                        byte_offset,
                        &type_name,
                        document,
                        schema,
                    );
                }
            }
        }

        None
    }

    fn check_arguments(
        arguments: &cst::Arguments,
        byte_offset: usize,
        field_name: &str,
        parent_type: &str,
        document: &ParsedDocument,
        schema: &Schema,
    ) -> Option<(ElementType, Range)> {
        for arg in arguments.arguments() {
            let Some(name) = arg.name() else {
                continue;
            };
            if Self::on_node(&name, byte_offset) {
                return Some((
                    ElementType::Argument {
                        arg_name: name.text().to_string(),
                        field_name: field_name.to_string(),
                        parent_type: parent_type.to_string(),
                    },
                    document.node_range(&name),
                ));
            }

            match arg.value() {
                Some(cst::Value::Variable(var)) => {
                    let var_name = var.name()?;
                    if Self::on_node(&var_name, byte_offset) {
                        return Some((
                            ElementType::Variable {
                                var_name: var_name.text().to_string(),
                            },
                            document.node_range(&var_name),
                        ));
                    }
                }
                Some(cst::Value::EnumValue(value)) if Self::on_node(&value, byte_offset) => {
                    let field = schema.type_field(parent_type, field_name).ok()?;
                    let argument = field
                        .arguments
                        .iter()
                        .find(|a| a.name == name.text().as_str())?;
                    let value_name = value.name()?;
                    return Some((
                        ElementType::EnumValue {
                            value_name: value_name.text().to_string(),
                            enum_type: argument.ty.inner_named_type().to_string(),
                        },
                        document.node_range(&value),
                    ));
                }
                _ => {}
            }
        }
        None
    }

    fn check_directives(
        directives: Option<cst::Directives>,
        byte_offset: usize,
        document: &ParsedDocument,
    ) -> Option<(ElementType, Range)> {
        directives?.directives().find_map(|directive| {
            let name = directive.name()?;
            Self::on_node(&directive, byte_offset).then(|| {
                (
                    ElementType::Directive {
                        directive_name: name.text().to_string(),
                    },
                    document.node_range(&directive),
                )
            })
        })
    }

    fn check_type(
        ty: &cst::Type,
        byte_offset: usize,
        document: &ParsedDocument,
    ) -> Option<(ElementType, Range)> {
        let name = ty
            .syntax()
            .descendants()
            .filter_map(cst::NamedType::cast)
            .find_map(|named| named.name())?;
        Self::on_node(&name, byte_offset).then(|| {
            (
                ElementType::TypeReference {
                    type_name: name.text().to_string(),
                },
                document.node_range(&name),
            )
        })
    }

    /// Named types referenced by fields of type definitions and extensions
    fn check_field_definitions(
        fields: Option<cst::FieldsDefinition>,
        byte_offset: usize,
        document: &ParsedDocument,
    ) -> Option<(ElementType, Range)> {
        fields?.field_definitions().find_map(|field| {
            field
                .ty()
                .and_then(|ty| Self::check_type(&ty, byte_offset, document))
        })
    }

    /// Generate hover content based on element type
    fn generate_hover_content(
        element_type: ElementType,
        schema: &MergedSchema,
        fragments: &[FragmentInfo],
    ) -> Option<String> {
        match element_type {
            ElementType::Field {
                field_name,
                parent_type,
            } => Self::generate_field_hover(&field_name, &parent_type, schema),
            ElementType::TypeReference { type_name } => {
                Self::generate_type_hover(&type_name, schema.schema())
            }
            ElementType::Argument {
                arg_name,
                field_name,
                parent_type,
            } => Self::generate_argument_hover(&arg_name, &field_name, &parent_type, schema.schema()),
            ElementType::Variable { var_name } => Some(format!(
                "### Variable: `${var_name}`\n\nVariable usage in this operation"
            )),
            ElementType::FragmentSpread { fragment_name } => {
                Some(Self::generate_fragment_hover(&fragment_name, fragments))
            }
            ElementType::FragmentDefinition {
                fragment_name,
                type_condition,
            } => Some(format!(
                "### Fragment: `{fragment_name}`\n**Type condition:** `{type_condition}`"
            )),
            ElementType::Directive { directive_name } => {
                Self::generate_directive_hover(&directive_name, schema.schema())
            }
            ElementType::EnumValue {
                value_name,
                enum_type,
            } => Self::generate_enum_value_hover(&value_name, &enum_type, schema.schema()),
            ElementType::Operation {
                operation_type,
                operation_name,
            } => {
                let name_part = operation_name
                    .map(|n| format!(" `{n}`"))
                    .unwrap_or_default();
                Some(format!(
                    "### {} Operation{name_part}\n\nGraphQL {operation_type} operation",
                    operation_type.to_uppercase(),
                ))
            }
        }
    }

    fn generate_field_hover(
        field_name: &str,
        parent_type: &str,
        schema: &MergedSchema,
    ) -> Option<String> {
        if field_name == "__typename" {
            return Some(format!(
                "### Field: `__typename`\n**Type:** `String!`\n\nThe name of the current Object type at runtime.\n\n**Defined in:** `{parent_type}` type"
            ));
        }
        let field = schema.schema().type_field(parent_type, field_name).ok()?;

        let mut content = format!("### Field: `{field_name}`\n");
        content.push_str(&format!("**Type:** `{}`\n\n", field.ty));

        if let Some(description) = &field.description {
            content.push_str(description);
            content.push_str("\n\n");
        }

        if let Some(reason) = deprecation_reason(&field.directives) {
            content.push_str(&format!("⚠️ **Deprecated:** {reason}\n\n"));
        }

        if !field.arguments.is_empty() {
            content.push_str("**Arguments:**\n");
            for arg in &field.arguments {
                content.push_str(&format!("- `{}`: `{}`", arg.name, arg.ty));
                if let Some(default) = &arg.default_value {
                    content.push_str(&format!(" = `{default}`"));
                }
                if let Some(desc) = &arg.description {
                    content.push_str(&format!(" - {desc}"));
                }
                content.push('\n');
            }
            content.push('\n');
        }

        if schema.is_client_only(parent_type, field_name) {
            content.push_str("**Resolved locally** (client-only field)\n\n");
        }

        content.push_str(&format!("**Defined in:** `{parent_type}` type"));
        Some(content)
    }

    fn generate_type_hover(type_name: &str, schema: &Schema) -> Option<String> {
        let ty = schema.types.get(type_name)?;

        let mut content = format!("### Type: `{type_name}`\n**Kind:** {}\n\n", type_kind(ty));

        if let Some(description) = ty.description() {
            content.push_str(description);
            content.push_str("\n\n");
        }

        let fields = fields_of(schema, type_name);
        if !fields.is_empty() {
            content.push_str("**Fields:**\n");
            for field in fields.iter().take(10) {
                content.push_str(&format!("- `{}`: `{}`", field.name, field.ty));
                if deprecation_reason(&field.directives).is_some() {
                    content.push_str(" ⚠️");
                }
                content.push('\n');
            }
            if fields.len() > 10 {
                content.push_str(&format!("- ... and {} more\n", fields.len() - 10));
            }
        }

        if let ExtendedType::Enum(enum_type) = ty {
            content.push_str("**Values:**\n");
            for value in enum_type.values.keys() {
                content.push_str(&format!("- `{value}`\n"));
            }
        }

        Some(content.trim_end().to_string())
    }

    fn generate_argument_hover(
        arg_name: &str,
        field_name: &str,
        parent_type: &str,
        schema: &Schema,
    ) -> Option<String> {
        let field = schema.type_field(parent_type, field_name).ok()?;
        let arg = field.arguments.iter().find(|a| a.name == arg_name)?;

        let mut content = format!("### Argument: `{arg_name}`\n");
        content.push_str(&format!("**Type:** `{}`\n\n", arg.ty));

        if let Some(description) = &arg.description {
            content.push_str(description);
            content.push_str("\n\n");
        }

        if let Some(default) = &arg.default_value {
            content.push_str(&format!("**Default value:** `{default}`\n\n"));
        }

        let required = arg.ty.is_non_null() && arg.default_value.is_none();
        content.push_str(&format!(
            "**Required:** {}\n\n",
            if required { "Yes" } else { "No" }
        ));

        content.push_str(&format!(
            "**Defined in:** `{parent_type}.{field_name}` field"
        ));
        Some(content)
    }

    fn generate_fragment_hover(fragment_name: &str, fragments: &[FragmentInfo]) -> String {
        let Some(fragment) = fragments.iter().find(|f| f.name == fragment_name) else {
            return format!("### Fragment Spread: `{fragment_name}`\n\nReferences the fragment definition");
        };
        format!(
            "### Fragment: `{fragment_name}`\n**Type condition:** `{}`\n\n```graphql\n{}\n```",
            fragment.type_condition, fragment.text
        )
    }

    fn generate_directive_hover(directive_name: &str, schema: &Schema) -> Option<String> {
        let directive = schema.directive_definitions.get(directive_name)?;

        let mut content = format!("### Directive: `@{directive_name}`\n\n");

        if let Some(description) = &directive.description {
            content.push_str(description);
            content.push_str("\n\n");
        }

        if !directive.arguments.is_empty() {
            content.push_str("**Arguments:**\n");
            for arg in &directive.arguments {
                content.push_str(&format!("- `{}`: `{}`\n", arg.name, arg.ty));
            }
            content.push('\n');
        }

        Some(content.trim_end().to_string())
    }

    fn generate_enum_value_hover(
        value_name: &str,
        enum_type: &str,
        schema: &Schema,
    ) -> Option<String> {
        let Some(ExtendedType::Enum(enum_def)) = schema.types.get(enum_type) else {
            return None;
        };
        let value = enum_def.values.get(value_name)?;

        let mut content = format!("### Enum Value: `{value_name}`\n**Enum:** `{enum_type}`\n\n");
        if let Some(description) = &value.description {
            content.push_str(description);
            content.push_str("\n\n");
        }
        if let Some(reason) = deprecation_reason(&value.directives) {
            content.push_str(&format!("⚠️ **Deprecated:** {reason}\n\n"));
        }
        Some(content.trim_end().to_string())
    }
}
