use crate::document::{trimmed_span, FragmentInfo, TypeDefinitionInfo};
use crate::diagnostics::Location;
use crate::visit::walk_fields;
use crate::{MergedSchema, ParsedDocument, Position};
use apollo_parser::cst::{self, CstNode};

/// Type of GraphQL element at a position
#[derive(Debug, Clone, PartialEq, Eq)]
enum ElementType {
    FragmentSpread { fragment_name: String },
    FragmentDefinition { fragment_name: String },
    OperationDefinition { location: Location },
    Variable { location: Location },
    TypeReference { type_name: String },
    Field { field_name: String, parent_type: String },
}

/// Go-to-definition provider
#[derive(Debug, Default)]
pub struct GotoDefinitionProvider;

impl GotoDefinitionProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Definitions of the element at a host position.
    ///
    /// Fragments resolve across every project document. Types and fields
    /// resolve only to definitions made in client documents; server types have
    /// no location in the workspace.
    #[must_use]
    pub fn goto_definition(
        &self,
        document: &ParsedDocument,
        position: Position,
        schema: &MergedSchema,
        fragments: &[FragmentInfo],
        types: &[TypeDefinitionInfo],
    ) -> Option<Vec<Location>> {
        let byte_offset = document.offset_at(position)?;
        let element = Self::find_element_at_position(document, byte_offset, schema)?;
        tracing::debug!(element = ?element, "Resolving definition");

        let locations = Self::resolve_definition(element, fragments, types);
        if locations.is_empty() {
            None
        } else {
            Some(locations)
        }
    }

    fn find_element_at_position(
        document: &ParsedDocument,
        byte_offset: usize,
        schema: &MergedSchema,
    ) -> Option<ElementType> {
        let doc = document.document();

        for definition in doc.definitions() {
            match definition {
                cst::Definition::OperationDefinition(op) => {
                    if let Some(name) = op.name().filter(|n| Self::on_node(n, byte_offset)) {
                        return Some(ElementType::OperationDefinition {
                            location: Location::new(document.uri(), document.node_range(&name)),
                        });
                    }
                    if let Some(location) = Self::check_variables(&op, byte_offset, document) {
                        return Some(ElementType::Variable { location });
                    }
                }
                cst::Definition::FragmentDefinition(frag) => {
                    if let Some(name) = frag
                        .fragment_name()
                        .and_then(|n| n.name())
                        .filter(|n| Self::on_node(n, byte_offset))
                    {
                        return Some(ElementType::FragmentDefinition {
                            fragment_name: name.text().to_string(),
                        });
                    }
                }
                _ => {}
            }
        }

        for node in doc.syntax().descendants() {
            if let Some(spread) = cst::FragmentSpread::cast(node.clone()) {
                if let Some(name) = spread
                    .fragment_name()
                    .and_then(|n| n.name())
                    .filter(|n| Self::on_node(n, byte_offset))
                {
                    return Some(ElementType::FragmentSpread {
                        fragment_name: name.text().to_string(),
                    });
                }
            } else if let Some(named) = cst::NamedType::cast(node) {
                if let Some(name) = named.name().filter(|n| Self::on_node(n, byte_offset)) {
                    return Some(ElementType::TypeReference {
                        type_name: name.text().to_string(),
                    });
                }
            }
        }

        let mut found = None;
        walk_fields(&doc, schema.schema(), &mut |visit| {
            if found.is_some() {
                return;
            }
            if let Some(name) = visit.field.name().filter(|n| Self::on_node(n, byte_offset)) {
                found = Some(ElementType::Field {
                    field_name: name.text().to_string(),
                    parent_type: visit.parent_type.to_string(),
                });
            }
        });
        found
    }

    /// The definition of a variable used inside `op`
    fn check_variables(
        op: &cst::OperationDefinition,
        byte_offset: usize,
        document: &ParsedDocument,
    ) -> Option<Location> {
        let used = op
            .syntax()
            .descendants()
            .filter_map(cst::Variable::cast)
            .filter_map(|variable| variable.name())
            .find(|name| Self::on_node(name, byte_offset))?;

        op.variable_definitions()?
            .variable_definitions()
            .filter_map(|definition| definition.variable())
            .find(|variable| variable.name().is_some_and(|n| n.text() == used.text().as_str()))
            .map(|variable| Location::new(document.uri(), document.node_range(&variable)))
    }

    fn on_node(node: &impl CstNode, byte_offset: usize) -> bool {
        let (start, end) = trimmed_span(node);
        byte_offset >= start && byte_offset <= end
    }

    fn resolve_definition(
        element: ElementType,
        fragments: &[FragmentInfo],
        types: &[TypeDefinitionInfo],
    ) -> Vec<Location> {
        match element {
            ElementType::FragmentSpread { fragment_name }
            | ElementType::FragmentDefinition { fragment_name } => fragments
                .iter()
                .filter(|fragment| fragment.name == fragment_name)
                .map(|fragment| Location::new(fragment.uri.clone(), fragment.name_range))
                .collect(),
            ElementType::OperationDefinition { location } | ElementType::Variable { location } => {
                vec![location]
            }
            ElementType::TypeReference { type_name } => types
                .iter()
                .filter(|ty| ty.name == type_name)
                .map(|ty| Location::new(ty.uri.clone(), ty.name_range))
                .collect(),
            ElementType::Field {
                field_name,
                parent_type,
            } => types
                .iter()
                .filter(|ty| ty.name == parent_type)
                .flat_map(|ty| {
                    ty.fields
                        .iter()
                        .filter(|(name, _)| *name == field_name)
                        .map(|(_, range)| Location::new(ty.uri.clone(), *range))
                })
                .collect(),
        }
    }
}
