use crate::diagnostics::Location;
use crate::document::trimmed_span;
use crate::visit::walk_fields;
use crate::{MergedSchema, ParsedDocument, Position};
use apollo_parser::cst::{self, CstNode};

/// Type of GraphQL element at a position
#[derive(Debug, Clone, PartialEq, Eq)]
enum ElementType {
    Fragment { fragment_name: String },
    Type { type_name: String },
    Field { field_name: String, parent_type: String },
}

/// Find references provider
#[derive(Debug, Default)]
pub struct FindReferencesProvider;

impl FindReferencesProvider {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// All references to the element at a host position, across `documents`.
    ///
    /// `documents` is every parsed document of the project, including the one
    /// holding the cursor.
    #[must_use]
    pub fn find_references(
        &self,
        document: &ParsedDocument,
        position: Position,
        schema: &MergedSchema,
        documents: &[&ParsedDocument],
        include_declaration: bool,
    ) -> Option<Vec<Location>> {
        tracing::debug!(
            line = position.line,
            character = position.character,
            include_declaration,
            "find_references called"
        );

        let byte_offset = document.offset_at(position)?;
        let element = Self::find_element_at_position(document, byte_offset, schema)?;

        let mut references = Vec::new();
        for doc in documents {
            if include_declaration {
                Self::collect_declarations(&element, doc, &mut references);
            }
            Self::collect_usages(&element, doc, schema, &mut references);
        }

        tracing::debug!(count = references.len(), "Found references");
        Some(references)
    }

    fn on_node(node: &impl CstNode, byte_offset: usize) -> bool {
        let (start, end) = trimmed_span(node);
        byte_offset >= start && byte_offset <= end
    }

    fn find_element_at_position(
        document: &ParsedDocument,
        byte_offset: usize,
        schema: &MergedSchema,
    ) -> Option<ElementType> {
        let doc = document.document();

        for node in doc.syntax().descendants() {
            let name = if let Some(definition) = cst::FragmentDefinition::cast(node.clone()) {
                definition.fragment_name().and_then(|n| n.name())
            } else if let Some(spread) = cst::FragmentSpread::cast(node.clone()) {
                spread.fragment_name().and_then(|n| n.name())
            } else {
                None
            };
            if let Some(name) = name.filter(|n| Self::on_node(n, byte_offset)) {
                return Some(ElementType::Fragment {
                    fragment_name: name.text().to_string(),
                });
            }

            if let Some(named) = cst::NamedType::cast(node) {
                if let Some(name) = named.name().filter(|n| Self::on_node(n, byte_offset)) {
                    return Some(ElementType::Type {
                        type_name: name.text().to_string(),
                    });
                }
            }
        }

        if let Some(ty) = document
            .type_definitions()
            .into_iter()
            .find(|ty| Self::range_holds(document, ty.name_range, byte_offset))
        {
            return Some(ElementType::Type { type_name: ty.name });
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

    fn range_holds(document: &ParsedDocument, range: crate::Range, byte_offset: usize) -> bool {
        let position = document.position_at(byte_offset);
        range.start <= position && position <= range.end
    }

    fn collect_declarations(
        element: &ElementType,
        document: &ParsedDocument,
        references: &mut Vec<Location>,
    ) {
        match element {
            ElementType::Fragment { fragment_name } => references.extend(
                document
                    .fragments()
                    .into_iter()
                    .filter(|fragment| fragment.name == *fragment_name)
                    .map(|fragment| Location::new(fragment.uri, fragment.name_range)),
            ),
            ElementType::Type { type_name } => references.extend(
                document
                    .type_definitions()
                    .into_iter()
                    .filter(|ty| ty.name == *type_name)
                    .map(|ty| Location::new(ty.uri, ty.name_range)),
            ),
            ElementType::Field {
                field_name,
                parent_type,
            } => {
                for ty in document.type_definitions() {
                    if ty.name != *parent_type {
                        continue;
                    }
                    references.extend(
                        ty.fields
                            .iter()
                            .filter(|(name, _)| name == field_name)
                            .map(|(_, range)| Location::new(ty.uri.clone(), *range)),
                    );
                }
            }
        }
    }

    fn collect_usages(
        element: &ElementType,
        document: &ParsedDocument,
        schema: &MergedSchema,
        references: &mut Vec<Location>,
    ) {
        match element {
            ElementType::Fragment { fragment_name } => references.extend(
                document
                    .fragment_spreads()
                    .into_iter()
                    .filter(|(name, _)| name == fragment_name)
                    .map(|(_, range)| Location::new(document.uri(), range)),
            ),
            ElementType::Type { type_name } => references.extend(
                document
                    .document()
                    .syntax()
                    .descendants()
                    .filter_map(cst::NamedType::cast)
                    .filter_map(|named| named.name())
                    .filter(|name| name.text() == type_name.as_str())
                    .map(|name| Location::new(document.uri(), document.node_range(&name))),
            ),
            ElementType::Field {
                field_name,
                parent_type,
            } => {
                walk_fields(&document.document(), schema.schema(), &mut |visit| {
                    if visit.parent_type != parent_type.as_str() {
                        return;
                    }
                    if let Some(name) = visit
                        .field
                        .name()
                        .filter(|name| name.text() == field_name.as_str())
                    {
                        references.push(Location::new(document.uri(), document.node_range(&name)));
                    }
                });
            }
        }
    }
}
