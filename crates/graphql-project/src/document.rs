use crate::visit::operation_type;
use crate::{Diagnostic, Position, Range};
use apollo_compiler::ast::OperationType;
use apollo_parser::{
    cst::{self, CstNode},
    Parser, SyntaxTree,
};
use graphql_extract::{LineIndex, SourceFragment};
use std::sync::Arc;

const SYNTAX_SOURCE: &str = "GraphQL: Syntax";

/// A fragment definition and where it sits in its host file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentInfo {
    pub name: String,
    pub type_condition: String,
    pub uri: String,
    pub text: String,
    pub name_range: Range,
    pub range: Range,
}

/// An operation definition and where it sits in its host file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationInfo {
    pub name: Option<String>,
    pub operation_type: OperationType,
    pub name_range: Option<Range>,
    pub range: Range,
    pub text: String,
}

/// A type definition or extension declared in a client document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefinitionInfo {
    pub name: String,
    pub uri: String,
    pub name_range: Range,
    /// Declared fields and the range of each field name
    pub fields: Vec<(String, Range)>,
}

/// One extracted fragment, parsed.
///
/// Never mutated after construction; a changed fragment produces a new document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    source: SourceFragment,
    tree: Arc<SyntaxTree>,
    line_index: LineIndex,
    syntax_errors: Vec<Diagnostic>,
}

impl ParsedDocument {
    #[must_use]
    pub fn new(source: SourceFragment) -> Self {
        let tree = Parser::new(&source.body).parse();
        let line_index = LineIndex::new(&source.body);

        let mut document = Self {
            source,
            tree: Arc::new(tree),
            line_index,
            syntax_errors: Vec::new(),
        };

        if document.tree.errors().len() > 0 && !document.looks_commented_out() {
            // Only the first error is reported; later ones are usually cascades
            if let Some(error) = document.tree.errors().next() {
                let start = error.index();
                let end = start + error.data().len();
                let range = document.range_of(start, end);
                document.syntax_errors.push(
                    Diagnostic::error(range, format!("Syntax Error: {}", error.message()))
                        .with_source(SYNTAX_SOURCE),
                );
            }
        }

        document
    }

    /// Text that was commented out in the host file still gets extracted. Such
    /// fragments are inert, so their syntax errors are not reported.
    fn looks_commented_out(&self) -> bool {
        let body = &self.source.body;
        (body.contains("/*") && body.contains("*/")) || body.contains("//")
    }

    #[must_use]
    pub const fn source(&self) -> &SourceFragment {
        &self.source
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.source.body
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.source.origin_uri
    }

    #[must_use]
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// The concrete syntax tree, even when it contains errors
    #[must_use]
    pub fn document(&self) -> cst::Document {
        self.tree.document()
    }

    /// The parsed document, or `None` if parsing failed
    #[must_use]
    pub fn ast(&self) -> Option<cst::Document> {
        if self.has_parse_errors() {
            None
        } else {
            Some(self.tree.document())
        }
    }

    #[must_use]
    pub fn has_parse_errors(&self) -> bool {
        self.tree.errors().len() > 0
    }

    #[must_use]
    pub fn syntax_errors(&self) -> &[Diagnostic] {
        &self.syntax_errors
    }

    #[must_use]
    pub fn contains_position(&self, position: Position) -> bool {
        self.source.contains_position(position)
    }

    /// Translate a host position into a byte offset within the fragment body
    #[must_use]
    pub fn offset_at(&self, position: Position) -> Option<usize> {
        let local = self.source.to_fragment(position)?;
        self.line_index.position_to_offset(&self.source.body, local)
    }

    /// Host position of a byte offset within the fragment body
    #[must_use]
    pub fn position_at(&self, offset: usize) -> Position {
        self.source
            .to_host(self.line_index.offset_to_position(&self.source.body, offset))
    }

    /// Host range of a byte span within the fragment body
    #[must_use]
    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range::new(self.position_at(start), self.position_at(end))
    }

    /// Host range of a syntax node, excluding trailing whitespace
    #[must_use]
    pub fn node_range(&self, node: &impl CstNode) -> Range {
        let (start, end) = trimmed_span(node);
        self.range_of(start, end)
    }

    /// Names of the operations defined in this document
    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.document()
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::OperationDefinition(op) => Some(op.name()?.text().to_string()),
                _ => None,
            })
            .collect()
    }

    /// Fragment definitions as `(name, source text)` pairs
    #[must_use]
    pub fn fragment_definitions(&self) -> Vec<(String, String)> {
        self.document()
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::FragmentDefinition(fragment) => {
                    let name = fragment.fragment_name()?.name()?.text().to_string();
                    Some((name, fragment.syntax().text().to_string()))
                }
                _ => None,
            })
            .collect()
    }

    /// Fragment definitions with host ranges; unnamed ones are skipped
    #[must_use]
    pub fn fragments(&self) -> Vec<FragmentInfo> {
        self.document()
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::FragmentDefinition(fragment) => {
                    let name = fragment.fragment_name()?.name()?;
                    let type_condition = fragment
                        .type_condition()
                        .and_then(|condition| condition.named_type())
                        .and_then(|named| named.name())
                        .map(|name| name.text().to_string())
                        .unwrap_or_default();
                    Some(FragmentInfo {
                        name: name.text().to_string(),
                        type_condition,
                        uri: self.uri().to_string(),
                        text: fragment.syntax().text().to_string(),
                        name_range: self.node_range(&name),
                        range: self.node_range(&fragment),
                    })
                }
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.document()
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::OperationDefinition(operation) => {
                    let name = operation.name();
                    Some(OperationInfo {
                        name: name.as_ref().map(|name| name.text().to_string()),
                        operation_type: operation_type(&operation),
                        name_range: name.as_ref().map(|name| self.node_range(name)),
                        range: self.node_range(&operation),
                        text: operation.syntax().text().to_string(),
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Every fragment spread as `(fragment name, host range of the name)`
    #[must_use]
    pub fn fragment_spreads(&self) -> Vec<(String, Range)> {
        self.document()
            .syntax()
            .descendants()
            .filter_map(cst::FragmentSpread::cast)
            .filter_map(|spread| spread.fragment_name()?.name())
            .map(|name| (name.text().to_string(), self.node_range(&name)))
            .collect()
    }

    /// Named type definitions and extensions with host ranges
    #[must_use]
    pub fn type_definitions(&self) -> Vec<TypeDefinitionInfo> {
        self.document()
            .definitions()
            .filter_map(|definition| {
                let (name, fields) = match &definition {
                    cst::Definition::ObjectTypeDefinition(def) => {
                        (def.name(), def.fields_definition())
                    }
                    cst::Definition::ObjectTypeExtension(ext) => {
                        (ext.name(), ext.fields_definition())
                    }
                    cst::Definition::InterfaceTypeDefinition(def) => {
                        (def.name(), def.fields_definition())
                    }
                    cst::Definition::InterfaceTypeExtension(ext) => {
                        (ext.name(), ext.fields_definition())
                    }
                    cst::Definition::EnumTypeDefinition(def) => (def.name(), None),
                    cst::Definition::ScalarTypeDefinition(def) => (def.name(), None),
                    cst::Definition::UnionTypeDefinition(def) => (def.name(), None),
                    cst::Definition::InputObjectTypeDefinition(def) => (def.name(), None),
                    _ => return None,
                };
                let name = name?;
                let fields = fields
                    .map(|fields| {
                        fields
                            .field_definitions()
                            .filter_map(|field| field.name())
                            .map(|field| (field.text().to_string(), self.node_range(&field)))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(TypeDefinitionInfo {
                    name: name.text().to_string(),
                    uri: self.uri().to_string(),
                    name_range: self.node_range(&name),
                    fields,
                })
            })
            .collect()
    }

    /// Source text of every type system definition and extension
    #[must_use]
    pub fn type_system_definitions(&self) -> Vec<String> {
        if self.has_parse_errors() {
            return Vec::new();
        }
        self.document()
            .definitions()
            .filter(|definition| !is_executable(definition))
            .map(|definition| definition.syntax().text().to_string())
            .collect()
    }

    #[must_use]
    pub fn has_executable_definitions(&self) -> bool {
        self.document().definitions().any(|d| is_executable(&d))
    }

    /// The body with type system definitions blanked out, keeping every
    /// remaining character at its original line and column
    #[must_use]
    pub fn executable_text(&self) -> String {
        let body = &self.source.body;
        let mut text = String::with_capacity(body.len());
        let mut cursor = 0;

        for definition in self.document().definitions() {
            if is_executable(&definition) {
                continue;
            }
            let range = definition.syntax().text_range();
            let (start, end): (usize, usize) = (range.start().into(), range.end().into());
            text.push_str(&body[cursor..start]);
            text.extend(
                body[start..end]
                    .chars()
                    .map(|ch| match ch {
                        '\n' | '\r' => ch.to_string(),
                        // Byte length is kept so offsets past this point still line up
                        _ => " ".repeat(ch.len_utf8()),
                    }),
            );
            cursor = end;
        }
        text.push_str(&body[cursor..]);
        text
    }
}

/// Byte span of a node. The parser attaches trailing whitespace and commas
/// to the preceding node; they are left out here.
pub(crate) fn trimmed_span(node: &impl CstNode) -> (usize, usize) {
    let syntax = node.syntax();
    let start: usize = syntax.text_range().start().into();
    let text = syntax.text().to_string();
    let visible = text.trim_end_matches(|c: char| c.is_whitespace() || c == ',');
    (start, start + visible.len())
}

pub(crate) const fn is_executable(definition: &cst::Definition) -> bool {
    matches!(
        definition,
        cst::Definition::OperationDefinition(_) | cst::Definition::FragmentDefinition(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphql_extract::LocationOffset;

    fn parse(body: &str, line: usize, column: usize) -> ParsedDocument {
        ParsedDocument::new(SourceFragment::new(
            body,
            "file:///src/app.ts",
            LocationOffset::new(line, column),
        ))
    }

    #[test]
    fn test_valid_document_has_ast() {
        let doc = parse("query Hero { hero { name } }", 1, 1);
        assert!(doc.ast().is_some());
        assert!(doc.syntax_errors().is_empty());
        assert_eq!(doc.operation_names(), vec!["Hero".to_string()]);
    }

    #[test]
    fn test_syntax_error_is_reported_once() {
        let doc = parse("query Hero { hero { name }", 1, 1);
        assert!(doc.ast().is_none());
        assert_eq!(doc.syntax_errors().len(), 1);
        assert!(doc.syntax_errors()[0].message.starts_with("Syntax Error"));
        assert_eq!(doc.syntax_errors()[0].source, SYNTAX_SOURCE);
    }

    #[test]
    fn test_commented_out_fragment_is_silent() {
        let doc = parse("query { // hero { name }", 1, 1);
        assert!(doc.ast().is_none());
        assert!(doc.syntax_errors().is_empty());

        let doc = parse("/* query { */ hero", 1, 1);
        assert!(doc.syntax_errors().is_empty());
    }

    #[test]
    fn test_syntax_error_is_shifted_by_offset() {
        let body = "query Hero { hero { name } ]";
        let plain = parse(body, 1, 1);
        let shifted = parse(body, 5, 10);

        let plain_range = plain.syntax_errors()[0].range;
        let shifted_range = shifted.syntax_errors()[0].range;
        assert_eq!(shifted_range.start.line, plain_range.start.line + 4);
        assert_eq!(
            shifted_range.start.character,
            plain_range.start.character + 9
        );
    }

    #[test]
    fn test_position_translation() {
        let doc = parse("\n  query Q {\n    viewer\n  }\n", 3, 20);

        assert!(!doc.contains_position(Position::new(1, 0)));
        assert!(doc.contains_position(Position::new(2, 25)));
        assert!(doc.contains_position(Position::new(6, 0)));
        assert!(!doc.contains_position(Position::new(7, 0)));

        let offset = doc.offset_at(Position::new(4, 4)).unwrap();
        assert_eq!(&doc.text()[offset..offset + 6], "viewer");
        assert_eq!(doc.position_at(offset), Position::new(4, 4));
    }

    #[test]
    fn test_definitions_carry_host_ranges() {
        let doc = parse(
            "query Hero { hero { ...DroidName } }\nfragment DroidName on Droid { name }",
            3,
            5,
        );

        let operations = doc.operations();
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].name.as_deref(), Some("Hero"));
        assert_eq!(operations[0].operation_type, OperationType::Query);
        assert_eq!(
            operations[0].name_range,
            Some(Range::new(Position::new(2, 10), Position::new(2, 14)))
        );

        let fragments = doc.fragments();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].name, "DroidName");
        assert_eq!(fragments[0].type_condition, "Droid");
        assert_eq!(fragments[0].name_range.start, Position::new(3, 9));
        assert!(fragments[0].text.starts_with("fragment DroidName"));

        let spreads = doc.fragment_spreads();
        assert_eq!(spreads.len(), 1);
        assert_eq!(spreads[0].0, "DroidName");
        assert_eq!(
            spreads[0].1,
            Range::new(Position::new(2, 27), Position::new(2, 36))
        );
    }

    #[test]
    fn test_type_definitions_list_fields() {
        let doc = parse(
            "extend type Droid {\n  isFavorite: Boolean\n}\nenum Mood { HAPPY }",
            1,
            1,
        );

        let types = doc.type_definitions();
        assert_eq!(types.len(), 2);
        assert_eq!(types[0].name, "Droid");
        assert_eq!(
            types[0].name_range,
            Range::new(Position::new(0, 12), Position::new(0, 17))
        );
        assert_eq!(
            types[0].fields,
            vec![(
                "isFavorite".to_string(),
                Range::new(Position::new(1, 2), Position::new(1, 12))
            )]
        );
        assert_eq!(types[1].name, "Mood");
        assert!(types[1].fields.is_empty());
    }

    #[test]
    fn test_executable_text_blanks_type_system() {
        let body = "extend type Droid {\n  model: String\n}\nquery Q { droid { model } }";
        let doc = parse(body, 1, 1);

        let text = doc.executable_text();
        assert_eq!(text.len(), body.len());
        assert_eq!(text.lines().count(), body.lines().count());
        assert!(!text.contains("extend"));
        assert!(text.contains("query Q"));
        assert_eq!(doc.type_system_definitions().len(), 1);
        assert!(doc.has_executable_definitions());
    }

    #[test]
    fn test_executable_text_keeps_byte_offsets_with_unicode() {
        let body = "extend type Droid { \"Zoë 😀\" nick: String } query Q { hero { id } }";
        let doc = parse(body, 1, 1);

        let text = doc.executable_text();
        assert_eq!(text.len(), body.len());
        assert_eq!(text.find("query Q"), body.find("query Q"));
    }
}
