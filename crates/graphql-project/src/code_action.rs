use crate::validation::ValidationRule;
use crate::{Diagnostic, ParsedDocument, Range};
use apollo_parser::cst::{self, CstNode};

/// A single replacement in a host file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Range,
    /// Empty text deletes the range
    pub new_text: String,
}

impl TextEdit {
    #[must_use]
    pub fn new(range: Range, new_text: impl Into<String>) -> Self {
        Self {
            range,
            new_text: new_text.into(),
        }
    }
}

/// A quick fix for one diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFix {
    pub label: String,
    pub edits: Vec<TextEdit>,
    /// The diagnostic this fix resolves
    pub diagnostic: Diagnostic,
}

impl CodeFix {
    #[must_use]
    pub fn new(label: impl Into<String>, edits: Vec<TextEdit>, diagnostic: Diagnostic) -> Self {
        Self {
            label: label.into(),
            edits,
            diagnostic,
        }
    }
}

/// Quick fixes for the diagnostics of `documents` that intersect `range`
#[must_use]
pub fn code_actions(
    documents: &[&ParsedDocument],
    diagnostics: &[Diagnostic],
    range: Range,
) -> Vec<CodeFix> {
    let rule = ValidationRule::NoMissingClientDirectives.name();

    diagnostics
        .iter()
        .filter(|diagnostic| diagnostic.code.as_deref() == Some(rule))
        .filter(|diagnostic| diagnostic.range.intersects(&range))
        .filter_map(|diagnostic| {
            let document = documents
                .iter()
                .find(|document| document.contains_position(diagnostic.range.start))?;
            let insert_at = client_directive_insertion(document, diagnostic.range)?;
            Some(CodeFix::new(
                "Add @client directive",
                vec![TextEdit::new(Range::new(insert_at, insert_at), " @client")],
                diagnostic.clone(),
            ))
        })
        .collect()
}

/// Where ` @client` goes for the field named at `name_range`: after its
/// arguments if it has any, otherwise right after the name
fn client_directive_insertion(
    document: &ParsedDocument,
    name_range: Range,
) -> Option<crate::Position> {
    let field = document
        .document()
        .syntax()
        .descendants()
        .filter_map(cst::Field::cast)
        .find(|field| {
            field
                .name()
                .is_some_and(|name| document.node_range(&name) == name_range)
        })?;

    Some(match field.arguments() {
        Some(arguments) => document.node_range(&arguments).end,
        None => name_range.end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::{document_at, droid_schema};
    use crate::validation::Validator;
    use crate::Position;

    fn fixes(body: &str, range: Range) -> Vec<CodeFix> {
        let document = document_at(body, 1, 1);
        let diagnostics = Validator::default().validate_document(&document, &droid_schema(), &[]);
        code_actions(&[&document], &diagnostics, range)
    }

    #[test]
    fn test_add_client_directive() {
        let body = "query Hero {\n  hero {\n    isFavorite\n  }\n}";
        let range = Range::new(Position::new(2, 6), Position::new(2, 6));

        let fixes = fixes(body, range);
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].label, "Add @client directive");
        assert_eq!(
            fixes[0].edits,
            vec![TextEdit::new(
                Range::new(Position::new(2, 14), Position::new(2, 14)),
                " @client"
            )]
        );
    }

    #[test]
    fn test_no_fix_outside_range() {
        let body = "query Hero {\n  hero {\n    isFavorite\n  }\n}";
        let range = Range::new(Position::new(0, 0), Position::new(0, 5));
        assert!(fixes(body, range).is_empty());
    }

    #[test]
    fn test_no_fix_for_other_diagnostics() {
        let body = "query {\n  hero {\n    name\n  }\n}";
        let range = Range::new(Position::new(0, 0), Position::new(4, 1));
        assert!(fixes(body, range).is_empty());
    }
}
