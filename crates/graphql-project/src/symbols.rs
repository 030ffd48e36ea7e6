//! Document symbols: the outline of operations and fragments in a host file.

use crate::visit::operation_keyword;
use crate::{ParsedDocument, Range};
use apollo_compiler::ast::OperationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Query,
    Mutation,
    Subscription,
    Fragment,
}

impl From<OperationType> for SymbolKind {
    fn from(operation_type: OperationType) -> Self {
        match operation_type {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

/// A named definition in a host file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSymbol {
    pub name: String,
    pub kind: SymbolKind,
    /// Operation keyword or fragment type condition
    pub detail: Option<String>,
    /// The whole definition
    pub range: Range,
    /// Just the name
    pub selection_range: Range,
}

impl DocumentSymbol {
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        range: Range,
        selection_range: Range,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            detail: None,
            range,
            selection_range,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Symbols for every definition in the fragments of one host file, in
/// source order
#[must_use]
pub fn document_symbols(documents: &[&ParsedDocument]) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();

    for document in documents {
        for operation in document.operations() {
            let keyword = operation_keyword(operation.operation_type);
            let name = operation
                .name
                .unwrap_or_else(|| format!("Anonymous {keyword}"));
            let selection_range = operation.name_range.unwrap_or(operation.range);
            symbols.push(
                DocumentSymbol::new(
                    name,
                    operation.operation_type.into(),
                    operation.range,
                    selection_range,
                )
                .with_detail(keyword),
            );
        }

        for fragment in document.fragments() {
            symbols.push(
                DocumentSymbol::new(
                    fragment.name,
                    SymbolKind::Fragment,
                    fragment.range,
                    fragment.name_range,
                )
                .with_detail(format!("on {}", fragment.type_condition)),
            );
        }
    }

    symbols.sort_by_key(|symbol| symbol.range.start);
    symbols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::document_at;
    use crate::Position;

    #[test]
    fn test_symbols_for_operations_and_fragments() {
        let first = document_at(
            "fragment DroidName on Droid { name }\nquery Hero { hero { ...DroidName } }",
            2,
            13,
        );
        let second = document_at("mutation { save }", 8, 1);

        let symbols = document_symbols(&[&second, &first]);
        let outline: Vec<_> = symbols
            .iter()
            .map(|s| (s.name.as_str(), s.kind, s.detail.as_deref()))
            .collect();
        assert_eq!(
            outline,
            vec![
                ("DroidName", SymbolKind::Fragment, Some("on Droid")),
                ("Hero", SymbolKind::Query, Some("query")),
                ("Anonymous mutation", SymbolKind::Mutation, Some("mutation")),
            ]
        );

        assert_eq!(
            symbols[0].selection_range,
            Range::new(Position::new(1, 21), Position::new(1, 30))
        );
        assert_eq!(
            symbols[1].range,
            Range::new(Position::new(2, 0), Position::new(2, 36))
        );
        assert_eq!(symbols[2].selection_range, symbols[2].range);
    }
}
