use super::{DocumentRule, ValidationRule};
use crate::{Diagnostic, MergedSchema, ParsedDocument};
use apollo_parser::cst::{self, CstNode};

/// Operations must be named so they can be tracked by name
pub struct NoAnonymousQueries;

impl DocumentRule for NoAnonymousQueries {
    fn rule(&self) -> ValidationRule {
        ValidationRule::NoAnonymousQueries
    }

    fn check(&self, document: &ParsedDocument, _schema: &MergedSchema) -> Vec<Diagnostic> {
        document
            .document()
            .definitions()
            .filter_map(|definition| match definition {
                cst::Definition::OperationDefinition(operation) if operation.name().is_none() => {
                    // Point at the operation keyword, or the opening brace of a shorthand query
                    let range = operation.operation_type().map_or_else(
                        || {
                            operation.selection_set().map_or_else(
                                || document.node_range(&operation),
                                |selection_set| {
                                    let start: usize =
                                        selection_set.syntax().text_range().start().into();
                                    document.range_of(start, start + 1)
                                },
                            )
                        },
                        |op_type| document.node_range(&op_type),
                    );
                    Some(
                        Diagnostic::error(range, "Apollo does not support anonymous operations")
                            .with_code(self.rule().name()),
                    )
                }
                _ => None,
            })
            .collect()
    }
}
