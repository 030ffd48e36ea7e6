use super::{DocumentRule, ValidationRule};
use crate::{Diagnostic, MergedSchema, ParsedDocument};
use apollo_parser::cst::{self, CstNode};

/// `__typename` is reserved for the cache and may not be used as an alias
pub struct NoTypenameAlias;

impl DocumentRule for NoTypenameAlias {
    fn rule(&self) -> ValidationRule {
        ValidationRule::NoTypenameAlias
    }

    fn check(&self, document: &ParsedDocument, _schema: &MergedSchema) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for node in document.document().syntax().descendants() {
            let Some(alias) = cst::Alias::cast(node) else {
                continue;
            };
            let Some(name) = alias.name() else {
                continue;
            };
            if name.text() == "__typename" {
                diagnostics.push(
                    Diagnostic::error(
                        document.node_range(&alias),
                        "Apollo needs to be able to insert __typename when needed, \
                         please do not use it as an alias",
                    )
                    .with_code(self.rule().name()),
                );
            }
        }
        diagnostics
    }
}
