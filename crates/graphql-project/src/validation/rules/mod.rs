mod no_anonymous_queries;
mod no_missing_client_directives;
mod no_typename_alias;

pub use no_anonymous_queries::NoAnonymousQueries;
pub use no_missing_client_directives::NoMissingClientDirectives;
pub use no_typename_alias::NoTypenameAlias;

use super::ValidationRule;
use crate::{Diagnostic, MergedSchema, ParsedDocument};

/// A check that runs over one syntactically valid document
pub trait DocumentRule: Send + Sync {
    fn rule(&self) -> ValidationRule;

    fn check(&self, document: &ParsedDocument, schema: &MergedSchema) -> Vec<Diagnostic>;
}

/// Every client-specific rule
pub fn all_rules() -> Vec<Box<dyn DocumentRule>> {
    vec![
        Box::new(NoAnonymousQueries),
        Box::new(NoTypenameAlias),
        Box::new(NoMissingClientDirectives),
    ]
}
