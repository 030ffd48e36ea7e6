//! Validation of executable documents against a merged schema.
//!
//! Standard GraphQL validation comes from `apollo-compiler`; client-specific
//! rules live in [`rules`]. A [`RuleFilter`] decides which rules report.

pub mod rules;

use crate::{Diagnostic, MergedSchema, ParsedDocument};
use apollo_compiler::diagnostic::ToCliReport;
use apollo_compiler::ExecutableDocument;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// The validation rules a filter can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationRule {
    NoAnonymousQueries,
    NoTypenameAlias,
    NoMissingClientDirectives,
    /// Fragments defined but never spread in the same document
    NoUnusedFragments,
    /// Directives that are not declared in the schema
    KnownDirectives,
    /// Every other rule of the GraphQL specification
    Specified,
}

impl ValidationRule {
    pub const ALL: [Self; 6] = [
        Self::NoAnonymousQueries,
        Self::NoTypenameAlias,
        Self::NoMissingClientDirectives,
        Self::NoUnusedFragments,
        Self::KnownDirectives,
        Self::Specified,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoAnonymousQueries => "NoAnonymousQueries",
            Self::NoTypenameAlias => "NoTypenameAlias",
            Self::NoMissingClientDirectives => "NoMissingClientDirectives",
            Self::NoUnusedFragments => "NoUnusedFragments",
            Self::KnownDirectives => "KnownDirectives",
            Self::Specified => "Specified",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rule| rule.name() == name)
    }

    /// Classify an `apollo-compiler` validation message
    fn classify(message: &str) -> Self {
        if message.contains("must be used in an operation") {
            Self::NoUnusedFragments
        } else if message.contains("cannot find directive") {
            Self::KnownDirectives
        } else {
            Self::Specified
        }
    }
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decides whether a rule's diagnostics are reported
pub type RuleFilter = Arc<dyn Fn(ValidationRule) -> bool + Send + Sync>;

/// Everything except unused fragments and unknown directives.
///
/// Fragments are shared between files, and client directives need not be
/// declared by the server.
#[must_use]
pub fn default_rule_filter() -> RuleFilter {
    Arc::new(|rule| {
        !matches!(
            rule,
            ValidationRule::NoUnusedFragments | ValidationRule::KnownDirectives
        )
    })
}

/// A fragment definition available to documents that spread it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFragment {
    pub name: String,
    pub text: String,
}

/// Runs the enabled rules over documents
#[derive(Clone)]
pub struct Validator {
    filter: RuleFilter,
    rules: Arc<Vec<Box<dyn rules::DocumentRule>>>,
}

impl Validator {
    #[must_use]
    pub fn new(filter: RuleFilter) -> Self {
        Self {
            filter,
            rules: Arc::new(rules::all_rules()),
        }
    }

    #[must_use]
    pub fn is_enabled(&self, rule: ValidationRule) -> bool {
        (self.filter)(rule)
    }

    /// Validate one document.
    ///
    /// `fragments` are definitions from elsewhere in the project; those the
    /// document defines itself are ignored, and problems inside them are not
    /// reported here.
    #[must_use]
    pub fn validate_document(
        &self,
        document: &ParsedDocument,
        schema: &MergedSchema,
        fragments: &[ExternalFragment],
    ) -> Vec<Diagnostic> {
        if document.has_parse_errors() || !document.has_executable_definitions() {
            return Vec::new();
        }

        let mut diagnostics = self.specified_rules(document, schema, fragments);
        for rule in self.rules.iter() {
            if self.is_enabled(rule.rule()) {
                diagnostics.extend(rule.check(document, schema));
            }
        }
        diagnostics
    }

    fn specified_rules(
        &self,
        document: &ParsedDocument,
        schema: &MergedSchema,
        fragments: &[ExternalFragment],
    ) -> Vec<Diagnostic> {
        let mut defined: HashSet<String> = document
            .fragment_definitions()
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        let mut text = document.executable_text();
        for fragment in fragments {
            if defined.insert(fragment.name.clone()) {
                text.push('\n');
                text.push_str(&fragment.text);
            }
        }

        let body_len = document.text().len();
        let Err(with_errors) =
            ExecutableDocument::parse_and_validate(schema.schema(), text, document.uri())
        else {
            return Vec::new();
        };

        let mut diagnostics = Vec::new();
        for diag in with_errors.errors.iter() {
            let message = diag.error.to_string();
            let rule = ValidationRule::classify(&message);
            if !self.is_enabled(rule) {
                continue;
            }
            let Some(location) = diag.error.location() else {
                continue;
            };
            let in_document = diag
                .sources
                .get(&location.file_id())
                .is_some_and(|file| file.path() == Path::new(document.uri()));
            // Spans past the body point into fragments appended from other files
            if !in_document || location.offset() > body_len {
                continue;
            }
            let end = location.end_offset().min(body_len);

            let diagnostic = Diagnostic::error(document.range_of(location.offset(), end), message);
            diagnostics.push(match rule {
                ValidationRule::Specified => diagnostic,
                _ => diagnostic.with_code(rule.name()),
            });
        }
        diagnostics
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(default_rule_filter())
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled: Vec<_> = ValidationRule::ALL
            .into_iter()
            .filter(|rule| self.is_enabled(*rule))
            .collect();
        f.debug_struct("Validator").field("enabled", &enabled).finish()
    }
}
