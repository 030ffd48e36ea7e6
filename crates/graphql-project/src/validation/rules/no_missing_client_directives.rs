use super::{DocumentRule, ValidationRule};
use crate::visit::walk_fields;
use crate::{Diagnostic, MergedSchema, ParsedDocument};

/// Fields that only exist in the client schema must be marked `@client`,
/// directly or on an enclosing selection
pub struct NoMissingClientDirectives;

impl DocumentRule for NoMissingClientDirectives {
    fn rule(&self) -> ValidationRule {
        ValidationRule::NoMissingClientDirectives
    }

    fn check(&self, document: &ParsedDocument, schema: &MergedSchema) -> Vec<Diagnostic> {
        if schema.client_only().is_empty() {
            return Vec::new();
        }

        let mut diagnostics = Vec::new();
        walk_fields(&document.document(), schema.schema(), &mut |visit| {
            if visit.in_client_context {
                return;
            }
            let Some(name) = visit.field.name() else {
                return;
            };
            if schema.is_client_only(visit.parent_type, name.text().as_str()) {
                diagnostics.push(
                    Diagnostic::error(
                        document.node_range(&name),
                        format!(
                            "@client directive is missing on local field \"{}\"",
                            name.text().as_str()
                        ),
                    )
                    .with_code(self.rule().name()),
                );
            }
        });
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::{check, droid_schema};
    use crate::Position;

    #[test]
    fn test_missing_client_directive() {
        let schema = droid_schema();
        let diagnostics = check(
            &NoMissingClientDirectives,
            "query Hero {\n  hero {\n    name\n    isFavorite\n  }\n}",
            &schema,
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range.start, Position::new(3, 4));
        assert_eq!(diagnostics[0].range.end, Position::new(3, 14));
        assert!(diagnostics[0].message.contains("\"isFavorite\""));
    }

    #[test]
    fn test_client_directive_on_field_or_ancestor() {
        let schema = droid_schema();
        for body in [
            "query Hero { hero { name isFavorite @client } }",
            "query Hero { hero @client { name isFavorite } }",
            "query Hero { hero { ... on Droid @client { isFavorite } } }",
            "fragment Fav on Droid @client { isFavorite }",
        ] {
            let diagnostics = check(&NoMissingClientDirectives, body, &schema);
            assert!(diagnostics.is_empty(), "unexpected diagnostic for {body}");
        }
    }
}
