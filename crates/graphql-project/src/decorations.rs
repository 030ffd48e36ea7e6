//! Informational annotations shown inline in host files.

use crate::provider::FieldLatencies;
use crate::visit::walk_fields;
use crate::{MergedSchema, ParsedDocument, Range};

pub const RUN_IN_EXPLORER_LABEL: &str = "Run in Explorer ▷";

/// Text attached to a range of a host file. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub uri: String,
    pub range: Range,
    pub message: String,
}

/// Inputs that do not depend on the document
#[derive(Debug, Clone, Default)]
pub struct DecorationOptions {
    /// Measured latency per `Type.field`
    pub latencies: Option<FieldLatencies>,
    /// Latencies below this many milliseconds are not shown
    pub latency_threshold_ms: Option<f64>,
    /// Offer explorer links on named operations
    pub explorer: bool,
}

#[must_use]
pub fn decorations(
    document: &ParsedDocument,
    schema: &MergedSchema,
    options: &DecorationOptions,
) -> Vec<Decoration> {
    let mut decorations = Vec::new();
    if document.has_parse_errors() {
        return decorations;
    }

    if options.explorer {
        for operation in document.operations() {
            if let Some(name_range) = operation.name_range {
                decorations.push(Decoration {
                    uri: document.uri().to_string(),
                    range: name_range,
                    message: RUN_IN_EXPLORER_LABEL.to_string(),
                });
            }
        }
    }

    if let Some(latencies) = options.latencies.as_deref() {
        let threshold = options.latency_threshold_ms.unwrap_or(0.0);
        walk_fields(&document.document(), schema.schema(), &mut |visit| {
            let Some(name) = visit.field.name() else {
                return;
            };
            let key = format!("{}.{}", visit.parent_type, name.text().as_str());
            let Some(&latency) = latencies.get(&key) else {
                return;
            };
            if latency < threshold {
                return;
            }
            decorations.push(Decoration {
                uri: document.uri().to_string(),
                range: document.node_range(&name),
                message: format_latency(latency),
            });
        });
    }

    decorations
}

fn format_latency(ms: f64) -> String {
    if ms < 1.0 {
        "~<1 ms".to_string()
    } else {
        format!("~{ms:.0} ms")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::{document_at, droid_schema};
    use crate::Position;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn latencies() -> FieldLatencies {
        Arc::new(HashMap::from([
            ("Query.hero".to_string(), 12.4),
            ("Droid.name".to_string(), 0.2),
            ("Droid.friends".to_string(), 140.0),
        ]))
    }

    #[test]
    fn test_latency_decorations() {
        let document = document_at("query Hero {\n  hero {\n    name\n    id\n  }\n}", 1, 1);
        let options = DecorationOptions {
            latencies: Some(latencies()),
            ..DecorationOptions::default()
        };

        let found = decorations(&document, &droid_schema(), &options);
        let messages: Vec<_> = found
            .iter()
            .map(|d| (d.range.start, d.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (Position::new(1, 2), "~12 ms"),
                (Position::new(2, 4), "~<1 ms"),
            ]
        );
    }

    #[test]
    fn test_latency_threshold_hides_fast_fields() {
        let document = document_at("query Hero { hero { name friends { id } } }", 1, 1);
        let options = DecorationOptions {
            latencies: Some(latencies()),
            latency_threshold_ms: Some(50.0),
            explorer: false,
        };

        let found = decorations(&document, &droid_schema(), &options);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "~140 ms");
    }

    #[test]
    fn test_explorer_decoration_per_named_operation() {
        let document = document_at("query Hero { hero { name } }\nquery { hero { id } }", 1, 1);
        let options = DecorationOptions {
            explorer: true,
            ..DecorationOptions::default()
        };

        let found = decorations(&document, &droid_schema(), &options);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, RUN_IN_EXPLORER_LABEL);
        assert_eq!(
            found[0].range,
            Range::new(Position::new(0, 6), Position::new(0, 10))
        );
    }

    #[test]
    fn test_no_decorations_without_inputs() {
        let document = document_at("query Hero { hero { name } }", 1, 1);
        assert!(decorations(&document, &droid_schema(), &DecorationOptions::default()).is_empty());
    }
}
