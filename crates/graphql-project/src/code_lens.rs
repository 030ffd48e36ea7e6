//! Code lenses: fragment reference counts and explorer links.

use crate::{ParsedDocument, Range};

pub const SHOW_REFERENCES_COMMAND: &str = "editor.action.showReferences";
pub const RUN_IN_EXPLORER_COMMAND: &str = "graphql.runInExplorer";

/// An actionable annotation shown above a definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLens {
    pub range: Range,
    pub title: String,
    pub command: Option<CodeLensCommand>,
}

impl CodeLens {
    pub fn new(range: Range, title: impl Into<String>) -> Self {
        Self {
            range,
            title: title.into(),
            command: None,
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: CodeLensCommand) -> Self {
        self.command = Some(command);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeLensCommand {
    pub command: String,
    pub title: String,
    pub arguments: Vec<String>,
}

impl CodeLensCommand {
    pub fn new(command: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            title: title.into(),
            arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_arguments(mut self, arguments: Vec<String>) -> Self {
        self.arguments = arguments;
        self
    }
}

/// Code lenses for the fragments of one host file.
///
/// `project_documents` is every document of the project and is searched for
/// fragment spreads. Explorer lenses are only produced when `explorer` is set,
/// which callers do for projects backed by a remote schema.
#[must_use]
pub fn code_lenses(
    documents: &[&ParsedDocument],
    project_documents: &[&ParsedDocument],
    explorer: bool,
) -> Vec<CodeLens> {
    let spreads: Vec<(String, Range)> = project_documents
        .iter()
        .flat_map(|document| document.fragment_spreads())
        .collect();

    let mut lenses = Vec::new();
    for document in documents {
        for fragment in document.fragments() {
            let usage_count = spreads
                .iter()
                .filter(|(name, _)| *name == fragment.name)
                .count();
            let title = if usage_count == 1 {
                "1 reference".to_string()
            } else {
                format!("{usage_count} references")
            };
            let start = fragment.range.start;
            let command = CodeLensCommand::new(SHOW_REFERENCES_COMMAND, &title).with_arguments(
                vec![
                    fragment.uri.clone(),
                    format!("{}:{}", start.line, start.character),
                    fragment.name.clone(),
                ],
            );
            lenses.push(CodeLens::new(Range::new(start, start), title).with_command(command));
        }

        if !explorer {
            continue;
        }
        for operation in document.operations() {
            let Some(name) = operation.name else {
                continue;
            };
            let start = operation.range.start;
            let command = CodeLensCommand::new(RUN_IN_EXPLORER_COMMAND, "Run in Explorer")
                .with_arguments(vec![name, operation.text]);
            lenses.push(
                CodeLens::new(Range::new(start, start), "Run in Explorer").with_command(command),
            );
        }
    }

    tracing::debug!(lens_count = lenses.len(), "Computed code lenses");
    lenses
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::tests::document_at;
    use crate::Position;

    const FRAGMENTS: &str = "fragment DroidName on Droid { name }\nfragment Unused on Droid { id }";

    #[test]
    fn test_fragment_reference_counts() {
        let current = document_at(FRAGMENTS, 3, 1);
        let queries = document_at(
            "query A { hero { ...DroidName } }\nquery B { hero { ...DroidName } }",
            10,
            1,
        );
        let single = document_at("fragment Other on Droid { ...Unused }", 20, 1);

        let lenses = code_lenses(&[&current], &[&current, &queries, &single], false);
        let titles: Vec<_> = lenses.iter().map(|lens| lens.title.as_str()).collect();
        assert_eq!(titles, vec!["2 references", "1 reference"]);

        let command = lenses[0].command.as_ref().unwrap();
        assert_eq!(command.command, SHOW_REFERENCES_COMMAND);
        assert_eq!(
            command.arguments,
            vec!["file:///src/app.ts", "2:0", "DroidName"]
        );
        assert_eq!(
            lenses[1].range,
            Range::new(Position::new(3, 0), Position::new(3, 0))
        );
    }

    #[test]
    fn test_unreferenced_fragment() {
        let current = document_at(FRAGMENTS, 1, 1);
        let lenses = code_lenses(&[&current], &[&current], false);
        assert_eq!(lenses[0].title, "0 references");
    }

    #[test]
    fn test_explorer_lenses_for_named_operations() {
        let current = document_at("query Hero { hero { name } }\n{ hero { id } }", 1, 1);

        assert!(code_lenses(&[&current], &[&current], false).is_empty());

        let lenses = code_lenses(&[&current], &[&current], true);
        assert_eq!(lenses.len(), 1);
        assert_eq!(lenses[0].title, "Run in Explorer");
        let command = lenses[0].command.as_ref().unwrap();
        assert_eq!(command.command, RUN_IN_EXPLORER_COMMAND);
        assert_eq!(command.arguments[0], "Hero");
        assert!(command.arguments[1].starts_with("query Hero"));
    }
}
