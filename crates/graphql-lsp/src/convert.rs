//! Conversions between `graphql-project` results and LSP types.
//!
//! The project layer identifies files by canonical `file://` strings; these
//! helpers are the only place that touches `lsp_types::Uri`.

#![allow(clippy::cast_possible_truncation)]

use graphql_project::{
    path_to_uri, uri_to_path, CodeFix, CodeLens, CompletionItem, CompletionItemKind, Diagnostic,
    DocumentSymbol, HoverInfo, InsertTextFormat, Location, Position, Range, Severity, SymbolKind,
};
use lsp_types::{
    CodeAction, CodeActionKind, Command, CompletionItemTag, DiagnosticSeverity, Documentation,
    HoverContents, MarkupContent, MarkupKind, NumberOrString, TextEdit, Uri, WorkspaceEdit,
};
use std::collections::HashMap;
use tower_lsp_server::UriExt;

pub const DIAGNOSTIC_SOURCE: &str = "graphql";

/// Canonical project URI for an editor URI. Non-file URIs are not tracked.
pub fn project_uri(uri: &Uri) -> Option<String> {
    uri.to_file_path().map(|path| path_to_uri(&path))
}

pub fn lsp_uri(uri: &str) -> Option<Uri> {
    Uri::from_file_path(uri_to_path(uri))
}

pub const fn lsp_position(position: Position) -> lsp_types::Position {
    lsp_types::Position {
        line: position.line as u32,
        character: position.character as u32,
    }
}

pub const fn project_position(position: lsp_types::Position) -> Position {
    Position {
        line: position.line as usize,
        character: position.character as usize,
    }
}

pub const fn lsp_range(range: Range) -> lsp_types::Range {
    lsp_types::Range {
        start: lsp_position(range.start),
        end: lsp_position(range.end),
    }
}

pub const fn project_range(range: lsp_types::Range) -> Range {
    Range::new(project_position(range.start), project_position(range.end))
}

pub fn lsp_location(location: &Location) -> Option<lsp_types::Location> {
    Some(lsp_types::Location {
        uri: lsp_uri(&location.uri)?,
        range: lsp_range(location.range),
    })
}

pub fn lsp_diagnostic(diagnostic: &Diagnostic) -> lsp_types::Diagnostic {
    let severity = match diagnostic.severity {
        Severity::Error => DiagnosticSeverity::ERROR,
        Severity::Warning => DiagnosticSeverity::WARNING,
        Severity::Information => DiagnosticSeverity::INFORMATION,
        Severity::Hint => DiagnosticSeverity::HINT,
    };

    lsp_types::Diagnostic {
        range: lsp_range(diagnostic.range),
        severity: Some(severity),
        code: diagnostic.code.clone().map(NumberOrString::String),
        source: Some(diagnostic.source.clone()),
        message: diagnostic.message.clone(),
        ..Default::default()
    }
}

pub fn lsp_completion_item(item: CompletionItem) -> lsp_types::CompletionItem {
    let kind = match item.kind {
        CompletionItemKind::Field => lsp_types::CompletionItemKind::FIELD,
        CompletionItemKind::Type => lsp_types::CompletionItemKind::CLASS,
        CompletionItemKind::Fragment => lsp_types::CompletionItemKind::SNIPPET,
        CompletionItemKind::Directive => lsp_types::CompletionItemKind::KEYWORD,
        CompletionItemKind::DirectiveLocation => lsp_types::CompletionItemKind::CONSTANT,
        CompletionItemKind::EnumValue => lsp_types::CompletionItemKind::ENUM_MEMBER,
        CompletionItemKind::Argument => lsp_types::CompletionItemKind::VARIABLE,
    };
    let insert_text_format = match item.insert_text_format {
        InsertTextFormat::PlainText => lsp_types::InsertTextFormat::PLAIN_TEXT,
        InsertTextFormat::Snippet => lsp_types::InsertTextFormat::SNIPPET,
    };

    lsp_types::CompletionItem {
        label: item.label,
        kind: Some(kind),
        detail: item.detail,
        documentation: item.documentation.map(|value| {
            Documentation::MarkupContent(MarkupContent {
                kind: MarkupKind::Markdown,
                value,
            })
        }),
        tags: item.deprecated.then(|| vec![CompletionItemTag::DEPRECATED]),
        insert_text: item.insert_text,
        insert_text_format: Some(insert_text_format),
        ..Default::default()
    }
}

pub fn lsp_hover(info: HoverInfo) -> lsp_types::Hover {
    lsp_types::Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value: info.contents,
        }),
        range: info.range.map(lsp_range),
    }
}

#[allow(deprecated)]
pub fn lsp_document_symbol(symbol: DocumentSymbol) -> lsp_types::DocumentSymbol {
    let kind = match symbol.kind {
        SymbolKind::Query | SymbolKind::Subscription => lsp_types::SymbolKind::FUNCTION,
        SymbolKind::Mutation => lsp_types::SymbolKind::METHOD,
        SymbolKind::Fragment => lsp_types::SymbolKind::STRUCT,
    };

    lsp_types::DocumentSymbol {
        name: symbol.name,
        detail: symbol.detail,
        kind,
        tags: None,
        deprecated: None,
        range: lsp_range(symbol.range),
        selection_range: lsp_range(symbol.selection_range),
        children: None,
    }
}

pub fn lsp_code_lens(lens: CodeLens) -> lsp_types::CodeLens {
    let command = lens.command.map(|command| Command {
        title: command.title,
        command: command.command,
        arguments: Some(
            command
                .arguments
                .into_iter()
                .map(serde_json::Value::String)
                .collect(),
        ),
    });

    lsp_types::CodeLens {
        range: lsp_range(lens.range),
        command,
        data: None,
    }
}

pub fn lsp_code_action(uri: &Uri, fix: CodeFix) -> CodeAction {
    let edits = fix
        .edits
        .into_iter()
        .map(|edit| TextEdit {
            range: lsp_range(edit.range),
            new_text: edit.new_text,
        })
        .collect();

    CodeAction {
        title: fix.label,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![lsp_diagnostic(&fix.diagnostic)]),
        edit: Some(WorkspaceEdit {
            changes: Some(HashMap::from([(uri.clone(), edits)])),
            ..Default::default()
        }),
        is_preferred: Some(true),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphql_project::{CodeLensCommand, TextEdit as ProjectEdit};

    fn range(start: (usize, usize), end: (usize, usize)) -> Range {
        Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
    }

    #[test]
    fn test_uri_round_trip() {
        let uri = lsp_uri("file:///work/app/src/index.ts").unwrap();
        assert_eq!(
            project_uri(&uri).as_deref(),
            Some("file:///work/app/src/index.ts")
        );
    }

    #[test]
    fn test_diagnostic_conversion() {
        let diagnostic = Diagnostic::warning(range((3, 4), (3, 14)), "Missing @client")
            .with_code("NoMissingClientDirectives");

        let converted = lsp_diagnostic(&diagnostic);
        assert_eq!(converted.severity, Some(DiagnosticSeverity::WARNING));
        assert_eq!(converted.range.start, lsp_types::Position::new(3, 4));
        assert_eq!(converted.range.end, lsp_types::Position::new(3, 14));
        assert_eq!(
            converted.code,
            Some(NumberOrString::String("NoMissingClientDirectives".to_string()))
        );
        assert_eq!(converted.source.as_deref(), Some("GraphQL: Validation"));
    }

    #[test]
    fn test_completion_conversion() {
        let item = CompletionItem::new("hero", CompletionItemKind::Field)
            .with_detail("Droid")
            .with_deprecated(true)
            .with_snippet("hero {\n  $1\n}".to_string());

        let converted = lsp_completion_item(item);
        assert_eq!(converted.kind, Some(lsp_types::CompletionItemKind::FIELD));
        assert_eq!(
            converted.insert_text_format,
            Some(lsp_types::InsertTextFormat::SNIPPET)
        );
        assert_eq!(converted.tags, Some(vec![CompletionItemTag::DEPRECATED]));
    }

    #[test]
    fn test_code_lens_arguments_become_strings() {
        let lens = CodeLens::new(range((2, 0), (2, 0)), "2 references").with_command(
            CodeLensCommand::new("editor.action.showReferences", "2 references")
                .with_arguments(vec!["file:///a.ts".to_string(), "2:0".to_string()]),
        );

        let command = lsp_code_lens(lens).command.unwrap();
        assert_eq!(command.command, "editor.action.showReferences");
        assert_eq!(
            command.arguments,
            Some(vec![
                serde_json::json!("file:///a.ts"),
                serde_json::json!("2:0")
            ])
        );
    }

    #[test]
    fn test_code_action_edits_target_document() {
        let uri = lsp_uri("file:///src/app.ts").unwrap();
        let diagnostic = Diagnostic::warning(range((2, 4), (2, 14)), "Missing @client");
        let fix = CodeFix::new(
            "Add @client directive",
            vec![ProjectEdit::new(range((2, 14), (2, 14)), " @client")],
            diagnostic,
        );

        let action = lsp_code_action(&uri, fix);
        assert_eq!(action.kind, Some(CodeActionKind::QUICKFIX));
        let changes = action.edit.unwrap().changes.unwrap();
        assert_eq!(changes[&uri][0].new_text, " @client");
        assert_eq!(changes[&uri][0].range.start, lsp_types::Position::new(2, 14));
    }
}
