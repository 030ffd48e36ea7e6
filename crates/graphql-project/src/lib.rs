mod client_schema;
mod code_action;
mod code_lens;
mod completion;
mod debug_log;
mod decorations;
mod diagnostics;
mod document;
mod error;
mod find_references;
mod fractional_index;
mod fragment_sync;
mod goto_definition;
mod hover;
mod loading;
mod project;
mod provider;
mod schema_info;
mod symbols;
mod validation;
mod visit;
mod workspace;

pub use client_schema::{merge, ClientOnlyFields, MergedSchema, CLIENT_DIRECTIVES_SDL};
pub use code_action::{code_actions, CodeFix, TextEdit};
pub use code_lens::{
    code_lenses, CodeLens, CodeLensCommand, RUN_IN_EXPLORER_COMMAND, SHOW_REFERENCES_COMMAND,
};
pub use completion::{
    CompletionItem, CompletionItemKind, CompletionMode, CompletionProvider, InsertTextFormat,
};
pub use debug_log::{noop_log, DebugLog, NoopDebugLog, TracingDebugLog};
pub use decorations::{decorations, Decoration, DecorationOptions, RUN_IN_EXPLORER_LABEL};
pub use diagnostics::{Diagnostic, FileDiagnostics, Location, Position, Range, Severity};
pub use document::{FragmentInfo, OperationInfo, ParsedDocument, TypeDefinitionInfo};
pub use error::{FractionalIndexError, ProjectError, Result, SchemaProviderError};
pub use find_references::FindReferencesProvider;
pub use fractional_index::{generate_key_between, INTEGER_ZERO};
pub use fragment_sync::{
    diff_fragments, virtual_uri, DelegateConnection, DocumentSynchronizer, FragmentRecord,
    SyncDiff, SyncEvent,
};
pub use goto_definition::GotoDefinitionProvider;
pub use hover::{HoverInfo, HoverProvider};
pub use loading::{LoadingHandler, LoadingNotifier, NoopLoadingNotifier};
pub use project::{
    path_to_uri, uri_to_path, NoopProjectListener, Project, ProjectListener, ProjectServices,
    ProjectState, TextDocument,
};
pub use provider::{
    EndpointSchemaProvider, FieldLatencies, FileSchemaProvider, RegistryClient, RegistrySchema,
    RegistrySchemaProvider, ResolveOptions, SchemaChangeHandler, SchemaProvider, SchemaSource,
    SchemaSubscription, ServerSchema,
};
pub use symbols::{document_symbols, DocumentSymbol, SymbolKind};
pub use validation::{default_rule_filter, ExternalFragment, RuleFilter, ValidationRule, Validator};
pub use workspace::Workspace;

// Re-export common types from dependencies
pub use graphql_config::{ProjectConfig, ProjectKind, ServiceConfig};
pub use graphql_extract::SourceFragment;
pub use tokio_util::sync::CancellationToken;
