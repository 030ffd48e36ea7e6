use crate::client_bridge::ClientBridge;
use crate::convert::{
    lsp_code_action, lsp_code_lens, lsp_completion_item, lsp_document_symbol, lsp_hover,
    lsp_location, project_position, project_range, project_uri,
};
use crate::debounce::{Debouncer, RequestKey};
use dashmap::DashMap;
use graphql_config::CONFIG_FILES;
use graphql_extract::LanguageId;
use graphql_project::{
    uri_to_path, CancellationToken, Project, ProjectServices, TextDocument, Workspace,
};
use lsp_types::{
    CodeActionOrCommand, CodeActionParams, CodeActionProviderCapability, CodeActionResponse,
    CodeLens, CodeLensOptions, CodeLensParams, CompletionOptions, CompletionParams,
    CompletionResponse, DidChangeTextDocumentParams, DidChangeWatchedFilesParams,
    DidChangeWatchedFilesRegistrationOptions, DidChangeWorkspaceFoldersParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentSymbolParams, DocumentSymbolResponse, FileChangeType, FileSystemWatcher, GlobPattern,
    GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverParams, HoverProviderCapability,
    InitializeParams, InitializeResult, InitializedParams, Location, MessageType, OneOf,
    ReferenceParams, Registration, ServerCapabilities, ServerInfo, TextDocumentSyncCapability,
    TextDocumentSyncKind, Uri, WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp_server::jsonrpc::Result;
use tower_lsp_server::{Client, LanguageServer, UriExt};

const CONFIG_GLOB: &str = "**/apollo.config.{json,yaml,yml}";
const SOURCE_GLOB: &str = "**/*.{graphql,gql,graphqls,js,jsx,ts,tsx,vue,svelte,py,rb,dart,ex,exs,re}";

pub struct GraphQLLanguageServer {
    client: Client,
    workspace: Arc<Workspace>,
    /// Workspace folders from initialization, loaded once the client is ready
    init_workspace_folders: DashMap<String, PathBuf>,
    /// Version and language id of each document the editor has open
    open_documents: DashMap<String, (i32, String)>,
    completion_debounce: Debouncer<RequestKey, Option<CompletionResponse>>,
    hover_debounce: Debouncer<RequestKey, Option<Hover>>,
    code_lens_debounce: Debouncer<RequestKey, Option<Vec<CodeLens>>>,
}

impl GraphQLLanguageServer {
    pub fn new(client: Client) -> Self {
        let bridge = ClientBridge::spawn(client.clone());
        let services = ProjectServices {
            listener: Arc::new(bridge.clone()),
            loading: Arc::new(bridge.clone()),
            log: Arc::new(bridge),
            ..ProjectServices::default()
        };

        Self {
            client,
            workspace: Arc::new(Workspace::new(services)),
            init_workspace_folders: DashMap::new(),
            open_documents: DashMap::new(),
            completion_debounce: Debouncer::default(),
            hover_debounce: Debouncer::default(),
            code_lens_debounce: Debouncer::default(),
        }
    }

    /// The project owning an editor document, with the document's project URI
    fn project_for(&self, uri: &Uri) -> Option<(String, Arc<Project>)> {
        let uri = project_uri(uri)?;
        let Some(project) = self.workspace.project_for_uri(&uri) else {
            tracing::debug!(uri = %uri, "No project for document");
            return None;
        };
        Some((uri, project))
    }

    fn request_key(&self, uri: &str, position: Option<lsp_types::Position>) -> RequestKey {
        RequestKey {
            uri: uri.to_string(),
            version: self.open_documents.get(uri).map(|entry| entry.0),
            position: position.map(|p| (p.line, p.character)),
        }
    }

    /// Run a project query off the async executor.
    ///
    /// The query's token is cancelled if the request is dropped, which is how
    /// the client's `$/cancelRequest` reaches it.
    async fn query<T, F>(query: F) -> T
    where
        T: Default + Send + 'static,
        F: FnOnce(&CancellationToken) -> T + Send + 'static,
    {
        let token = CancellationToken::new();
        let _cancel_on_drop = token.clone().drop_guard();
        tokio::task::spawn_blocking(move || query(&token))
            .await
            .unwrap_or_else(|error| {
                tracing::error!(error = %error, "Query task failed");
                T::default()
            })
    }

    /// Make the project state for `uri` match the file on disk
    async fn sync_from_disk(&self, uri: &str) {
        let path = uri_to_path(uri);
        let Some(language) = LanguageId::from_path(&path) else {
            return;
        };

        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let document = TextDocument::new(uri, language.as_str(), 0, text);
                self.workspace.documents_changed(&[document]).await;
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                self.workspace.document_deleted(uri).await;
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), error = %error, "Failed to read file");
            }
        }
    }

    async fn register_file_watchers(&self) {
        let options = DidChangeWatchedFilesRegistrationOptions {
            watchers: [CONFIG_GLOB, SOURCE_GLOB]
                .into_iter()
                .map(|glob| FileSystemWatcher {
                    glob_pattern: GlobPattern::String(glob.to_string()),
                    kind: None,
                })
                .collect(),
        };
        let registration = Registration {
            id: "graphql-watched-files".to_string(),
            method: "workspace/didChangeWatchedFiles".to_string(),
            register_options: serde_json::to_value(options).ok(),
        };

        if let Err(error) = self.client.register_capability(vec![registration]).await {
            tracing::warn!(error = %error, "Client does not support file watching");
        }
    }
}

fn is_config_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| CONFIG_FILES.contains(&name))
}

impl LanguageServer for GraphQLLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("Initializing GraphQL Language Server");

        // Store workspace folders for later config loading
        if let Some(ref folders) = params.workspace_folders {
            tracing::info!(count = folders.len(), "Workspace folders");
            for folder in folders {
                if let Some(path) = folder.uri.to_file_path() {
                    self.init_workspace_folders
                        .insert(folder.uri.to_string(), path.into_owned());
                }
            }
        } else {
            #[allow(deprecated)]
            let root_uri = params.root_uri.as_ref();
            if let Some(path) = root_uri.and_then(UriExt::to_file_path) {
                self.init_workspace_folders
                    .insert(path.display().to_string(), path.into_owned());
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec![
                        ".".to_string(),
                        "{".to_string(),
                        "@".to_string(),
                        "(".to_string(),
                        "$".to_string(),
                    ]),
                    ..Default::default()
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Simple(true)),
                code_lens_provider: Some(CodeLensOptions {
                    resolve_provider: Some(false),
                }),
                workspace: Some(WorkspaceServerCapabilities {
                    workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                        supported: Some(true),
                        change_notifications: Some(OneOf::Left(true)),
                    }),
                    file_operations: None,
                }),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "GraphQL Language Server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        tracing::info!("GraphQL Language Server initialized");
        self.register_file_watchers().await;

        let folders: Vec<PathBuf> = self
            .init_workspace_folders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        for folder in folders {
            let projects = self.workspace.add_projects_in_folder(&folder).await;
            if projects.is_empty() {
                tracing::warn!(folder = %folder.display(), "No GraphQL projects found");
            }
        }

        self.client
            .log_message(
                MessageType::INFO,
                format!(
                    "GraphQL LSP ready with {} project(s)",
                    self.workspace.projects().len()
                ),
            )
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down GraphQL Language Server");
        self.workspace.shutdown().await;
        Ok(())
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        for folder in params.event.removed {
            if let Some(path) = folder.uri.to_file_path() {
                self.workspace.remove_projects_in_folder(&path).await;
            }
        }
        for folder in params.event.added {
            if let Some(path) = folder.uri.to_file_path() {
                self.workspace.add_projects_in_folder(&path).await;
            }
        }
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            let Some(uri) = project_uri(&change.uri) else {
                continue;
            };
            let path = uri_to_path(&uri);

            if is_config_file(&path) {
                tracing::info!(config = %path.display(), "Config changed");
                // Failures are already reported to the client
                let _ = self.workspace.reload_project_for_config(&path).await;
                continue;
            }
            if self.open_documents.contains_key(&uri) {
                continue;
            }

            if change.typ == FileChangeType::DELETED {
                self.workspace.document_deleted(&uri).await;
            } else {
                self.sync_from_disk(&uri).await;
            }
        }
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        let Some(uri) = project_uri(&document.uri) else {
            return;
        };
        tracing::debug!(uri = %uri, version = document.version, "Document opened");

        self.open_documents
            .insert(uri.clone(), (document.version, document.language_id.clone()));
        self.workspace
            .documents_changed(&[TextDocument::new(
                uri,
                document.language_id,
                document.version,
                document.text,
            )])
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let Some(uri) = project_uri(&params.text_document.uri) else {
            return;
        };
        let version = params.text_document.version;
        // Full sync: the last change holds the whole text
        let Some(change) = params.content_changes.into_iter().last() else {
            return;
        };

        let language_id = self.open_documents.get(&uri).map_or_else(
            || {
                LanguageId::from_path(&uri_to_path(&uri))
                    .map_or("graphql", LanguageId::as_str)
                    .to_string()
            },
            |entry| entry.1.clone(),
        );
        self.open_documents
            .insert(uri.clone(), (version, language_id.clone()));
        self.workspace
            .documents_changed(&[TextDocument::new(uri, language_id, version, change.text)])
            .await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        tracing::debug!(uri = ?params.text_document.uri, "Document saved");
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let Some(uri) = project_uri(&params.text_document.uri) else {
            return;
        };
        self.open_documents.remove(&uri);
        // Unsaved edits are discarded with the editor buffer
        self.sync_from_disk(&uri).await;
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position.position;
        let Some((uri, project)) = self.project_for(&params.text_document_position.text_document.uri)
        else {
            return Ok(None);
        };

        let key = self.request_key(&uri, Some(position));
        let response = self
            .completion_debounce
            .run(key, || async move {
                let items = Self::query(move |token| {
                    project.completion(&uri, project_position(position), token)
                })
                .await;
                (!items.is_empty()).then(|| {
                    CompletionResponse::Array(items.into_iter().map(lsp_completion_item).collect())
                })
            })
            .await;
        Ok(response)
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params.position;
        let Some((uri, project)) =
            self.project_for(&params.text_document_position_params.text_document.uri)
        else {
            return Ok(None);
        };

        let key = self.request_key(&uri, Some(position));
        let response = self
            .hover_debounce
            .run(key, || async move {
                Self::query(move |token| project.hover(&uri, project_position(position), token))
                    .await
                    .map(lsp_hover)
            })
            .await;
        Ok(response)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let Some((uri, project)) =
            self.project_for(&params.text_document_position_params.text_document.uri)
        else {
            return Ok(None);
        };

        let locations: Vec<Location> = Self::query(move |token| {
            project.definition(&uri, project_position(position), token)
        })
        .await
        .iter()
        .filter_map(lsp_location)
        .collect();

        Ok((!locations.is_empty()).then_some(GotoDefinitionResponse::Array(locations)))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position.position;
        let include_declaration = params.context.include_declaration;
        let Some((uri, project)) = self.project_for(&params.text_document_position.text_document.uri)
        else {
            return Ok(None);
        };

        let locations: Vec<Location> = Self::query(move |token| {
            project.references(&uri, project_position(position), include_declaration, token)
        })
        .await
        .iter()
        .filter_map(lsp_location)
        .collect();

        Ok((!locations.is_empty()).then_some(locations))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some((uri, project)) = self.project_for(&params.text_document.uri) else {
            return Ok(None);
        };

        let symbols = Self::query(move |token| project.document_symbols(&uri, token)).await;
        Ok(Some(DocumentSymbolResponse::Nested(
            symbols.into_iter().map(lsp_document_symbol).collect(),
        )))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let lsp_uri = params.text_document.uri;
        let Some((uri, project)) = self.project_for(&lsp_uri) else {
            return Ok(None);
        };

        let range = project_range(params.range);
        let fixes = Self::query(move |token| project.code_actions(&uri, range, token)).await;
        let actions: CodeActionResponse = fixes
            .into_iter()
            .map(|fix| CodeActionOrCommand::CodeAction(lsp_code_action(&lsp_uri, fix)))
            .collect();
        Ok((!actions.is_empty()).then_some(actions))
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        let Some((uri, project)) = self.project_for(&params.text_document.uri) else {
            return Ok(None);
        };

        let key = self.request_key(&uri, None);
        let response = self
            .code_lens_debounce
            .run(key, || async move {
                let lenses = Self::query(move |token| project.code_lenses(&uri, token)).await;
                Some(lenses.into_iter().map(lsp_code_lens).collect())
            })
            .await;
        Ok(response)
    }
}
