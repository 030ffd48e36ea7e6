use crate::client_schema::{merge, MergedSchema};
use crate::code_action::{code_actions, CodeFix};
use crate::code_lens::{code_lenses, CodeLens};
use crate::completion::{CompletionItem, CompletionMode, CompletionProvider};
use crate::decorations::{decorations, Decoration, DecorationOptions};
use crate::diagnostics::{Diagnostic, FileDiagnostics, Location};
use crate::document::{FragmentInfo, ParsedDocument, TypeDefinitionInfo};
use crate::find_references::FindReferencesProvider;
use crate::fragment_sync::{DelegateConnection, DocumentSynchronizer};
use crate::goto_definition::GotoDefinitionProvider;
use crate::hover::{HoverInfo, HoverProvider};
use crate::loading::{LoadingHandler, LoadingNotifier, NoopLoadingNotifier};
use crate::provider::{
    RegistryClient, ResolveOptions, SchemaChangeHandler, SchemaProvider, SchemaSubscription,
    ServerSchema,
};
use crate::symbols::{document_symbols, DocumentSymbol};
use crate::validation::{default_rule_filter, ExternalFragment, RuleFilter, Validator};
use crate::{noop_log, DebugLog, Position, ProjectError, Range, Result};
use graphql_config::{FileMatcher, ProjectConfig, ProjectKind};
use graphql_extract::{extract, extract_from_file};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

/// `file://` URI for an absolute path
#[must_use]
pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// Filesystem path of a `file://` URI
#[must_use]
pub fn uri_to_path(uri: &str) -> PathBuf {
    PathBuf::from(uri.strip_prefix("file://").unwrap_or(uri))
}

/// An open document as the editor reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: String,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

impl TextDocument {
    pub fn new(
        uri: impl Into<String>,
        language_id: impl Into<String>,
        version: i32,
        text: impl Into<String>,
    ) -> Self {
        Self {
            uri: uri.into(),
            language_id: language_id.into(),
            version,
            text: text.into(),
        }
    }
}

/// Receives everything a project wants shown in the client
pub trait ProjectListener: Send + Sync {
    fn publish_diagnostics(&self, batch: FileDiagnostics);
    fn publish_decorations(&self, uri: &str, decorations: Vec<Decoration>);
    /// Failures that abort a whole pass rather than annotating a file
    fn report_error(&self, error: &ProjectError);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProjectListener;

impl ProjectListener for NoopProjectListener {
    fn publish_diagnostics(&self, _batch: FileDiagnostics) {}
    fn publish_decorations(&self, _uri: &str, _decorations: Vec<Decoration>) {}
    fn report_error(&self, _error: &ProjectError) {}
}

/// Collaborators injected into every project
#[derive(Clone)]
pub struct ProjectServices {
    pub listener: Arc<dyn ProjectListener>,
    pub loading: Arc<dyn LoadingNotifier>,
    pub log: Arc<dyn DebugLog>,
    pub registry_client: Option<Arc<dyn RegistryClient>>,
    /// Receives virtual documents for registry projects
    pub delegate: Option<Arc<dyn DelegateConnection>>,
    pub rule_filter: RuleFilter,
    pub completion_mode: CompletionMode,
}

impl Default for ProjectServices {
    fn default() -> Self {
        Self {
            listener: Arc::new(NoopProjectListener),
            loading: Arc::new(NoopLoadingNotifier),
            log: noop_log(),
            registry_client: None,
            delegate: None,
            rule_filter: default_rule_filter(),
            completion_mode: CompletionMode::default(),
        }
    }
}

impl fmt::Debug for ProjectServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectServices")
            .field("completion_mode", &self.completion_mode)
            .field("delegate", &self.delegate.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectState {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

/// The documents and schema of one configured root.
///
/// Queries can be answered in any state; before the first schema load they
/// return empty results, and during reinitialization they see the previous
/// schema and documents.
pub struct Project {
    config: ProjectConfig,
    matcher: FileMatcher,
    provider: SchemaProvider,
    services: ProjectServices,
    validator: Validator,
    loading: LoadingHandler,
    synchronizer: Option<DocumentSynchronizer>,
    state: RwLock<ProjectState>,
    files: RwLock<HashMap<String, Vec<ParsedDocument>>>,
    /// Files the editor touched while a scan was running; `None` outside a scan
    edited_during_scan: Mutex<Option<HashSet<String>>>,
    server_schema: RwLock<Option<ServerSchema>>,
    merged_schema: RwLock<Option<Arc<MergedSchema>>>,
    diagnostics: RwLock<HashMap<String, Vec<Diagnostic>>>,
    needs_validation: AtomicBool,
    subscription: Mutex<Option<SchemaSubscription>>,
}

impl Project {
    pub fn new(config: ProjectConfig, services: ProjectServices) -> Result<Arc<Self>> {
        let matcher = config.file_matcher()?;
        let provider = SchemaProvider::from_config(
            &config,
            services.registry_client.clone(),
            Arc::clone(&services.log),
        )?;
        let synchronizer = match (config.kind, &services.delegate) {
            (ProjectKind::Registry, Some(delegate)) => {
                Some(DocumentSynchronizer::new(Arc::clone(delegate)))
            }
            _ => None,
        };

        Ok(Arc::new(Self {
            validator: Validator::new(Arc::clone(&services.rule_filter)),
            loading: LoadingHandler::new(Arc::clone(&services.loading)),
            config,
            matcher,
            provider,
            services,
            synchronizer,
            state: RwLock::new(ProjectState::Uninitialized),
            files: RwLock::new(HashMap::new()),
            edited_during_scan: Mutex::new(None),
            server_schema: RwLock::new(None),
            merged_schema: RwLock::new(None),
            diagnostics: RwLock::new(HashMap::new()),
            needs_validation: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }))
    }

    #[must_use]
    pub const fn config(&self) -> &ProjectConfig {
        &self.config
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    #[must_use]
    pub const fn provider(&self) -> &SchemaProvider {
        &self.provider
    }

    #[must_use]
    pub fn state(&self) -> ProjectState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ProjectState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Whether the include/exclude globs select `path`
    #[must_use]
    pub fn includes_file(&self, path: &Path) -> bool {
        self.matcher.matches(path)
    }

    /// URIs of every file with extracted documents
    #[must_use]
    pub fn file_uris(&self) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut uris: Vec<String> = files.keys().cloned().collect();
        uris.sort();
        uris
    }

    #[must_use]
    pub fn merged_schema(&self) -> Option<Arc<MergedSchema>> {
        self.merged_schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Scan the project's files and load its schema, then validate.
    ///
    /// A failed schema load is reported and leaves any previous schema in
    /// place.
    #[tracing::instrument(skip(self), fields(root = %self.config.root.display()))]
    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        self.set_state(ProjectState::Initializing);
        *self
            .edited_during_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(HashSet::new());

        let scan = {
            let project = Arc::clone(self);
            tokio::task::spawn_blocking(move || project.scan_files())
        };
        let (scanned, _) = tokio::join!(scan, self.load_schema(ResolveOptions::default()));
        let scanned = scanned.map_err(|e| {
            self.edited_during_scan
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            ProjectError::Io(std::io::Error::other(e))
        })?;

        tracing::info!(files = scanned.len(), "Scanned project files");
        self.apply_scan(scanned);

        self.watch_schema();
        self.set_state(ProjectState::Ready);
        self.validate(&CancellationToken::new()).map(|_| ())
    }

    /// Fetch the schema again, bypassing provider caches, and revalidate
    pub async fn reload_schema(self: &Arc<Self>) -> Result<()> {
        if self.load_schema(ResolveOptions::forced()).await {
            self.validate(&CancellationToken::new())?;
        }
        Ok(())
    }

    async fn load_schema(&self, options: ResolveOptions) -> bool {
        let title = format!("Loading schema for {}", self.config.root.display());
        match self
            .loading
            .handle(&title, self.provider.resolve_schema(options))
            .await
        {
            Ok(schema) => {
                self.set_server_schema(schema);
                true
            }
            Err(error) => {
                self.services.log.error(&error.to_string());
                false
            }
        }
    }

    fn set_server_schema(&self, schema: ServerSchema) {
        *self
            .server_schema
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(schema);
    }

    fn watch_schema(self: &Arc<Self>) {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if subscription.is_some() {
            return;
        }

        let project = Arc::downgrade(self);
        let handler: SchemaChangeHandler = Arc::new(move |schema| {
            if let Some(project) = project.upgrade() {
                tracing::info!(root = %project.root().display(), "Schema changed");
                project.set_server_schema(schema);
                project.schedule_validation();
            }
        });
        *subscription = Some(self.provider.on_schema_change(handler));
    }

    /// Replace the file map with scan results, except for files the editor
    /// changed since the scan started
    fn apply_scan(&self, mut scanned: HashMap<String, Vec<ParsedDocument>>) {
        let mut files = self.files.write().unwrap_or_else(PoisonError::into_inner);
        let edited = self
            .edited_during_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_default();
        for uri in edited {
            scanned.remove(&uri);
            if let Some(documents) = files.remove(&uri) {
                scanned.insert(uri, documents);
            }
        }
        *files = scanned;
    }

    fn mark_edited(&self, uri: &str) {
        if let Some(edited) = self
            .edited_during_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            edited.insert(uri.to_string());
        }
    }

    fn scan_files(&self) -> HashMap<String, Vec<ParsedDocument>> {
        let mut files = HashMap::new();
        let walker = WalkDir::new(&self.config.root)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir() && self.matcher.is_excluded_dir(entry.path()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.matcher.matches(entry.path()) {
                continue;
            }

            let uri = path_to_uri(entry.path());
            match extract_from_file(entry.path(), &uri, &self.config.tag_name) {
                Ok(Some(fragments)) => {
                    files.insert(uri, fragments.into_iter().map(ParsedDocument::new).collect());
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping file");
                }
            }
        }
        files
    }

    /// Re-extract a changed file and schedule validation.
    ///
    /// A file with nothing embedded is dropped and its diagnostics cleared.
    pub async fn document_did_change(self: &Arc<Self>, document: &TextDocument) {
        tracing::debug!(uri = %document.uri, version = document.version, "Document changed");
        let fragments = extract(
            &document.uri,
            &document.text,
            &document.language_id,
            &self.config.tag_name,
        )
        .filter(|fragments| !fragments.is_empty());

        self.mark_edited(&document.uri);
        match fragments {
            Some(fragments) => {
                let parsed = fragments.iter().cloned().map(ParsedDocument::new).collect();
                self.files
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(document.uri.clone(), parsed);
                if let Some(synchronizer) = &self.synchronizer {
                    synchronizer.update(&document.uri, fragments).await;
                }
            }
            None => self.forget_file(&document.uri).await,
        }

        self.schedule_validation();
    }

    /// Drop a deleted file and clear its diagnostics
    pub async fn file_was_deleted(self: &Arc<Self>, uri: &str) {
        self.mark_edited(uri);
        self.forget_file(uri).await;
        self.schedule_validation();
    }

    async fn forget_file(&self, uri: &str) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uri);
        self.diagnostics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uri);
        self.services.listener.publish_diagnostics(FileDiagnostics {
            uri: uri.to_string(),
            diagnostics: Vec::new(),
        });
        self.services.listener.publish_decorations(uri, Vec::new());
        if let Some(synchronizer) = &self.synchronizer {
            synchronizer.close(uri).await;
        }
    }

    /// Mark the project for validation on the next turn of the event loop.
    ///
    /// Calls made before that validation runs share it. Without a runtime the
    /// validation runs immediately.
    pub fn schedule_validation(self: &Arc<Self>) {
        if self.needs_validation.swap(true, Ordering::AcqRel) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let project = Arc::downgrade(self);
                runtime.spawn(async move {
                    tokio::task::yield_now().await;
                    if let Some(project) = project.upgrade() {
                        project.run_pending_validation();
                    }
                });
            }
            Err(_) => self.run_pending_validation(),
        }
    }

    fn run_pending_validation(&self) {
        if !self.needs_validation.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(error) = self.validate(&CancellationToken::new()) {
            tracing::error!(error = %error, "Validation failed");
            self.services.listener.report_error(&error);
        }
    }

    fn snapshot(&self) -> Vec<(String, Vec<ParsedDocument>)> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let mut snapshot: Vec<_> = files
            .iter()
            .map(|(uri, documents)| (uri.clone(), documents.clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));
        snapshot
    }

    /// Validate every document and publish one diagnostics batch per file.
    ///
    /// Also publishes each file's decorations. Returns the batches, or nothing
    /// if `token` is cancelled part way.
    pub fn validate(&self, token: &CancellationToken) -> Result<Vec<FileDiagnostics>> {
        let files = self.snapshot();
        Self::check_duplicate_operations(&files)?;

        let schema = self.refresh_merged_schema(&files);
        let external: Vec<ExternalFragment> = files
            .iter()
            .flat_map(|(_, documents)| documents.iter().flat_map(ParsedDocument::fragments))
            .map(|fragment| ExternalFragment {
                name: fragment.name,
                text: fragment.text,
            })
            .collect();
        let options = self.decoration_options();

        let mut batches = Vec::with_capacity(files.len());
        let mut file_decorations = Vec::with_capacity(files.len());
        for (uri, documents) in &files {
            if token.is_cancelled() {
                tracing::debug!("Validation cancelled");
                return Ok(Vec::new());
            }

            let mut diagnostics = Vec::new();
            let mut found = Vec::new();
            for document in documents {
                diagnostics.extend_from_slice(document.syntax_errors());
                if let Some(schema) = &schema {
                    diagnostics.extend(self.validator.validate_document(
                        document,
                        schema,
                        &external,
                    ));
                    found.extend(decorations(document, schema, &options));
                }
            }
            batches.push(FileDiagnostics {
                uri: uri.clone(),
                diagnostics,
            });
            file_decorations.push((uri.clone(), found));
        }

        {
            let mut stored = self
                .diagnostics
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            stored.clear();
            for batch in &batches {
                stored.insert(batch.uri.clone(), batch.diagnostics.clone());
            }
        }

        tracing::debug!(files = batches.len(), "Validated project");
        for batch in &batches {
            self.services.listener.publish_diagnostics(batch.clone());
        }
        for (uri, found) in file_decorations {
            self.services.listener.publish_decorations(&uri, found);
        }
        Ok(batches)
    }

    fn check_duplicate_operations(files: &[(String, Vec<ParsedDocument>)]) -> Result<()> {
        let mut seen: HashMap<String, &str> = HashMap::new();
        for (uri, documents) in files {
            for name in documents.iter().flat_map(ParsedDocument::operation_names) {
                match seen.get(name.as_str()) {
                    Some(first) if *first != uri.as_str() => {
                        return Err(ProjectError::DuplicateOperationName {
                            name,
                            first: uri_to_path(first),
                            second: uri_to_path(uri),
                        });
                    }
                    Some(_) => {}
                    None => {
                        seen.insert(name, uri);
                    }
                }
            }
        }
        Ok(())
    }

    fn refresh_merged_schema(
        &self,
        files: &[(String, Vec<ParsedDocument>)],
    ) -> Option<Arc<MergedSchema>> {
        let server = self
            .server_schema
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()?;
        let client_definitions: Vec<String> = files
            .iter()
            .flat_map(|(_, documents)| {
                documents
                    .iter()
                    .flat_map(ParsedDocument::type_system_definitions)
            })
            .collect();

        let merged = Arc::new(merge(&server, &client_definitions));
        *self
            .merged_schema
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&merged));
        Some(merged)
    }

    fn decoration_options(&self) -> DecorationOptions {
        DecorationOptions {
            latencies: self.provider.field_latencies(),
            latency_threshold_ms: self.config.latency_threshold_ms,
            explorer: self.provider.is_remote(),
        }
    }

    fn documents_for(&self, uri: &str) -> Vec<ParsedDocument> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }

    /// The document of `uri` holding `position`
    fn document_at(&self, uri: &str, position: Position) -> Option<ParsedDocument> {
        self.documents_for(uri)
            .into_iter()
            .find(|document| document.contains_position(position))
    }

    fn all_documents(&self) -> Vec<ParsedDocument> {
        self.snapshot()
            .into_iter()
            .flat_map(|(_, documents)| documents)
            .collect()
    }

    fn fragments(documents: &[ParsedDocument]) -> Vec<FragmentInfo> {
        documents.iter().flat_map(ParsedDocument::fragments).collect()
    }

    fn type_definitions(documents: &[ParsedDocument]) -> Vec<TypeDefinitionInfo> {
        documents
            .iter()
            .flat_map(ParsedDocument::type_definitions)
            .collect()
    }

    pub fn completion(
        &self,
        uri: &str,
        position: Position,
        token: &CancellationToken,
    ) -> Vec<CompletionItem> {
        let (Some(schema), Some(document)) = (self.merged_schema(), self.document_at(uri, position))
        else {
            return Vec::new();
        };
        if token.is_cancelled() {
            return Vec::new();
        }
        let fragments = Self::fragments(&self.all_documents());
        CompletionProvider::new(self.services.completion_mode).complete(
            &document,
            position,
            &schema,
            &fragments,
        )
    }

    pub fn hover(
        &self,
        uri: &str,
        position: Position,
        token: &CancellationToken,
    ) -> Option<HoverInfo> {
        let schema = self.merged_schema()?;
        let document = self.document_at(uri, position)?;
        if token.is_cancelled() {
            return None;
        }
        let fragments = Self::fragments(&self.all_documents());
        HoverProvider::new().hover(&document, position, &schema, &fragments)
    }

    pub fn definition(
        &self,
        uri: &str,
        position: Position,
        token: &CancellationToken,
    ) -> Vec<Location> {
        let (Some(schema), Some(document)) = (self.merged_schema(), self.document_at(uri, position))
        else {
            return Vec::new();
        };
        if token.is_cancelled() {
            return Vec::new();
        }
        let documents = self.all_documents();
        GotoDefinitionProvider::new()
            .goto_definition(
                &document,
                position,
                &schema,
                &Self::fragments(&documents),
                &Self::type_definitions(&documents),
            )
            .unwrap_or_default()
    }

    pub fn references(
        &self,
        uri: &str,
        position: Position,
        include_declaration: bool,
        token: &CancellationToken,
    ) -> Vec<Location> {
        let (Some(schema), Some(document)) = (self.merged_schema(), self.document_at(uri, position))
        else {
            return Vec::new();
        };
        if token.is_cancelled() {
            return Vec::new();
        }
        let documents = self.all_documents();
        let documents: Vec<&ParsedDocument> = documents.iter().collect();
        FindReferencesProvider::new()
            .find_references(&document, position, &schema, &documents, include_declaration)
            .unwrap_or_default()
    }

    pub fn document_symbols(&self, uri: &str, token: &CancellationToken) -> Vec<DocumentSymbol> {
        if token.is_cancelled() {
            return Vec::new();
        }
        let documents = self.documents_for(uri);
        document_symbols(&documents.iter().collect::<Vec<_>>())
    }

    pub fn code_lenses(&self, uri: &str, token: &CancellationToken) -> Vec<CodeLens> {
        if token.is_cancelled() {
            return Vec::new();
        }
        let documents = self.documents_for(uri);
        let project_documents = self.all_documents();
        code_lenses(
            &documents.iter().collect::<Vec<_>>(),
            &project_documents.iter().collect::<Vec<_>>(),
            self.provider.is_remote(),
        )
    }

    pub fn code_actions(&self, uri: &str, range: Range, token: &CancellationToken) -> Vec<CodeFix> {
        if token.is_cancelled() {
            return Vec::new();
        }
        let diagnostics = self
            .diagnostics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
            .unwrap_or_default();
        let documents = self.documents_for(uri);
        code_actions(&documents.iter().collect::<Vec<_>>(), &diagnostics, range)
    }

    /// Stop watching the schema and close any delegated documents
    pub async fn shutdown(&self) {
        if let Some(subscription) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            subscription.unsubscribe();
        }
        if let Some(synchronizer) = &self.synchronizer {
            for uri in self.file_uris() {
                synchronizer.close(&uri).await;
            }
        }
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("root", &self.config.root)
            .field("kind", &self.config.kind)
            .field("provider", &self.provider.kind())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
