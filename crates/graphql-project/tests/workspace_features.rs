#![cfg(not(target_os = "windows"))]

use async_trait::async_trait;
use graphql_project::{
    path_to_uri, CancellationToken, Decoration, DelegateConnection, Diagnostic, FileDiagnostics,
    Location, Position, ProjectError, ProjectListener, ProjectServices, Range, RegistryClient,
    RegistrySchema, SchemaProviderError, SyncEvent, TextDocument, ValidationRule, Workspace,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const SCHEMA: &str = "type Query {\n  hero: Droid\n}\n\ntype Droid {\n  id: ID!\n  name: String\n}\n";

const CLIENT_SCHEMA: &str = "extend type Droid {\n  isFavorite: Boolean\n}\n";

const FRAGMENTS: &str = "export const DROID = gql`\n  fragment DroidName on Droid {\n    name\n  }\n`;\n";

const APP: &str = "const HERO = gql`\n  query Hero {\n    hero {\n      ...DroidName\n      isFavorite\n    }\n  }\n`;\n";

#[derive(Default)]
struct Recorder {
    batches: Mutex<Vec<FileDiagnostics>>,
    decorations: Mutex<HashMap<String, Vec<Decoration>>>,
    errors: Mutex<Vec<String>>,
}

impl Recorder {
    fn latest(&self, uri: &str) -> Option<Vec<Diagnostic>> {
        self.batches
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|batch| batch.uri == uri)
            .map(|batch| batch.diagnostics.clone())
    }
}

impl ProjectListener for Recorder {
    fn publish_diagnostics(&self, batch: FileDiagnostics) {
        self.batches.lock().unwrap().push(batch);
    }

    fn publish_decorations(&self, uri: &str, decorations: Vec<Decoration>) {
        self.decorations
            .lock()
            .unwrap()
            .insert(uri.to_string(), decorations);
    }

    fn report_error(&self, error: &ProjectError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

fn write(root: &Path, relative: &str, contents: &str) -> String {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path_to_uri(&path)
}

struct Fixture {
    _dir: TempDir,
    workspace: Workspace,
    recorder: Arc<Recorder>,
    app: String,
    fragments: String,
    client: String,
}

async fn local_schema_workspace() -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let root = dir.path();
    write(
        root,
        "apollo.config.json",
        r#"{"client": {"service": {"localSchemaFile": "schema.graphql"}}}"#,
    );
    write(root, "schema.graphql", SCHEMA);
    let client = write(root, "src/client.graphql", CLIENT_SCHEMA);
    let fragments = write(root, "src/fragments.ts", FRAGMENTS);
    let app = write(root, "src/app.ts", APP);

    let recorder = Arc::new(Recorder::default());
    let workspace = Workspace::new(ProjectServices {
        listener: recorder.clone(),
        ..ProjectServices::default()
    });
    assert_eq!(workspace.add_projects_in_folder(root).await.len(), 1);

    Fixture {
        _dir: dir,
        workspace,
        recorder,
        app,
        fragments,
        client,
    }
}

fn range(start: (usize, usize), end: (usize, usize)) -> Range {
    Range::new(Position::new(start.0, start.1), Position::new(end.0, end.1))
}

#[tokio::test]
async fn test_cross_file_fragments_and_client_fields_validate() {
    let fixture = local_schema_workspace().await;

    assert_eq!(fixture.recorder.latest(&fixture.fragments), Some(Vec::new()));
    assert_eq!(fixture.recorder.latest(&fixture.client), Some(Vec::new()));

    let app = fixture.recorder.latest(&fixture.app).unwrap();
    assert_eq!(app.len(), 1, "{app:?}");
    assert_eq!(
        app[0].code.as_deref(),
        Some(ValidationRule::NoMissingClientDirectives.name())
    );
    assert_eq!(app[0].range, range((4, 6), (4, 16)));
    assert!(fixture.recorder.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_client_directive_fix_resolves_diagnostic() {
    let fixture = local_schema_workspace().await;
    let project = fixture.workspace.project_for_uri(&fixture.app).unwrap();
    let token = CancellationToken::new();

    let fixes = project.code_actions(&fixture.app, range((4, 8), (4, 8)), &token);
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].edits[0].range, range((4, 16), (4, 16)));
    assert_eq!(fixes[0].edits[0].new_text, " @client");

    let fixed = APP.replace("isFavorite\n", "isFavorite @client\n");
    fixture
        .workspace
        .documents_changed(&[TextDocument::new(&fixture.app, "typescript", 2, fixed)])
        .await;
    project.validate(&token).unwrap();

    assert_eq!(fixture.recorder.latest(&fixture.app), Some(Vec::new()));
}

#[tokio::test]
async fn test_navigation_across_files() {
    let fixture = local_schema_workspace().await;
    let project = fixture.workspace.project_for_uri(&fixture.app).unwrap();
    let token = CancellationToken::new();

    assert_eq!(
        project.definition(&fixture.app, Position::new(3, 12), &token),
        vec![Location::new(&fixture.fragments, range((1, 11), (1, 20)))]
    );
    assert_eq!(
        project.definition(&fixture.app, Position::new(4, 8), &token),
        vec![Location::new(&fixture.client, range((1, 2), (1, 12)))]
    );

    assert_eq!(
        project.references(&fixture.fragments, Position::new(1, 14), false, &token),
        vec![Location::new(&fixture.app, range((3, 9), (3, 18)))]
    );

    let hover = project
        .hover(&fixture.app, Position::new(2, 6), &token)
        .unwrap();
    assert!(hover.contents.contains("Field: `hero`"));
}

#[tokio::test]
async fn test_symbols_and_lenses() {
    let fixture = local_schema_workspace().await;
    let project = fixture.workspace.project_for_uri(&fixture.app).unwrap();
    let token = CancellationToken::new();

    let symbols = project.document_symbols(&fixture.fragments, &token);
    assert_eq!(symbols.len(), 1);
    assert_eq!(symbols[0].name, "DroidName");
    assert_eq!(symbols[0].detail.as_deref(), Some("on Droid"));

    let lenses = project.code_lenses(&fixture.fragments, &token);
    let titles: Vec<_> = lenses.iter().map(|lens| lens.title.as_str()).collect();
    assert_eq!(titles, vec!["1 reference"]);

    // Local schemas have no explorer
    assert!(project.code_lenses(&fixture.app, &token).is_empty());
}

#[tokio::test]
async fn test_deleting_fragment_file_breaks_spread() {
    let fixture = local_schema_workspace().await;
    let project = fixture.workspace.project_for_uri(&fixture.app).unwrap();

    fixture.workspace.document_deleted(&fixture.fragments).await;
    project.validate(&CancellationToken::new()).unwrap();

    assert_eq!(fixture.recorder.latest(&fixture.fragments), Some(Vec::new()));
    let app = fixture.recorder.latest(&fixture.app).unwrap();
    assert!(app
        .iter()
        .any(|diagnostic| diagnostic.message.contains("DroidName")));
}

struct LatencyRegistry;

#[async_trait]
impl RegistryClient for LatencyRegistry {
    async fn fetch_schema(
        &self,
        _service: &str,
        _tag: &str,
    ) -> Result<RegistrySchema, SchemaProviderError> {
        Ok(RegistrySchema {
            sdl: SCHEMA.to_string(),
            field_latencies: HashMap::from([("Query.hero".to_string(), 12.4)]),
        })
    }
}

#[tokio::test]
async fn test_registry_schema_offers_explorer_and_latencies() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "apollo.config.json",
        r#"{"client": {"service": "droids@current"}}"#,
    );
    let app = write(
        dir.path(),
        "src/app.ts",
        "gql`\n  query Hero {\n    hero {\n      name\n    }\n  }\n`;",
    );

    let recorder = Arc::new(Recorder::default());
    let workspace = Workspace::new(ProjectServices {
        listener: recorder.clone(),
        registry_client: Some(Arc::new(LatencyRegistry)),
        ..ProjectServices::default()
    });
    workspace.add_projects_in_folder(dir.path()).await;

    let decorations = recorder.decorations.lock().unwrap().get(&app).cloned().unwrap();
    let messages: Vec<_> = decorations.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(messages, vec!["Run in Explorer ▷", "~12 ms"]);

    let project = workspace.project_for_uri(&app).unwrap();
    let lenses = project.code_lenses(&app, &CancellationToken::new());
    assert_eq!(lenses.len(), 1);
    assert_eq!(lenses[0].title, "Run in Explorer");
}

#[derive(Default)]
struct RecordingDelegate {
    events: Mutex<Vec<SyncEvent>>,
}

#[async_trait]
impl DelegateConnection for RecordingDelegate {
    async fn send(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn test_registry_project_syncs_virtual_documents() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "apollo.config.json",
        r#"{"registry": {"service": {"localSchemaFile": "schema.graphql"}}}"#,
    );
    write(dir.path(), "schema.graphql", SCHEMA);
    let host = path_to_uri(&dir.path().join("src").join("app.ts"));

    let delegate = Arc::new(RecordingDelegate::default());
    let workspace = Workspace::new(ProjectServices {
        delegate: Some(delegate.clone()),
        ..ProjectServices::default()
    });
    workspace.add_projects_in_folder(dir.path()).await;

    let text = "gql`query A { hero { id } }`;\ngql`query B { hero { name } }`;";
    workspace
        .documents_changed(&[TextDocument::new(&host, "typescript", 1, text)])
        .await;
    {
        let events = delegate.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events
            .iter()
            .all(|event| matches!(event, SyncEvent::Open { .. })
                && event.uri().starts_with(&host)));
    }

    workspace.document_deleted(&host).await;
    let events = delegate.events.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(events[2..]
        .iter()
        .all(|event| matches!(event, SyncEvent::Close { .. })));
}
