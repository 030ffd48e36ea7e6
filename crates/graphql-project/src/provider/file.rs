use super::{SchemaChangeHandler, SchemaSource, SchemaSubscription, ServerSchema};
use crate::{DebugLog, SchemaProviderError};
use notify::{EventKind, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Quiet period after a file event before the schema is rebuilt
const WATCH_SETTLE: Duration = Duration::from_millis(100);

/// Reads the server schema from SDL files on disk
pub struct FileSchemaProvider {
    paths: Vec<PathBuf>,
    log: Arc<dyn DebugLog>,
}

impl FileSchemaProvider {
    #[must_use]
    pub fn new(paths: Vec<PathBuf>, log: Arc<dyn DebugLog>) -> Self {
        Self { paths, log }
    }

    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    async fn read_sources(&self) -> Result<Vec<SchemaSource>, SchemaProviderError> {
        let mut sources = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            match tokio::fs::read_to_string(path).await {
                Ok(sdl) => sources.push(SchemaSource::new(path.display().to_string(), sdl)),
                Err(source) => {
                    let error = SchemaProviderError::Read {
                        path: path.clone(),
                        source,
                    };
                    self.report_failure(&error);
                    return Err(error);
                }
            }
        }
        Ok(sources)
    }

    fn report_failure(&self, error: &SchemaProviderError) {
        self.log.error(&error.to_string());
        self.log.error(&format!(
            "Unable to load the schema from {}",
            self.describe_paths()
        ));
    }

    fn describe_paths(&self) -> String {
        self.paths
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub async fn resolve_schema(&self) -> Result<ServerSchema, SchemaProviderError> {
        let sources = self.read_sources().await?;
        ServerSchema::from_sources(sources).inspect_err(|error| self.report_failure(error))
    }

    /// The concatenated SDL of every schema file
    pub async fn resolve_federated_service_sdl(
        &self,
    ) -> Result<Option<String>, SchemaProviderError> {
        let sources = self.read_sources().await?;
        Ok(Some(
            sources
                .into_iter()
                .map(|source| source.sdl)
                .collect::<Vec<_>>()
                .join("\n"),
        ))
    }

    /// Watch the schema files and call `handler` with each successfully
    /// rebuilt schema.
    ///
    /// Returns an inert subscription when no tokio runtime is available or
    /// the watcher cannot be created.
    pub fn on_schema_change(&self, handler: SchemaChangeHandler) -> SchemaSubscription {
        let Ok(runtime) = Handle::try_current() else {
            tracing::warn!("No async runtime; schema files will not be watched");
            return SchemaSubscription::inert();
        };

        let watched: BTreeSet<PathBuf> = self.paths.iter().cloned().collect();
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let filter = watched.clone();
        let watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            let Ok(event) = result else {
                return;
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            if event.paths.iter().any(|path| filter.contains(path)) {
                let _ = tx.send(());
            }
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create schema file watcher");
                return SchemaSubscription::inert();
            }
        };

        // Watching parent directories survives editors that replace files on save
        let directories: BTreeSet<PathBuf> = watched
            .iter()
            .filter_map(|path| path.parent().map(PathBuf::from))
            .collect();
        for directory in &directories {
            if let Err(e) = watcher.watch(directory, RecursiveMode::NonRecursive) {
                tracing::warn!(directory = %directory.display(), error = %e, "Failed to watch schema directory");
            }
        }

        let provider = Self::new(self.paths.clone(), Arc::clone(&self.log));
        let task = runtime.spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(WATCH_SETTLE).await;
                while rx.try_recv().is_ok() {}

                tracing::debug!(paths = %provider.describe_paths(), "Schema files changed");
                if let Ok(schema) = provider.resolve_schema().await {
                    handler(schema);
                }
            }
        });

        SchemaSubscription::watching(watcher, task)
    }
}

impl fmt::Debug for FileSchemaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSchemaProvider")
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_log::testing::RecordingLog;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_merges_schema_files() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("schema.graphql");
        let extension = dir.path().join("extension.graphql");
        fs::write(&base, "type Query { droid: Droid }\ntype Droid { name: String }").unwrap();
        fs::write(&extension, "extend type Droid { model: String }").unwrap();

        let provider = FileSchemaProvider::new(vec![base, extension], crate::noop_log());
        let schema = provider.resolve_schema().await.unwrap();

        let droid = schema.schema().get_object("Droid").unwrap();
        assert!(droid.fields.contains_key("name"));
        assert!(droid.fields.contains_key("model"));
    }

    #[tokio::test]
    async fn test_missing_file_reports_two_errors() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(RecordingLog::default());
        let provider = FileSchemaProvider::new(
            vec![dir.path().join("missing.graphql")],
            log.clone() as Arc<dyn DebugLog>,
        );

        let err = provider.resolve_schema().await.unwrap_err();
        assert!(matches!(err, SchemaProviderError::Read { .. }));

        let errors = log.errors.lock().unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("missing.graphql"));
        assert!(errors[1].starts_with("Unable to load the schema"));
    }

    #[tokio::test]
    async fn test_invalid_sdl_reports_two_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.graphql");
        fs::write(&path, "type Query {").unwrap();
        let log = Arc::new(RecordingLog::default());
        let provider = FileSchemaProvider::new(vec![path], log.clone() as Arc<dyn DebugLog>);

        let err = provider.resolve_schema().await.unwrap_err();
        assert!(matches!(err, SchemaProviderError::Parse { .. }));
        assert_eq!(log.errors.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_federated_sdl_joins_files() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.graphql");
        let b = dir.path().join("b.graphql");
        fs::write(&a, "type Query { a: Int }").unwrap();
        fs::write(&b, "extend type Query { b: Int }").unwrap();

        let provider = FileSchemaProvider::new(vec![a, b], crate::noop_log());
        let sdl = provider.resolve_federated_service_sdl().await.unwrap();
        assert_eq!(
            sdl.as_deref(),
            Some("type Query { a: Int }\nextend type Query { b: Int }")
        );
    }

    #[tokio::test]
    async fn test_watch_reports_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schema.graphql");
        fs::write(&path, "type Query { a: Int }").unwrap();
        // Events are reported for canonical paths on some platforms
        let path = path.canonicalize().unwrap();

        let provider = FileSchemaProvider::new(vec![path.clone()], crate::noop_log());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = provider.on_schema_change(Arc::new(move |schema: ServerSchema| {
            let _ = tx.send(schema);
        }));
        assert!(subscription.is_active());

        fs::write(&path, "type Query { a: Int b: Int }").unwrap();
        let schema = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(schema
            .schema()
            .get_object("Query")
            .unwrap()
            .fields
            .contains_key("b"));
    }
}
