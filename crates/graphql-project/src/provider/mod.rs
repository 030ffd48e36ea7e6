//! Schema providers: where a project's server schema comes from.

mod endpoint;
mod file;
pub mod introspection;
mod registry;

pub use endpoint::EndpointSchemaProvider;
pub use file::FileSchemaProvider;
pub use registry::{FieldLatencies, RegistryClient, RegistrySchema, RegistrySchemaProvider};

use crate::{DebugLog, SchemaProviderError};
use apollo_compiler::validation::Valid;
use apollo_compiler::Schema;
use graphql_config::{ProjectConfig, ServiceConfig};
use std::fmt;
use std::sync::Arc;

/// One SDL document the server schema was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    /// File path, URL or registry identifier the SDL came from
    pub origin: String,
    pub sdl: String,
}

impl SchemaSource {
    #[must_use]
    pub fn new(origin: impl Into<String>, sdl: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            sdl: sdl.into(),
        }
    }
}

/// A resolved server schema together with the SDL it was built from
#[derive(Debug, Clone)]
pub struct ServerSchema {
    sources: Arc<[SchemaSource]>,
    schema: Arc<Valid<Schema>>,
}

impl ServerSchema {
    /// Build a schema from SDL sources. Later sources may extend types
    /// declared in earlier ones.
    pub fn from_sources(sources: Vec<SchemaSource>) -> Result<Self, SchemaProviderError> {
        let mut builder = Schema::builder().adopt_orphan_extensions();
        for source in &sources {
            builder = builder.parse(source.sdl.as_str(), source.origin.as_str());
        }

        let origin = sources
            .iter()
            .map(|s| s.origin.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let schema = builder.build().map_err(|with_errors| SchemaProviderError::Parse {
            origin: origin.clone(),
            message: with_errors
                .errors
                .iter()
                .map(|diag| diag.error.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        })?;

        let schema = match schema.validate() {
            Ok(valid) => valid,
            Err(with_errors) => {
                tracing::warn!(
                    origin = %origin,
                    errors = with_errors.errors.len(),
                    "Server schema has validation errors"
                );
                Valid::assume_valid(with_errors.partial)
            }
        };

        Ok(Self {
            sources: sources.into(),
            schema: Arc::new(schema),
        })
    }

    #[must_use]
    pub fn sources(&self) -> &[SchemaSource] {
        &self.sources
    }

    #[must_use]
    pub fn schema(&self) -> &Valid<Schema> {
        &self.schema
    }

    /// SDL text for every source, or the printed schema when there are none
    #[must_use]
    pub fn sdl_sources(&self) -> Vec<SchemaSource> {
        if self.sources.is_empty() {
            vec![SchemaSource::new("schema.graphql", self.schema.to_string())]
        } else {
            self.sources.to_vec()
        }
    }
}

/// Options for [`SchemaProvider::resolve_schema`]
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Registry variant to resolve; ignored by other providers
    pub tag: Option<String>,
    /// Bypass any cached schema where the provider supports it
    pub force: bool,
}

impl ResolveOptions {
    #[must_use]
    pub const fn forced() -> Self {
        Self {
            tag: None,
            force: true,
        }
    }
}

/// Called with the freshly resolved schema whenever a provider notices a change
pub type SchemaChangeHandler = Arc<dyn Fn(ServerSchema) + Send + Sync>;

/// Keeps a schema change subscription alive; dropping it unsubscribes
#[derive(Default)]
pub struct SchemaSubscription {
    watcher: Option<notify::RecommendedWatcher>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl SchemaSubscription {
    /// A subscription that never fires
    #[must_use]
    pub const fn inert() -> Self {
        Self {
            watcher: None,
            task: None,
        }
    }

    pub(crate) const fn watching(
        watcher: notify::RecommendedWatcher,
        task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            watcher: Some(watcher),
            task: Some(task),
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.watcher = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SchemaSubscription {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for SchemaSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The closed set of schema backends
#[derive(Debug)]
pub enum SchemaProvider {
    File(FileSchemaProvider),
    Endpoint(EndpointSchemaProvider),
    Registry(RegistrySchemaProvider),
}

impl SchemaProvider {
    /// Pick the provider matching a project's service descriptor
    pub fn from_config(
        config: &ProjectConfig,
        registry_client: Option<Arc<dyn RegistryClient>>,
        log: Arc<dyn DebugLog>,
    ) -> Result<Self, SchemaProviderError> {
        let provider = match &config.service {
            ServiceConfig::LocalFile { paths } => Self::File(FileSchemaProvider::new(
                paths.iter().map(|path| config.resolve_path(path)).collect(),
                log,
            )),
            ServiceConfig::RemoteEndpoint {
                url,
                headers,
                skip_ssl_validation,
            } => Self::Endpoint(EndpointSchemaProvider::new(
                url,
                headers.clone(),
                *skip_ssl_validation,
                log,
            )?),
            ServiceConfig::Registry { name, tag } => Self::Registry(RegistrySchemaProvider::new(
                name,
                tag,
                registry_client,
                log,
            )),
        };
        tracing::debug!(provider = provider.kind(), "Selected schema provider");
        Ok(provider)
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Endpoint(_) => "endpoint",
            Self::Registry(_) => "registry",
        }
    }

    /// Whether the schema lives on a remote service
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        !matches!(self, Self::File(_))
    }

    pub async fn resolve_schema(
        &self,
        options: ResolveOptions,
    ) -> Result<ServerSchema, SchemaProviderError> {
        match self {
            Self::File(provider) => provider.resolve_schema().await,
            Self::Endpoint(provider) => provider.resolve_schema().await,
            Self::Registry(provider) => provider.resolve_schema(options).await,
        }
    }

    pub fn on_schema_change(&self, handler: SchemaChangeHandler) -> SchemaSubscription {
        match self {
            Self::File(provider) => provider.on_schema_change(handler),
            Self::Endpoint(_) | Self::Registry(_) => {
                tracing::debug!(
                    provider = self.kind(),
                    "Schema change notifications are not supported; reload to refresh"
                );
                SchemaSubscription::inert()
            }
        }
    }

    /// Fetch the SDL a federated service reports about itself
    pub async fn resolve_federated_service_sdl(
        &self,
    ) -> Result<Option<String>, SchemaProviderError> {
        match self {
            Self::File(provider) => provider.resolve_federated_service_sdl().await,
            Self::Endpoint(provider) => provider.resolve_federated_service_sdl().await,
            Self::Registry(provider) => provider.resolve_federated_service_sdl().await,
        }
    }

    /// Measured field latencies, only known to registry providers
    #[must_use]
    pub fn field_latencies(&self) -> Option<FieldLatencies> {
        match self {
            Self::Registry(provider) => provider.field_latencies(),
            Self::File(_) | Self::Endpoint(_) => None,
        }
    }
}
