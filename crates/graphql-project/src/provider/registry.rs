use super::{ResolveOptions, SchemaSource, ServerSchema};
use crate::{DebugLog, SchemaProviderError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

/// Average field latency in milliseconds, keyed by `Type.field`
pub type FieldLatencies = Arc<HashMap<String, f64>>;

/// What a registry returns for one service variant
#[derive(Debug, Clone, Default)]
pub struct RegistrySchema {
    pub sdl: String,
    pub field_latencies: HashMap<String, f64>,
}

/// Network access to a managed schema registry.
///
/// The wire protocol lives outside this crate; implementations only need to
/// turn a service name and tag into SDL.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    async fn fetch_schema(
        &self,
        service: &str,
        tag: &str,
    ) -> Result<RegistrySchema, SchemaProviderError>;

    async fn fetch_federated_sdl(
        &self,
        _service: &str,
        _tag: &str,
    ) -> Result<Option<String>, SchemaProviderError> {
        Ok(None)
    }
}

/// Resolves schemas for a registered service, one cache entry per tag
pub struct RegistrySchemaProvider {
    service: String,
    tag: String,
    client: Option<Arc<dyn RegistryClient>>,
    cache: Mutex<HashMap<String, ServerSchema>>,
    latencies: RwLock<Option<FieldLatencies>>,
    log: Arc<dyn DebugLog>,
}

impl RegistrySchemaProvider {
    #[must_use]
    pub fn new(
        service: &str,
        tag: &str,
        client: Option<Arc<dyn RegistryClient>>,
        log: Arc<dyn DebugLog>,
    ) -> Self {
        Self {
            service: service.to_string(),
            tag: tag.to_string(),
            client,
            cache: Mutex::new(HashMap::new()),
            latencies: RwLock::new(None),
            log,
        }
    }

    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn client(&self) -> Result<&Arc<dyn RegistryClient>, SchemaProviderError> {
        self.client.as_ref().ok_or_else(|| {
            SchemaProviderError::Unsupported(format!(
                "No registry client is configured; cannot load schema for {}@{}",
                self.service, self.tag
            ))
        })
    }

    #[tracing::instrument(skip(self, options), fields(service = %self.service))]
    pub async fn resolve_schema(
        &self,
        options: ResolveOptions,
    ) -> Result<ServerSchema, SchemaProviderError> {
        let tag = options.tag.unwrap_or_else(|| self.tag.clone());

        let mut cache = self.cache.lock().await;
        if !options.force {
            if let Some(schema) = cache.get(&tag) {
                return Ok(schema.clone());
            }
        }

        let fetched = match self.client() {
            Ok(client) => client.fetch_schema(&self.service, &tag).await,
            Err(e) => Err(e),
        };
        let fetched = fetched.inspect_err(|error| self.log.error(&error.to_string()))?;

        let origin = format!("{}@{tag}", self.service);
        let schema = ServerSchema::from_sources(vec![SchemaSource::new(origin, fetched.sdl)])
            .inspect_err(|error| self.log.error(&error.to_string()))?;

        if tag == self.tag {
            *self
                .latencies
                .write()
                .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(fetched.field_latencies));
        }

        tracing::info!(tag = %tag, "Loaded schema from registry");
        cache.insert(tag, schema.clone());
        Ok(schema)
    }

    pub async fn resolve_federated_service_sdl(
        &self,
    ) -> Result<Option<String>, SchemaProviderError> {
        self.client()?
            .fetch_federated_sdl(&self.service, &self.tag)
            .await
    }

    /// Latencies reported with the most recent schema for the configured tag
    #[must_use]
    pub fn field_latencies(&self) -> Option<FieldLatencies> {
        self.latencies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for RegistrySchemaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySchemaProvider")
            .field("service", &self.service)
            .field("tag", &self.tag)
            .field("has_client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a fixed SDL for every tag and counts fetches
    #[derive(Debug, Default)]
    pub(crate) struct StaticRegistry {
        pub sdl: String,
        pub latencies: HashMap<String, f64>,
        pub fetches: AtomicUsize,
    }

    impl StaticRegistry {
        pub(crate) fn new(sdl: &str) -> Self {
            Self {
                sdl: sdl.to_string(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl RegistryClient for StaticRegistry {
        async fn fetch_schema(
            &self,
            _service: &str,
            tag: &str,
        ) -> Result<RegistrySchema, SchemaProviderError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if tag == "missing" {
                return Err(SchemaProviderError::Registry {
                    service: "engine".to_string(),
                    message: format!("no schema published for tag {tag}"),
                });
            }
            Ok(RegistrySchema {
                sdl: self.sdl.clone(),
                field_latencies: self.latencies.clone(),
            })
        }
    }

    #[tokio::test]
    async fn test_caches_per_tag() {
        let registry = Arc::new(StaticRegistry::new("type Query { me: String }"));
        let provider = RegistrySchemaProvider::new(
            "engine",
            "current",
            Some(registry.clone() as Arc<dyn RegistryClient>),
            crate::noop_log(),
        );

        provider.resolve_schema(ResolveOptions::default()).await.unwrap();
        provider.resolve_schema(ResolveOptions::default()).await.unwrap();
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 1);

        let staging = ResolveOptions {
            tag: Some("staging".to_string()),
            force: false,
        };
        provider.resolve_schema(staging).await.unwrap();
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 2);

        provider.resolve_schema(ResolveOptions::forced()).await.unwrap();
        assert_eq!(registry.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_latencies_follow_configured_tag() {
        let mut registry = StaticRegistry::new("type Query { me: String }");
        registry.latencies.insert("Query.me".to_string(), 12.0);
        let provider = RegistrySchemaProvider::new(
            "engine",
            "current",
            Some(Arc::new(registry) as Arc<dyn RegistryClient>),
            crate::noop_log(),
        );

        assert!(provider.field_latencies().is_none());
        provider.resolve_schema(ResolveOptions::default()).await.unwrap();
        let latencies = provider.field_latencies().unwrap();
        assert_eq!(latencies.get("Query.me"), Some(&12.0));
    }

    #[tokio::test]
    async fn test_registry_errors_propagate() {
        let provider = RegistrySchemaProvider::new(
            "engine",
            "missing",
            Some(Arc::new(StaticRegistry::new("")) as Arc<dyn RegistryClient>),
            crate::noop_log(),
        );
        let err = provider
            .resolve_schema(ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaProviderError::Registry { .. }));
    }

    #[tokio::test]
    async fn test_without_client_is_unsupported() {
        let provider = RegistrySchemaProvider::new("engine", "current", None, crate::noop_log());
        let err = provider
            .resolve_schema(ResolveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SchemaProviderError::Unsupported(_)));
        assert!(provider.resolve_federated_service_sdl().await.is_err());
    }
}
