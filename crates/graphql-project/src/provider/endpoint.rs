use super::introspection::{
    introspection_to_sdl, IntrospectionData, INTROSPECTION_QUERY, SERVICE_SDL_QUERY,
};
use super::{SchemaSource, ServerSchema};
use crate::{DebugLog, SchemaProviderError};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQLError>,
}

#[derive(Debug, Deserialize)]
struct GraphQLError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ServiceData {
    #[serde(rename = "_service")]
    service: Option<ServiceSdl>,
}

#[derive(Debug, Deserialize)]
struct ServiceSdl {
    sdl: Option<String>,
}

/// Introspects a running GraphQL service.
///
/// The first successful result is kept for the provider's lifetime.
pub struct EndpointSchemaProvider {
    url: String,
    headers: BTreeMap<String, String>,
    client: reqwest::Client,
    cached: Mutex<Option<ServerSchema>>,
    log: Arc<dyn DebugLog>,
}

impl EndpointSchemaProvider {
    pub fn new(
        url: &str,
        headers: BTreeMap<String, String>,
        skip_ssl_validation: bool,
        log: Arc<dyn DebugLog>,
    ) -> Result<Self, SchemaProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .danger_accept_invalid_certs(skip_ssl_validation)
            .build()
            .map_err(|e| SchemaProviderError::Http {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            url: url.to_string(),
            headers,
            client,
            cached: Mutex::new(None),
            log,
        })
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn resolve_schema(&self) -> Result<ServerSchema, SchemaProviderError> {
        let mut cached = self.cached.lock().await;
        if let Some(schema) = cached.as_ref() {
            return Ok(schema.clone());
        }

        let schema = self.introspect().await.inspect_err(|error| {
            self.log.error(&error.to_string());
        })?;
        tracing::info!("Loaded schema from endpoint");
        *cached = Some(schema.clone());
        Ok(schema)
    }

    async fn introspect(&self) -> Result<ServerSchema, SchemaProviderError> {
        let data: IntrospectionData = self.execute(INTROSPECTION_QUERY).await?;
        let sdl = introspection_to_sdl(&data.schema);
        ServerSchema::from_sources(vec![SchemaSource::new(self.url.clone(), sdl)])
    }

    #[tracing::instrument(skip(self), fields(url = %self.url))]
    pub async fn resolve_federated_service_sdl(
        &self,
    ) -> Result<Option<String>, SchemaProviderError> {
        let data: ServiceData = self.execute(SERVICE_SDL_QUERY).await.inspect_err(|error| {
            self.log.error(&error.to_string());
        })?;
        Ok(data.service.and_then(|service| service.sdl))
    }

    async fn execute<T: DeserializeOwned>(&self, query: &str) -> Result<T, SchemaProviderError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "query": query }));
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() && is_connection_refused(&e) {
                SchemaProviderError::ConnectionRefused {
                    url: self.url.clone(),
                }
            } else {
                self.http_error(e)
            }
        })?;

        let status = response.status();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("text/html"));
        let body = response.text().await.map_err(|e| self.http_error(e))?;

        if is_html || body.trim_start().starts_with('<') {
            return Err(SchemaProviderError::Html {
                url: self.url.clone(),
            });
        }

        let parsed: GraphQLResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) => {
                return Err(SchemaProviderError::Http {
                    url: self.url.clone(),
                    message: if status.is_success() {
                        format!("invalid response: {e}")
                    } else {
                        format!("status {status}")
                    },
                });
            }
        };

        if !parsed.errors.is_empty() {
            return Err(SchemaProviderError::GraphQLErrors {
                url: self.url.clone(),
                messages: parsed.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        parsed.data.ok_or_else(|| SchemaProviderError::Http {
            url: self.url.clone(),
            message: format!("status {status}, response contained no data"),
        })
    }

    fn http_error(&self, error: reqwest::Error) -> SchemaProviderError {
        SchemaProviderError::Http {
            url: self.url.clone(),
            message: error.to_string(),
        }
    }
}

/// Whether an I/O error somewhere in the chain is a refused connection.
/// DNS and TLS failures also count as connect errors in reqwest.
fn is_connection_refused(error: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if error
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::ConnectionRefused)
        {
            return true;
        }
        current = error.source();
    }
    false
}

impl fmt::Debug for EndpointSchemaProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointSchemaProvider")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_log::testing::RecordingLog;
    use crate::provider::introspection::tests::droid_introspection;
    use serde_json::json;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: &str) -> EndpointSchemaProvider {
        EndpointSchemaProvider::new(url, BTreeMap::new(), false, crate::noop_log()).unwrap()
    }

    #[tokio::test]
    async fn test_introspects_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "data": droid_introspection() })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = BTreeMap::new();
        headers.insert("authorization".to_string(), "Bearer token".to_string());
        let provider =
            EndpointSchemaProvider::new(&server.uri(), headers, false, crate::noop_log()).unwrap();

        let schema = provider.resolve_schema().await.unwrap();
        assert!(schema.schema().get_object("Droid").is_some());

        // Served from the cache; the mock expects exactly one request
        let again = provider.resolve_schema().await.unwrap();
        assert!(again.schema().get_object("Query").is_some());
    }

    #[tokio::test]
    async fn test_html_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<!DOCTYPE html><html></html>", "text/html"),
            )
            .mount(&server)
            .await;

        let log = Arc::new(RecordingLog::default());
        let provider = EndpointSchemaProvider::new(
            &server.uri(),
            BTreeMap::new(),
            false,
            log.clone() as Arc<dyn DebugLog>,
        )
        .unwrap();

        let err = provider.resolve_schema().await.unwrap_err();
        assert!(matches!(err, SchemaProviderError::Html { .. }));
        assert!(log.errors.lock().unwrap()[0].contains("HTML response"));
    }

    #[tokio::test]
    async fn test_graphql_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errors": [{ "message": "Introspection is disabled" }]
            })))
            .mount(&server)
            .await;

        let err = provider(&server.uri()).resolve_schema().await.unwrap_err();
        match err {
            SchemaProviderError::GraphQLErrors { messages, .. } => {
                assert_eq!(messages, vec!["Introspection is disabled".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind and release a port so nothing is listening on it
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = provider(&url).resolve_schema().await.unwrap_err();
        assert!(
            matches!(err, SchemaProviderError::ConnectionRefused { .. }),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn test_federated_sdl() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "_service": { "sdl": "type Query { me: String }" } }
            })))
            .mount(&server)
            .await;

        let sdl = provider(&server.uri())
            .resolve_federated_service_sdl()
            .await
            .unwrap();
        assert_eq!(sdl.as_deref(), Some("type Query { me: String }"));
    }

    #[derive(Debug)]
    struct Wrapped(std::io::Error);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "client error")
        }
    }

    impl std::error::Error for Wrapped {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_refused_is_found_in_source_chain() {
        let refused = Wrapped(std::io::ErrorKind::ConnectionRefused.into());
        let timed_out = Wrapped(std::io::ErrorKind::TimedOut.into());
        assert!(is_connection_refused(&refused));
        assert!(!is_connection_refused(&timed_out));
    }

    #[tokio::test]
    async fn test_failed_tls_handshake_is_not_reported_as_refused() {
        // Accepts connections and hangs up before any TLS handshake
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("https://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });

        let err = provider(&url).resolve_schema().await.unwrap_err();
        assert!(
            matches!(err, SchemaProviderError::Http { .. }),
            "unexpected error: {err}"
        );
    }
}
