use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProjectError>;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("Configuration error: {0}")]
    Config(#[from] graphql_config::ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] graphql_extract::ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schema(#[from] SchemaProviderError),

    #[error(
        "There are multiple definitions for the `{name}` operation. Please rename one of them. \
         Found in {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateOperationName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No project owns {0}")]
    ProjectNotFound(String),

    #[error(transparent)]
    FractionalIndex(#[from] FractionalIndexError),
}

/// Failures while resolving a schema from one of the providers
#[derive(Debug, Error)]
pub enum SchemaProviderError {
    #[error(
        "Tried to introspect a running GraphQL service at {url}\n\
         It expected a JSON schema introspection result, but got an HTML response instead.\n\
         You may need to add headers to your request or adjust your endpoint url."
    )]
    Html { url: String },

    #[error(
        "Failed to connect to a running GraphQL endpoint at {url}\n\
         This may be because you didn't start your service or the url is wrong."
    )]
    ConnectionRefused { url: String },

    #[error("Errors in introspection query result from {url}:\n{}", messages.join("\n"))]
    GraphQLErrors { url: String, messages: Vec<String> },

    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Unable to read schema file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to parse schema from {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("Registry error for {service}: {message}")]
    Registry { service: String, message: String },

    #[error("{0}")]
    Unsupported(String),
}

/// Invalid input to fractional key generation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FractionalIndexError {
    #[error("Invalid fractional index key: {0:?}")]
    InvalidKey(String),

    #[error("Fractional index keys out of order: {a:?} >= {b:?}")]
    OutOfOrder { a: String, b: String },

    #[error("Fractional index key fraction ends in zero")]
    TrailingZero,

    #[error("Fractional index key space exhausted")]
    Exhausted,
}
