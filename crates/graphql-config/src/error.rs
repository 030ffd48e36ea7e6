use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration at {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration at {path} ({field}): {message}")]
    Invalid {
        path: PathBuf,
        field: String,
        message: String,
    },

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
}
