mod config;
mod error;
mod loader;

pub use config::{
    FileMatcher, ProjectConfig, ProjectKind, ServiceConfig, DEFAULT_EXCLUDES, DEFAULT_INCLUDES,
    DEFAULT_REGISTRY_TAG, DEFAULT_TAG_NAME,
};
pub use error::{ConfigError, Result};
pub use loader::{find_config_files, load_config, load_config_from_str, CONFIG_FILES};
