use crate::{ConfigError, Result};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Tag used for embedded documents when the config does not name one
pub const DEFAULT_TAG_NAME: &str = "gql";

/// Registry tag used when a `name@tag` specifier omits the tag
pub const DEFAULT_REGISTRY_TAG: &str = "current";

pub const DEFAULT_INCLUDES: &[&str] = &["src/**/*.{ts,tsx,js,jsx,graphql,gql}"];
pub const DEFAULT_EXCLUDES: &[&str] = &["**/node_modules", "**/__tests__"];

/// The kind of project a config root describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Operations embedded in application code, validated against the merged schema
    Client,
    /// Schema documents tracked against a managed registry
    Registry,
}

/// Where a project's server schema comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceConfig {
    /// One or more SDL files on disk, relative to the project root
    LocalFile { paths: Vec<String> },
    /// A live GraphQL endpoint queried with introspection
    RemoteEndpoint {
        url: String,
        headers: BTreeMap<String, String>,
        skip_ssl_validation: bool,
    },
    /// A service registered in a schema registry
    Registry { name: String, tag: String },
}

impl ServiceConfig {
    /// Parse a `name@tag` registry specifier
    #[must_use]
    pub fn from_specifier(specifier: &str) -> Self {
        let (name, tag) = specifier
            .split_once('@')
            .map_or((specifier, DEFAULT_REGISTRY_TAG), |(name, tag)| (name, tag));
        Self::Registry {
            name: name.to_string(),
            tag: if tag.is_empty() {
                DEFAULT_REGISTRY_TAG.to_string()
            } else {
                tag.to_string()
            },
        }
    }

    /// Whether the schema is fetched over the network
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteEndpoint { .. } | Self::Registry { .. })
    }
}

/// Fully resolved configuration for one project root.
///
/// Produced once per config file and replaced wholesale on reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub kind: ProjectKind,
    pub service: ServiceConfig,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub tag_name: String,
    /// Directory containing the config file; globs and schema paths resolve against it
    pub root: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<PathBuf>,
    /// Field latencies below this value are not decorated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_threshold_ms: Option<f64>,
}

impl ProjectConfig {
    /// A client project with default file patterns
    #[must_use]
    pub fn client(root: impl Into<PathBuf>, service: ServiceConfig) -> Self {
        Self {
            kind: ProjectKind::Client,
            service,
            includes: DEFAULT_INCLUDES.iter().map(ToString::to_string).collect(),
            excludes: DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect(),
            tag_name: DEFAULT_TAG_NAME.to_string(),
            root: root.into(),
            config_path: None,
            latency_threshold_ms: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: ProjectKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_includes(mut self, includes: Vec<String>) -> Self {
        self.includes = includes;
        self
    }

    #[must_use]
    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes;
        self
    }

    #[must_use]
    pub fn with_tag_name(mut self, tag_name: impl Into<String>) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    /// Build a matcher for this project's include/exclude globs
    pub fn file_matcher(&self) -> Result<FileMatcher> {
        FileMatcher::new(&self.root, &self.includes, &self.excludes)
    }

    /// Resolve a schema path from the config against the project root
    #[must_use]
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let candidate = Path::new(path);
        if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.root.join(path.strip_prefix("./").unwrap_or(path))
        }
    }
}

/// Compiled include/exclude globs for one project root
#[derive(Debug, Clone)]
pub struct FileMatcher {
    root: PathBuf,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl FileMatcher {
    pub fn new(root: &Path, includes: &[String], excludes: &[String]) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            includes: compile_patterns(includes)?,
            excludes: compile_patterns(excludes)?,
        })
    }

    /// Whether `path` belongs to this project.
    ///
    /// A file is excluded when the file itself or any of its parent directories
    /// matches an exclude pattern.
    #[must_use]
    pub fn matches(&self, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };

        if !self
            .includes
            .iter()
            .any(|pattern| pattern.matches_path_with(relative, MATCH_OPTIONS))
        {
            return false;
        }

        !relative.ancestors().any(|ancestor| {
            !ancestor.as_os_str().is_empty()
                && self
                    .excludes
                    .iter()
                    .any(|pattern| pattern.matches_path_with(ancestor, MATCH_OPTIONS))
        })
    }

    /// Whether a directory can be skipped entirely while scanning
    #[must_use]
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        dir.strip_prefix(&self.root).is_ok_and(|relative| {
            !relative.as_os_str().is_empty()
                && self
                    .excludes
                    .iter()
                    .any(|pattern| pattern.matches_path_with(relative, MATCH_OPTIONS))
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .flat_map(|pattern| expand_braces(pattern))
        .map(|pattern| {
            let normalized = pattern.strip_prefix("./").unwrap_or(&pattern);
            Pattern::new(normalized).map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Expand brace patterns like `{ts,tsx}` since the glob crate doesn't support them
fn expand_braces(pattern: &str) -> Vec<String> {
    if let (Some(start), Some(end)) = (pattern.find('{'), pattern.find('}')) {
        if start < end {
            let before = &pattern[..start];
            let after = &pattern[end + 1..];
            return pattern[start + 1..end]
                .split(',')
                .flat_map(|option| expand_braces(&format!("{before}{option}{after}")))
                .collect();
        }
    }

    vec![pattern.to_string()]
}
