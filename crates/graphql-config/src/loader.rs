use crate::config::{DEFAULT_EXCLUDES, DEFAULT_INCLUDES, DEFAULT_TAG_NAME};
use crate::{ConfigError, ProjectConfig, ProjectKind, Result, ServiceConfig};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Config file names recognised in a project root, in order of preference
pub const CONFIG_FILES: &[&str] = &[
    "apollo.config.json",
    "apollo.config.yaml",
    "apollo.config.yml",
];

/// Find every config file below a workspace folder.
///
/// Each config file defines one project root. `node_modules` and hidden
/// directories are never descended into.
pub fn find_config_files(workspace_dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let walker = WalkDir::new(workspace_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name != "node_modules" && !name.starts_with('.'))
        });

    for entry in walker.filter_map(std::result::Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if CONFIG_FILES.contains(&name) {
            found.push(entry.path().to_path_buf());
        }
    }

    // Only one config per directory, by preference order
    found.sort_by_key(|path| {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let rank = CONFIG_FILES.iter().position(|f| *f == name).unwrap_or(usize::MAX);
        (path.parent().map(Path::to_path_buf), rank)
    });
    found.dedup_by(|a, b| a.parent() == b.parent());
    tracing::debug!(count = found.len(), dir = %workspace_dir.display(), "Found config files");
    found
}

/// Load a project config from the specified path.
/// Automatically detects the format based on file extension.
pub fn load_config(path: &Path) -> Result<ProjectConfig> {
    let contents = fs::read_to_string(path)?;
    load_config_from_str(&contents, path)
}

/// Load a project config from a string.
/// The path is used for error messages, format detection and as the project root.
pub fn load_config_from_str(contents: &str, path: &Path) -> Result<ProjectConfig> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    let raw: RawConfig = match extension {
        "yml" | "yaml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("YAML parse error: {e}"),
        })?,
        "json" => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("JSON parse error: {e}"),
        })?,
        _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    };

    let root = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    let config = resolve(raw, &root, path)?;
    config.file_matcher().map_err(|e| invalid(path, "includes", e.to_string()))?;

    tracing::info!(
        path = %path.display(),
        kind = ?config.kind,
        "Loaded project config"
    );
    Ok(config)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    client: Option<RawProject>,
    registry: Option<RawProject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProject {
    service: Option<Value>,
    includes: Option<Vec<String>>,
    excludes: Option<Vec<String>>,
    tag_name: Option<String>,
    latency_threshold_ms: Option<f64>,
}

fn invalid(path: &Path, field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        path: path.to_path_buf(),
        field: field.to_string(),
        message: message.into(),
    }
}

fn resolve(raw: RawConfig, root: &Path, path: &Path) -> Result<ProjectConfig> {
    let (kind, key, project) = match (raw.client, raw.registry) {
        (Some(_), Some(_)) => {
            return Err(invalid(
                path,
                "client",
                "conflicting project kinds: a config may define either `client` or `registry`, not both",
            ))
        }
        (Some(client), None) => (ProjectKind::Client, "client", client),
        (None, Some(registry)) => (ProjectKind::Registry, "registry", registry),
        (None, None) => {
            return Err(invalid(
                path,
                "client",
                "missing project definition: expected a `client` or `registry` section",
            ))
        }
    };

    let service_field = format!("{key}.service");
    let service = match project.service {
        Some(value) => parse_service(&value, root, path, &service_field)?,
        None => return Err(invalid(path, &service_field, "service is required")),
    };

    let tag_name = project
        .tag_name
        .unwrap_or_else(|| DEFAULT_TAG_NAME.to_string());
    if !is_valid_tag_name(&tag_name) {
        return Err(invalid(
            path,
            &format!("{key}.tagName"),
            format!("'{tag_name}' is not a valid identifier"),
        ));
    }

    let includes = project
        .includes
        .unwrap_or_else(|| DEFAULT_INCLUDES.iter().map(ToString::to_string).collect());
    if includes.is_empty() || includes.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid(
            path,
            &format!("{key}.includes"),
            "include patterns must be non-empty",
        ));
    }

    let excludes = project
        .excludes
        .unwrap_or_else(|| DEFAULT_EXCLUDES.iter().map(ToString::to_string).collect());

    Ok(ProjectConfig {
        kind,
        service,
        includes,
        excludes,
        tag_name,
        root: root.to_path_buf(),
        config_path: Some(path.to_path_buf()),
        latency_threshold_ms: project.latency_threshold_ms,
    })
}

/// Parse the `service` descriptor: a `name@tag` string, a local schema file
/// object, or a remote endpoint object
fn parse_service(value: &Value, root: &Path, path: &Path, field: &str) -> Result<ServiceConfig> {
    match value {
        Value::String(specifier) if !specifier.trim().is_empty() => {
            Ok(ServiceConfig::from_specifier(specifier.trim()))
        }
        Value::Object(map) => {
            if let Some(local) = map.get("localSchemaFile") {
                let paths = match local {
                    Value::String(p) => vec![p.clone()],
                    Value::Array(items) => items
                        .iter()
                        .map(|item| {
                            item.as_str().map(ToString::to_string).ok_or_else(|| {
                                invalid(
                                    path,
                                    &format!("{field}.localSchemaFile"),
                                    "expected a list of file paths",
                                )
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    _ => {
                        return Err(invalid(
                            path,
                            &format!("{field}.localSchemaFile"),
                            "expected a file path or a list of file paths",
                        ))
                    }
                };
                if paths.is_empty() || paths.iter().any(|p| p.trim().is_empty()) {
                    return Err(invalid(
                        path,
                        &format!("{field}.localSchemaFile"),
                        "schema file paths must be non-empty",
                    ));
                }
                tracing::debug!(root = %root.display(), files = paths.len(), "Local schema service");
                return Ok(ServiceConfig::LocalFile { paths });
            }

            if let Some(url) = map.get("url") {
                let Some(url) = url.as_str().filter(|u| !u.trim().is_empty()) else {
                    return Err(invalid(
                        path,
                        &format!("{field}.url"),
                        "expected a non-empty URL",
                    ));
                };
                let headers = match map.get("headers") {
                    None | Some(Value::Null) => BTreeMap::new(),
                    Some(Value::Object(headers)) => headers
                        .iter()
                        .map(|(name, value)| {
                            value
                                .as_str()
                                .map(|v| (name.clone(), v.to_string()))
                                .ok_or_else(|| {
                                    invalid(
                                        path,
                                        &format!("{field}.headers.{name}"),
                                        "header values must be strings",
                                    )
                                })
                        })
                        .collect::<Result<BTreeMap<_, _>>>()?,
                    Some(_) => {
                        return Err(invalid(
                            path,
                            &format!("{field}.headers"),
                            "expected a map of header names to values",
                        ))
                    }
                };
                let skip_ssl_validation = map
                    .get("skipSSLValidation")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                return Ok(ServiceConfig::RemoteEndpoint {
                    url: url.to_string(),
                    headers,
                    skip_ssl_validation,
                });
            }

            if let Some(name) = map.get("name").and_then(Value::as_str) {
                let tag = map.get("tag").and_then(Value::as_str).unwrap_or_default();
                return Ok(ServiceConfig::from_specifier(&format!("{name}@{tag}")));
            }

            Err(invalid(
                path,
                field,
                "expected one of `localSchemaFile`, `url` or `name`",
            ))
        }
        _ => Err(invalid(
            path,
            field,
            "expected a `name@tag` string or a service object",
        )),
    }
}

fn is_valid_tag_name(tag: &str) -> bool {
    let mut chars = tag.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(suffix: &str, contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(suffix).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_yaml_client_with_local_schema() {
        let file = write_config(
            ".yml",
            r"
client:
  service:
    name: local
    localSchemaFile: ./schema.graphql
  includes:
    - src/**/*.ts
  tagName: graphql
",
        );

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.kind, ProjectKind::Client);
        assert_eq!(config.tag_name, "graphql");
        assert_eq!(config.includes, vec!["src/**/*.ts".to_string()]);
        assert_eq!(
            config.service,
            ServiceConfig::LocalFile {
                paths: vec!["./schema.graphql".to_string()]
            }
        );
        assert_eq!(config.root, file.path().parent().unwrap());
    }

    #[test]
    fn test_load_json_remote_endpoint() {
        let file = write_config(
            ".json",
            r#"{
  "client": {
    "service": {
      "name": "remote",
      "url": "http://localhost:4000/graphql",
      "headers": { "authorization": "Bearer abc" },
      "skipSSLValidation": true
    }
  }
}"#,
        );

        let config = load_config(file.path()).unwrap();
        let ServiceConfig::RemoteEndpoint {
            url,
            headers,
            skip_ssl_validation,
        } = config.service
        else {
            panic!("expected remote endpoint");
        };
        assert_eq!(url, "http://localhost:4000/graphql");
        assert_eq!(headers.get("authorization").unwrap(), "Bearer abc");
        assert!(skip_ssl_validation);
        assert_eq!(config.tag_name, "gql");
    }

    #[test]
    fn test_load_registry_specifier() {
        let file = write_config(".yaml", "registry:\n  service: my-graph@prod\n");

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.kind, ProjectKind::Registry);
        assert_eq!(config.service, ServiceConfig::from_specifier("my-graph@prod"));
    }

    #[test]
    fn test_conflicting_project_kinds() {
        let file = write_config(
            ".yml",
            "client:\n  service: a@current\nregistry:\n  service: b@current\n",
        );

        let err = load_config(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("conflicting project kinds"), "{message}");
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_missing_service_names_field() {
        let file = write_config(".yml", "client:\n  tagName: gql\n");

        let err = load_config(file.path()).unwrap_err();
        match err {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "client.service"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_tag_name() {
        let file = write_config(".yml", "client:\n  service: a\n  tagName: \"1nope\"\n");

        let err = load_config(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "client.tagName"));
    }

    #[test]
    fn test_bad_header_value() {
        let file = write_config(
            ".json",
            r#"{"client": {"service": {"url": "http://x", "headers": {"x-n": 1}}}}"#,
        );

        let err = load_config(file.path()).unwrap_err();
        assert!(
            matches!(err, ConfigError::Invalid { ref field, .. } if field == "client.service.headers.x-n")
        );
    }

    #[test]
    fn test_unsupported_format() {
        let file = write_config(".toml", "client = 1");
        assert!(matches!(
            load_config(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_find_config_files_skips_node_modules() {
        let temp_dir = tempfile::tempdir().unwrap();
        let app = temp_dir.path().join("app");
        let vendored = temp_dir.path().join("node_modules").join("dep");
        fs::create_dir_all(&app).unwrap();
        fs::create_dir_all(&vendored).unwrap();
        fs::write(app.join("apollo.config.yml"), "client:\n  service: a\n").unwrap();
        fs::write(app.join("apollo.config.json"), r#"{"client":{"service":"a"}}"#).unwrap();
        fs::write(vendored.join("apollo.config.yml"), "client:\n  service: b\n").unwrap();

        let found = find_config_files(temp_dir.path());
        assert_eq!(found, vec![app.join("apollo.config.json")]);
    }
}
