use crate::{ExtractError, LanguageId, LineIndex, LocationOffset, Result, SourceFragment};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$\{.*?\}").expect("placeholder pattern is valid"));

static REASON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\[%(?:graphql|relay\.\w*)\s*\{\|(?P<body>.+?)\|\}")
        .expect("reason pattern is valid")
});

/// Extract GraphQL fragments from host text.
///
/// Returns `None` for unknown language ids and when nothing is embedded.
#[must_use]
pub fn extract(
    uri: &str,
    host_text: &str,
    language_id: &str,
    tag_name: &str,
) -> Option<Vec<SourceFragment>> {
    let language = LanguageId::from_id(language_id)?;
    match Extractor::new(tag_name) {
        Ok(extractor) => extractor.extract(uri, host_text, language),
        Err(e) => {
            tracing::warn!(tag = tag_name, error = %e, "Cannot build extraction patterns");
            None
        }
    }
}

/// Read a file from disk and extract its fragments, detecting the language from
/// the file extension
pub fn extract_from_file(path: &Path, uri: &str, tag_name: &str) -> Result<Option<Vec<SourceFragment>>> {
    let language = LanguageId::from_path(path)
        .ok_or_else(|| ExtractError::UnsupportedFileType(path.to_path_buf()))?;
    let text = fs::read_to_string(path)?;
    Ok(Extractor::new(tag_name)?.extract(uri, &text, language))
}

/// Compiled extraction patterns for one tag name
#[derive(Debug, Clone)]
pub struct Extractor {
    tag_name: String,
    template: Regex,
    python: Regex,
    ruby: Vec<Regex>,
    dart: Regex,
    elixir: Regex,
}

impl Extractor {
    pub fn new(tag_name: &str) -> Result<Self> {
        let tag = regex::escape(tag_name);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|source| ExtractError::Pattern {
                tag: tag_name.to_string(),
                source,
            })
        };

        // `TAG`...``, `TAG<T>`...``, `TAG(`...`)`, `/* GraphQL */ `...`` or a bare
        // template that must then start with `#graphql`
        let template = compile(format!(
            r"(?s)(?P<prefix>\b{tag}\s*(?:<[^`]*?>)?\s*\(?\s*|/\*\s*[Gg]raph[Qq][Ll]\s*\*/\s*)?`(?P<body>(?:[^`\\]|\\.)*)`"
        ))?;
        let python = compile(format!(
            r#"(?s)\b{tag}\s*\(\s*[bfruBFRU]{{0,2}}(?:"""(?P<b1>.*?)"""|'''(?P<b2>.*?)'''|"(?P<b3>[^"\n]*)"|'(?P<b4>[^'\n]*)')\s*\)"#
        ))?;

        let mut delimiters = vec!["GRAPHQL".to_string()];
        let upper = tag_name.to_uppercase();
        if !delimiters.contains(&upper) {
            delimiters.push(upper);
        }
        let ruby = delimiters
            .iter()
            .map(|delimiter| {
                let delimiter = regex::escape(delimiter);
                compile(format!(
                    r"(?sm)<<[-~]{delimiter}\b[^\n]*\n(?P<body>.*?)^[ \t]*{delimiter}\b"
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let dart = compile(format!(
            r#"(?s)\b{tag}\(\s*r?(?:"""(?P<b1>.*?)"""|'''(?P<b2>.*?)''')\s*\)"#
        ))?;
        let elixir = compile(format!(r#"(?s)\b{tag}\(\s*"""(?P<body>.*?)"""\s*\)"#))?;

        Ok(Self {
            tag_name: tag_name.to_string(),
            template,
            python,
            ruby,
            dart,
            elixir,
        })
    }

    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Extract every embedded fragment, or `None` if there are none
    #[must_use]
    pub fn extract(
        &self,
        uri: &str,
        host_text: &str,
        language: LanguageId,
    ) -> Option<Vec<SourceFragment>> {
        let fragments = match language {
            LanguageId::GraphQL => {
                if host_text.trim().is_empty() {
                    return None;
                }
                vec![SourceFragment::new(host_text, uri, LocationOffset::START)]
            }
            LanguageId::JavaScript
            | LanguageId::JavaScriptReact
            | LanguageId::TypeScript
            | LanguageId::TypeScriptReact
            | LanguageId::Vue
            | LanguageId::Svelte => self.extract_templates(uri, host_text),
            LanguageId::Python => {
                collect_alternatives(&self.python, uri, host_text, &["b1", "b2", "b3", "b4"])
            }
            LanguageId::Ruby => {
                let mut fragments: Vec<_> = self
                    .ruby
                    .iter()
                    .flat_map(|pattern| collect_alternatives(pattern, uri, host_text, &["body"]))
                    .collect();
                fragments.sort_by_key(|f| (f.location_offset.line, f.location_offset.column));
                fragments
            }
            LanguageId::Dart => collect_alternatives(&self.dart, uri, host_text, &["b1", "b2"]),
            LanguageId::Elixir => collect_alternatives(&self.elixir, uri, host_text, &["body"]),
            LanguageId::Reason => collect_alternatives(&REASON, uri, host_text, &["body"]),
        };

        tracing::trace!(uri, language = %language, count = fragments.len(), "Extracted fragments");
        if fragments.is_empty() {
            None
        } else {
            Some(fragments)
        }
    }

    fn extract_templates(&self, uri: &str, host_text: &str) -> Vec<SourceFragment> {
        let index = LineIndex::new(host_text);
        self.template
            .captures_iter(host_text)
            .filter_map(|captures| {
                let body = captures.name("body")?;
                if captures.name("prefix").is_none()
                    && !body.as_str().trim_start().starts_with("#graphql")
                {
                    return None;
                }
                fragment_at(&index, uri, host_text, body.start(), body.as_str())
            })
            .collect()
    }
}

/// Collect fragments from a pattern whose body sits in one of several named groups
fn collect_alternatives(
    pattern: &Regex,
    uri: &str,
    host_text: &str,
    groups: &[&str],
) -> Vec<SourceFragment> {
    let index = LineIndex::new(host_text);
    pattern
        .captures_iter(host_text)
        .filter_map(|captures: Captures<'_>| {
            let body = groups.iter().find_map(|group| captures.name(group))?;
            fragment_at(&index, uri, host_text, body.start(), body.as_str())
        })
        .collect()
}

fn fragment_at(
    index: &LineIndex,
    uri: &str,
    host_text: &str,
    start: usize,
    raw_body: &str,
) -> Option<SourceFragment> {
    let body = blank_placeholders(raw_body);
    if body.trim().is_empty() {
        return None;
    }
    let position = index.offset_to_position(host_text, start);
    Some(SourceFragment::new(
        body,
        uri,
        LocationOffset::new(position.line + 1, position.character + 1),
    ))
}

/// Replace `${...}` interpolations with whitespace.
///
/// Every character keeps its line and UTF-16 column: newlines inside a
/// placeholder survive and other characters become as many spaces as they
/// occupy UTF-16 code units.
#[must_use]
pub fn blank_placeholders(body: &str) -> String {
    PLACEHOLDER
        .replace_all(body, |captures: &Captures<'_>| {
            captures[0]
                .chars()
                .map(|ch| {
                    if ch == '\n' || ch == '\r' {
                        ch.to_string()
                    } else {
                        " ".repeat(ch.len_utf16())
                    }
                })
                .collect::<String>()
        })
        .into_owned()
}
