use std::fmt;
use std::path::Path;

/// Host languages GraphQL can be extracted from.
///
/// Identifiers follow the editor's language ids (`typescriptreact`, `python`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageId {
    /// Raw GraphQL files (.graphql, .gql, .graphqls)
    GraphQL,
    JavaScript,
    JavaScriptReact,
    TypeScript,
    TypeScriptReact,
    /// Vue single file components
    Vue,
    /// Svelte components
    Svelte,
    Python,
    Ruby,
    Dart,
    Elixir,
    /// Reason, using `[%graphql {| ... |}]` extension nodes
    Reason,
}

impl LanguageId {
    /// Look up an editor language id
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "graphql" => Some(Self::GraphQL),
            "javascript" => Some(Self::JavaScript),
            "javascriptreact" => Some(Self::JavaScriptReact),
            "typescript" => Some(Self::TypeScript),
            "typescriptreact" => Some(Self::TypeScriptReact),
            "vue" => Some(Self::Vue),
            "svelte" => Some(Self::Svelte),
            "python" => Some(Self::Python),
            "ruby" => Some(Self::Ruby),
            "dart" => Some(Self::Dart),
            "elixir" => Some(Self::Elixir),
            "reason" => Some(Self::Reason),
            _ => None,
        }
    }

    /// Detect language from file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?;

        match extension {
            "graphql" | "gql" | "graphqls" => Some(Self::GraphQL),
            "js" | "mjs" | "cjs" => Some(Self::JavaScript),
            "jsx" => Some(Self::JavaScriptReact),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::TypeScriptReact),
            "vue" => Some(Self::Vue),
            "svelte" => Some(Self::Svelte),
            "py" => Some(Self::Python),
            "rb" => Some(Self::Ruby),
            "dart" => Some(Self::Dart),
            "ex" | "exs" => Some(Self::Elixir),
            "re" => Some(Self::Reason),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GraphQL => "graphql",
            Self::JavaScript => "javascript",
            Self::JavaScriptReact => "javascriptreact",
            Self::TypeScript => "typescript",
            Self::TypeScriptReact => "typescriptreact",
            Self::Vue => "vue",
            Self::Svelte => "svelte",
            Self::Python => "python",
            Self::Ruby => "ruby",
            Self::Dart => "dart",
            Self::Elixir => "elixir",
            Self::Reason => "reason",
        }
    }

    /// Languages scanned with the template literal strategy
    #[must_use]
    pub const fn is_js_family(self) -> bool {
        matches!(
            self,
            Self::JavaScript
                | Self::JavaScriptReact
                | Self::TypeScript
                | Self::TypeScriptReact
                | Self::Vue
                | Self::Svelte
        )
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
