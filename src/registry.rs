//! Language registry.
//!
//! Each supported language bundles a grammar handle, a definitions query,
//! a references query, and a file-extension set. Dispatch is by extension
//! with a fallback of "skip" (`Language::Text`). Adding a language means
//! registering a new bundle here and a resolver in `resolve`; the core
//! pipeline never changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Languages the extractor understands.
///
/// `Text` is the skip bucket: files with unrecognised extensions become
/// bare File nodes with no structural children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    Text,
    Python,
    Go,
    TypeScript,
    JavaScript,
}

impl Language {
    /// Detect the language of a file from its extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str());

        match ext {
            Some("py") => Language::Python,
            Some("go") => Language::Go,
            Some("ts") => Language::TypeScript,
            Some("js") => Language::JavaScript,
            _ => Language::Text,
        }
    }

    /// Stable lowercase tag used in config, CLI arguments and node payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Text => "text",
            Language::Python => "python",
            Language::Go => "go",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
        }
    }

    /// Parse a language tag (the inverse of [`Language::as_str`]).
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "text" => Some(Language::Text),
            "python" => Some(Language::Python),
            "go" => Some(Language::Go),
            "typescript" => Some(Language::TypeScript),
            "javascript" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// The tree-sitter grammar for this language, if it has one.
    pub fn grammar(&self) -> Option<tree_sitter::Language> {
        match self {
            Language::Text => None,
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
        }
    }

    /// The tree-sitter definitions query source for this language.
    ///
    /// Pattern order inside each file is part of its contract: the
    /// extractor maps `pattern_index` back to a [`QueryPattern`].
    pub fn definitions_query(&self) -> Option<&'static str> {
        match self {
            Language::Text => None,
            Language::Python => Some(PYTHON_DEFINITIONS_QUERY_SOURCE),
            Language::Go => Some(GO_DEFINITIONS_QUERY_SOURCE),
            Language::TypeScript => Some(TYPESCRIPT_DEFINITIONS_QUERY_SOURCE),
            Language::JavaScript => Some(JAVASCRIPT_DEFINITIONS_QUERY_SOURCE),
        }
    }

    /// The tree-sitter references query source for this language.
    pub fn references_query(&self) -> Option<&'static str> {
        match self {
            Language::Text => None,
            Language::Python => Some(PYTHON_REFERENCES_QUERY_SOURCE),
            Language::Go => Some(GO_REFERENCES_QUERY_SOURCE),
            Language::TypeScript => Some(TYPESCRIPT_REFERENCES_QUERY_SOURCE),
            Language::JavaScript => Some(JAVASCRIPT_REFERENCES_QUERY_SOURCE),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tree-sitter definition query sources, one file per language.
pub const PYTHON_DEFINITIONS_QUERY_SOURCE: &str =
    include_str!("queries/python-definitions.scm");
pub const GO_DEFINITIONS_QUERY_SOURCE: &str = include_str!("queries/go-definitions.scm");
pub const TYPESCRIPT_DEFINITIONS_QUERY_SOURCE: &str =
    include_str!("queries/typescript-definitions.scm");
pub const JAVASCRIPT_DEFINITIONS_QUERY_SOURCE: &str =
    include_str!("queries/javascript-definitions.scm");

/// The tree-sitter reference query sources.
pub const PYTHON_REFERENCES_QUERY_SOURCE: &str =
    include_str!("queries/python-references.scm");
pub const GO_REFERENCES_QUERY_SOURCE: &str = include_str!("queries/go-references.scm");
pub const TYPESCRIPT_REFERENCES_QUERY_SOURCE: &str =
    include_str!("queries/typescript-references.scm");
pub const JAVASCRIPT_REFERENCES_QUERY_SOURCE: &str =
    include_str!("queries/javascript-references.scm");
