//! Indexing configuration.
//!
//! Builder-style options validated eagerly: a malformed ignore pattern or
//! unknown tag fails construction before any filesystem access.

use std::time::Duration;

use crate::error::{MeridianError, Result};
use crate::registry::Language;

/// Configuration options for the indexing pipeline.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// Whether to recursively traverse subdirectories (default is true).
    pub recursive: bool,
    /// Whether to follow symbolic links (default is false).
    pub follow_links: bool,
    /// Maximum recursion depth, 0 means no limit (default is 0).
    pub max_depth: usize,
    /// Whether to continue traversal when encountering errors (default is true).
    pub continue_on_error: bool,
    /// Ignore patterns following gitignore syntax (default is empty).
    /// A pattern starting with '!' re-includes a previously excluded path.
    pub ignore_patterns: Vec<String>,
    /// Whether to honour .gitignore files found in the repository (default is true).
    pub use_gitignore_files: bool,
    /// Optional allow-list of languages to process (default: all supported).
    pub languages: Option<Vec<Language>>,
    /// Log level for the process-wide logger.
    pub log_level: log::LevelFilter,
    /// Soft per-file parse timeout (default 10 s). Timed-out files are
    /// recorded as Files with no structural children.
    pub parse_timeout: Duration,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_links: false,
            max_depth: 0,
            continue_on_error: true,
            ignore_patterns: Vec::new(),
            use_gitignore_files: true,
            languages: None,
            log_level: log::LevelFilter::Warn,
            parse_timeout: Duration::from_secs(10),
        }
    }
}

impl IndexConfig {
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn ignore_patterns(mut self, ignore_patterns: Vec<String>) -> Self {
        self.ignore_patterns = ignore_patterns;
        self
    }

    pub fn use_gitignore_files(mut self, use_gitignore_files: bool) -> Self {
        self.use_gitignore_files = use_gitignore_files;
        self
    }

    pub fn languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = Some(languages);
        self
    }

    pub fn parse_timeout(mut self, timeout: Duration) -> Self {
        self.parse_timeout = timeout;
        self
    }

    /// Set the log level from its lowercase name.
    ///
    /// Accepted: `error`, `warn`, `info`, `debug`, `trace`.
    pub fn log_level(mut self, level: &str) -> Result<Self> {
        self.log_level = parse_log_level(level)?;
        Ok(self)
    }

    /// Set the language allow-list from lowercase tags.
    pub fn language_tags(mut self, tags: &[String]) -> Result<Self> {
        let mut languages = Vec::new();
        for tag in tags {
            match Language::parse_tag(tag) {
                Some(lang) => languages.push(lang),
                None => {
                    return Err(MeridianError::InvalidConfig(format!(
                        "unknown language tag: {tag}"
                    )))
                }
            }
        }
        self.languages = Some(languages);
        Ok(self)
    }

    /// Validate the configuration without touching the filesystem.
    ///
    /// Compiles every ignore pattern so malformed globs are rejected up
    /// front rather than mid-scan.
    pub fn validate(&self) -> Result<()> {
        let mut builder = ignore::gitignore::GitignoreBuilder::new("");
        for pattern in &self.ignore_patterns {
            builder.add_line(None, pattern).map_err(|e| {
                MeridianError::InvalidConfig(format!("malformed ignore pattern '{pattern}': {e}"))
            })?;
        }
        builder.build().map_err(|e| {
            MeridianError::InvalidConfig(format!("ignore patterns failed to compile: {e}"))
        })?;
        Ok(())
    }

    /// True if `language` passes the allow-list.
    pub fn language_enabled(&self, language: Language) -> bool {
        match &self.languages {
            None => true,
            Some(list) => list.contains(&language),
        }
    }
}

/// Parse a log-level name into a `log::LevelFilter`.
pub fn parse_log_level(level: &str) -> Result<log::LevelFilter> {
    match level {
        "error" => Ok(log::LevelFilter::Error),
        "warn" => Ok(log::LevelFilter::Warn),
        "info" => Ok(log::LevelFilter::Info),
        "debug" => Ok(log::LevelFilter::Debug),
        "trace" => Ok(log::LevelFilter::Trace),
        other => Err(MeridianError::InvalidConfig(format!(
            "unknown log level: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert!(config.recursive);
        assert!(!config.follow_links);
        assert!(config.ignore_patterns.is_empty());
        assert!(config.language_enabled(Language::Python));
        config.validate().unwrap();
    }

    #[test]
    fn test_language_allow_list() {
        let config = IndexConfig::default().languages(vec![Language::Go]);
        assert!(config.language_enabled(Language::Go));
        assert!(!config.language_enabled(Language::Python));
    }

    #[test]
    fn test_unknown_language_tag_rejected() {
        let err = IndexConfig::default()
            .language_tags(&["go".to_string(), "fortran".to_string()])
            .unwrap_err();
        assert!(matches!(err, MeridianError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let err = IndexConfig::default().log_level("verbose").unwrap_err();
        assert!(matches!(err, MeridianError::InvalidConfig(_)));
    }

    #[test]
    fn test_malformed_ignore_pattern_rejected() {
        let config =
            IndexConfig::default().ignore_patterns(vec!["src/**".to_string(), "a[".to_string()]);
        assert!(matches!(
            config.validate(),
            Err(MeridianError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_negation_pattern_accepted() {
        let config =
            IndexConfig::default().ignore_patterns(vec!["*".to_string(), "!d.py".to_string()]);
        config.validate().unwrap();
    }
}
