//! Repository walking and ignore filtering.
//!
//! Enumerates candidate source files under glob rules and builds the
//! Directory containment skeleton of the graph. Filtering precedence:
//! hard internal ignores, configured ignore patterns (gitignore
//! semantics, `!` re-includes), on-disk .gitignore/.ignore files, then
//! the language allow-list.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::assemble::directory_node;
use crate::config::IndexConfig;
use crate::error::{MeridianError, Result};
use crate::model::{Edge, EdgeKind, Node, NodeKind, NodeRef};
use crate::registry::Language;
use crate::symbols::parent_dir;

/// Directories that are never worth indexing.
const INTERNAL_IGNORE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    "__pycache__",
    ".venv",
    "venv",
];

/// File suffixes that are never worth indexing (databases we may be
/// writing into, most importantly).
const INTERNAL_IGNORE_SUFFIXES: &[&str] = &[".db", ".db-journal", ".db-wal", ".db-shm", ".sqlite"];

/// Compiled filter for one walk.
pub struct FileFilter {
    root: PathBuf,
    config_ignore: Option<Gitignore>,
    disk_ignore: Option<Gitignore>,
}

impl FileFilter {
    pub fn new(root: &Path, config: &IndexConfig) -> Result<Self> {
        let config_ignore = if config.ignore_patterns.is_empty() {
            None
        } else {
            let mut builder = GitignoreBuilder::new(root);
            for pattern in &config.ignore_patterns {
                builder.add_line(None, pattern).map_err(|e| {
                    MeridianError::InvalidConfig(format!(
                        "malformed ignore pattern '{pattern}': {e}"
                    ))
                })?;
            }
            Some(builder.build().map_err(|e| {
                MeridianError::InvalidConfig(format!("ignore patterns failed to compile: {e}"))
            })?)
        };

        let disk_ignore = if config.use_gitignore_files {
            let mut builder = GitignoreBuilder::new(root);
            for name in [".gitignore", ".ignore"] {
                let path = root.join(name);
                if path.exists() {
                    if let Some(err) = builder.add(&path) {
                        log::warn!("failed to load {}: {err}", path.display());
                    }
                }
            }
            builder.build().ok()
        } else {
            None
        };

        Ok(Self {
            root: root.to_path_buf(),
            config_ignore,
            disk_ignore,
        })
    }

    /// True if the file at `rel_path` should be skipped.
    pub fn should_skip(&self, rel_path: &str) -> bool {
        if self.is_internal_ignore(rel_path) {
            return true;
        }

        for matcher in [&self.config_ignore, &self.disk_ignore].into_iter().flatten() {
            // Check the file and every ancestor directory so `build/`
            // style patterns exclude whole subtrees.
            if matcher.matched(rel_path, false).is_ignore() {
                return true;
            }
            let mut current = Path::new(rel_path).parent();
            while let Some(ancestor) = current {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                if matcher.matched(ancestor, true).is_ignore() {
                    return true;
                }
                current = ancestor.parent();
            }
        }

        false
    }

    fn is_internal_ignore(&self, rel_path: &str) -> bool {
        if INTERNAL_IGNORE_SUFFIXES
            .iter()
            .any(|suffix| rel_path.ends_with(suffix))
        {
            return true;
        }
        rel_path
            .split('/')
            .any(|component| INTERNAL_IGNORE_DIRS.contains(&component))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Everything the walk phase contributes to the graph: directory nodes,
/// their CONTAINS skeleton, and the candidate files for extraction.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    pub directories: Vec<Node>,
    pub contains: Vec<Edge>,
    /// (absolute path, repo-relative path, language), sorted by relative
    /// path for deterministic downstream ordering.
    pub files: Vec<(PathBuf, String, Language)>,
}

/// Walk the repo (or an explicit subset of paths) and collect candidate
/// files plus the directory skeleton.
pub fn collect(
    repo_path: &Path,
    paths: &[PathBuf],
    config: &IndexConfig,
    filter: &FileFilter,
) -> Result<WalkOutcome> {
    let mut outcome = WalkOutcome::default();
    let mut seen_dirs: HashSet<String> = HashSet::new();
    let mut seen_files: HashSet<String> = HashSet::new();

    // Repo root node.
    outcome.directories.push(directory_node("."));
    seen_dirs.insert(".".to_string());

    let targets: Vec<PathBuf> = if paths.is_empty() {
        vec![repo_path.to_path_buf()]
    } else {
        paths
            .iter()
            .map(|p| if p.is_absolute() { p.clone() } else { repo_path.join(p) })
            .collect()
    };

    for target in targets {
        if target.is_file() {
            add_file(&target, repo_path, config, filter, &mut outcome, &mut seen_dirs, &mut seen_files);
            continue;
        }

        let mut walker = walkdir::WalkDir::new(&target).follow_links(config.follow_links);
        if config.max_depth > 0 {
            walker = walker.max_depth(config.max_depth);
        }
        if !config.recursive {
            walker = walker.max_depth(1);
        }

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    if config.continue_on_error {
                        log::warn!("walk error, continuing: {err}");
                        continue;
                    }
                    return Err(MeridianError::io(
                        err.path().map(Path::to_path_buf).unwrap_or_default(),
                        err.into(),
                    ));
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            add_file(entry.path(), repo_path, config, filter, &mut outcome, &mut seen_dirs, &mut seen_files);
        }
    }

    outcome.files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(outcome)
}

fn add_file(
    path: &Path,
    repo_path: &Path,
    config: &IndexConfig,
    filter: &FileFilter,
    outcome: &mut WalkOutcome,
    seen_dirs: &mut HashSet<String>,
    seen_files: &mut HashSet<String>,
) {
    let rel_path = match path.strip_prefix(repo_path) {
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => {
            log::debug!("skipping {} outside repo root", path.display());
            return;
        }
    };
    if rel_path.is_empty() || !seen_files.insert(rel_path.clone()) {
        return;
    }

    if filter.should_skip(&rel_path) {
        log::debug!("skipping {rel_path}: ignored");
        return;
    }

    let language = Language::from_path(path);
    if language == Language::Text {
        log::debug!("skipping {rel_path}: unsupported language");
        return;
    }
    if !config.language_enabled(language) {
        log::debug!("skipping {rel_path}: language {language} not enabled");
        return;
    }

    // Directory chain from the repo root down to the file's parent.
    let dir = parent_dir(&rel_path);
    ensure_dir_chain(&dir, outcome, seen_dirs);
    outcome.contains.push(Edge::new(
        EdgeKind::Contains,
        NodeRef::new(NodeKind::Directory, dir),
        NodeRef::new(NodeKind::File, rel_path.clone()),
    ));

    outcome.files.push((path.to_path_buf(), rel_path, language));
}

/// Create Directory nodes and CONTAINS edges for every ancestor of `dir`.
fn ensure_dir_chain(dir: &str, outcome: &mut WalkOutcome, seen_dirs: &mut HashSet<String>) {
    if dir == "." || seen_dirs.contains(dir) {
        return;
    }

    let parent = match dir.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => ".".to_string(),
    };
    ensure_dir_chain(&parent, outcome, seen_dirs);

    seen_dirs.insert(dir.to_string());
    outcome.directories.push(directory_node(dir));
    outcome.contains.push(Edge::new(
        EdgeKind::Contains,
        NodeRef::new(NodeKind::Directory, parent),
        NodeRef::new(NodeKind::Directory, dir),
    ));
}
