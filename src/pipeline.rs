//! Indexing pipeline.
//!
//! walk -> parallel { read, parse, extract } -> barrier -> resolve ->
//! assemble -> bulk upsert. Extraction runs on the rayon pool; everything
//! after the barrier is single-threaded so store writes stay ordered.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::assemble::{Assembler, GraphBatches};
use crate::config::IndexConfig;
use crate::error::Result;
use crate::extract::{extract_file, FileExtraction};
use crate::model::{Edge, EdgeKind, Node, NodeKind, NodeRef};
use crate::resolve::{resolve_repo, RepoContext};
use crate::store::GraphStore;
use crate::symbols::SymbolTable;
use crate::walk::{self, FileFilter};

/// Cooperative cancellation flag, checked at file boundaries and before
/// the bulk upsert.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary of one indexing run.
#[derive(Debug, Clone, Default)]
pub struct IndexStats {
    /// Files extracted.
    pub files: usize,
    /// Nodes handed to the store (or assembled, for one-shot parses).
    pub nodes: usize,
    /// Edges handed to the store.
    pub edges: usize,
    /// True when the run stopped early on a cancellation token; nothing
    /// was written in that case.
    pub cancelled: bool,
}

/// Result of a one-shot extraction without persistence.
#[derive(Debug)]
pub struct ParseOutcome {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// A resolved parameter-type snippet returned by
/// [`CodeGraph::func_param_types`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSnippet {
    pub path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub content: String,
}

/// Run the full pipeline up to (but excluding) persistence.
fn run_pipeline(
    repo_path: &Path,
    config: &IndexConfig,
    paths: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<(GraphBatches, usize, bool)> {
    let filter = FileFilter::new(repo_path, config)?;
    let walk = walk::collect(repo_path, paths, config, &filter)?;

    // Parallel read + parse + extract. Per-file failures are recovered:
    // unreadable files are dropped (their File node is omitted), parse
    // failures keep a bare File node.
    let extractions: Vec<FileExtraction> = walk
        .files
        .par_iter()
        .filter_map(|(abs_path, rel_path, language)| {
            if cancel.is_cancelled() {
                return None;
            }
            let source = match std::fs::read(abs_path) {
                Ok(source) => source,
                Err(e) => {
                    log::warn!("failed to read {rel_path}: {e}");
                    return None;
                }
            };
            match extract_file(rel_path, &source, *language, config) {
                Ok(extraction) => Some(extraction),
                Err(e) => {
                    log::warn!("extraction failed for {rel_path}: {e}");
                    None
                }
            }
        })
        .collect();

    let file_count = extractions.len();
    if cancel.is_cancelled() {
        return Ok((GraphBatches::default(), file_count, true));
    }

    // Barrier: all definitions are published before any reference is
    // resolved.
    let dir_refs: Vec<NodeRef> = walk.directories.iter().map(Node::node_ref).collect();
    let mut table = SymbolTable::build(&dir_refs, &extractions);
    let ctx = RepoContext::for_repo(repo_path);
    let resolved = resolve_repo(&mut table, &extractions, &ctx);

    let mut assembler = Assembler::new();
    for dir in walk.directories {
        assembler.add_node(dir);
    }
    for extraction in &extractions {
        assembler.add_node(extraction.file_node.clone());
        for def in &extraction.definitions {
            assembler.add_node(definition_node(extraction, def));

            // Containment: a method hangs off its owner, everything else
            // off the file.
            let from = def
                .owner
                .as_ref()
                .and_then(|owner| {
                    extraction
                        .definitions
                        .iter()
                        .find(|d| &d.name == owner)
                        .map(|d| NodeRef::new(d.kind, d.name.clone()))
                })
                .unwrap_or_else(|| extraction.file_node.node_ref());
            assembler.add_edge(Edge::new(
                EdgeKind::Contains,
                from,
                NodeRef::new(def.kind, def.name.clone()),
            ));
        }
    }
    for edge in walk.contains {
        assembler.add_edge(edge);
    }
    for edge in resolved {
        assembler.add_edge(edge);
    }

    Ok((assembler.into_batches(), file_count, false))
}

fn definition_node(extraction: &FileExtraction, def: &crate::extract::Definition) -> Node {
    Node {
        name: def.name.clone(),
        kind: def.kind,
        language: extraction.language,
        start_line: def.start_line,
        end_line: def.end_line,
        code: def.code.clone(),
        skeleton_code: def.skeleton_code.clone(),
        hash: None,
    }
}

/// One-shot extraction: parse a repository (or a single file) and return
/// the nodes and relationships without touching any database.
pub struct Parser {
    repo_path: PathBuf,
    config: IndexConfig,
}

impl Parser {
    pub fn new(repo_path: impl Into<PathBuf>, config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            repo_path: repo_path.into(),
            config,
        })
    }

    /// Parse `path` (a directory or a single file). The path must live
    /// under the parser's repository root.
    pub fn parse(&mut self, path: &Path) -> Result<ParseOutcome> {
        let paths = if path == self.repo_path {
            Vec::new()
        } else {
            vec![path.to_path_buf()]
        };
        let cancel = CancellationToken::new();
        let (batches, _files, _cancelled) =
            run_pipeline(&self.repo_path, &self.config, &paths, &cancel)?;

        Ok(ParseOutcome {
            nodes: batches.nodes().cloned().collect(),
            edges: batches.edges,
        })
    }
}

/// Persistent pipeline: indexes a repository into an embedded graph
/// database and answers structural queries over it.
pub struct CodeGraph {
    store: GraphStore,
    repo_path: PathBuf,
    config: IndexConfig,
    cancel: CancellationToken,
}

impl CodeGraph {
    pub fn new(
        db_dir: impl Into<PathBuf>,
        repo_dir: impl Into<PathBuf>,
        config: IndexConfig,
    ) -> Result<Self> {
        config.validate()?;
        let db_dir: PathBuf = db_dir.into();
        let store = GraphStore::open(&db_dir)?;
        Ok(Self {
            store,
            repo_path: repo_dir.into(),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Token for cancelling a running index from another thread.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Index the repository (or a subset of `paths`) into the store.
    ///
    /// A full (non-incremental) run wipes the store first, so repeated
    /// runs over the same tree produce identical graphs. An incremental
    /// run only replaces facts derived from the files it re-extracts.
    pub fn index(&mut self, paths: &[PathBuf], incremental: bool) -> Result<IndexStats> {
        let (batches, files, cancelled) =
            run_pipeline(&self.repo_path, &self.config, paths, &self.cancel)?;
        if cancelled || self.cancel.is_cancelled() {
            return Ok(IndexStats {
                files,
                cancelled: true,
                ..IndexStats::default()
            });
        }

        if incremental {
            for file in &batches.files {
                self.store.delete_file_facts(&file.name)?;
            }
        } else {
            self.store.wipe()?;
        }

        self.store.bulk_upsert_nodes(&batches.directories)?;
        self.store.bulk_upsert_nodes(&batches.files)?;
        self.store.bulk_upsert_nodes(&batches.definitions)?;
        self.store.bulk_upsert_nodes(&batches.unparsed)?;
        self.store.bulk_upsert_edges(&batches.edges)?;

        let stats = IndexStats {
            files,
            nodes: batches.node_count(),
            edges: batches.edges.len(),
            cancelled: false,
        };
        log::info!(
            "indexed {} files: {} nodes, {} edges",
            stats.files,
            stats.nodes,
            stats.edges
        );
        Ok(stats)
    }

    /// Total number of nodes in the store.
    pub fn count_nodes(&self) -> Result<usize> {
        self.store.count_nodes()
    }

    /// Total number of edges in the store.
    pub fn count_edges(&self) -> Result<usize> {
        self.store.count_edges()
    }

    /// Look up a node by its key, trying every kind.
    pub fn node_by_name(&self, name: &str) -> Result<Option<Node>> {
        self.store.node_by_name(name)
    }

    /// All nodes of one kind, sorted by name.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<Node>> {
        self.store.nodes_by_kind(kind)
    }

    /// Outgoing neighbors of a node over one edge kind.
    pub fn neighbors_out(
        &self,
        kind: NodeKind,
        name: &str,
        edge_kind: EdgeKind,
    ) -> Result<Vec<Node>> {
        self.store.neighbors_out(kind, name, edge_kind)
    }

    /// Resolve the parameter types of the function covering `line` in
    /// `file`: returns the source snippets of each parameter type's
    /// definition.
    ///
    /// `file` is the repo-relative path used as the File node key.
    pub fn func_param_types(&self, file: &str, line: usize) -> Result<Vec<TypeSnippet>> {
        let prefix = format!("{file}#");
        let functions = self.store.nodes_by_kind(NodeKind::Function)?;

        // Innermost function whose span covers the line.
        let func = functions
            .iter()
            .filter(|f| f.name.starts_with(&prefix))
            .filter(|f| f.start_line <= line && line <= f.end_line)
            .min_by_key(|f| f.end_line - f.start_line);
        let func = match func {
            Some(f) => f,
            None => return Ok(Vec::new()),
        };

        let targets = self
            .store
            .neighbors_out(NodeKind::Function, &func.name, EdgeKind::References)?;

        Ok(targets
            .into_iter()
            .filter(|t| {
                matches!(
                    t.kind,
                    NodeKind::Class | NodeKind::Interface | NodeKind::OtherType
                )
            })
            .map(|t| TypeSnippet {
                path: t
                    .name
                    .split_once('#')
                    .map(|(file, _)| file.to_string())
                    .unwrap_or_else(|| t.name.clone()),
                start_line: t.start_line,
                end_line: t.end_line,
                content: t.code,
            })
            .collect())
    }

    /// Drop the graph contents and optionally the database directory.
    pub fn clean(&mut self, delete_dir: bool) -> Result<()> {
        self.store.clean(delete_dir)
    }
}
