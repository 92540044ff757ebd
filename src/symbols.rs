//! Two-tier symbol table.
//!
//! File-local indices map short names and import aliases to definitions;
//! the repo-global index maps short names, paths and directories across
//! the whole extraction set. The table is built once after all files are
//! extracted and is read-only during resolution.

use std::collections::HashMap;

use crate::extract::FileExtraction;
use crate::model::{NodeKind, NodeRef};

/// What an import alias binds to locally.
#[derive(Debug, Clone)]
pub enum ImportTarget {
    /// A concrete node: a File, Directory, or an imported definition.
    Node(NodeRef),
    /// An external symbol that could not be bound.
    Unparsed(String),
}

impl ImportTarget {
    pub fn node_ref(&self) -> NodeRef {
        match self {
            ImportTarget::Node(r) => r.clone(),
            ImportTarget::Unparsed(name) => NodeRef::new(NodeKind::Unparsed, name.clone()),
        }
    }
}

/// Per-file index: local definitions by short name, plus import aliases.
#[derive(Debug, Default)]
pub struct FileIndex {
    /// `Name` and `Owner.Name` forms of every definition in the file.
    pub defs: HashMap<String, NodeRef>,
    /// Local binding introduced by an import -> what it means.
    pub aliases: HashMap<String, ImportTarget>,
}

/// Repo-global index built after the extraction barrier.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Relative file path -> file-local index.
    pub files: HashMap<String, FileIndex>,
    /// Relative paths of all File nodes.
    pub file_nodes: HashMap<String, NodeRef>,
    /// Relative paths of all Directory nodes.
    pub dir_nodes: HashMap<String, NodeRef>,
    /// Full definition key -> reference.
    pub by_key: HashMap<String, NodeRef>,
    /// Simple short name -> all definitions carrying it.
    pub global: HashMap<String, Vec<NodeRef>>,
    /// Directory -> top-level type/function names defined by its files
    /// (Go same-package lookup).
    pub package_defs: HashMap<String, HashMap<String, NodeRef>>,
}

impl SymbolTable {
    /// Build the table from the walk's directory set and all extractions.
    pub fn build(dirs: &[NodeRef], extractions: &[FileExtraction]) -> Self {
        let mut table = SymbolTable::default();

        for dir in dirs {
            table.dir_nodes.insert(dir.name.clone(), dir.clone());
        }

        for extraction in extractions {
            let file_ref = extraction.file_node.node_ref();
            table
                .file_nodes
                .insert(extraction.rel_path.clone(), file_ref);

            let dir = parent_dir(&extraction.rel_path);
            let index = table.files.entry(extraction.rel_path.clone()).or_default();

            for def in &extraction.definitions {
                let def_ref = NodeRef::new(def.kind, def.name.clone());

                // Local index: `Owner.Name` and the bare `Name` suffix.
                // First definition wins a contested short name.
                let local = def.local_name().to_string();
                index.defs.entry(local.clone()).or_insert_with(|| def_ref.clone());
                if let Some((_, simple)) = local.rsplit_once('.') {
                    index
                        .defs
                        .entry(simple.to_string())
                        .or_insert_with(|| def_ref.clone());
                }

                table.by_key.insert(def.name.clone(), def_ref.clone());

                let simple = local.rsplit('.').next().unwrap_or(&local).to_string();
                table.global.entry(simple).or_default().push(def_ref.clone());

                // Top-level definitions are addressable package-wide.
                if def.owner.is_none() {
                    table
                        .package_defs
                        .entry(dir.clone())
                        .or_default()
                        .entry(local)
                        .or_insert(def_ref);
                }
            }
        }

        table
    }

    /// Look up a definition by full key.
    pub fn node_by_key(&self, key: &str) -> Option<&NodeRef> {
        self.by_key.get(key)
    }

    /// Unique repo-global match for a simple short name, if any.
    pub fn global_unique(&self, name: &str) -> Option<&NodeRef> {
        match self.global.get(name) {
            Some(refs) if refs.len() == 1 => refs.first(),
            _ => None,
        }
    }

    /// The file-local index for a file, if it was extracted.
    pub fn file_index(&self, rel_path: &str) -> Option<&FileIndex> {
        self.files.get(rel_path)
    }

    /// A mutable alias table for a file; used by the import-resolution
    /// pass, which runs before references are resolved.
    pub fn aliases_mut(&mut self, rel_path: &str) -> &mut HashMap<String, ImportTarget> {
        &mut self.files.entry(rel_path.to_string()).or_default().aliases
    }

    /// A top-level definition from the package (directory) of `rel_path`.
    pub fn package_def(&self, rel_path: &str, name: &str) -> Option<&NodeRef> {
        self.package_defs.get(&parent_dir(rel_path))?.get(name)
    }
}

/// Parent directory key of a relative path; files at the repo root live
/// in the root directory `"."`.
pub fn parent_dir(rel_path: &str) -> String {
    match rel_path.rsplit_once('/') {
        Some((dir, _)) if !dir.is_empty() => dir.to_string(),
        _ => ".".to_string(),
    }
}
