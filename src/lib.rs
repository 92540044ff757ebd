//! Meridian: a repository indexer that maps source code into a typed,
//! queryable property graph.
//!
//! Meridian walks a repository, extracts definitions and references with
//! declarative tree-sitter queries, resolves names across files and
//! languages, and persists the resulting nodes and edges to an embedded
//! sqlitegraph database.
//!
//! # Position conventions
//!
//! All line positions are 1-based closed intervals; byte offsets are
//! 0-indexed from file start.
//!
//! # Pipeline
//!
//! `walk -> { parse, extract } per file -> resolve -> assemble -> upsert`
//!
//! Extraction runs on a bounded worker pool; resolution starts only after
//! every definition has been published to the repo-wide symbol table, and
//! everything after that barrier is single-threaded.
//!
//! # Node and edge model
//!
//! Nodes: Directory, File, Class, Interface, Function, Variable,
//! OtherType, and Unparsed (the bucket for symbols that could not be
//! bound to a definition). Edges: CONTAINS, IMPORTS, INHERITS,
//! REFERENCES, each constrained to a fixed set of endpoint-kind pairs
//! enforced at assembly time.

pub mod assemble;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod symbols;
pub mod walk;

pub use config::IndexConfig;
pub use error::{MeridianError, Result};
pub use extract::{Definition, FileExtraction, RawReference, ReferenceRole};
pub use model::{Edge, EdgeKind, Node, NodeKind, NodeRef};
pub use pipeline::{
    CancellationToken, CodeGraph, IndexStats, ParseOutcome, Parser, TypeSnippet,
};
pub use registry::Language;
pub use store::GraphStore;
pub use symbols::SymbolTable;
