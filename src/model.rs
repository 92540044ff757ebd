//! Graph schema model.
//!
//! Node and edge catalogue for the code graph, including the endpoint-kind
//! table the assembler enforces. Node keys are repo-relative paths for
//! filesystem entities and `<file>#<dotted owner chain>` for code entities;
//! the repo root directory is named `"."`.

use serde::{Deserialize, Serialize};

use crate::registry::Language;

/// Kind tag for every node in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Unparsed,
    Directory,
    File,
    Class,
    Interface,
    Function,
    Variable,
    /// Enums, type aliases and other named types that are neither classes
    /// nor interfaces.
    OtherType,
}

impl NodeKind {
    /// Stable string tag, used as the store-level node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Unparsed => "Unparsed",
            NodeKind::Directory => "Directory",
            NodeKind::File => "File",
            NodeKind::Class => "Class",
            NodeKind::Interface => "Interface",
            NodeKind::Function => "Function",
            NodeKind::Variable => "Variable",
            NodeKind::OtherType => "OtherType",
        }
    }

    /// Parse a stored kind tag (the inverse of [`NodeKind::as_str`]).
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "Unparsed" => Some(NodeKind::Unparsed),
            "Directory" => Some(NodeKind::Directory),
            "File" => Some(NodeKind::File),
            "Class" => Some(NodeKind::Class),
            "Interface" => Some(NodeKind::Interface),
            "Function" => Some(NodeKind::Function),
            "Variable" => Some(NodeKind::Variable),
            "OtherType" => Some(NodeKind::OtherType),
            _ => None,
        }
    }

    /// True for the kinds that may originate a REFERENCES edge.
    pub fn can_reference(&self) -> bool {
        matches!(
            self,
            NodeKind::Class | NodeKind::Interface | NodeKind::Function | NodeKind::Variable
        )
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind tag for every edge in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Contains,
    Imports,
    Inherits,
    References,
}

impl EdgeKind {
    /// Stable uppercase tag, used as the store-level edge type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Contains => "CONTAINS",
            EdgeKind::Imports => "IMPORTS",
            EdgeKind::Inherits => "INHERITS",
            EdgeKind::References => "REFERENCES",
        }
    }

    /// Parse a stored edge tag.
    pub fn parse_tag(tag: &str) -> Option<Self> {
        match tag {
            "CONTAINS" => Some(EdgeKind::Contains),
            "IMPORTS" => Some(EdgeKind::Imports),
            "INHERITS" => Some(EdgeKind::Inherits),
            "REFERENCES" => Some(EdgeKind::References),
            _ => None,
        }
    }

    /// The schema's endpoint-kind table.
    ///
    /// Every edge handed to the store must satisfy this; the assembler
    /// coerces the target to Unparsed when only the target kind is at
    /// fault and drops the edge otherwise.
    pub fn allows(&self, from: NodeKind, to: NodeKind) -> bool {
        use NodeKind::*;
        match self {
            EdgeKind::Contains => matches!(
                (from, to),
                (Directory, Directory)
                    | (Directory, File)
                    | (File, Class)
                    | (File, Interface)
                    | (File, Function)
                    | (File, Variable)
                    | (File, OtherType)
                    | (Class, Function)
                    | (Interface, Function)
            ),
            EdgeKind::Imports => {
                from == File
                    && matches!(
                        to,
                        File | Directory | Class | Interface | Function | Variable | OtherType
                            | Unparsed
                    )
            }
            EdgeKind::Inherits => from == Class && matches!(to, Class | Unparsed),
            EdgeKind::References => {
                from.can_reference()
                    && matches!(
                        to,
                        Class | Interface | Function | Variable | OtherType | Unparsed
                    )
            }
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph node.
///
/// `name` is the node key: unique within a kind, and the `(kind, name)`
/// pair is globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub language: Language,
    /// Start line, 1-based. Zero for nodes without a span.
    pub start_line: usize,
    /// End line, 1-based closed interval.
    pub end_line: usize,
    /// Source text of the entity. Empty for directories and Unparsed nodes.
    pub code: String,
    /// Source text with descendant function bodies elided.
    pub skeleton_code: String,
    /// SHA-256 of the file contents; File nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Node {
    /// A bare node carrying only identity, used for Unparsed targets and
    /// store round-trips.
    pub fn from_kind_and_name(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            language: Language::Text,
            start_line: 0,
            end_line: 0,
            code: String::new(),
            skeleton_code: String::new(),
            hash: None,
        }
    }

    /// Lightweight reference to this node.
    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// The suffix chain by which this entity may be addressed during
    /// resolution.
    ///
    /// `main.go#User.SetAddress` yields `["SetAddress", "User.SetAddress"]`,
    /// a file `src/a.py` yields `["a.py", "a"]`, a directory its final
    /// path component. A lowercase variant is appended whenever it differs.
    pub fn short_names(&self) -> Vec<String> {
        fn with_lowercase(names: Vec<String>) -> Vec<String> {
            let mut out = Vec::new();
            for name in names {
                let lower = name.to_lowercase();
                out.push(name.clone());
                if lower != name && !out.contains(&lower) {
                    out.push(lower);
                }
            }
            out
        }

        match self.name.split_once('#') {
            None => {
                // Filesystem entity: last path component, plus the stem for
                // files ("a.py" is addressable as both "a.py" and "a").
                let file_name = self.name.rsplit('/').next().unwrap_or(&self.name);
                let mut names = vec![file_name.to_string()];
                if self.kind == NodeKind::File {
                    if let Some((stem, _ext)) = file_name.rsplit_once('.') {
                        if !stem.is_empty() {
                            names.push(stem.to_string());
                        }
                    }
                }
                with_lowercase(names)
            }
            Some((_file, attr)) => {
                // Code entity: every dotted suffix of the owner chain.
                let segments: Vec<&str> = attr.split('.').collect();
                let mut names = Vec::new();
                for start in (0..segments.len()).rev() {
                    names.push(segments[start..].join("."));
                }
                with_lowercase(names)
            }
        }
    }
}

/// `(kind, name)` endpoint of an edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub name: String,
}

impl NodeRef {
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// A graph edge with tagged endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub from: NodeRef,
    pub to: NodeRef,
    /// IMPORTS only: the original imported symbol or module.
    pub import: Option<String>,
    /// IMPORTS only: the local binding the import introduced.
    pub alias: Option<String>,
}

impl Edge {
    pub fn new(kind: EdgeKind, from: NodeRef, to: NodeRef) -> Self {
        Self {
            kind,
            from,
            to,
            import: None,
            alias: None,
        }
    }

    /// Dedup key: `(kind, from, to, import, alias)`.
    pub fn dedup_key(&self) -> (EdgeKind, String, String, String, String) {
        (
            self.kind,
            self.from.name.clone(),
            self.to.name.clone(),
            self.import.clone().unwrap_or_default(),
            self.alias.clone().unwrap_or_default(),
        )
    }
}
