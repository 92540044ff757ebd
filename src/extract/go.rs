//! Go definition extraction.
//!
//! Structs become Class nodes, interfaces Interface nodes, functions and
//! methods Function nodes. Methods attach to their receiver's struct, and
//! a file-level function whose first return type names a struct defined
//! earlier in the same file is treated as that struct's constructor.
//! Embedded struct fields are recorded as pending INHERITS clauses.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tree_sitter::StreamingIterator;

use crate::model::NodeKind;

use super::{
    elide_spans, node_lines, node_text, split_name_path, Definition, FileExtraction,
    PendingImport, PendingInherit, RawReference, ReferenceRole,
};

/// Tree-sitter query patterns, in the order they appear in
/// `go-definitions.scm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPattern {
    Import,
    Interface,
    Class,
    Function,
    Method,
}

impl QueryPattern {
    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(QueryPattern::Import),
            1 => Some(QueryPattern::Interface),
            2 => Some(QueryPattern::Class),
            3 => Some(QueryPattern::Function),
            4 => Some(QueryPattern::Method),
            _ => None,
        }
    }
}

pub(super) fn extract(
    out: &mut FileExtraction,
    tree: &tree_sitter::Tree,
    source: &[u8],
) -> Result<()> {
    let grammar = tree_sitter_go::LANGUAGE.into();
    let query = tree_sitter::Query::new(&grammar, crate::registry::GO_DEFINITIONS_QUERY_SOURCE)
        .context("go definitions query failed to compile")?;

    // One match is emitted per optional capture combination, so the same
    // function shows up once per parameter. Dedup by (local key, span).
    let mut seen: HashMap<(String, usize), String> = HashMap::new();
    let mut seen_refs: HashSet<(String, Vec<String>)> = HashSet::new();
    let mut seen_imports: HashSet<String> = HashSet::new();

    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    while let Some(mat) = matches.next() {
        let pattern = match QueryPattern::from_index(mat.pattern_index) {
            Some(p) => p,
            None => continue,
        };

        let mut caps: HashMap<&str, Vec<tree_sitter::Node>> = HashMap::new();
        for capture in mat.captures {
            let name = query.capture_names()[capture.index as usize];
            caps.entry(name).or_default().push(capture.node);
        }

        match pattern {
            QueryPattern::Import => {
                let path = match caps.get("reference.import.path") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };
                let source_path = path.trim_matches(|c| c == '"' || c == '`').to_string();
                if !seen_imports.insert(source_path.clone()) {
                    continue;
                }
                let alias = caps
                    .get("reference.import.alias")
                    .map(|nodes| node_text(&nodes[0], source));
                out.imports.push(PendingImport {
                    source: source_path,
                    symbol: None,
                    alias,
                });
            }

            QueryPattern::Interface | QueryPattern::Class => {
                let (def_cap, name_cap) = if pattern == QueryPattern::Interface {
                    ("definition.interface", "definition.interface.name")
                } else {
                    ("definition.class", "definition.class.name")
                };
                let def_node = match caps.get(def_cap) {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get(name_cap) {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                let local = name.clone();
                let key = match seen.get(&(local.clone(), def_node.start_byte())) {
                    Some(existing) => existing.clone(),
                    None => {
                        let (start_line, end_line) = node_lines(&def_node);
                        let code = node_text(&def_node, source);
                        let key = out.push_definition(Definition {
                            kind: if pattern == QueryPattern::Interface {
                                NodeKind::Interface
                            } else {
                                NodeKind::Class
                            },
                            name: out.key(&name),
                            owner: None,
                            start_line,
                            end_line,
                            byte_start: def_node.start_byte(),
                            byte_end: def_node.end_byte(),
                            body_span: None,
                            skeleton_code: code.clone(),
                            code,
                        });
                        seen.insert((local, def_node.start_byte()), key.clone());
                        key
                    }
                };

                // Embedded struct fields inherit from the embedded type.
                if let Some(embedded) = caps.get("definition.class.embedded") {
                    for node in embedded {
                        out.inherits.push(PendingInherit {
                            class_key: key.clone(),
                            superclass: node_text(node, source),
                        });
                    }
                }
            }

            QueryPattern::Function | QueryPattern::Method => {
                let prefix = if pattern == QueryPattern::Function {
                    "definition.function"
                } else {
                    "definition.method"
                };
                let def_node = match caps.get(prefix) {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get(format!("{prefix}.name").as_str()) {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                // Receiver methods and struct constructors attach to
                // their struct when it is defined in the same file.
                let parent = caps
                    .get(format!("{prefix}.receiver_type").as_str())
                    .or_else(|| caps.get(format!("{prefix}.first_return_type").as_str()))
                    .map(|nodes| node_text(&nodes[0], source))
                    .filter(|ty| {
                        out.definitions
                            .iter()
                            .any(|d| d.kind == NodeKind::Class && d.name == out.key(ty))
                    });

                let local = match &parent {
                    Some(ty) => format!("{ty}.{name}"),
                    None => name.clone(),
                };

                let key = match seen.get(&(local.clone(), def_node.start_byte())) {
                    Some(existing) => existing.clone(),
                    None => {
                        let (start_line, end_line) = node_lines(&def_node);
                        let code = node_text(&def_node, source);
                        let body_span = caps
                            .get(format!("{prefix}.body").as_str())
                            .map(|nodes| (nodes[0].start_byte(), nodes[0].end_byte()));
                        let skeleton_code = match body_span {
                            Some(span) => elide_spans(
                                source,
                                def_node.start_byte(),
                                def_node.end_byte(),
                                &[span],
                                "{ ... }",
                            ),
                            None => code.clone(),
                        };
                        let key = out.push_definition(Definition {
                            kind: NodeKind::Function,
                            name: out.key(&local),
                            owner: parent.as_ref().map(|ty| out.key(ty)),
                            start_line,
                            end_line,
                            byte_start: def_node.start_byte(),
                            byte_end: def_node.end_byte(),
                            body_span,
                            code,
                            skeleton_code,
                        });
                        seen.insert((local, def_node.start_byte()), key.clone());
                        key
                    }
                };

                if let Some(params) = caps.get(format!("{prefix}.param_type").as_str()) {
                    for node in params {
                        let text = node_text(node, source);
                        if let Some(name_path) = param_type_path(&text) {
                            if seen_refs.insert((key.clone(), name_path.clone())) {
                                out.references.push(RawReference {
                                    from: key.clone(),
                                    name_path,
                                    role: ReferenceRole::TypeRef,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Normalise a parameter type expression into a resolvable name path.
///
/// `*Address` and `[]*Address` and `map[string]Address` all reduce to
/// `Address`; `pkg.Type` keeps its qualifier. Inline function, struct and
/// interface types and builtins are not resolvable and yield None.
fn param_type_path(text: &str) -> Option<Vec<String>> {
    let text = text.trim();
    if text.starts_with("func") || text.starts_with("struct") || text.starts_with("interface") {
        return None;
    }

    // Strip pointer, slice and map wrappers: the named type is whatever
    // follows the last '*' or ']'.
    let stripped = text
        .rsplit(|c| c == '*' || c == ']')
        .next()
        .unwrap_or("")
        .trim();
    if stripped.is_empty() {
        return None;
    }

    let name_path = split_name_path(stripped);
    let builtin = name_path
        .last()
        .map(|last| is_go_builtin_type(last))
        .unwrap_or(true);
    if builtin {
        None
    } else {
        Some(name_path)
    }
}

/// Go's predeclared types, never worth a reference edge.
fn is_go_builtin_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "bool"
            | "byte"
            | "rune"
            | "int"
            | "int8"
            | "int16"
            | "int32"
            | "int64"
            | "uint"
            | "uint8"
            | "uint16"
            | "uint32"
            | "uint64"
            | "uintptr"
            | "float32"
            | "float64"
            | "complex64"
            | "complex128"
            | "string"
            | "error"
            | "any"
    )
}
