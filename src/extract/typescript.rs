//! TypeScript and JavaScript definition extraction.
//!
//! The two grammars share their statement shapes, so one extractor covers
//! both; TypeScript adds interfaces, enums, type aliases and annotated
//! parameter types. Enums and type aliases materialise as OtherType
//! nodes.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tree_sitter::StreamingIterator;

use crate::model::NodeKind;

use super::{
    elide_spans, node_lines, node_text, split_name_path, Definition, FileExtraction,
    PendingImport, PendingInherit, RawReference, ReferenceRole,
};

/// Semantic query patterns shared by the two grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPattern {
    Import,
    Interface,
    Class,
    Function,
    Method,
    Enum,
    TypeAlias,
}

impl QueryPattern {
    /// Map a pattern index back to its semantic pattern. The TypeScript
    /// and JavaScript query files order their patterns differently.
    fn from_index(typescript: bool, index: usize) -> Option<Self> {
        if typescript {
            match index {
                0 => Some(QueryPattern::Import),
                1 => Some(QueryPattern::Interface),
                2 => Some(QueryPattern::Class),
                3 => Some(QueryPattern::Function),
                4 => Some(QueryPattern::Method),
                5 => Some(QueryPattern::Enum),
                6 => Some(QueryPattern::TypeAlias),
                _ => None,
            }
        } else {
            match index {
                0 => Some(QueryPattern::Import),
                1 => Some(QueryPattern::Class),
                2 => Some(QueryPattern::Function),
                3 => Some(QueryPattern::Method),
                _ => None,
            }
        }
    }
}

/// Marker symbol recorded for default imports, which bind a module's
/// default export rather than a named symbol.
pub const DEFAULT_EXPORT_SYMBOL: &str = "export default";

pub(super) fn extract(
    out: &mut FileExtraction,
    tree: &tree_sitter::Tree,
    source: &[u8],
    typescript: bool,
) -> Result<()> {
    let (grammar, query_source) = if typescript {
        (
            tree_sitter::Language::from(tree_sitter_typescript::LANGUAGE_TYPESCRIPT),
            crate::registry::TYPESCRIPT_DEFINITIONS_QUERY_SOURCE,
        )
    } else {
        (
            tree_sitter::Language::from(tree_sitter_javascript::LANGUAGE),
            crate::registry::JAVASCRIPT_DEFINITIONS_QUERY_SOURCE,
        )
    };
    let query = tree_sitter::Query::new(&grammar, query_source).with_context(|| {
        format!(
            "{} definitions query failed to compile",
            if typescript { "typescript" } else { "javascript" }
        )
    })?;

    // One match per optional capture combination; dedup definitions by
    // (local key, span) and typeref references by (from, path).
    let mut seen: HashMap<(String, usize), String> = HashMap::new();
    let mut seen_refs: HashSet<(String, Vec<String>)> = HashSet::new();
    let mut seen_imports: HashSet<(String, String, String)> = HashSet::new();

    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    while let Some(mat) = matches.next() {
        let pattern = match QueryPattern::from_index(typescript, mat.pattern_index) {
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
                let source_path = match caps.get("reference.import.source") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                let (symbol, alias) = if let Some(nodes) = caps.get("reference.named_import.name")
                {
                    // import { A } from 'x' / import { A as B } from 'x'
                    let name = node_text(&nodes[0], source);
                    let alias = caps
                        .get("reference.named_import.alias")
                        .map(|n| node_text(&n[0], source));
                    (Some(name), alias)
                } else if let Some(nodes) = caps.get("reference.namespace_import.alias") {
                    // import * as N from 'x'
                    (None, Some(node_text(&nodes[0], source)))
                } else if let Some(nodes) = caps.get("reference.default_import.alias") {
                    // import X from 'x'
                    (
                        Some(DEFAULT_EXPORT_SYMBOL.to_string()),
                        Some(node_text(&nodes[0], source)),
                    )
                } else {
                    continue;
                };

                let dedup = (
                    source_path.clone(),
                    symbol.clone().unwrap_or_default(),
                    alias.clone().unwrap_or_default(),
                );
                if !seen_imports.insert(dedup) {
                    continue;
                }
                out.imports.push(PendingImport {
                    source: source_path,
                    symbol,
                    alias,
                });
            }

            QueryPattern::Interface | QueryPattern::Enum | QueryPattern::TypeAlias => {
                let (def_cap, name_cap, kind) = match pattern {
                    QueryPattern::Interface => (
                        "definition.interface",
                        "definition.interface.name",
                        NodeKind::Interface,
                    ),
                    QueryPattern::Enum => {
                        ("definition.enum", "definition.enum.name", NodeKind::OtherType)
                    }
                    _ => (
                        "definition.type_alias",
                        "definition.type_alias.name",
                        NodeKind::OtherType,
                    ),
                };
                let def_node = match caps.get(def_cap) {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get(name_cap) {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                if seen.contains_key(&(name.clone(), def_node.start_byte())) {
                    continue;
                }
                let (start_line, end_line) = node_lines(&def_node);
                let code = node_text(&def_node, source);
                let key = out.push_definition(Definition {
                    kind,
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
                seen.insert((name, def_node.start_byte()), key);
            }

            QueryPattern::Class => {
                let def_node = match caps.get("definition.class") {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get("definition.class.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                let key = match seen.get(&(name.clone(), def_node.start_byte())) {
                    Some(existing) => existing.clone(),
                    None => {
                        let (start_line, end_line) = node_lines(&def_node);
                        let body_span = caps
                            .get("definition.class.body")
                            .map(|nodes| (nodes[0].start_byte(), nodes[0].end_byte()));
                        let code = node_text(&def_node, source);
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
                            kind: NodeKind::Class,
                            name: out.key(&name),
                            owner: None,
                            start_line,
                            end_line,
                            byte_start: def_node.start_byte(),
                            byte_end: def_node.end_byte(),
                            body_span: None,
                            code,
                            skeleton_code,
                        });
                        seen.insert((name, def_node.start_byte()), key.clone());
                        key
                    }
                };

                if let Some(supers) = caps.get("definition.class.superclass") {
                    for node in supers {
                        out.inherits.push(PendingInherit {
                            class_key: key.clone(),
                            superclass: node_text(node, source),
                        });
                    }
                }
            }

            QueryPattern::Function | QueryPattern::Method => {
                let (prefix, owner_name) = if pattern == QueryPattern::Function {
                    ("definition.function", None)
                } else {
                    let class_name = match caps.get("definition.class.name") {
                        Some(nodes) => node_text(&nodes[0], source),
                        None => continue,
                    };
                    ("definition.method", Some(class_name))
                };

                let def_node = match caps.get(prefix) {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get(format!("{prefix}.name").as_str()) {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                let local = match &owner_name {
                    Some(class) => format!("{class}.{name}"),
                    None => name.clone(),
                };

                let key = match seen.get(&(local.clone(), def_node.start_byte())) {
                    Some(existing) => existing.clone(),
                    None => {
                        let (start_line, end_line) = node_lines(&def_node);
                        let body_span = caps
                            .get(format!("{prefix}.body").as_str())
                            .map(|nodes| (nodes[0].start_byte(), nodes[0].end_byte()));
                        let code = node_text(&def_node, source);
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
                            owner: owner_name.as_ref().map(|class| out.key(class)),
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
                        for name_path in annotation_type_paths(&text) {
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

/// Extract resolvable type names from a type annotation.
///
/// `Map<string, User>` yields `User`; `ns.Thing[]` yields `ns.Thing` as a
/// two-segment path; builtins and utility types are skipped.
fn annotation_type_paths(annotation: &str) -> Vec<Vec<String>> {
    let mut paths = Vec::new();
    let mut found: HashSet<String> = HashSet::new();

    let mut token = String::new();
    for c in annotation.chars().chain(std::iter::once(' ')) {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            token.push(c);
            continue;
        }
        if token.is_empty() {
            continue;
        }
        let candidate = token.trim_matches('.').to_string();
        token.clear();
        if candidate.is_empty() || candidate.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        if !candidate.contains('.') && is_ts_builtin_type(&candidate) {
            continue;
        }
        if !found.insert(candidate.clone()) {
            continue;
        }
        let path = split_name_path(&candidate);
        if !path.is_empty() {
            paths.push(path);
        }
    }

    paths
}

/// TypeScript builtin and utility types, never worth a reference edge.
fn is_ts_builtin_type(type_name: &str) -> bool {
    matches!(
        type_name,
        "string"
            | "number"
            | "boolean"
            | "any"
            | "void"
            | "null"
            | "undefined"
            | "unknown"
            | "never"
            | "object"
            | "bigint"
            | "symbol"
            | "Function"
            | "Map"
            | "Set"
            | "Promise"
            | "Array"
            | "Record"
            | "Partial"
            | "Readonly"
            | "Required"
            | "Pick"
            | "Omit"
    )
}
