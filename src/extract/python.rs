//! Python definition extraction.
//!
//! Module-level classes, functions and variables, plus methods inside
//! class bodies. Import statements and superclass lists are recorded as
//! pending clauses for the repo-wide resolution phase.

use std::collections::HashMap;

use anyhow::{Context, Result};
use tree_sitter::StreamingIterator;

use crate::model::NodeKind;

use super::{
    elide_spans, node_lines, node_text, Definition, FileExtraction, PendingImport,
    PendingInherit,
};

/// Tree-sitter query patterns, in the order they appear in
/// `python-definitions.scm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryPattern {
    Import,
    FromImport,
    Class,
    Method,
    Function,
    Variable,
}

impl QueryPattern {
    fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(QueryPattern::Import),
            1 => Some(QueryPattern::FromImport),
            2 => Some(QueryPattern::Class),
            3 => Some(QueryPattern::Method),
            4 => Some(QueryPattern::Function),
            5 => Some(QueryPattern::Variable),
            _ => None,
        }
    }
}

pub(super) fn extract(
    out: &mut FileExtraction,
    tree: &tree_sitter::Tree,
    source: &[u8],
) -> Result<()> {
    let grammar = tree_sitter_python::LANGUAGE.into();
    let query = tree_sitter::Query::new(
        &grammar,
        crate::registry::PYTHON_DEFINITIONS_QUERY_SOURCE,
    )
    .context("python definitions query failed to compile")?;

    // Class patterns emit one match per superclass, method patterns one
    // per method. Dedup definitions by (local key, span).
    let mut seen: HashMap<(String, usize), String> = HashMap::new();

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
                // import a.b or import a.b as c
                let name = match caps.get("reference.import.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };
                let alias = caps
                    .get("reference.import.alias")
                    .map(|nodes| node_text(&nodes[0], source));
                out.imports.push(PendingImport {
                    source: name,
                    symbol: None,
                    alias,
                });
            }

            QueryPattern::FromImport => {
                // from a.b import C or from .mod import C as D
                let module = match caps.get("reference.import.module") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };
                let name = match caps.get("reference.import.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };
                let alias = caps
                    .get("reference.import.alias")
                    .map(|nodes| node_text(&nodes[0], source));
                out.imports.push(PendingImport {
                    source: module,
                    symbol: Some(name),
                    alias,
                });
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
                        let key = out.push_definition(Definition {
                            kind: NodeKind::Class,
                            name: out.key(&name),
                            owner: None,
                            start_line,
                            end_line,
                            byte_start: def_node.start_byte(),
                            byte_end: def_node.end_byte(),
                            body_span: None,
                            code: node_text(&def_node, source),
                            // Filled in below once method bodies are known.
                            skeleton_code: String::new(),
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

            QueryPattern::Method => {
                let class_name = match caps.get("definition.class.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };
                let def_node = match caps.get("definition.method") {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get("definition.method.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                let local = format!("{class_name}.{name}");
                if seen.contains_key(&(local.clone(), def_node.start_byte())) {
                    continue;
                }
                let (start_line, end_line) = node_lines(&def_node);
                let body_span = caps
                    .get("definition.method.body")
                    .map(|nodes| (nodes[0].start_byte(), nodes[0].end_byte()));
                let code = node_text(&def_node, source);
                let skeleton_code = match body_span {
                    Some(span) => elide_spans(
                        source,
                        def_node.start_byte(),
                        def_node.end_byte(),
                        &[span],
                        "...",
                    ),
                    None => code.clone(),
                };
                let key = out.push_definition(Definition {
                    kind: NodeKind::Function,
                    name: out.key(&local),
                    owner: Some(out.key(&class_name)),
                    start_line,
                    end_line,
                    byte_start: def_node.start_byte(),
                    byte_end: def_node.end_byte(),
                    body_span,
                    code,
                    skeleton_code,
                });
                seen.insert((local, def_node.start_byte()), key);
            }

            QueryPattern::Function => {
                let def_node = match caps.get("definition.function") {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get("definition.function.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                if seen.contains_key(&(name.clone(), def_node.start_byte())) {
                    continue;
                }
                let (start_line, end_line) = node_lines(&def_node);
                let body_span = caps
                    .get("definition.function.body")
                    .map(|nodes| (nodes[0].start_byte(), nodes[0].end_byte()));
                let code = node_text(&def_node, source);
                let skeleton_code = match body_span {
                    Some(span) => elide_spans(
                        source,
                        def_node.start_byte(),
                        def_node.end_byte(),
                        &[span],
                        "...",
                    ),
                    None => code.clone(),
                };
                let key = out.push_definition(Definition {
                    kind: NodeKind::Function,
                    name: out.key(&name),
                    owner: None,
                    start_line,
                    end_line,
                    byte_start: def_node.start_byte(),
                    byte_end: def_node.end_byte(),
                    body_span,
                    code,
                    skeleton_code,
                });
                seen.insert((name, def_node.start_byte()), key);
            }

            QueryPattern::Variable => {
                let def_node = match caps.get("definition.variable") {
                    Some(nodes) => nodes[0],
                    None => continue,
                };
                let name = match caps.get("definition.variable.name") {
                    Some(nodes) => node_text(&nodes[0], source),
                    None => continue,
                };

                if seen.contains_key(&(name.clone(), def_node.start_byte())) {
                    continue;
                }
                let (start_line, end_line) = node_lines(&def_node);
                let key = out.push_definition(Definition {
                    kind: NodeKind::Variable,
                    name: out.key(&name),
                    owner: None,
                    start_line,
                    end_line,
                    byte_start: def_node.start_byte(),
                    byte_end: def_node.end_byte(),
                    body_span: None,
                    code: node_text(&def_node, source),
                    skeleton_code: String::new(),
                });
                seen.insert((name, def_node.start_byte()), key);
            }
        }
    }

    // Class skeletons: the class source with contained method bodies
    // elided. Methods are extracted by now, so their spans are known.
    let method_bodies = super::function_body_spans(out);
    for def in &mut out.definitions {
        if def.kind == NodeKind::Class {
            def.skeleton_code = elide_spans(
                source,
                def.byte_start,
                def.byte_end,
                &method_bodies,
                "...",
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::extract::{extract_file, ReferenceRole};
    use crate::registry::Language;

    fn extract_source(source: &[u8]) -> FileExtraction {
        extract_file("src/a.py", source, Language::Python, &IndexConfig::default()).unwrap()
    }

    #[test]
    fn test_extract_top_level_classes() {
        let out = extract_source(b"class D1:\n    pass\n\nclass D2:\n    pass\n");

        let names: Vec<&str> = out.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["src/a.py#D1", "src/a.py#D2"]);
        assert!(out.definitions.iter().all(|d| d.kind == NodeKind::Class));
        assert_eq!(out.definitions[0].start_line, 1);
        assert_eq!(out.definitions[0].end_line, 2);
        assert_eq!(out.definitions[1].start_line, 4);
    }

    #[test]
    fn test_extract_method_with_owner() {
        let out = extract_source(b"class A:\n    def run(self):\n        pass\n");

        let method = out
            .definitions
            .iter()
            .find(|d| d.name == "src/a.py#A.run")
            .expect("method should be extracted");
        assert_eq!(method.kind, NodeKind::Function);
        assert_eq!(method.owner.as_deref(), Some("src/a.py#A"));
    }

    #[test]
    fn test_extract_module_variable() {
        let out = extract_source(b"LIMIT = 10\n\ndef f():\n    pass\n");

        let var = out
            .definitions
            .iter()
            .find(|d| d.kind == NodeKind::Variable)
            .expect("variable should be extracted");
        assert_eq!(var.name, "src/a.py#LIMIT");
        assert_eq!(var.code, "LIMIT = 10");
    }

    #[test]
    fn test_nested_function_not_extracted() {
        let out = extract_source(b"def outer():\n    def inner():\n        pass\n");

        let names: Vec<&str> = out.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["src/a.py#outer"]);
    }

    #[test]
    fn test_plain_imports() {
        let out = extract_source(b"import os\nimport os.path as osp\n");

        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].source, "os");
        assert_eq!(out.imports[0].symbol, None);
        assert_eq!(out.imports[1].source, "os.path");
        assert_eq!(out.imports[1].alias.as_deref(), Some("osp"));
    }

    #[test]
    fn test_from_imports() {
        let out = extract_source(b"from collections import OrderedDict\nfrom .sibling import Thing as T\n");

        assert_eq!(out.imports.len(), 2);
        assert_eq!(out.imports[0].source, "collections");
        assert_eq!(out.imports[0].symbol.as_deref(), Some("OrderedDict"));
        assert_eq!(out.imports[1].source, ".sibling");
        assert_eq!(out.imports[1].symbol.as_deref(), Some("Thing"));
        assert_eq!(out.imports[1].alias.as_deref(), Some("T"));
    }

    #[test]
    fn test_superclasses_recorded() {
        let out = extract_source(b"class Base:\n    pass\n\nclass Sub(Base, mod.Other):\n    pass\n");

        assert_eq!(out.inherits.len(), 2);
        assert_eq!(out.inherits[0].class_key, "src/a.py#Sub");
        assert_eq!(out.inherits[0].superclass, "Base");
        assert_eq!(out.inherits[1].superclass, "mod.Other");
    }

    #[test]
    fn test_duplicate_definition_gets_suffix() {
        let out = extract_source(b"def f():\n    pass\n\ndef f():\n    pass\n");

        let names: Vec<&str> = out.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["src/a.py#f", "src/a.py#f#2"]);
    }

    #[test]
    fn test_references_with_roles() {
        let out = extract_source(
            b"class A:\n    pass\n\ndef build(x):\n    a = A()\n    return helper(a, key=other.value)\n",
        );

        let roles: Vec<(ReferenceRole, Vec<String>)> = out
            .references
            .iter()
            .map(|r| (r.role, r.name_path.clone()))
            .collect();

        assert!(roles.contains(&(ReferenceRole::Call, vec!["A".to_string()])));
        assert!(roles.contains(&(ReferenceRole::Call, vec!["helper".to_string()])));
        assert!(roles.contains(&(
            ReferenceRole::Kwarg,
            vec!["other".to_string(), "value".to_string()]
        )));
        assert!(out.references.iter().all(|r| r.from == "src/a.py#build"));
    }

    #[test]
    fn test_class_skeleton_elides_method_bodies() {
        let out = extract_source(
            b"class A:\n    def run(self):\n        x = 1\n        return x\n",
        );

        let class = out
            .definitions
            .iter()
            .find(|d| d.kind == NodeKind::Class)
            .unwrap();
        assert!(class.skeleton_code.contains("def run(self):"));
        assert!(!class.skeleton_code.contains("x = 1"));
        assert!(class.skeleton_code.contains("..."));
    }

    #[test]
    fn test_file_skeleton_elides_bodies() {
        let out = extract_source(b"def f():\n    return 1\n\nX = 2\n");

        assert!(out.file_node.skeleton_code.contains("def f():"));
        assert!(!out.file_node.skeleton_code.contains("return 1"));
        assert!(out.file_node.skeleton_code.contains("X = 2"));
    }
}
