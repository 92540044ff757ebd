//! Pattern-driven definition and reference extraction.
//!
//! Runs each language's declarative tree-sitter queries against a parsed
//! file and emits raw [`Definition`]s and [`RawReference`]s. Extraction is
//! a pure function over (path, bytes, language): no global state, no
//! filesystem access beyond the bytes it is handed.

pub mod go;
pub mod pool;
pub mod python;
pub mod typescript;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tree_sitter::StreamingIterator;

use crate::config::IndexConfig;
use crate::model::{Node, NodeKind};
use crate::registry::Language;

/// Syntactic role of a raw reference, taken from the capture suffix of
/// the language's references query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    Import,
    Inherit,
    Call,
    Arg,
    Kwarg,
    AssignRhs,
    BinOp,
    Compare,
    TypeRef,
}

impl ReferenceRole {
    /// Map a `@name.reference.<role>` capture suffix to its role.
    fn from_capture_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "import" => Some(ReferenceRole::Import),
            "inherit" => Some(ReferenceRole::Inherit),
            "call" => Some(ReferenceRole::Call),
            "arg" => Some(ReferenceRole::Arg),
            "kwarg" => Some(ReferenceRole::Kwarg),
            "assign_rhs" => Some(ReferenceRole::AssignRhs),
            "binop" => Some(ReferenceRole::BinOp),
            "compare" => Some(ReferenceRole::Compare),
            "typeref" => Some(ReferenceRole::TypeRef),
            _ => None,
        }
    }
}

/// An extracted code entity, pre-resolution.
#[derive(Debug, Clone)]
pub struct Definition {
    pub kind: NodeKind,
    /// Full node key: `<relative file>#<dotted owner chain>`.
    pub name: String,
    /// Key of the containing Class/Interface for methods; None for
    /// file-level definitions.
    pub owner: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    /// Byte span of the function body, when this definition has one.
    pub body_span: Option<(usize, usize)>,
    pub code: String,
    pub skeleton_code: String,
}

impl Definition {
    /// Local name of this definition within its file: `Name` or
    /// `Owner.Name`.
    pub fn local_name(&self) -> &str {
        self.name.split_once('#').map(|(_, a)| a).unwrap_or(&self.name)
    }
}

/// A pre-resolution mention of a name path inside a definition's body.
#[derive(Debug, Clone)]
pub struct RawReference {
    /// Key of the enclosing definition.
    pub from: String,
    /// Dotted identifier chain, 1..=3 segments.
    pub name_path: Vec<String>,
    pub role: ReferenceRole,
}

/// An import statement awaiting repo-wide resolution.
#[derive(Debug, Clone)]
pub struct PendingImport {
    /// Module path / import source exactly as written (quotes stripped).
    pub source: String,
    /// Imported symbol for `from x import y` / named-import forms.
    pub symbol: Option<String>,
    /// Explicit local alias, if any.
    pub alias: Option<String>,
}

/// An inheritance clause awaiting repo-wide resolution.
#[derive(Debug, Clone)]
pub struct PendingInherit {
    /// Key of the subclass node.
    pub class_key: String,
    /// Superclass name exactly as written (`Base` or `mod.Base`).
    pub superclass: String,
}

/// Everything extracted from one file.
#[derive(Debug)]
pub struct FileExtraction {
    pub rel_path: String,
    pub language: Language,
    pub file_node: Node,
    pub definitions: Vec<Definition>,
    pub references: Vec<RawReference>,
    pub imports: Vec<PendingImport>,
    pub inherits: Vec<PendingInherit>,
}

impl FileExtraction {
    fn new(rel_path: &str, language: Language, source: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source);
        let hash = format!("{:x}", hasher.finalize());

        let file_node = Node {
            name: rel_path.to_string(),
            kind: NodeKind::File,
            language,
            start_line: 0,
            end_line: 0,
            code: String::from_utf8_lossy(source).into_owned(),
            skeleton_code: String::new(),
            hash: Some(hash),
        };

        Self {
            rel_path: rel_path.to_string(),
            language,
            file_node,
            definitions: Vec::new(),
            references: Vec::new(),
            imports: Vec::new(),
            inherits: Vec::new(),
        }
    }

    /// Key for a file-level definition: `<file>#<name>`.
    pub fn key(&self, local_name: &str) -> String {
        format!("{}#{}", self.rel_path, local_name)
    }

    /// Insert a definition, disambiguating duplicate names with a `#N`
    /// suffix (first definition by start line wins the plain key).
    pub(crate) fn push_definition(&mut self, mut def: Definition) -> String {
        if self.definitions.iter().any(|d| d.name == def.name) {
            let mut n = 2;
            let base = def.name.clone();
            while self.definitions.iter().any(|d| d.name == format!("{base}#{n}")) {
                n += 1;
            }
            log::warn!(
                "duplicate definition name {} in {}; emitting as {}#{}",
                base,
                self.rel_path,
                base,
                n
            );
            def.name = format!("{base}#{n}");
        }
        let name = def.name.clone();
        self.definitions.push(def);
        name
    }

    /// Key of the innermost definition whose byte span contains `byte`.
    fn enclosing_definition(&self, byte: usize) -> Option<&Definition> {
        self.definitions
            .iter()
            .filter(|d| d.byte_start <= byte && byte < d.byte_end)
            .min_by_key(|d| d.byte_end - d.byte_start)
    }
}

/// Extract one file.
///
/// Parse failures and timeouts are recovered locally: the file is still
/// recorded as a File node with no structural children, and a warning is
/// logged.
pub fn extract_file(
    rel_path: &str,
    source: &[u8],
    language: Language,
    config: &IndexConfig,
) -> Result<FileExtraction> {
    let mut out = FileExtraction::new(rel_path, language, source);

    if language.grammar().is_none() {
        return Ok(out);
    }

    let tree = pool::with_parser(language, config.parse_timeout, |parser| {
        parser.parse(source, None)
    })?;

    let tree = match tree {
        Some(t) => t,
        None => {
            log::warn!("failed to parse {rel_path}; recording file without children");
            return Ok(out);
        }
    };

    match language {
        Language::Python => python::extract(&mut out, &tree, source)?,
        Language::Go => go::extract(&mut out, &tree, source)?,
        Language::TypeScript => typescript::extract(&mut out, &tree, source, true)?,
        Language::JavaScript => typescript::extract(&mut out, &tree, source, false)?,
        Language::Text => {}
    }

    // Definitions are emitted in ascending source order within a file.
    out.definitions.sort_by_key(|d| (d.byte_start, d.byte_end));

    extract_references(&mut out, &tree, source)?;

    // File skeleton: the source with every extracted function body elided.
    let bodies = function_body_spans(&out);
    out.file_node.skeleton_code =
        elide_spans(source, 0, source.len(), &bodies, body_placeholder(language));

    Ok(out)
}

/// Sorted byte spans of every function body extracted from the file.
pub(crate) fn function_body_spans(out: &FileExtraction) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = out
        .definitions
        .iter()
        .filter(|d| d.kind == NodeKind::Function)
        .filter_map(|d| d.body_span)
        .collect();
    spans.sort();
    spans.dedup();
    spans
}

/// Evaluate the language's references query and attribute each capture to
/// its innermost enclosing definition.
fn extract_references(
    out: &mut FileExtraction,
    tree: &tree_sitter::Tree,
    source: &[u8],
) -> Result<()> {
    let query_source = match out.language.references_query() {
        Some(q) => q,
        None => return Ok(()),
    };
    let grammar = match out.language.grammar() {
        Some(g) => g,
        None => return Ok(()),
    };

    let query = tree_sitter::Query::new(&grammar, query_source)
        .with_context(|| format!("{} references query failed to compile", out.language))?;

    let mut cursor = tree_sitter::QueryCursor::new();
    let mut matches = cursor.matches(&query, tree.root_node(), source);

    let mut references = Vec::new();
    while let Some(mat) = matches.next() {
        for capture in mat.captures {
            let capture_name = query.capture_names()[capture.index as usize];
            let role = match capture_name
                .strip_prefix("name.reference.")
                .and_then(ReferenceRole::from_capture_suffix)
            {
                Some(role) => role,
                None => continue,
            };

            let text = node_text(&capture.node, source);
            let name_path = split_name_path(&text);
            if name_path.is_empty() {
                continue;
            }

            let from = match out.enclosing_definition(capture.node.start_byte()) {
                Some(def) if def.kind.can_reference() => def.name.clone(),
                // Free-standing references (module-level expression code)
                // have no valid REFERENCES source; skip them.
                _ => continue,
            };

            references.push(RawReference {
                from,
                name_path,
                role,
            });
        }
    }

    out.references.extend(references);
    Ok(())
}

/// Split a dotted identifier chain into at most three segments; deeper
/// chains are truncated (tree-sitter queries bound attribute nesting, and
/// the resolver cannot use the remainder anyway).
pub(crate) fn split_name_path(text: &str) -> Vec<String> {
    let mut segments = Vec::new();
    for segment in text.split('.') {
        let segment = segment.trim();
        // Anything that is not a plain identifier chain (calls, indexing,
        // slices) is not resolvable by name and is skipped wholesale.
        if segment.is_empty() || !segment.chars().all(|c| c.is_alphanumeric() || c == '_') {
            return Vec::new();
        }
        if segments.len() < 3 {
            segments.push(segment.to_string());
        }
    }
    segments
}

/// The body placeholder used in skeleton code for this language.
pub(crate) fn body_placeholder(language: Language) -> &'static str {
    match language {
        Language::Python => "...",
        _ => "{ ... }",
    }
}

/// Textual body elision over a byte window of the source.
///
/// Every span in `bodies` that falls inside `[start, end)` is replaced by
/// `placeholder`; everything else is copied through verbatim.
pub(crate) fn elide_spans(
    source: &[u8],
    start: usize,
    end: usize,
    bodies: &[(usize, usize)],
    placeholder: &str,
) -> String {
    let mut result = Vec::new();
    let mut pos = start;
    for &(body_start, body_end) in bodies {
        if body_start < pos || body_end > end {
            continue;
        }
        result.extend_from_slice(&source[pos..body_start]);
        result.extend_from_slice(placeholder.as_bytes());
        pos = body_end;
    }
    if pos < end {
        result.extend_from_slice(&source[pos..end]);
    }
    String::from_utf8_lossy(&result).into_owned()
}

/// UTF-8 text of a node, lossily decoded.
pub(crate) fn node_text(node: &tree_sitter::Node, source: &[u8]) -> String {
    node.utf8_text(source)
        .map(|s| s.to_string())
        .unwrap_or_else(|_| String::from_utf8_lossy(&source[node.start_byte()..node.end_byte()]).into_owned())
}

/// 1-based line span of a node.
pub(crate) fn node_lines(node: &tree_sitter::Node) -> (usize, usize) {
    (
        node.start_position().row + 1,
        node.end_position().row + 1,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name_path_truncates_to_three() {
        assert_eq!(split_name_path("a"), vec!["a"]);
        assert_eq!(split_name_path("a.b"), vec!["a", "b"]);
        assert_eq!(split_name_path("a.b.c.d"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_name_path_rejects_expressions() {
        // Call chains like `f().g` are not identifier chains.
        assert_eq!(split_name_path("f().g"), Vec::<String>::new());
    }

    #[test]
    fn test_elide_spans() {
        let source = b"fn a() { body } fn b() { body }";
        let skeleton = elide_spans(source, 0, source.len(), &[(7, 15), (23, 31)], "{ ... }");
        assert_eq!(skeleton, "fn a() { ... } fn b() { ... }");
    }

    #[test]
    fn test_elide_spans_window() {
        let source = b"fn a() { body } fn b() { body }";
        // Only the second body falls inside the window.
        let skeleton = elide_spans(source, 16, source.len(), &[(7, 15), (23, 31)], "{ ... }");
        assert_eq!(skeleton, "fn b() { ... }");
    }

    #[test]
    fn test_parse_failure_records_bare_file() {
        let config = IndexConfig::default();
        // Empty grammarless language: Text is always a bare file.
        let out = extract_file("notes.txt", b"hello", Language::Text, &config).unwrap();
        assert!(out.definitions.is_empty());
        assert_eq!(out.file_node.kind, NodeKind::File);
        assert_eq!(out.file_node.code, "hello");
    }
}
