//! Symbol resolution.
//!
//! Converts pending imports, inheritance clauses and raw references into
//! edges whose targets are concrete definitions or deduplicated Unparsed
//! placeholders. Rules are ordered per language: local lookup, import
//! alias, same-package (Go), repo-global unique match, then the Unparsed
//! fallback. Resolution is always best-effort and never fails a run.

use std::collections::HashMap;
use std::path::Path;

use crate::extract::{
    FileExtraction, PendingImport, RawReference, ReferenceRole,
};
use crate::model::{Edge, EdgeKind, NodeKind, NodeRef};
use crate::registry::Language;
use crate::symbols::{ImportTarget, SymbolTable};

/// Repo-level facts the resolvers need beyond the symbol table.
#[derive(Debug, Default)]
pub struct RepoContext {
    /// Module path from the repo's go.mod, when present.
    pub go_module_path: Option<String>,
}

impl RepoContext {
    pub fn for_repo(repo_path: &Path) -> Self {
        Self {
            go_module_path: read_go_module_path(repo_path),
        }
    }
}

/// Read the `module` directive from `<repo>/go.mod`.
fn read_go_module_path(repo_path: &Path) -> Option<String> {
    let go_mod = repo_path.join("go.mod");
    let content = std::fs::read_to_string(go_mod).ok()?;
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("module ")
            .map(|m| m.trim().to_string())
    })
}

/// A resolved import: the edge target plus its metadata and the local
/// binding to record in the file's alias table.
struct ResolvedImport {
    target: NodeRef,
    import: Option<String>,
    alias: Option<String>,
    binding: Option<String>,
}

/// Per-language resolution rules.
///
/// Adding a language means implementing this trait and registering the
/// implementation in [`resolvers_for`]; the resolution driver never
/// changes.
trait LanguageResolver {
    fn resolve_import(
        &self,
        table: &SymbolTable,
        file: &str,
        imp: &PendingImport,
    ) -> ResolvedImport;

    fn resolve_superclass(&self, table: &SymbolTable, file: &str, raw: &str) -> NodeRef;

    fn resolve_reference(
        &self,
        table: &SymbolTable,
        file: &str,
        owner: Option<&str>,
        reference: &RawReference,
    ) -> Option<NodeRef>;
}

/// Resolve everything extracted from the repo into edges.
///
/// Runs in three passes: import aliasing first (it feeds the alias
/// tables), then inheritance, then references. The symbol table is
/// read-only after the aliasing pass.
pub fn resolve_repo(
    table: &mut SymbolTable,
    extractions: &[FileExtraction],
    ctx: &RepoContext,
) -> Vec<Edge> {
    let resolvers = resolvers_for(ctx);
    let mut edges = Vec::new();

    // Pass 1: imports. Bindings are collected against the read-only table
    // and applied together, since imports never resolve through aliases.
    let mut bindings: Vec<(String, String, ImportTarget)> = Vec::new();
    for extraction in extractions {
        let resolver = match resolvers.get(&extraction.language) {
            Some(r) => r,
            None => continue,
        };
        let file_ref = extraction.file_node.node_ref();
        for imp in &extraction.imports {
            let resolved = resolver.resolve_import(table, &extraction.rel_path, imp);
            if let Some(binding) = &resolved.binding {
                bindings.push((
                    extraction.rel_path.clone(),
                    binding.clone(),
                    match resolved.target.kind {
                        NodeKind::Unparsed => ImportTarget::Unparsed(resolved.target.name.clone()),
                        _ => ImportTarget::Node(resolved.target.clone()),
                    },
                ));
            }
            let mut edge = Edge::new(EdgeKind::Imports, file_ref.clone(), resolved.target);
            edge.import = resolved.import;
            edge.alias = resolved.alias;
            edges.push(edge);
        }
    }
    for (file, binding, target) in bindings {
        table.aliases_mut(&file).insert(binding, target);
    }

    // Pass 2: inheritance.
    for extraction in extractions {
        let resolver = match resolvers.get(&extraction.language) {
            Some(r) => r,
            None => continue,
        };
        for inherit in &extraction.inherits {
            let from = match table.node_by_key(&inherit.class_key) {
                Some(r) => r.clone(),
                None => continue,
            };
            let to = resolver.resolve_superclass(table, &extraction.rel_path, &inherit.superclass);
            edges.push(Edge::new(EdgeKind::Inherits, from, to));
        }
    }

    // Pass 3: references.
    for extraction in extractions {
        let resolver = match resolvers.get(&extraction.language) {
            Some(r) => r,
            None => continue,
        };
        for reference in &extraction.references {
            let from = match table.node_by_key(&reference.from) {
                Some(r) => r.clone(),
                None => continue,
            };
            let owner = owner_key(&reference.from);
            let target = match resolver.resolve_reference(
                table,
                &extraction.rel_path,
                owner.as_deref(),
                reference,
            ) {
                Some(t) => t,
                None => continue,
            };

            // Type references that cannot be bound carry no information;
            // everything else falls back to the Unparsed bucket.
            if reference.role == ReferenceRole::TypeRef && target.kind == NodeKind::Unparsed {
                continue;
            }
            // References to whole files say nothing about code structure.
            if target.kind == NodeKind::File || target == from {
                continue;
            }
            edges.push(Edge::new(EdgeKind::References, from, target));
        }
    }

    edges
}

/// Key of the class containing a method key, if any:
/// `a.py#A.run` -> `a.py#A`.
fn owner_key(def_key: &str) -> Option<String> {
    let (file, local) = def_key.split_once('#')?;
    let (owner, _) = local.rsplit_once('.')?;
    Some(format!("{file}#{owner}"))
}

fn resolvers_for(ctx: &RepoContext) -> HashMap<Language, Box<dyn LanguageResolver>> {
    let mut map: HashMap<Language, Box<dyn LanguageResolver>> = HashMap::new();
    map.insert(Language::Python, Box::new(PythonResolver));
    map.insert(
        Language::Go,
        Box::new(GoResolver {
            module_path: ctx.go_module_path.clone(),
        }),
    );
    map.insert(Language::TypeScript, Box::new(ScriptResolver));
    map.insert(Language::JavaScript, Box::new(ScriptResolver));
    map
}

// ---------------------------------------------------------------------
// Shared lookup helpers
// ---------------------------------------------------------------------

/// Narrow a resolved base node by the remaining path segments.
///
/// `original` is the dotted reconstruction of the whole path, used to
/// name the Unparsed fallback.
fn member_of(
    table: &SymbolTable,
    base: &NodeRef,
    rest: &[String],
    original: &str,
) -> Option<NodeRef> {
    if rest.is_empty() {
        return Some(base.clone());
    }

    match base.kind {
        NodeKind::File => {
            let key = format!("{}#{}", base.name, rest.join("."));
            Some(
                table
                    .node_by_key(&key)
                    .cloned()
                    .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, key)),
            )
        }
        NodeKind::Class | NodeKind::Interface => {
            let key = format!("{}.{}", base.name, rest.join("."));
            Some(
                table
                    .node_by_key(&key)
                    .cloned()
                    .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, key)),
            )
        }
        NodeKind::Directory => match table.package_defs.get(&base.name) {
            Some(defs) => match defs.get(&rest[0]) {
                Some(def) => member_of(table, def, &rest[1..], original),
                None => Some(NodeRef::new(NodeKind::Unparsed, original.to_string())),
            },
            None => Some(NodeRef::new(NodeKind::Unparsed, original.to_string())),
        },
        NodeKind::Unparsed => Some(NodeRef::new(
            NodeKind::Unparsed,
            format!("{}.{}", base.name, rest.join(".")),
        )),
        // Members of functions and variables need dataflow to resolve;
        // out of reach for a syntactic index.
        NodeKind::Function | NodeKind::Variable | NodeKind::OtherType => None,
    }
}

/// Import-alias lookup with progressive joining: `a.b.c` first tries the
/// binding `a.b.c`, then `a.b`, then `a`.
fn alias_lookup<'t>(
    table: &'t SymbolTable,
    file: &str,
    name_path: &[String],
) -> Option<(&'t ImportTarget, usize)> {
    let index = table.file_index(file)?;
    for take in (1..=name_path.len()).rev() {
        let joined = name_path[..take].join(".");
        if let Some(target) = index.aliases.get(&joined) {
            return Some((target, take));
        }
    }
    None
}

/// Local definition lookup on the first segment, then member narrowing.
fn local_lookup(
    table: &SymbolTable,
    file: &str,
    name_path: &[String],
    original: &str,
) -> Option<NodeRef> {
    let index = table.file_index(file)?;
    let base = index.defs.get(&name_path[0])?;
    member_of(table, base, &name_path[1..], original)
}

/// The shared rule chain: local, alias, global-unique, Unparsed-if-
/// qualified. Go inserts its same-package rule via `package_first`.
fn resolve_common(
    table: &SymbolTable,
    file: &str,
    name_path: &[String],
    package_lookup: bool,
) -> Option<NodeRef> {
    let original = name_path.join(".");

    if let Some(found) = local_lookup(table, file, name_path, &original) {
        return Some(found);
    }

    if let Some((target, consumed)) = alias_lookup(table, file, name_path) {
        let base = target.node_ref();
        return member_of(table, &base, &name_path[consumed..], &original);
    }

    if package_lookup {
        if let Some(def) = table.package_def(file, &name_path[0]) {
            return member_of(table, &def.clone(), &name_path[1..], &original);
        }
    }

    if let Some(def) = table.global_unique(&name_path[0]) {
        return member_of(table, &def.clone(), &name_path[1..], &original);
    }

    // A bare unmatched identifier is almost always a local binding and
    // carries no cross-file information; qualified chains become
    // Unparsed placeholders.
    if name_path.len() >= 2 {
        Some(NodeRef::new(NodeKind::Unparsed, original))
    } else {
        None
    }
}

/// `self.m` / `this.m` receiver references bind to members of the
/// enclosing class.
fn receiver_reference(
    table: &SymbolTable,
    owner: Option<&str>,
    name_path: &[String],
) -> Option<NodeRef> {
    let owner = owner?;
    if name_path.len() < 2 {
        return None;
    }
    let key = format!("{}.{}", owner, name_path[1..].join("."));
    table.node_by_key(&key).cloned()
}

// ---------------------------------------------------------------------
// Python
// ---------------------------------------------------------------------

struct PythonResolver;

impl PythonResolver {
    /// Locate the file implementing a dotted module path, trying
    /// `a/b.py` then `a/b/__init__.py`.
    fn module_file<'t>(table: &'t SymbolTable, module: &str) -> Option<&'t NodeRef> {
        let base = module.trim_start_matches('.').replace('.', "/");
        if base.is_empty() {
            return None;
        }
        let candidates = [format!("{base}.py"), format!("{base}/__init__.py")];
        candidates
            .iter()
            .find_map(|candidate| table.file_nodes.get(candidate))
    }

    /// Turn a relative module (`.sibling`, `..pkg.mod`) into an absolute
    /// dotted module path using the importing file's directory.
    fn absolute_module(file: &str, module: &str) -> String {
        let level = module.chars().take_while(|c| *c == '.').count();
        if level == 0 {
            return module.to_string();
        }
        let rest = &module[level..];

        let mut dir = crate::symbols::parent_dir(file);
        for _ in 0..level - 1 {
            dir = match dir.rsplit_once('/') {
                Some((parent, _)) => parent.to_string(),
                None => ".".to_string(),
            };
        }

        let mut parts: Vec<&str> = Vec::new();
        if dir != "." {
            parts.extend(dir.split('/'));
        }
        if !rest.is_empty() {
            parts.extend(rest.split('.'));
        }
        parts.join(".")
    }
}

impl LanguageResolver for PythonResolver {
    fn resolve_import(
        &self,
        table: &SymbolTable,
        file: &str,
        imp: &PendingImport,
    ) -> ResolvedImport {
        let module = Self::absolute_module(file, &imp.source);

        match &imp.symbol {
            None => {
                // import a.b [as c]
                let target = match Self::module_file(table, &module) {
                    Some(file_ref) => file_ref.clone(),
                    None => match module.rsplit_once('.') {
                        // import a.b.attr may name an attribute of module a.b
                        Some((parent, attr)) => match Self::module_file(table, parent) {
                            Some(file_ref) => {
                                let key = format!("{}#{}", file_ref.name, attr);
                                table
                                    .node_by_key(&key)
                                    .cloned()
                                    .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, &module))
                            }
                            None => NodeRef::new(NodeKind::Unparsed, &module),
                        },
                        None => NodeRef::new(NodeKind::Unparsed, &module),
                    },
                };
                let binding = imp.alias.clone().unwrap_or_else(|| module.clone());
                ResolvedImport {
                    target,
                    import: Some(imp.source.clone()),
                    alias: Some(binding.clone()),
                    binding: Some(binding),
                }
            }
            Some(symbol) => {
                // from a.b import C [as D]
                let raw = format!("{module}.{symbol}");
                let target = match Self::module_file(table, &module) {
                    Some(file_ref) => {
                        let key = format!("{}#{}", file_ref.name, symbol);
                        table
                            .node_by_key(&key)
                            .cloned()
                            .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, &raw))
                    }
                    None => NodeRef::new(NodeKind::Unparsed, &raw),
                };
                let binding = imp.alias.clone().unwrap_or_else(|| symbol.clone());
                ResolvedImport {
                    target,
                    import: Some(symbol.clone()),
                    alias: Some(binding.clone()),
                    binding: Some(binding),
                }
            }
        }
    }

    fn resolve_superclass(&self, table: &SymbolTable, file: &str, raw: &str) -> NodeRef {
        let name_path = crate::extract::split_name_path(raw);
        if name_path.is_empty() {
            return NodeRef::new(NodeKind::Unparsed, raw.to_string());
        }
        match resolve_common(table, file, &name_path, false) {
            Some(target) => target,
            None => NodeRef::new(NodeKind::Unparsed, raw.to_string()),
        }
    }

    fn resolve_reference(
        &self,
        table: &SymbolTable,
        file: &str,
        owner: Option<&str>,
        reference: &RawReference,
    ) -> Option<NodeRef> {
        if reference.name_path[0] == "self" {
            return receiver_reference(table, owner, &reference.name_path);
        }
        resolve_common(table, file, &reference.name_path, false)
    }
}

// ---------------------------------------------------------------------
// Go
// ---------------------------------------------------------------------

struct GoResolver {
    module_path: Option<String>,
}

impl LanguageResolver for GoResolver {
    fn resolve_import(
        &self,
        table: &SymbolTable,
        _file: &str,
        imp: &PendingImport,
    ) -> ResolvedImport {
        let package_name = imp
            .source
            .rsplit('/')
            .next()
            .unwrap_or(&imp.source)
            .to_string();
        let binding = imp.alias.clone().unwrap_or_else(|| package_name.clone());

        // Imports inside the repo's module resolve to Directory nodes;
        // everything else (stdlib, third-party) is Unparsed.
        let target = self
            .module_path
            .as_deref()
            .and_then(|module| imp.source.strip_prefix(module))
            .map(|rel| {
                let rel = rel.trim_start_matches('/');
                if rel.is_empty() {
                    ".".to_string()
                } else {
                    rel.to_string()
                }
            })
            .and_then(|dir| table.dir_nodes.get(&dir).cloned())
            .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, imp.source.clone()));

        ResolvedImport {
            target,
            import: Some(package_name),
            alias: Some(binding.clone()),
            binding: Some(binding),
        }
    }

    fn resolve_superclass(&self, table: &SymbolTable, file: &str, raw: &str) -> NodeRef {
        let name_path = crate::extract::split_name_path(raw);
        if name_path.is_empty() {
            return NodeRef::new(NodeKind::Unparsed, raw.to_string());
        }
        match resolve_common(table, file, &name_path, true) {
            Some(target) => target,
            None => NodeRef::new(NodeKind::Unparsed, raw.to_string()),
        }
    }

    fn resolve_reference(
        &self,
        table: &SymbolTable,
        file: &str,
        _owner: Option<&str>,
        reference: &RawReference,
    ) -> Option<NodeRef> {
        resolve_common(table, file, &reference.name_path, true)
    }
}

// ---------------------------------------------------------------------
// TypeScript / JavaScript
// ---------------------------------------------------------------------

struct ScriptResolver;

impl ScriptResolver {
    /// Resolve a relative import source against the importing file's
    /// directory, trying the extension and index-file candidates.
    fn source_file<'t>(table: &'t SymbolTable, file: &str, source: &str) -> Option<&'t NodeRef> {
        if !source.starts_with("./") && !source.starts_with("../") {
            return None;
        }

        let dir = crate::symbols::parent_dir(file);
        let mut parts: Vec<&str> = if dir == "." {
            Vec::new()
        } else {
            dir.split('/').collect()
        };
        for segment in source.split('/') {
            match segment {
                "." | "" => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        let base = parts.join("/");
        if base.is_empty() {
            return None;
        }

        let candidates = [
            base.clone(),
            format!("{base}.ts"),
            format!("{base}.js"),
            format!("{base}/index.d.ts"),
            format!("{base}/index.ts"),
            format!("{base}/index.js"),
        ];
        candidates
            .iter()
            .find_map(|candidate| table.file_nodes.get(candidate))
    }
}

impl LanguageResolver for ScriptResolver {
    fn resolve_import(
        &self,
        table: &SymbolTable,
        file: &str,
        imp: &PendingImport,
    ) -> ResolvedImport {
        let module = Self::source_file(table, file, &imp.source);

        let target = match (&module, &imp.symbol) {
            // import { A } from './x': bind the named definition.
            (Some(file_ref), Some(symbol))
                if symbol.as_str() != crate::extract::typescript::DEFAULT_EXPORT_SYMBOL =>
            {
                let key = format!("{}#{}", file_ref.name, symbol);
                table
                    .node_by_key(&key)
                    .cloned()
                    .unwrap_or_else(|| NodeRef::new(NodeKind::Unparsed, key))
            }
            // Namespace and default imports bind the module itself.
            (Some(file_ref), _) => (*file_ref).clone(),
            (None, _) => NodeRef::new(NodeKind::Unparsed, imp.source.clone()),
        };

        let binding = imp
            .alias
            .clone()
            .or_else(|| imp.symbol.clone())
            .filter(|b| b.as_str() != crate::extract::typescript::DEFAULT_EXPORT_SYMBOL);
        ResolvedImport {
            target,
            import: imp.symbol.clone().or_else(|| Some(imp.source.clone())),
            alias: binding.clone().or_else(|| imp.alias.clone()),
            binding,
        }
    }

    fn resolve_superclass(&self, table: &SymbolTable, file: &str, raw: &str) -> NodeRef {
        let name_path = crate::extract::split_name_path(raw);
        if name_path.is_empty() {
            return NodeRef::new(NodeKind::Unparsed, raw.to_string());
        }
        match resolve_common(table, file, &name_path, false) {
            Some(target) => target,
            None => NodeRef::new(NodeKind::Unparsed, raw.to_string()),
        }
    }

    fn resolve_reference(
        &self,
        table: &SymbolTable,
        file: &str,
        owner: Option<&str>,
        reference: &RawReference,
    ) -> Option<NodeRef> {
        if reference.name_path[0] == "this" {
            return receiver_reference(table, owner, &reference.name_path);
        }
        resolve_common(table, file, &reference.name_path, false)
    }
}
