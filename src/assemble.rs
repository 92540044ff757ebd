//! Graph assembly.
//!
//! Materialises resolved nodes and edges into deduplicated collections
//! whose endpoint kinds satisfy the schema, then hands them over in
//! dependency order: directories before files before definitions before
//! Unparsed placeholders before edges.

use std::collections::{HashMap, HashSet};

use crate::model::{Edge, EdgeKind, Node, NodeKind, NodeRef};

/// Node and edge batches in upsert dependency order.
#[derive(Debug, Default)]
pub struct GraphBatches {
    pub directories: Vec<Node>,
    pub files: Vec<Node>,
    pub definitions: Vec<Node>,
    pub unparsed: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphBatches {
    /// All nodes in upsert order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.directories
            .iter()
            .chain(self.files.iter())
            .chain(self.definitions.iter())
            .chain(self.unparsed.iter())
    }

    pub fn node_count(&self) -> usize {
        self.directories.len() + self.files.len() + self.definitions.len() + self.unparsed.len()
    }
}

/// Accumulates nodes and edges, enforcing key uniqueness and the schema's
/// endpoint-kind table.
#[derive(Debug, Default)]
pub struct Assembler {
    nodes: Vec<Node>,
    node_index: HashMap<(NodeKind, String), usize>,
    edges: Vec<Edge>,
    edge_keys: HashSet<(EdgeKind, String, String, String, String)>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; the first node wins a contested `(kind, name)` key.
    pub fn add_node(&mut self, node: Node) {
        let key = (node.kind, node.name.clone());
        if self.node_index.contains_key(&key) {
            return;
        }
        self.node_index.insert(key, self.nodes.len());
        self.nodes.push(node);
    }

    /// True if `(kind, name)` is already present.
    pub fn has_node(&self, kind: NodeKind, name: &str) -> bool {
        self.node_index.contains_key(&(kind, name.to_string()))
    }

    /// Add an edge, validating its endpoint kinds against the schema.
    ///
    /// An edge whose target kind violates the table is coerced to an
    /// Unparsed target; an edge whose source kind violates it is dropped
    /// with a warning. Unparsed targets are created on demand and
    /// deduplicated by name.
    pub fn add_edge(&mut self, mut edge: Edge) {
        if !edge.kind.allows(edge.from.kind, edge.to.kind) {
            // Try coercing the target; if the pair is still invalid the
            // source side is at fault and the edge cannot be stored.
            let coerced = NodeRef::new(NodeKind::Unparsed, edge.to.name.clone());
            if edge.kind.allows(edge.from.kind, coerced.kind) {
                log::warn!(
                    "schema violation on {} edge {} -> {}: coercing target {} to Unparsed",
                    edge.kind,
                    edge.from.name,
                    edge.to.name,
                    edge.to.kind,
                );
                edge.to = coerced;
            } else {
                log::warn!(
                    "schema violation on {} edge {} ({}) -> {} ({}): dropping edge",
                    edge.kind,
                    edge.from.name,
                    edge.from.kind,
                    edge.to.name,
                    edge.to.kind,
                );
                return;
            }
        }

        if !self.edge_keys.insert((
            edge.kind,
            edge.from.name.clone(),
            edge.to.name.clone(),
            edge.import.clone().unwrap_or_default(),
            edge.alias.clone().unwrap_or_default(),
        )) {
            return;
        }

        // An Unparsed node exists iff an edge references it.
        if edge.to.kind == NodeKind::Unparsed && !self.has_node(NodeKind::Unparsed, &edge.to.name)
        {
            self.add_node(Node::from_kind_and_name(NodeKind::Unparsed, edge.to.name.clone()));
        }

        self.edges.push(edge);
    }

    /// Finish assembly, dropping edges whose endpoints never materialised
    /// and batching nodes by kind in dependency order.
    pub fn into_batches(self) -> GraphBatches {
        let mut batches = GraphBatches::default();

        let present: HashSet<(NodeKind, &str)> = self
            .nodes
            .iter()
            .map(|n| (n.kind, n.name.as_str()))
            .collect();

        for node in &self.nodes {
            match node.kind {
                NodeKind::Directory => batches.directories.push(node.clone()),
                NodeKind::File => batches.files.push(node.clone()),
                NodeKind::Unparsed => batches.unparsed.push(node.clone()),
                _ => batches.definitions.push(node.clone()),
            }
        }

        for edge in self.edges {
            let from_ok = present.contains(&(edge.from.kind, edge.from.name.as_str()));
            let to_ok = present.contains(&(edge.to.kind, edge.to.name.as_str()));
            if !from_ok || !to_ok {
                log::warn!(
                    "dropping {} edge {} -> {}: endpoint node missing",
                    edge.kind,
                    edge.from.name,
                    edge.to.name,
                );
                continue;
            }
            batches.edges.push(edge);
        }

        batches
    }
}

/// A directory node with no span or code.
pub fn directory_node(name: &str) -> Node {
    Node::from_kind_and_name(NodeKind::Directory, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_ref(name: &str) -> NodeRef {
        NodeRef::new(NodeKind::File, name)
    }

    fn class_ref(name: &str) -> NodeRef {
        NodeRef::new(NodeKind::Class, name)
    }

    #[test]
    fn test_node_dedup_first_wins() {
        let mut assembler = Assembler::new();
        let mut first = Node::from_kind_and_name(NodeKind::Class, "a.py#A");
        first.start_line = 1;
        let mut second = Node::from_kind_and_name(NodeKind::Class, "a.py#A");
        second.start_line = 99;

        assembler.add_node(first);
        assembler.add_node(second);

        let batches = assembler.into_batches();
        assert_eq!(batches.definitions.len(), 1);
        assert_eq!(batches.definitions[0].start_line, 1);
    }

    #[test]
    fn test_same_name_different_kind_allowed() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::Directory, "time"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::Unparsed, "time"));

        let batches = assembler.into_batches();
        assert_eq!(batches.node_count(), 2);
    }

    #[test]
    fn test_edge_dedup() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.py"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::Class, "a.py#A"));

        let edge = Edge::new(EdgeKind::Contains, file_ref("a.py"), class_ref("a.py#A"));
        assembler.add_edge(edge.clone());
        assembler.add_edge(edge);

        assert_eq!(assembler.into_batches().edges.len(), 1);
    }

    #[test]
    fn test_import_metadata_distinguishes_edges() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.py"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "b.py"));

        let mut first = Edge::new(EdgeKind::Imports, file_ref("a.py"), file_ref("b.py"));
        first.import = Some("b".to_string());
        first.alias = Some("b".to_string());
        let mut second = first.clone();
        second.alias = Some("bee".to_string());

        assembler.add_edge(first);
        assembler.add_edge(second);

        assert_eq!(assembler.into_batches().edges.len(), 2);
    }

    #[test]
    fn test_invalid_target_coerced_to_unparsed() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::Class, "a.py#Sub"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::Interface, "a.py#Base"));

        // Class INHERITS Interface is not in the schema; target coerces.
        assembler.add_edge(Edge::new(
            EdgeKind::Inherits,
            class_ref("a.py#Sub"),
            NodeRef::new(NodeKind::Interface, "a.py#Base"),
        ));

        let batches = assembler.into_batches();
        assert_eq!(batches.edges.len(), 1);
        assert_eq!(batches.edges[0].to.kind, NodeKind::Unparsed);
        assert_eq!(batches.unparsed.len(), 1);
        assert_eq!(batches.unparsed[0].name, "a.py#Base");
    }

    #[test]
    fn test_invalid_source_dropped() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.py"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::Class, "a.py#A"));

        // REFERENCES cannot originate from a File.
        assembler.add_edge(Edge::new(
            EdgeKind::References,
            file_ref("a.py"),
            class_ref("a.py#A"),
        ));

        assert!(assembler.into_batches().edges.is_empty());
    }

    #[test]
    fn test_unparsed_created_on_demand_and_deduplicated() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.go"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "b.go"));

        let unparsed = NodeRef::new(NodeKind::Unparsed, "time");
        let mut first = Edge::new(EdgeKind::Imports, file_ref("a.go"), unparsed.clone());
        first.import = Some("time".to_string());
        let mut second = Edge::new(EdgeKind::Imports, file_ref("b.go"), unparsed);
        second.import = Some("time".to_string());

        assembler.add_edge(first);
        assembler.add_edge(second);

        let batches = assembler.into_batches();
        assert_eq!(batches.unparsed.len(), 1);
        assert_eq!(batches.edges.len(), 2);
    }

    #[test]
    fn test_edge_with_missing_endpoint_dropped() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.py"));

        assembler.add_edge(Edge::new(
            EdgeKind::Contains,
            file_ref("a.py"),
            class_ref("a.py#Ghost"),
        ));

        assert!(assembler.into_batches().edges.is_empty());
    }

    #[test]
    fn test_batches_in_dependency_order() {
        let mut assembler = Assembler::new();
        assembler.add_node(Node::from_kind_and_name(NodeKind::Class, "a.py#A"));
        assembler.add_node(Node::from_kind_and_name(NodeKind::File, "a.py"));
        assembler.add_node(directory_node("."));

        let batches = assembler.into_batches();
        let order: Vec<NodeKind> = batches.nodes().map(|n| n.kind).collect();
        assert_eq!(
            order,
            vec![NodeKind::Directory, NodeKind::File, NodeKind::Class]
        );
    }
}
