//! Graph store adapter.
//!
//! Wraps the embedded sqlitegraph database: opens or creates the store
//! under a configurable directory, bulk-loads nodes and edges, and
//! answers the typed queries the pipeline and the public API need. The
//! adapter owns no business logic; schema enforcement happens upstream
//! in the assembler.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context};
use sqlitegraph::{
    BackendDirection, EdgeSpec, GraphBackend, NeighborQuery, NodeSpec, SnapshotId,
    SqliteGraphBackend,
};

use crate::error::{MeridianError, Result};
use crate::model::{Edge, EdgeKind, Node, NodeKind};

/// Database file name inside the store directory.
const DB_FILE_NAME: &str = "graph.db";

/// Persistent graph store for one database directory.
pub struct GraphStore {
    backend: Rc<SqliteGraphBackend>,
    db_dir: PathBuf,
    db_file: PathBuf,
    /// `(kind, name)` -> entity id, kept in sync with the database.
    node_index: HashMap<(NodeKind, String), i64>,
    /// Existing edges, for idempotent edge insertion across runs.
    edge_keys: std::collections::HashSet<(i64, i64, String, String, String)>,
}

impl GraphStore {
    /// Open (creating if necessary) the store at `db_dir`.
    pub fn open(db_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(db_dir).map_err(|e| MeridianError::io(db_dir, e))?;
        let db_file = db_dir.join(DB_FILE_NAME);

        let graph = sqlitegraph::SqliteGraph::open(&db_file).map_err(MeridianError::store)?;
        let backend = Rc::new(SqliteGraphBackend::from_graph(graph));

        let mut store = Self {
            backend,
            db_dir: db_dir.to_path_buf(),
            db_file,
            node_index: HashMap::new(),
            edge_keys: std::collections::HashSet::new(),
        };
        store.rebuild_indices().map_err(MeridianError::store)?;
        Ok(store)
    }

    /// Rebuild the in-memory node and edge indices from the database.
    fn rebuild_indices(&mut self) -> anyhow::Result<()> {
        self.node_index.clear();
        self.edge_keys.clear();

        for id in self.backend.entity_ids()? {
            let entity = match self.backend.get_node(SnapshotId::current(), id) {
                Ok(entity) => entity,
                Err(_) => continue,
            };
            let kind = match NodeKind::parse_tag(&entity.kind) {
                Some(kind) => kind,
                None => continue,
            };
            if let Ok(node) = serde_json::from_value::<Node>(entity.data) {
                self.node_index.insert((kind, node.name), id);
            }
        }

        // Edge payloads are only reachable through SQL; read them from
        // the backing file directly (no backend write is in flight here).
        let conn = rusqlite::Connection::open_with_flags(
            &self.db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        let mut stmt = conn.prepare("SELECT from_id, to_id, edge_type, data FROM graph_edges")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (from, to, edge_type, data) = row?;
            let payload: serde_json::Value =
                serde_json::from_str(&data).unwrap_or(serde_json::Value::Null);
            let import = payload
                .get("import")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let alias = payload
                .get("alias")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            self.edge_keys.insert((from, to, edge_type, import, alias));
        }

        Ok(())
    }

    /// Forget cached edge keys touching a deleted entity; SQLite may
    /// reuse its row id.
    fn purge_edges_touching(&mut self, id: i64) {
        self.edge_keys
            .retain(|(from, to, _, _, _)| *from != id && *to != id);
    }

    /// Upsert a batch of nodes. An existing `(kind, name)` node is
    /// replaced; its edges are cascade-deleted with it.
    pub fn bulk_upsert_nodes(&mut self, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            self.upsert_node(node).map_err(MeridianError::store)?;
        }
        Ok(())
    }

    fn upsert_node(&mut self, node: &Node) -> anyhow::Result<i64> {
        let key = (node.kind, node.name.clone());
        if let Some(&existing) = self.node_index.get(&key) {
            // An unchanged node keeps its entity (and its edges);
            // replacing it cascade-deletes every edge it touches.
            if self
                .backend
                .get_node(SnapshotId::current(), existing)
                .ok()
                .and_then(|entity| serde_json::from_value::<Node>(entity.data).ok())
                .as_ref()
                == Some(node)
            {
                return Ok(existing);
            }
            self.backend.graph().delete_entity(existing)?;
            self.purge_edges_touching(existing);
        }

        let file_path = node.name.split_once('#').map(|(file, _)| file.to_string());
        let spec = NodeSpec {
            kind: node.kind.as_str().to_string(),
            name: node.name.clone(),
            file_path: match node.kind {
                NodeKind::File => Some(node.name.clone()),
                _ => file_path,
            },
            data: serde_json::to_value(node)?,
        };

        let id = self.backend.insert_node(spec)?;
        self.node_index.insert(key, id);
        Ok(id)
    }

    /// Insert a batch of edges. Endpoints must already be present; an
    /// edge with a missing endpoint is dropped with a warning.
    pub fn bulk_upsert_edges(&mut self, edges: &[Edge]) -> Result<()> {
        for edge in edges {
            let from = self
                .node_index
                .get(&(edge.from.kind, edge.from.name.clone()));
            let to = self.node_index.get(&(edge.to.kind, edge.to.name.clone()));

            let (from, to) = match (from, to) {
                (Some(&from), Some(&to)) => (from, to),
                _ => {
                    log::warn!(
                        "skipping {} edge {} -> {}: endpoint not in store",
                        edge.kind,
                        edge.from.name,
                        edge.to.name,
                    );
                    continue;
                }
            };

            let key = (
                from,
                to,
                edge.kind.as_str().to_string(),
                edge.import.clone().unwrap_or_default(),
                edge.alias.clone().unwrap_or_default(),
            );
            if !self.edge_keys.insert(key) {
                continue;
            }

            let spec = EdgeSpec {
                from,
                to,
                edge_type: edge.kind.as_str().to_string(),
                data: serde_json::json!({
                    "import": edge.import,
                    "alias": edge.alias,
                }),
            };
            self.backend.insert_edge(spec).map_err(MeridianError::store)?;
        }
        Ok(())
    }

    /// Look up a node by name, trying every kind.
    pub fn node_by_name(&self, name: &str) -> Result<Option<Node>> {
        for kind in ALL_NODE_KINDS {
            if let Some(node) = self.node(*kind, name)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    /// Look up a node by `(kind, name)`.
    pub fn node(&self, kind: NodeKind, name: &str) -> Result<Option<Node>> {
        let id = match self.node_index.get(&(kind, name.to_string())) {
            Some(&id) => id,
            None => return Ok(None),
        };
        self.read_node(id).map(Some)
    }

    /// All nodes of one kind, sorted by name.
    pub fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<Node>> {
        let mut ids: Vec<(String, i64)> = self
            .node_index
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|((_, name), &id)| (name.clone(), id))
            .collect();
        ids.sort();

        let mut nodes = Vec::with_capacity(ids.len());
        for (_, id) in ids {
            nodes.push(self.read_node(id)?);
        }
        Ok(nodes)
    }

    /// Outgoing neighbors of a node over one edge kind, sorted by name.
    pub fn neighbors_out(
        &self,
        kind: NodeKind,
        name: &str,
        edge_kind: EdgeKind,
    ) -> Result<Vec<Node>> {
        let id = match self.node_index.get(&(kind, name.to_string())) {
            Some(&id) => id,
            None => return Ok(Vec::new()),
        };

        let neighbor_ids = self
            .backend
            .neighbors(
                SnapshotId::current(),
                id,
                NeighborQuery {
                    direction: BackendDirection::Outgoing,
                    edge_type: Some(edge_kind.as_str().to_string()),
                },
            )
            .map_err(MeridianError::store)?;

        let mut nodes = Vec::with_capacity(neighbor_ids.len());
        for neighbor_id in neighbor_ids {
            nodes.push(self.read_node(neighbor_id)?);
        }
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(nodes)
    }

    fn read_node(&self, id: i64) -> Result<Node> {
        let entity = self
            .backend
            .get_node(SnapshotId::current(), id)
            .map_err(MeridianError::store)?;
        serde_json::from_value(entity.data)
            .with_context(|| format!("malformed node payload for entity {id}"))
            .map_err(MeridianError::store)
    }

    /// Total node count, read from the database.
    pub fn count_nodes(&self) -> Result<usize> {
        self.count_table("graph_entities")
    }

    /// Total edge count, read from the database.
    pub fn count_edges(&self) -> Result<usize> {
        self.count_table("graph_edges")
    }

    fn count_table(&self, table: &str) -> Result<usize> {
        // sqlitegraph exposes no count operation; open a read connection
        // on its SQLite file directly.
        let conn = rusqlite::Connection::open_with_flags(
            &self.db_file,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )
        .map_err(MeridianError::store)?;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .map_err(|e| MeridianError::store(anyhow!("count query on {table} failed: {e}")))?;
        Ok(count as usize)
    }

    /// Delete every node and edge, leaving an empty store.
    pub fn wipe(&mut self) -> Result<()> {
        for id in self.backend.entity_ids().map_err(MeridianError::store)? {
            self.backend
                .graph()
                .delete_entity(id)
                .map_err(MeridianError::store)?;
        }
        self.node_index.clear();
        self.edge_keys.clear();
        Ok(())
    }

    /// Delete a file's node and every definition extracted from it.
    /// Edges touching the deleted nodes are cascade-deleted.
    pub fn delete_file_facts(&mut self, rel_path: &str) -> Result<()> {
        let prefix = format!("{rel_path}#");
        let doomed: Vec<(NodeKind, String)> = self
            .node_index
            .keys()
            .filter(|(kind, name)| {
                (*kind == NodeKind::File && name == rel_path) || name.starts_with(&prefix)
            })
            .cloned()
            .collect();

        for key in doomed {
            if let Some(id) = self.node_index.remove(&key) {
                self.backend
                    .graph()
                    .delete_entity(id)
                    .map_err(MeridianError::store)?;
                self.purge_edges_touching(id);
            }
        }
        Ok(())
    }

    /// Drop all content and optionally remove the database directory.
    pub fn clean(&mut self, delete_dir: bool) -> Result<()> {
        self.wipe()?;
        if delete_dir {
            std::fs::remove_dir_all(&self.db_dir)
                .map_err(|e| MeridianError::io(&self.db_dir, e))?;
        }
        Ok(())
    }
}

const ALL_NODE_KINDS: &[NodeKind] = &[
    NodeKind::Directory,
    NodeKind::File,
    NodeKind::Class,
    NodeKind::Interface,
    NodeKind::Function,
    NodeKind::Variable,
    NodeKind::OtherType,
    NodeKind::Unparsed,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeRef;
    use tempfile::TempDir;

    fn sample_node(kind: NodeKind, name: &str) -> Node {
        let mut node = Node::from_kind_and_name(kind, name);
        node.start_line = 1;
        node.end_line = 2;
        node.code = format!("code of {name}");
        node
    }

    #[test]
    fn test_upsert_and_read_back() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[sample_node(NodeKind::File, "a.py")])
            .unwrap();

        let node = store.node_by_name("a.py").unwrap().unwrap();
        assert_eq!(node.kind, NodeKind::File);
        assert_eq!(node.code, "code of a.py");
        assert_eq!(store.count_nodes().unwrap(), 1);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[sample_node(NodeKind::File, "a.py")])
            .unwrap();
        let mut updated = sample_node(NodeKind::File, "a.py");
        updated.code = "new code".to_string();
        store.bulk_upsert_nodes(&[updated]).unwrap();

        assert_eq!(store.count_nodes().unwrap(), 1);
        let node = store.node_by_name("a.py").unwrap().unwrap();
        assert_eq!(node.code, "new code");
    }

    #[test]
    fn test_edges_and_neighbors() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[
                sample_node(NodeKind::File, "a.py"),
                sample_node(NodeKind::Class, "a.py#A"),
            ])
            .unwrap();
        store
            .bulk_upsert_edges(&[Edge::new(
                EdgeKind::Contains,
                NodeRef::new(NodeKind::File, "a.py"),
                NodeRef::new(NodeKind::Class, "a.py#A"),
            )])
            .unwrap();

        assert_eq!(store.count_edges().unwrap(), 1);
        let children = store
            .neighbors_out(NodeKind::File, "a.py", EdgeKind::Contains)
            .unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "a.py#A");
    }

    #[test]
    fn test_edge_with_missing_endpoint_skipped() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[sample_node(NodeKind::File, "a.py")])
            .unwrap();
        store
            .bulk_upsert_edges(&[Edge::new(
                EdgeKind::Contains,
                NodeRef::new(NodeKind::File, "a.py"),
                NodeRef::new(NodeKind::Class, "a.py#Ghost"),
            )])
            .unwrap();

        assert_eq!(store.count_edges().unwrap(), 0);
    }

    #[test]
    fn test_identical_upsert_preserves_edges() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        let nodes = [
            sample_node(NodeKind::File, "a.py"),
            sample_node(NodeKind::Class, "a.py#A"),
        ];
        let edge = Edge::new(
            EdgeKind::Contains,
            NodeRef::new(NodeKind::File, "a.py"),
            NodeRef::new(NodeKind::Class, "a.py#A"),
        );

        store.bulk_upsert_nodes(&nodes).unwrap();
        store.bulk_upsert_edges(&[edge.clone()]).unwrap();

        // Re-upserting identical facts changes nothing.
        store.bulk_upsert_nodes(&nodes).unwrap();
        store.bulk_upsert_edges(&[edge]).unwrap();

        assert_eq!(store.count_nodes().unwrap(), 2);
        assert_eq!(store.count_edges().unwrap(), 1);
    }

    #[test]
    fn test_index_survives_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let mut store = GraphStore::open(temp.path()).unwrap();
            store
                .bulk_upsert_nodes(&[sample_node(NodeKind::Class, "a.py#A")])
                .unwrap();
        }

        let store = GraphStore::open(temp.path()).unwrap();
        let node = store.node(NodeKind::Class, "a.py#A").unwrap();
        assert!(node.is_some());
    }

    #[test]
    fn test_delete_file_facts() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[
                sample_node(NodeKind::File, "a.py"),
                sample_node(NodeKind::Class, "a.py#A"),
                sample_node(NodeKind::File, "b.py"),
            ])
            .unwrap();
        store.delete_file_facts("a.py").unwrap();

        assert!(store.node_by_name("a.py").unwrap().is_none());
        assert!(store.node_by_name("a.py#A").unwrap().is_none());
        assert!(store.node_by_name("b.py").unwrap().is_some());
    }

    #[test]
    fn test_wipe_empties_store() {
        let temp = TempDir::new().unwrap();
        let mut store = GraphStore::open(temp.path()).unwrap();

        store
            .bulk_upsert_nodes(&[sample_node(NodeKind::File, "a.py")])
            .unwrap();
        store.wipe().unwrap();

        assert_eq!(store.count_nodes().unwrap(), 0);
        assert!(store.node_by_name("a.py").unwrap().is_none());
    }
}
