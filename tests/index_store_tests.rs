//! Persistent indexing tests: idempotence, incremental runs and clean.

use std::fs;
use std::path::Path;

use meridian::{CodeGraph, EdgeKind, IndexConfig, NodeKind};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn mixed_repo() -> TempDir {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "lib.py", "class Thing:\n    pass\n");
    write(
        repo.path(),
        "app.py",
        "from lib import Thing\n\ndef make():\n    return Thing()\n",
    );
    write(
        repo.path(),
        "main.go",
        "package main\n\nimport \"time\"\n\nfunc run() {\n\ttime.Now()\n}\n",
    );
    repo
}

#[test]
fn test_index_populates_store() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let mut graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    let stats = graph.index(&[], false).unwrap();

    assert_eq!(stats.files, 3);
    assert!(!stats.cancelled);
    assert_eq!(graph.count_nodes().unwrap(), stats.nodes);
    assert_eq!(graph.count_edges().unwrap(), stats.edges);

    let thing = graph.node_by_name("lib.py#Thing").unwrap().unwrap();
    assert_eq!(thing.kind, NodeKind::Class);
    assert_eq!(thing.language, meridian::Language::Python);
}

#[test]
fn test_reindex_is_idempotent() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let mut graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    graph.index(&[], false).unwrap();
    let nodes_before = graph.count_nodes().unwrap();
    let edges_before = graph.count_edges().unwrap();

    graph.index(&[], false).unwrap();

    assert_eq!(graph.count_nodes().unwrap(), nodes_before);
    assert_eq!(graph.count_edges().unwrap(), edges_before);
}

#[test]
fn test_unparsed_deduplicated_in_store() {
    let repo = TempDir::new().unwrap();
    write(
        repo.path(),
        "a.go",
        "package main\n\nimport \"fmt\"\n\nfunc a() {\n\tfmt.Println(\"a\")\n}\n",
    );
    write(
        repo.path(),
        "b.go",
        "package main\n\nimport \"fmt\"\n\nfunc b() {\n\tfmt.Println(\"b\")\n}\n",
    );

    let db = TempDir::new().unwrap();
    let mut graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    graph.index(&[], false).unwrap();

    let unparsed = graph.nodes_by_kind(NodeKind::Unparsed).unwrap();
    let fmt_count = unparsed.iter().filter(|n| n.name == "fmt").count();
    let println_count = unparsed.iter().filter(|n| n.name == "fmt.Println").count();
    assert_eq!(fmt_count, 1);
    assert_eq!(println_count, 1);
}

#[test]
fn test_neighbors_query_after_reopen() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    {
        let mut graph =
            CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
        graph.index(&[], false).unwrap();
    }

    // A fresh CodeGraph over the same database sees the same graph.
    let graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    let children = graph
        .neighbors_out(NodeKind::File, "lib.py", EdgeKind::Contains)
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name, "lib.py#Thing");
}

#[test]
fn test_incremental_reindex_of_changed_file() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let mut graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    graph.index(&[], false).unwrap();
    assert!(graph.node_by_name("lib.py#Thing").unwrap().is_some());

    // Rename the class and re-index just that file.
    write(repo.path(), "lib.py", "class Gadget:\n    pass\n");
    graph
        .index(&[repo.path().join("lib.py")], true)
        .unwrap();

    assert!(graph.node_by_name("lib.py#Gadget").unwrap().is_some());
    assert!(graph.node_by_name("lib.py#Thing").unwrap().is_none());
    // Facts from other files survive an incremental run.
    assert!(graph.node_by_name("app.py#make").unwrap().is_some());
}

#[test]
fn test_clean_drops_contents() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let mut graph = CodeGraph::new(db.path(), repo.path(), IndexConfig::default()).unwrap();
    graph.index(&[], false).unwrap();
    assert!(graph.count_nodes().unwrap() > 0);

    graph.clean(false).unwrap();
    assert_eq!(graph.count_nodes().unwrap(), 0);
    assert_eq!(graph.count_edges().unwrap(), 0);
}

#[test]
fn test_clean_delete_dir_removes_directory() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();
    let db_dir = db.path().join("graph");

    let mut graph = CodeGraph::new(&db_dir, repo.path(), IndexConfig::default()).unwrap();
    graph.index(&[], false).unwrap();
    assert!(db_dir.exists());

    graph.clean(true).unwrap();
    assert!(!db_dir.exists());
}

#[test]
fn test_language_allow_list_limits_graph() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let config = IndexConfig::default().languages(vec![meridian::Language::Go]);
    let mut graph = CodeGraph::new(db.path(), repo.path(), config).unwrap();
    let stats = graph.index(&[], false).unwrap();

    assert_eq!(stats.files, 1);
    assert!(graph.node_by_name("main.go").unwrap().is_some());
    assert!(graph.node_by_name("lib.py").unwrap().is_none());
}

#[test]
fn test_invalid_config_fails_before_io() {
    let repo = mixed_repo();
    let db = TempDir::new().unwrap();

    let config = IndexConfig::default().ignore_patterns(vec!["a[".to_string()]);
    let result = CodeGraph::new(db.path(), repo.path(), config);
    assert!(matches!(
        result,
        Err(meridian::MeridianError::InvalidConfig(_))
    ));
}
