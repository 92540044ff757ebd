//! End-to-end TypeScript indexing tests over a two-file module pair.

use std::fs;
use std::path::Path;

use meridian::{Edge, EdgeKind, IndexConfig, NodeKind, ParseOutcome, Parser};
use tempfile::TempDir;

const TYPES_TS: &str = r#"export type UserID = number;

export interface User {
  id: UserID;
  name: string;
}

export class UserService {
  constructor() {
  }

  getUser(id: UserID): User | undefined {
    return undefined;
  }

  filterUsers(callback: Callback): void {
  }
}

export enum TaskStatus {
  Open,
  Done,
}

export type Callback = (user: User) => boolean;
"#;

const MAIN_TS: &str = r#"import { User, UserService, UserID, TaskStatus, Callback } from './types';

function fetchUserData(id: UserID): void {
  const service = new UserService();
}

function greetUser(user: User): string {
  return user.name;
}
"#;

fn write(root: &Path, rel: &str, content: &str) {
    fs::write(root.join(rel), content).unwrap();
}

fn demo_repo() -> TempDir {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "types.ts", TYPES_TS);
    write(repo.path(), "main.ts", MAIN_TS);
    repo
}

fn parse(root: &Path) -> ParseOutcome {
    let mut parser = Parser::new(root, IndexConfig::default()).unwrap();
    parser.parse(root).unwrap()
}

fn edge_strings(edges: &[Edge]) -> Vec<String> {
    let mut strings: Vec<String> = edges
        .iter()
        .map(|e| format!("{}-[{}]->{}", e.from.name, e.kind, e.to.name))
        .collect();
    strings.sort();
    strings
}

#[test]
fn test_node_set_and_kinds() {
    let repo = demo_repo();
    let outcome = parse(repo.path());

    let kind_of = |name: &str| -> NodeKind {
        outcome
            .nodes
            .iter()
            .find(|n| n.name == name)
            .unwrap_or_else(|| panic!("missing node {name}"))
            .kind
    };

    assert_eq!(kind_of("types.ts#User"), NodeKind::Interface);
    assert_eq!(kind_of("types.ts#UserService"), NodeKind::Class);
    assert_eq!(kind_of("types.ts#UserService.constructor"), NodeKind::Function);
    assert_eq!(kind_of("types.ts#UserService.getUser"), NodeKind::Function);
    assert_eq!(kind_of("types.ts#UserService.filterUsers"), NodeKind::Function);
    assert_eq!(kind_of("types.ts#UserID"), NodeKind::OtherType);
    assert_eq!(kind_of("types.ts#TaskStatus"), NodeKind::OtherType);
    assert_eq!(kind_of("types.ts#Callback"), NodeKind::OtherType);
    assert_eq!(kind_of("main.ts#fetchUserData"), NodeKind::Function);
    assert_eq!(kind_of("main.ts#greetUser"), NodeKind::Function);
}

#[test]
fn test_named_imports_resolve_to_definitions() {
    let repo = demo_repo();
    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    for target in [
        "types.ts#User",
        "types.ts#UserService",
        "types.ts#UserID",
        "types.ts#TaskStatus",
        "types.ts#Callback",
    ] {
        assert!(
            edges.contains(&format!("main.ts-[IMPORTS]->{target}")),
            "missing import edge to {target}"
        );
    }

    let user_import = outcome
        .edges
        .iter()
        .filter(|e| e.kind == EdgeKind::Imports)
        .find(|e| e.to.name == "types.ts#User")
        .unwrap();
    assert_eq!(user_import.import.as_deref(), Some("User"));
    assert_eq!(user_import.alias.as_deref(), Some("User"));
}

#[test]
fn test_references_from_functions_and_methods() {
    let repo = demo_repo();
    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    // new UserService() resolves through the import to the class.
    assert!(edges.contains(
        &"main.ts#fetchUserData-[REFERENCES]->types.ts#UserService".to_string()
    ));
    // Parameter types resolve through the import and locally.
    assert!(edges.contains(
        &"main.ts#fetchUserData-[REFERENCES]->types.ts#UserID".to_string()
    ));
    assert!(edges.contains(
        &"main.ts#greetUser-[REFERENCES]->types.ts#User".to_string()
    ));
    assert!(edges.contains(
        &"types.ts#UserService.getUser-[REFERENCES]->types.ts#UserID".to_string()
    ));
    assert!(edges.contains(
        &"types.ts#UserService.filterUsers-[REFERENCES]->types.ts#Callback".to_string()
    ));
}

#[test]
fn test_methods_contained_in_class() {
    let repo = demo_repo();
    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    for method in ["constructor", "getUser", "filterUsers"] {
        assert!(edges.contains(&format!(
            "types.ts#UserService-[CONTAINS]->types.ts#UserService.{method}"
        )));
    }
}

#[test]
fn test_extends_inheritance() {
    let repo = TempDir::new().unwrap();
    write(
        repo.path(),
        "models.ts",
        "class Base {\n}\n\nclass Sub extends Base {\n}\n\nclass Lost extends External {\n}\n",
    );

    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    assert!(edges.contains(&"models.ts#Sub-[INHERITS]->models.ts#Base".to_string()));
    assert!(edges.contains(&"models.ts#Lost-[INHERITS]->External".to_string()));

    let external = outcome.nodes.iter().find(|n| n.name == "External").unwrap();
    assert_eq!(external.kind, NodeKind::Unparsed);
}

#[test]
fn test_namespace_import_binds_module() {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "types.ts", "export class Service {\n}\n");
    write(
        repo.path(),
        "app.ts",
        "import * as types from './types';\n\nfunction run(): void {\n  const s = new types.Service();\n}\n",
    );

    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    // The namespace import binds the whole module file.
    assert!(edges.contains(&"app.ts-[IMPORTS]->types.ts".to_string()));
    // Qualified use resolves through the namespace into the module.
    assert!(edges.contains(&"app.ts#run-[REFERENCES]->types.ts#Service".to_string()));
}

#[test]
fn test_package_import_is_unparsed() {
    let repo = TempDir::new().unwrap();
    write(
        repo.path(),
        "app.ts",
        "import React from 'react';\n\nfunction render(): void {\n}\n",
    );

    let outcome = parse(repo.path());
    let import_edge = outcome
        .edges
        .iter()
        .find(|e| e.kind == EdgeKind::Imports)
        .unwrap();

    assert_eq!(import_edge.to.kind, NodeKind::Unparsed);
    assert_eq!(import_edge.to.name, "react");
    assert_eq!(import_edge.import.as_deref(), Some("export default"));
    assert_eq!(import_edge.alias.as_deref(), Some("React"));
}

#[test]
fn test_javascript_classes_and_calls() {
    let repo = TempDir::new().unwrap();
    write(repo.path(), "util.js", "export function helper() {\n  return 1;\n}\n");
    write(
        repo.path(),
        "app.js",
        "import { helper } from './util';\n\nclass App {\n  start() {\n    helper();\n  }\n}\n",
    );

    let outcome = parse(repo.path());
    let edges = edge_strings(&outcome.edges);

    assert!(edges.contains(&"app.js-[IMPORTS]->util.js#helper".to_string()));
    assert!(edges.contains(&"app.js-[CONTAINS]->app.js#App".to_string()));
    assert!(edges.contains(&"app.js#App-[CONTAINS]->app.js#App.start".to_string()));
    assert!(edges.contains(&"app.js#App.start-[REFERENCES]->util.js#helper".to_string()));
}

#[test]
fn test_class_skeleton_elides_body() {
    let repo = demo_repo();
    let outcome = parse(repo.path());

    let class = outcome
        .nodes
        .iter()
        .find(|n| n.name == "types.ts#UserService")
        .unwrap();
    assert_eq!(class.skeleton_code, "class UserService { ... }");
    assert!(class.code.contains("getUser"));
}
