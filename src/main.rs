//! Meridian CLI - repository code graph indexer.
//!
//! Usage: meridian <command> [arguments]

mod cli;

use std::process::ExitCode;

use anyhow::Result;

use meridian::config::parse_log_level;
use meridian::{CodeGraph, GraphStore, IndexConfig, NodeKind};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let parsed = match cli::parse_args() {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            cli::print_usage();
            std::process::exit(2);
        }
    };

    let level = parse_log_level(&parsed.log_level)?;
    env_logger::Builder::new().filter_level(level).init();

    match parsed.command {
        cli::Command::Index {
            repo_path,
            db_path,
            paths,
            ignore_patterns,
            languages,
            incremental,
        } => {
            let mut config = IndexConfig::default().ignore_patterns(ignore_patterns);
            config.log_level = level;
            if !languages.is_empty() {
                config = config.language_tags(&languages)?;
            }

            let mut graph = CodeGraph::new(db_path, repo_path, config)?;
            let stats = graph.index(&paths, incremental)?;
            println!(
                "indexed {} files: {} nodes, {} edges",
                stats.files, stats.nodes, stats.edges
            );
        }

        cli::Command::Status { db_path } => {
            let store = GraphStore::open(&db_path)?;
            println!("nodes: {}", store.count_nodes()?);
            println!("edges: {}", store.count_edges()?);
        }

        cli::Command::Query {
            db_path,
            name,
            kind,
        } => {
            let store = GraphStore::open(&db_path)?;
            if let Some(name) = name {
                match store.node_by_name(&name)? {
                    Some(node) => print_node(&node),
                    None => println!("not found: {name}"),
                }
            } else if let Some(kind) = kind {
                let kind = NodeKind::parse_tag(&kind)
                    .ok_or_else(|| anyhow::anyhow!("unknown node kind: {kind}"))?;
                for node in store.nodes_by_kind(kind)? {
                    print_node(&node);
                }
            }
        }

        cli::Command::ParamTypes {
            db_path,
            file,
            line,
        } => {
            // Queries only; the repo path is irrelevant once indexed.
            let graph = CodeGraph::new(db_path, ".", IndexConfig::default())?;
            for snippet in graph.func_param_types(&file, line)? {
                println!(
                    "{}:{}:{}\n{}",
                    snippet.path, snippet.start_line, snippet.end_line, snippet.content
                );
            }
        }

        cli::Command::Clean {
            db_path,
            delete_dir,
        } => {
            let mut store = GraphStore::open(&db_path)?;
            store.clean(delete_dir)?;
            println!("cleaned");
        }
    }

    Ok(())
}

fn print_node(node: &meridian::Node) {
    if node.start_line > 0 {
        println!(
            "{}\t{}\t{}:{}",
            node.kind, node.name, node.start_line, node.end_line
        );
    } else {
        println!("{}\t{}", node.kind, node.name);
    }
}
