//! CLI argument parsing for Meridian.
//!
//! Defines the Command enum and parse_args() for all CLI commands.

use std::path::PathBuf;

use anyhow::{anyhow, Result};

pub fn print_usage() {
    eprintln!("Meridian - Repository code graph indexer");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  meridian index --repo <DIR> --db <DIR> [--path <P>]... [--ignore <PAT>]... [--language <LANG>]... [--incremental]");
    eprintln!("  meridian status --db <DIR>");
    eprintln!("  meridian query --db <DIR> (--name <NAME> | --kind <KIND>)");
    eprintln!("  meridian param-types --db <DIR> --file <PATH> --line <N>");
    eprintln!("  meridian clean --db <DIR> [--delete-dir]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  index        Index a repository into the graph database");
    eprintln!("  status       Show node and edge counts");
    eprintln!("  query        Look up nodes by name or kind");
    eprintln!("  param-types  Resolve the parameter types of the function at a line");
    eprintln!("  clean        Drop graph contents (optionally the database directory)");
    eprintln!();
    eprintln!("Global arguments:");
    eprintln!("  --log-level <LEVEL>  error, warn, info, debug or trace (default: warn)");
    eprintln!();
    eprintln!("Index arguments:");
    eprintln!("  --repo <DIR>         Repository root to index");
    eprintln!("  --db <DIR>           Graph database directory");
    eprintln!("  --path <P>           Restrict indexing to this path (repeatable)");
    eprintln!("  --ignore <PAT>       Gitignore-style ignore pattern (repeatable, '!' re-includes)");
    eprintln!("  --language <LANG>    Only process this language tag (repeatable)");
    eprintln!("  --incremental        Replace only facts derived from the indexed files");
    eprintln!();
    eprintln!("Query arguments:");
    eprintln!("  --db <DIR>           Graph database directory");
    eprintln!("  --name <NAME>        Node key to look up");
    eprintln!("  --kind <KIND>        Node kind to list (Class, Function, ...)");
    eprintln!();
    eprintln!("Param-types arguments:");
    eprintln!("  --db <DIR>           Graph database directory");
    eprintln!("  --file <PATH>        Repo-relative file containing the function");
    eprintln!("  --line <N>           1-based line inside the function");
}

pub enum Command {
    Index {
        repo_path: PathBuf,
        db_path: PathBuf,
        paths: Vec<PathBuf>,
        ignore_patterns: Vec<String>,
        languages: Vec<String>,
        incremental: bool,
    },
    Status {
        db_path: PathBuf,
    },
    Query {
        db_path: PathBuf,
        name: Option<String>,
        kind: Option<String>,
    },
    ParamTypes {
        db_path: PathBuf,
        file: String,
        line: usize,
    },
    Clean {
        db_path: PathBuf,
        delete_dir: bool,
    },
}

/// Parsed command plus global options.
pub struct Cli {
    pub command: Command,
    pub log_level: String,
}

pub fn parse_args() -> Result<Cli> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        print_usage();
        std::process::exit(if args.is_empty() { 2 } else { 0 });
    }

    let command_name = args[0].clone();
    let mut repo_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut ignore_patterns: Vec<String> = Vec::new();
    let mut languages: Vec<String> = Vec::new();
    let mut incremental = false;
    let mut delete_dir = false;
    let mut name: Option<String> = None;
    let mut kind: Option<String> = None;
    let mut file: Option<String> = None;
    let mut line: Option<usize> = None;
    let mut log_level = "warn".to_string();

    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        let mut take_value = |flag: &str| -> Result<String> {
            iter.next()
                .map(|v| v.to_string())
                .ok_or_else(|| anyhow!("missing value for {flag}"))
        };

        match arg.as_str() {
            "--repo" => repo_path = Some(PathBuf::from(take_value("--repo")?)),
            "--db" => db_path = Some(PathBuf::from(take_value("--db")?)),
            "--path" => paths.push(PathBuf::from(take_value("--path")?)),
            "--ignore" => ignore_patterns.push(take_value("--ignore")?),
            "--language" => languages.push(take_value("--language")?),
            "--incremental" => incremental = true,
            "--delete-dir" => delete_dir = true,
            "--name" => name = Some(take_value("--name")?),
            "--kind" => kind = Some(take_value("--kind")?),
            "--file" => file = Some(take_value("--file")?),
            "--line" => {
                let value = take_value("--line")?;
                line = Some(
                    value
                        .parse()
                        .map_err(|_| anyhow!("--line expects a number, got '{value}'"))?,
                );
            }
            "--log-level" => log_level = take_value("--log-level")?,
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    let db_path = db_path.ok_or_else(|| anyhow!("--db is required"))?;

    let command = match command_name.as_str() {
        "index" => Command::Index {
            repo_path: repo_path.ok_or_else(|| anyhow!("index requires --repo"))?,
            db_path,
            paths,
            ignore_patterns,
            languages,
            incremental,
        },
        "status" => Command::Status { db_path },
        "query" => {
            if name.is_none() && kind.is_none() {
                return Err(anyhow!("query requires --name or --kind"));
            }
            Command::Query {
                db_path,
                name,
                kind,
            }
        }
        "param-types" => Command::ParamTypes {
            db_path,
            file: file.ok_or_else(|| anyhow!("param-types requires --file"))?,
            line: line.ok_or_else(|| anyhow!("param-types requires --line"))?,
        },
        "clean" => Command::Clean {
            db_path,
            delete_dir,
        },
        other => return Err(anyhow!("unknown command: {other}")),
    };

    Ok(Cli { command, log_level })
}
