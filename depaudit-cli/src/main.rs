//! depaudit CLI - declared-versus-used dependency auditor for JVM artifacts.
//!
//! Features:
//! - Audit a published artifact, a POM's dependency list or a local project
//! - Bytecode-level attribution of every referenced class
//! - Gzip-compressed summary cache shared across runs
//! - Plain, JSON and Graphviz DOT output
//!
//! Exit codes: 0 clean, 1 unused or undeclared dependencies found, 2 error.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};

use depaudit_core::{
    generate_dot, init_plain_logging, init_structured_logging, load_config, load_config_file,
    print_json, print_plain, DepAudit, DepauditConfig, Resolver,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Declared-versus-used dependency auditor for JVM artifacts")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output results in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Write Graphviz DOT output of the resolved graph to a file
    #[arg(long, global = true, value_name = "FILE")]
    dot: Option<String>,

    /// Local repository root (default: ~/.m2/repository)
    #[arg(long, global = true, value_name = "DIR")]
    repository: Option<PathBuf>,

    /// Summary cache directory (default: <repository>/dependency-data)
    #[arg(long, global = true, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Neither read nor write the summary cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Configuration file (default: ./depaudit.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Emit logs as JSON on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Log resolution progress
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Audit one artifact given as group:artifact[:packaging[:classifier]]:version
    Coordinate { coordinate: String },

    /// Audit every compile and provided dependency listed in a POM file
    Pom { file: PathBuf },

    /// Audit every module of a local project
    Project {
        /// Project directory or its pom.xml
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Run `mvn -q -DskipTests package` first
        #[arg(long)]
        build: bool,
    },
}

/// Rejects output paths with null bytes or parent directory traversal.
fn validate_output_path(path: &str) -> Result<PathBuf> {
    if path.contains('\0') {
        return Err(anyhow!("Output path contains null bytes"));
    }
    let p = PathBuf::from(path);
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(anyhow!(
            "Path traversal (..) not allowed in output paths: {}",
            path
        ));
    }
    Ok(p)
}

fn load_settings(cli: &Cli) -> Result<DepauditConfig> {
    let config = match &cli.config {
        Some(file) => load_config_file(file)?,
        None => load_config(Path::new("."))?.unwrap_or_default(),
    };
    Ok(config)
}

/// Config values first, then command-line overrides.
fn audit_for(cli: &Cli, config: &DepauditConfig) -> DepAudit {
    let mut audit = DepAudit::from_config(config);
    if let Some(repository) = &cli.repository {
        audit = audit.with_repository(repository);
    }
    if let Some(dir) = &cli.cache_dir {
        audit = audit.with_cache_dir(dir);
    }
    if cli.no_cache {
        audit = audit.with_cache(false);
    }
    audit
}

fn resolve(cli: &Cli, audit: DepAudit) -> Result<Resolver> {
    let resolver = match &cli.command {
        Command::Coordinate { coordinate } => audit
            .from_coordinate(coordinate)
            .with_context(|| format!("Failed to audit {}", coordinate))?,
        Command::Pom { file } => audit
            .from_dependency_list(file)
            .with_context(|| format!("Failed to audit dependencies of {}", file.display()))?,
        Command::Project { path, build } => audit
            .with_build(*build)
            .from_project(path)
            .with_context(|| format!("Failed to audit project {}", path.display()))?,
    };
    Ok(resolver)
}

/// Runs the audit; `Ok(true)` when issues were found.
fn run(cli: &Cli) -> Result<bool> {
    let config = load_settings(cli)?;
    let resolver = resolve(cli, audit_for(cli, &config))?;

    if cli.json || config.output_format() == "json" {
        print_json(&resolver);
    } else {
        print_plain(&resolver);
    }

    if let Some(file) = &cli.dot {
        let path = validate_output_path(file)?;
        let dot = generate_dot(&resolver.all_artifacts());
        fs::write(&path, dot)
            .with_context(|| format!("DOT write failed to {}", path.display()))?;
    }

    Ok(resolver.has_issues())
}

fn main() -> ExitCode {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] depaudit internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code 2.");
    }));

    let cli = Cli::parse();
    if cli.log_json {
        init_structured_logging(cli.verbose);
    } else {
        init_plain_logging(cli.verbose);
    }

    match std::panic::catch_unwind(|| run(&cli)) {
        Ok(Ok(false)) => ExitCode::SUCCESS,
        Ok(Ok(true)) => ExitCode::from(1),
        Ok(Err(e)) => {
            eprintln!("[ERROR] {:#}", e);
            ExitCode::from(2)
        }
        Err(_) => ExitCode::from(2),
    }
}
