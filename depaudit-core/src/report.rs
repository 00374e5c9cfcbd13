//! Output formatting - plaintext and JSON.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::coordinate::Coordinate;
use crate::resolver::Resolver;
use crate::summary::{ArtifactSummary, DependencySet};

const INDENT: &str = "  ";

/// Numbered dependency tree below `roots`.
///
/// Each coordinate is expanded once; later occurrences point back to the
/// line of the first one with `(see #N)`.
pub fn dependency_tree(roots: &[Arc<ArtifactSummary>]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut visited: HashMap<&Coordinate, usize> = HashMap::new();
    tree_lines(roots.iter(), 0, &mut visited, &mut lines);
    lines
}

fn tree_lines<'a>(
    summaries: impl Iterator<Item = &'a Arc<ArtifactSummary>>,
    depth: usize,
    visited: &mut HashMap<&'a Coordinate, usize>,
    lines: &mut Vec<String>,
) {
    let indent = INDENT.repeat(depth);
    for summary in summaries {
        if let Some(line) = visited.get(summary.coordinate()) {
            lines.push(format!("     {}{} (see #{})", indent, summary.coordinate(), line));
            continue;
        }
        let number = visited.len() + 1;
        visited.insert(summary.coordinate(), number);
        lines.push(format!("{:3}: {}{}", number, indent, summary.coordinate()));
        tree_lines(
            summary.declared_dependencies().iter(),
            depth + 1,
            visited,
            lines,
        );
    }
}

fn names(set: &DependencySet) -> String {
    let names: Vec<String> = set.iter().map(|d| d.coordinate().to_string()).collect();
    format!("[{}]", names.join(", "))
}

/// Per-artifact usage: unused edges, then origin groups with
/// runtime-provided classes last.
pub fn usage_lines(summary: &ArtifactSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .unused_dependencies()
        .iter()
        .map(|d| format!("Unused: {}", d.coordinate()))
        .collect();

    let groups = summary.mappings().grouped_by_origin();
    if groups.is_empty() {
        lines.push("<none>".to_string());
        return lines;
    }
    for (origins, prefixes) in groups {
        let source = if origins.is_empty() {
            "(Provided by runtime)".to_string()
        } else {
            format!("[{}]", origins.into_iter().collect::<Vec<_>>().join(", "))
        };
        lines.push(format!("{} for classes [{}]", source, prefixes.join(", ")));
    }
    lines
}

/// `<coordinate>: <list>` lines for every artifact with unused dependencies.
pub fn unused_warnings(artifacts: &BTreeMap<Coordinate, Arc<ArtifactSummary>>) -> Vec<String> {
    artifacts
        .values()
        .filter(|s| !s.unused_dependencies().is_empty())
        .map(|s| format!("{} declares unused {}", s.coordinate(), names(s.unused_dependencies())))
        .collect()
}

/// `<coordinate>: <list>` lines for every artifact using undeclared dependencies.
pub fn undeclared_warnings(artifacts: &BTreeMap<Coordinate, Arc<ArtifactSummary>>) -> Vec<String> {
    artifacts
        .values()
        .filter(|s| !s.undeclared_dependencies().is_empty())
        .map(|s| {
            format!(
                "{} has undeclared dependencies on {}",
                s.coordinate(),
                names(s.undeclared_dependencies())
            )
        })
        .collect()
}

/// Full plain-text report of a finished resolution.
pub fn render_plain(resolver: &Resolver) -> String {
    let artifacts = resolver.all_artifacts();
    let mut out = String::new();

    // Writing to a String cannot fail.
    let _ = writeln!(out, "Dependency tree:");
    for line in dependency_tree(resolver.roots()) {
        let _ = writeln!(out, "{}", line);
    }

    for root in resolver.roots() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}:", root.coordinate());
        for line in usage_lines(root) {
            let _ = writeln!(out, "{}{}", INDENT, line);
        }
    }

    let unused = unused_warnings(&artifacts);
    if !unused.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Unused dependencies:");
        for line in unused {
            let _ = writeln!(out, "{}{}", INDENT, line);
        }
    }
    let undeclared = undeclared_warnings(&artifacts);
    if !undeclared.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Undeclared dependencies:");
        for line in undeclared {
            let _ = writeln!(out, "{}{}", INDENT, line);
        }
    }
    out
}

fn summary_json(summary: &ArtifactSummary) -> serde_json::Value {
    let coordinates = |set: &DependencySet| -> Vec<String> {
        set.iter().map(|d| d.coordinate().to_string()).collect()
    };
    json!({
        "coordinate": summary.coordinate().to_string(),
        "declared": coordinates(summary.declared_dependencies()),
        "unused": coordinates(summary.unused_dependencies()),
        "undeclared": coordinates(summary.undeclared_dependencies()),
        "usages": summary.mappings(),
        "classes": summary.defined_classes().len(),
    })
}

/// Machine-readable report: roots plus every resolved artifact.
pub fn json_report(resolver: &Resolver) -> serde_json::Value {
    let artifacts: Vec<serde_json::Value> = resolver
        .all_artifacts()
        .values()
        .map(|s| summary_json(s))
        .collect();
    json!({
        "roots": resolver
            .roots()
            .iter()
            .map(|r| r.coordinate().to_string())
            .collect::<Vec<_>>(),
        "artifacts": artifacts,
        "issues": resolver.has_issues(),
    })
}

/// Prints the plain-text report to stdout.
pub fn print_plain(resolver: &Resolver) {
    print!("{}", render_plain(resolver));
}

/// Prints the JSON report to stdout.
pub fn print_json(resolver: &Resolver) {
    match serde_json::to_string_pretty(&json_report(resolver)) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            warn!(error = %e, "JSON serialization failed");
            println!("{}", json_report(resolver));
        }
    }
}
