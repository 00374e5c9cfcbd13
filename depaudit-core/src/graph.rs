//! Resolved dependency graph and Graphviz DOT export.
//!
//! Nodes are coordinates; an edge `a -> b` exists for every declared
//! dependency of `a` and for every undeclared one it uses.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Write;
use std::sync::Arc;

use petgraph::graphmap::DiGraphMap;
use tracing::error;

use crate::coordinate::Coordinate;
use crate::summary::ArtifactSummary;

/// How a dependent relates to one of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeKind {
    /// Declared and at least one class is used from it.
    Used,
    /// Declared but nothing is used from it.
    Unused,
    /// Used but reached only through another dependency.
    Undeclared,
}

impl EdgeKind {
    fn style(self) -> &'static str {
        match self {
            Self::Used => "solid",
            Self::Unused => "dashed",
            Self::Undeclared => "dotted",
        }
    }
}

/// Build the graph of every resolved artifact.
///
/// Uses `DiGraphMap<&Coordinate, EdgeKind>`; nodes borrow from the
/// summaries so nothing is cloned.
pub fn build_graph(
    artifacts: &BTreeMap<Coordinate, Arc<ArtifactSummary>>,
) -> DiGraphMap<&Coordinate, EdgeKind> {
    let mut g = DiGraphMap::new();

    for summary in artifacts.values() {
        g.add_node(summary.coordinate());
    }

    for summary in artifacts.values() {
        let from = summary.coordinate();
        for dep in summary.declared_dependencies() {
            let kind = if summary.unused_dependencies().contains(dep.coordinate()) {
                EdgeKind::Unused
            } else {
                EdgeKind::Used
            };
            g.add_edge(from, dep.coordinate(), kind);
        }
        for dep in summary.undeclared_dependencies() {
            g.add_edge(from, dep.coordinate(), EdgeKind::Undeclared);
        }
    }

    g
}

/// Coordinates reachable from `roots` along declared edges.
pub fn reachable_from_roots<'a>(
    g: &DiGraphMap<&'a Coordinate, EdgeKind>,
    roots: impl IntoIterator<Item = &'a Coordinate>,
) -> HashSet<&'a Coordinate> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();

    for root in roots {
        if g.contains_node(root) && visited.insert(root) {
            queue.push_back(root);
        }
    }

    while let Some(node) = queue.pop_front() {
        for (_, next, kind) in g.edges(node) {
            if *kind != EdgeKind::Undeclared && visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    visited
}

/// Generate a Graphviz DOT representation of the resolved graph.
///
/// - artifacts with unused or undeclared dependencies are lightcoral
/// - everything else is lightgreen
/// - unused edges are dashed, undeclared edges dotted
pub fn generate_dot(artifacts: &BTreeMap<Coordinate, Arc<ArtifactSummary>>) -> String {
    let g = build_graph(artifacts);
    let mut dot = String::with_capacity(g.node_count() * 80 + g.edge_count() * 60 + 150);

    if let Err(e) = write_dot_content(&mut dot, &g, artifacts) {
        error!(error = %e, "failed to generate DOT output");
        return "digraph depaudit {\n}\n".to_string();
    }
    dot
}

fn write_dot_content(
    dot: &mut String,
    g: &DiGraphMap<&Coordinate, EdgeKind>,
    artifacts: &BTreeMap<Coordinate, Arc<ArtifactSummary>>,
) -> std::fmt::Result {
    writeln!(dot, "digraph depaudit {{")?;
    writeln!(dot, "  rankdir=LR;")?;
    writeln!(dot, "  node [shape=box, style=filled, fontname=\"JetBrains Mono\"];")?;
    writeln!(dot)?;

    for (coordinate, summary) in artifacts {
        let color = if summary.has_issues() { "lightcoral" } else { "lightgreen" };
        writeln!(dot, "  \"{}\" [fillcolor={}];", coordinate, color)?;
    }
    writeln!(dot)?;

    let mut edges: Vec<_> = g.all_edges().collect();
    edges.sort();
    for (from, to, kind) in edges {
        writeln!(dot, "  \"{}\" -> \"{}\" [style={}];", from, to, kind.style())?;
    }

    writeln!(dot, "}}")?;
    Ok(())
}
