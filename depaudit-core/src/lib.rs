//! depaudit-core: declared-versus-used dependency auditing for JVM artifacts
//!
//! This library reads compiled class files, works out which external
//! classes each artifact references, and attributes every reference to the
//! dependency that defines it. Declared dependencies nothing is taken from
//! are reported as unused; dependencies used but only reachable
//! transitively are reported as undeclared.
//!
//! # Quick Start
//!
//! Use the [`prelude`] module for convenient imports:
//!
//! ```rust,ignore
//! use depaudit_core::prelude::*;
//!
//! let resolver = DepAudit::new().from_coordinate("org.example:app:1.0")?;
//! for root in resolver.roots() {
//!     for line in usage_lines(root) {
//!         println!("{}", line);
//!     }
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`classfile`]: Class file parsing and symbol extraction
//! - [`scan`]: Class entries of jars, directories and single files
//! - [`analyzer`]: Per-artifact extraction and attribution
//! - [`node`]: Package-prefix compaction of usage mappings
//! - [`summary`]: Analysis results and dependency sets
//! - [`resolver`]: Graph resolution with cycle detection
//! - [`cache`] and [`record`]: Gzip-compressed JSON summary cache
//! - [`provider`]: Local repository, POM models and project modules
//! - [`report`]: Plain-text and JSON output
//! - [`builder`]: Fluent builder API for configuration
//! - [`error`]: Typed error handling
//!
//! # Cargo Features
//!
//! - `graph` (default): petgraph-backed graph and Graphviz DOT export

pub mod analyzer;
pub mod builder;
pub mod cache;
pub mod classfile;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod logging;
pub mod node;
pub mod prelude;
pub mod provider;
pub mod record;
pub mod report;
pub mod resolver;
pub mod scan;
pub mod summary;

#[cfg(feature = "graph")]
pub mod graph;

// ============================================================================
// Explicit Re-exports
// ============================================================================

pub use analyzer::{attribute, ArtifactAnalyzer};
pub use builder::DepAudit;
pub use cache::{ArtifactCache, CACHE_DIR_NAME};
pub use classfile::{extract_symbols, ClassFileError, ClassSymbols, ExtractOptions};
pub use config::{load_config, load_config_file, DepauditConfig, CONFIG_FILE};
pub use coordinate::Coordinate;
pub use error::{DepauditError, DepauditResult, IoResultExt};
pub use logging::{init_plain_logging, init_structured_logging};
pub use node::compact;
pub use provider::{
    ArtifactProvider, InMemoryProvider, LocalRepository, MavenProjectBuilder, ProjectBuilder,
    ProjectModule, ResolvedArtifact,
};
pub use record::{ArtifactRecord, CachedArtifact, CACHE_VERSION};
pub use report::{json_report, print_json, print_plain, render_plain};
pub use resolver::{Resolution, Resolver};
pub use scan::collect_classes;
pub use summary::{ArtifactSummary, DependencySet, Mappings};

#[cfg(feature = "graph")]
pub use graph::{build_graph, generate_dot, reachable_from_roots, EdgeKind};

#[cfg(test)]
mod testutil;

#[cfg(test)]
mod tests;
