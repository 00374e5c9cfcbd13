//! On-disk schema of a cached artifact summary.
//!
//! A record stores only what belongs to the artifact itself. Dependencies
//! are kept as coordinates and re-linked against the live resolver when
//! the record is read back, so the summaries they point to always come
//! from the current run.

use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::summary::{ArtifactSummary, DependencySet, Mappings};

/// Current record format version. Increment when the schema changes.
pub const CACHE_VERSION: u32 = 2;

/// Version of the tool writing records.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record metadata for version checking.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RecordMetadata {
    pub cache_version: u32,
    pub tool_version: String,
    /// Seconds since the epoch.
    #[serde(default)]
    pub created_at: u64,
}

impl RecordMetadata {
    pub fn current() -> Self {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        Self {
            cache_version: CACHE_VERSION,
            tool_version: TOOL_VERSION.to_string(),
            created_at,
        }
    }

    /// Records written by another format version are ignored.
    pub fn is_compatible(&self) -> bool {
        self.cache_version == CACHE_VERSION
    }
}

/// One member of the dependency closure.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DependencyRecord {
    pub coordinate: Coordinate,
    /// `false` iff the dependency was declared directly.
    pub transitive: bool,
}

/// Serialized form of an [`ArtifactSummary`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactRecord {
    #[serde(default)]
    pub metadata: RecordMetadata,
    pub coordinate: Coordinate,
    pub classes: BTreeSet<String>,
    pub usages: Mappings,
    /// Artifact names of declared dependencies nothing was used from.
    pub unused: BTreeSet<String>,
    /// Artifact names used but only reachable transitively.
    pub undeclared: BTreeSet<String>,
    pub dependencies: Vec<DependencyRecord>,
}

impl ArtifactRecord {
    pub fn from_summary(summary: &ArtifactSummary) -> Self {
        let declared = summary.declared_dependencies();
        let dependencies = summary
            .flattened_dependencies()
            .iter()
            .map(|dep| DependencyRecord {
                coordinate: dep.coordinate().clone(),
                transitive: !declared.contains(dep.coordinate()),
            })
            .collect();

        Self {
            metadata: RecordMetadata::current(),
            coordinate: summary.coordinate().clone(),
            classes: summary.defined_classes().clone(),
            usages: summary.mappings().clone(),
            unused: summary.unused_dependencies().artifact_names(),
            undeclared: summary.undeclared_dependencies().artifact_names(),
            dependencies,
        }
    }

    /// Drop the closure and keep only what re-linking needs.
    pub fn into_cached(self) -> CachedArtifact {
        let direct = self
            .dependencies
            .into_iter()
            .filter(|dep| !dep.transitive)
            .map(|dep| dep.coordinate)
            .collect();

        CachedArtifact {
            coordinate: self.coordinate,
            classes: self.classes,
            mappings: self.usages,
            unused: self.unused,
            undeclared: self.undeclared,
            direct,
        }
    }
}

/// A decoded record waiting for its direct dependencies to be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    coordinate: Coordinate,
    classes: BTreeSet<String>,
    mappings: Mappings,
    unused: BTreeSet<String>,
    undeclared: BTreeSet<String>,
    direct: Vec<Coordinate>,
}

impl CachedArtifact {
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    /// Coordinates stored as direct dependencies, in their original order.
    pub fn direct_dependencies(&self) -> &[Coordinate] {
        &self.direct
    }

    /// Rebuild the summary on top of freshly resolved direct dependencies.
    ///
    /// The closure comes from each dependency's own live closure; unused
    /// and undeclared sets are matched back by artifact name.
    pub fn complete(self, declared: DependencySet) -> ArtifactSummary {
        let flattened = declared.transitive_closure();
        let unused = declared.filtered(|d| self.unused.contains(&d.artifact_name()));
        let undeclared = flattened.filtered(|d| {
            !declared.contains(d.coordinate()) && self.undeclared.contains(&d.artifact_name())
        });

        ArtifactSummary::new(
            self.coordinate,
            declared,
            flattened,
            self.classes,
            self.mappings,
            unused,
            undeclared,
        )
    }
}
