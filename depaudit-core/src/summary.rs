//! Per-artifact analysis results.
//!
//! An [`ArtifactSummary`] is immutable once built and shared through `Arc`
//! between every summary that depends on it, so a dependency reached along
//! several paths is one object.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::coordinate::Coordinate;
use crate::node::{PACKAGE_WILDCARD, SUBTREE_WILDCARD};

/// Insertion-ordered set of summaries, deduplicated by coordinate.
#[derive(Clone, Default)]
pub struct DependencySet {
    items: Vec<Arc<ArtifactSummary>>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a summary unless one with the same coordinate is present.
    pub fn insert(&mut self, summary: Arc<ArtifactSummary>) -> bool {
        if self.contains(summary.coordinate()) {
            return false;
        }
        self.items.push(summary);
        true
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.items.iter().any(|s| s.coordinate() == coordinate)
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&Arc<ArtifactSummary>> {
        self.items.iter().find(|s| s.coordinate() == coordinate)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ArtifactSummary>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn coordinates(&self) -> Vec<&Coordinate> {
        self.items.iter().map(|s| s.coordinate()).collect()
    }

    pub fn artifact_names(&self) -> BTreeSet<String> {
        self.items.iter().map(|s| s.artifact_name()).collect()
    }

    /// Subset of this set whose members satisfy `keep`, order preserved.
    pub fn filtered(&self, mut keep: impl FnMut(&ArtifactSummary) -> bool) -> Self {
        self.items
            .iter()
            .filter(|s| keep(s))
            .cloned()
            .collect()
    }

    /// `declared ∪ ⋃ d.flattened` for every direct dependency `d`.
    pub fn transitive_closure(&self) -> Self {
        let mut closure = DependencySet::new();
        for direct in &self.items {
            closure.insert(Arc::clone(direct));
            for transitive in direct.flattened_dependencies() {
                closure.insert(Arc::clone(transitive));
            }
        }
        closure
    }
}

impl FromIterator<Arc<ArtifactSummary>> for DependencySet {
    fn from_iter<I: IntoIterator<Item = Arc<ArtifactSummary>>>(iter: I) -> Self {
        let mut set = DependencySet::new();
        for summary in iter {
            set.insert(summary);
        }
        set
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a Arc<ArtifactSummary>;
    type IntoIter = std::slice::Iter<'a, Arc<ArtifactSummary>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl fmt::Debug for DependencySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|s| s.coordinate().to_string()))
            .finish()
    }
}

impl PartialEq for DependencySet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|s| other.contains(s.coordinate()))
    }
}

impl Eq for DependencySet {}

/// Compacted `prefix -> artifact names` attribution.
///
/// Keys are dotted class names or prefixes ending in `*` / `**`. An empty
/// origin set marks classes expected at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mappings(BTreeMap<String, BTreeSet<String>>);

impl Mappings {
    pub fn new(entries: BTreeMap<String, BTreeSet<String>>) -> Self {
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&BTreeSet<String>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, String, BTreeSet<String>> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.0
    }

    /// Origin set of a dotted class name.
    ///
    /// Tries the exact key, then the `*` entry of its package, then the
    /// `**` entries of its package and every enclosing package up to the
    /// root.
    pub fn lookup(&self, class_name: &str) -> Option<&BTreeSet<String>> {
        if let Some(origins) = self.0.get(class_name) {
            return Some(origins);
        }

        let mut package = class_name.rsplit_once('.').map(|(package, _)| package);
        if let Some(origins) = self.0.get(&wildcard_key(package, PACKAGE_WILDCARD)) {
            return Some(origins);
        }

        loop {
            if let Some(origins) = self.0.get(&wildcard_key(package, SUBTREE_WILDCARD)) {
                return Some(origins);
            }
            package = package?.rsplit_once('.').map(|(parent, _)| parent);
        }
    }

    /// Entries grouped by origin set, runtime-provided (empty set) last.
    pub fn grouped_by_origin(&self) -> Vec<(BTreeSet<String>, Vec<String>)> {
        let mut groups: BTreeMap<BTreeSet<String>, Vec<String>> = BTreeMap::new();
        for (prefix, origins) in &self.0 {
            groups.entry(origins.clone()).or_default().push(prefix.clone());
        }
        let runtime = groups.remove(&BTreeSet::new());
        let mut out: Vec<_> = groups.into_iter().collect();
        if let Some(prefixes) = runtime {
            out.push((BTreeSet::new(), prefixes));
        }
        out
    }
}

fn wildcard_key(package: Option<&str>, wildcard: &str) -> String {
    match package {
        Some(package) => format!("{}.{}", package, wildcard),
        None => wildcard.to_string(),
    }
}

/// Analysis result for one coordinate.
///
/// Equality and hashing use the coordinate only.
#[derive(Clone)]
pub struct ArtifactSummary {
    coordinate: Coordinate,
    declared: DependencySet,
    flattened: DependencySet,
    defined_classes: BTreeSet<String>,
    mappings: Mappings,
    unused: DependencySet,
    undeclared: DependencySet,
}

impl ArtifactSummary {
    pub(crate) fn new(
        coordinate: Coordinate,
        declared: DependencySet,
        flattened: DependencySet,
        defined_classes: BTreeSet<String>,
        mappings: Mappings,
        unused: DependencySet,
        undeclared: DependencySet,
    ) -> Self {
        Self {
            coordinate,
            declared,
            flattened,
            defined_classes,
            mappings,
            unused,
            undeclared,
        }
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn artifact_name(&self) -> String {
        self.coordinate.artifact_name()
    }

    pub fn declared_dependencies(&self) -> &DependencySet {
        &self.declared
    }

    pub fn flattened_dependencies(&self) -> &DependencySet {
        &self.flattened
    }

    /// Internal (`/`-separated) names of the classes this artifact contains.
    pub fn defined_classes(&self) -> &BTreeSet<String> {
        &self.defined_classes
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn unused_dependencies(&self) -> &DependencySet {
        &self.unused
    }

    pub fn undeclared_dependencies(&self) -> &DependencySet {
        &self.undeclared
    }

    pub fn has_issues(&self) -> bool {
        !self.unused.is_empty() || !self.undeclared.is_empty()
    }
}

impl PartialEq for ArtifactSummary {
    fn eq(&self, other: &Self) -> bool {
        self.coordinate == other.coordinate
    }
}

impl Eq for ArtifactSummary {}

impl Hash for ArtifactSummary {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.coordinate.hash(state);
    }
}

impl fmt::Debug for ArtifactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactSummary")
            .field("coordinate", &self.coordinate.to_string())
            .field("declared", &self.declared)
            .field("classes", &self.defined_classes.len())
            .field("mappings", &self.mappings.len())
            .field("unused", &self.unused)
            .field("undeclared", &self.undeclared)
            .finish()
    }
}

impl fmt::Display for ArtifactSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.coordinate)
    }
}
