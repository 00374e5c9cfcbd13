//! Depth-first resolution of the dependency graph.
//!
//! Every coordinate is resolved at most once per run. While a coordinate
//! is being resolved it is marked [`Resolution::InProgress`]; reaching it
//! again before it is done means the graph has a cycle. The error then
//! collects one coordinate per unwinding frame, so the reported path runs
//! from the offender back to the root.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::analyzer::ArtifactAnalyzer;
use crate::cache::ArtifactCache;
use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult};
use crate::provider::{ArtifactProvider, ProjectBuilder, ResolvedArtifact};
use crate::summary::{ArtifactSummary, DependencySet};

/// State of one coordinate in the resolver table. Absent means unseen.
#[derive(Debug, Clone)]
pub enum Resolution {
    InProgress,
    Done(Arc<ArtifactSummary>),
}

pub struct Resolver {
    provider: Box<dyn ArtifactProvider>,
    cache: Option<ArtifactCache>,
    analyzer: ArtifactAnalyzer,
    artifacts: HashMap<Coordinate, Resolution>,
    order: Vec<Coordinate>,
    roots: Vec<Arc<ArtifactSummary>>,
    local: HashMap<Coordinate, ResolvedArtifact>,
}

impl Resolver {
    /// Resolver without a disk cache and with default extraction options.
    pub fn new(provider: impl ArtifactProvider + 'static) -> Self {
        Self {
            provider: Box::new(provider),
            cache: None,
            analyzer: ArtifactAnalyzer::default(),
            artifacts: HashMap::new(),
            order: Vec::new(),
            roots: Vec::new(),
            local: HashMap::new(),
        }
    }

    pub fn with_cache(mut self, cache: Option<ArtifactCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_analyzer(mut self, analyzer: ArtifactAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn cache(&self) -> Option<&ArtifactCache> {
        self.cache.as_ref()
    }

    /// Resolve one coordinate and record it as a root.
    pub fn from_coordinate(mut self, coordinate: &Coordinate) -> DepauditResult<Self> {
        self.add_root(coordinate)?;
        Ok(self)
    }

    /// Resolve every compile/provided dependency of a dependency-list
    /// document; each becomes a root.
    pub fn from_dependency_list(mut self, document: &Path) -> DepauditResult<Self> {
        let coordinates = self.provider.dependency_list(document)?;
        info!(
            document = %document.display(),
            roots = coordinates.len(),
            "resolving dependency list"
        );
        for coordinate in &coordinates {
            self.add_root(coordinate)?;
        }
        Ok(self)
    }

    /// Resolve every module of a local project, innermost modules first.
    ///
    /// Modules shadow the provider, so a module depending on a sibling
    /// sees the sibling's local classes.
    pub fn from_project(
        mut self,
        builder: &dyn ProjectBuilder,
        project: &Path,
    ) -> DepauditResult<Self> {
        let modules = builder.build(project)?;
        info!(
            project = %project.display(),
            modules = modules.len(),
            "resolving project"
        );
        for module in &modules {
            self.add_local(
                module.coordinate.clone(),
                module.location.clone(),
                module.dependencies.clone(),
            );
        }
        for module in &modules {
            self.add_root(&module.coordinate)?;
        }
        Ok(self)
    }

    /// Serve `coordinate` from a local location instead of the provider.
    /// Local artifacts are never cached.
    pub fn add_local(
        &mut self,
        coordinate: Coordinate,
        location: PathBuf,
        dependencies: Vec<Coordinate>,
    ) {
        self.local.insert(
            coordinate,
            ResolvedArtifact {
                location,
                dependencies,
            },
        );
    }

    /// Resolve `coordinate` and append it to the roots unless it already is one.
    pub fn add_root(&mut self, coordinate: &Coordinate) -> DepauditResult<Arc<ArtifactSummary>> {
        let summary = self.resolve(coordinate)?;
        if !self.roots.iter().any(|root| root.coordinate() == coordinate) {
            self.roots.push(Arc::clone(&summary));
        }
        Ok(summary)
    }

    /// Resolve one coordinate and, recursively, everything it depends on.
    ///
    /// The same coordinate reached along several paths yields the same
    /// `Arc`.
    pub fn resolve(&mut self, coordinate: &Coordinate) -> DepauditResult<Arc<ArtifactSummary>> {
        match self.artifacts.get(coordinate) {
            Some(Resolution::Done(summary)) => return Ok(Arc::clone(summary)),
            Some(Resolution::InProgress) => return Err(DepauditError::cycle(coordinate.clone())),
            None => {}
        }

        self.artifacts
            .insert(coordinate.clone(), Resolution::InProgress);
        match self.build(coordinate) {
            Ok(summary) => {
                let summary = Arc::new(summary);
                self.artifacts
                    .insert(coordinate.clone(), Resolution::Done(Arc::clone(&summary)));
                self.order.push(coordinate.clone());
                Ok(summary)
            }
            Err(e) => {
                self.artifacts.remove(coordinate);
                Err(e.push_coordinate(coordinate))
            }
        }
    }

    fn build(&mut self, coordinate: &Coordinate) -> DepauditResult<ArtifactSummary> {
        debug!(coordinate = %coordinate, "resolving");
        let (artifact, is_local) = match self.local.get(coordinate) {
            Some(local) => (local.clone(), true),
            None => (self.provider.fetch(coordinate)?, false),
        };

        let mut declared = DependencySet::new();
        for dependency in &artifact.dependencies {
            declared.insert(self.resolve(dependency)?);
        }

        let cache = if is_local { None } else { self.cache.clone() };
        if let Some(cache) = &cache {
            match cache.load(coordinate) {
                Ok(Some(cached)) => {
                    // Re-link against live summaries; a stored direct
                    // dependency may differ from what the provider returned.
                    let mut relinked = DependencySet::new();
                    for dependency in cached.direct_dependencies() {
                        relinked.insert(self.resolve(dependency)?);
                    }
                    return Ok(cached.complete(relinked));
                }
                Ok(None) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(coordinate = %coordinate, error = %e, "discarding cache entry");
                }
                Err(e) => return Err(e),
            }
        }

        let summary = self
            .analyzer
            .analyze(coordinate.clone(), declared, &artifact.location)?;
        if let Some(cache) = &cache {
            cache.store(&summary)?;
        }
        Ok(summary)
    }

    /// Summaries added as roots, in the order they were added.
    pub fn roots(&self) -> &[Arc<ArtifactSummary>] {
        &self.roots
    }

    /// Every resolved summary keyed by coordinate.
    pub fn all_artifacts(&self) -> BTreeMap<Coordinate, Arc<ArtifactSummary>> {
        self.done().map(|s| (s.coordinate().clone(), Arc::clone(s))).collect()
    }

    /// Resolved summaries in completion order, dependencies before dependents.
    pub fn resolution_order(&self) -> Vec<Arc<ArtifactSummary>> {
        self.order
            .iter()
            .filter_map(|c| self.get(c))
            .collect()
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<Arc<ArtifactSummary>> {
        match self.artifacts.get(coordinate) {
            Some(Resolution::Done(summary)) => Some(Arc::clone(summary)),
            _ => None,
        }
    }

    /// Whether any resolved summary reports unused or undeclared dependencies.
    pub fn has_issues(&self) -> bool {
        self.done().any(|s| s.has_issues())
    }

    fn done(&self) -> impl Iterator<Item = &Arc<ArtifactSummary>> + '_ {
        self.artifacts.values().filter_map(|r| match r {
            Resolution::Done(summary) => Some(summary),
            Resolution::InProgress => None,
        })
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("cache", &self.cache)
            .field("artifacts", &self.order.len())
            .field("roots", &self.roots.len())
            .field("local", &self.local.len())
            .finish()
    }
}
