//! Collaborators that locate artifacts and read project models.
//!
//! The resolver never talks to a package manager directly. It asks an
//! [`ArtifactProvider`] for the file behind a coordinate and its direct
//! dependencies, and a [`ProjectBuilder`] for the modules of a local
//! project.

mod pom;
mod project;
mod repository;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult};

pub use pom::{EffectivePom, PomDependency, PomResolver, DEFAULT_SCOPE};
pub use project::MavenProjectBuilder;
pub use repository::{artifact_path, LocalRepository};

/// Scopes followed when walking the dependencies of a published artifact.
pub const ARTIFACT_SCOPES: &[&str] = &["compile", "runtime"];

/// Scopes taken from local project modules and dependency lists.
pub const PROJECT_SCOPES: &[&str] = &["compile", "provided"];

/// A fetched artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Jar, class file or classes directory.
    pub location: PathBuf,
    /// Direct dependencies, in declaration order.
    pub dependencies: Vec<Coordinate>,
}

/// Source of artifact files and their declared dependencies.
///
/// # Example
/// ```ignore
/// impl ArtifactProvider for MyRegistry {
///     fn fetch(&self, coordinate: &Coordinate) -> DepauditResult<ResolvedArtifact> {
///         let location = self.download(coordinate)?;
///         Ok(ResolvedArtifact { location, dependencies: self.read_deps(coordinate)? })
///     }
/// }
/// ```
pub trait ArtifactProvider {
    /// Fetch one artifact. Failures are fatal to the resolve that asked.
    fn fetch(&self, coordinate: &Coordinate) -> DepauditResult<ResolvedArtifact>;

    /// Direct dependencies of a dependency-list document, filtered to
    /// [`PROJECT_SCOPES`].
    ///
    /// The default implementation refuses; providers backed by a
    /// repository override it.
    fn dependency_list(&self, document: &Path) -> DepauditResult<Vec<Coordinate>> {
        Err(DepauditError::invalid_input(format!(
            "provider cannot read dependency list {}",
            document.display()
        )))
    }
}

impl<P: ArtifactProvider + ?Sized> ArtifactProvider for Box<P> {
    fn fetch(&self, coordinate: &Coordinate) -> DepauditResult<ResolvedArtifact> {
        (**self).fetch(coordinate)
    }

    fn dependency_list(&self, document: &Path) -> DepauditResult<Vec<Coordinate>> {
        (**self).dependency_list(document)
    }
}

/// One module of a local project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectModule {
    pub coordinate: Coordinate,
    /// Compiled classes directory or packaged archive.
    pub location: PathBuf,
    /// Dependencies already filtered by scope.
    pub dependencies: Vec<Coordinate>,
}

/// Reads (and optionally compiles) a local project.
pub trait ProjectBuilder {
    /// Modules ordered so that every module comes after the modules it
    /// contains.
    fn build(&self, project: &Path) -> DepauditResult<Vec<ProjectModule>>;
}

/// Provider over a fixed set of artifacts, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    artifacts: HashMap<Coordinate, ResolvedArtifact>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        coordinate: Coordinate,
        location: impl Into<PathBuf>,
        dependencies: Vec<Coordinate>,
    ) {
        self.artifacts.insert(
            coordinate,
            ResolvedArtifact {
                location: location.into(),
                dependencies,
            },
        );
    }

    /// Builder-style [`InMemoryProvider::insert`].
    pub fn with(
        mut self,
        coordinate: Coordinate,
        location: impl Into<PathBuf>,
        dependencies: Vec<Coordinate>,
    ) -> Self {
        self.insert(coordinate, location, dependencies);
        self
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

impl ArtifactProvider for InMemoryProvider {
    fn fetch(&self, coordinate: &Coordinate) -> DepauditResult<ResolvedArtifact> {
        self.artifacts
            .get(coordinate)
            .cloned()
            .ok_or_else(|| DepauditError::provider(coordinate, "artifact not found"))
    }
}
