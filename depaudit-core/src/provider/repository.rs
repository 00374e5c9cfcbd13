//! Artifact provider over a Maven-layout local repository.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult};

use super::pom::PomResolver;
use super::{ArtifactProvider, ResolvedArtifact, ARTIFACT_SCOPES, PROJECT_SCOPES};

/// File extension used for a packaging type.
pub fn extension(packaging: &str) -> &'static str {
    match packaging {
        "pom" => "pom",
        "war" => "war",
        _ => "jar",
    }
}

/// `<root>/<group dirs>/<artifact>/<version>/<artifact>-<version>[-<classifier>].<ext>`
pub fn artifact_path(root: &Path, coordinate: &Coordinate) -> PathBuf {
    let mut path = root.to_path_buf();
    for segment in coordinate.group_id().split('.') {
        path.push(segment);
    }
    path.push(coordinate.artifact_id());
    path.push(coordinate.version());

    let mut file_name = format!("{}-{}", coordinate.artifact_id(), coordinate.version());
    if !coordinate.classifier().is_empty() {
        file_name.push('-');
        file_name.push_str(coordinate.classifier());
    }
    file_name.push('.');
    file_name.push_str(extension(coordinate.packaging()));
    path.push(file_name);
    path
}

/// Reads artifacts and POMs already present in a local repository.
///
/// Nothing is downloaded: a coordinate whose files are missing is a
/// provider error.
#[derive(Debug)]
pub struct LocalRepository {
    root: PathBuf,
    poms: PomResolver,
    scopes: Vec<String>,
    list_scopes: Vec<String>,
}

impl LocalRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            poms: PomResolver::new(root.clone()),
            root,
            scopes: ARTIFACT_SCOPES.iter().map(|s| s.to_string()).collect(),
            list_scopes: PROJECT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// `~/.m2/repository`, if a home directory is known.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".m2").join("repository"))
    }

    /// Scopes followed from a published artifact's POM.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Scopes taken from a dependency-list document.
    pub fn with_list_scopes(mut self, scopes: Vec<String>) -> Self {
        self.list_scopes = scopes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn poms(&self) -> &PomResolver {
        &self.poms
    }

    pub fn path_of(&self, coordinate: &Coordinate) -> PathBuf {
        artifact_path(&self.root, coordinate)
    }
}

impl ArtifactProvider for LocalRepository {
    fn fetch(&self, coordinate: &Coordinate) -> DepauditResult<ResolvedArtifact> {
        let location = self.path_of(coordinate);
        if !location.exists() {
            return Err(DepauditError::provider(
                coordinate,
                format!("artifact not found at {}", location.display()),
            ));
        }

        let pom = self.poms.load(coordinate)?;
        let dependencies = pom.dependencies_in(self.scopes.as_slice());
        debug!(
            coordinate = %coordinate,
            dependencies = dependencies.len(),
            "fetched from local repository"
        );
        Ok(ResolvedArtifact {
            location,
            dependencies,
        })
    }

    fn dependency_list(&self, document: &Path) -> DepauditResult<Vec<Coordinate>> {
        Ok(self.poms.load_file(document)?.dependencies_in(self.list_scopes.as_slice()))
    }
}
