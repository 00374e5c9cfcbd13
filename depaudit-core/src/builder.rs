//! Builder pattern API for dependency audits.
//!
//! Provides a fluent interface for configuring and running an audit:
//!
//! ```rust,ignore
//! use depaudit_core::prelude::*;
//!
//! let resolver = DepAudit::new()
//!     .with_repository("/home/me/.m2/repository")
//!     .with_cache(true)
//!     .from_coordinate("org.example:app:1.0")?;
//!
//! println!("issues: {}", resolver.has_issues());
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::analyzer::ArtifactAnalyzer;
use crate::cache::ArtifactCache;
use crate::classfile::ExtractOptions;
use crate::config::DepauditConfig;
use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult};
use crate::provider::{LocalRepository, MavenProjectBuilder, ARTIFACT_SCOPES, PROJECT_SCOPES};
use crate::resolver::Resolver;

/// Builder for configuring a dependency audit.
///
/// # Example
///
/// ```rust,ignore
/// let resolver = DepAudit::new()
///     .with_cache(false)
///     .from_project("/src/my-app")?;
/// ```
#[derive(Debug, Clone)]
pub struct DepAudit {
    /// Local repository root; `~/.m2/repository` when unset
    repository: Option<PathBuf>,

    /// Cache directory; `<repository>/dependency-data` when unset
    cache_dir: Option<PathBuf>,

    use_cache: bool,

    options: ExtractOptions,

    /// Scopes followed for published artifacts
    artifact_scopes: Vec<String>,

    /// Scopes taken from local modules and dependency lists
    project_scopes: Vec<String>,

    /// Run the build tool before reading a project
    run_build: bool,
}

impl Default for DepAudit {
    fn default() -> Self {
        Self::new()
    }
}

impl DepAudit {
    pub fn new() -> Self {
        Self {
            repository: None,
            cache_dir: None,
            use_cache: true,
            options: ExtractOptions::default(),
            artifact_scopes: ARTIFACT_SCOPES.iter().map(|s| s.to_string()).collect(),
            project_scopes: PROJECT_SCOPES.iter().map(|s| s.to_string()).collect(),
            run_build: false,
        }
    }

    /// Start from a loaded depaudit.toml.
    pub fn from_config(config: &DepauditConfig) -> Self {
        Self {
            repository: config.repository.clone(),
            cache_dir: config.cache_dir.clone(),
            use_cache: config.cache_enabled(),
            options: ExtractOptions {
                skip_debug: config.skip_debug(),
            },
            artifact_scopes: config.artifact_scopes(),
            project_scopes: config.project_scopes(),
            run_build: false,
        }
    }

    pub fn with_repository(mut self, root: impl Into<PathBuf>) -> Self {
        self.repository = Some(root.into());
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Enable or disable the on-disk summary cache.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    /// Ignore local variable debug tables when extracting symbols.
    pub fn skip_debug(mut self, enabled: bool) -> Self {
        self.options.skip_debug = enabled;
        self
    }

    pub fn with_artifact_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.artifact_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_project_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.project_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Run `mvn package` before reading a project.
    pub fn with_build(mut self, enabled: bool) -> Self {
        self.run_build = enabled;
        self
    }

    /// Repository root given explicitly, if any.
    pub fn repository(&self) -> Option<&Path> {
        self.repository.as_deref()
    }

    /// Cache directory given explicitly, if any.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    pub fn uses_cache(&self) -> bool {
        self.use_cache
    }

    fn repository_root(&self) -> DepauditResult<PathBuf> {
        self.repository
            .clone()
            .or_else(LocalRepository::default_root)
            .ok_or_else(|| {
                DepauditError::invalid_input("no local repository given and no home directory found")
            })
    }

    fn cache(&self, repository: &Path) -> Option<ArtifactCache> {
        if !self.use_cache {
            return None;
        }
        Some(match &self.cache_dir {
            Some(dir) => ArtifactCache::new(dir),
            None => ArtifactCache::in_repository(repository),
        })
    }

    /// A fresh resolver over the configured repository and cache.
    pub fn resolver(&self) -> DepauditResult<Resolver> {
        let root = self.repository_root()?;
        let cache = self.cache(&root);
        info!(
            repository = %root.display(),
            cache = ?cache.as_ref().map(|c| c.dir().to_path_buf()),
            "configured audit"
        );
        let repository = LocalRepository::new(&root)
            .with_scopes(self.artifact_scopes.clone())
            .with_list_scopes(self.project_scopes.clone());
        Ok(Resolver::new(repository)
            .with_cache(cache)
            .with_analyzer(ArtifactAnalyzer::new(self.options)))
    }

    /// Audit one published artifact, `group:artifact[:packaging[:classifier]]:version`.
    pub fn from_coordinate(&self, coordinate: &str) -> DepauditResult<Resolver> {
        let coordinate: Coordinate = coordinate.parse()?;
        self.resolver()?.from_coordinate(&coordinate)
    }

    /// Audit every dependency listed in a POM file.
    pub fn from_dependency_list(&self, document: &Path) -> DepauditResult<Resolver> {
        self.resolver()?.from_dependency_list(document)
    }

    /// Audit every module of a local project.
    pub fn from_project(&self, project: &Path) -> DepauditResult<Resolver> {
        let root = self.repository_root()?;
        let builder = MavenProjectBuilder::new(&root)
            .with_build(self.run_build)
            .with_scopes(self.project_scopes.clone());
        self.resolver()?.from_project(&builder, project)
    }
}
