//! Local multi-module Maven projects.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{DepauditError, DepauditResult};

use super::pom::PomResolver;
use super::{ProjectBuilder, ProjectModule, PROJECT_SCOPES};

const PROJECT_FILE: &str = "pom.xml";

/// Reads `pom.xml` files of a project tree, optionally running the build
/// tool first so that `target/` is populated.
#[derive(Debug)]
pub struct MavenProjectBuilder {
    poms: PomResolver,
    run_build: bool,
    command: String,
    scopes: Vec<String>,
}

impl MavenProjectBuilder {
    /// `repository` is where parents and imported BOMs outside the project
    /// tree are looked up.
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            poms: PomResolver::new(repository),
            run_build: false,
            command: "mvn".to_string(),
            scopes: PROJECT_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Run `mvn -q -DskipTests package` before reading the modules.
    pub fn with_build(mut self, enabled: bool) -> Self {
        self.run_build = enabled;
        self
    }

    /// Build tool executable, `mvn` by default.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    fn compile(&self, pom: &Path) -> DepauditResult<()> {
        info!(project = %pom.display(), command = %self.command, "building project");
        let status = Command::new(&self.command)
            .arg("-q")
            .arg("-DskipTests")
            .arg("-f")
            .arg(pom)
            .arg("package")
            .status()
            .map_err(|e| DepauditError::build(pom, format!("cannot run {}: {}", self.command, e)))?;
        if !status.success() {
            return Err(DepauditError::build(
                pom,
                format!("{} exited with {}", self.command, status),
            ));
        }
        Ok(())
    }

    fn collect(
        &self,
        pom_path: &Path,
        visited: &mut HashSet<PathBuf>,
        out: &mut Vec<ProjectModule>,
    ) -> DepauditResult<()> {
        if !visited.insert(pom_path.to_path_buf()) {
            return Ok(());
        }
        let pom = self.poms.load_file(pom_path)?;
        let dir = pom_path.parent().unwrap_or(Path::new("."));

        for module in pom.modules() {
            let child = project_file(&dir.join(module));
            if !child.is_file() {
                return Err(DepauditError::build(
                    pom_path,
                    format!("module {} has no {}", module, PROJECT_FILE),
                ));
            }
            self.collect(&child, visited, out)?;
        }

        let coordinate = pom.coordinate().clone();
        let location = if coordinate.packaging() == "pom" {
            pom_path.to_path_buf()
        } else {
            module_location(dir, coordinate.artifact_id(), coordinate.version())
        };
        let dependencies = pom.dependencies_in(self.scopes.as_slice());
        debug!(
            module = %coordinate,
            location = %location.display(),
            dependencies = dependencies.len(),
            "project module"
        );
        out.push(ProjectModule {
            coordinate,
            location,
            dependencies,
        });
        Ok(())
    }
}

impl ProjectBuilder for MavenProjectBuilder {
    fn build(&self, project: &Path) -> DepauditResult<Vec<ProjectModule>> {
        let pom = project_file(project);
        if !pom.is_file() {
            return Err(DepauditError::build(project, "no project file found"));
        }
        if self.run_build {
            self.compile(&pom)?;
        }

        let mut modules = Vec::new();
        self.collect(&pom, &mut HashSet::new(), &mut modules)?;
        Ok(modules)
    }
}

/// `pom.xml` inside a directory, or the path itself.
fn project_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        path.join(PROJECT_FILE)
    } else {
        path.to_path_buf()
    }
}

/// `target/classes`, or the packaged jar when only that exists.
fn module_location(dir: &Path, artifact_id: &str, version: &str) -> PathBuf {
    let target = dir.join("target");
    let classes = target.join("classes");
    if classes.is_dir() {
        return classes;
    }
    let jar = target.join(format!("{}-{}.jar", artifact_id, version));
    if jar.is_file() {
        return jar;
    }
    classes
}
