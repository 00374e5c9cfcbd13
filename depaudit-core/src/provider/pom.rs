//! Project object model reading.
//!
//! A raw `pom.xml` is parsed with roxmltree and turned into an
//! [`EffectivePom`]: parent values inherited, `${...}` placeholders
//! interpolated, `dependencyManagement` applied (including BOM imports),
//! and every dependency given a concrete coordinate.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use crate::coordinate::{default_classifier, Coordinate, DEFAULT_PACKAGING};
use crate::error::{DepauditError, DepauditResult};

use super::repository::artifact_path;

/// Scope of a dependency that does not name one.
pub const DEFAULT_SCOPE: &str = "compile";

const DEFAULT_PARENT_PATH: &str = "../pom.xml";
const MAX_INTERPOLATION_PASSES: usize = 8;

#[derive(Debug, Clone, Default)]
struct PomModel {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    packaging: Option<String>,
    parent: Option<PomParent>,
    properties: HashMap<String, String>,
    dependency_management: Vec<RawDependency>,
    dependencies: Vec<RawDependency>,
    modules: Vec<String>,
}

#[derive(Debug, Clone)]
struct PomParent {
    group_id: String,
    artifact_id: String,
    version: String,
    relative_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct RawDependency {
    group_id: Option<String>,
    artifact_id: Option<String>,
    version: Option<String>,
    scope: Option<String>,
    optional: bool,
    classifier: Option<String>,
    dep_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ManagedDependency {
    version: String,
    scope: Option<String>,
    classifier: Option<String>,
}

/// A dependency with its coordinate fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PomDependency {
    pub coordinate: Coordinate,
    pub scope: String,
    pub optional: bool,
}

/// A POM after inheritance, interpolation and management.
#[derive(Debug, Clone)]
pub struct EffectivePom {
    coordinate: Coordinate,
    properties: HashMap<String, String>,
    dependency_management: HashMap<(String, String), ManagedDependency>,
    dependencies: Vec<PomDependency>,
    modules: Vec<String>,
}

impl EffectivePom {
    /// Coordinate of the project itself, packaging included.
    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn dependencies(&self) -> &[PomDependency] {
        &self.dependencies
    }

    /// Declared `<modules>` entries, relative to the POM's directory.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Coordinates of non-optional dependencies whose scope is in `scopes`.
    pub fn dependencies_in<S: AsRef<str>>(&self, scopes: &[S]) -> Vec<Coordinate> {
        self.dependencies
            .iter()
            .filter(|dep| !dep.optional)
            .filter(|dep| scopes.iter().any(|s| s.as_ref() == dep.scope))
            .map(|dep| dep.coordinate.clone())
            .collect()
    }
}

/// Loads effective POMs from files and from a local repository.
///
/// Parsed POMs are memoized by file path for the lifetime of the resolver.
#[derive(Debug)]
pub struct PomResolver {
    repository: PathBuf,
    memo: Mutex<HashMap<PathBuf, Arc<EffectivePom>>>,
}

impl PomResolver {
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// Effective POM of a published coordinate.
    pub fn load(&self, coordinate: &Coordinate) -> DepauditResult<Arc<EffectivePom>> {
        let pom = Coordinate::with_packaging(
            coordinate.group_id(),
            coordinate.artifact_id(),
            coordinate.version(),
            "pom",
        );
        let path = artifact_path(&self.repository, &pom);
        if !path.exists() {
            return Err(DepauditError::provider(
                coordinate,
                format!("no POM at {}", path.display()),
            ));
        }
        self.load_file(&path)
    }

    /// Effective POM of a `pom.xml` on disk.
    pub fn load_file(&self, path: &Path) -> DepauditResult<Arc<EffectivePom>> {
        let mut stack = HashSet::new();
        self.load_effective(path, &mut stack)
    }

    fn load_effective(
        &self,
        path: &Path,
        stack: &mut HashSet<PathBuf>,
    ) -> DepauditResult<Arc<EffectivePom>> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(existing) = self.memo.lock().ok().and_then(|memo| memo.get(&key).cloned()) {
            return Ok(existing);
        }
        if !stack.insert(key.clone()) {
            return Err(DepauditError::provider(
                path.display(),
                "cycle while resolving parent or imported POMs",
            ));
        }

        let text = fs::read_to_string(path).map_err(|e| {
            DepauditError::provider(path.display(), format!("cannot read POM: {}", e))
        })?;
        let mut model = PomModel::parse(&text).map_err(|message| {
            DepauditError::provider(path.display(), message)
        })?;

        let parent = match &model.parent {
            Some(parent) => Some(self.load_parent(path, parent, stack)?),
            None => None,
        };

        let coordinate = model_coordinate(path, &model, parent.as_deref())?;
        let properties = property_context(&coordinate, &model, parent.as_deref());
        self.expand_imports(&coordinate, &mut model, &properties, stack)?;

        let effective = Arc::new(EffectivePom::from_model(
            coordinate,
            model,
            properties,
            parent.as_deref(),
        )?);

        stack.remove(&key);
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(key, Arc::clone(&effective));
        }
        Ok(effective)
    }

    /// Parent from `relativePath` when it is the right project, otherwise
    /// from the repository.
    fn load_parent(
        &self,
        child: &Path,
        parent: &PomParent,
        stack: &mut HashSet<PathBuf>,
    ) -> DepauditResult<Arc<EffectivePom>> {
        let relative = parent.relative_path.as_deref().unwrap_or(DEFAULT_PARENT_PATH);
        if !relative.is_empty() {
            let mut candidate = child.parent().unwrap_or(Path::new(".")).join(relative);
            if candidate.is_dir() {
                candidate = candidate.join("pom.xml");
            }
            if candidate.is_file() {
                let local = self.load_effective(&candidate, stack)?;
                if local.coordinate.group_id() == parent.group_id
                    && local.coordinate.artifact_id() == parent.artifact_id
                {
                    return Ok(local);
                }
                debug!(
                    path = %candidate.display(),
                    "relative parent does not match, using repository"
                );
            }
        }

        let coordinate = Coordinate::with_packaging(
            &parent.group_id,
            &parent.artifact_id,
            &parent.version,
            "pom",
        );
        let path = artifact_path(&self.repository, &coordinate);
        if !path.exists() {
            return Err(DepauditError::provider(
                &coordinate,
                format!("parent POM not found at {}", path.display()),
            ));
        }
        self.load_effective(&path, stack)
    }

    /// Replace `import`-scoped BOM entries with the BOM's managed versions.
    fn expand_imports(
        &self,
        coordinate: &Coordinate,
        model: &mut PomModel,
        properties: &HashMap<String, String>,
        stack: &mut HashSet<PathBuf>,
    ) -> DepauditResult<()> {
        let mut retained = Vec::new();
        for entry in model.dependency_management.drain(..) {
            let is_import = matches!(entry.dep_type.as_deref(), Some(t) if t.eq_ignore_ascii_case("pom"))
                && matches!(entry.scope.as_deref(), Some(s) if s.eq_ignore_ascii_case("import"));
            if !is_import {
                retained.push(entry);
                continue;
            }

            let (group, artifact) = required_name(coordinate, &entry, properties)?;
            let version = resolve_property(entry.version.as_deref(), properties).ok_or_else(|| {
                DepauditError::provider(
                    coordinate,
                    format!("imported BOM {}:{} has no version", group, artifact),
                )
            })?;
            let bom = Coordinate::with_packaging(group, artifact, version, "pom");
            let path = artifact_path(&self.repository, &bom);
            if !path.exists() {
                return Err(DepauditError::provider(
                    &bom,
                    format!("imported BOM not found at {}", path.display()),
                ));
            }
            let imported = self.load_effective(&path, stack)?;
            for ((group, artifact), managed) in &imported.dependency_management {
                retained.push(RawDependency {
                    group_id: Some(group.clone()),
                    artifact_id: Some(artifact.clone()),
                    version: Some(managed.version.clone()),
                    scope: managed.scope.clone(),
                    classifier: managed.classifier.clone(),
                    ..RawDependency::default()
                });
            }
        }
        model.dependency_management = retained;
        Ok(())
    }
}

fn model_coordinate(
    path: &Path,
    model: &PomModel,
    parent: Option<&EffectivePom>,
) -> DepauditResult<Coordinate> {
    let missing = |field: &str| DepauditError::provider(path.display(), format!("POM has no {}", field));

    let group = model
        .group_id
        .clone()
        .or_else(|| parent.map(|p| p.coordinate.group_id().to_string()))
        .ok_or_else(|| missing("groupId"))?;
    let artifact = model.artifact_id.clone().ok_or_else(|| missing("artifactId"))?;
    let version = model
        .version
        .clone()
        .or_else(|| parent.map(|p| p.coordinate.version().to_string()))
        .ok_or_else(|| missing("version"))?;

    // Own coordinates may only reference properties, parent values included.
    let mut context = parent.map(|p| p.properties.clone()).unwrap_or_default();
    context.extend(model.properties.clone());
    let resolve = |value: &str, field: &str| {
        resolve_property(Some(value), &context).ok_or_else(|| missing(field))
    };

    Ok(Coordinate::with_packaging(
        resolve(&group, "groupId")?,
        artifact,
        resolve(&version, "version")?,
        model.packaging.as_deref().unwrap_or(DEFAULT_PACKAGING),
    ))
}

fn property_context(
    coordinate: &Coordinate,
    model: &PomModel,
    parent: Option<&EffectivePom>,
) -> HashMap<String, String> {
    let mut properties = parent.map(|p| p.properties.clone()).unwrap_or_default();
    properties.extend(model.properties.clone());
    properties.insert("project.groupId".to_string(), coordinate.group_id().to_string());
    properties.insert("project.artifactId".to_string(), coordinate.artifact_id().to_string());
    properties.insert("project.version".to_string(), coordinate.version().to_string());
    if let Some(parent) = parent {
        properties.insert(
            "project.parent.groupId".to_string(),
            parent.coordinate.group_id().to_string(),
        );
        properties.insert(
            "project.parent.artifactId".to_string(),
            parent.coordinate.artifact_id().to_string(),
        );
        properties.insert(
            "project.parent.version".to_string(),
            parent.coordinate.version().to_string(),
        );
    }
    properties
}

fn required_name(
    coordinate: &Coordinate,
    entry: &RawDependency,
    properties: &HashMap<String, String>,
) -> DepauditResult<(String, String)> {
    let group = resolve_property(entry.group_id.as_deref(), properties)
        .ok_or_else(|| DepauditError::provider(coordinate, "dependency without groupId"))?;
    let artifact = resolve_property(entry.artifact_id.as_deref(), properties)
        .ok_or_else(|| DepauditError::provider(coordinate, "dependency without artifactId"))?;
    Ok((group, artifact))
}

impl EffectivePom {
    fn from_model(
        coordinate: Coordinate,
        model: PomModel,
        properties: HashMap<String, String>,
        parent: Option<&EffectivePom>,
    ) -> DepauditResult<Self> {
        let mut dependency_management = parent
            .map(|p| p.dependency_management.clone())
            .unwrap_or_default();
        for entry in model.dependency_management {
            let (group, artifact) = required_name(&coordinate, &entry, &properties)?;
            let Some(version) = resolve_property(entry.version.as_deref(), &properties) else {
                warn!(
                    group = %group,
                    artifact = %artifact,
                    "managed dependency has no version, skipping"
                );
                continue;
            };
            dependency_management.insert(
                (group, artifact),
                ManagedDependency {
                    version,
                    scope: entry.scope,
                    classifier: entry.classifier,
                },
            );
        }

        let mut dependencies: Vec<PomDependency> = Vec::new();
        let own_names: HashSet<(Option<&str>, Option<&str>)> = model
            .dependencies
            .iter()
            .map(|d| (d.group_id.as_deref(), d.artifact_id.as_deref()))
            .collect();
        if let Some(parent) = parent {
            dependencies.extend(parent.dependencies.iter().filter(|dep| {
                let key = (Some(dep.coordinate.group_id()), Some(dep.coordinate.artifact_id()));
                !own_names.contains(&key)
            }).cloned());
        }

        for dependency in &model.dependencies {
            let (group, artifact) = required_name(&coordinate, dependency, &properties)?;
            let managed = dependency_management.get(&(group.clone(), artifact.clone()));
            let version = match resolve_property(dependency.version.as_deref(), &properties) {
                Some(version) => version,
                None => match managed {
                    Some(managed) => managed.version.clone(),
                    None => {
                        return Err(DepauditError::provider(
                            &coordinate,
                            format!("cannot determine version of {}:{}", group, artifact),
                        ))
                    }
                },
            };

            let packaging = resolve_property(dependency.dep_type.as_deref(), &properties)
                .unwrap_or_else(|| DEFAULT_PACKAGING.to_string());
            let classifier = resolve_property(dependency.classifier.as_deref(), &properties)
                .or_else(|| managed.and_then(|m| m.classifier.clone()))
                .unwrap_or_else(|| default_classifier(&packaging).to_string());
            let scope = dependency
                .scope
                .clone()
                .or_else(|| managed.and_then(|m| m.scope.clone()))
                .unwrap_or_else(|| DEFAULT_SCOPE.to_string());

            dependencies.push(PomDependency {
                coordinate: Coordinate::with_classifier(group, artifact, version, packaging, classifier),
                scope,
                optional: dependency.optional,
            });
        }

        Ok(Self {
            coordinate,
            properties,
            dependency_management,
            dependencies,
            modules: model.modules,
        })
    }
}

impl PomModel {
    fn parse(xml: &str) -> Result<Self, String> {
        let document =
            Document::parse(xml).map_err(|e| format!("invalid POM XML: {}", e))?;
        let project = document
            .descendants()
            .find(|node| node.has_tag_name("project"))
            .ok_or_else(|| "POM has no <project> element".to_string())?;

        let parent = child(&project, "parent").map(parse_parent).transpose()?;
        let modules = child(&project, "modules")
            .map(|modules| {
                modules
                    .children()
                    .filter(|n| n.is_element() && n.tag_name().name() == "module")
                    .filter_map(|n| n.text())
                    .map(|text| text.trim().to_string())
                    .filter(|text| !text.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            group_id: node_text(&project, "groupId"),
            artifact_id: node_text(&project, "artifactId"),
            version: node_text(&project, "version"),
            packaging: node_text(&project, "packaging"),
            parent,
            properties: parse_properties(&project),
            dependency_management: child(&project, "dependencyManagement")
                .map(|dm| parse_dependencies(&dm))
                .unwrap_or_default(),
            dependencies: parse_dependencies(&project),
            modules,
        })
    }
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == tag)
}

fn node_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|c| c.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn parse_parent(node: Node<'_, '_>) -> Result<PomParent, String> {
    let field = |tag: &str| node_text(&node, tag).ok_or_else(|| format!("parent.{} is missing", tag));
    Ok(PomParent {
        group_id: field("groupId")?,
        artifact_id: field("artifactId")?,
        version: field("version")?,
        // An empty <relativePath/> disables the filesystem lookup.
        relative_path: child(&node, "relativePath")
            .map(|n| n.text().map(|t| t.trim().to_string()).unwrap_or_default()),
    })
}

fn parse_properties(node: &Node<'_, '_>) -> HashMap<String, String> {
    child(node, "properties")
        .map(|props| {
            props
                .children()
                .filter(|c| c.is_element())
                .filter_map(|prop| {
                    let value = prop.text().map(|t| t.trim().to_string())?;
                    Some((prop.tag_name().name().to_string(), value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// `<dependencies>` children of `node`.
fn parse_dependencies(node: &Node<'_, '_>) -> Vec<RawDependency> {
    let Some(deps) = child(node, "dependencies") else {
        return Vec::new();
    };
    deps.children()
        .filter(|c| c.is_element() && c.tag_name().name() == "dependency")
        .map(|dep| RawDependency {
            group_id: node_text(&dep, "groupId"),
            artifact_id: node_text(&dep, "artifactId"),
            version: node_text(&dep, "version"),
            scope: node_text(&dep, "scope"),
            optional: node_text(&dep, "optional")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            classifier: node_text(&dep, "classifier"),
            dep_type: node_text(&dep, "type"),
        })
        .collect()
}

fn resolve_property(value: Option<&str>, properties: &HashMap<String, String>) -> Option<String> {
    let mut current = value?.trim().to_string();
    if current.is_empty() {
        return None;
    }

    let mut passes = 0;
    while current.contains("${") {
        passes += 1;
        if passes > MAX_INTERPOLATION_PASSES {
            return None;
        }
        current = resolve_placeholders(&current, properties).ok()?;
    }
    Some(current)
}

fn resolve_placeholders(raw: &str, properties: &HashMap<String, String>) -> Result<String, String> {
    let mut result = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let suffix = &rest[start + 2..];
        let end = suffix
            .find('}')
            .ok_or_else(|| format!("unterminated property reference in {}", raw))?;
        let key = &suffix[..end];
        let replacement = properties
            .get(key)
            .ok_or_else(|| format!("undefined property {}", key))?;
        result.push_str(replacement);
        rest = &suffix[end + 1..];
    }
    result.push_str(rest);
    Ok(result)
}
