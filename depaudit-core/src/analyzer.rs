//! Per-artifact analysis: extract symbols from every class, then attribute
//! each used class to the dependencies that define it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::debug;

use crate::classfile::{extract_symbols, to_external_name, ClassFileError, ClassSymbols, ExtractOptions};
use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult};
use crate::node;
use crate::scan::{self, ClassEntry};
use crate::summary::{ArtifactSummary, DependencySet, Mappings};

#[derive(Debug, Clone, Default)]
pub struct ArtifactAnalyzer {
    options: ExtractOptions,
}

impl ArtifactAnalyzer {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Analyze the classes at `location` against already-resolved direct
    /// dependencies.
    pub fn analyze(
        &self,
        coordinate: Coordinate,
        declared: DependencySet,
        location: &Path,
    ) -> DepauditResult<ArtifactSummary> {
        let entries = scan::collect_classes(location)?;
        let symbols = self.extract_all(location, &entries)?;
        debug!(
            coordinate = %coordinate,
            classes = entries.len(),
            defined = symbols.defined.len(),
            used = symbols.used.len(),
            "extracted class symbols"
        );
        Ok(attribute(coordinate, declared, symbols))
    }

    /// Extract every class in parallel and merge the results.
    pub fn extract_all(&self, location: &Path, entries: &[ClassEntry]) -> DepauditResult<ClassSymbols> {
        let per_class: Vec<ClassSymbols> = entries
            .par_iter()
            .map(|entry| {
                extract_symbols(&entry.bytes, &self.options)
                    .map_err(|e| class_error(location, entry, e))
            })
            .collect::<DepauditResult<_>>()?;

        let mut merged = ClassSymbols::default();
        for symbols in per_class {
            merged.merge(symbols);
        }
        Ok(merged)
    }
}

fn class_error(location: &Path, entry: &ClassEntry, error: ClassFileError) -> DepauditError {
    match error {
        ClassFileError::ArrayClassName(_) => {
            DepauditError::invalid_input(format!("{}: {}", entry.source, error))
        }
        _ => DepauditError::unreadable(location, format!("{}: {}", entry.source, error)),
    }
}

/// Build the summary from the merged symbols of an artifact.
///
/// Self-defined classes are removed from the used set before any
/// attribution happens.
pub fn attribute(
    coordinate: Coordinate,
    declared: DependencySet,
    symbols: ClassSymbols,
) -> ArtifactSummary {
    let ClassSymbols { defined, used } = symbols.without_defined();
    let flattened = declared.transitive_closure();

    let mut origins: BTreeMap<&str, BTreeSet<String>> =
        used.iter().map(|class| (class.as_str(), BTreeSet::new())).collect();
    let mut suppliers = DependencySet::new();
    for dependency in &flattened {
        let mut supplies = false;
        for class in dependency.defined_classes().intersection(&used) {
            if let Some(set) = origins.get_mut(class.as_str()) {
                set.insert(dependency.artifact_name());
                supplies = true;
            }
        }
        if supplies {
            suppliers.insert(Arc::clone(dependency));
        }
    }

    let used_names = suppliers.artifact_names();
    let unused = declared.filtered(|d| !used_names.contains(&d.artifact_name()));
    let undeclared = suppliers.filtered(|d| !declared.contains(d.coordinate()));

    let mappings = Mappings::new(node::compact(
        origins
            .into_iter()
            .map(|(class, origins)| (to_external_name(class), origins)),
    ));

    ArtifactSummary::new(
        coordinate,
        declared,
        flattened,
        defined,
        mappings,
        unused,
        undeclared,
    )
}
