//! Class-file discovery inside an artifact location.
//!
//! A location is a jar (any zip archive), a single `.class` file, or a
//! directory walked recursively. Jars found inside a directory are opened
//! as well. Every entry ending in `.class` is returned with its bytes;
//! everything else is ignored.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{DepauditError, DepauditResult, IoResultExt};

const CLASS_EXTENSION: &str = "class";
const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "war", "zip"];

/// Bytes of one class file and where they came from.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    /// File path, or `archive!/entry` for archive members.
    pub source: String,
    pub bytes: Vec<u8>,
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

fn is_hidden_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Collect every class file reachable from `location`.
///
/// A location that does not exist is an [`DepauditError::UnreadableArtifact`].
/// Entries come back sorted by source so repeated runs see the same order.
pub fn collect_classes(location: &Path) -> DepauditResult<Vec<ClassEntry>> {
    if !location.exists() {
        return Err(DepauditError::unreadable(location, "does not exist"));
    }

    let mut entries = if location.is_dir() {
        collect_directory(location)?
    } else if has_extension(location, &[CLASS_EXTENSION]) {
        vec![read_class_file(location)?]
    } else if has_extension(location, &["pom", "xml"]) {
        debug!(location = %location.display(), "pom artifact carries no classes");
        Vec::new()
    } else {
        read_archive(location)?
    };

    entries.sort_by(|a, b| a.source.cmp(&b.source));
    debug!(
        location = %location.display(),
        classes = entries.len(),
        "collected class files"
    );
    Ok(entries)
}

fn collect_directory(root: &Path) -> DepauditResult<Vec<ClassEntry>> {
    let files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_hidden_dir(e))
        .map(|entry| {
            entry.map_err(|e| {
                let path = e.path().unwrap_or(root).to_path_buf();
                DepauditError::unreadable(path, e.to_string())
            })
        })
        .filter_map(|entry| match entry {
            Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        })
        .collect::<DepauditResult<_>>()?;

    let nested: Vec<Vec<ClassEntry>> = files
        .par_iter()
        .filter_map(|path| {
            if has_extension(path, &[CLASS_EXTENSION]) {
                Some(read_class_file(path).map(|entry| vec![entry]))
            } else if has_extension(path, ARCHIVE_EXTENSIONS) {
                Some(read_archive(path))
            } else {
                None
            }
        })
        .collect::<DepauditResult<_>>()?;

    Ok(nested.into_iter().flatten().collect())
}

fn read_class_file(path: &Path) -> DepauditResult<ClassEntry> {
    let bytes = fs::read(path).with_path(path)?;
    Ok(ClassEntry {
        source: path.display().to_string(),
        bytes,
    })
}

fn read_archive(path: &Path) -> DepauditResult<Vec<ClassEntry>> {
    let file = File::open(path).with_path(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| DepauditError::unreadable(path, e.to_string()))?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| DepauditError::unreadable(path, e.to_string()))?;
        if !entry.is_file() || !entry.name().ends_with(".class") {
            continue;
        }
        let source = format!("{}!/{}", path.display(), entry.name());
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| DepauditError::unreadable(path, format!("{}: {}", source, e)))?;
        entries.push(ClassEntry { source, bytes });
    }
    Ok(entries)
}
