//! Per-artifact disk cache of analysis results.
//!
//! Each coordinate owns one gzip-compressed JSON file named after its
//! [`Coordinate::cache_key`]. Entries are never invalidated: a published
//! coordinate is assumed to be immutable.
//!
//! # Cache Versioning
//!
//! Every record carries [`RecordMetadata`](crate::record::RecordMetadata).
//! A record written by another format version is reported as a miss and
//! overwritten on the next store.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info};

use crate::coordinate::Coordinate;
use crate::error::{DepauditError, DepauditResult, IoResultExt};
use crate::record::{ArtifactRecord, CachedArtifact, CACHE_VERSION};
use crate::summary::ArtifactSummary;

/// Subdirectory of the local repository holding cache entries.
pub const CACHE_DIR_NAME: &str = "dependency-data";

const ENTRY_SUFFIX: &str = ".json.gz";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCache {
    dir: PathBuf,
}

impl ArtifactCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Cache stored beside the artifacts of a local repository.
    pub fn in_repository(repository: &Path) -> Self {
        Self::new(repository.join(CACHE_DIR_NAME))
    }

    /// `~/.m2/repository/dependency-data`, if a home directory is known.
    pub fn default_location() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".m2").join("repository").join(CACHE_DIR_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, coordinate: &Coordinate) -> PathBuf {
        self.dir.join(format!("{}{}", coordinate.cache_key(), ENTRY_SUFFIX))
    }

    /// Read the entry for `coordinate`.
    ///
    /// Returns `Ok(None)` when there is no entry or it was written by an
    /// incompatible version. A truncated or undecodable entry is a
    /// [`DepauditError::CorruptCache`].
    pub fn load(&self, coordinate: &Coordinate) -> DepauditResult<Option<CachedArtifact>> {
        let path = self.entry_path(coordinate);
        if !path.exists() {
            debug!(coordinate = %coordinate, "cache miss");
            return Ok(None);
        }

        let file = File::open(&path).with_path(&path)?;
        let record: ArtifactRecord =
            serde_json::from_reader(BufReader::new(GzDecoder::new(file)))
                .map_err(|e| DepauditError::corrupt_cache(&path, e.to_string()))?;

        if !record.metadata.is_compatible() {
            info!(
                coordinate = %coordinate,
                cached = record.metadata.cache_version,
                current = CACHE_VERSION,
                "cache version mismatch, recomputing"
            );
            return Ok(None);
        }
        if &record.coordinate != coordinate {
            return Err(DepauditError::corrupt_cache(
                &path,
                format!("entry belongs to {}", record.coordinate),
            ));
        }

        debug!(coordinate = %coordinate, "cache hit");
        Ok(Some(record.into_cached()))
    }

    /// Write the entry for `summary`, replacing any previous one.
    ///
    /// The record is written to a temporary file first and renamed into
    /// place, so a crash never leaves a half-written entry under the final
    /// name.
    pub fn store(&self, summary: &ArtifactSummary) -> DepauditResult<PathBuf> {
        fs::create_dir_all(&self.dir).with_path(&self.dir)?;

        let path = self.entry_path(summary.coordinate());
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_path = self.dir.join(format!(
            "{}{}.{}.{}.tmp",
            summary.coordinate().cache_key(),
            ENTRY_SUFFIX,
            std::process::id(),
            nanos
        ));

        let record = ArtifactRecord::from_summary(summary);
        if let Err(e) = write_record(&temp_path, &record) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(DepauditError::io(&path, e));
        }

        debug!(coordinate = %summary.coordinate(), path = %path.display(), "cache entry written");
        Ok(path)
    }
}

fn write_record(path: &Path, record: &ArtifactRecord) -> DepauditResult<()> {
    let file = File::create(path).with_path(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, record)
        .map_err(|e| DepauditError::io(path, std::io::Error::other(e)))?;
    let writer = encoder.finish().with_path(path)?;
    writer
        .into_inner()
        .map_err(|e| DepauditError::io(path, e.into_error()))?
        .sync_all()
        .with_path(path)
}
