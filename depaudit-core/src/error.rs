//! Typed error handling for depaudit.
//!
//! Every failure surfaces to the caller as a [`DepauditError`]; the core
//! never swallows an error it could not recover from.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::coordinate::Coordinate;

/// Main error type for depaudit operations.
#[derive(Error, Debug)]
pub enum DepauditError {
    /// The dependency walk re-entered a coordinate that was still being resolved.
    ///
    /// `path` starts at the offending coordinate and grows by one entry per
    /// frame while the error unwinds, ending at the root that started the walk.
    #[error("Found cyclical dependency: {}", CyclePath(.path))]
    CyclicalDependency { path: Vec<Coordinate> },

    /// A class file, jar or directory could not be read or parsed
    #[error("Unreadable artifact {path}: {message}")]
    UnreadableArtifact { path: PathBuf, message: String },

    /// The artifact provider could not fetch an artifact or its metadata
    #[error("Provider failed for {coordinate}: {message}")]
    Provider { coordinate: String, message: String },

    /// A cache entry exists but could not be decoded
    #[error("Corrupt cache entry {path}: {message}")]
    CorruptCache { path: PathBuf, message: String },

    /// Input with an unexpected shape (programmer error)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// The project build or project model loading failed
    #[error("Build error at {path}: {message}")]
    Build { path: PathBuf, message: String },
}

struct CyclePath<'a>(&'a [Coordinate]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, coordinate) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", coordinate)?;
        }
        f.write_str("]")
    }
}

impl DepauditError {
    /// Start a cycle report at the coordinate that was found in progress.
    pub fn cycle(coordinate: Coordinate) -> Self {
        Self::CyclicalDependency {
            path: vec![coordinate],
        }
    }

    /// Append the coordinate of an unwinding frame to a cycle report.
    ///
    /// Any other error kind is returned untouched.
    pub fn push_coordinate(mut self, coordinate: &Coordinate) -> Self {
        if let Self::CyclicalDependency { path } = &mut self {
            path.push(coordinate.clone());
        }
        self
    }

    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    pub fn unreadable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::UnreadableArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn provider(coordinate: impl fmt::Display, message: impl Into<String>) -> Self {
        Self::Provider {
            coordinate: coordinate.to_string(),
            message: message.into(),
        }
    }

    pub fn corrupt_cache(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptCache {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn build(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Build {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error can be recovered from by recomputing.
    ///
    /// Only a corrupt cache entry qualifies: it is treated as a miss.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CorruptCache { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::UnreadableArtifact { path, .. } => Some(path),
            Self::CorruptCache { path, .. } => Some(path),
            Self::Io { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            Self::Build { path, .. } => Some(path),
            _ => None,
        }
    }

    /// The cycle path for a [`DepauditError::CyclicalDependency`].
    pub fn cycle_path(&self) -> Option<&[Coordinate]> {
        match self {
            Self::CyclicalDependency { path } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for depaudit results.
pub type DepauditResult<T> = Result<T, DepauditError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> DepauditResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> DepauditResult<T> {
        self.map_err(|e| DepauditError::io(path, e))
    }
}
