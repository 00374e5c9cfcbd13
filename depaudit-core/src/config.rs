//! Configuration loading from depaudit.toml.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DepauditError, DepauditResult, IoResultExt};
use crate::provider::{ARTIFACT_SCOPES, PROJECT_SCOPES};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "depaudit.toml";

/// Main configuration structure for depaudit.toml.
///
/// Every key is optional; absent keys fall back to built-in defaults.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DepauditConfig {
    /// Local repository root.
    pub repository: Option<PathBuf>,
    /// Cache directory, overriding `<repository>/dependency-data`.
    pub cache_dir: Option<PathBuf>,
    pub cache: Option<CacheConfig>,
    pub analysis: Option<AnalysisConfig>,
    pub scopes: Option<ScopeConfig>,
    pub output: Option<OutputConfig>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Skip `LocalVariableTable` descriptors.
    pub skip_debug: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ScopeConfig {
    /// Scopes followed for published artifacts.
    pub artifact: Option<Vec<String>>,
    /// Scopes taken from local project modules and dependency lists.
    pub project: Option<Vec<String>>,
}

/// Output format configuration.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output format: "plain" or "json".
    pub format: Option<String>,
}

impl DepauditConfig {
    pub fn cache_enabled(&self) -> bool {
        self.cache.as_ref().and_then(|c| c.enabled).unwrap_or(true)
    }

    pub fn skip_debug(&self) -> bool {
        self.analysis.as_ref().and_then(|a| a.skip_debug).unwrap_or(false)
    }

    pub fn artifact_scopes(&self) -> Vec<String> {
        self.scopes
            .as_ref()
            .and_then(|s| s.artifact.clone())
            .unwrap_or_else(|| ARTIFACT_SCOPES.iter().map(|s| s.to_string()).collect())
    }

    pub fn project_scopes(&self) -> Vec<String> {
        self.scopes
            .as_ref()
            .and_then(|s| s.project.clone())
            .unwrap_or_else(|| PROJECT_SCOPES.iter().map(|s| s.to_string()).collect())
    }

    pub fn output_format(&self) -> &str {
        self.output
            .as_ref()
            .and_then(|o| o.format.as_deref())
            .unwrap_or("plain")
    }
}

/// Loads configuration from depaudit.toml in `root` if it exists.
pub fn load_config(root: &Path) -> DepauditResult<Option<DepauditConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }
    load_config_file(&path).map(Some)
}

/// Loads an explicitly named configuration file.
pub fn load_config_file(path: &Path) -> DepauditResult<DepauditConfig> {
    let content = fs::read_to_string(path).with_path(path)?;
    let cfg: DepauditConfig =
        toml::from_str(&content).map_err(|e| DepauditError::config(path, e.to_string()))?;

    if let Some(format) = cfg.output.as_ref().and_then(|o| o.format.as_deref()) {
        if format != "plain" && format != "json" {
            return Err(DepauditError::config(
                path,
                format!("unknown output format {:?}", format),
            ));
        }
    }
    Ok(cfg)
}
