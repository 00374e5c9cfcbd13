//! Canonical artifact identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DepauditError, DepauditResult};

/// Packaging assumed when a coordinate does not name one.
pub const DEFAULT_PACKAGING: &str = "jar";

/// Immutable identity of an artifact.
///
/// Equality and hashing cover all five fields. The textual form is
/// `groupId:artifactId:packaging[:classifier]:version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    group_id: String,
    artifact_id: String,
    version: String,
    #[serde(rename = "packagingType")]
    packaging: String,
    classifier: String,
}

impl Coordinate {
    /// A `jar` coordinate without classifier.
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self::with_packaging(group_id, artifact_id, version, DEFAULT_PACKAGING)
    }

    /// A coordinate whose classifier is the packaging's default one.
    pub fn with_packaging(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        packaging: impl Into<String>,
    ) -> Self {
        let packaging = packaging.into();
        let classifier = default_classifier(&packaging).to_string();
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            packaging,
            classifier,
        }
    }

    pub fn with_classifier(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
        packaging: impl Into<String>,
        classifier: impl Into<String>,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version: version.into(),
            packaging: packaging.into(),
            classifier: classifier.into(),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn artifact_id(&self) -> &str {
        &self.artifact_id
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn packaging(&self) -> &str {
        &self.packaging
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    /// `groupId:artifactId`, the version-independent name of the artifact.
    pub fn artifact_name(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    /// Filename-safe key identifying this coordinate in the artifact cache.
    ///
    /// Plain jars encode as `g_a_v`; other packagings and classifiers are
    /// spelled out. `_` only ever separates fields: any other character
    /// outside `[A-Za-z0-9.-]`, `_` included, is percent-encoded, so two
    /// distinct coordinates never share a key.
    pub fn cache_key(&self) -> String {
        let mut parts = vec![self.group_id.as_str(), self.artifact_id.as_str()];
        let plain = self.packaging == DEFAULT_PACKAGING && self.classifier.is_empty();
        if !plain {
            parts.push(&self.packaging);
            if !self.classifier.is_empty() {
                parts.push(&self.classifier);
            }
        }
        parts.push(&self.version);
        parts
            .iter()
            .map(|part| sanitize(part))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Classifier implied by a packaging type.
pub fn default_classifier(packaging: &str) -> &'static str {
    match packaging {
        "test-jar" => "tests",
        _ => "",
    }
}

fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-') {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    out
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.packaging)?;
        if !self.classifier.is_empty() {
            write!(f, ":{}", self.classifier)?;
        }
        write!(f, ":{}", self.version)
    }
}

impl FromStr for Coordinate {
    type Err = DepauditError;

    /// Accepts `g:a:v`, `g:a:packaging:v` and `g:a:packaging:classifier:v`.
    fn from_str(s: &str) -> DepauditResult<Self> {
        let parts: Vec<&str> = s.trim().split(':').collect();
        let coordinate = match parts.as_slice() {
            [g, a, v] => Self::new(*g, *a, *v),
            [g, a, p, v] => Self::with_packaging(*g, *a, *v, *p),
            [g, a, p, c, v] => Self::with_classifier(*g, *a, *v, *p, *c),
            _ => {
                return Err(DepauditError::invalid_input(format!(
                    "Not a valid coordinate: {}",
                    s
                )))
            }
        };
        if coordinate.group_id.is_empty()
            || coordinate.artifact_id.is_empty()
            || coordinate.version.is_empty()
        {
            return Err(DepauditError::invalid_input(format!(
                "Not a valid coordinate: {}",
                s
            )));
        }
        Ok(coordinate)
    }
}
