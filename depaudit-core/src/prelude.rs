//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use depaudit_core::prelude::*;
//! ```

pub use crate::builder::DepAudit;
pub use crate::config::{load_config, DepauditConfig};
pub use crate::coordinate::Coordinate;
pub use crate::error::{DepauditError, DepauditResult};
pub use crate::resolver::Resolver;
pub use crate::summary::{ArtifactSummary, DependencySet, Mappings};

pub use crate::report::{dependency_tree, usage_lines};

#[cfg(feature = "graph")]
pub use crate::graph::generate_dot;
