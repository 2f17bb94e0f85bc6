//! Dependency sources
//!
//! The resolved origin of one dependency for one invocation. Exactly one
//! of the three kinds is populated; the kind enumeration is closed, so an
//! unknown serialized kind is a fatal parse error.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Why this source was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Origin {
  /// Declared default from the version declaration file
  Default,
  /// Explicit override persisted by a previous invocation
  Override,
  /// Discovered through another dependency's generated properties
  Transitive,
  #[default]
  Unknown,
}

/// The resolved origin of one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DependencySource {
  /// Published package-feed version; no local resolution needed
  Feed { version: String },

  /// Generated import of a sibling checkout
  Local { import: PathBuf },

  /// Artifact set of a named CI build. Unresolved until `version_file`
  /// has been attached by fetch.
  BuildServer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    build_type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_file: Option<PathBuf>,
  },
}

impl DependencySource {
  pub fn kind_name(&self) -> &'static str {
    match self {
      DependencySource::Feed { .. } => "Feed",
      DependencySource::Local { .. } => "Local",
      DependencySource::BuildServer { .. } => "BuildServer",
    }
  }

  /// Whether the source can be consumed without further fetching
  pub fn is_resolved(&self) -> bool {
    match self {
      DependencySource::Feed { .. } | DependencySource::Local { .. } => true,
      DependencySource::BuildServer { version_file, .. } => version_file.is_some(),
    }
  }

  /// Path of the resolved generated-properties import, if any
  pub fn import_path(&self) -> Option<&PathBuf> {
    match self {
      DependencySource::Local { import } => Some(import),
      DependencySource::BuildServer { version_file, .. } => version_file.as_ref(),
      DependencySource::Feed { .. } => None,
    }
  }
}
