//! Generated version-properties file
//!
//! The contract consumed by downstream repositories that declare this
//! product as a dependency: computed package/preview/assembly versions,
//! the build configuration, artifact directory paths and per-dependency
//! metadata. Written by prepare, read back for staleness checks and by
//! version-inheriting consumers.

use crate::core::config::{Configuration, ShipConfig};
use crate::core::error::{ConfigError, ShipError, ShipResult};
use crate::deps::overrides::DependencyOverrideFile;
use crate::deps::source::DependencySource;
use crate::version::resolver::BuildInfo;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const GENERATED_DIR: &str = "generated";

/// Per-dependency metadata exposed to downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyProps {
  pub kind: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub version: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub build_number: Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch: Option<String>,
}

/// The generated property document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedProps {
  pub product: String,
  pub configuration: Configuration,
  pub main_version: String,
  pub package_version: String,
  pub preview_version: String,
  pub assembly_version: String,
  pub generated_at: DateTime<Utc>,
  pub artifacts_dir: PathBuf,
  pub test_results_dir: PathBuf,
  /// Declared dependency name list
  #[serde(default)]
  pub dependencies: Vec<String>,
  #[serde(default)]
  pub dependency: BTreeMap<String, DependencyProps>,
}

impl GeneratedProps {
  /// Path of the generated properties file for a product
  pub fn path_for(root: &Path, product: &str) -> PathBuf {
    ShipConfig::state_dir(root)
      .join(GENERATED_DIR)
      .join(format!("{}.props.toml", product))
  }

  /// Assemble the document from a build and the resolved overrides
  pub fn assemble(config: &ShipConfig, build: &BuildInfo, overrides: &DependencyOverrideFile) -> Self {
    let dependency = overrides
      .dependencies
      .iter()
      .map(|(name, entry)| {
        let (version, build_number, branch) = match &entry.source {
          DependencySource::Feed { version } => (Some(version.clone()), None, None),
          DependencySource::Local { .. } => (None, None, None),
          DependencySource::BuildServer {
            branch, build_number, ..
          } => (None, *build_number, branch.clone()),
        };
        (
          name.clone(),
          DependencyProps {
            kind: entry.source.kind_name().to_string(),
            version,
            build_number,
            branch,
          },
        )
      })
      .collect();

    Self {
      product: config.product.name.clone(),
      configuration: build.configuration,
      main_version: build.components.main_version.clone(),
      package_version: build.package_version.clone(),
      preview_version: build.preview_version.clone(),
      assembly_version: build.assembly_version.clone(),
      generated_at: Utc::now(),
      artifacts_dir: config.build.artifacts_dir.clone(),
      test_results_dir: config.test.results_dir.clone(),
      dependencies: overrides.dependencies.keys().cloned().collect(),
      dependency,
    }
  }

  pub fn load(path: &Path) -> ShipResult<Self> {
    let text = fs::read_to_string(path).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
      })
    })?;
    toml_edit::de::from_str(&text).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
      })
    })
  }

  /// Write atomically (tmp + rename)
  pub fn save(&self, path: &Path) -> ShipResult<()> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }
    let text = toml_edit::ser::to_string_pretty(self)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path)?;
    Ok(())
  }

  /// Whether this document was generated at or after the cutoff
  pub fn is_fresher_than(&self, cutoff: DateTime<Utc>) -> bool {
    self.generated_at >= cutoff
  }
}
