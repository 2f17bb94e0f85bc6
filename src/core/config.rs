//! Product manifest (ship.toml) parsing and validation
//!
//! The manifest declares the product identity, its branch layout, the
//! static dependency set, build/test units, artifact patterns, publish
//! and swap targets, and the build-server command templates.

use crate::core::error::{ConfigError, ShipError, ShipResult};
use crate::core::process::ToolUnit;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = "ship.toml";

/// Build configuration for one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Configuration {
  Debug,
  Release,
  Public,
}

impl std::fmt::Display for Configuration {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Configuration::Debug => write!(f, "debug"),
      Configuration::Release => write!(f, "release"),
      Configuration::Public => write!(f, "public"),
    }
  }
}

/// Top-level shipway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipConfig {
  pub product: ProductConfig,
  #[serde(default)]
  pub version: VersionFileConfig,
  #[serde(default)]
  pub dependencies: Vec<DependencyDefinition>,
  #[serde(default)]
  pub source_dependencies: Vec<SourceDependencyConfig>,
  #[serde(default)]
  pub build: BuildConfig,
  #[serde(default)]
  pub test: TestConfig,
  #[serde(default)]
  pub publish: PublishConfig,
  #[serde(default)]
  pub swap: Option<SwapConfig>,
  #[serde(default)]
  pub build_server: Option<BuildServerConfig>,
}

/// Product identity and branch layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
  pub name: String,
  pub family: String,

  /// Standalone products publish from their development branch and have
  /// no separate release branch ceremony.
  #[serde(default)]
  pub standalone: bool,

  #[serde(default = "default_dev_branch")]
  pub dev_branch: String,

  #[serde(default)]
  pub release_branch: Option<String>,

  /// When set, this product's main version is defined by the named
  /// dependency instead of the local version declaration.
  #[serde(default)]
  pub main_version_dependency: Option<String>,

  /// Dependencies whose pinned default version is rewritten on publish
  #[serde(default)]
  pub auto_update_dependencies: Vec<String>,
}

fn default_dev_branch() -> String {
  "main".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionFileConfig {
  /// Path to the version declaration file, relative to the repo root
  #[serde(default = "default_version_file")]
  pub file: PathBuf,
}

impl Default for VersionFileConfig {
  fn default() -> Self {
    Self {
      file: default_version_file(),
    }
  }
}

fn default_version_file() -> PathBuf {
  PathBuf::from("version.toml")
}

/// Immutable descriptor of one declared package dependency
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDefinition {
  /// Unique key for the dependency
  pub name: String,
  /// Owning product family
  pub family: String,
  /// Source-control location of the dependency's repository
  pub repo: String,
  #[serde(default = "default_dev_branch")]
  pub dev_branch: String,
  #[serde(default)]
  pub release_branch: Option<String>,
  /// Whether the dependency versions independently of its family
  #[serde(default = "default_true")]
  pub independently_versioned: bool,
  /// CI build-type identifier per configuration
  #[serde(default)]
  pub build_types: BTreeMap<String, String>,
}

fn default_true() -> bool {
  true
}

impl DependencyDefinition {
  /// CI build-type id for a configuration, if declared
  pub fn build_type(&self, configuration: Configuration) -> Option<&str> {
    self.build_types.get(&configuration.to_string()).map(String::as_str)
  }
}

/// Source-level (non-package) dependency restored by convention:
/// prefer an existing sibling checkout, else a shallow clone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDependencyConfig {
  pub name: String,
  pub repo: String,
  #[serde(default = "default_dev_branch")]
  pub branch: String,
  /// Checkout path relative to the repo root, used when no sibling exists
  pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
  #[serde(default)]
  pub units: Vec<ToolUnit>,
  /// Glob patterns for artifacts published to external feeds
  #[serde(default)]
  pub public_artifacts: Vec<String>,
  /// Glob patterns for artifacts kept on the build agent
  #[serde(default)]
  pub private_artifacts: Vec<String>,
  #[serde(default)]
  pub zip_private: bool,
  #[serde(default)]
  pub sign: bool,
  /// Signing tool; invoked once per public artifact with the file appended
  #[serde(default)]
  pub sign_tool: Option<ToolUnit>,
  #[serde(default = "default_artifacts_dir")]
  pub artifacts_dir: PathBuf,
}

fn default_artifacts_dir() -> PathBuf {
  PathBuf::from("artifacts")
}

impl Default for BuildConfig {
  fn default() -> Self {
    Self {
      units: Vec::new(),
      public_artifacts: Vec::new(),
      private_artifacts: Vec::new(),
      zip_private: false,
      sign: false,
      sign_tool: None,
      artifacts_dir: default_artifacts_dir(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
  #[serde(default)]
  pub units: Vec<ToolUnit>,
  /// Wrapper prepended to every test unit when coverage is requested
  #[serde(default)]
  pub coverage_wrapper: Option<ToolUnit>,
  #[serde(default = "default_results_dir")]
  pub results_dir: PathBuf,
}

fn default_results_dir() -> PathBuf {
  PathBuf::from("test-results")
}

impl Default for TestConfig {
  fn default() -> Self {
    Self {
      units: Vec::new(),
      coverage_wrapper: None,
      results_dir: default_results_dir(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PublishConfig {
  #[serde(default)]
  pub targets: Vec<PublishTargetConfig>,
}

/// Which artifact set a publish target consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactVisibility {
  #[default]
  Public,
  Private,
}

/// Phase a publish target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishPhase {
  Pre,
  #[default]
  Publish,
  Post,
}

/// Known publish target families (closed set)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishTargetKind {
  Feed,
  Slot,
  Marketplace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTargetConfig {
  pub name: String,
  pub kind: PublishTargetKind,
  #[serde(default)]
  pub phase: PublishPhase,
  #[serde(default)]
  pub artifacts: ArtifactVisibility,
  /// Command run per target; `{file}` expands to each artifact path
  pub command: ToolUnit,
  /// Output substring that escalates a failure from Error to Fatal
  #[serde(default)]
  pub fatal_pattern: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapConfig {
  /// Slot-swap action; re-invoking it reverts to the prior slot state
  pub action: ToolUnit,
  /// Smoke testers run against the new active slot after a swap
  #[serde(default)]
  pub testers: Vec<SwapTesterConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTesterConfig {
  pub name: String,
  pub command: ToolUnit,
  #[serde(default)]
  pub fatal_pattern: Option<String>,
}

/// Command templates for talking to the CI build server.
///
/// Placeholders: `{build_type}`, `{branch}`, `{build_number}`, `{dest}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildServerConfig {
  /// Prints the latest successful build number of a branch to stdout
  /// (empty output means "not finished yet" and is re-polled)
  pub resolve_latest: ToolUnit,
  /// Downloads the generated version-properties file of a build to {dest}
  pub fetch_version_file: ToolUnit,
}

impl ShipConfig {
  /// Load ship.toml from the repository root
  pub fn load(root: &Path) -> ShipResult<Self> {
    Self::load_path(&root.join(MANIFEST_FILE))
  }

  /// Load the manifest from an explicit path
  pub fn load_path(path: &Path) -> ShipResult<Self> {
    if !path.exists() {
      return Err(ShipError::Config(ConfigError::NotFound {
        root: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
      }));
    }

    let text = fs::read_to_string(path)?;
    let config: ShipConfig = toml_edit::de::from_str(&text).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
      })
    })?;

    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> ShipResult<()> {
    if self.product.name.is_empty() {
      return Err(ShipError::Config(ConfigError::MissingField {
        field: "product.name".to_string(),
      }));
    }

    if let Some(dep) = &self.product.main_version_dependency {
      if !self.dependencies.iter().any(|d| &d.name == dep) {
        return Err(ShipError::message(format!(
          "main_version_dependency '{}' is not a declared dependency",
          dep
        )));
      }
    }

    for auto in &self.product.auto_update_dependencies {
      if !self.dependencies.iter().any(|d| &d.name == auto) {
        return Err(ShipError::message(format!(
          "auto_update_dependencies entry '{}' is not a declared dependency",
          auto
        )));
      }
    }

    Ok(())
  }

  /// Find a declared dependency by name
  pub fn dependency(&self, name: &str) -> Option<&DependencyDefinition> {
    self.dependencies.iter().find(|d| d.name == name)
  }

  /// Directory for shipway-generated state (overrides, props, sentinel)
  pub fn state_dir(root: &Path) -> PathBuf {
    root.join(".ship")
  }
}
