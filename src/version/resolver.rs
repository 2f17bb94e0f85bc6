//! Version computation algorithm
//!
//! Produces one deterministic `VersionComponents` per invocation from the
//! version declaration, the requested version kind and the resolved
//! dependency overrides, covering the three versioning policies (local,
//! CI-numbered, public) plus version inheritance from another product.

use crate::core::config::Configuration;
use crate::core::error::{ShipError, ShipResult, ValidationError};
use crate::deps::overrides::DependencyOverrideFile;
use crate::deps::source::DependencySource;
use crate::props::GeneratedProps;
use crate::version::counter::CounterStore;
use crate::version::main_info::MainVersionInfo;
use serde::{Deserialize, Serialize};

/// Low patch numbers are reserved for CI-issued build numbers; local
/// builds start here to avoid collisions.
pub const LOCAL_PATCH_FLOOR: u64 = 1000;

/// The caller's requested versioning policy for this invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSpec {
  /// Developer build numbered from the local per-user counter
  Local,
  /// CI build with an externally supplied build number
  Numbered(u64),
  /// Public release using the canonical scheme
  Public,
}

/// The resolved, assembled version; produced once per invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComponents {
  pub main_version: String,
  pub version_prefix: String,
  pub patch_number: u64,
  pub version_suffix: String,
}

/// Separate version tokens for the legacy packaging toolchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyVersionTokens {
  pub prefix: String,
  pub suffix: String,
  pub patch_number: u64,
}

impl VersionComponents {
  /// Combined `prefix[-patch][-suffix]` package version
  pub fn package_version(&self) -> String {
    self.render(&self.version_suffix)
  }

  /// Package version with the suffix forced to `preview`
  pub fn preview_version(&self) -> String {
    self.render("preview")
  }

  /// Four-part assembly version (`prefix.patch`)
  pub fn assembly_version(&self) -> String {
    format!("{}.{}", self.version_prefix, self.patch_number)
  }

  /// Tokens for the legacy packaging toolchain
  pub fn legacy_tokens(&self) -> LegacyVersionTokens {
    LegacyVersionTokens {
      prefix: self.version_prefix.clone(),
      suffix: self.version_suffix.clone(),
      patch_number: self.patch_number,
    }
  }

  fn render(&self, suffix: &str) -> String {
    let mut version = self.version_prefix.clone();
    if self.patch_number > 0 {
      version.push('-');
      version.push_str(&self.patch_number.to_string());
    }
    if !suffix.is_empty() {
      version.push('-');
      version.push_str(suffix);
    }
    version
  }
}

/// The version broadcast to the rest of the pipeline and to generated
/// property files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
  pub package_version: String,
  pub preview_version: String,
  pub assembly_version: String,
  pub configuration: Configuration,
  pub build_system_configuration_name: String,
  pub components: VersionComponents,
}

impl BuildInfo {
  pub fn new(components: VersionComponents, configuration: Configuration, product: &str) -> Self {
    Self {
      package_version: components.package_version(),
      preview_version: components.preview_version(),
      assembly_version: components.assembly_version(),
      configuration,
      build_system_configuration_name: format!("{}_{}", product, configuration),
      components,
    }
  }
}

/// Compute the concrete version for one invocation
///
/// `main_version_dependency` names the dependency this product inherits
/// its main version from, if any. `user` feeds the local version suffix.
pub fn compute_version(
  configuration: Configuration,
  spec: VersionSpec,
  main: &MainVersionInfo,
  overrides: &DependencyOverrideFile,
  main_version_dependency: Option<&str>,
  counter: &dyn CounterStore,
  user: &str,
) -> ShipResult<VersionComponents> {
  // 1. Effective prefix: inherited from the version-defining dependency
  //    or the locally declared main version.
  let version_prefix = match main_version_dependency {
    Some(dep) => inherited_main_version(dep, overrides)?,
    None => main.main_version.clone(),
  };

  // 2. An overridden patch version must extend the effective prefix.
  if let Some(patch) = &main.overridden_patch_version {
    if !patch.starts_with(&format!("{}.", version_prefix)) {
      return Err(ShipError::Validation(ValidationError::PatchPrefixMismatch {
        patch: patch.clone(),
        prefix: version_prefix,
      }));
    }
  }

  // 3. Public builds always use the canonical scheme, regardless of the
  //    caller-supplied spec.
  let effective = if configuration == Configuration::Public {
    VersionSpec::Public
  } else {
    spec
  };

  // 4. Patch number and suffix per version kind.
  let (patch_number, version_suffix) = match effective {
    VersionSpec::Local => {
      let next = counter.read()?.unwrap_or(1) + 1;
      let patch = next.max(LOCAL_PATCH_FLOOR);
      counter.write(patch)?;
      (patch, format!("local-{}-{}", user, configuration))
    }
    VersionSpec::Numbered(build_number) => (build_number, format!("dev-{}", configuration)),
    VersionSpec::Public => {
      let suffix = main.package_version_suffix.trim_start_matches('-').to_string();
      let patch = match &main.overridden_patch_version {
        Some(patch) => fourth_component(patch)?,
        None => 0,
      };
      (patch, suffix)
    }
  };

  Ok(VersionComponents {
    main_version: main.main_version.clone(),
    version_prefix,
    patch_number,
    version_suffix,
  })
}

/// Read the main version declared by a version-defining dependency from
/// its resolved generated-properties file.
fn inherited_main_version(name: &str, overrides: &DependencyOverrideFile) -> ShipResult<String> {
  let entry = overrides
    .dependencies
    .get(name)
    .ok_or_else(|| ShipError::message(format!("Version-defining dependency '{}' is not resolved", name)))?;

  let props_path = match &entry.source {
    DependencySource::Local { import } => import.clone(),
    DependencySource::BuildServer {
      version_file: Some(path),
      ..
    } => path.clone(),
    DependencySource::BuildServer { version_file: None, .. } => {
      return Err(ShipError::message(format!(
        "Dependency '{}' is build-server sourced but its version file has not been fetched",
        name
      )));
    }
    DependencySource::Feed { .. } => {
      return Err(ShipError::message(format!(
        "Dependency '{}' defines this product's main version but resolves to a feed; \
         a feed source carries no generated properties",
        name
      )));
    }
  };

  let props = GeneratedProps::load(&props_path)?;
  Ok(props.main_version)
}

/// Fourth dotted component of an overridden patch version
fn fourth_component(patch: &str) -> ShipResult<u64> {
  let component = patch
    .split('.')
    .nth(3)
    .ok_or_else(|| ShipError::message(format!("Overridden patch version '{}' has no fourth component", patch)))?;
  component
    .parse()
    .map_err(|_| ShipError::message(format!("Overridden patch version component '{}' is not numeric", component)))
}
