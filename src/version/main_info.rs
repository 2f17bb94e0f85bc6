//! Version declaration file (version.toml)
//!
//! The human-authored source of the main version, the package version
//! suffix, the optional overridden patch version, and the default
//! version/feed reference of every declared dependency.

use crate::core::error::{ConfigError, ShipError, ShipResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Default version/feed reference for one declared dependency.
///
/// The entry must exist for every declared dependency even when the
/// values are empty; a missing entry is a hard failure that prevents
/// silent staleness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyDefault {
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub feed: String,
}

/// Contents of the version declaration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MainVersionInfo {
  /// Human-authored `<major>.<minor>` or `<major>.<minor>.<build>`
  pub main_version: String,

  /// When set, pins the full patch version; must be prefixed by
  /// `main_version + "."`.
  #[serde(default)]
  pub overridden_patch_version: Option<String>,

  #[serde(default)]
  pub package_version_suffix: String,

  #[serde(default)]
  pub our_patch_version: Option<String>,

  #[serde(default)]
  pub dependencies: BTreeMap<String, DependencyDefault>,
}

impl MainVersionInfo {
  /// Load and validate the version declaration file
  pub fn load(path: &Path) -> ShipResult<Self> {
    let text = fs::read_to_string(path).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
      })
    })?;

    let info: MainVersionInfo = toml_edit::de::from_str(&text).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.to_path_buf(),
        message: e.to_string(),
      })
    })?;

    info.validate()?;
    Ok(info)
  }

  fn validate(&self) -> ShipResult<()> {
    if self.main_version.is_empty() {
      return Err(ShipError::Config(ConfigError::MissingField {
        field: "main_version".to_string(),
      }));
    }

    if let Some(patch) = &self.overridden_patch_version {
      if !patch.starts_with(&format!("{}.", self.main_version)) {
        return Err(ShipError::Validation(ValidationError::PatchPrefixMismatch {
          patch: patch.clone(),
          prefix: self.main_version.clone(),
        }));
      }
    }

    Ok(())
  }

  /// Default entry for a declared dependency; a missing entry is a hard
  /// failure even when the present entry is empty.
  pub fn dependency_default(&self, name: &str) -> ShipResult<&DependencyDefault> {
    self
      .dependencies
      .get(name)
      .ok_or_else(|| ShipError::Config(ConfigError::MissingDependencyDefault { name: name.to_string() }))
  }

  /// Release line of the main version (its major component)
  pub fn release_line(&self) -> &str {
    self.main_version.split('.').next().unwrap_or(&self.main_version)
  }
}

/// Rewrite `main_version` in place, preserving the file's formatting
pub fn set_main_version(path: &Path, new_version: &str) -> ShipResult<()> {
  let text = fs::read_to_string(path)?;
  let mut doc: toml_edit::DocumentMut = text.parse()?;
  doc["main_version"] = toml_edit::value(new_version);
  fs::write(path, doc.to_string())?;
  Ok(())
}

/// Rewrite the pinned default version of one dependency in place
pub fn set_dependency_default_version(path: &Path, name: &str, version: &str) -> ShipResult<()> {
  let text = fs::read_to_string(path)?;
  let mut doc: toml_edit::DocumentMut = text.parse()?;
  doc["dependencies"][name]["version"] = toml_edit::value(version);
  fs::write(path, doc.to_string())?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_full_declaration() {
    let text = r#"
main_version = "3.4"
package_version_suffix = "-rc"

[dependencies.sdk]
version = "2.1.0"
feed = "https://feed.example.com/v3"

[dependencies.platform]
version = ""
feed = ""
"#;
    let info: MainVersionInfo = toml_edit::de::from_str(text).unwrap();
    assert_eq!(info.main_version, "3.4");
    assert_eq!(info.package_version_suffix, "-rc");
    assert_eq!(info.dependency_default("sdk").unwrap().version, "2.1.0");
    // Empty entries are valid; only absence is an error
    assert_eq!(info.dependency_default("platform").unwrap().version, "");
    assert!(info.dependency_default("missing").is_err());
  }

  #[test]
  fn test_overridden_patch_must_match_prefix() {
    let text = r#"
main_version = "3.4"
overridden_patch_version = "3.5.0.1"
"#;
    let info: MainVersionInfo = toml_edit::de::from_str(text).unwrap();
    assert!(info.validate().is_err());
  }

  #[test]
  fn test_release_line_is_major_component() {
    let info = MainVersionInfo {
      main_version: "3.4".to_string(),
      overridden_patch_version: None,
      package_version_suffix: String::new(),
      our_patch_version: None,
      dependencies: BTreeMap::new(),
    };
    assert_eq!(info.release_line(), "3");
  }

  #[test]
  fn test_set_main_version_preserves_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("version.toml");
    fs::write(&path, "main_version = \"3.4\"\npackage_version_suffix = \"-rc\"\n").unwrap();

    set_main_version(&path, "3.5").unwrap();

    let info = MainVersionInfo::load(&path).unwrap();
    assert_eq!(info.main_version, "3.5");
    assert_eq!(info.package_version_suffix, "-rc");
  }
}
