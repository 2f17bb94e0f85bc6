//! Dependency override file
//!
//! Maps every declared dependency to its resolved source for one
//! invocation. Constructed fresh from declared defaults at the start of
//! every prepare, overlaid with any previously persisted overrides,
//! mutated by fetch, and persisted atomically at the end of prepare.
//!
//! Persistence is last-writer-wins; concurrent invocations against the
//! same checkout are not a supported usage pattern.

use crate::core::config::{Configuration, ShipConfig};
use crate::core::error::{ConfigError, ShipError, ShipResult, ValidationError};
use crate::deps::build_server::BuildServerClient;
use crate::deps::source::{DependencySource, Origin};
use crate::version::main_info::MainVersionInfo;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const OVERRIDE_FILE: &str = "dependency-overrides.toml";
const IMPORTS_DIR: &str = "imports";

/// One entry of the override file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideEntry {
  #[serde(default)]
  pub origin: Origin,
  #[serde(flatten)]
  pub source: DependencySource,
}

/// Pointer to the current local build's generated import, used when this
/// repository acts as a dependency of a sibling checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalBuildImport {
  pub import: PathBuf,
}

/// The full override document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyOverrideFile {
  #[serde(default)]
  pub dependencies: BTreeMap<String, OverrideEntry>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub local_build: Option<LocalBuildImport>,

  /// Import files the project build verifies exist; regenerated on save
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub required_imports: Vec<PathBuf>,
}

impl DependencyOverrideFile {
  /// Every resolved import file this override set references
  fn collect_required_imports(&self) -> Vec<PathBuf> {
    let mut imports: Vec<PathBuf> = self
      .dependencies
      .values()
      .filter_map(|entry| entry.source.import_path().cloned())
      .collect();
    if let Some(local) = &self.local_build {
      imports.push(local.import.clone());
    }
    imports
  }
}

/// Loads, merges, fetches and persists the override file
pub struct OverrideStore {
  root: PathBuf,
}

impl OverrideStore {
  pub fn new(root: &Path) -> Self {
    Self {
      root: root.to_path_buf(),
    }
  }

  pub fn path(&self) -> PathBuf {
    ShipConfig::state_dir(&self.root).join(OVERRIDE_FILE)
  }

  fn imports_dir(&self) -> PathBuf {
    ShipConfig::state_dir(&self.root).join(IMPORTS_DIR)
  }

  /// Build the override file from declared defaults.
  ///
  /// Every declared dependency must have a default entry in the version
  /// declaration; a missing entry is a hard failure even when empty.
  pub fn load_defaults(&self, config: &ShipConfig, main: &MainVersionInfo) -> ShipResult<DependencyOverrideFile> {
    let mut file = DependencyOverrideFile::default();

    for definition in &config.dependencies {
      let default = main.dependency_default(&definition.name)?;
      file.dependencies.insert(
        definition.name.clone(),
        OverrideEntry {
          origin: Origin::Default,
          source: DependencySource::Feed {
            version: default.version.clone(),
          },
        },
      );
    }

    Ok(file)
  }

  /// Defaults overlaid with any previously persisted overrides.
  ///
  /// Persisted entries replace defaults by name; names beyond the
  /// declared set are transitively discovered dependencies and are kept.
  pub fn load_with_overrides(
    &self,
    config: &ShipConfig,
    main: &MainVersionInfo,
  ) -> ShipResult<DependencyOverrideFile> {
    let mut file = self.load_defaults(config, main)?;

    let path = self.path();
    if !path.exists() {
      return Ok(file);
    }

    let text = fs::read_to_string(&path)?;
    let persisted: DependencyOverrideFile = toml_edit::de::from_str(&text).map_err(|e| {
      // Unknown Kind strings land here: the enumeration is closed.
      ShipError::Config(ConfigError::Parse {
        file: path.clone(),
        message: e.to_string(),
      })
    })?;

    for (name, entry) in persisted.dependencies {
      file.dependencies.insert(name, entry);
    }
    if persisted.local_build.is_some() {
      file.local_build = persisted.local_build;
    }

    Ok(file)
  }

  /// Resolve and fetch every unresolved build-server entry.
  ///
  /// Failure to resolve any entry fails the whole fetch; partial
  /// dependency sets are never handed downstream. Returns the number of
  /// entries fetched.
  pub fn fetch(
    &self,
    file: &mut DependencyOverrideFile,
    config: &ShipConfig,
    configuration: Configuration,
    client: &dyn BuildServerClient,
  ) -> ShipResult<usize> {
    let imports_dir = self.imports_dir();
    let mut fetched = 0;

    for (name, entry) in file.dependencies.iter_mut() {
      let DependencySource::BuildServer {
        branch,
        build_number,
        build_type_id,
        version_file,
      } = &mut entry.source
      else {
        continue;
      };
      if version_file.is_some() {
        continue;
      }

      let build_type = match build_type_id.as_deref() {
        Some(id) => id.to_string(),
        None => {
          let definition = config
            .dependency(name)
            .ok_or_else(|| ShipError::message(format!("No declaration for build-server dependency '{}'", name)))?;
          definition
            .build_type(configuration)
            .ok_or_else(|| {
              ShipError::message(format!(
                "Dependency '{}' declares no CI build type for configuration '{}'",
                name, configuration
              ))
            })?
            .to_string()
        }
      };

      let number = match *build_number {
        Some(number) => number,
        None => {
          let branch_name = branch.clone().unwrap_or_else(|| {
            config
              .dependency(name)
              .map(|d| d.dev_branch.clone())
              .unwrap_or_else(|| "main".to_string())
          });
          client.latest_successful_build(&build_type, &branch_name)?
        }
      };

      fs::create_dir_all(&imports_dir)?;
      let dest = imports_dir.join(format!("{}.props.toml", name));
      client.fetch_version_file(&build_type, number, &dest)?;
      if !dest.exists() {
        return Err(ShipError::message(format!(
          "Build server reported success but '{}' was not written",
          dest.display()
        )));
      }

      *build_number = Some(number);
      *build_type_id = Some(build_type);
      *version_file = Some(dest);
      fetched += 1;
    }

    Ok(fetched)
  }

  /// Persist the override file atomically (tmp + rename), regenerating
  /// the import verification list first.
  pub fn save(&self, file: &mut DependencyOverrideFile) -> ShipResult<()> {
    file.required_imports = file.collect_required_imports();

    let path = self.path();
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    let text = toml_edit::ser::to_string_pretty(file)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, &path)?;
    Ok(())
  }

  /// Load the persisted override file without defaults, if present
  pub fn load_persisted(&self) -> ShipResult<Option<DependencyOverrideFile>> {
    let path = self.path();
    if !path.exists() {
      return Ok(None);
    }
    let text = fs::read_to_string(&path)?;
    let file = toml_edit::de::from_str(&text).map_err(|e| {
      ShipError::Config(ConfigError::Parse {
        file: path.clone(),
        message: e.to_string(),
      })
    })?;
    Ok(Some(file))
  }
}

/// Fail if any referenced import file is missing.
///
/// This is the verification step regenerated on save: a build against
/// stale overrides must fail rather than silently proceed.
pub fn verify_imports(file: &DependencyOverrideFile) -> ShipResult<()> {
  for import in &file.required_imports {
    if !import.exists() {
      return Err(ShipError::Validation(ValidationError::MissingImport {
        path: import.clone(),
      }));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(origin: Origin, source: DependencySource) -> OverrideEntry {
    OverrideEntry { origin, source }
  }

  #[test]
  fn test_round_trip_all_kinds() {
    let mut file = DependencyOverrideFile::default();
    file.dependencies.insert(
      "feed-dep".to_string(),
      entry(Origin::Default, DependencySource::Feed { version: "2.1.0".into() }),
    );
    file.dependencies.insert(
      "local-dep".to_string(),
      entry(
        Origin::Override,
        DependencySource::Local {
          import: PathBuf::from("../sibling/.ship/generated/sibling.props.toml"),
        },
      ),
    );
    file.dependencies.insert(
      "ci-dep".to_string(),
      entry(
        Origin::Transitive,
        DependencySource::BuildServer {
          branch: Some("main".into()),
          build_number: Some(1234),
          build_type_id: Some("Sdk_Release".into()),
          version_file: Some(PathBuf::from("/imports/sdk.props.toml")),
        },
      ),
    );
    file.local_build = Some(LocalBuildImport {
      import: PathBuf::from(".ship/generated/gateway.props.toml"),
    });

    let text = toml_edit::ser::to_string_pretty(&file).unwrap();
    let parsed: DependencyOverrideFile = toml_edit::de::from_str(&text).unwrap();
    assert_eq!(parsed, file);
  }

  #[test]
  fn test_unknown_kind_is_fatal_parse_error() {
    let text = r#"
[dependencies.broken]
origin = "Default"
kind = "Mystery"
version = "1.0"
"#;
    let parsed: Result<DependencyOverrideFile, _> = toml_edit::de::from_str(text);
    assert!(parsed.is_err());
  }

  #[test]
  fn test_verify_imports_fails_on_missing_file() {
    let mut file = DependencyOverrideFile::default();
    file.required_imports = vec![PathBuf::from("/definitely/not/here.props.toml")];
    assert!(verify_imports(&file).is_err());
  }

  #[test]
  fn test_required_imports_regenerated_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let store = OverrideStore::new(dir.path());

    let mut file = DependencyOverrideFile::default();
    file.dependencies.insert(
      "sdk".to_string(),
      entry(
        Origin::Override,
        DependencySource::BuildServer {
          branch: None,
          build_number: Some(7),
          build_type_id: Some("Sdk_Release".into()),
          version_file: Some(dir.path().join("sdk.props.toml")),
        },
      ),
    );

    store.save(&mut file).unwrap();
    assert_eq!(file.required_imports, vec![dir.path().join("sdk.props.toml")]);

    let persisted = store.load_persisted().unwrap().unwrap();
    assert_eq!(persisted.required_imports, file.required_imports);
  }
}
