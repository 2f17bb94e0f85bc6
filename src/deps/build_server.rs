//! CI build server client
//!
//! Build-server dependencies resolve to a concrete build (by explicit
//! build number, or the latest successful build of a branch) whose
//! generated version-properties file is then fetched locally. The client
//! is an injected capability: production uses configured command
//! templates, tests use an in-memory fake.

use crate::core::config::BuildServerConfig;
use crate::core::error::{ShipError, ShipResult};
use crate::core::process::{self, CancelToken};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const MAX_POLLS: u32 = 180;

/// Capability for resolving and fetching CI builds
pub trait BuildServerClient {
  /// Latest successful build number of `branch` for a build type
  fn latest_successful_build(&self, build_type_id: &str, branch: &str) -> ShipResult<u64>;

  /// Download a build's generated version-properties file to `dest`
  fn fetch_version_file(&self, build_type_id: &str, build_number: u64, dest: &Path) -> ShipResult<()>;
}

/// Command-template backed client (ship.toml `[build_server]`)
pub struct CommandBuildServer {
  config: BuildServerConfig,
  root: PathBuf,
  cancel: CancelToken,
}

impl CommandBuildServer {
  pub fn new(config: BuildServerConfig, root: &Path, cancel: CancelToken) -> Self {
    Self {
      config,
      root: root.to_path_buf(),
      cancel,
    }
  }
}

impl BuildServerClient for CommandBuildServer {
  fn latest_successful_build(&self, build_type_id: &str, branch: &str) -> ShipResult<u64> {
    let unit = self
      .config
      .resolve_latest
      .substituted(&[("build_type", build_type_id), ("branch", branch)]);

    // Empty output means the remote build has not finished yet; re-poll
    // with a fixed sleep, checking the cancellation token each iteration.
    process::poll_until(
      &self.cancel,
      POLL_INTERVAL,
      MAX_POLLS,
      &format!("a successful build of {} on {}", build_type_id, branch),
      || {
        let output = process::run_unit(&unit, &self.root, &self.cancel)?;
        let text = output.stdout.trim();
        if text.is_empty() {
          return Ok(None);
        }
        let number = text
          .parse()
          .map_err(|_| ShipError::message(format!("Build server returned a non-numeric build id: '{}'", text)))?;
        Ok(Some(number))
      },
    )
  }

  fn fetch_version_file(&self, build_type_id: &str, build_number: u64, dest: &Path) -> ShipResult<()> {
    let unit = self.config.fetch_version_file.substituted(&[
      ("build_type", build_type_id),
      ("build_number", &build_number.to_string()),
      ("dest", &dest.display().to_string()),
    ]);
    process::run_unit(&unit, &self.root, &self.cancel)?;
    Ok(())
  }
}

/// Client used when no `[build_server]` section is configured
pub struct UnconfiguredBuildServer;

impl BuildServerClient for UnconfiguredBuildServer {
  fn latest_successful_build(&self, build_type_id: &str, _branch: &str) -> ShipResult<u64> {
    Err(ShipError::message(format!(
      "Cannot resolve '{}': no [build_server] section in ship.toml",
      build_type_id
    )))
  }

  fn fetch_version_file(&self, build_type_id: &str, _build_number: u64, _dest: &Path) -> ShipResult<()> {
    Err(ShipError::message(format!(
      "Cannot fetch '{}': no [build_server] section in ship.toml",
      build_type_id
    )))
  }
}

/// In-memory fake for tests
#[derive(Default)]
pub struct MemoryBuildServer {
  /// (build_type, branch) -> latest successful build number
  latest: Mutex<BTreeMap<(String, String), u64>>,
  /// (build_type, build_number) -> version-properties file content
  version_files: Mutex<BTreeMap<(String, u64), String>>,
}

impl MemoryBuildServer {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_build(&self, build_type_id: &str, branch: &str, number: u64, props: &str) {
    self
      .latest
      .lock()
      .unwrap()
      .insert((build_type_id.to_string(), branch.to_string()), number);
    self
      .version_files
      .lock()
      .unwrap()
      .insert((build_type_id.to_string(), number), props.to_string());
  }
}

impl BuildServerClient for MemoryBuildServer {
  fn latest_successful_build(&self, build_type_id: &str, branch: &str) -> ShipResult<u64> {
    self
      .latest
      .lock()
      .unwrap()
      .get(&(build_type_id.to_string(), branch.to_string()))
      .copied()
      .ok_or_else(|| ShipError::message(format!("No successful build of {} on {}", build_type_id, branch)))
  }

  fn fetch_version_file(&self, build_type_id: &str, build_number: u64, dest: &Path) -> ShipResult<()> {
    let content = self
      .version_files
      .lock()
      .unwrap()
      .get(&(build_type_id.to_string(), build_number))
      .cloned()
      .ok_or_else(|| ShipError::message(format!("Build {} #{} has no version file", build_type_id, build_number)))?;
    std::fs::write(dest, content)?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_memory_client_resolves_and_fetches() {
    let server = MemoryBuildServer::new();
    server.add_build("Sdk_Release", "main", 1234, "main_version = \"2.1\"\n");

    assert_eq!(server.latest_successful_build("Sdk_Release", "main").unwrap(), 1234);

    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("sdk.props.toml");
    server.fetch_version_file("Sdk_Release", 1234, &dest).unwrap();
    assert!(dest.exists());
  }

  #[test]
  fn test_unknown_build_fails_whole_fetch() {
    let server = MemoryBuildServer::new();
    assert!(server.latest_successful_build("Missing", "main").is_err());
  }
}
