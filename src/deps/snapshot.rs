//! Dependency snapshot for bump detection
//!
//! The bump phase compares the live version of every dependency against
//! this persisted snapshot to detect dependency-driven changes. The store
//! is an injected capability so tests can run against an in-memory fake.

use crate::core::error::{ShipError, ShipResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const SNAPSHOT_FILE: &str = "dependency-snapshot.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEntry {
  pub version: String,
  /// SHA-256 of the dependency's version-declaration file
  pub digest: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySnapshot {
  #[serde(default)]
  pub dependencies: BTreeMap<String, SnapshotEntry>,
  #[serde(default)]
  pub taken_at: Option<DateTime<Utc>>,
}

impl DependencySnapshot {
  /// Names of dependencies whose entry differs from `other`
  pub fn changed_since(&self, other: &DependencySnapshot) -> Vec<String> {
    self
      .dependencies
      .iter()
      .filter(|(name, entry)| other.dependencies.get(*name) != Some(entry))
      .map(|(name, _)| name.clone())
      .collect()
  }
}

/// Digest of a version-declaration file's content
pub fn content_digest(content: &str) -> String {
  let digest = Sha256::digest(content.as_bytes());
  digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Read/write capability for the snapshot
pub trait SnapshotStore {
  fn read(&self) -> ShipResult<Option<DependencySnapshot>>;
  fn write(&self, snapshot: &DependencySnapshot) -> ShipResult<()>;
  /// On-disk location, when file-backed (committed by the bump phase)
  fn path(&self) -> Option<PathBuf> {
    None
  }
}

/// File-backed store at `.ship/dependency-snapshot.toml`
pub struct FileSnapshotStore {
  path: PathBuf,
}

impl FileSnapshotStore {
  pub fn new(state_dir: &Path) -> Self {
    Self {
      path: state_dir.join(SNAPSHOT_FILE),
    }
  }
}

impl SnapshotStore for FileSnapshotStore {
  fn read(&self) -> ShipResult<Option<DependencySnapshot>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let text = fs::read_to_string(&self.path)?;
    let snapshot = toml_edit::de::from_str(&text)
      .map_err(|e| ShipError::message(format!("Corrupt dependency snapshot {}: {}", self.path.display(), e)))?;
    Ok(Some(snapshot))
  }

  fn write(&self, snapshot: &DependencySnapshot) -> ShipResult<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let text = toml_edit::ser::to_string_pretty(snapshot)?;
    let tmp = self.path.with_extension("toml.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, &self.path)?;
    Ok(())
  }

  fn path(&self) -> Option<PathBuf> {
    Some(self.path.clone())
  }
}

/// In-memory fake for tests
#[derive(Default)]
pub struct MemorySnapshotStore {
  snapshot: Mutex<Option<DependencySnapshot>>,
}

impl MemorySnapshotStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl SnapshotStore for MemorySnapshotStore {
  fn read(&self) -> ShipResult<Option<DependencySnapshot>> {
    Ok(self.snapshot.lock().unwrap().clone())
  }

  fn write(&self, snapshot: &DependencySnapshot) -> ShipResult<()> {
    *self.snapshot.lock().unwrap() = Some(snapshot.clone());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snapshot(entries: &[(&str, &str, &str)]) -> DependencySnapshot {
    DependencySnapshot {
      dependencies: entries
        .iter()
        .map(|(name, version, digest)| {
          (
            name.to_string(),
            SnapshotEntry {
              version: version.to_string(),
              digest: digest.to_string(),
            },
          )
        })
        .collect(),
      taken_at: None,
    }
  }

  #[test]
  fn test_changed_since_detects_version_and_digest_changes() {
    let old = snapshot(&[("sdk", "2.1", "aaa"), ("platform", "1.0", "bbb")]);
    let new = snapshot(&[("sdk", "2.2", "ccc"), ("platform", "1.0", "bbb")]);
    assert_eq!(new.changed_since(&old), vec!["sdk".to_string()]);
  }

  #[test]
  fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSnapshotStore::new(dir.path());

    assert_eq!(store.read().unwrap(), None);

    let snap = snapshot(&[("sdk", "2.1", &content_digest("main_version = \"2.1\""))]);
    store.write(&snap).unwrap();
    assert_eq!(store.read().unwrap(), Some(snap));
  }

  #[test]
  fn test_content_digest_is_stable_hex() {
    let digest = content_digest("x");
    assert_eq!(digest.len(), 64);
    assert_eq!(digest, content_digest("x"));
    assert_ne!(digest, content_digest("y"));
  }
}
