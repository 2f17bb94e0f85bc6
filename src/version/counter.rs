//! Local version counter capability
//!
//! Local builds draw their patch number from a per-user, per-product
//! monotonically increasing counter. The store is an injected capability
//! so unit tests can use an in-memory fake instead of touching $HOME.

use crate::core::error::{ConfigError, ShipError, ShipResult};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

/// Read/write capability for the local version counter
pub trait CounterStore {
  fn read(&self) -> ShipResult<Option<u64>>;
  fn write(&self, value: u64) -> ShipResult<()>;
}

/// File-backed counter at `$HOME/.ship/counters/<product>`
pub struct FileCounterStore {
  path: PathBuf,
}

impl FileCounterStore {
  pub fn for_product(product: &str) -> ShipResult<Self> {
    let home = std::env::var("HOME")
      .map_err(|_| ShipError::Config(ConfigError::MissingEnv { name: "HOME".to_string() }))?;
    Ok(Self {
      path: PathBuf::from(home).join(".ship").join("counters").join(product),
    })
  }

  pub fn at(path: PathBuf) -> Self {
    Self { path }
  }
}

impl CounterStore for FileCounterStore {
  fn read(&self) -> ShipResult<Option<u64>> {
    if !self.path.exists() {
      return Ok(None);
    }
    let text = fs::read_to_string(&self.path)?;
    let value = text
      .trim()
      .parse()
      .map_err(|_| ShipError::message(format!("Corrupt counter file: {}", self.path.display())))?;
    Ok(Some(value))
  }

  fn write(&self, value: u64) -> ShipResult<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&self.path, value.to_string())?;
    Ok(())
  }
}

/// In-memory fake for deterministic unit tests
#[derive(Default)]
pub struct MemoryCounterStore {
  value: Mutex<Option<u64>>,
}

impl MemoryCounterStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_value(value: u64) -> Self {
    Self {
      value: Mutex::new(Some(value)),
    }
  }
}

impl CounterStore for MemoryCounterStore {
  fn read(&self) -> ShipResult<Option<u64>> {
    Ok(*self.value.lock().unwrap())
  }

  fn write(&self, value: u64) -> ShipResult<()> {
    *self.value.lock().unwrap() = Some(value);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileCounterStore::at(dir.path().join("counters").join("gateway"));

    assert_eq!(store.read().unwrap(), None);
    store.write(1234).unwrap();
    assert_eq!(store.read().unwrap(), Some(1234));
  }

  #[test]
  fn test_corrupt_counter_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counter");
    fs::write(&path, "not a number").unwrap();
    let store = FileCounterStore::at(path);
    assert!(store.read().is_err());
  }
}
