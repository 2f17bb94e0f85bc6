//! Test helpers for integration tests

use anyhow::{Context, Result};
use shipway::core::config::ShipConfig;
use shipway::core::process::CancelToken;
use shipway::deps::snapshot::MemorySnapshotStore;
use shipway::pipeline::ReleasePipeline;
use shipway::version::counter::MemoryCounterStore;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const BASIC_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"
"#;

pub const BASIC_VERSION: &str = r#"
main_version = "3.4"
package_version_suffix = "-rc"
"#;

/// A product checkout with git history
pub struct TestWorkspace {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestWorkspace {
  /// Create a checkout with the given manifest and version declaration,
  /// committed as the initial commit.
  pub fn new(manifest: &str, version_declaration: &str) -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().canonicalize()?;

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    std::fs::write(path.join("ship.toml"), manifest)?;
    std::fs::write(path.join("version.toml"), version_declaration)?;
    git(&path, &["add", "."])?;
    git(&path, &["commit", "-m", "Initial product setup"])?;

    Ok(Self { _root: root, path })
  }

  pub fn basic() -> Result<Self> {
    Self::new(BASIC_MANIFEST, BASIC_VERSION)
  }

  /// Tag HEAD as a published release of the given version
  pub fn seed_tag(&self, version: &str) -> Result<()> {
    git(
      &self.path,
      &["tag", "-a", &format!("release/{}", version), "-m", "seed"],
    )?;
    Ok(())
  }

  /// Write a file and commit it
  pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<()> {
    let target = self.path.join(file);
    if let Some(parent) = target.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(target, content)?;
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;
    Ok(())
  }

  /// Build a pipeline over this checkout with in-memory stores
  pub fn pipeline(&self) -> Result<ReleasePipeline> {
    let config = ShipConfig::load(&self.path)?;
    let pipeline = ReleasePipeline::new(&self.path, config, CancelToken::new())?
      .with_counter_store(Box::new(MemoryCounterStore::new()))
      .with_snapshot_store(Box::new(MemorySnapshotStore::new()));
    Ok(pipeline)
  }

  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }

  /// Subjects of the last `n` commits, newest first
  pub fn log_subjects(&self, n: usize) -> Result<Vec<String>> {
    let output = git(&self.path, &["log", &format!("-{}", n), "--pretty=format:%s"])?;
    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(String::from)
        .collect(),
    )
  }
}

/// Run a git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}
