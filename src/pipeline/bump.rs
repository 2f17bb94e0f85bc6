//! Bump phase
//!
//! Decides whether a version bump is due by comparing live dependency
//! versions against the last recorded snapshot and the repository's own
//! change history, computes the next version, rewrites the version
//! declaration and commits the generated bump marker. Re-running after a
//! bump is a successful no-op; the marker in history makes the phase
//! idempotent.

use super::ReleasePipeline;
use crate::core::config::DependencyDefinition;
use crate::core::error::{ShipError, ShipResult, ValidationError};
use crate::core::vcs::SystemGit;
use crate::deps::snapshot::{content_digest, DependencySnapshot, SnapshotEntry};
use crate::history::{bump_commit_subject, GitHistoryAnalyzer};
use crate::version::main_info::{set_main_version, MainVersionInfo};
use chrono::Utc;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct BumpOptions {
  /// Bump again even when a bump marker already exists since the last
  /// release
  pub override_previous_bump: bool,
  /// Bump even when neither local changes nor dependency changes exist
  pub force: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BumpOutcome {
  /// A bump marker already exists since the last release
  AlreadyBumped,
  /// No local or dependency changes warrant a bump
  NothingToBump,
  Bumped { new_version: String },
}

/// Computes the next main version from the current one
pub trait BumpStrategy {
  fn next(&self, current: &str) -> ShipResult<String>;
}

/// Increments the third version component, appending it when absent:
/// `3.4` becomes `3.4.1`, `3.4.1` becomes `3.4.2`.
pub struct DefaultBumpStrategy;

impl BumpStrategy for DefaultBumpStrategy {
  fn next(&self, current: &str) -> ShipResult<String> {
    let mut parts: Vec<u64> = current
      .split('.')
      .map(|p| {
        p.parse()
          .map_err(|_| ShipError::message(format!("Version component '{}' in '{}' is not numeric", p, current)))
      })
      .collect::<ShipResult<_>>()?;

    if parts.len() < 2 {
      return Err(ShipError::message(format!(
        "Version '{}' has fewer than two components",
        current
      )));
    }

    if parts.len() < 3 {
      parts.push(1);
    } else {
      parts[2] += 1;
      parts.truncate(3);
    }

    Ok(
      parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."),
    )
  }
}

impl ReleasePipeline {
  pub fn bump_version(&self, options: &BumpOptions) -> ShipResult<BumpOutcome> {
    let dev = self.config.product.dev_branch.clone();
    self.require_branch("BumpVersion", &dev)?;
    self.refuse_if_behind_release(&dev)?;

    let main = self.main_info()?;
    let report = GitHistoryAnalyzer::new(self.git()).analyze(&main)?;

    if report.has_bump_since_last_deployment && !options.override_previous_bump {
      println!("⏭️  Version already bumped since the last release");
      return Ok(BumpOutcome::AlreadyBumped);
    }

    let live = self.read_live_dependency_versions()?;
    let previous = self.snapshot_store().read()?.unwrap_or_default();
    let changed = live.changed_since(&previous);

    if !report.has_changes_since_last_deployment && changed.is_empty() && !options.force {
      println!("⏭️  No changes since the last release, nothing to bump");
      return Ok(BumpOutcome::NothingToBump);
    }

    let new_version = self.next_main_version(&main, &live, options)?;
    let Some(new_version) = new_version else {
      println!("⏭️  Inherited version is unchanged, nothing to bump");
      return Ok(BumpOutcome::NothingToBump);
    };

    let version_file = self.version_file_path();
    set_main_version(&version_file, &new_version)?;

    let mut snapshot = live;
    snapshot.taken_at = Some(Utc::now());
    self.snapshot_store().write(&snapshot)?;

    let mut paths = vec![version_file.clone()];
    if let Some(snapshot_path) = self.snapshot_store().path() {
      paths.push(snapshot_path);
    }
    let path_refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
    self
      .git()
      .commit_paths(&path_refs, &bump_commit_subject(&new_version))?;
    self.git().push(&dev)?;

    println!("⬆️  Bumped version to {}", new_version);
    Ok(BumpOutcome::Bumped { new_version })
  }

  /// Bumping the development branch while the release branch carries
  /// unmerged commits would produce a version that skips them.
  fn refuse_if_behind_release(&self, dev: &str) -> ShipResult<()> {
    let Some(release) = self.config.product.release_branch.clone() else {
      return Ok(());
    };
    if !self.git().branch_exists(&release) {
      return Ok(());
    }

    let commits = self.git().commits_ahead(dev, &release)?;
    if commits > 0 {
      return Err(ShipError::Validation(ValidationError::BehindRelease {
        dev: dev.to_string(),
        release,
        commits,
      }));
    }
    Ok(())
  }

  /// Current version of every declared dependency, read from a live
  /// checkout: a sibling working copy when present, else a cached
  /// shallow clone under the state directory.
  fn read_live_dependency_versions(&self) -> ShipResult<DependencySnapshot> {
    let mut snapshot = DependencySnapshot::default();

    for definition in &self.config.dependencies {
      let declaration = self.dependency_version_declaration(definition)?;
      let parsed = MainVersionInfo::load(&declaration)?;
      let content = fs::read_to_string(&declaration)?;

      snapshot.dependencies.insert(
        definition.name.clone(),
        SnapshotEntry {
          version: parsed.main_version,
          digest: content_digest(&content),
        },
      );
    }

    Ok(snapshot)
  }

  fn dependency_version_declaration(&self, definition: &DependencyDefinition) -> ShipResult<std::path::PathBuf> {
    let version_file_name = &self.config.version.file;

    if let Some(parent) = self.root().parent() {
      let sibling = parent.join(&definition.name).join(version_file_name);
      if sibling.exists() {
        return Ok(sibling);
      }
    }

    let checkout = self.state_dir().join("checkouts").join(&definition.name);
    if !checkout.join(".git").exists() {
      if checkout.exists() {
        fs::remove_dir_all(&checkout)?;
      }
      println!("🌱 Cloning '{}' to read its version", definition.name);
      SystemGit::shallow_clone(&definition.repo, &definition.dev_branch, &checkout)?;
    } else {
      let git = SystemGit::open(&checkout)?;
      git.fetch_remote()?;
    }

    Ok(checkout.join(version_file_name))
  }

  /// Next main version: adopt the version-defining dependency's live
  /// version when one is configured, else run the bump strategy.
  ///
  /// Returns None when the inherited version equals the current one and
  /// no force was requested.
  fn next_main_version(
    &self,
    main: &MainVersionInfo,
    live: &DependencySnapshot,
    options: &BumpOptions,
  ) -> ShipResult<Option<String>> {
    match self.config.product.main_version_dependency.as_deref() {
      Some(name) => {
        let entry = live
          .dependencies
          .get(name)
          .ok_or_else(|| ShipError::message(format!("Version-defining dependency '{}' has no live version", name)))?;
        if entry.version == main.main_version && !options.force {
          return Ok(None);
        }
        Ok(Some(entry.version.clone()))
      }
      None => Ok(Some(self.bump_strategy().next(&main.main_version)?)),
    }
  }
}
