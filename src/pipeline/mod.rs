//! Release pipeline
//!
//! The phase state machine that drives a repository through
//! Prepare → Build → Test → PrePublish → Publish → PostPublish → Swap →
//! BumpVersion. Each phase is independently invokable but enforces its
//! own preconditions; terminal failure at any phase aborts with no
//! automatic rollback of completed phases except swap revert.
//!
//! Mutable stores (local version counter, dependency snapshot, build
//! server) are injected capabilities so tests can run against in-memory
//! fakes. Concurrent invocations against the same checkout are not a
//! supported usage pattern.

pub mod build;
pub mod bump;
pub mod prepare;
pub mod publish;

pub use build::BuildOptions;
pub use bump::{BumpOptions, BumpOutcome, BumpStrategy, DefaultBumpStrategy};
pub use prepare::{PrepareOptions, PrepareOutcome};
pub use test::TestOptions;

use crate::core::config::ShipConfig;
use crate::core::error::{ShipError, ShipResult, ValidationError};
use crate::core::process::CancelToken;
use crate::core::vcs::SystemGit;
use crate::deps::build_server::{BuildServerClient, CommandBuildServer, UnconfiguredBuildServer};
use crate::deps::overrides::OverrideStore;
use crate::deps::snapshot::{FileSnapshotStore, SnapshotStore};
use crate::history::GitHistoryAnalyzer;
use crate::props::GeneratedProps;
use crate::version::counter::{CounterStore, FileCounterStore};
use crate::version::main_info::MainVersionInfo;
use std::path::{Path, PathBuf};

/// Name of the build success sentinel under the state directory.
///
/// Its presence means "the last build of this repository completed
/// successfully"; a partially completed build never leaves one behind.
pub const BUILD_SENTINEL: &str = "build-succeeded";

/// Well-defined points where extension callbacks run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
  PrepareCompleted,
  BeforeArtifactVerify,
  BuildCompleted,
}

/// An extension callback; returning an error fails the phase
pub type PhaseHook = Box<dyn Fn(&ReleasePipeline) -> ShipResult<()>>;

/// The release pipeline for one repository checkout
pub struct ReleasePipeline {
  root: PathBuf,
  config: ShipConfig,
  git: SystemGit,
  cancel: CancelToken,
  hooks: Vec<(PhaseEvent, PhaseHook)>,
  counter: Box<dyn CounterStore>,
  build_server: Box<dyn BuildServerClient>,
  snapshot: Box<dyn SnapshotStore>,
  bump_strategy: Box<dyn BumpStrategy>,
  user: String,
}

impl ReleasePipeline {
  pub fn new(root: &Path, config: ShipConfig, cancel: CancelToken) -> ShipResult<Self> {
    let git = SystemGit::open(root)?;
    let counter = Box::new(FileCounterStore::for_product(&config.product.name)?);
    let build_server: Box<dyn BuildServerClient> = match &config.build_server {
      Some(bs_config) => Box::new(CommandBuildServer::new(bs_config.clone(), root, cancel.clone())),
      None => Box::new(UnconfiguredBuildServer),
    };
    let snapshot = Box::new(FileSnapshotStore::new(&ShipConfig::state_dir(root)));
    let user = std::env::var("USER")
      .or_else(|_| std::env::var("USERNAME"))
      .unwrap_or_else(|_| "unknown".to_string());

    Ok(Self {
      root: root.to_path_buf(),
      config,
      git,
      cancel,
      hooks: Vec::new(),
      counter,
      build_server,
      snapshot,
      bump_strategy: Box::new(DefaultBumpStrategy),
      user,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn config(&self) -> &ShipConfig {
    &self.config
  }

  pub fn git(&self) -> &SystemGit {
    &self.git
  }

  pub fn cancel(&self) -> &CancelToken {
    &self.cancel
  }

  pub(crate) fn counter(&self) -> &dyn CounterStore {
    self.counter.as_ref()
  }

  pub(crate) fn build_server(&self) -> &dyn BuildServerClient {
    self.build_server.as_ref()
  }

  pub(crate) fn snapshot_store(&self) -> &dyn SnapshotStore {
    self.snapshot.as_ref()
  }

  pub(crate) fn user(&self) -> &str {
    &self.user
  }

  pub(crate) fn bump_strategy(&self) -> &dyn BumpStrategy {
    self.bump_strategy.as_ref()
  }

  /// Replace the counter store (tests)
  pub fn with_counter_store(mut self, counter: Box<dyn CounterStore>) -> Self {
    self.counter = counter;
    self
  }

  /// Replace the build server client (tests)
  pub fn with_build_server(mut self, client: Box<dyn BuildServerClient>) -> Self {
    self.build_server = client;
    self
  }

  /// Replace the snapshot store (tests)
  pub fn with_snapshot_store(mut self, snapshot: Box<dyn SnapshotStore>) -> Self {
    self.snapshot = snapshot;
    self
  }

  /// Replace the bump strategy
  pub fn with_bump_strategy(mut self, strategy: Box<dyn BumpStrategy>) -> Self {
    self.bump_strategy = strategy;
    self
  }

  /// Register an extension callback at a phase event
  pub fn add_hook(&mut self, event: PhaseEvent, hook: PhaseHook) {
    self.hooks.push((event, hook));
  }

  /// Run registered hooks for an event, in registration order
  pub(crate) fn run_hooks(&self, event: PhaseEvent) -> ShipResult<()> {
    for (hook_event, hook) in &self.hooks {
      if *hook_event == event {
        hook(self)?;
      }
    }
    Ok(())
  }

  pub(crate) fn state_dir(&self) -> PathBuf {
    ShipConfig::state_dir(&self.root)
  }

  pub(crate) fn sentinel_path(&self) -> PathBuf {
    self.state_dir().join(BUILD_SENTINEL)
  }

  pub(crate) fn override_store(&self) -> OverrideStore {
    OverrideStore::new(&self.root)
  }

  pub(crate) fn main_info(&self) -> ShipResult<MainVersionInfo> {
    MainVersionInfo::load(&self.root.join(&self.config.version.file))
  }

  pub(crate) fn version_file_path(&self) -> PathBuf {
    self.root.join(&self.config.version.file)
  }

  pub(crate) fn props_path(&self) -> PathBuf {
    GeneratedProps::path_for(&self.root, &self.config.product.name)
  }

  /// Branch the publish phase must run on
  pub(crate) fn publish_branch(&self) -> &str {
    if self.config.product.standalone {
      &self.config.product.dev_branch
    } else {
      self
        .config
        .product
        .release_branch
        .as_deref()
        .unwrap_or(&self.config.product.dev_branch)
    }
  }

  /// Hard branch-identity precondition for a phase
  pub(crate) fn require_branch(&self, phase: &str, expected: &str) -> ShipResult<()> {
    let actual = self.git.current_branch()?;
    if actual != expected {
      return Err(ShipError::Validation(ValidationError::WrongBranch {
        phase: phase.to_string(),
        expected: expected.to_string(),
        actual,
      }));
    }
    Ok(())
  }

  /// Shared publish gate: refuse to publish unreleased, un-bumped code.
  pub(crate) fn can_publish(&self, force: bool) -> ShipResult<()> {
    let main = self.main_info()?;
    let report = GitHistoryAnalyzer::new(&self.git).analyze(&main)?;

    if report.has_changes_since_last_deployment && !report.has_bump_since_last_deployment {
      if force {
        eprintln!("⚠️  Publishing un-bumped changes (--force)");
        return Ok(());
      }
      return Err(ShipError::Validation(ValidationError::PublishBlocked {
        reason: format!(
          "commits exist since release tag '{}' but no version bump was recorded",
          report.last_tag_version
        ),
      }));
    }

    Ok(())
  }

  /// Whether this invocation runs inside a recognized CI environment
  pub(crate) fn in_ci() -> bool {
    std::env::var("CI").map(|v| !v.is_empty()).unwrap_or(false)
  }
}

/// Resolve artifact glob patterns under the repository root.
///
/// Every pattern must match at least one file; an unmatched pattern is a
/// hard failure (a silently empty artifact set must never ship).
pub(crate) fn resolve_artifact_globs(root: &Path, patterns: &[String]) -> ShipResult<Vec<PathBuf>> {
  use globset::{Glob, GlobSetBuilder};

  let mut files = Vec::new();

  for pattern in patterns {
    let glob = Glob::new(pattern)
      .map_err(|e| ShipError::message(format!("Invalid artifact pattern '{}': {}", pattern, e)))?;
    let mut builder = GlobSetBuilder::new();
    builder.add(glob);
    let set = builder
      .build()
      .map_err(|e| ShipError::message(format!("Invalid artifact pattern '{}': {}", pattern, e)))?;

    let mut matched = false;
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
      if !entry.file_type().is_file() {
        continue;
      }
      let Ok(relative) = entry.path().strip_prefix(root) else {
        continue;
      };
      if set.is_match(relative) {
        files.push(entry.path().to_path_buf());
        matched = true;
      }
    }

    if !matched {
      return Err(ShipError::Validation(ValidationError::ArtifactPatternUnmatched {
        pattern: pattern.clone(),
      }));
    }
  }

  Ok(files)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_resolve_artifact_globs_requires_matches() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("dist")).unwrap();
    std::fs::write(dir.path().join("dist/app.pkg"), "pkg").unwrap();

    let files = resolve_artifact_globs(dir.path(), &["dist/*.pkg".to_string()]).unwrap();
    assert_eq!(files.len(), 1);

    let err = resolve_artifact_globs(dir.path(), &["dist/*.zip".to_string()]).unwrap_err();
    assert!(err.to_string().contains("dist/*.zip"));
  }
}
