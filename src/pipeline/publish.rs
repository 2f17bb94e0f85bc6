//! Publish phases
//!
//! PrePublish, Publish, PostPublish and Swap. Each enforces its branch
//! precondition and the shared publish gate before fanning out to the
//! configured targets via the dispatcher. Standalone products also tag
//! the release and merge it back to the development branch here;
//! consolidated products leave that ceremony to their release train.

use super::ReleasePipeline;
use crate::core::config::PublishPhase;
use crate::core::error::{GitError, ShipError, ShipResult};
use crate::deps::source::DependencySource;
use crate::history::release_tag;
use crate::props::GeneratedProps;
use crate::publish::{publishers_for_phase, CommandSmokeTester, CommandSwapper, PublishDispatcher, SmokeTester};
use crate::version::main_info::set_dependency_default_version;

impl ReleasePipeline {
  /// Targets declared `phase = "pre"`, run on the development branch
  /// before the release branch is cut.
  pub fn pre_publish(&self, force: bool) -> ShipResult<()> {
    self.require_branch("PrePublish", &self.config.product.dev_branch)?;
    self.can_publish(force)?;
    self.dispatch_phase(PublishPhase::Pre)?;
    println!("✅ Pre-publish targets completed");
    Ok(())
  }

  /// The main publish fan-out, plus release ceremony for standalone
  /// products.
  pub fn publish(&self, standalone: bool, force: bool) -> ShipResult<()> {
    self.require_branch("Publish", self.publish_branch())?;
    self.can_publish(force)?;
    self.dispatch_phase(PublishPhase::Publish)?;

    if standalone {
      self.release_ceremony()?;
    }

    println!("✅ Publish targets completed");
    Ok(())
  }

  /// Targets declared `phase = "post"`
  pub fn post_publish(&self) -> ShipResult<()> {
    self.require_branch("PostPublish", self.publish_branch())?;
    self.dispatch_phase(PublishPhase::Post)?;
    println!("✅ Post-publish targets completed");
    Ok(())
  }

  /// Swap deployment slots and smoke-test the result; a failing tester
  /// triggers an automatic revert.
  pub fn swap(&self) -> ShipResult<()> {
    let swap_config = self.config.swap.as_ref().ok_or_else(|| {
      ShipError::with_help("No swap action configured", "Add a [swap] section to ship.toml")
    })?;

    let swapper = CommandSwapper::new(swap_config, self.root(), self.cancel().clone());
    let testers: Vec<Box<dyn SmokeTester>> = swap_config
      .testers
      .iter()
      .map(|t| Box::new(CommandSmokeTester::new(t.clone(), self.root(), self.cancel().clone())) as Box<dyn SmokeTester>)
      .collect();

    PublishDispatcher.swap(&swapper, &testers)?;
    println!("✅ Swap completed");
    Ok(())
  }

  /// Run every target of a phase against both artifact sets.
  ///
  /// Errors from the private set do not prevent the public set from
  /// being attempted; failures from both are aggregated. A Fatal outcome
  /// still aborts immediately through the dispatcher.
  fn dispatch_phase(&self, phase: PublishPhase) -> ShipResult<()> {
    let targets = publishers_for_phase(&self.config.publish.targets, phase, self.root(), self.cancel());
    if targets.is_empty() {
      return Ok(());
    }

    let (public_set, private_set) = self.artifact_sets()?;
    let dispatcher = PublishDispatcher;

    let mut failures = Vec::new();
    for set in [&private_set, &public_set] {
      match dispatcher.publish(&targets, set) {
        Ok(()) => {}
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => failures.push(err.to_string()),
      }
    }

    if failures.is_empty() {
      Ok(())
    } else {
      Err(ShipError::message(failures.join("\n")))
    }
  }

  /// Tag the published version and merge it back to the development
  /// branch. Pinned dependency defaults marked for auto-update are
  /// rewritten from their resolved versions first.
  fn release_ceremony(&self) -> ShipResult<()> {
    let props = GeneratedProps::load(&self.props_path()).map_err(|err| {
      err.context("Publish requires a prepared checkout; run `shipway prepare` first")
    })?;

    self.auto_update_pinned_dependencies()?;

    let tag = release_tag(&props.package_version);
    println!("🏷️  Tagging {}", tag);
    self
      .git()
      .tag(&tag, &format!("Release {}", props.package_version))?;

    let current = self.git().current_branch()?;
    self.git().push(&current)?;
    self.merge_back(&current)?;
    Ok(())
  }

  /// Rewrite pinned dependency default versions from the resolved
  /// override set, committing the version declaration if anything
  /// changed.
  fn auto_update_pinned_dependencies(&self) -> ShipResult<()> {
    if self.config.product.auto_update_dependencies.is_empty() {
      return Ok(());
    }

    let Some(overrides) = self.override_store().load_persisted()? else {
      return Ok(());
    };

    let version_file = self.version_file_path();
    let mut updated = 0;

    for name in &self.config.product.auto_update_dependencies {
      let Some(entry) = overrides.dependencies.get(name) else {
        continue;
      };
      let resolved = match &entry.source {
        DependencySource::Feed { version } => Some(version.clone()),
        DependencySource::Local { import } => GeneratedProps::load(import).ok().map(|p| p.package_version),
        DependencySource::BuildServer {
          version_file: Some(path),
          ..
        } => GeneratedProps::load(path).ok().map(|p| p.package_version),
        DependencySource::BuildServer { version_file: None, .. } => None,
      };
      if let Some(version) = resolved {
        set_dependency_default_version(&version_file, name, &version)?;
        updated += 1;
      }
    }

    if updated > 0 {
      println!("📌 Updated {} pinned dependency version(s)", updated);
      self
        .git()
        .commit_paths(&[version_file.as_path()], "chore(release): update pinned dependency versions")?;
    }
    Ok(())
  }

  /// Merge the published branch back into the development branch so the
  /// next cycle starts from the released state.
  fn merge_back(&self, published: &str) -> ShipResult<()> {
    let dev = &self.config.product.dev_branch;
    if published == dev.as_str() {
      return Ok(());
    }

    self.git().checkout(dev)?;
    let merge = self
      .git()
      .merge(published, &format!("Merge {} back into {}", published, dev))
      .and_then(|_| self.git().push(dev));

    // Return to the published branch even when the merge failed.
    let restore = self.git().checkout(published);
    merge.map_err(|err| {
      ShipError::Git(GitError::CommandFailed {
        command: format!("merge {} into {}", published, dev),
        stderr: err.to_string(),
      })
    })?;
    restore
  }
}
