//! Prepare phase
//!
//! Resolves dependencies, computes the invocation's version, writes the
//! generated properties file and restores source-level dependencies. The
//! written properties file is the contract every later phase reads.

use super::{PhaseEvent, ReleasePipeline};
use crate::core::config::Configuration;
use crate::core::error::{ShipError, ShipResult};
use crate::core::vcs::SystemGit;
use crate::deps::overrides::LocalBuildImport;
use crate::props::GeneratedProps;
use crate::version::resolver::{compute_version, BuildInfo, VersionSpec};
use chrono::{DateTime, Utc};
use std::fs;

/// Caller-supplied knobs for a prepare invocation
#[derive(Debug, Clone)]
pub struct PrepareOptions {
  pub version_spec: VersionSpec,
  /// Skip dependency resolution and fetching entirely
  pub no_dependencies: bool,
  /// Allow a public build outside CI
  pub force: bool,
  /// Skip the whole phase when a properties file newer than this exists
  pub fresh_since: Option<DateTime<Utc>>,
}

impl Default for PrepareOptions {
  fn default() -> Self {
    Self {
      version_spec: VersionSpec::Local,
      no_dependencies: false,
      force: false,
      fresh_since: None,
    }
  }
}

#[derive(Debug)]
pub enum PrepareOutcome {
  /// An up-to-date properties file already exists; nothing was done
  AlreadyFresh(BuildInfo),
  Prepared(BuildInfo),
}

impl PrepareOutcome {
  pub fn build_info(&self) -> &BuildInfo {
    match self {
      PrepareOutcome::AlreadyFresh(info) | PrepareOutcome::Prepared(info) => info,
    }
  }
}

impl ReleasePipeline {
  pub fn prepare(&self, configuration: Configuration, options: &PrepareOptions) -> ShipResult<PrepareOutcome> {
    // Public builds are a CI-only operation unless explicitly forced.
    // Checked before the staleness short-circuit: a fresh properties file
    // must not let a refused invocation report success.
    if configuration == Configuration::Public && !Self::in_ci() && !options.force {
      return Err(ShipError::with_help(
        "Public builds must run on CI",
        "Pass --force to prepare a public build locally",
      ));
    }

    // Staleness short-circuit: an existing properties file generated at
    // or after the cutoff means this checkout was already prepared.
    if let Some(cutoff) = options.fresh_since {
      if let Ok(props) = GeneratedProps::load(&self.props_path()) {
        if props.configuration == configuration && props.is_fresher_than(cutoff) {
          println!("⏭️  Properties are fresh, skipping prepare");
          return Ok(PrepareOutcome::AlreadyFresh(self.build_info_from_props(&props)?));
        }
      }
    }

    if !options.no_dependencies {
      self.clean_stale_outputs()?;
    }

    let main = self.main_info()?;
    let store = self.override_store();

    let mut overrides = if options.no_dependencies {
      Default::default()
    } else {
      let mut file = store.load_with_overrides(&self.config, &main)?;
      let fetched = store.fetch(&mut file, &self.config, configuration, self.build_server())?;
      if fetched > 0 {
        println!("📦 Fetched {} dependency version file(s)", fetched);
      }
      file
    };

    let components = compute_version(
      configuration,
      options.version_spec,
      &main,
      &overrides,
      self.config.product.main_version_dependency.as_deref(),
      self.counter(),
      self.user(),
    )?;
    let build = BuildInfo::new(components, configuration, &self.config.product.name);
    println!("🏷️  Version: {}", build.package_version);

    let props = GeneratedProps::assemble(&self.config, &build, &overrides);
    props.save(&self.props_path())?;

    if !options.no_dependencies {
      // Sibling checkouts resolving this product as a local dependency
      // consume the import recorded here.
      overrides.local_build = Some(LocalBuildImport {
        import: self.props_path(),
      });
      store.save(&mut overrides)?;
    }

    self.restore_source_dependencies()?;
    self.run_hooks(PhaseEvent::PrepareCompleted)?;

    Ok(PrepareOutcome::Prepared(build))
  }

  /// Remove artifacts of a previous invocation so a failed build cannot
  /// accidentally publish stale output.
  fn clean_stale_outputs(&self) -> ShipResult<()> {
    let artifacts = self.root().join(&self.config.build.artifacts_dir);
    if artifacts.exists() {
      fs::remove_dir_all(&artifacts)?;
    }
    let results = self.root().join(&self.config.test.results_dir);
    if results.exists() {
      fs::remove_dir_all(&results)?;
    }
    Ok(())
  }

  /// Restore source-level dependencies: prefer an existing sibling
  /// checkout next to this repository, otherwise shallow-clone into the
  /// configured path.
  fn restore_source_dependencies(&self) -> ShipResult<()> {
    for source in &self.config.source_dependencies {
      let sibling = self.root().parent().map(|p| p.join(&source.name));
      if sibling.as_ref().is_some_and(|p| p.exists()) {
        continue;
      }

      let dest = self.root().join(&source.path);
      if dest.exists() {
        continue;
      }

      println!("🌱 Cloning source dependency '{}'", source.name);
      SystemGit::shallow_clone(&source.repo, &source.branch, &dest)?;
    }
    Ok(())
  }

  /// Rebuild a BuildInfo from a previously generated properties file
  fn build_info_from_props(&self, props: &GeneratedProps) -> ShipResult<BuildInfo> {
    use crate::version::resolver::VersionComponents;

    // The rendered versions are authoritative here; components beyond the
    // prefix are not recoverable and are not needed by consumers of an
    // AlreadyFresh outcome.
    Ok(BuildInfo {
      package_version: props.package_version.clone(),
      preview_version: props.preview_version.clone(),
      assembly_version: props.assembly_version.clone(),
      configuration: props.configuration,
      build_system_configuration_name: format!("{}_{}", props.product, props.configuration),
      components: VersionComponents {
        main_version: props.main_version.clone(),
        version_prefix: props.main_version.clone(),
        patch_number: 0,
        version_suffix: String::new(),
      },
    })
  }
}
