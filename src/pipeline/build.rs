//! Build phase
//!
//! Runs the configured build units, verifies artifact patterns, packages
//! and signs outputs, and maintains the build success sentinel. The
//! sentinel is deleted before the first unit runs and rewritten only
//! after everything else succeeded, so a crash mid-build leaves the
//! checkout marked as not built.

use super::{resolve_artifact_globs, PhaseEvent, ReleasePipeline};
use crate::core::config::Configuration;
use crate::core::error::{ShipError, ShipResult};
use crate::core::process::{self, ToolUnit};
use crate::deps::overrides::verify_imports;
use crate::publish::ArtifactSet;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
  /// Skip zipping private artifacts
  pub no_zip: bool,
}

const PRIVATE_ZIP: &str = "private-artifacts.zip";

impl ReleasePipeline {
  pub fn build(&self, configuration: Configuration, options: &BuildOptions) -> ShipResult<()> {
    let sentinel = self.sentinel_path();
    if sentinel.exists() {
      fs::remove_file(&sentinel)?;
    }

    if let Some(overrides) = self.override_store().load_persisted()? {
      verify_imports(&overrides)?;
    }

    for unit in &self.config.build.units {
      self.cancel().check()?;
      println!("🔨 {}", unit.program);
      process::run_unit(unit, self.root(), self.cancel())?;
    }

    self.run_hooks(PhaseEvent::BeforeArtifactVerify)?;

    let public = resolve_artifact_globs(self.root(), &self.config.build.public_artifacts)?;
    let private = resolve_artifact_globs(self.root(), &self.config.build.private_artifacts)?;

    let artifacts_dir = self.root().join(&self.config.build.artifacts_dir);
    fs::create_dir_all(&artifacts_dir)?;

    if self.config.build.zip_private && !options.no_zip && !private.is_empty() {
      self.zip_private_artifacts(&artifacts_dir, &private)?;
    }

    let staged = self.stage_public_artifacts(&artifacts_dir, &public)?;
    if self.config.build.sign && configuration == Configuration::Public {
      self.sign_artifacts(&staged)?;
    }

    self.run_hooks(PhaseEvent::BuildCompleted)?;

    // Written last: the sentinel's existence means the whole build
    // completed.
    if let Some(parent) = sentinel.parent() {
      fs::create_dir_all(parent)?;
    }
    fs::write(&sentinel, format!("{}\n", Utc::now().to_rfc3339()))?;

    println!("✅ Build succeeded");
    Ok(())
  }

  /// Artifact sets for the publish phase, resolved from the configured
  /// glob patterns. Requires a successful build sentinel.
  pub(crate) fn artifact_sets(&self) -> ShipResult<(ArtifactSet, ArtifactSet)> {
    use crate::core::config::ArtifactVisibility;

    if !self.sentinel_path().exists() {
      return Err(ShipError::with_help(
        "No successful build recorded for this checkout",
        "Run `shipway build` first",
      ));
    }

    let public = ArtifactSet {
      visibility: ArtifactVisibility::Public,
      files: resolve_artifact_globs(self.root(), &self.config.build.public_artifacts)?,
    };
    let private = ArtifactSet {
      visibility: ArtifactVisibility::Private,
      files: resolve_artifact_globs(self.root(), &self.config.build.private_artifacts)?,
    };
    Ok((public, private))
  }

  fn zip_private_artifacts(&self, artifacts_dir: &Path, files: &[PathBuf]) -> ShipResult<()> {
    let dest = artifacts_dir.join(PRIVATE_ZIP);
    let mut args: Vec<&str> = vec!["-q", "-j"];
    let dest_str = dest.display().to_string();
    args.push(&dest_str);
    let file_strs: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
    args.extend(file_strs.iter().map(String::as_str));

    let unit = ToolUnit::new("zip", &args);
    process::run_unit(&unit, self.root(), self.cancel())?;
    println!("🗜️  Zipped {} private artifact(s)", files.len());
    Ok(())
  }

  /// Copy public artifacts into the staging directory, flat by filename
  fn stage_public_artifacts(&self, artifacts_dir: &Path, files: &[PathBuf]) -> ShipResult<Vec<PathBuf>> {
    let staging = artifacts_dir.join("public");
    fs::create_dir_all(&staging)?;

    let mut staged = Vec::with_capacity(files.len());
    for file in files {
      let name = file
        .file_name()
        .ok_or_else(|| ShipError::message(format!("Artifact '{}' has no file name", file.display())))?;
      let dest = staging.join(name);
      fs::copy(file, &dest)?;
      staged.push(dest);
    }
    Ok(staged)
  }

  fn sign_artifacts(&self, files: &[PathBuf]) -> ShipResult<()> {
    let tool = self.config.build.sign_tool.as_ref().ok_or_else(|| {
      ShipError::with_help(
        "Signing is enabled but no sign tool is configured",
        "Set [build] sign_tool in ship.toml",
      )
    })?;

    for file in files {
      let mut unit = tool.clone();
      unit.args.push(file.display().to_string());
      process::run_unit(&unit, self.root(), self.cancel())?;
    }
    println!("🔏 Signed {} artifact(s)", files.len());
    Ok(())
  }
}
