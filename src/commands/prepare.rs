use crate::core::config::Configuration;
use crate::core::error::{ShipError, ShipResult};
use crate::core::process::CancelToken;
use crate::pipeline::{PrepareOptions, PrepareOutcome};
use crate::version::resolver::VersionSpec;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Requested versioning policy on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum VersionKindArg {
  Local,
  Numbered,
  Public,
}

/// Run the prepare command
#[allow(clippy::too_many_arguments)]
pub fn run_prepare(
  config: Option<PathBuf>,
  configuration: Configuration,
  version_kind: Option<VersionKindArg>,
  build_number: Option<u64>,
  no_dependencies: bool,
  force: bool,
  fresh_since: Option<String>,
  cancel: CancelToken,
) -> ShipResult<()> {
  let version_spec = resolve_spec(version_kind, build_number)?;
  let fresh_since = fresh_since.map(|raw| parse_cutoff(&raw)).transpose()?;

  let pipeline = super::load_pipeline(config.as_deref(), cancel)?;
  let outcome = pipeline.prepare(
    configuration,
    &PrepareOptions {
      version_spec,
      no_dependencies,
      force,
      fresh_since,
    },
  )?;

  if let PrepareOutcome::Prepared(build) = &outcome {
    println!("✅ Prepared {} ({})", build.package_version, configuration);
  }
  Ok(())
}

fn resolve_spec(kind: Option<VersionKindArg>, build_number: Option<u64>) -> ShipResult<VersionSpec> {
  match (kind, build_number) {
    (Some(VersionKindArg::Numbered) | None, Some(number)) => Ok(VersionSpec::Numbered(number)),
    (Some(VersionKindArg::Numbered), None) => Err(ShipError::with_help(
      "Numbered builds need a build number",
      "Pass --build-number N",
    )),
    (Some(VersionKindArg::Local) | None, None) => Ok(VersionSpec::Local),
    (Some(VersionKindArg::Public), None) => Ok(VersionSpec::Public),
    (Some(_), Some(_)) => Err(ShipError::message(
      "--build-number only applies to numbered builds",
    )),
  }
}

fn parse_cutoff(raw: &str) -> ShipResult<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(raw)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| ShipError::with_help(format!("Invalid --fresh-since '{}': {}", raw, e), "Use an RFC 3339 timestamp"))
}
