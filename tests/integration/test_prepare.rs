//! Integration tests for the prepare phase

use crate::helpers::TestWorkspace;
use anyhow::Result;
use chrono::{Duration, Utc};
use shipway::core::config::Configuration;
use shipway::deps::build_server::MemoryBuildServer;
use shipway::pipeline::{PrepareOptions, PrepareOutcome};
use shipway::version::resolver::{VersionSpec, LOCAL_PATCH_FLOOR};

const DEPENDENT_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"

[[dependencies]]
name = "sdk"
family = "platform"
repo = "git@example.com:platform/sdk.git"

[dependencies.build_types]
release = "Sdk_Release"
"#;

const DEPENDENT_VERSION: &str = r#"
main_version = "3.4"

[dependencies.sdk]
version = "2.1.0"
feed = "https://feed.example.com/v3"
"#;

#[test]
fn test_local_prepare_writes_properties() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  let pipeline = ws.pipeline()?;

  let outcome = pipeline.prepare(Configuration::Release, &PrepareOptions::default())?;
  let build = outcome.build_info();

  assert!(build.components.patch_number >= LOCAL_PATCH_FLOOR);
  assert!(build.package_version.starts_with("3.4-"));
  assert!(build.package_version.contains("local-"));
  assert_eq!(build.assembly_version, format!("3.4.{}", build.components.patch_number));

  assert!(ws.file_exists(".ship/generated/gateway.props.toml"));
  assert!(ws.file_exists(".ship/dependency-overrides.toml"));
  Ok(())
}

#[test]
fn test_numbered_prepare_uses_build_number() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  let pipeline = ws.pipeline()?;

  let outcome = pipeline.prepare(
    Configuration::Release,
    &PrepareOptions {
      version_spec: VersionSpec::Numbered(157),
      ..Default::default()
    },
  )?;

  assert_eq!(outcome.build_info().package_version, "3.4-157-dev-release");
  Ok(())
}

#[test]
fn test_fresh_properties_short_circuit() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  let pipeline = ws.pipeline()?;

  pipeline.prepare(Configuration::Release, &PrepareOptions::default())?;

  let outcome = pipeline.prepare(
    Configuration::Release,
    &PrepareOptions {
      fresh_since: Some(Utc::now() - Duration::hours(1)),
      ..Default::default()
    },
  )?;
  assert!(matches!(outcome, PrepareOutcome::AlreadyFresh(_)));

  // A cutoff in the future forces a re-prepare.
  let outcome = pipeline.prepare(
    Configuration::Release,
    &PrepareOptions {
      fresh_since: Some(Utc::now() + Duration::hours(1)),
      ..Default::default()
    },
  )?;
  assert!(matches!(outcome, PrepareOutcome::Prepared(_)));
  Ok(())
}

#[test]
fn test_prepare_cleans_stale_artifacts() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  std::fs::create_dir_all(ws.path.join("artifacts"))?;
  std::fs::write(ws.path.join("artifacts/stale.zip"), "old")?;

  let pipeline = ws.pipeline()?;
  pipeline.prepare(Configuration::Release, &PrepareOptions::default())?;

  assert!(!ws.file_exists("artifacts/stale.zip"));
  Ok(())
}

#[test]
fn test_no_dependencies_prepare_keeps_existing_outputs() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  std::fs::create_dir_all(ws.path.join("artifacts"))?;
  std::fs::write(ws.path.join("artifacts/keep.zip"), "built elsewhere")?;

  let pipeline = ws.pipeline()?;
  pipeline.prepare(
    Configuration::Release,
    &PrepareOptions {
      no_dependencies: true,
      ..Default::default()
    },
  )?;

  // Cleanup of previous outputs only happens on a full prepare.
  assert!(ws.file_exists("artifacts/keep.zip"));
  Ok(())
}

#[test]
fn test_public_prepare_outside_ci_refused_even_when_fresh() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  std::env::remove_var("CI");
  let pipeline = ws.pipeline()?;

  // Forced once to leave a fresh public properties file behind.
  pipeline.prepare(
    Configuration::Public,
    &PrepareOptions {
      version_spec: VersionSpec::Public,
      force: true,
      ..Default::default()
    },
  )?;

  let err = pipeline
    .prepare(
      Configuration::Public,
      &PrepareOptions {
        version_spec: VersionSpec::Public,
        fresh_since: Some(Utc::now() - Duration::hours(1)),
        ..Default::default()
      },
    )
    .unwrap_err();
  assert!(err.to_string().contains("CI"));
  Ok(())
}

#[test]
fn test_build_server_override_is_fetched_and_persisted() -> Result<()> {
  let ws = TestWorkspace::new(DEPENDENT_MANIFEST, DEPENDENT_VERSION)?;

  // A previous invocation pinned sdk to a CI build of its main branch.
  std::fs::create_dir_all(ws.path.join(".ship"))?;
  std::fs::write(
    ws.path.join(".ship/dependency-overrides.toml"),
    "[dependencies.sdk]\norigin = \"Override\"\nkind = \"BuildServer\"\nbranch = \"main\"\n",
  )?;

  let server = MemoryBuildServer::new();
  server.add_build("Sdk_Release", "main", 1234, "main_version = \"2.1\"\n");
  let pipeline = ws.pipeline()?.with_build_server(Box::new(server));

  pipeline.prepare(Configuration::Release, &PrepareOptions::default())?;

  assert!(ws.file_exists(".ship/imports/sdk.props.toml"));
  let persisted = ws.read_file(".ship/dependency-overrides.toml")?;
  assert!(persisted.contains("build_number = 1234"));
  assert!(persisted.contains("Sdk_Release"));
  Ok(())
}

#[test]
fn test_missing_dependency_default_fails_prepare() -> Result<()> {
  // sdk is declared but has no entry in the version declaration.
  let ws = TestWorkspace::new(DEPENDENT_MANIFEST, crate::helpers::BASIC_VERSION)?;

  let err = ws
    .pipeline()?
    .prepare(Configuration::Release, &PrepareOptions::default())
    .unwrap_err();
  assert!(err.to_string().contains("sdk"));
  Ok(())
}

#[test]
fn test_successive_local_prepares_increase_patch() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  let pipeline = ws.pipeline()?;

  let first = pipeline
    .prepare(Configuration::Release, &PrepareOptions::default())?
    .build_info()
    .components
    .patch_number;
  let second = pipeline
    .prepare(Configuration::Release, &PrepareOptions::default())?
    .build_info()
    .components
    .patch_number;

  assert!(second > first);
  Ok(())
}
