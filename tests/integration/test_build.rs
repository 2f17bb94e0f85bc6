//! Integration tests for the build phase and its success sentinel

use crate::helpers::TestWorkspace;
use anyhow::Result;
use shipway::core::config::Configuration;
use shipway::pipeline::BuildOptions;

const BUILD_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"

[build]
units = [{ program = "true" }]
public_artifacts = ["dist/*.pkg"]
"#;

const FAILING_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"

[build]
units = [{ program = "false" }]
"#;

#[test]
fn test_successful_build_writes_sentinel_and_stages_artifacts() -> Result<()> {
  let ws = TestWorkspace::new(BUILD_MANIFEST, crate::helpers::BASIC_VERSION)?;
  std::fs::create_dir_all(ws.path.join("dist"))?;
  std::fs::write(ws.path.join("dist/app.pkg"), "pkg")?;

  ws.pipeline()?.build(Configuration::Release, &BuildOptions::default())?;

  assert!(ws.file_exists(".ship/build-succeeded"));
  assert!(ws.file_exists("artifacts/public/app.pkg"));
  Ok(())
}

#[test]
fn test_failed_build_removes_stale_sentinel() -> Result<()> {
  let ws = TestWorkspace::new(FAILING_MANIFEST, crate::helpers::BASIC_VERSION)?;
  std::fs::create_dir_all(ws.path.join(".ship"))?;
  std::fs::write(ws.path.join(".ship/build-succeeded"), "stale\n")?;

  let result = ws.pipeline()?.build(Configuration::Release, &BuildOptions::default());

  assert!(result.is_err());
  // An interrupted or failed build must never look successfully built.
  assert!(!ws.file_exists(".ship/build-succeeded"));
  Ok(())
}

#[test]
fn test_unmatched_artifact_pattern_fails_build() -> Result<()> {
  let ws = TestWorkspace::new(BUILD_MANIFEST, crate::helpers::BASIC_VERSION)?;
  // No dist/*.pkg file exists.

  let err = ws
    .pipeline()?
    .build(Configuration::Release, &BuildOptions::default())
    .unwrap_err();

  assert!(err.to_string().contains("dist/*.pkg"));
  assert!(!ws.file_exists(".ship/build-succeeded"));
  Ok(())
}
