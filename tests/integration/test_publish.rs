//! Integration tests for publish gating and slot swap

use crate::helpers::{git, TestWorkspace};
use anyhow::Result;

const SWAP_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"

[swap]
action = { program = "sh", args = ["-c", "echo swap >> swaps.log"] }

[[swap.testers]]
name = "smoke"
command = { program = "false" }
"#;

const SWAP_OK_MANIFEST: &str = r#"
[product]
name = "gateway"
family = "platform"

[swap]
action = { program = "sh", args = ["-c", "echo swap >> swaps.log"] }

[[swap.testers]]
name = "smoke"
command = { program = "true" }
"#;

#[test]
fn test_publish_refused_without_bump() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let err = ws.pipeline()?.pre_publish(false).unwrap_err();
  assert!(err.to_string().contains("bump"));
  Ok(())
}

#[test]
fn test_publish_force_overrides_gate() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  // No pre targets are configured, so passing the gate is the whole phase.
  ws.pipeline()?.pre_publish(true)?;
  Ok(())
}

#[test]
fn test_publish_allowed_after_bump() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;
  ws.pipeline()?.bump_version(&Default::default())?;

  ws.pipeline()?.pre_publish(false)?;
  Ok(())
}

#[test]
fn test_publish_requires_expected_branch() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  git(&ws.path, &["checkout", "-b", "feature"])?;

  let err = ws.pipeline()?.pre_publish(false).unwrap_err();
  assert!(err.to_string().contains("main"));
  Ok(())
}

#[test]
fn test_swap_reverts_when_smoke_test_fails() -> Result<()> {
  let ws = TestWorkspace::new(SWAP_MANIFEST, crate::helpers::BASIC_VERSION)?;

  let result = ws.pipeline()?.swap();

  assert!(result.is_err());
  // Forward swap plus automatic revert.
  let log = ws.read_file("swaps.log")?;
  assert_eq!(log.lines().count(), 2);
  Ok(())
}

#[test]
fn test_swap_succeeds_when_smoke_test_passes() -> Result<()> {
  let ws = TestWorkspace::new(SWAP_OK_MANIFEST, crate::helpers::BASIC_VERSION)?;

  ws.pipeline()?.swap()?;

  let log = ws.read_file("swaps.log")?;
  assert_eq!(log.lines().count(), 1);
  Ok(())
}

#[test]
fn test_swap_without_configuration_is_refused() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  let err = ws.pipeline()?.swap().unwrap_err();
  assert!(err.to_string().contains("swap"));
  Ok(())
}
