//! Integration tests for the bump phase

use crate::helpers::{git, TestWorkspace};
use anyhow::Result;
use shipway::pipeline::{BumpOptions, BumpOutcome};
use shipway::version::main_info::MainVersionInfo;

#[test]
fn test_no_changes_means_nothing_to_bump() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;

  let outcome = ws.pipeline()?.bump_version(&BumpOptions::default())?;
  assert_eq!(outcome, BumpOutcome::NothingToBump);
  Ok(())
}

#[test]
fn test_bump_after_change_increments_and_commits() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let outcome = ws.pipeline()?.bump_version(&BumpOptions::default())?;
  assert_eq!(
    outcome,
    BumpOutcome::Bumped {
      new_version: "3.4.1".to_string()
    }
  );

  let main = MainVersionInfo::load(&ws.path.join("version.toml"))?;
  assert_eq!(main.main_version, "3.4.1");

  let subjects = ws.log_subjects(1)?;
  assert_eq!(subjects[0], "chore(release): bump version to 3.4.1");
  Ok(())
}

#[test]
fn test_bump_is_idempotent() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let pipeline = ws.pipeline()?;
  pipeline.bump_version(&BumpOptions::default())?;
  let second = pipeline.bump_version(&BumpOptions::default())?;

  assert_eq!(second, BumpOutcome::AlreadyBumped);
  let main = MainVersionInfo::load(&ws.path.join("version.toml"))?;
  assert_eq!(main.main_version, "3.4.1");
  Ok(())
}

#[test]
fn test_override_previous_bump_bumps_again() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let pipeline = ws.pipeline()?;
  pipeline.bump_version(&BumpOptions::default())?;
  let outcome = pipeline.bump_version(&BumpOptions {
    override_previous_bump: true,
    ..Default::default()
  })?;

  assert_eq!(
    outcome,
    BumpOutcome::Bumped {
      new_version: "3.4.2".to_string()
    }
  );
  Ok(())
}

#[test]
fn test_force_bumps_without_changes() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;

  let outcome = ws.pipeline()?.bump_version(&BumpOptions {
    force: true,
    ..Default::default()
  })?;
  assert_eq!(
    outcome,
    BumpOutcome::Bumped {
      new_version: "3.4.1".to_string()
    }
  );
  Ok(())
}

#[test]
fn test_refuses_when_dev_is_behind_release() -> Result<()> {
  let manifest = r#"
[product]
name = "gateway"
family = "platform"
release_branch = "release"
"#;
  let ws = TestWorkspace::new(manifest, crate::helpers::BASIC_VERSION)?;
  ws.seed_tag("3.4")?;

  // Release branch gains a commit that main does not have.
  git(&ws.path, &["checkout", "-b", "release"])?;
  ws.commit_file("hotfix.txt", "fix", "fix: hotfix on release")?;
  git(&ws.path, &["checkout", "main"])?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let err = ws.pipeline()?.bump_version(&BumpOptions::default()).unwrap_err();
  assert!(err.to_string().contains("release"));
  Ok(())
}

#[test]
fn test_wrong_branch_is_refused() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  git(&ws.path, &["checkout", "-b", "feature"])?;

  let err = ws.pipeline()?.bump_version(&BumpOptions::default()).unwrap_err();
  assert!(err.to_string().contains("main"));
  Ok(())
}
