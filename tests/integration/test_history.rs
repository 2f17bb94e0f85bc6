//! Integration tests for git history classification

use crate::helpers::TestWorkspace;
use anyhow::Result;
use shipway::core::vcs::SystemGit;
use shipway::history::{bump_commit_subject, GitHistoryAnalyzer};
use shipway::version::main_info::MainVersionInfo;

fn analyze(ws: &TestWorkspace) -> Result<shipway::history::HistoryReport> {
  let git = SystemGit::open(&ws.path)?;
  let main = MainVersionInfo::load(&ws.path.join("version.toml"))?;
  Ok(GitHistoryAnalyzer::new(&git).analyze(&main)?)
}

#[test]
fn test_head_at_tag_means_no_changes_no_bump() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;

  let report = analyze(&ws)?;
  assert!(!report.has_changes_since_last_deployment);
  assert!(!report.has_bump_since_last_deployment);
  assert_eq!(report.last_tag_version, "3.4");
  Ok(())
}

#[test]
fn test_commit_after_tag_counts_as_change() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("src.txt", "change", "feat: add feature")?;

  let report = analyze(&ws)?;
  assert!(report.has_changes_since_last_deployment);
  assert!(!report.has_bump_since_last_deployment);
  Ok(())
}

#[test]
fn test_bump_marker_alone_is_not_a_change() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.4")?;
  ws.commit_file("version.toml", "main_version = \"3.4.1\"\n", &bump_commit_subject("3.4.1"))?;

  let report = analyze(&ws)?;
  assert!(report.has_bump_since_last_deployment);
  assert!(!report.has_changes_since_last_deployment);
  Ok(())
}

#[test]
fn test_missing_seed_tag_is_hard_error() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  assert!(analyze(&ws).is_err());
  Ok(())
}

#[test]
fn test_latest_tag_of_release_line_wins() -> Result<()> {
  let ws = TestWorkspace::basic()?;
  ws.seed_tag("3.3")?;
  ws.commit_file("a.txt", "a", "feat: a")?;
  ws.seed_tag("3.4")?;

  let report = analyze(&ws)?;
  assert_eq!(report.last_tag_version, "3.4");
  assert!(!report.has_changes_since_last_deployment);
  Ok(())
}
