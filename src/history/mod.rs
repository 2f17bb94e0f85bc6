//! Git history analysis
//!
//! Classifies the repository's change/bump state relative to its last
//! published release: finds the most recent tag of the current release
//! line and scans the commit subjects between that tag and HEAD for
//! generated bump markers.

use crate::core::error::{GitError, ShipError, ShipResult};
use crate::core::vcs::SystemGit;
use crate::version::main_info::MainVersionInfo;
use regex::Regex;
use std::sync::OnceLock;

/// Subject line of the generated version-bump commit
pub fn bump_commit_subject(version: &str) -> String {
  format!("chore(release): bump version to {}", version)
}

/// Fixed pattern recognizing generated bump commits
pub fn bump_marker() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"^chore\(release\): bump version to \d+(\.\d+)*").unwrap())
}

/// Tag prefix for published releases
pub const RELEASE_TAG_PREFIX: &str = "release/";

/// Release tag name for a package version
pub fn release_tag(package_version: &str) -> String {
  format!("{}{}", RELEASE_TAG_PREFIX, package_version)
}

/// Result of analyzing the repository's history
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryReport {
  /// A generated bump commit exists between the last release tag and HEAD
  pub has_bump_since_last_deployment: bool,
  /// Non-marker commits exist between the last release tag and HEAD
  pub has_changes_since_last_deployment: bool,
  /// Version portion of the most recent release tag
  pub last_tag_version: String,
}

/// Inspects tags and commit logs of the current repository
pub struct GitHistoryAnalyzer<'a> {
  git: &'a SystemGit,
}

impl<'a> GitHistoryAnalyzer<'a> {
  pub fn new(git: &'a SystemGit) -> Self {
    Self { git }
  }

  /// Classify the change/bump state relative to the last release tag.
  ///
  /// The absence of any tag matching the release line is a hard error: a
  /// seed tag must exist at the repository's first commit.
  pub fn analyze(&self, main: &MainVersionInfo) -> ShipResult<HistoryReport> {
    self.git.fetch_remote()?;

    let glob = format!("{}{}.*", RELEASE_TAG_PREFIX, main.release_line());
    let tag = self
      .git
      .latest_tag_matching(&glob)?
      .ok_or(ShipError::Git(GitError::SeedTagMissing { glob }))?;

    let subjects = self.git.commit_subjects_since(&tag)?;
    let marker = bump_marker();

    let has_bump = subjects.iter().any(|s| marker.is_match(s));
    let non_marker_commits = subjects.iter().filter(|s| !marker.is_match(s)).count();

    Ok(HistoryReport {
      has_bump_since_last_deployment: has_bump,
      has_changes_since_last_deployment: non_marker_commits > 0,
      last_tag_version: tag.trim_start_matches(RELEASE_TAG_PREFIX).to_string(),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_bump_marker_matches_generated_subjects() {
    let marker = bump_marker();
    assert!(marker.is_match("chore(release): bump version to 3.5"));
    assert!(marker.is_match("chore(release): bump version to 3.4.1"));
    assert!(!marker.is_match("feat: bump the buffer size"));
    assert!(!marker.is_match("Bump version to 3.5"));
  }

  #[test]
  fn test_release_tag_format() {
    assert_eq!(release_tag("3.4-rc"), "release/3.4-rc");
    assert_eq!(bump_commit_subject("3.5"), "chore(release): bump version to 3.5");
  }
}
