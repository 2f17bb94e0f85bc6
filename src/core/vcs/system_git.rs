//! System git backend - zero dependencies
//!
//! Uses git plumbing commands for all operations the release pipeline
//! needs: branch identity, tag enumeration, commit ranges, tagging,
//! committing and pushing. Subprocesses run with an isolated environment
//! so global configuration cannot change behavior.

use crate::core::error::{GitError, ShipError, ShipResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git backend using system git (zero crate dependencies)
pub struct SystemGit {
  /// Repository working directory
  repo_path: PathBuf,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> ShipResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(ShipError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(ShipError::message(format!("Failed to open git repository: {}", stderr)));
    }

    Ok(Self {
      repo_path: path.to_path_buf(),
    })
  }

  pub fn path(&self) -> &Path {
    &self.repo_path
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> ShipResult<String> {
    self.run(&["rev-parse", "HEAD"]).map(|s| s.trim().to_string())
  }

  /// Get current branch name (returns "HEAD" when detached)
  pub fn current_branch(&self) -> ShipResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Whether the repository has any configured remote
  pub fn has_remote(&self) -> bool {
    self
      .git_cmd()
      .args(["remote"])
      .output()
      .map(|o| o.status.success() && !o.stdout.is_empty())
      .unwrap_or(false)
  }

  /// Fetch remote tags and commits; a no-op when no remote is configured
  pub fn fetch_remote(&self) -> ShipResult<()> {
    if !self.has_remote() {
      return Ok(());
    }
    self.run(&["fetch", "--tags", "--quiet"]).map(|_| ())
  }

  /// Highest-versioned tag matching a glob, or None.
  ///
  /// Version sort rather than creation date: tags within a release line
  /// carry monotonically increasing versions, and creation timestamps
  /// have only second granularity.
  pub fn latest_tag_matching(&self, glob: &str) -> ShipResult<Option<String>> {
    let stdout = self.run(&["tag", "--list", glob, "--sort=-v:refname"])?;
    Ok(stdout.lines().next().map(|s| s.trim().to_string()))
  }

  /// One-line commit subjects in `from..HEAD`, newest first
  pub fn commit_subjects_since(&self, from: &str) -> ShipResult<Vec<String>> {
    let range = format!("{}..HEAD", from);
    let stdout = self.run(&["log", &range, "--pretty=format:%s"])?;
    Ok(
      stdout
        .lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect(),
    )
  }

  /// Count of commits reachable from `to` but not from `from`
  pub fn commits_ahead(&self, from: &str, to: &str) -> ShipResult<usize> {
    let range = format!("{}..{}", from, to);
    let stdout = self.run(&["rev-list", "--count", &range])?;
    Ok(stdout.trim().parse()?)
  }

  /// Whether a local or remote branch with this name exists
  pub fn branch_exists(&self, branch: &str) -> bool {
    let local = format!("refs/heads/{}", branch);
    let remote = format!("refs/remotes/origin/{}", branch);
    self
      .git_cmd()
      .args(["show-ref", "--verify", "--quiet", &local])
      .status()
      .map(|s| s.success())
      .unwrap_or(false)
      || self
        .git_cmd()
        .args(["show-ref", "--verify", "--quiet", &remote])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
  }

  /// Create an annotated tag on HEAD
  pub fn tag(&self, name: &str, message: &str) -> ShipResult<()> {
    self.run(&["tag", "-a", name, "-m", message]).map(|_| ())
  }

  /// Stage the given paths and commit with the given subject
  pub fn commit_paths(&self, paths: &[&Path], subject: &str) -> ShipResult<String> {
    let mut args = vec!["add".to_string(), "--".to_string()];
    for path in paths {
      args.push(path.display().to_string());
    }
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    self.run(&arg_refs)?;

    self.run(&["commit", "-m", subject])?;
    self.head_commit()
  }

  /// Push the given branch (and tags) to origin; no-op without a remote
  pub fn push(&self, branch: &str) -> ShipResult<()> {
    if !self.has_remote() {
      return Ok(());
    }
    let output = self
      .git_cmd()
      .args(["push", "--follow-tags", "origin", branch])
      .output()
      .context("Failed to execute git push")?;

    if !output.status.success() {
      return Err(ShipError::Git(GitError::PushFailed {
        branch: branch.to_string(),
        reason: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }
    Ok(())
  }

  /// Merge `source` into the currently checked-out branch
  pub fn merge(&self, source: &str, message: &str) -> ShipResult<()> {
    self.run(&["merge", "--no-ff", "-m", message, source]).map(|_| ())
  }

  /// Check out a branch
  pub fn checkout(&self, branch: &str) -> ShipResult<()> {
    self.run(&["checkout", branch]).map(|_| ())
  }

  /// Shallow-clone a single branch of a repository
  pub fn shallow_clone(url: &str, branch: &str, dest: &Path) -> ShipResult<SystemGit> {
    let output = Command::new("git")
      .args(["clone", "--depth", "1", "--branch", branch, url])
      .arg(dest)
      .output()
      .context("Failed to execute git clone")?;

    if !output.status.success() {
      return Err(ShipError::Git(GitError::CommandFailed {
        command: format!("git clone --depth 1 --branch {} {}", branch, url),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    SystemGit::open(dest)
  }

  /// Run a git command, returning stdout or a CommandFailed error
  fn run(&self, args: &[&str]) -> ShipResult<String> {
    let output = self
      .git_cmd()
      .args(args)
      .output()
      .with_context(|| format!("Failed to execute git {}", args.join(" ")))?;

    if !output.status.success() {
      return Err(ShipError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }

  /// Create a safe git command with isolated environment
  ///
  /// Clears the environment, whitelists PATH and HOME, and overrides
  /// config that could change parsing behavior.
  fn git_cmd(&self) -> Command {
    let mut cmd = Command::new("git");
    cmd.arg("-C").arg(&self.repo_path);

    cmd.env_clear();
    if let Ok(path) = std::env::var("PATH") {
      cmd.env("PATH", path);
    }
    if let Ok(home) = std::env::var("HOME") {
      cmd.env("HOME", home);
    }

    cmd.arg("-c").arg("protocol.version=2");
    cmd.arg("-c").arg("advice.detachedHead=false");
    cmd.arg("-c").arg("core.quotePath=false");

    cmd
  }
}
