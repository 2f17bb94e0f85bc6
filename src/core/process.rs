//! External tool invocation
//!
//! All external tools (build, test, sign, publish, swap) run synchronously
//! through this module. Stdout and stderr are drained on dedicated reader
//! threads that are joined before the call returns, so captured output is
//! always complete. A bounded retry keyed on an output pattern plus a
//! specific exit code absorbs known-transient failures (e.g. file-lock
//! contention); everything else surfaces immediately.

use crate::core::error::{ShipError, ShipResult, ToolError};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation signal, checked by every poll loop
#[derive(Clone, Default)]
pub struct CancelToken {
  flag: Arc<AtomicBool>,
}

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation (safe to call from a signal handler)
  pub fn cancel(&self) {
    self.flag.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.flag.load(Ordering::SeqCst)
  }

  /// Return an error if cancellation was requested
  pub fn check(&self) -> ShipResult<()> {
    if self.is_cancelled() {
      Err(ShipError::fatal("operation cancelled"))
    } else {
      Ok(())
    }
  }
}

/// One configured external tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUnit {
  pub program: String,
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub retry: Option<RetrySpec>,
}

impl ToolUnit {
  pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
    Self {
      program: program.into(),
      args: args.iter().map(|s| s.to_string()).collect(),
      retry: None,
    }
  }

  /// Substitute `{key}` placeholders in every argument
  pub fn substituted(&self, vars: &[(&str, &str)]) -> Self {
    let mut unit = self.clone();
    for arg in &mut unit.args {
      for (key, value) in vars {
        *arg = arg.replace(&format!("{{{}}}", key), value);
      }
    }
    unit
  }
}

/// Bounded retry for known-transient tool failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySpec {
  /// Substring that must appear in the combined output
  pub pattern: String,
  /// Exit code that must match
  pub exit_code: i32,
  /// Total attempt count
  #[serde(default = "default_attempts")]
  pub attempts: u32,
}

fn default_attempts() -> u32 {
  3
}

/// Captured result of a tool invocation
#[derive(Debug)]
pub struct ToolOutput {
  pub exit_code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl ToolOutput {
  pub fn success(&self) -> bool {
    self.exit_code == Some(0)
  }

  pub fn combined(&self) -> String {
    format!("{}{}", self.stdout, self.stderr)
  }
}

/// Run a configured tool unit in `cwd`, honoring its retry spec
pub fn run_unit(unit: &ToolUnit, cwd: &Path, cancel: &CancelToken) -> ShipResult<ToolOutput> {
  let mut attempt = 0;
  let max_attempts = unit.retry.as_ref().map(|r| r.attempts).unwrap_or(1).max(1);

  loop {
    cancel.check()?;
    attempt += 1;

    let output = spawn_and_capture(&unit.program, &unit.args, cwd)?;
    if output.success() {
      return Ok(output);
    }

    let retryable = unit.retry.as_ref().is_some_and(|retry| {
      output.exit_code == Some(retry.exit_code) && output.combined().contains(&retry.pattern)
    });

    if retryable && attempt < max_attempts {
      eprintln!(
        "⚠️  {} failed with a known-transient error, retrying ({}/{})",
        unit.program, attempt, max_attempts
      );
      continue;
    }

    return Err(ShipError::Tool(ToolError {
      program: unit.program.clone(),
      exit_code: output.exit_code,
      output: output.combined(),
    }));
  }
}

/// Spawn a process and capture its output via dedicated reader threads
fn spawn_and_capture(program: &str, args: &[String], cwd: &Path) -> ShipResult<ToolOutput> {
  let mut child = Command::new(program)
    .args(args)
    .current_dir(cwd)
    .stdin(Stdio::null())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .map_err(|e| ShipError::message(format!("Failed to spawn '{}': {}", program, e)))?;

  let stdout = child.stdout.take();
  let stderr = child.stderr.take();

  let out_handle = std::thread::spawn(move || drain(stdout));
  let err_handle = std::thread::spawn(move || drain(stderr));

  let status = child
    .wait()
    .map_err(|e| ShipError::message(format!("Failed to wait for '{}': {}", program, e)))?;

  // Both readers are joined before returning, so output is complete.
  let stdout = out_handle.join().unwrap_or_default();
  let stderr = err_handle.join().unwrap_or_default();

  Ok(ToolOutput {
    exit_code: status.code(),
    stdout,
    stderr,
  })
}

fn drain<R: Read>(reader: Option<R>) -> String {
  let Some(reader) = reader else {
    return String::new();
  };
  let mut buf = String::new();
  for line in BufReader::new(reader).lines() {
    match line {
      Ok(line) => {
        buf.push_str(&line);
        buf.push('\n');
      }
      Err(_) => break,
    }
  }
  buf
}

/// Fixed sleep-and-repoll loop with cooperative cancellation
///
/// Calls `poll` until it yields a value, sleeping `interval` between
/// iterations and checking the cancellation token on every one. Gives up
/// after `max_polls` iterations.
pub fn poll_until<T, F>(
  cancel: &CancelToken,
  interval: Duration,
  max_polls: u32,
  what: &str,
  mut poll: F,
) -> ShipResult<T>
where
  F: FnMut() -> ShipResult<Option<T>>,
{
  for _ in 0..max_polls {
    cancel.check()?;
    if let Some(value) = poll()? {
      return Ok(value);
    }
    std::thread::sleep(interval);
  }
  Err(ShipError::message(format!("Timed out waiting for {}", what)))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::PathBuf;

  fn cwd() -> PathBuf {
    std::env::current_dir().unwrap()
  }

  #[test]
  fn test_run_unit_captures_output() {
    let unit = ToolUnit::new("sh", &["-c", "echo out; echo err >&2"]);
    let output = run_unit(&unit, &cwd(), &CancelToken::new()).unwrap();
    assert_eq!(output.stdout.trim(), "out");
    assert_eq!(output.stderr.trim(), "err");
    assert!(output.success());
  }

  #[test]
  fn test_run_unit_propagates_failure_output() {
    let unit = ToolUnit::new("sh", &["-c", "echo broken >&2; exit 7"]);
    let err = run_unit(&unit, &cwd(), &CancelToken::new()).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("broken"), "captured output must be verbatim: {}", text);
    assert!(text.contains('7'));
  }

  #[test]
  fn test_retry_on_matching_pattern_and_exit_code() {
    // First run creates a marker and fails; second run succeeds.
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let script = format!(
      "if [ -f {m} ]; then exit 0; else touch {m}; echo 'file is locked' >&2; exit 32; fi",
      m = marker.display()
    );
    let mut unit = ToolUnit::new("sh", &["-c", &script]);
    unit.retry = Some(RetrySpec {
      pattern: "file is locked".to_string(),
      exit_code: 32,
      attempts: 3,
    });
    run_unit(&unit, &cwd(), &CancelToken::new()).unwrap();
  }

  #[test]
  fn test_no_retry_on_unmatched_failure() {
    let mut unit = ToolUnit::new("sh", &["-c", "echo other >&2; exit 1"]);
    unit.retry = Some(RetrySpec {
      pattern: "file is locked".to_string(),
      exit_code: 32,
      attempts: 3,
    });
    assert!(run_unit(&unit, &cwd(), &CancelToken::new()).is_err());
  }

  #[test]
  fn test_cancelled_token_stops_poll() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let result: ShipResult<()> =
      poll_until(&cancel, Duration::from_millis(1), 10, "test", || Ok(None));
    assert!(result.is_err());
  }

  #[test]
  fn test_placeholder_substitution() {
    let unit = ToolUnit::new("echo", &["{branch}", "build-{number}"]);
    let sub = unit.substituted(&[("branch", "main"), ("number", "42")]);
    assert_eq!(sub.args, vec!["main", "build-42"]);
  }
}
