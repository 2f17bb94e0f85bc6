//! Error types for shipway with contextual messages and exit codes
//!
//! Errors follow a three-level taxonomy used by every phase:
//! configuration errors fail fast before side effects, recoverable errors
//! are aggregated by the publish dispatcher, and fatal errors abort the
//! pipeline immediately.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for shipway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing declarations)
  User = 1,
  /// System error (git, external tool, I/O)
  System = 2,
  /// Validation failure (branch preconditions, publish gate, artifacts)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for shipway
#[derive(Debug)]
pub enum ShipError {
  /// Configuration errors (manifest, version declaration, overrides)
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// External tool invocation errors
  Tool(ToolError),

  /// Validation errors (branch identity, publish gate, artifacts)
  Validation(ValidationError),

  /// I/O errors
  Io(io::Error),

  /// Fatal errors: abort the pipeline, never retried
  Fatal { message: String },

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },

  /// Another error carrying added context. Classification, help and
  /// fatality all defer to the wrapped error.
  Context { context: String, source: Box<ShipError> },
}

impl ShipError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ShipError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Create a fatal error (aborts the pipeline, never retried)
  pub fn fatal(msg: impl Into<String>) -> Self {
    ShipError::Fatal { message: msg.into() }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ShipError::Message { message, context, help } => ShipError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ShipError::Context { context, source } => ShipError::Context {
        context: format!("{}\n{}", ctx_str, context),
        source,
      },
      other => ShipError::Context {
        context: ctx_str,
        source: Box::new(other),
      },
    }
  }

  /// Whether this error must abort the whole pipeline without retry
  pub fn is_fatal(&self) -> bool {
    match self {
      ShipError::Fatal { .. } => true,
      ShipError::Context { source, .. } => source.is_fatal(),
      _ => false,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ShipError::Config(_) => ExitCode::User,
      ShipError::Git(_) => ExitCode::System,
      ShipError::Tool(_) => ExitCode::System,
      ShipError::Validation(_) => ExitCode::Validation,
      ShipError::Io(_) => ExitCode::System,
      ShipError::Fatal { .. } => ExitCode::System,
      ShipError::Message { .. } => ExitCode::User,
      ShipError::Context { source, .. } => source.exit_code(),
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ShipError::Config(e) => e.help_message(),
      ShipError::Git(e) => e.help_message(),
      ShipError::Validation(e) => e.help_message(),
      ShipError::Message { help, .. } => help.clone(),
      ShipError::Context { source, .. } => source.help_message(),
      _ => None,
    }
  }
}

impl fmt::Display for ShipError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ShipError::Config(e) => write!(f, "{}", e),
      ShipError::Git(e) => write!(f, "{}", e),
      ShipError::Tool(e) => write!(f, "{}", e),
      ShipError::Validation(e) => write!(f, "{}", e),
      ShipError::Io(e) => write!(f, "I/O error: {}", e),
      ShipError::Fatal { message } => write!(f, "Fatal: {}", message),
      ShipError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
      ShipError::Context { context, source } => {
        write!(f, "{}\n{}", source, context)
      }
    }
  }
}

impl std::error::Error for ShipError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ShipError::Io(e) => Some(e),
      ShipError::Context { source, .. } => Some(source.as_ref()),
      _ => None,
    }
  }
}

impl From<io::Error> for ShipError {
  fn from(err: io::Error) -> Self {
    ShipError::Io(err)
  }
}

impl From<String> for ShipError {
  fn from(msg: String) -> Self {
    ShipError::message(msg)
  }
}

impl From<&str> for ShipError {
  fn from(msg: &str) -> Self {
    ShipError::message(msg)
  }
}

impl From<toml_edit::TomlError> for ShipError {
  fn from(err: toml_edit::TomlError) -> Self {
    ShipError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ShipError {
  fn from(err: toml_edit::de::Error) -> Self {
    ShipError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for ShipError {
  fn from(err: toml_edit::ser::Error) -> Self {
    ShipError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<serde_json::Error> for ShipError {
  fn from(err: serde_json::Error) -> Self {
    ShipError::message(format!("JSON error: {}", err))
  }
}

impl From<std::num::ParseIntError> for ShipError {
  fn from(err: std::num::ParseIntError) -> Self {
    ShipError::message(format!("Parse error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ShipError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ShipError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<std::env::VarError> for ShipError {
  fn from(err: std::env::VarError) -> Self {
    ShipError::message(format!("Environment variable error: {}", err))
  }
}

impl From<anyhow::Error> for ShipError {
  fn from(err: anyhow::Error) -> Self {
    ShipError::message(err.to_string())
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// ship.toml not found
  NotFound { root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// A declared dependency has no default entry in the version declaration.
  /// The entry must exist even if empty, to prevent silent staleness.
  MissingDependencyDefault { name: String },

  /// A property document could not be parsed (includes unknown source kinds)
  Parse { file: PathBuf, message: String },

  /// Required environment variable is unset
  MissingEnv { name: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => {
        Some("Create a ship.toml manifest in the repository root. See README for the format.".to_string())
      }
      ConfigError::MissingDependencyDefault { name } => Some(format!(
        "Add a [dependencies.{}] entry to the version declaration file (the value may be empty).",
        name
      )),
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { root } => {
        write!(f, "No shipway configuration found.\nExpected file: {}/ship.toml", root.display())
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::MissingDependencyDefault { name } => {
        write!(f, "Declared dependency '{}' has no default entry in the version declaration", name)
      }
      ConfigError::Parse { file, message } => {
        write!(f, "Failed to parse {}: {}", file.display(), message)
      }
      ConfigError::MissingEnv { name } => {
        write!(f, "Required environment variable '{}' is not set", name)
      }
    }
  }
}

/// Git operation errors
#[derive(Debug)]
pub enum GitError {
  /// Git command failed
  CommandFailed { command: String, stderr: String },

  /// Repository not found
  RepoNotFound { path: PathBuf },

  /// No release tag matched the release-line glob
  SeedTagMissing { glob: String },

  /// Push failed
  PushFailed { branch: String, reason: String },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::SeedTagMissing { glob } => Some(format!(
        "A seed tag matching '{}' must exist (create one at the repository's first commit).",
        glob
      )),
      GitError::RepoNotFound { path } => {
        Some(format!("Initialize the repository first or check the path: {}", path.display()))
      }
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote has commits you don't have. Pull first.".to_string())
        } else {
          None
        }
      }
      _ => None,
    }
  }
}

impl fmt::Display for GitError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GitError::CommandFailed { command, stderr } => {
        write!(f, "Git command failed: {}\n{}", command, stderr)
      }
      GitError::RepoNotFound { path } => {
        write!(f, "Git repository not found at: {}", path.display())
      }
      GitError::SeedTagMissing { glob } => {
        write!(f, "No release tag matches '{}'", glob)
      }
      GitError::PushFailed { branch, reason } => {
        write!(f, "Push of '{}' failed: {}", branch, reason)
      }
    }
  }
}

/// External tool invocation errors
///
/// Captured output is propagated verbatim so the caller sees exactly what
/// the tool reported.
#[derive(Debug)]
pub struct ToolError {
  pub program: String,
  pub exit_code: Option<i32>,
  pub output: String,
}

impl fmt::Display for ToolError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Tool '{}' failed (exit code {}):\n{}",
      self.program,
      self.exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()),
      self.output
    )
  }
}

/// Validation errors (phase preconditions and integrity checks)
#[derive(Debug)]
pub enum ValidationError {
  /// A phase was invoked on the wrong branch
  WrongBranch {
    phase: String,
    expected: String,
    actual: String,
  },

  /// Publishing refused: unreleased changes without a version bump
  PublishBlocked { reason: String },

  /// Development branch is behind the release branch
  BehindRelease { dev: String, release: String, commits: usize },

  /// Declared artifact glob matched no files
  ArtifactPatternUnmatched { pattern: String },

  /// A referenced import file is missing
  MissingImport { path: PathBuf },

  /// Overridden patch version does not start with the effective prefix
  PatchPrefixMismatch { patch: String, prefix: String },
}

impl ValidationError {
  fn help_message(&self) -> Option<String> {
    match self {
      ValidationError::WrongBranch { expected, .. } => {
        Some(format!("Check out '{}' and re-run the phase.", expected))
      }
      ValidationError::PublishBlocked { .. } => {
        Some("Run `shipway bump` first, or pass --force to override the gate.".to_string())
      }
      ValidationError::BehindRelease { release, .. } => Some(format!(
        "Merge '{}' into the development branch before bumping.",
        release
      )),
      ValidationError::MissingImport { .. } => {
        Some("Re-run `shipway prepare` to refresh the dependency overrides.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ValidationError::WrongBranch { phase, expected, actual } => {
        write!(f, "{} must run on branch '{}' (currently on '{}')", phase, expected, actual)
      }
      ValidationError::PublishBlocked { reason } => {
        write!(f, "Publishing refused: {}", reason)
      }
      ValidationError::BehindRelease { dev, release, commits } => {
        write!(
          f,
          "Branch '{}' is {} commit(s) behind '{}'; bumping would drop pending release changes",
          dev, commits, release
        )
      }
      ValidationError::ArtifactPatternUnmatched { pattern } => {
        write!(f, "Artifact pattern '{}' matched no files", pattern)
      }
      ValidationError::MissingImport { path } => {
        write!(f, "Referenced import file is missing: {}", path.display())
      }
      ValidationError::PatchPrefixMismatch { patch, prefix } => {
        write!(
          f,
          "Overridden patch version '{}' must start with '{}.'",
          patch, prefix
        )
      }
    }
  }
}

/// Result type alias for shipway
pub type ShipResult<T> = Result<T, ShipError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ShipResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ShipError>,
{
  fn context(self, ctx: impl Into<String>) -> ShipResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ShipResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ShipError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_exit_codes() {
    assert_eq!(ShipError::Config(ConfigError::MissingField { field: "x".into() }).exit_code(), ExitCode::User);
    assert_eq!(
      ShipError::Validation(ValidationError::PublishBlocked { reason: "x".into() }).exit_code(),
      ExitCode::Validation
    );
    assert_eq!(ShipError::fatal("boom").exit_code(), ExitCode::System);
    assert_eq!(ExitCode::Validation.as_i32(), 3);
  }

  #[test]
  fn test_context_chaining() {
    let err = ShipError::message("inner").context("outer");
    assert_eq!(err.to_string(), "inner\nouter");
  }

  #[test]
  fn test_fatal_classification() {
    assert!(ShipError::fatal("credential check failed").is_fatal());
    assert!(!ShipError::message("plain").is_fatal());
    assert!(ShipError::fatal("boom").context("while swapping").is_fatal());
  }

  #[test]
  fn test_context_survives_on_structured_errors() {
    let err = ShipError::Config(ConfigError::Parse {
      file: PathBuf::from(".ship/generated/gateway.props.toml"),
      message: "expected a table".into(),
    })
    .context("Publish requires a prepared checkout");

    let text = err.to_string();
    assert!(text.contains("gateway.props.toml"));
    assert!(text.contains("Publish requires a prepared checkout"));
    assert_eq!(err.exit_code(), ExitCode::User);
  }

  #[test]
  fn test_context_keeps_wrapped_classification() {
    let err = ShipError::Git(GitError::SeedTagMissing {
      glob: "release/3.*".into(),
    })
    .context("while computing history");

    assert_eq!(err.exit_code(), ExitCode::System);
    assert!(err.help_message().is_some());
  }
}
