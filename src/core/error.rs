//! Error types for celeste-release with contextual messages and exit codes
//!
//! Every failure is surfaced to the operator: the pipeline never retries, so
//! errors carry enough context (command line, stderr, stage name) to act on
//! them by hand.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Exit codes for celeste-release
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
  /// User error (config, invalid args, missing files)
  User = 1,
  /// System error (git, external tools, network, I/O)
  System = 2,
  /// Validation failure (manifest drift, failed stages)
  Validation = 3,
}

impl ExitCode {
  /// Convert to i32 for process exit
  pub fn as_i32(self) -> i32 {
    self as i32
  }
}

/// Main error type for celeste-release
#[derive(Debug)]
pub enum ReleaseError {
  /// Configuration errors
  Config(ConfigError),

  /// Git operation errors
  Git(GitError),

  /// Packaging manifest errors
  Manifest(ManifestError),

  /// External command and stage errors
  Stage(StageError),

  /// I/O errors
  Io(io::Error),

  /// Generic error with message and optional context
  Message {
    message: String,
    context: Option<String>,
    help: Option<String>,
  },
}

impl ReleaseError {
  /// Create a simple error message
  pub fn message(msg: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: None,
    }
  }

  /// Create an error with help text
  pub fn with_help(msg: impl Into<String>, help: impl Into<String>) -> Self {
    ReleaseError::Message {
      message: msg.into(),
      context: None,
      help: Some(help.into()),
    }
  }

  /// Add context to an existing error
  pub fn context(self, ctx: impl Into<String>) -> Self {
    let ctx_str = ctx.into();
    match self {
      ReleaseError::Message { message, context, help } => ReleaseError::Message {
        message,
        context: Some(context.map(|c| format!("{}\n{}", ctx_str, c)).unwrap_or(ctx_str)),
        help,
      },
      ReleaseError::Io(err) => ReleaseError::Message {
        message: ctx_str,
        context: Some(format!("I/O error: {}", err)),
        help: None,
      },
      _ => self,
    }
  }

  /// Get the appropriate exit code for this error
  pub fn exit_code(&self) -> ExitCode {
    match self {
      ReleaseError::Config(_) => ExitCode::User,
      ReleaseError::Git(_) => ExitCode::System,
      ReleaseError::Manifest(ManifestError::VersionMismatch { .. }) => ExitCode::Validation,
      ReleaseError::Manifest(_) => ExitCode::User,
      ReleaseError::Stage(StageError::Failed { .. }) => ExitCode::Validation,
      ReleaseError::Stage(_) => ExitCode::System,
      ReleaseError::Io(_) => ExitCode::System,
      ReleaseError::Message { .. } => ExitCode::User,
    }
  }

  /// Get contextual help message for this error
  pub fn help_message(&self) -> Option<String> {
    match self {
      ReleaseError::Config(e) => e.help_message(),
      ReleaseError::Git(e) => e.help_message(),
      ReleaseError::Manifest(e) => e.help_message(),
      ReleaseError::Stage(e) => e.help_message(),
      ReleaseError::Message { help, .. } => help.clone(),
      _ => None,
    }
  }
}

impl fmt::Display for ReleaseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ReleaseError::Config(e) => write!(f, "{}", e),
      ReleaseError::Git(e) => write!(f, "{}", e),
      ReleaseError::Manifest(e) => write!(f, "{}", e),
      ReleaseError::Stage(e) => write!(f, "{}", e),
      ReleaseError::Io(e) => write!(f, "I/O error: {}", e),
      ReleaseError::Message { message, context, .. } => {
        write!(f, "{}", message)?;
        if let Some(ctx) = context {
          write!(f, "\n{}", ctx)?;
        }
        Ok(())
      }
    }
  }
}

impl std::error::Error for ReleaseError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      ReleaseError::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for ReleaseError {
  fn from(err: io::Error) -> Self {
    ReleaseError::Io(err)
  }
}

impl From<String> for ReleaseError {
  fn from(msg: String) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<&str> for ReleaseError {
  fn from(msg: &str) -> Self {
    ReleaseError::message(msg)
  }
}

impl From<toml_edit::TomlError> for ReleaseError {
  fn from(err: toml_edit::TomlError) -> Self {
    ReleaseError::message(format!("TOML parse error: {}", err))
  }
}

impl From<toml_edit::de::Error> for ReleaseError {
  fn from(err: toml_edit::de::Error) -> Self {
    ReleaseError::message(format!("TOML deserialization error: {}", err))
  }
}

impl From<toml_edit::ser::Error> for ReleaseError {
  fn from(err: toml_edit::ser::Error) -> Self {
    ReleaseError::message(format!("TOML serialization error: {}", err))
  }
}

impl From<cargo_metadata::Error> for ReleaseError {
  fn from(err: cargo_metadata::Error) -> Self {
    ReleaseError::message(format!("Cargo metadata error: {}", err))
  }
}

impl From<semver::Error> for ReleaseError {
  fn from(err: semver::Error) -> Self {
    ReleaseError::message(format!("Invalid semantic version: {}", err))
  }
}

impl From<serde_json::Error> for ReleaseError {
  fn from(err: serde_json::Error) -> Self {
    ReleaseError::message(format!("JSON error: {}", err))
  }
}

impl From<ureq::Error> for ReleaseError {
  fn from(err: ureq::Error) -> Self {
    ReleaseError::message(format!("HTTP error: {}", err))
  }
}

impl From<regex::Error> for ReleaseError {
  fn from(err: regex::Error) -> Self {
    ReleaseError::message(format!("Regex error: {}", err))
  }
}

impl From<std::string::FromUtf8Error> for ReleaseError {
  fn from(err: std::string::FromUtf8Error) -> Self {
    ReleaseError::message(format!("UTF-8 conversion error: {}", err))
  }
}

impl From<std::env::VarError> for ReleaseError {
  fn from(err: std::env::VarError) -> Self {
    ReleaseError::message(format!("Environment variable error: {}", err))
  }
}

/// Configuration-related errors
#[derive(Debug)]
pub enum ConfigError {
  /// release.toml not found
  NotFound { workspace_root: PathBuf },

  /// Missing required field
  MissingField { field: String },

  /// Stage not found in configuration
  StageNotFound { name: String },

  /// Stage graph is malformed (duplicate names, unknown needs, cycles)
  InvalidGraph { reason: String },
}

impl ConfigError {
  fn help_message(&self) -> Option<String> {
    match self {
      ConfigError::NotFound { .. } => Some("Run `celeste-release init` to create a configuration file.".to_string()),
      ConfigError::StageNotFound { name } => Some(format!(
        "Configured stages can be listed with `celeste-release plan`. Is '{}' spelled correctly?",
        name
      )),
      ConfigError::InvalidGraph { .. } => {
        Some("Check the `needs` entries of every [[stages]] table in release.toml.".to_string())
      }
      _ => None,
    }
  }
}

impl fmt::Display for ConfigError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigError::NotFound { workspace_root } => {
        write!(
          f,
          "No celeste-release configuration found.\nExpected file: {}/release.toml",
          workspace_root.display()
        )
      }
      ConfigError::MissingField { field } => {
        write!(f, "Missing required field in config: {}", field)
      }
      ConfigError::StageNotFound { name } => {
        write!(f, "Stage '{}' not found in configuration", name)
      }
      ConfigError::InvalidGraph { reason } => {
        write!(f, "Invalid stage graph: {}", reason)
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

  /// Push failed
  PushFailed {
    remote: String,
    refspec: String,
    reason: String,
  },
}

impl GitError {
  fn help_message(&self) -> Option<String> {
    match self {
      GitError::PushFailed { reason, .. } => {
        if reason.contains("non-fast-forward") {
          Some("The remote has commits you don't have. Investigate the remote before re-running.".to_string())
        } else if reason.contains("Permission denied") || reason.contains("permission denied") || reason.contains("403")
        {
          Some("Check the SSH key or token exported by the secrets step.".to_string())
        } else {
          None
        }
      }
      GitError::RepoNotFound { path } => Some(format!(
        "Run celeste-release from inside the project checkout: {}",
        path.display()
      )),
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
      GitError::PushFailed {
        remote,
        refspec,
        reason,
      } => {
        write!(f, "Push of {} to {} failed: {}", refspec, remote, reason)
      }
    }
  }
}

/// Packaging manifest errors
#[derive(Debug)]
pub enum ManifestError {
  /// Manifest could not be parsed
  Parse { line: usize, reason: String },

  /// Required field is absent
  MissingField { field: String },

  /// Manifest version differs from the resolved project version
  VersionMismatch { manifest: String, project: String },
}

impl ManifestError {
  fn help_message(&self) -> Option<String> {
    match self {
      ManifestError::VersionMismatch { .. } => {
        Some("Run `celeste-release manifest update --apply` and commit the result.".to_string())
      }
      ManifestError::MissingField { field } => Some(format!("Add a `{}=` line to the PKGBUILD.", field)),
      _ => None,
    }
  }
}

impl fmt::Display for ManifestError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ManifestError::Parse { line, reason } => write!(f, "PKGBUILD parse error on line {}: {}", line, reason),
      ManifestError::MissingField { field } => write!(f, "PKGBUILD is missing the '{}' field", field),
      ManifestError::VersionMismatch { manifest, project } => write!(
        f,
        "PKGBUILD pkgver is {} but the project version is {}",
        manifest, project
      ),
    }
  }
}

/// External command and pipeline stage errors
#[derive(Debug)]
pub enum StageError {
  /// An external tool exited unsuccessfully
  CommandFailed {
    command: String,
    status: Option<i32>,
    stderr: String,
  },

  /// An external tool could not be started
  Spawn { program: String, reason: String },

  /// A stage reported failure
  Failed { stage: String, reason: String },

  /// The distribution bot never reported a result
  Timeout { stage: String, waited_secs: u64 },
}

impl StageError {
  fn help_message(&self) -> Option<String> {
    match self {
      StageError::Spawn { program, .. } => Some(format!("Make sure `{}` is installed and on PATH.", program)),
      StageError::Failed { .. } => {
        Some("The job failed and needs manual investigation. Nothing is retried automatically.".to_string())
      }
      StageError::Timeout { .. } => Some(
        "The build bot did not answer in time. Check the pull request and merge it by hand if the build passed."
          .to_string(),
      ),
      _ => None,
    }
  }
}

impl fmt::Display for StageError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StageError::CommandFailed {
        command,
        status,
        stderr,
      } => {
        match status {
          Some(code) => write!(f, "Command failed with exit code {}: {}", code, command)?,
          None => write!(f, "Command terminated by signal: {}", command)?,
        }
        if !stderr.trim().is_empty() {
          write!(f, "\n{}", stderr.trim_end())?;
        }
        Ok(())
      }
      StageError::Spawn { program, reason } => write!(f, "Failed to run {}: {}", program, reason),
      StageError::Failed { stage, reason } => write!(f, "Stage '{}' failed: {}", stage, reason),
      StageError::Timeout { stage, waited_secs } => {
        write!(f, "Stage '{}' timed out after {}s", stage, waited_secs)
      }
    }
  }
}

/// Result type alias for celeste-release
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Helper trait to add context to Results
pub trait ResultExt<T> {
  /// Add context to an error result
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T>;

  /// Add context using a closure (lazy evaluation)
  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
  E: Into<ReleaseError>,
{
  fn context(self, ctx: impl Into<String>) -> ReleaseResult<T> {
    self.map_err(|e| e.into().context(ctx))
  }

  fn with_context<F>(self, f: F) -> ReleaseResult<T>
  where
    F: FnOnce() -> String,
  {
    self.map_err(|e| e.into().context(f()))
  }
}

/// Pretty-print an error to stderr with help text
pub fn print_error(error: &ReleaseError) {
  eprintln!("\n❌ {}\n", error);

  if let Some(help) = error.help_message() {
    eprintln!("💡 Help: {}\n", help);
  }
}

impl From<anyhow::Error> for ReleaseError {
  fn from(err: anyhow::Error) -> Self {
    ReleaseError::message(err.to_string())
  }
}
