//! System git backend
//!
//! Uses the git binary for all operations:
//! - Isolated environment (only PATH, HOME and SSH agent variables pass through)
//! - Safe configuration overrides on every call
//! - Committer identity injected per command, never written to config

use crate::core::error::{GitError, ReleaseError, ReleaseResult, ResultExt};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Variables forwarded from the parent environment
const PASSTHROUGH_ENV: &[&str] = &["PATH", "HOME", "SSH_AUTH_SOCK", "GIT_SSH_COMMAND", "SSH_ASKPASS"];

/// Git backend using system git
pub struct SystemGit {
  /// Working tree root
  pub(crate) repo_path: PathBuf,

  /// Identity for commits and annotated tags
  pub(crate) identity: Option<(String, String)>,

  /// Extra environment (secrets exported by earlier steps)
  pub(crate) extra_env: Vec<(String, String)>,
}

impl SystemGit {
  /// Open a git repository
  pub fn open(path: &Path) -> ReleaseResult<Self> {
    let output = Command::new("git")
      .arg("-C")
      .arg(path)
      .args(["rev-parse", "--show-toplevel"])
      .output()
      .context("Failed to execute git rev-parse")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      if stderr.contains("not a git repository") {
        return Err(ReleaseError::Git(GitError::RepoNotFound {
          path: path.to_path_buf(),
        }));
      }
      return Err(ReleaseError::message(format!("Failed to open git repository: {}", stderr)));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);

    Ok(Self {
      repo_path: PathBuf::from(stdout.trim()),
      identity: None,
      extra_env: Vec::new(),
    })
  }

  /// Set the committer identity used for commits and tags
  pub fn with_identity(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
    self.identity = Some((name.into(), email.into()));
    self
  }

  /// Forward extra environment variables to every git call
  pub fn with_env(mut self, env: &[(String, String)]) -> Self {
    self.extra_env.extend(env.iter().cloned());
    self
  }

  /// Get HEAD commit SHA
  pub fn head_commit(&self) -> ReleaseResult<String> {
    let output = self.run(&["rev-parse", "HEAD"], "Failed to get HEAD commit")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Get current branch name
  pub fn current_branch(&self) -> ReleaseResult<String> {
    let output = self
      .git_cmd()
      .args(["rev-parse", "--abbrev-ref", "HEAD"])
      .output()
      .context("Failed to get current branch")?;

    if !output.status.success() {
      return Ok("HEAD".to_string()); // Detached HEAD
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Full message of the HEAD commit
  pub fn head_message(&self) -> ReleaseResult<String> {
    let output = self.run(&["log", "-1", "--format=%B", "HEAD"], "Failed to read HEAD commit message")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
  }

  /// Run git with the given arguments, failing on non-zero exit
  pub(crate) fn run(&self, args: &[&str], what: &str) -> ReleaseResult<Output> {
    let output = self.git_cmd().args(args).output().context(what.to_string())?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        stderr: stderr.to_string(),
      }));
    }

    Ok(output)
  }

  /// Create a safe git command with isolated environment
  ///
  /// - Sets working directory to repo path
  /// - Clears environment variables
  /// - Whitelists PATH, HOME and SSH agent variables
  /// - Adds safe configuration overrides
  pub(crate) fn git_cmd(&self) -> Command {
    let mut cmd = base_command();

    cmd.arg("-C").arg(&self.repo_path);

    if let Some((name, email)) = &self.identity {
      cmd.arg("-c").arg(format!("user.name={}", name));
      cmd.arg("-c").arg(format!("user.email={}", email));
    }

    for (key, value) in &self.extra_env {
      cmd.env(key, value);
    }

    cmd
  }
}

/// Git command with the isolated environment but no repository bound
pub(crate) fn base_command() -> Command {
  let mut cmd = Command::new("git");

  // Isolated environment (don't trust global config)
  cmd.env_clear();
  for key in PASSTHROUGH_ENV {
    if let Ok(value) = std::env::var(key) {
      cmd.env(key, value);
    }
  }

  // Force safe behavior (override user config)
  cmd.arg("-c").arg("protocol.version=2");
  cmd.arg("-c").arg("advice.detachedHead=false");
  cmd.arg("-c").arg("core.quotePath=false"); // Don't escape non-ASCII
  cmd.arg("-c").arg("commit.gpgSign=false");
  cmd.arg("-c").arg("tag.gpgSign=false");

  cmd
}
