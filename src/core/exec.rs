//! External command execution
//!
//! Every stage of the release pipeline is a sequence of external tool
//! invocations (`gh`, `snapcraft`, `cargo`). They all go through a
//! [`CommandRunner`] so that failures are reported uniformly and stages can be
//! exercised in tests without the real tools installed.
//!
//! Semantics match a shell script under strict mode: the first non-zero exit
//! aborts the stage, nothing is retried.

use crate::core::error::{ReleaseError, ReleaseResult, StageError};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A fully described external command
#[derive(Clone, Default)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Extra environment variables (may contain secrets, never printed)
  pub env: Vec<(String, String)>,
  pub stdin: Option<String>,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      ..Default::default()
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
    self.cwd = Some(dir.as_ref().to_path_buf());
    self
  }

  pub fn envs(mut self, vars: &[(String, String)]) -> Self {
    self.env.extend(vars.iter().cloned());
    self
  }

  pub fn stdin(mut self, input: impl Into<String>) -> Self {
    self.stdin = Some(input.into());
    self
  }

  /// Command line for display (program and arguments only)
  pub fn display(&self) -> String {
    let mut line = self.program.clone();
    for arg in &self.args {
      line.push(' ');
      if arg.is_empty() || arg.contains(char::is_whitespace) {
        line.push('\'');
        line.push_str(&arg.replace('\'', "'\\''"));
        line.push('\'');
      } else {
        line.push_str(arg);
      }
    }
    line
  }
}

impl fmt::Debug for CommandSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let env_keys: Vec<&str> = self.env.iter().map(|(k, _)| k.as_str()).collect();
    f.debug_struct("CommandSpec")
      .field("command", &self.display())
      .field("cwd", &self.cwd)
      .field("env", &env_keys)
      .finish()
  }
}

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
  /// Exit code (None when killed by a signal)
  pub status: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.status == Some(0)
  }
}

/// Runs external commands
pub trait CommandRunner {
  /// Run a command and capture its output, whatever the exit status
  fn run(&self, cmd: &CommandSpec) -> ReleaseResult<CommandOutput>;

  /// Run a command and fail on a non-zero exit status
  fn run_checked(&self, cmd: &CommandSpec) -> ReleaseResult<CommandOutput> {
    let output = self.run(cmd)?;
    if !output.success() {
      return Err(ReleaseError::Stage(StageError::CommandFailed {
        command: cmd.display(),
        status: output.status,
        stderr: output.stderr,
      }));
    }
    Ok(output)
  }
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn run(&self, request: &CommandSpec) -> ReleaseResult<CommandOutput> {
    tracing::debug!(command = %request.display(), cwd = ?request.cwd, "running external command");

    let mut cmd = Command::new(&request.program);
    cmd.args(&request.args);
    if let Some(cwd) = &request.cwd {
      cmd.current_dir(cwd);
    }
    for (key, value) in &request.env {
      cmd.env(key, value);
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
    cmd.stdin(if request.stdin.is_some() { Stdio::piped() } else { Stdio::null() });

    let mut child = cmd.spawn().map_err(|e| {
      ReleaseError::Stage(StageError::Spawn {
        program: request.program.clone(),
        reason: e.to_string(),
      })
    })?;

    if let Some(input) = &request.stdin
      && let Some(mut handle) = child.stdin.take()
    {
      handle.write_all(input.as_bytes())?;
    }

    let output = child.wait_with_output()?;
    let result = CommandOutput {
      status: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!(
      program = %request.program,
      status = ?result.status,
      stdout_bytes = result.stdout.len(),
      stderr_bytes = result.stderr.len(),
      "external command finished"
    );

    Ok(result)
  }
}
