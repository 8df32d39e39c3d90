//! What triggered the pipeline: branch, tag flag and commit message
//!
//! On GitHub Actions the ref comes from `GITHUB_REF` (or
//! `GITHUB_REF_NAME` + `GITHUB_REF_TYPE`); locally it is the checked-out
//! branch. The commit message is always read from HEAD.

use crate::core::error::ReleaseResult;
use crate::core::vcs::SystemGit;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
  Ci,
  Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Trigger {
  /// Branch that was pushed (None for tag pushes and detached HEADs)
  pub branch: Option<String>,
  pub is_tag: bool,
  /// Full message of the triggering commit
  pub message: String,
  pub source: TriggerSource,
}

impl Trigger {
  /// Detect the trigger from the process environment and the repository
  pub fn detect(git: &SystemGit) -> ReleaseResult<Self> {
    Self::from_env(|key| std::env::var(key).ok().filter(|v| !v.is_empty()), git)
  }

  /// Detect the trigger with an explicit environment lookup
  pub fn from_env<F>(env: F, git: &SystemGit) -> ReleaseResult<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let message = git.head_message()?;

    if let Some((branch, is_tag)) = ci_ref(&env) {
      tracing::debug!(?branch, is_tag, "trigger from CI environment");
      return Ok(Self {
        branch,
        is_tag,
        message,
        source: TriggerSource::Ci,
      });
    }

    let branch = git.current_branch()?;
    Ok(Self {
      branch: (branch != "HEAD").then_some(branch),
      is_tag: false,
      message,
      source: TriggerSource::Local,
    })
  }

  /// Reason the whole pipeline must not run, if any
  pub fn blocked_reason(&self, default_branch: &str, skip_marker: &str) -> Option<String> {
    if self.is_tag {
      return Some("triggered by a tag push".to_string());
    }
    match &self.branch {
      None => return Some("not on a branch".to_string()),
      Some(branch) if branch != default_branch => {
        return Some(format!("branch '{}' is not the default branch '{}'", branch, default_branch));
      }
      Some(_) => {}
    }
    if self.opts_out(skip_marker) {
      return Some(format!("commit message contains '{}'", skip_marker));
    }
    None
  }

  /// True when the commit message carries `marker`
  pub fn opts_out(&self, marker: &str) -> bool {
    !marker.is_empty() && self.message.contains(marker)
  }
}

/// Branch and tag flag from GitHub Actions variables
fn ci_ref<F>(env: &F) -> Option<(Option<String>, bool)>
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(full) = env("GITHUB_REF") {
    if let Some(tag) = full.strip_prefix("refs/tags/") {
      tracing::debug!(tag, "tag push");
      return Some((None, true));
    }
    if let Some(branch) = full.strip_prefix("refs/heads/") {
      return Some((Some(branch.to_string()), false));
    }
    // Pull requests and other refs never release
    return Some((None, false));
  }

  let name = env("GITHUB_REF_NAME")?;
  match env("GITHUB_REF_TYPE").as_deref() {
    Some("tag") => Some((None, true)),
    _ => Some((Some(name), false)),
  }
}
