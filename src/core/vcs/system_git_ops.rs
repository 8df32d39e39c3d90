//! Additional operations for SystemGit (tags, staging, clones, pushes)

use super::system_git::{SystemGit, base_command};
use crate::core::error::{GitError, ReleaseError, ReleaseResult, ResultExt};
use std::path::Path;

impl SystemGit {
  /// Clone a repository into `dest` and open it
  pub fn clone_into(url: &str, dest: &Path, branch: Option<&str>, env: &[(String, String)]) -> ReleaseResult<Self> {
    println!("   Cloning {}...", url);

    let mut cmd = base_command();
    for (key, value) in env {
      cmd.env(key, value);
    }
    cmd.args(["clone", "--quiet"]);
    if let Some(branch) = branch {
      cmd.args(["--branch", branch]);
    }
    cmd.arg(url).arg(dest);

    let output = cmd.output().context("Failed to run git clone")?;
    if !output.status.success() {
      return Err(ReleaseError::Git(GitError::CommandFailed {
        command: format!("git clone {}", url),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      }));
    }

    Ok(SystemGit::open(dest)?.with_env(env))
  }

  /// List tags, optionally filtered by a glob pattern
  pub fn list_tags(&self, pattern: Option<&str>) -> ReleaseResult<Vec<String>> {
    let mut args = vec!["tag", "--list"];
    if let Some(pattern) = pattern {
      args.push(pattern);
    }
    let output = self.run(&args, "Failed to list tags")?;

    Ok(
      String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect(),
    )
  }

  /// Check if a tag exists locally
  pub fn tag_exists(&self, tag: &str) -> ReleaseResult<bool> {
    Ok(self.list_tags(Some(tag))?.iter().any(|t| t == tag))
  }

  /// Check if a tag exists on a remote
  pub fn remote_tag_exists(&self, remote: &str, tag: &str) -> ReleaseResult<bool> {
    let refname = format!("refs/tags/{}", tag);
    let output = self.run(&["ls-remote", "--tags", remote, &refname], "Failed to query remote tags")?;
    Ok(!String::from_utf8_lossy(&output.stdout).trim().is_empty())
  }

  /// Create an annotated tag at HEAD
  pub fn create_annotated_tag(&self, tag: &str, message: &str) -> ReleaseResult<()> {
    self.run(&["tag", "-a", tag, "-m", message], "Failed to create tag")?;
    Ok(())
  }

  /// Create and checkout a branch
  pub fn create_and_checkout_branch(&self, branch_name: &str) -> ReleaseResult<()> {
    self.run(&["checkout", "-b", branch_name], "Failed to create branch")?;
    Ok(())
  }

  /// Create or reset `branch` and check it out, optionally from `start`
  pub fn checkout_branch(&self, branch: &str, start: Option<&str>) -> ReleaseResult<()> {
    let mut args = vec!["checkout", "--quiet", "-B", branch];
    if let Some(start) = start {
      args.push(start);
    }
    self.run(&args, "Failed to check out branch")?;
    Ok(())
  }

  /// Point an unborn HEAD (fresh clone of an empty repository) at `branch`
  pub fn set_unborn_branch(&self, branch: &str) -> ReleaseResult<()> {
    let refname = format!("refs/heads/{}", branch);
    self.run(&["symbolic-ref", "HEAD", &refname], "Failed to set initial branch")?;
    Ok(())
  }

  /// True when a remote-tracking branch exists after clone/fetch
  pub fn remote_branch_exists(&self, remote: &str, branch: &str) -> ReleaseResult<bool> {
    Ok(self.rev_parse(&format!("refs/remotes/{}/{}", remote, branch))?.is_some())
  }

  /// Resolve a revision to a commit SHA, None when it does not exist
  pub fn rev_parse(&self, rev: &str) -> ReleaseResult<Option<String>> {
    let target = format!("{}^{{commit}}", rev);
    let output = self
      .git_cmd()
      .args(["rev-parse", "--verify", "--quiet", &target])
      .output()
      .context("Failed to run git rev-parse")?;

    if !output.status.success() {
      return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
  }

  /// Stage all changes in the working tree
  pub fn add_all(&self) -> ReleaseResult<()> {
    self.run(&["add", "--all"], "Failed to stage changes")?;
    Ok(())
  }

  /// True when the index differs from HEAD
  pub fn has_staged_changes(&self) -> ReleaseResult<bool> {
    let output = self
      .git_cmd()
      .args(["diff", "--cached", "--quiet"])
      .output()
      .context("Failed to inspect staged changes")?;

    match output.status.code() {
      Some(0) => Ok(false),
      Some(1) => Ok(true),
      _ => Err(ReleaseError::Git(GitError::CommandFailed {
        command: "git diff --cached --quiet".to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
      })),
    }
  }

  /// Commit staged changes
  pub fn commit(&self, message: &str) -> ReleaseResult<String> {
    self.run(&["commit", "--quiet", "-m", message], "Failed to commit")?;
    self.head_commit()
  }

  /// Push a refspec to a remote
  pub fn push(&self, remote: &str, refspec: &str) -> ReleaseResult<()> {
    self.push_with(&[], remote, refspec)
  }

  /// Push a refspec, replacing the remote ref only while it still matches
  /// our remote-tracking ref for it
  pub fn force_push_with_lease(&self, remote: &str, refspec: &str) -> ReleaseResult<()> {
    self.push_with(&["--force-with-lease"], remote, refspec)
  }

  fn push_with(&self, flags: &[&str], remote: &str, refspec: &str) -> ReleaseResult<()> {
    println!("   Pushing {} to '{}'...", refspec, remote);

    let output = self
      .git_cmd()
      .arg("push")
      .args(flags)
      .args([remote, refspec])
      .output()
      .context("Failed to push")?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(ReleaseError::Git(GitError::PushFailed {
        remote: remote.to_string(),
        refspec: refspec.to_string(),
        reason: stderr.to_string(),
      }));
    }

    println!("   ✅ Pushed {}", refspec);
    Ok(())
  }
}
