//! Tag and hosted release
//!
//! The release tag is created at most once per version: an existing local
//! tag is reused and an existing remote tag is never pushed again. Whether
//! the hosted release is created depends only on `gh release view`, so a
//! rerun after a failed `gh release create` finishes the release.

use super::ReleaseContext;
use crate::core::error::ReleaseResult;
use crate::core::exec::{CommandRunner, CommandSpec};
use crate::core::vcs::SystemGit;
use std::io::Write;

pub fn run<R: CommandRunner>(ctx: &ReleaseContext, repo: Option<&str>, remote: &str, runner: &R) -> ReleaseResult<()> {
  let git = ctx.project_git()?;
  let tag = &ctx.record.tag;

  ensure_tag(ctx, &git, remote)?;

  let view = runner.run(&with_repo(ctx.command("gh").args(["release", "view", tag.as_str()]), repo))?;
  if view.success() {
    println!("   ⏭️  Release {} already exists, nothing to do", tag);
    tracing::info!(%tag, "hosted release already exists");
    return Ok(());
  }

  let mut notes = tempfile::NamedTempFile::new()?;
  notes.write_all(ctx.record.notes.as_bytes())?;
  notes.flush()?;

  let create = with_repo(
    ctx
      .command("gh")
      .args(["release", "create", tag.as_str(), "--verify-tag", "--title"])
      .arg(&ctx.record.title)
      .arg("--notes-file")
      .arg(notes.path().to_string_lossy()),
    repo,
  );
  let output = runner.run_checked(&create)?;

  println!("   ✅ Created release {} {}", tag, output.stdout.trim());
  Ok(())
}

pub fn describe(ctx: &ReleaseContext, repo: Option<&str>, remote: &str) -> Vec<String> {
  let tag = &ctx.record.tag;
  let mut steps = vec![
    format!("create annotated tag {} unless it exists locally", tag),
    format!("push {} to '{}' unless it is already there", tag, remote),
    format!("gh release create {} --title '{}' unless the release exists", tag, ctx.record.title),
  ];
  if let Some(repo) = repo {
    steps.push(format!("on {}", repo));
  }
  steps
}

/// Make sure the tag exists on the remote, creating it locally at most once
fn ensure_tag(ctx: &ReleaseContext, git: &SystemGit, remote: &str) -> ReleaseResult<()> {
  let tag = &ctx.record.tag;
  if git.remote_tag_exists(remote, tag)? {
    println!("   ⏭️  {} is already on '{}'", tag, remote);
    return Ok(());
  }
  if git.tag_exists(tag)? {
    println!("   🏷️  Reusing local tag {}", tag);
  } else {
    println!("   🏷️  Tagging {}", tag);
    git.create_annotated_tag(tag, &ctx.record.title)?;
  }
  git.push(remote, &format!("refs/tags/{}", tag))
}

fn with_repo(cmd: CommandSpec, repo: Option<&str>) -> CommandSpec {
  match repo {
    Some(repo) => cmd.args(["--repo", repo]),
    None => cmd,
  }
}
