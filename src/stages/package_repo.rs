//! Publish PKGBUILD and `.SRCINFO` to a package repository (MPR-style SSH git host)

use super::ReleaseContext;
use crate::core::error::{ReleaseResult, ResultExt};
use crate::core::vcs::SystemGit;
use crate::manifest::{self, render_srcinfo};
use crate::utils::{is_local_path, is_ssh_remote};
use std::fs;

pub fn run(ctx: &ReleaseContext, remote: &str, branch: &str) -> ReleaseResult<()> {
  let pkg = manifest::load(&ctx.manifest_path)?;
  manifest::check_version(&pkg, &ctx.version)?;
  let srcinfo = render_srcinfo(&pkg)?;

  if !is_local_path(remote) && !is_ssh_remote(remote) {
    println!("   ⚠️  {} is not an SSH remote; package repositories usually only accept SSH pushes", remote);
  }

  let scratch = tempfile::TempDir::new()?;
  let dest = scratch.path().join("package");
  let env = ctx.env();
  let repo = ctx.identify(SystemGit::clone_into(remote, &dest, None, &env)?);

  if repo.remote_branch_exists("origin", branch)? {
    repo.checkout_branch(branch, Some(&format!("origin/{}", branch)))?;
  } else if repo.rev_parse("HEAD")?.is_some() {
    repo.checkout_branch(branch, None)?;
  } else {
    repo.set_unborn_branch(branch)?;
  }

  fs::write(dest.join("PKGBUILD"), pkg.text()).context("Failed to write PKGBUILD into the package repository")?;
  fs::write(dest.join(".SRCINFO"), srcinfo).context("Failed to write .SRCINFO into the package repository")?;

  repo.add_all()?;
  if !repo.has_staged_changes()? {
    println!("   ⏭️  Package repository already at {}, nothing to publish", ctx.version);
    return Ok(());
  }

  let sha = repo.commit(&format!("Bump version to {}", ctx.version))?;
  tracing::info!(%sha, remote, branch, "package repository commit");
  repo.push("origin", &format!("HEAD:refs/heads/{}", branch))?;

  println!("   ✅ Published {} to {}", ctx.version, remote);
  Ok(())
}

pub fn describe(ctx: &ReleaseContext, remote: &str, branch: &str) -> Vec<String> {
  vec![
    format!("check PKGBUILD pkgver matches {}", ctx.version),
    format!("clone {} ({})", remote, branch),
    "write PKGBUILD and a freshly rendered .SRCINFO".to_string(),
    format!("commit 'Bump version to {}' and push", ctx.version),
  ]
}
