//! Tests for the `run` command in dry-run mode
//!
//! Nothing here publishes: without `--apply` every stage only prints its
//! steps.

use crate::helpers::*;
use anyhow::Result;

/// Project whose PKGBUILD matches the project version
fn released_project() -> Result<TestProject> {
  let project = TestProject::new()?;
  run_celeste_release(&project.path, &["manifest", "update", "--apply"])?;
  project.commit("Bump PKGBUILD to 0.8.3")?;
  Ok(project)
}

#[test]
fn test_run_dry_run_prints_every_stage() -> Result<()> {
  let project = released_project()?;

  let output = run_celeste_release(&project.path, &["run"])?;
  let out = stdout(&output);
  assert!(out.contains("Releasing Celeste v0.8.3 (dry-run)"));
  assert!(out.contains("gh release create v0.8.3 --title 'Celeste v0.8.3'"));
  assert!(out.contains("clone ssh://mpr@mpr.makedeb.org/celeste.git (master)"));
  assert!(out.contains("run snapcraft upload --release=stable celeste_0.8.3_amd64.snap"));
  assert!(out.contains("open a pull request against flathub/com.hunterwittenborn.Celeste"));
  assert!(out.contains("--apply"));

  // Stages run in dependency order
  let github = out.find("🚀 github-release").unwrap_or(usize::MAX);
  let mpr = out.find("🚀 mpr").unwrap_or(0);
  assert!(github < mpr);
  let snap = out.find("🚀 snap").unwrap_or(usize::MAX);
  let flathub = out.find("🚀 flathub").unwrap_or(0);
  assert!(snap < flathub);

  // Dry-run leaves the repository alone
  let tags = git(&project.path, &["tag", "--list"])?;
  assert!(String::from_utf8_lossy(&tags.stdout).trim().is_empty());

  Ok(())
}

#[test]
fn test_run_refuses_stale_manifest() -> Result<()> {
  let project = TestProject::new()?;

  let output = celeste_release(&project.path, &["run"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("PKGBUILD pkgver is 0.8.2 but the project version is 0.8.3"));
  assert!(!stdout(&output).contains("🚀"));

  Ok(())
}

#[test]
fn test_run_single_stage() -> Result<()> {
  let project = released_project()?;

  let output = run_celeste_release(&project.path, &["run", "--stage", "snap"])?;
  let out = stdout(&output);
  assert!(out.contains("🚀 snap (bundle)"));
  assert!(!out.contains("🚀 github-release"));
  assert!(!out.contains("🚀 flathub"));

  Ok(())
}

#[test]
fn test_run_unknown_stage() -> Result<()> {
  let project = released_project()?;

  let output = celeste_release(&project.path, &["run", "--stage", "aur"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("aur"));

  Ok(())
}

#[test]
fn test_run_honours_stage_opt_out() -> Result<()> {
  let project = released_project()?;
  project.write_file("README.md", "Celeste\n")?;
  project.commit("Snap store outage [skip snap]")?;

  let output = run_celeste_release(&project.path, &["run"])?;
  let out = stdout(&output);
  assert!(out.contains("⏭️  snap: skipped (commit message contains '[skip snap]')"));
  assert!(out.contains("⏭️  flathub: skipped (prerequisite 'snap' did not succeed)"));
  assert!(out.contains("🚀 mpr"));

  Ok(())
}

#[test]
fn test_run_skipped_off_default_branch() -> Result<()> {
  let project = released_project()?;
  git(&project.path, &["checkout", "-b", "wip"])?;

  let output = run_celeste_release(&project.path, &["run"])?;
  let out = stdout(&output);
  assert!(out.contains("Release pipeline skipped"));
  assert!(!out.contains("🚀"));

  Ok(())
}
