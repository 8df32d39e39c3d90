//! Tests for the `manifest` subcommands

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_update_is_dry_run_by_default() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["manifest", "update"])?;
  let out = stdout(&output);
  assert!(out.contains("pkgver: 0.8.2 → 0.8.3"));
  assert!(out.contains("pkgrel: 3 → 1"));
  assert!(out.contains("+pkgver=0.8.3"));
  assert!(out.contains("--apply"));

  assert_eq!(project.read_file("makedeb/PKGBUILD")?, PKGBUILD);

  Ok(())
}

#[test]
fn test_update_apply_writes_and_is_idempotent() -> Result<()> {
  let project = TestProject::new()?;

  run_celeste_release(&project.path, &["manifest", "update", "--apply"])?;
  let first = project.read_file("makedeb/PKGBUILD")?;
  assert!(first.contains("pkgver=0.8.3\n"));
  assert!(first.contains("pkgrel=1\n"));
  // Unrelated lines survive untouched
  assert!(first.contains("depends=('gtk4' 'libadwaita')"));
  assert!(first.contains("install -Dm755 celeste \"${pkgdir}/usr/bin/celeste\""));

  let output = run_celeste_release(&project.path, &["manifest", "update", "--apply"])?;
  assert!(stdout(&output).contains("already at 0.8.3"));
  assert_eq!(project.read_file("makedeb/PKGBUILD")?, first);

  Ok(())
}

#[test]
fn test_update_explicit_prerelease_version() -> Result<()> {
  let project = TestProject::new()?;

  run_celeste_release(
    &project.path,
    &["manifest", "update", "--version", "v0.9.0-beta.1", "--apply"],
  )?;
  assert!(project.read_file("makedeb/PKGBUILD")?.contains("pkgver=0.9.0_beta.1\n"));

  Ok(())
}

#[test]
fn test_check_reports_mismatch() -> Result<()> {
  let project = TestProject::new()?;

  let output = celeste_release(&project.path, &["manifest", "check"])?;
  assert_eq!(output.status.code(), Some(3));
  assert!(stderr(&output).contains("0.8.2"));

  run_celeste_release(&project.path, &["manifest", "update", "--apply"])?;
  let output = run_celeste_release(&project.path, &["manifest", "check"])?;
  assert!(stdout(&output).contains("matches 0.8.3"));

  Ok(())
}

#[test]
fn test_check_requires_config() -> Result<()> {
  let project = TestProject::bare()?;

  let output = celeste_release(&project.path, &["manifest", "check"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}

#[test]
fn test_srcinfo_is_stable() -> Result<()> {
  let project = TestProject::new()?;

  let first = stdout(&run_celeste_release(&project.path, &["manifest", "srcinfo"])?);
  let second = stdout(&run_celeste_release(&project.path, &["manifest", "srcinfo"])?);
  assert_eq!(first, second);

  assert!(first.starts_with("pkgbase = celeste\n"));
  assert!(first.contains("\tpkgver = 0.8.2\n"));
  assert!(first.contains("\tdepends = gtk4\n"));
  assert!(first.contains("\tsource = celeste-0.8.2.tar.gz\n"));
  assert!(first.ends_with("pkgname = celeste\n"));

  Ok(())
}

#[test]
fn test_srcinfo_write() -> Result<()> {
  let project = TestProject::new()?;

  run_celeste_release(&project.path, &["manifest", "srcinfo", "--write"])?;
  assert!(project.file_exists("makedeb/.SRCINFO"));
  assert!(project.read_file("makedeb/.SRCINFO")?.contains("\tpkgrel = 3\n"));

  Ok(())
}

#[test]
fn test_check_requires_package_function() -> Result<()> {
  let project = TestProject::new()?;
  project.write_file(
    "makedeb/PKGBUILD",
    "pkgname=celeste\npkgver=0.8.3\npkgrel=1\narch=('any')\n",
  )?;

  let output = celeste_release(&project.path, &["manifest", "check"])?;
  assert_eq!(output.status.code(), Some(1));
  assert!(stderr(&output).contains("package()"));

  Ok(())
}
