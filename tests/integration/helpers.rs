//! Test helpers for integration tests

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const PKGBUILD: &str = r#"# Maintainer: Test User <test@example.com>
pkgname=celeste
pkgver=0.8.2
pkgrel=3
pkgdesc="Sync your cloud files"
arch=('any')
depends=('gtk4' 'libadwaita')
source=("celeste-${pkgver}.tar.gz")
sha256sums=('SKIP')

package() {
    install -Dm755 celeste "${pkgdir}/usr/bin/celeste"
}
"#;

pub const CHANGELOG: &str = r#"# Changelog

## [0.8.3] - 2024-05-02
### Fixed
- Crash when a remote was removed mid-sync

## [0.8.2] - 2024-04-11
### Added
- Tray icon
"#;

pub const CONFIG: &str = r#"[project]
name = "Celeste"
pkgbuild = "makedeb/PKGBUILD"

[[stages]]
name = "github-release"
kind = "github-release"
skip_marker = "[skip gh]"

[[stages]]
name = "mpr"
kind = "package-repository"
needs = ["github-release"]
skip_marker = "[skip mpr]"
remote = "ssh://mpr@mpr.makedeb.org/celeste.git"

[[stages]]
name = "snap"
kind = "bundle"
needs = ["github-release"]
skip_marker = "[skip snap]"
build = ["snapcraft"]
publish = ["snapcraft", "upload", "--release=stable", "{artifact}"]
artifact = "celeste_{version}_amd64.snap"

[[stages]]
name = "flathub"
kind = "distribution"
needs = ["snap"]
skip_marker = "[skip flathub]"
repository = "git@github.com:flathub/com.hunterwittenborn.Celeste.git"
upstream = "flathub/com.hunterwittenborn.Celeste"
manifest = "com.hunterwittenborn.Celeste.yml"
source_url = "https://github.com/hwittenborn/celeste"
"#;

/// A Celeste checkout with git history, a PKGBUILD and a changelog
pub struct TestProject {
  _root: TempDir,
  pub path: PathBuf,
}

impl TestProject {
  /// Project at 0.8.3 whose PKGBUILD still says 0.8.2, with release.toml
  pub fn new() -> Result<Self> {
    let project = Self::bare()?;
    project.write_file("release.toml", CONFIG)?;
    project.commit("Add release configuration")?;
    Ok(project)
  }

  /// Project without release.toml
  pub fn bare() -> Result<Self> {
    let root = TempDir::new()?;
    let path = root.path().to_path_buf();

    git(&path, &["init", "--initial-branch=main"])?;
    git(&path, &["config", "user.name", "Test User"])?;
    git(&path, &["config", "user.email", "test@example.com"])?;

    let project = Self { _root: root, path };
    project.write_file(
      "Cargo.toml",
      "[package]\nname = \"celeste\"\nversion = \"0.8.3\"\nedition = \"2021\"\n",
    )?;
    project.write_file("makedeb/PKGBUILD", PKGBUILD)?;
    project.write_file("CHANGELOG.md", CHANGELOG)?;
    project.commit("Initial import")?;

    Ok(project)
  }

  /// Commit current changes
  pub fn commit(&self, message: &str) -> Result<String> {
    git(&self.path, &["add", "."])?;
    git(&self.path, &["commit", "-m", message])?;

    let output = git(&self.path, &["rev-parse", "HEAD"])?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
  }

  /// Write a file, creating parent directories
  pub fn write_file(&self, path: &str, content: &str) -> Result<()> {
    let file_path = self.path.join(path);
    if let Some(parent) = file_path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
  }

  /// Check if a file exists
  pub fn file_exists(&self, path: &str) -> bool {
    self.path.join(path).exists()
  }

  /// Read a file
  pub fn read_file(&self, path: &str) -> Result<String> {
    Ok(std::fs::read_to_string(self.path.join(path))?)
  }
}

/// Run git command in a directory
pub fn git(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = Command::new("git")
    .current_dir(cwd)
    .args(args)
    .output()
    .context("Failed to run git command")?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow::bail!("Git command failed: git {}\n{}", args.join(" "), stderr);
  }

  Ok(output)
}

/// Run celeste-release, returning its output whatever the exit status
pub fn celeste_release(cwd: &Path, args: &[&str]) -> Result<Output> {
  let bin = env!("CARGO_BIN_EXE_celeste-release");

  // The trigger would otherwise come from the CI job running these tests
  Command::new(bin)
    .current_dir(cwd)
    .args(args)
    .env_remove("GITHUB_REF")
    .env_remove("GITHUB_REF_NAME")
    .env_remove("GITHUB_REF_TYPE")
    .env_remove("CELESTE_RELEASE_STAGE")
    .env_remove("RUST_LOG")
    .output()
    .context("Failed to run celeste-release")
}

/// Run celeste-release CLI command, failing on a non-zero exit
pub fn run_celeste_release(cwd: &Path, args: &[&str]) -> Result<Output> {
  let output = celeste_release(cwd, args)?;

  if !output.status.success() {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow::bail!(
      "celeste-release command failed: celeste-release {}\nstdout: {}\nstderr: {}",
      args.join(" "),
      stdout,
      stderr
    );
  }

  Ok(output)
}

pub fn stdout(output: &Output) -> String {
  String::from_utf8_lossy(&output.stdout).to_string()
}

pub fn stderr(output: &Output) -> String {
  String::from_utf8_lossy(&output.stderr).to_string()
}
