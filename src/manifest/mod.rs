//! Packaging manifest (PKGBUILD) handling
//!
//! - **pkgbuild**: parser and lossless field rewriting
//! - **srcinfo**: `.SRCINFO` generation for package repositories
//! - **checksum**: source checksums
//!
//! The manifest's `pkgver` must always match the project version before
//! anything is published; [`check_version`] enforces that.

pub mod checksum;
pub mod pkgbuild;
pub mod srcinfo;

pub use pkgbuild::{Pkgbuild, VersionChange, pkgver_for};
pub use srcinfo::render_srcinfo;

use crate::core::error::{ManifestError, ReleaseError, ReleaseResult, ResultExt};
use semver::Version;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of planning a manifest update
#[derive(Debug, Clone, Serialize)]
pub struct ManifestUpdate {
  pub path: PathBuf,
  pub previous_version: String,
  pub version: String,
  pub previous_pkgrel: Option<String>,
  pub pkgrel: Option<String>,
  pub checksums_updated: bool,
  #[serde(skip)]
  pub new_text: String,
  #[serde(skip)]
  old_text: String,
}

impl ManifestUpdate {
  /// True when the file would change
  pub fn changed(&self) -> bool {
    self.new_text != self.old_text
  }

  /// Removed and added lines, `-`/`+` prefixed, in file order
  pub fn diff_lines(&self) -> Vec<String> {
    let old: Vec<&str> = self.old_text.lines().collect();
    let new: Vec<&str> = self.new_text.lines().collect();
    let mut out: Vec<String> = old
      .iter()
      .filter(|line| !new.contains(line))
      .map(|line| format!("-{}", line))
      .collect();
    out.extend(new.iter().filter(|line| !old.contains(line)).map(|line| format!("+{}", line)));
    out
  }

  /// Write the new manifest to disk (no-op when unchanged)
  pub fn write(&self) -> ReleaseResult<()> {
    if !self.changed() {
      return Ok(());
    }
    fs::write(&self.path, &self.new_text).with_context(|| format!("Failed to write {}", self.path.display()))?;
    tracing::info!(path = %self.path.display(), version = %self.version, "manifest updated");
    Ok(())
  }
}

/// Load and parse a manifest
pub fn load(path: &Path) -> ReleaseResult<Pkgbuild> {
  let text = fs::read_to_string(path).with_context(|| format!("Failed to read manifest {}", path.display()))?;
  Pkgbuild::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Plan rewriting `path` to `version`, optionally refreshing checksums
pub fn plan_update<F>(path: &Path, version: &Version, checksums: Option<F>) -> ReleaseResult<ManifestUpdate>
where
  F: FnMut(&str) -> ReleaseResult<String>,
{
  let mut pkg = load(path)?;
  let old_text = pkg.text().to_string();
  let previous_version = pkg.require("pkgver")?.to_string();
  let previous_pkgrel = pkg.pkgrel().map(String::from);

  pkg.set_version(version)?;

  let mut checksums_updated = false;
  if let Some(fetch) = checksums {
    let dir = path.parent().unwrap_or(Path::new("."));
    let sums = checksum::compute_sha256sums(&pkg, dir, fetch)?;
    let current: Vec<String> = pkg.array("sha256sums").into_iter().map(String::from).collect();
    if !sums.is_empty() && sums != current {
      pkg.set_checksums(&sums)?;
      checksums_updated = true;
    }
  }

  Ok(ManifestUpdate {
    path: path.to_path_buf(),
    previous_version,
    version: pkgver_for(version),
    previous_pkgrel,
    pkgrel: pkg.pkgrel().map(String::from),
    checksums_updated,
    new_text: pkg.text().to_string(),
    old_text,
  })
}

/// Fail unless the manifest's `pkgver` matches `version`
pub fn check_version(pkg: &Pkgbuild, version: &Version) -> ReleaseResult<()> {
  let manifest = pkg.require("pkgver")?;
  let project = pkgver_for(version);
  if manifest != project {
    return Err(ReleaseError::Manifest(ManifestError::VersionMismatch {
      manifest: manifest.to_string(),
      project,
    }));
  }
  Ok(())
}
