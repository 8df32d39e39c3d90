//! Version resolution from project build metadata
//!
//! The project's `Cargo.toml` is the single source of truth for the release
//! version. Two strategies are supported: reading the manifest directly
//! (fast, no toolchain needed) or asking `cargo metadata`.

use crate::core::config::{ProjectConfig, VersionSourceKind};
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use semver::Version;
use std::fs;
use std::path::{Path, PathBuf};
use toml_edit::DocumentMut;

/// Where to read the version from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
  /// `[package].version` of a Cargo.toml
  Manifest { path: PathBuf },
  /// `cargo metadata --no-deps`, optionally selecting a package by name
  Metadata { manifest_path: PathBuf, package: Option<String> },
}

impl VersionSource {
  /// Build the source described by the project configuration
  pub fn from_config(root: &Path, project: &ProjectConfig) -> Self {
    let path = root.join(&project.cargo_toml);
    match project.version_source {
      VersionSourceKind::Manifest => VersionSource::Manifest { path },
      VersionSourceKind::Metadata => VersionSource::Metadata {
        manifest_path: path,
        package: project.package.clone(),
      },
    }
  }

  /// Resolve the project version
  pub fn resolve(&self) -> ReleaseResult<Version> {
    let version = match self {
      VersionSource::Manifest { path } => read_manifest_version(path)?,
      VersionSource::Metadata { manifest_path, package } => read_metadata_version(manifest_path, package.as_deref())?,
    };
    tracing::debug!(%version, source = ?self, "resolved project version");
    Ok(version)
  }
}

/// Read `[package].version`, following `version.workspace = true`
pub fn read_manifest_version(path: &Path) -> ReleaseResult<Version> {
  let doc = load_document(path)?;

  let package = doc
    .get("package")
    .and_then(|p| p.as_table_like())
    .ok_or_else(|| ReleaseError::message(format!("No [package] section in {}", path.display())))?;

  let version_item = package
    .get("version")
    .ok_or_else(|| ReleaseError::message(format!("No package version in {}", path.display())))?;

  if let Some(version) = version_item.as_str() {
    return parse_version(version, path);
  }

  let inherits = version_item
    .as_table_like()
    .and_then(|t| t.get("workspace"))
    .and_then(|w| w.as_bool())
    .unwrap_or(false);

  if !inherits {
    return Err(ReleaseError::message(format!(
      "Package version in {} is neither a string nor `workspace = true`",
      path.display()
    )));
  }

  let (workspace_path, workspace_doc) = find_workspace_root(path)?;
  let version = workspace_doc
    .get("workspace")
    .and_then(|w| w.get("package"))
    .and_then(|p| p.get("version"))
    .and_then(|v| v.as_str())
    .ok_or_else(|| {
      ReleaseError::with_help(
        format!("{} inherits its version but the workspace declares none", path.display()),
        format!("Add `version = \"...\"` under [workspace.package] in {}", workspace_path.display()),
      )
    })?;

  parse_version(version, &workspace_path)
}

fn read_metadata_version(manifest_path: &Path, package: Option<&str>) -> ReleaseResult<Version> {
  let metadata = cargo_metadata::MetadataCommand::new()
    .manifest_path(manifest_path)
    .no_deps()
    .exec()?;

  let found = match package {
    Some(name) => metadata
      .workspace_packages()
      .into_iter()
      .find(|p| p.name.as_str() == name)
      .ok_or_else(|| ReleaseError::message(format!("Package '{}' not found in cargo metadata", name)))?,
    None => metadata.root_package().ok_or_else(|| {
      ReleaseError::with_help(
        "Workspace has no root package",
        "Set `package = \"<name>\"` under [project] in release.toml",
      )
    })?,
  };

  Ok(found.version.clone())
}

fn load_document(path: &Path) -> ReleaseResult<DocumentMut> {
  let content = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
  content
    .parse::<DocumentMut>()
    .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Walk up from a member manifest to the Cargo.toml declaring `[workspace]`
fn find_workspace_root(member: &Path) -> ReleaseResult<(PathBuf, DocumentMut)> {
  let start = member.parent().unwrap_or(Path::new("."));
  for dir in start.ancestors() {
    let candidate = dir.join("Cargo.toml");
    if !candidate.exists() {
      continue;
    }
    let doc = load_document(&candidate)?;
    if doc.get("workspace").is_some() {
      return Ok((candidate, doc));
    }
  }

  Err(ReleaseError::message(format!(
    "No workspace root found above {}",
    member.display()
  )))
}

fn parse_version(raw: &str, origin: &Path) -> ReleaseResult<Version> {
  Version::parse(raw.trim()).with_context(|| format!("Version '{}' in {} is not valid semver", raw, origin.display()))
}
