//! Tests for the `version` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_version_prints_resolved_version() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["version"])?;
  assert_eq!(stdout(&output).trim(), "0.8.3");

  Ok(())
}

#[test]
fn test_version_json_includes_tag() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["version", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(json["version"], "0.8.3");
  assert_eq!(json["pkgver"], "0.8.3");
  assert_eq!(json["tag"], "v0.8.3");

  Ok(())
}

#[test]
fn test_version_without_config() -> Result<()> {
  let project = TestProject::bare()?;

  let output = run_celeste_release(&project.path, &["version", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(json["version"], "0.8.3");
  assert!(json.get("tag").is_none());

  Ok(())
}

#[test]
fn test_version_inherited_from_workspace() -> Result<()> {
  let project = TestProject::bare()?;
  project.write_file(
    "Cargo.toml",
    r#"[workspace]
members = ["."]

[workspace.package]
version = "1.0.0-rc.2"

[package]
name = "celeste"
version.workspace = true
edition = "2021"
"#,
  )?;

  let output = run_celeste_release(&project.path, &["version", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(json["version"], "1.0.0-rc.2");
  assert_eq!(json["pkgver"], "1.0.0_rc.2");

  Ok(())
}

#[test]
fn test_version_rejects_non_semver() -> Result<()> {
  let project = TestProject::bare()?;
  project.write_file("Cargo.toml", "[package]\nname = \"celeste\"\nversion = \"one\"\n")?;

  let output = celeste_release(&project.path, &["version"])?;
  assert!(!output.status.success());

  Ok(())
}
