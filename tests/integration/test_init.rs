//! Tests for the `init` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_init_creates_config() -> Result<()> {
  let project = TestProject::bare()?;

  run_celeste_release(&project.path, &["init"])?;

  assert!(project.file_exists("release.toml"));
  let config = project.read_file("release.toml")?;
  assert!(config.contains("[project]"));
  assert!(config.contains("[[stages]]"));
  assert!(config.contains("kind = \"distribution\""));

  // The generated config is immediately usable
  let output = run_celeste_release(&project.path, &["plan", "--json"])?;
  let json: serde_json::Value = serde_json::from_str(&stdout(&output))?;
  assert_eq!(json["stages"].as_array().map(Vec::len), Some(4));

  Ok(())
}

#[test]
fn test_init_refuses_to_overwrite() -> Result<()> {
  let project = TestProject::new()?;
  let before = project.read_file("release.toml")?;

  let output = celeste_release(&project.path, &["init"])?;
  assert!(!output.status.success());
  assert!(stderr(&output).contains("already exists"));
  assert_eq!(project.read_file("release.toml")?, before);

  Ok(())
}
