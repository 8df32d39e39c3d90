//! Tests for the `notes` command

use crate::helpers::*;
use anyhow::Result;

#[test]
fn test_notes_for_resolved_version() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["notes"])?;
  let out = stdout(&output);
  assert!(out.contains("- Crash when a remote was removed mid-sync"));
  assert!(!out.contains("Tray icon"));

  Ok(())
}

#[test]
fn test_notes_for_older_version() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["notes", "--version", "0.8.2"])?;
  let out = stdout(&output);
  assert!(out.contains("- Tray icon"));
  assert!(!out.contains("Crash"));

  Ok(())
}

#[test]
fn test_notes_missing_section() -> Result<()> {
  let project = TestProject::new()?;

  let output = celeste_release(&project.path, &["notes", "--version", "9.9.9"])?;
  assert!(!output.status.success());
  let err = stderr(&output);
  assert!(err.contains("No changelog entry for version 9.9.9"));
  assert!(err.contains("## [9.9.9]"));
  assert!(err.contains("Changelog has entries for: 0.8.3, 0.8.2"));

  Ok(())
}
