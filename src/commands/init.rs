//! `celeste-release init`

use crate::core::config::{DEFAULT_CONFIG, ReleaseConfig};
use crate::core::context::ProjectContext;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use std::fs;

/// Write a default `release.toml` into the project root
pub fn run_init(ctx: &ProjectContext) -> ReleaseResult<()> {
  println!("📦 Project root: {}", ctx.root.display());

  if let Some(existing) = ReleaseConfig::find_config_path(&ctx.root) {
    return Err(ReleaseError::with_help(
      format!("Configuration already exists at {}", existing.display()),
      "Edit the existing file or remove it before running init again",
    ));
  }

  let path = ctx.root.join("release.toml");
  fs::write(&path, DEFAULT_CONFIG).with_context(|| format!("Failed to write {}", path.display()))?;

  println!("✅ Created {}", path.display());
  println!("\nNext steps:");
  println!("  1. Point [project] at your PKGBUILD and changelog");
  println!("  2. Fill in the stage remotes and the [secrets] table");
  println!("  3. Preview with: celeste-release plan");
  Ok(())
}
