//! `celeste-release manifest` subcommands

use crate::core::context::ProjectContext;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::manifest::{self, checksum, render_srcinfo};
use semver::Version;
use std::fs;
use std::path::Path;

type Fetch = fn(&str) -> ReleaseResult<String>;

/// Rewrite the PKGBUILD to the resolved (or given) version
pub fn run_manifest_update(ctx: &ProjectContext, version: Option<String>, apply: bool) -> ReleaseResult<()> {
  let config = ctx.require_config()?;
  let path = ctx.pkgbuild_path()?;
  let version = match version {
    Some(v) => Version::parse(v.trim_start_matches('v'))?,
    None => ctx.resolve_version()?,
  };

  let fetch = config.release.update_checksums.then_some(checksum::sha256_url as Fetch);
  let update = manifest::plan_update(&path, &version, fetch)?;

  if !update.changed() {
    println!("✅ {} is already at {}", display(ctx, &path), update.version);
    return Ok(());
  }

  println!("📝 {}", display(ctx, &path));
  println!("   pkgver: {} → {}", update.previous_version, update.version);
  if update.previous_pkgrel != update.pkgrel {
    println!(
      "   pkgrel: {} → {}",
      update.previous_pkgrel.as_deref().unwrap_or("(none)"),
      update.pkgrel.as_deref().unwrap_or("(none)")
    );
  }
  if update.checksums_updated {
    println!("   sha256sums refreshed");
  }
  println!();
  for line in update.diff_lines() {
    println!("  {}", line);
  }

  if apply {
    update.write()?;
    println!("\n✅ Updated {}", display(ctx, &path));
  } else {
    println!("\n💡 Dry-run: re-run with --apply to write the manifest");
  }
  Ok(())
}

/// Fail when the PKGBUILD version differs from the project version
pub fn run_manifest_check(ctx: &ProjectContext) -> ReleaseResult<()> {
  let path = ctx.pkgbuild_path()?;
  let version = ctx.resolve_version()?;
  let pkg = manifest::load(&path)?;
  manifest::check_version(&pkg, &version)?;
  if pkg.function("package").is_none() {
    return Err(ReleaseError::with_help(
      format!("{} defines no package() function", display(ctx, &path)),
      "Package repositories build with makepkg, which needs package()",
    ));
  }

  println!("✅ {} pkgver matches {}", display(ctx, &path), version);
  Ok(())
}

/// Render `.SRCINFO`, printing it or writing it next to the PKGBUILD
pub fn run_manifest_srcinfo(ctx: &ProjectContext, write: bool) -> ReleaseResult<()> {
  let path = ctx.pkgbuild_path()?;
  let srcinfo = render_srcinfo(&manifest::load(&path)?)?;

  if !write {
    print!("{}", srcinfo);
    return Ok(());
  }

  let target = path.parent().unwrap_or(Path::new(".")).join(".SRCINFO");
  fs::write(&target, srcinfo).with_context(|| format!("Failed to write {}", target.display()))?;
  println!("✅ Wrote {}", display(ctx, &target));
  Ok(())
}

fn display(ctx: &ProjectContext, path: &Path) -> String {
  path.strip_prefix(&ctx.root).unwrap_or(path).display().to_string()
}
