//! `celeste-release notes`

use crate::core::context::ProjectContext;
use crate::core::error::ReleaseResult;
use crate::release::ChangelogFile;
use semver::Version;

/// Print the changelog section of `version` (default: the resolved version)
pub fn run_notes(ctx: &ProjectContext, version: Option<String>) -> ReleaseResult<()> {
  let version = match version {
    Some(v) => Version::parse(v.trim_start_matches('v'))?,
    None => ctx.resolve_version()?,
  };

  let changelog = ChangelogFile::load(&ctx.changelog_path()?)?;
  match changelog.section(&version) {
    Ok(notes) => {
      println!("{}", notes);
      Ok(())
    }
    Err(err) => {
      let known: Vec<String> = changelog.versions().iter().map(|v| v.to_string()).collect();
      if !known.is_empty() {
        eprintln!("📋 Changelog has entries for: {}", known.join(", "));
      }
      Err(err)
    }
  }
}
