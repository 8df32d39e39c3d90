//! `celeste-release version`

use crate::core::context::ProjectContext;
use crate::core::error::ReleaseResult;
use crate::manifest::pkgver_for;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct VersionReport {
  version: String,
  pkgver: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  tag: Option<String>,
}

/// Print the resolved project version
pub fn run_version(ctx: &ProjectContext, json: bool) -> ReleaseResult<()> {
  let version = ctx.resolve_version()?;
  let report = VersionReport {
    version: version.to_string(),
    pkgver: pkgver_for(&version),
    tag: ctx
      .config
      .as_ref()
      .map(|config| format!("{}{}", config.release.tag_prefix, version)),
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
  } else {
    println!("{}", report.version);
  }
  Ok(())
}
