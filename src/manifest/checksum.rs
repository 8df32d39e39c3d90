//! SHA-256 checksums for PKGBUILD sources

use super::pkgbuild::Pkgbuild;
use crate::core::error::{ReleaseResult, ResultExt};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Hash everything a reader yields
pub fn sha256_reader(mut reader: impl Read) -> ReleaseResult<String> {
  let mut hasher = Sha256::new();
  io::copy(&mut reader, &mut hasher)?;
  Ok(format!("{:x}", hasher.finalize()))
}

pub fn sha256_file(path: &Path) -> ReleaseResult<String> {
  let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
  sha256_reader(file)
}

/// Download a URL and hash the body
pub fn sha256_url(url: &str) -> ReleaseResult<String> {
  tracing::info!(url, "downloading source for checksum");
  let mut response = ureq::get(url).call().with_context(|| format!("Failed to download {}", url))?;
  sha256_reader(response.body_mut().as_reader())
}

/// Where a `source=()` entry comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceEntry {
  /// Remote file fetched over HTTP(S)
  Remote { url: String },
  /// File next to the PKGBUILD
  Local { path: String },
  /// VCS source, never checksummed
  Vcs { url: String },
}

impl SourceEntry {
  /// Classify an (already expanded) source entry, dropping a `name::` prefix
  pub fn parse(entry: &str) -> Self {
    let location = entry.split_once("::").map(|(_, loc)| loc).unwrap_or(entry);
    let scheme = location.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
      Some(s) if s.starts_with("git") || s.contains('+') || matches!(s, "svn" | "hg" | "bzr" | "fossil") => {
        SourceEntry::Vcs {
          url: location.to_string(),
        }
      }
      Some(_) => SourceEntry::Remote {
        url: location.to_string(),
      },
      None => SourceEntry::Local {
        path: location.to_string(),
      },
    }
  }
}

/// Compute `sha256sums` for every source of a manifest
///
/// `fetch` hashes a remote URL; it is a parameter so callers can supply a
/// cached or offline implementation.
pub fn compute_sha256sums<F>(pkg: &Pkgbuild, manifest_dir: &Path, mut fetch: F) -> ReleaseResult<Vec<String>>
where
  F: FnMut(&str) -> ReleaseResult<String>,
{
  pkg
    .array("source")
    .into_iter()
    .map(|raw| match SourceEntry::parse(&pkg.expand(raw)) {
      SourceEntry::Vcs { .. } => Ok("SKIP".to_string()),
      SourceEntry::Remote { url } => fetch(&url),
      SourceEntry::Local { path } => sha256_file(&manifest_dir.join(path)),
    })
    .collect()
}
