//! Project context - build once, pass everywhere
//!
//! ```text
//! main.rs:
//!   ProjectContext::build() -> &ProjectContext
//!   |
//!   v
//! commands/run.rs, manifest.rs, etc:
//!   fn run_*(ctx: &ProjectContext, ...)
//! ```

use crate::core::config::ReleaseConfig;
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult};
use crate::release::version::VersionSource;
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared project-level state.
///
/// The configuration is optional because `init` (and `version` without a
/// config) run before `release.toml` exists.
#[derive(Clone)]
pub struct ProjectContext {
  /// Project root directory (absolute path)
  pub root: PathBuf,

  /// Release configuration (release.toml)
  pub config: Option<Arc<ReleaseConfig>>,
}

impl ProjectContext {
  /// Build the context from a root directory.
  ///
  /// A missing config is not an error here; a config that exists but fails
  /// to parse is.
  pub fn build(root: &Path) -> ReleaseResult<Self> {
    let root = root.to_path_buf();
    let config = if ReleaseConfig::exists(&root) {
      Some(Arc::new(ReleaseConfig::load(&root)?))
    } else {
      None
    };

    Ok(Self { root, config })
  }

  /// Get config or error if not found
  pub fn require_config(&self) -> ReleaseResult<&Arc<ReleaseConfig>> {
    self.config.as_ref().ok_or_else(|| {
      ReleaseError::Config(ConfigError::NotFound {
        workspace_root: self.root.clone(),
      })
    })
  }

  /// Resolve the project version.
  ///
  /// Without a config, `Cargo.toml` at the root is read directly.
  pub fn resolve_version(&self) -> ReleaseResult<Version> {
    let source = match &self.config {
      Some(config) => VersionSource::from_config(&self.root, &config.project),
      None => VersionSource::Manifest {
        path: self.root.join("Cargo.toml"),
      },
    };
    source.resolve()
  }

  /// Absolute path of the configured PKGBUILD
  pub fn pkgbuild_path(&self) -> ReleaseResult<PathBuf> {
    Ok(self.root.join(&self.require_config()?.project.pkgbuild))
  }

  /// Absolute path of the configured changelog
  pub fn changelog_path(&self) -> ReleaseResult<PathBuf> {
    Ok(self.root.join(&self.require_config()?.project.changelog))
  }
}
