use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, ResultExt};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for celeste-release
/// Searched in order: release.toml, .release.toml, .config/release.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
  pub project: ProjectConfig,
  #[serde(default)]
  pub release: ReleaseSettings,
  #[serde(default)]
  pub secrets: Option<SecretsConfig>,
  #[serde(default)]
  pub stages: Vec<StageConfig>,
}

/// Where the project lives and where its packaging files are
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
  /// Display name used in release titles
  pub name: String,

  /// Cargo.toml holding the version (relative to the config directory)
  #[serde(default = "default_cargo_toml")]
  pub cargo_toml: PathBuf,

  /// How to resolve the version
  #[serde(default)]
  pub version_source: VersionSourceKind,

  /// Package to pick from `cargo metadata` (default: root package)
  #[serde(default)]
  pub package: Option<String>,

  /// Packaging manifest (PKGBUILD)
  #[serde(default = "default_pkgbuild")]
  pub pkgbuild: PathBuf,

  /// Changelog the release notes are taken from
  #[serde(default = "default_changelog")]
  pub changelog: PathBuf,

  /// Only pushes to this branch trigger a release
  #[serde(default = "default_branch")]
  pub default_branch: String,
}

fn default_cargo_toml() -> PathBuf {
  PathBuf::from("Cargo.toml")
}

fn default_pkgbuild() -> PathBuf {
  PathBuf::from("PKGBUILD")
}

fn default_changelog() -> PathBuf {
  PathBuf::from("CHANGELOG.md")
}

fn default_branch() -> String {
  "main".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VersionSourceKind {
  /// Read `[package].version` straight from Cargo.toml
  #[default]
  Manifest,
  /// Ask `cargo metadata`
  Metadata,
}

/// Release record and commit settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSettings {
  /// Prefix for release tags (default: "v")
  #[serde(default = "default_tag_prefix")]
  pub tag_prefix: String,

  /// Release title template; `{name}`, `{version}` and `{tag}` are substituted
  #[serde(default = "default_title")]
  pub title: String,

  /// Commit-message marker that skips the whole pipeline
  #[serde(default = "default_skip_marker")]
  pub skip_marker: String,

  /// Recompute `sha256sums` when updating the PKGBUILD
  #[serde(default)]
  pub update_checksums: bool,

  /// Identity used for commits made by the pipeline
  #[serde(default = "default_committer_name")]
  pub committer_name: String,

  #[serde(default = "default_committer_email")]
  pub committer_email: String,
}

fn default_tag_prefix() -> String {
  "v".to_string()
}

fn default_title() -> String {
  "{name} {tag}".to_string()
}

fn default_skip_marker() -> String {
  "[skip release]".to_string()
}

fn default_committer_name() -> String {
  "Celeste Release Bot".to_string()
}

fn default_committer_email() -> String {
  "release-bot@localhost".to_string()
}

impl Default for ReleaseSettings {
  fn default() -> Self {
    Self {
      tag_prefix: default_tag_prefix(),
      title: default_title(),
      skip_marker: default_skip_marker(),
      update_checksums: false,
      committer_name: default_committer_name(),
      committer_email: default_committer_email(),
    }
  }
}

/// Vault connection used to fetch CI secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
  /// Vault server address, e.g. `https://vault.example.com`
  pub address: String,

  /// Role to authenticate as
  pub role: String,

  /// JWT auth mount (default: "jwt")
  #[serde(default = "default_auth_mount")]
  pub auth_mount: String,

  /// Environment variable holding the JWT (default: VAULT_JWT)
  #[serde(default = "default_jwt_env")]
  pub jwt_env: String,

  /// Audience requested when minting a GitHub Actions OIDC token
  #[serde(default)]
  pub audience: Option<String>,

  #[serde(default)]
  pub values: Vec<SecretRef>,
}

fn default_auth_mount() -> String {
  "jwt".to_string()
}

fn default_jwt_env() -> String {
  "VAULT_JWT".to_string()
}

/// A single secret mapped into an environment variable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretRef {
  /// API path of the secret, e.g. `kv/data/ci/github`
  pub path: String,
  /// Field within the secret
  pub key: String,
  /// Environment variable exposed to later stages
  pub env: String,
}

/// One job of the release pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
  /// Unique stage name
  pub name: String,

  /// Stages that must succeed before this one runs
  #[serde(default)]
  pub needs: Vec<String>,

  /// Commit-message marker that skips this stage
  #[serde(default)]
  pub skip_marker: Option<String>,

  #[serde(flatten)]
  pub kind: StageKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StageKind {
  /// Create the tag and hosted release
  GithubRelease {
    /// `owner/name` of the release host repository (default: gh's own detection)
    #[serde(default)]
    repo: Option<String>,
    /// Remote the tag is pushed to
    #[serde(default = "default_remote")]
    remote: String,
  },

  /// Push PKGBUILD and .SRCINFO to an SSH git package repository
  PackageRepository {
    remote: String,
    #[serde(default = "default_package_branch")]
    branch: String,
  },

  /// Build and publish a sandboxed bundle
  Bundle {
    build: Vec<String>,
    publish: Vec<String>,
    /// Artifact produced by `build`, handed to `publish` as `{artifact}`
    #[serde(default)]
    artifact: Option<String>,
  },

  /// Open and merge a pull request against a distribution repository
  Distribution(DistributionConfig),
}

fn default_remote() -> String {
  "origin".to_string()
}

fn default_package_branch() -> String {
  "master".to_string()
}

impl StageKind {
  pub fn label(&self) -> &'static str {
    match self {
      StageKind::GithubRelease { .. } => "github-release",
      StageKind::PackageRepository { .. } => "package-repository",
      StageKind::Bundle { .. } => "bundle",
      StageKind::Distribution(_) => "distribution",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionConfig {
  /// Git URL the release branch is pushed to (usually a fork)
  pub repository: String,

  /// `owner/name` the pull request is opened against
  pub upstream: String,

  /// Base branch of the pull request
  #[serde(default = "default_package_branch")]
  pub base: String,

  /// Head ref for `gh pr create --head` when pushing to a fork, e.g. `me:{branch}`
  #[serde(default)]
  pub head_owner: Option<String>,

  /// Manifest inside the distribution repository
  pub manifest: PathBuf,

  /// URL identifying the application's source entry in the manifest
  pub source_url: String,

  /// Branch name template
  #[serde(default = "default_distribution_branch")]
  pub branch: String,

  /// Comment posted after opening the PR to start the bot
  #[serde(default)]
  pub trigger_comment: Option<String>,

  /// Only comments by this login are considered
  #[serde(default)]
  pub bot: Option<String>,

  /// Whole word, case-insensitive, in a bot comment
  #[serde(default = "default_success_keyword")]
  pub success_keyword: String,

  #[serde(default = "default_failure_keyword")]
  pub failure_keyword: String,

  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,

  #[serde(default = "default_max_polls")]
  pub max_polls: u32,

  #[serde(default = "default_true")]
  pub auto_merge: bool,
}

fn default_distribution_branch() -> String {
  "release-{version}".to_string()
}

fn default_success_keyword() -> String {
  "successful".to_string()
}

fn default_failure_keyword() -> String {
  "failed".to_string()
}

fn default_poll_interval() -> u64 {
  60
}

fn default_max_polls() -> u32 {
  120
}

fn default_true() -> bool {
  true
}

impl ReleaseConfig {
  /// Find config file in search order: release.toml, .release.toml, .config/release.toml
  pub fn find_config_path(path: &Path) -> Option<PathBuf> {
    let candidates = [
      path.join("release.toml"),
      path.join(".release.toml"),
      path.join(".config").join("release.toml"),
    ];

    candidates.into_iter().find(|p| p.exists())
  }

  /// Load config (searches multiple locations)
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let config_path = Self::find_config_path(path).ok_or_else(|| {
      ReleaseError::Config(ConfigError::NotFound {
        workspace_root: path.to_path_buf(),
      })
    })?;

    let content = fs::read_to_string(&config_path)
      .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
    let config = Self::parse(&content).with_context(|| format!("Invalid config in {}", config_path.display()))?;

    tracing::debug!(path = %config_path.display(), stages = config.stages.len(), "loaded configuration");
    Ok(config)
  }

  /// Parse and validate config text
  pub fn parse(content: &str) -> ReleaseResult<Self> {
    let config: ReleaseConfig = toml_edit::de::from_str(content)?;
    config.validate()?;
    Ok(config)
  }

  /// Check if config exists at the given path
  pub fn exists(path: &Path) -> bool {
    Self::find_config_path(path).is_some()
  }

  /// Find a stage by name
  pub fn stage(&self, name: &str) -> ReleaseResult<&StageConfig> {
    self
      .stages
      .iter()
      .find(|s| s.name == name)
      .ok_or_else(|| ReleaseError::Config(ConfigError::StageNotFound { name: name.to_string() }))
  }

  fn validate(&self) -> ReleaseResult<()> {
    if self.project.name.trim().is_empty() {
      return Err(ReleaseError::Config(ConfigError::MissingField {
        field: "project.name".to_string(),
      }));
    }

    for stage in &self.stages {
      if stage.name.trim().is_empty() {
        return Err(ReleaseError::Config(ConfigError::MissingField {
          field: "stages.name".to_string(),
        }));
      }
      match &stage.kind {
        StageKind::Bundle { build, publish, .. } => {
          if build.is_empty() || publish.is_empty() {
            return Err(ReleaseError::with_help(
              format!("Bundle stage '{}' needs both a build and a publish command", stage.name),
              "Set `build = [...]` and `publish = [...]` as argument lists",
            ));
          }
        }
        StageKind::Distribution(dist) => {
          if dist.max_polls == 0 {
            return Err(ReleaseError::message(format!(
              "Distribution stage '{}' must allow at least one poll",
              stage.name
            )));
          }
          if dist.success_keyword.is_empty() || dist.failure_keyword.is_empty() {
            return Err(ReleaseError::message(format!(
              "Distribution stage '{}' has an empty status keyword",
              stage.name
            )));
          }
        }
        StageKind::PackageRepository { remote, .. } if remote.is_empty() => {
          return Err(ReleaseError::Config(ConfigError::MissingField {
            field: format!("remote for stage '{}'", stage.name),
          }));
        }
        _ => {}
      }
    }

    Ok(())
  }
}

/// Default configuration written by `celeste-release init`
pub const DEFAULT_CONFIG: &str = r#"[project]
name = "Celeste"
cargo_toml = "Cargo.toml"
version_source = "manifest"
pkgbuild = "makedeb/PKGBUILD"
changelog = "CHANGELOG.md"
default_branch = "main"

[release]
tag_prefix = "v"
title = "{name} {tag}"
skip_marker = "[skip release]"

# [secrets]
# address = "https://vault.example.com"
# role = "celeste"
# values = [
#   { path = "kv/data/ci/github", key = "token", env = "GH_TOKEN" },
#   { path = "kv/data/ci/snapcraft", key = "credentials", env = "SNAPCRAFT_STORE_CREDENTIALS" },
# ]

[[stages]]
name = "github-release"
kind = "github-release"
skip_marker = "[skip gh]"

[[stages]]
name = "mpr"
kind = "package-repository"
needs = ["github-release"]
skip_marker = "[skip mpr]"
remote = "ssh://mpr@mpr.makedeb.org/celeste.git"

[[stages]]
name = "snap"
kind = "bundle"
needs = ["github-release"]
skip_marker = "[skip snap]"
build = ["snapcraft"]
publish = ["snapcraft", "upload", "--release=stable", "{artifact}"]
artifact = "celeste_{version}_amd64.snap"

[[stages]]
name = "flathub"
kind = "distribution"
needs = ["snap"]
skip_marker = "[skip flathub]"
repository = "git@github.com:flathub/com.hunterwittenborn.Celeste.git"
upstream = "flathub/com.hunterwittenborn.Celeste"
manifest = "com.hunterwittenborn.Celeste.yml"
source_url = "https://github.com/hwittenborn/celeste"
trigger_comment = "bot, build"
bot = "flathubbot"
"#;
