//! Release stages
//!
//! - **github**: tag and hosted release (`gh release create`)
//! - **package_repo**: PKGBUILD and `.SRCINFO` pushed to an SSH git package repository
//! - **bundle**: sandboxed bundle build and upload (`snapcraft`)
//! - **distribution**: pull request against a distribution repository, merged
//!   once its build bot reports success
//!
//! Every stage receives the same [`ReleaseContext`] and talks to external
//! tools through a [`CommandRunner`]; git work goes through `SystemGit`.

pub mod bundle;
pub mod distribution;
pub mod github;
pub mod package_repo;

use crate::core::config::{ReleaseConfig, StageConfig, StageKind};
use crate::core::context::ProjectContext;
use crate::core::error::ReleaseResult;
use crate::core::exec::{CommandRunner, CommandSpec};
use crate::core::vcs::SystemGit;
use crate::pipeline::StageExecutor;
use crate::release::ReleaseRecord;
use crate::secrets::SecretSet;
use crate::utils::render_template;
use semver::Version;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a stage needs to know about the release
#[derive(Debug, Clone)]
pub struct ReleaseContext {
  pub root: PathBuf,
  pub config: Arc<ReleaseConfig>,
  pub version: Version,
  pub record: ReleaseRecord,
  /// Absolute path of the project's PKGBUILD
  pub manifest_path: PathBuf,
  /// Secrets exported by the secrets step
  pub secrets: SecretSet,
}

impl ReleaseContext {
  /// Resolve version and release record for the project
  pub fn build(project: &ProjectContext, secrets: SecretSet) -> ReleaseResult<Self> {
    let config = Arc::clone(project.require_config()?);
    let version = project.resolve_version()?;
    let record = ReleaseRecord::from_changelog(&project.root, &config.project, &config.release, &version)?;

    Ok(Self {
      root: project.root.clone(),
      manifest_path: project.root.join(&config.project.pkgbuild),
      config,
      version,
      record,
      secrets,
    })
  }

  /// Environment handed to every external command
  pub fn env(&self) -> Vec<(String, String)> {
    self.secrets.env_vars()
  }

  /// The project repository with the release identity and secrets applied
  pub fn project_git(&self) -> ReleaseResult<SystemGit> {
    Ok(self.identify(SystemGit::open(&self.root)?).with_env(&self.env()))
  }

  /// Apply the configured committer identity
  pub fn identify(&self, git: SystemGit) -> SystemGit {
    let settings = &self.config.release;
    git.with_identity(&settings.committer_name, &settings.committer_email)
  }

  /// Substitute `{name}`, `{version}`, `{tag}` and any extra placeholders
  pub fn render(&self, template: &str, extra: &[(&str, &str)]) -> String {
    let mut vars = vec![
      ("name", self.config.project.name.as_str()),
      ("version", self.record.version.as_str()),
      ("tag", self.record.tag.as_str()),
    ];
    vars.extend_from_slice(extra);
    render_template(template, &vars)
  }

  /// Command preloaded with the project directory and secret environment
  pub fn command(&self, program: &str) -> CommandSpec {
    CommandSpec::new(program).current_dir(&self.root).envs(&self.env())
  }
}

/// Executes stages for real
pub struct StageRunner<'a, R: CommandRunner> {
  ctx: &'a ReleaseContext,
  runner: &'a R,
  sleep: fn(Duration),
}

impl<'a, R: CommandRunner> StageRunner<'a, R> {
  pub fn new(ctx: &'a ReleaseContext, runner: &'a R) -> Self {
    Self {
      ctx,
      runner,
      sleep: std::thread::sleep,
    }
  }

  /// Replace the poll delay (tests use a no-op)
  pub fn with_sleep(mut self, sleep: fn(Duration)) -> Self {
    self.sleep = sleep;
    self
  }
}

impl<R: CommandRunner> StageExecutor for StageRunner<'_, R> {
  fn execute(&mut self, stage: &StageConfig) -> ReleaseResult<()> {
    match &stage.kind {
      StageKind::GithubRelease { repo, remote } => github::run(self.ctx, repo.as_deref(), remote, self.runner),
      StageKind::PackageRepository { remote, branch } => package_repo::run(self.ctx, remote, branch),
      StageKind::Bundle {
        build,
        publish,
        artifact,
      } => bundle::run(self.ctx, build, publish, artifact.as_deref(), self.runner),
      StageKind::Distribution(dist) => distribution::run(self.ctx, &stage.name, dist, self.runner, self.sleep),
    }
  }
}

/// Prints what each stage would do
pub struct DryRunExecutor<'a> {
  ctx: &'a ReleaseContext,
}

impl<'a> DryRunExecutor<'a> {
  pub fn new(ctx: &'a ReleaseContext) -> Self {
    Self { ctx }
  }
}

impl StageExecutor for DryRunExecutor<'_> {
  fn execute(&mut self, stage: &StageConfig) -> ReleaseResult<()> {
    for step in describe(self.ctx, stage) {
      println!("   • {}", step);
    }
    Ok(())
  }
}

/// Human-readable steps of a stage
pub fn describe(ctx: &ReleaseContext, stage: &StageConfig) -> Vec<String> {
  match &stage.kind {
    StageKind::GithubRelease { repo, remote } => github::describe(ctx, repo.as_deref(), remote),
    StageKind::PackageRepository { remote, branch } => package_repo::describe(ctx, remote, branch),
    StageKind::Bundle {
      build,
      publish,
      artifact,
    } => bundle::describe(ctx, build, publish, artifact.as_deref()),
    StageKind::Distribution(dist) => distribution::describe(ctx, dist),
  }
}
