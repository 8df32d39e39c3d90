//! `celeste-release run`
//!
//! Dry-run by default: every scheduled stage prints its steps. With
//! `--apply` secrets are fetched from Vault and stages run for real.

use crate::core::context::ProjectContext;
use crate::core::error::ReleaseResult;
use crate::core::exec::SystemRunner;
use crate::core::vcs::SystemGit;
use crate::manifest;
use crate::pipeline::{Pipeline, PipelineReport, StageOutcome, Trigger};
use crate::secrets::SecretSet;
use crate::stages::{DryRunExecutor, ReleaseContext, StageRunner};

/// Execute the release pipeline for the current trigger
pub fn run_pipeline(ctx: &ProjectContext, apply: bool, stage: Option<String>) -> ReleaseResult<()> {
  let config = ctx.require_config()?;
  let trigger = Trigger::detect(&SystemGit::open(&ctx.root)?)?;
  let mut pipeline = Pipeline::new(config, trigger)?;
  if let Some(name) = &stage {
    pipeline = pipeline.only(name)?;
  }

  if let Some(reason) = pipeline.blocked_reason() {
    println!("⏭️  Release pipeline skipped: {}", reason);
    return Ok(());
  }

  // Nothing is published while the PKGBUILD lags behind the project version
  let version = ctx.resolve_version()?;
  manifest::check_version(&manifest::load(&ctx.pkgbuild_path()?)?, &version)?;

  let secrets = match (&config.secrets, apply) {
    (Some(secrets), true) => {
      let set = SecretSet::fetch(secrets)?;
      tracing::debug!(names = ?set.names(), "secrets exported to stages");
      set
    }
    (Some(secrets), false) => {
      let names: Vec<&str> = secrets.values.iter().map(|v| v.env.as_str()).collect();
      println!("🔐 Would load {} secret(s) from Vault: {}", names.len(), names.join(", "));
      SecretSet::empty()
    }
    (None, _) => SecretSet::empty(),
  };

  let release = ReleaseContext::build(ctx, secrets)?;
  let mode = if apply { "apply" } else { "dry-run" };
  println!("🚀 Releasing {} {} ({})", config.project.name, release.record.tag, mode);

  let report = if apply {
    let runner = SystemRunner;
    pipeline.run(&mut StageRunner::new(&release, &runner))
  } else {
    pipeline.run(&mut DryRunExecutor::new(&release))
  };

  print_summary(&report);
  report.into_result()?;

  if !apply {
    println!("\n💡 Dry-run: re-run with --apply to publish");
  }
  Ok(())
}

fn print_summary(report: &PipelineReport) {
  println!("\n📊 Summary:");
  for stage in &report.stages {
    match &stage.outcome {
      StageOutcome::Succeeded => println!("   ✅ {}", stage.name),
      StageOutcome::Failed(reason) => println!("   ❌ {}: {}", stage.name, reason),
      StageOutcome::Skipped(reason) => println!("   ⏭️  {}: {}", stage.name, reason),
    }
  }
}
