//! `celeste-release plan`

use crate::core::context::ProjectContext;
use crate::core::error::ReleaseResult;
use crate::core::vcs::SystemGit;
use crate::pipeline::{Decision, Pipeline, PlannedStage, Trigger};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct PlanReport<'a> {
  version: String,
  trigger: &'a Trigger,
  #[serde(skip_serializing_if = "Option::is_none")]
  blocked: Option<String>,
  stages: Vec<PlannedStage>,
}

/// Show stage order and gating for the current trigger
pub fn run_plan(ctx: &ProjectContext, json: bool) -> ReleaseResult<()> {
  let config = ctx.require_config()?;
  let version = ctx.resolve_version()?;
  let trigger = Trigger::detect(&SystemGit::open(&ctx.root)?)?;
  let pipeline = Pipeline::new(config, trigger)?;

  let report = PlanReport {
    version: version.to_string(),
    trigger: pipeline.trigger(),
    blocked: pipeline.blocked_reason(),
    stages: pipeline.plan(),
  };

  if json {
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  println!("📋 Release plan for {} {}", config.project.name, report.version);
  match &report.trigger.branch {
    Some(branch) => println!("   Branch: {}", branch),
    None => println!("   Branch: (none)"),
  }
  if let Some(reason) = &report.blocked {
    println!("   ⏭️  Nothing will run: {}", reason);
  }

  if report.stages.is_empty() {
    println!("\n⚠️  No stages configured in release.toml");
    return Ok(());
  }

  println!();
  for (idx, stage) in report.stages.iter().enumerate() {
    let needs = if stage.needs.is_empty() {
      String::new()
    } else {
      format!(" after {}", stage.needs.join(", "))
    };
    match &stage.decision {
      Decision::Run => println!("  {}. ✅ {} ({}){}", idx + 1, stage.name, stage.kind, needs),
      Decision::Skip(reason) => println!("  {}. ⏭️  {} ({}){}: {}", idx + 1, stage.name, stage.kind, needs, reason),
    }
  }
  Ok(())
}
