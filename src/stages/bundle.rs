//! Build and publish a sandboxed bundle (snap)
//!
//! Both commands are argument lists; each argument may use `{version}`,
//! `{tag}`, `{name}` and `{artifact}`.

use super::ReleaseContext;
use crate::core::error::{ReleaseError, ReleaseResult, StageError};
use crate::core::exec::{CommandRunner, CommandSpec};

pub fn run<R: CommandRunner>(
  ctx: &ReleaseContext,
  build: &[String],
  publish: &[String],
  artifact: Option<&str>,
  runner: &R,
) -> ReleaseResult<()> {
  let artifact = artifact.map(|a| ctx.render(a, &[]));

  let build_cmd = command(ctx, build, artifact.as_deref())?;
  println!("   🔨 {}", build_cmd.display());
  runner.run_checked(&build_cmd)?;

  if let Some(artifact) = &artifact
    && !ctx.root.join(artifact).exists()
  {
    return Err(ReleaseError::Stage(StageError::CommandFailed {
      command: build_cmd.display(),
      status: Some(0),
      stderr: format!("expected artifact {} was not produced", artifact),
    }));
  }

  let publish_cmd = command(ctx, publish, artifact.as_deref())?;
  println!("   📦 {}", publish_cmd.display());
  let output = runner.run_checked(&publish_cmd)?;
  tracing::debug!(stdout = %output.stdout.trim(), "publish output");

  println!("   ✅ Published bundle {}", artifact.as_deref().unwrap_or(ctx.record.version.as_str()));
  Ok(())
}

pub fn describe(ctx: &ReleaseContext, build: &[String], publish: &[String], artifact: Option<&str>) -> Vec<String> {
  let artifact = artifact.map(|a| ctx.render(a, &[]));
  [build, publish]
    .into_iter()
    .map(|argv| match command(ctx, argv, artifact.as_deref()) {
      Ok(cmd) => format!("run {}", cmd.display()),
      Err(err) => format!("invalid command: {}", err),
    })
    .collect()
}

/// Render an argument list into a command
fn command(ctx: &ReleaseContext, argv: &[String], artifact: Option<&str>) -> ReleaseResult<CommandSpec> {
  let extra: Vec<(&str, &str)> = artifact.map(|a| ("artifact", a)).into_iter().collect();
  let (program, args) = argv
    .split_first()
    .ok_or_else(|| ReleaseError::message("Bundle command is empty"))?;
  Ok(
    ctx
      .command(&ctx.render(program, &extra))
      .args(args.iter().map(|arg| ctx.render(arg, &extra))),
  )
}
