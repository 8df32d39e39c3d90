//! Release pipeline: stage ordering, gating and execution
//!
//! - **graph**: validated stage DAG with a deterministic order
//! - **trigger**: branch, tag flag and commit message of the triggering push
//!
//! A stage runs only when the pipeline is not blocked (tag push, wrong
//! branch, global skip marker), its own opt-out marker is absent from the
//! commit message and every stage it needs succeeded. A failure skips the
//! failed stage's dependants but not independent branches. Nothing is
//! retried.

pub mod graph;
pub mod trigger;

pub use graph::StageGraph;
pub use trigger::Trigger;

use crate::core::config::{ReleaseConfig, StageConfig};
use crate::core::error::{ConfigError, ReleaseError, ReleaseResult, StageError, print_error};
use serde::Serialize;

/// Result of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum StageOutcome {
  Succeeded,
  Failed(String),
  Skipped(String),
}

/// Whether a stage is scheduled, before anything runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "lowercase")]
pub enum Decision {
  Run,
  Skip(String),
}

/// Executes a single stage
pub trait StageExecutor {
  fn execute(&mut self, stage: &StageConfig) -> ReleaseResult<()>;
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedStage {
  pub name: String,
  pub kind: &'static str,
  pub needs: Vec<String>,
  #[serde(flatten)]
  pub decision: Decision,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
  pub name: String,
  #[serde(flatten)]
  pub outcome: StageOutcome,
}

/// Outcomes of a pipeline run, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
  pub stages: Vec<StageReport>,
}

impl PipelineReport {
  pub fn failed(&self) -> Vec<&StageReport> {
    self
      .stages
      .iter()
      .filter(|s| matches!(s.outcome, StageOutcome::Failed(_)))
      .collect()
  }

  pub fn outcome(&self, name: &str) -> Option<&StageOutcome> {
    self.stages.iter().find(|s| s.name == name).map(|s| &s.outcome)
  }

  /// Fail when any stage failed
  pub fn into_result(self) -> ReleaseResult<Self> {
    let failed: Vec<String> = self.failed().iter().map(|s| s.name.clone()).collect();
    if failed.is_empty() {
      return Ok(self);
    }
    Err(ReleaseError::Stage(StageError::Failed {
      stage: failed.join(", "),
      reason: format!("{} of {} stage(s) failed", failed.len(), self.stages.len()),
    }))
  }
}

/// A configured pipeline bound to a trigger
pub struct Pipeline<'a> {
  stages: &'a [StageConfig],
  graph: StageGraph,
  trigger: Trigger,
  default_branch: &'a str,
  skip_marker: &'a str,
  only: Option<usize>,
}

impl<'a> Pipeline<'a> {
  pub fn new(config: &'a ReleaseConfig, trigger: Trigger) -> ReleaseResult<Self> {
    Ok(Self {
      stages: &config.stages,
      graph: StageGraph::build(&config.stages)?,
      trigger,
      default_branch: &config.project.default_branch,
      skip_marker: &config.release.skip_marker,
      only: None,
    })
  }

  /// Restrict the run to one stage; its prerequisites are treated as
  /// satisfied by the caller (a CI job with `needs:`)
  pub fn only(mut self, name: &str) -> ReleaseResult<Self> {
    let idx = self
      .graph
      .index_of(name)
      .ok_or_else(|| ReleaseError::Config(ConfigError::StageNotFound { name: name.to_string() }))?;
    self.only = Some(idx);
    Ok(self)
  }

  pub fn trigger(&self) -> &Trigger {
    &self.trigger
  }

  /// Reason nothing runs at all, if any
  pub fn blocked_reason(&self) -> Option<String> {
    self.trigger.blocked_reason(self.default_branch, self.skip_marker)
  }

  fn selected(&self) -> impl Iterator<Item = usize> + '_ {
    self
      .graph
      .order()
      .iter()
      .copied()
      .filter(move |idx| self.only.is_none_or(|only| only == *idx))
  }

  fn gate(&self, idx: usize) -> Decision {
    if let Some(reason) = self.blocked_reason() {
      return Decision::Skip(reason);
    }
    match &self.stages[idx].skip_marker {
      Some(marker) if self.trigger.opts_out(marker) => Decision::Skip(format!("commit message contains '{}'", marker)),
      _ => Decision::Run,
    }
  }

  /// What would run, without executing anything
  ///
  /// A stage whose prerequisite is skipped is skipped too, exactly as
  /// [`Pipeline::run`] would do it.
  pub fn plan(&self) -> Vec<PlannedStage> {
    let mut skipped = vec![false; self.graph.len()];
    self
      .selected()
      .map(|idx| {
        let stage = &self.stages[idx];
        let needs = self.graph.needs(idx);
        let decision = match self.gate(idx) {
          Decision::Run if self.only.is_none() => match needs.iter().find(|dep| skipped[**dep]) {
            Some(dep) => Decision::Skip(format!("prerequisite '{}' is skipped", self.graph.name(*dep))),
            None => Decision::Run,
          },
          decision => decision,
        };
        skipped[idx] = decision != Decision::Run;
        PlannedStage {
          name: stage.name.clone(),
          kind: stage.kind.label(),
          needs: needs.iter().map(|n| self.graph.name(*n).to_string()).collect(),
          decision,
        }
      })
      .collect()
  }

  /// Run every selected stage in order
  pub fn run<E: StageExecutor>(&self, executor: &mut E) -> PipelineReport {
    let mut outcomes: Vec<Option<StageOutcome>> = vec![None; self.graph.len()];

    for idx in self.selected().collect::<Vec<_>>() {
      let stage = &self.stages[idx];
      let outcome = self.run_stage(idx, stage, &outcomes, executor);
      outcomes[idx] = Some(outcome);
    }

    PipelineReport {
      stages: self
        .selected()
        .filter_map(|idx| {
          outcomes[idx].clone().map(|outcome| StageReport {
            name: self.stages[idx].name.clone(),
            outcome,
          })
        })
        .collect(),
    }
  }

  fn run_stage<E: StageExecutor>(
    &self,
    idx: usize,
    stage: &StageConfig,
    outcomes: &[Option<StageOutcome>],
    executor: &mut E,
  ) -> StageOutcome {
    if let Decision::Skip(reason) = self.gate(idx) {
      println!("⏭️  {}: skipped ({})", stage.name, reason);
      return StageOutcome::Skipped(reason);
    }

    if self.only.is_none() {
      let blocked = self
        .graph
        .needs(idx)
        .into_iter()
        .find(|dep| outcomes[*dep] != Some(StageOutcome::Succeeded));
      if let Some(dep) = blocked {
        let reason = format!("prerequisite '{}' did not succeed", self.graph.name(dep));
        println!("⏭️  {}: skipped ({})", stage.name, reason);
        return StageOutcome::Skipped(reason);
      }
    }

    println!("\n🚀 {} ({})", stage.name, stage.kind.label());
    tracing::info!(stage = %stage.name, kind = stage.kind.label(), "stage started");

    match executor.execute(stage) {
      Ok(()) => {
        println!("✅ {} succeeded", stage.name);
        StageOutcome::Succeeded
      }
      Err(err) => {
        tracing::warn!(stage = %stage.name, "stage failed");
        print_error(&err);
        StageOutcome::Failed(err.to_string())
      }
    }
  }
}
