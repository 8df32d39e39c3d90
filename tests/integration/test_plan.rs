//! Tests for the `plan` command: stage order and gating

use crate::helpers::*;
use anyhow::Result;
use serde_json::Value;

fn plan(project: &TestProject) -> Result<Value> {
  let output = run_celeste_release(&project.path, &["plan", "--json"])?;
  Ok(serde_json::from_str(&stdout(&output))?)
}

fn decisions(plan: &Value) -> Vec<(String, String)> {
  plan["stages"]
    .as_array()
    .map(|stages| {
      stages
        .iter()
        .map(|s| {
          (
            s["name"].as_str().unwrap_or_default().to_string(),
            s["decision"].as_str().unwrap_or_default().to_string(),
          )
        })
        .collect()
    })
    .unwrap_or_default()
}

#[test]
fn test_plan_runs_everything_on_default_branch() -> Result<()> {
  let project = TestProject::new()?;

  let plan = plan(&project)?;
  assert_eq!(plan["version"], "0.8.3");
  assert_eq!(plan["trigger"]["branch"], "main");
  assert_eq!(plan["trigger"]["source"], "local");
  assert!(plan.get("blocked").is_none());

  let decisions = decisions(&plan);
  assert_eq!(decisions[0], ("github-release".to_string(), "run".to_string()));
  assert_eq!(decisions.len(), 4);
  assert!(decisions.iter().all(|(_, d)| d == "run"));
  assert_eq!(plan["stages"][1]["needs"][0], "github-release");

  Ok(())
}

#[test]
fn test_plan_stage_opt_out_marker() -> Result<()> {
  let project = TestProject::new()?;
  project.write_file("README.md", "Celeste\n")?;
  project.commit("Fix typo [skip mpr]")?;

  let plan = plan(&project)?;
  for stage in plan["stages"].as_array().into_iter().flatten() {
    if stage["name"] == "mpr" {
      assert_eq!(stage["decision"], "skip");
      assert!(stage["reason"].as_str().unwrap_or_default().contains("[skip mpr]"));
    } else {
      assert_eq!(stage["decision"], "run", "{} should run", stage["name"]);
    }
  }

  Ok(())
}

#[test]
fn test_plan_skipped_prerequisite_skips_dependants() -> Result<()> {
  let project = TestProject::new()?;
  project.write_file("README.md", "Celeste\n")?;
  project.commit("Docs only [skip gh]")?;

  let plan = plan(&project)?;
  assert!(plan.get("blocked").is_none());
  let stages = plan["stages"].as_array().cloned().unwrap_or_default();
  assert_eq!(stages[0]["decision"], "skip");
  for stage in &stages[1..] {
    assert_eq!(stage["decision"], "skip", "{} should be skipped", stage["name"]);
    assert!(stage["reason"].as_str().unwrap_or_default().starts_with("prerequisite"));
  }
  assert_eq!(stages[3]["reason"], "prerequisite 'snap' is skipped");

  Ok(())
}

#[test]
fn test_plan_global_skip_marker() -> Result<()> {
  let project = TestProject::new()?;
  project.write_file("README.md", "Celeste\n")?;
  project.commit("Docs only [skip release]")?;

  let plan = plan(&project)?;
  assert!(plan["blocked"].as_str().unwrap_or_default().contains("[skip release]"));
  assert!(decisions(&plan).iter().all(|(_, d)| d == "skip"));

  Ok(())
}

#[test]
fn test_plan_non_default_branch_runs_nothing() -> Result<()> {
  let project = TestProject::new()?;
  git(&project.path, &["checkout", "-b", "feature/tray"])?;

  let plan = plan(&project)?;
  assert!(
    plan["blocked"]
      .as_str()
      .unwrap_or_default()
      .contains("is not the default branch")
  );
  assert!(decisions(&plan).iter().all(|(_, d)| d == "skip"));

  Ok(())
}

#[test]
fn test_plan_detached_head_runs_nothing() -> Result<()> {
  let project = TestProject::new()?;
  git(&project.path, &["checkout", "--detach", "HEAD"])?;

  let plan = plan(&project)?;
  assert_eq!(plan["trigger"]["branch"], Value::Null);
  assert_eq!(plan["blocked"], "not on a branch");

  Ok(())
}

#[test]
fn test_plan_human_output() -> Result<()> {
  let project = TestProject::new()?;

  let output = run_celeste_release(&project.path, &["plan"])?;
  let out = stdout(&output);
  assert!(out.contains("Release plan for Celeste 0.8.3"));
  assert!(out.contains("1. ✅ github-release (github-release)"));
  assert!(out.contains("4. ✅ flathub (distribution) after snap"));

  Ok(())
}

#[test]
fn test_plan_rejects_cyclic_stages() -> Result<()> {
  let project = TestProject::bare()?;
  project.write_file(
    "release.toml",
    r#"[project]
name = "Celeste"

[[stages]]
name = "a"
kind = "github-release"
needs = ["b"]

[[stages]]
name = "b"
kind = "bundle"
needs = ["a"]
build = ["true"]
publish = ["true"]
"#,
  )?;
  project.commit("Cyclic config")?;

  let output = celeste_release(&project.path, &["plan"])?;
  assert_eq!(output.status.code(), Some(1));

  Ok(())
}
