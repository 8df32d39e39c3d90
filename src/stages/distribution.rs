//! Pull request against a distribution repository (Flathub-style)
//!
//! The stage pushes a `release-<version>` branch whose manifest points the
//! application's git source at the new tag and commit, opens a pull request
//! and waits for the repository's build bot. The wait is bounded by
//! `max_polls` × `poll_interval_secs`.

use super::ReleaseContext;
use crate::core::config::DistributionConfig;
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt, StageError};
use crate::core::exec::{CommandRunner, CommandSpec};
use crate::core::vcs::SystemGit;
use crate::ui::progress::PollProgress;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Build bot verdict found in the pull request comments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotStatus {
  Pending,
  Succeeded,
  Failed(String),
}

#[derive(Debug, Deserialize)]
struct PrView {
  #[serde(default)]
  comments: Vec<PrComment>,
}

#[derive(Debug, Deserialize)]
struct PrComment {
  author: Option<Author>,
  body: String,
  #[serde(rename = "createdAt")]
  created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Author {
  login: String,
}

#[derive(Debug, Deserialize)]
struct OpenPr {
  url: String,
}

pub fn run<R: CommandRunner>(
  ctx: &ReleaseContext,
  stage: &str,
  dist: &DistributionConfig,
  runner: &R,
  sleep: fn(Duration),
) -> ReleaseResult<()> {
  let tag = &ctx.record.tag;
  let commit = release_commit(ctx)?;
  let branch = ctx.render(&dist.branch, &[]);

  let scratch = tempfile::TempDir::new()?;
  let dest = scratch.path().join("distribution");
  let env = ctx.env();
  let repo = ctx.identify(SystemGit::clone_into(&dist.repository, &dest, Some(&dist.base), &env)?);
  repo.create_and_checkout_branch(&branch)?;

  let manifest_path = dest.join(&dist.manifest);
  let text = fs::read_to_string(&manifest_path)
    .with_context(|| format!("Failed to read {} in {}", dist.manifest.display(), dist.repository))?;
  let updated = rewrite_source(&text, &dist.source_url, tag, &commit)?;
  if updated == text {
    println!("   ⏭️  {} already points at {}, nothing to do", dist.manifest.display(), tag);
    return Ok(());
  }
  fs::write(&manifest_path, updated)?;

  repo.add_all()?;
  repo.commit(&format!("Update to {}", tag))?;
  // A branch left by an earlier failed attempt is replaced
  repo.force_push_with_lease("origin", &format!("HEAD:refs/heads/{}", branch))?;
  let pushed_at = Utc::now();

  let (pr, since) = match open_pr(ctx, dist, &branch, runner)? {
    Some(pr) => {
      println!("   🔀 Reusing open pull request {}", pr);
      (pr, Some(pushed_at))
    }
    None => (create_pr(ctx, dist, &branch, runner)?, None),
  };

  if let Some(comment) = &dist.trigger_comment {
    runner.run_checked(&gh(ctx, dist).args(["pr", "comment", pr.as_str(), "--body", comment.as_str()]))?;
  }

  wait_for_bot(ctx, stage, dist, &pr, since, runner, sleep)?;

  if dist.auto_merge {
    runner.run_checked(&gh(ctx, dist).args(["pr", "merge", pr.as_str(), "--merge"]))?;
    println!("   ✅ Merged {}", pr);
  } else {
    println!("   ✅ Build passed, {} is ready to merge", pr);
  }
  Ok(())
}

/// Open pull request already carrying `branch`, if any
fn open_pr<R: CommandRunner>(
  ctx: &ReleaseContext,
  dist: &DistributionConfig,
  branch: &str,
  runner: &R,
) -> ReleaseResult<Option<String>> {
  let output = runner.run_checked(&gh(ctx, dist).args([
    "pr", "list", "--head", branch, "--state", "open", "--json", "url",
  ]))?;
  if output.stdout.trim().is_empty() {
    return Ok(None);
  }
  let open: Vec<OpenPr> =
    serde_json::from_str(&output.stdout).context("Failed to parse `gh pr list --json url` output")?;
  Ok(open.into_iter().next().map(|pr| pr.url))
}

fn create_pr<R: CommandRunner>(
  ctx: &ReleaseContext,
  dist: &DistributionConfig,
  branch: &str,
  runner: &R,
) -> ReleaseResult<String> {
  let tag = &ctx.record.tag;
  let head = match &dist.head_owner {
    Some(owner) => format!("{}:{}", owner, branch),
    None => branch.to_string(),
  };
  let body = format!("Update {} to {}.\n\n{}", ctx.config.project.name, tag, ctx.record.notes);
  let created = runner.run_checked(
    &gh(ctx, dist)
      .args([
        "pr",
        "create",
        "--base",
        dist.base.as_str(),
        "--head",
        head.as_str(),
        "--title",
        ctx.record.title.as_str(),
        "--body-file",
        "-",
      ])
      .stdin(body),
  )?;
  let pr = created
    .stdout
    .lines()
    .rev()
    .map(str::trim)
    .find(|line| !line.is_empty())
    .map(String::from)
    .ok_or_else(|| ReleaseError::message("gh pr create did not print the pull request URL"))?;
  println!("   🔀 Opened {}", pr);
  Ok(pr)
}

pub fn describe(ctx: &ReleaseContext, dist: &DistributionConfig) -> Vec<String> {
  let branch = ctx.render(&dist.branch, &[]);
  let mut steps = vec![
    format!("clone {} ({}) and create branch {}", dist.repository, dist.base, branch),
    format!(
      "point {} at {} in {}",
      dist.source_url,
      ctx.record.tag,
      dist.manifest.display()
    ),
    format!("push {} (replacing a branch left by an earlier attempt)", branch),
    format!("open a pull request against {} unless one is already open", dist.upstream),
  ];
  if let Some(comment) = &dist.trigger_comment {
    steps.push(format!("comment '{}'", comment));
  }
  steps.push(format!(
    "wait up to {}s for '{}' or '{}'",
    dist.poll_interval_secs * u64::from(dist.max_polls),
    dist.success_keyword,
    dist.failure_keyword
  ));
  if dist.auto_merge {
    steps.push("merge the pull request".to_string());
  }
  steps
}

/// Commit the release tag points at (HEAD when the tag is not local)
fn release_commit(ctx: &ReleaseContext) -> ReleaseResult<String> {
  let git = ctx.project_git()?;
  match git.rev_parse(&ctx.record.tag)? {
    Some(sha) => Ok(sha),
    None => {
      tracing::warn!(tag = %ctx.record.tag, "release tag not found locally, using HEAD");
      git.head_commit()
    }
  }
}

fn gh(ctx: &ReleaseContext, dist: &DistributionConfig) -> CommandSpec {
  ctx.command("gh").args(["--repo", dist.upstream.as_str()])
}

/// Poll the pull request comments until the bot reports success
///
/// With `since`, comments older than that are ignored; they belong to an
/// earlier attempt on a reused pull request.
fn wait_for_bot<R: CommandRunner>(
  ctx: &ReleaseContext,
  stage: &str,
  dist: &DistributionConfig,
  pr: &str,
  since: Option<DateTime<Utc>>,
  runner: &R,
  sleep: fn(Duration),
) -> ReleaseResult<()> {
  let label = format!("Waiting for {}", dist.bot.as_deref().unwrap_or("build bot"));
  let mut progress = PollProgress::new(dist.max_polls, label);
  let view = gh(ctx, dist).args(["pr", "view", pr, "--json", "comments"]);

  for attempt in 1..=dist.max_polls {
    let output = runner.run_checked(&view)?;
    let status = bot_status(&output.stdout, dist, since)?;
    tracing::debug!(attempt, ?status, "polled pull request");
    progress.inc();

    match status {
      BotStatus::Succeeded => {
        progress.finish(dist.max_polls);
        return Ok(());
      }
      BotStatus::Failed(comment) => {
        progress.finish(dist.max_polls);
        return Err(ReleaseError::Stage(StageError::Failed {
          stage: stage.to_string(),
          reason: format!("build bot reported failure on {}:\n{}", pr, comment.trim()),
        }));
      }
      BotStatus::Pending if attempt < dist.max_polls => sleep(Duration::from_secs(dist.poll_interval_secs)),
      BotStatus::Pending => {}
    }
  }

  Err(ReleaseError::Stage(StageError::Timeout {
    stage: stage.to_string(),
    waited_secs: dist.poll_interval_secs * u64::from(dist.max_polls.saturating_sub(1)),
  }))
}

/// Verdict of the newest bot comment carrying a status keyword
///
/// Keywords match whole words, ignoring case.
pub fn bot_status(json: &str, dist: &DistributionConfig, since: Option<DateTime<Utc>>) -> ReleaseResult<BotStatus> {
  let view: PrView = serde_json::from_str(json).context("Failed to parse `gh pr view --json comments` output")?;
  let failure = keyword(&dist.failure_keyword)?;
  let success = keyword(&dist.success_keyword)?;

  let mut candidates: Vec<&PrComment> = view
    .comments
    .iter()
    .filter(|c| match (&dist.bot, &c.author) {
      (Some(bot), Some(author)) => author.login.eq_ignore_ascii_case(bot),
      (Some(_), None) => false,
      (None, _) => true,
    })
    .filter(|c| since.is_none_or(|since| c.created_at.is_some_and(|at| at >= since)))
    .filter(|c| failure.is_match(&c.body) || success.is_match(&c.body))
    .collect();
  // Stable sort keeps API order for comments without timestamps
  candidates.sort_by_key(|c| c.created_at);

  Ok(match candidates.last() {
    None => BotStatus::Pending,
    Some(c) if failure.is_match(&c.body) => BotStatus::Failed(c.body.clone()),
    Some(_) => BotStatus::Succeeded,
  })
}

fn keyword(word: &str) -> ReleaseResult<Regex> {
  Ok(Regex::new(&format!(r"(?i)(^|\W){}($|\W)", regex::escape(word)))?)
}

/// Point the git source entry matching `source_url` at `tag` and `commit`
///
/// Works on YAML manifests: the entry is the list item holding
/// `url: <source_url>`; its `tag:` and `commit:` keys are rewritten in
/// place, or inserted after `url:` when absent.
pub fn rewrite_source(text: &str, source_url: &str, tag: &str, commit: &str) -> ReleaseResult<String> {
  let url = regex::escape(source_url.trim_end_matches('/').trim_end_matches(".git"));
  let url_line = Regex::new(&format!(r#"^(\s*)(-\s+)?url:\s*["']?{}(\.git)?/?["']?\s*$"#, url))?;
  let key_line = Regex::new(r"^(\s*)(-\s+)?(tag|commit):")?;

  let lines: Vec<&str> = text.split_inclusive('\n').collect();
  let (url_idx, captures) = lines
    .iter()
    .enumerate()
    .find_map(|(i, line)| url_line.captures(line.trim_end_matches(['\n', '\r'])).map(|c| (i, c)))
    .ok_or_else(|| {
      ReleaseError::with_help(
        format!("No source with url {} in the distribution manifest", source_url),
        "Set `source_url` to the url of the application's `type: git` source",
      )
    })?;

  let lead = captures.get(1).map_or(0, |m| m.as_str().len());
  let dash = captures.get(2).map_or(0, |m| m.as_str().len());
  let key_indent = lead + dash;
  let item_indent = key_indent.saturating_sub(2);

  // Extent of the list item: back to its `- ` line, forward until dedent
  let in_item = |line: &str| {
    let indent = indent_of(line);
    line.trim().is_empty() || indent > key_indent || indent == key_indent && !line.trim_start().starts_with('-')
  };
  let mut start = url_idx;
  if dash == 0 {
    while start > 0 && in_item(lines[start - 1]) {
      start -= 1;
    }
    if start > 0 && indent_of(lines[start - 1]) == item_indent && lines[start - 1].trim_start().starts_with('-') {
      start -= 1;
    }
  }
  let mut end = url_idx + 1;
  while end < lines.len() && in_item(lines[end]) {
    end += 1;
  }

  let mut out: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
  let mut seen_tag = false;
  let mut seen_commit = false;
  for idx in start..end {
    let line = lines[idx];
    let Some(caps) = key_line.captures(line) else {
      continue;
    };
    if indent_of(line) + caps.get(2).map_or(0, |m| m.as_str().len()) != key_indent {
      continue;
    }
    let prefix = format!("{}{}", &caps[1], caps.get(2).map_or("", |m| m.as_str()));
    let newline = if line.ends_with('\n') { "\n" } else { "" };
    match &caps[3] {
      "tag" => {
        out[idx] = format!("{}tag: {}{}", prefix, tag, newline);
        seen_tag = true;
      }
      _ => {
        out[idx] = format!("{}commit: {}{}", prefix, commit, newline);
        seen_commit = true;
      }
    }
  }

  let pad = " ".repeat(key_indent);
  let mut inserts = Vec::new();
  if !seen_tag {
    inserts.push(format!("{}tag: {}\n", pad, tag));
  }
  if !seen_commit {
    inserts.push(format!("{}commit: {}\n", pad, commit));
  }
  if !inserts.is_empty() {
    if !out[url_idx].ends_with('\n') {
      out[url_idx].push('\n');
    }
    for (offset, line) in inserts.into_iter().enumerate() {
      out.insert(url_idx + 1 + offset, line);
    }
  }

  Ok(out.concat())
}

fn indent_of(line: &str) -> usize {
  line.len() - line.trim_start_matches(' ').len()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::core::config::{ReleaseConfig, StageKind};
  use crate::core::exec::testing::ScriptedRunner;
  use crate::stages::fixtures::{Project, bare_repo, git};

  const MANIFEST: &str = "app-id: com.hunterwittenborn.Celeste
runtime: org.gnome.Platform
modules:
  - name: rclone
    sources:
      - type: git
        url: https://github.com/rclone/rclone
        tag: v1.62.2
        commit: 1111111111111111111111111111111111111111
  - name: celeste
    buildsystem: simple
    sources:
      - type: git
        url: https://github.com/hwittenborn/celeste
        tag: v0.8.2
        commit: 2222222222222222222222222222222222222222
      - type: file
        path: cargo-sources.json
";

  const SHA: &str = "3333333333333333333333333333333333333333";

  fn dist(extra: &str) -> DistributionConfig {
    let toml = format!(
      r#"[project]
name = "Celeste"

[[stages]]
name = "flathub"
kind = "distribution"
repository = "unused"
upstream = "flathub/com.hunterwittenborn.Celeste"
manifest = "com.hunterwittenborn.Celeste.yml"
source_url = "https://github.com/hwittenborn/celeste"
{}
"#,
      extra
    );
    match ReleaseConfig::parse(&toml).unwrap().stages.remove(0).kind {
      StageKind::Distribution(dist) => dist,
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_rewrites_only_matching_source() {
    let out = rewrite_source(MANIFEST, "https://github.com/hwittenborn/celeste", "v0.8.3", SHA).unwrap();
    assert!(out.contains("        url: https://github.com/hwittenborn/celeste\n        tag: v0.8.3\n"));
    assert!(out.contains(&format!("        commit: {}\n", SHA)));
    assert!(out.contains("tag: v1.62.2"));
    assert!(out.contains("commit: 1111111111111111111111111111111111111111"));
    assert!(out.contains("      - type: file\n        path: cargo-sources.json\n"));
    assert_eq!(out.lines().count(), MANIFEST.lines().count());

    let again = rewrite_source(&out, "https://github.com/hwittenborn/celeste.git", "v0.8.3", SHA).unwrap();
    assert_eq!(again, out);
  }

  #[test]
  fn test_inserts_missing_keys() {
    let manifest = "sources:\n  - type: git\n    url: 'https://github.com/hwittenborn/celeste.git'\n";
    let out = rewrite_source(manifest, "https://github.com/hwittenborn/celeste", "v0.8.3", SHA).unwrap();
    assert_eq!(
      out,
      format!(
        "sources:\n  - type: git\n    url: 'https://github.com/hwittenborn/celeste.git'\n    tag: v0.8.3\n    commit: {}\n",
        SHA
      )
    );
  }

  #[test]
  fn test_url_first_in_item() {
    let manifest = "sources:\n  - url: https://github.com/hwittenborn/celeste\n    type: git\n    tag: v0.8.2\n";
    let out = rewrite_source(manifest, "https://github.com/hwittenborn/celeste", "v0.8.3", SHA).unwrap();
    assert!(out.contains("    tag: v0.8.3\n"));
    assert!(out.contains(&format!("    commit: {}\n", SHA)));
  }

  #[test]
  fn test_missing_source_is_an_error() {
    let err = rewrite_source(MANIFEST, "https://github.com/hwittenborn/other", "v1", SHA).unwrap_err();
    assert!(err.help_message().is_some());
  }

  #[test]
  fn test_bot_status_from_comments() {
    let dist = dist("bot = \"flathubbot\"");
    let pending = r#"{"comments":[{"author":{"login":"flathubbot"},"body":"Starting a test build","createdAt":"2024-05-02T10:00:00Z"}]}"#;
    assert_eq!(bot_status(pending, &dist, None).unwrap(), BotStatus::Pending);

    let impostor = r#"{"comments":[{"author":{"login":"someone"},"body":"build successful","createdAt":"2024-05-02T10:00:00Z"}]}"#;
    assert_eq!(bot_status(impostor, &dist, None).unwrap(), BotStatus::Pending);

    let retried = r#"{"comments":[
      {"author":{"login":"flathubbot"},"body":"Build 41 successful","createdAt":"2024-05-02T11:00:00Z"},
      {"author":{"login":"flathubbot"},"body":"Build 40 failed","createdAt":"2024-05-02T10:00:00Z"}
    ]}"#;
    assert_eq!(bot_status(retried, &dist, None).unwrap(), BotStatus::Succeeded);

    let failed = r#"{"comments":[{"author":{"login":"flathubbot"},"body":"Build 42 failed","createdAt":"2024-05-02T12:00:00Z"}]}"#;
    assert!(matches!(bot_status(failed, &dist, None).unwrap(), BotStatus::Failed(body) if body.contains("42")));

    assert!(bot_status("not json", &dist, None).is_err());
  }

  #[test]
  fn test_keywords_match_whole_words_ignoring_case() {
    let dist = dist("bot = \"flathubbot\"");
    let comment = |body: &str| {
      format!(
        r#"{{"comments":[{{"author":{{"login":"flathubbot"}},"body":"{}","createdAt":"2024-05-02T10:00:00Z"}}]}}"#,
        body
      )
    };

    assert_eq!(bot_status(&comment("Build unsuccessful"), &dist, None).unwrap(), BotStatus::Pending);
    assert_eq!(bot_status(&comment("Nothing failedover here"), &dist, None).unwrap(), BotStatus::Pending);
    assert_eq!(bot_status(&comment("Build Successful!"), &dist, None).unwrap(), BotStatus::Succeeded);
    assert!(matches!(
      bot_status(&comment("Test build FAILED."), &dist, None).unwrap(),
      BotStatus::Failed(_)
    ));
  }

  #[test]
  fn test_comments_before_since_are_ignored() {
    let dist = dist("bot = \"flathubbot\"");
    let json = r#"{"comments":[
      {"author":{"login":"flathubbot"},"body":"Build 40 failed","createdAt":"2024-05-02T10:00:00Z"},
      {"author":{"login":"flathubbot"},"body":"Started build 41"}
    ]}"#;
    let since = "2024-05-02T11:00:00Z".parse::<DateTime<Utc>>().unwrap();
    assert!(matches!(bot_status(json, &dist, None).unwrap(), BotStatus::Failed(_)));
    assert_eq!(bot_status(json, &dist, Some(since)).unwrap(), BotStatus::Pending);
  }

  fn distribution_remote() -> tempfile::TempDir {
    let remote = bare_repo();
    let seed = tempfile::TempDir::new().unwrap();
    git(seed.path(), &["init", "--initial-branch=master"]);
    fs::write(seed.path().join("com.hunterwittenborn.Celeste.yml"), MANIFEST).unwrap();
    git(seed.path(), &["add", "."]);
    git(seed.path(), &["commit", "-m", "Initial"]);
    git(seed.path(), &["push", "--quiet", &remote.path().to_string_lossy(), "master"]);
    remote
  }

  fn no_sleep(_: Duration) {}

  fn pr_stage(remote: &std::path::Path, extra: &str) -> String {
    format!(
      r#"[[stages]]
name = "flathub"
kind = "distribution"
repository = "{}"
upstream = "flathub/com.hunterwittenborn.Celeste"
manifest = "com.hunterwittenborn.Celeste.yml"
source_url = "https://github.com/hwittenborn/celeste"
bot = "flathubbot"
trigger_comment = "bot, build"
{}
"#,
      remote.display(),
      extra
    )
  }

  fn stage_config(ctx: &ReleaseContext) -> DistributionConfig {
    match &ctx.config.stage("flathub").unwrap().kind {
      StageKind::Distribution(dist) => dist.clone(),
      other => panic!("unexpected {:?}", other),
    }
  }

  const PR_URL: &str = "https://github.com/flathub/com.hunterwittenborn.Celeste/pull/7\n";
  const EMPTY: &str = r#"{"comments":[]}"#;
  const PASSED: &str = r#"{"comments":[{"author":{"login":"flathubbot"},"body":"Build 7 successful","createdAt":"2024-05-02T10:00:00Z"}]}"#;
  const FAILED: &str = r#"{"comments":[{"author":{"login":"flathubbot"},"body":"Build 7 failed","createdAt":"2024-05-02T10:00:00Z"}]}"#;

  #[test]
  fn test_opens_polls_and_merges() {
    let project = Project::new();
    git(project.path(), &["tag", "v0.8.3"]);
    let release_sha = git(project.path(), &["rev-parse", "HEAD"]);
    let remote = distribution_remote();
    let ctx = project.context(&pr_stage(remote.path(), ""));
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr create", 0, PR_URL)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, EMPTY)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, PASSED);

    run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap();

    let lines = runner.lines();
    let pr = "https://github.com/flathub/com.hunterwittenborn.Celeste/pull/7";
    assert_eq!(
      lines[0],
      "gh --repo flathub/com.hunterwittenborn.Celeste pr list --head release-0.8.3 --state open --json url"
    );
    assert!(lines[1].contains("pr create --base master --head release-0.8.3 --title 'Celeste v0.8.3' --body-file -"));
    let body = runner.calls.borrow()[1].stdin.clone().unwrap();
    assert!(body.starts_with("Update Celeste to v0.8.3."));
    assert!(body.contains("- Fixed tray icon"));
    assert_eq!(
      lines[2],
      format!("gh --repo flathub/com.hunterwittenborn.Celeste pr comment {} --body 'bot, build'", pr)
    );
    assert_eq!(lines.iter().filter(|l| l.contains("pr view")).count(), 2);
    assert_eq!(
      lines.last().unwrap(),
      &format!("gh --repo flathub/com.hunterwittenborn.Celeste pr merge {} --merge", pr)
    );

    let pushed = git(remote.path(), &["show", "release-0.8.3:com.hunterwittenborn.Celeste.yml"]);
    assert!(pushed.contains("tag: v0.8.3"));
    assert!(pushed.contains(&format!("commit: {}", release_sha)));
    assert_eq!(
      git(remote.path(), &["log", "-1", "--format=%s", "release-0.8.3"]),
      "Update to v0.8.3"
    );
  }

  #[test]
  fn test_bot_failure_fails_without_merge() {
    let project = Project::new();
    let remote = distribution_remote();
    let ctx = project.context(&pr_stage(remote.path(), ""));
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr create", 0, PR_URL)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, FAILED);

    let err = run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap_err();
    assert!(matches!(err, ReleaseError::Stage(StageError::Failed { .. })));
    assert!(err.help_message().unwrap().contains("manual investigation"));
    assert!(!runner.lines().iter().any(|l| l.contains("pr merge")));
  }

  #[test]
  fn test_rerun_replaces_branch_and_reuses_open_pr() {
    let project = Project::new();
    git(project.path(), &["tag", "v0.8.3"]);
    let remote = distribution_remote();

    // Branch left behind by an earlier attempt
    let stale = tempfile::TempDir::new().unwrap();
    git(stale.path(), &["clone", "--quiet", &remote.path().to_string_lossy(), "."]);
    git(stale.path(), &["checkout", "-b", "release-0.8.3"]);
    fs::write(stale.path().join("NOTES"), "half done\n").unwrap();
    git(stale.path(), &["add", "."]);
    git(stale.path(), &["commit", "-m", "Earlier attempt"]);
    git(stale.path(), &["push", "--quiet", "origin", "release-0.8.3"]);

    let ctx = project.context(&pr_stage(remote.path(), ""));
    let open = r#"[{"url":"https://github.com/flathub/com.hunterwittenborn.Celeste/pull/7"}]"#;
    let rebuilt = r#"{"comments":[
      {"author":{"login":"flathubbot"},"body":"Build 7 failed","createdAt":"2024-05-02T10:00:00Z"},
      {"author":{"login":"flathubbot"},"body":"Build 8 successful","createdAt":"2999-01-01T00:00:00Z"}
    ]}"#;
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr list", 0, open)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, rebuilt);

    run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap();

    let lines = runner.lines();
    assert!(!lines.iter().any(|l| l.contains("pr create")));
    assert!(lines.iter().any(|l| l.contains("pr comment https://github.com/flathub/com.hunterwittenborn.Celeste/pull/7")));
    assert!(lines.last().unwrap().contains("pr merge"));
    assert_eq!(
      git(remote.path(), &["log", "-1", "--format=%s", "release-0.8.3"]),
      "Update to v0.8.3"
    );
    let pushed = git(remote.path(), &["show", "release-0.8.3:com.hunterwittenborn.Celeste.yml"]);
    assert!(pushed.contains("tag: v0.8.3"));
  }

  #[test]
  fn test_stale_verdict_on_reused_pr_is_ignored() {
    let project = Project::new();
    let remote = distribution_remote();
    let ctx = project.context(&pr_stage(remote.path(), "max_polls = 2"));
    let open = r#"[{"url":"https://github.com/flathub/com.hunterwittenborn.Celeste/pull/7"}]"#;
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr list", 0, open)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, FAILED);

    let err = run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap_err();
    assert!(matches!(err, ReleaseError::Stage(StageError::Timeout { .. })));
  }

  #[test]
  fn test_poll_is_bounded() {
    let project = Project::new();
    let remote = distribution_remote();
    let ctx = project.context(&pr_stage(remote.path(), "max_polls = 3\npoll_interval_secs = 10"));
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr create", 0, PR_URL)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, EMPTY);

    let err = run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap_err();
    assert!(matches!(err, ReleaseError::Stage(StageError::Timeout { waited_secs: 20, .. })));
    assert_eq!(runner.lines().iter().filter(|l| l.contains("pr view")).count(), 3);
  }

  #[test]
  fn test_manual_merge_when_auto_merge_disabled() {
    let project = Project::new();
    let remote = distribution_remote();
    let ctx = project.context(&pr_stage(remote.path(), "auto_merge = false"));
    let runner = ScriptedRunner::new()
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr create", 0, PR_URL)
      .respond("gh --repo flathub/com.hunterwittenborn.Celeste pr view", 0, PASSED);

    run(&ctx, "flathub", &stage_config(&ctx), &runner, no_sleep).unwrap();
    assert!(!runner.lines().iter().any(|l| l.contains("pr merge")));
  }
}
