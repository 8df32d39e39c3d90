//! Release records: tag, title and notes for one version
//!
//! Notes come from the project's `CHANGELOG.md`. Headings like `## [1.2.3]`,
//! `## 1.2.3 - 2024-01-01` or `# v1.2.3` all identify the section of a
//! version; its body runs until the next heading of the same or a higher
//! level.

use crate::core::config::{ProjectConfig, ReleaseSettings};
use crate::core::error::{ReleaseError, ReleaseResult, ResultExt};
use crate::utils::render_template;
use semver::Version;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// A parsed changelog
#[derive(Debug, Clone)]
pub struct ChangelogFile {
  content: String,
}

impl ChangelogFile {
  pub fn load(path: &Path) -> ReleaseResult<Self> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read changelog {}", path.display()))?;
    Ok(Self::new(content))
  }

  pub fn new(content: impl Into<String>) -> Self {
    Self {
      content: content.into(),
    }
  }

  /// Body of the section for `version`
  pub fn section(&self, version: &Version) -> ReleaseResult<String> {
    let wanted = version.to_string();
    let mut lines = self.content.lines();
    let mut level = None;

    for line in lines.by_ref() {
      if let Some((heading_level, text)) = heading(line)
        && heading_version(text) == Some(wanted.as_str())
      {
        level = Some(heading_level);
        break;
      }
    }

    let Some(level) = level else {
      return Err(ReleaseError::with_help(
        format!("No changelog entry for version {}", wanted),
        format!("Add a `## [{}]` section to the changelog before releasing", wanted),
      ));
    };

    let body: Vec<&str> = lines
      .take_while(|line| heading(line).is_none_or(|(l, _)| l > level))
      .collect();

    Ok(body.join("\n").trim_matches('\n').trim_end().to_string())
  }

  /// Every version that has a section, in file order
  pub fn versions(&self) -> Vec<Version> {
    self
      .content
      .lines()
      .filter_map(heading)
      .filter_map(|(_, text)| heading_version(text))
      .filter_map(|v| Version::parse(v).ok())
      .collect()
  }
}

/// Split a markdown ATX heading into (level, text)
fn heading(line: &str) -> Option<(usize, &str)> {
  let level = line.chars().take_while(|c| *c == '#').count();
  if level == 0 || level > 6 {
    return None;
  }
  let rest = &line[level..];
  if !rest.is_empty() && !rest.starts_with(' ') {
    return None;
  }
  Some((level, rest.trim()))
}

/// Version token of a heading: `[1.2.3] - date`, `v1.2.3`, `1.2.3 (date)`
fn heading_version(text: &str) -> Option<&str> {
  let token = text.split_whitespace().next()?;
  let token = token.trim_start_matches('[');
  let token = token.split(']').next().unwrap_or(token);
  let token = token.strip_prefix('v').unwrap_or(token);
  if token.chars().next()?.is_ascii_digit() {
    Some(token)
  } else {
    None
  }
}

/// Tag, title and notes of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseRecord {
  pub version: String,
  pub tag: String,
  pub title: String,
  pub notes: String,
}

impl ReleaseRecord {
  pub fn new(project: &ProjectConfig, settings: &ReleaseSettings, version: &Version, notes: String) -> Self {
    let version = version.to_string();
    let tag = format!("{}{}", settings.tag_prefix, version);
    let title = render_template(
      &settings.title,
      &[("name", &project.name), ("version", &version), ("tag", &tag)],
    );
    Self {
      version,
      tag,
      title,
      notes,
    }
  }

  /// Build the record, reading notes from the configured changelog
  pub fn from_changelog(
    root: &Path,
    project: &ProjectConfig,
    settings: &ReleaseSettings,
    version: &Version,
  ) -> ReleaseResult<Self> {
    let changelog = ChangelogFile::load(&root.join(&project.changelog))?;
    let notes = changelog.section(version)?;
    Ok(Self::new(project, settings, version, notes))
  }
}
