//! PKGBUILD parsing and lossless rewriting
//!
//! Only the subset of shell that packaging manifests actually use is
//! understood: `key=value` and `key=(...)` assignments (optionally `+=`) and
//! function definitions. Everything else is carried through untouched, so
//! rewriting a field never disturbs comments, blank lines or the `build()`
//! and `package()` recipes.

use crate::core::error::{ManifestError, ReleaseError, ReleaseResult};
use semver::Version;
use std::borrow::Cow;

/// Value of a manifest field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
  Scalar(String),
  Array(Vec<String>),
}

impl FieldValue {
  /// Values as a list (a scalar is a one-element list)
  pub fn values(&self) -> Vec<&str> {
    match self {
      FieldValue::Scalar(v) => vec![v.as_str()],
      FieldValue::Array(vs) => vs.iter().map(String::as_str).collect(),
    }
  }
}

/// A field assignment and the lines it occupies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
  pub name: String,
  pub value: FieldValue,
  /// Quote character used for a scalar value, if any
  pub quote: Option<char>,
  /// First and last line index (inclusive)
  pub span: (usize, usize),
}

/// A shell function definition such as `build()` or `package()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
  pub name: String,
  pub body: String,
  pub span: (usize, usize),
}

/// Outcome of a version update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionChange {
  Unchanged,
  Updated { from: String, to: String },
}

/// A parsed PKGBUILD
#[derive(Debug, Clone)]
pub struct Pkgbuild {
  text: String,
  fields: Vec<Field>,
  functions: Vec<Function>,
}

impl Pkgbuild {
  pub fn parse(text: &str) -> ReleaseResult<Self> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut fields: Vec<Field> = Vec::new();
    let mut functions = Vec::new();
    let mut i = 0;

    while i < lines.len() {
      let trimmed = lines[i].trim_start();
      if trimmed.is_empty() || trimmed.starts_with('#') {
        i += 1;
        continue;
      }

      let (ident, rest) = split_identifier(trimmed);
      if ident.is_empty() {
        i += 1;
        continue;
      }

      let after = rest.trim_start();
      if let Some(def) = after.strip_prefix("()") {
        let remainder = join_from(&lines, i, def);
        let open = remainder.find('{').ok_or_else(|| parse_error(i, format!("function '{}' has no body", ident)))?;
        let close = scan(&remainder[open + 1..], Target::CloseBrace)
          .ok_or_else(|| parse_error(i, format!("function '{}' is never closed", ident)))?;
        let body = &remainder[open + 1..open + 1 + close.offset];
        let end = i + remainder[..open + 1 + close.offset].matches('\n').count();
        functions.push(Function {
          name: ident.to_string(),
          body: body.trim_matches('\n').to_string(),
          span: (i, end),
        });
        i = end + 1;
        continue;
      }

      let (append, value_text) = if let Some(v) = rest.strip_prefix("+=") {
        (true, v)
      } else if let Some(v) = rest.strip_prefix('=') {
        (false, v)
      } else {
        i += 1;
        continue;
      };

      if let Some(array_text) = value_text.strip_prefix('(') {
        let remainder = join_from(&lines, i, array_text);
        let close = scan(&remainder, Target::CloseParen)
          .ok_or_else(|| parse_error(i, format!("array '{}' is never closed", ident)))?;
        let end = i + remainder[..close.offset].matches('\n').count();
        let mut values = shell_words::split(&close.cleaned)
          .map_err(|e| parse_error(i, format!("array '{}': {}", ident, e)))?;

        if append && let Some(existing) = fields.iter_mut().rev().find(|f| f.name == ident) {
          let mut merged: Vec<String> = existing.value.values().into_iter().map(String::from).collect();
          merged.append(&mut values);
          existing.value = FieldValue::Array(merged);
        } else {
          fields.push(Field {
            name: ident.to_string(),
            value: FieldValue::Array(values),
            quote: None,
            span: (i, end),
          });
        }
        i = end + 1;
        continue;
      }

      let cleaned = scan(value_text, Target::EndOfInput).map(|s| s.cleaned).unwrap_or_default();
      let words =
        shell_words::split(&cleaned).map_err(|e| parse_error(i, format!("value of '{}': {}", ident, e)))?;
      let quote = value_text.chars().next().filter(|c| *c == '"' || *c == '\'');
      fields.push(Field {
        name: ident.to_string(),
        value: FieldValue::Scalar(words.join(" ")),
        quote,
        span: (i, i),
      });
      i += 1;
    }

    Ok(Self {
      text: text.to_string(),
      fields,
      functions,
    })
  }

  /// Original (or rewritten) manifest text
  pub fn text(&self) -> &str {
    &self.text
  }

  pub fn fields(&self) -> &[Field] {
    &self.fields
  }

  /// Last assignment of a field (later assignments win, as in shell)
  pub fn field(&self, name: &str) -> Option<&Field> {
    self.fields.iter().rev().find(|f| f.name == name)
  }

  pub fn function(&self, name: &str) -> Option<&Function> {
    self.functions.iter().find(|f| f.name == name)
  }

  /// Scalar value of a field (first element for arrays)
  pub fn scalar(&self, name: &str) -> Option<&str> {
    self.field(name).and_then(|f| match &f.value {
      FieldValue::Scalar(v) => Some(v.as_str()),
      FieldValue::Array(vs) => vs.first().map(String::as_str),
    })
  }

  pub fn array(&self, name: &str) -> Vec<&str> {
    self.field(name).map(|f| f.value.values()).unwrap_or_default()
  }

  pub fn require(&self, name: &str) -> ReleaseResult<&str> {
    self.scalar(name).ok_or_else(|| {
      ReleaseError::Manifest(ManifestError::MissingField {
        field: name.to_string(),
      })
    })
  }

  pub fn pkgver(&self) -> Option<&str> {
    self.scalar("pkgver")
  }

  pub fn pkgrel(&self) -> Option<&str> {
    self.scalar("pkgrel")
  }

  /// Expand `$var` and `${var}` references using the manifest's own fields
  pub fn expand(&self, value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.char_indices();

    while let Some((idx, c)) = chars.next() {
      if c != '$' {
        out.push(c);
        continue;
      }

      let rest = &value[idx + 1..];
      let (name, consumed) = if let Some(inner) = rest.strip_prefix('{') {
        match inner.find('}') {
          Some(close) => (&inner[..close], close + 2),
          None => ("", 0),
        }
      } else {
        let (ident, _) = split_identifier(rest);
        (ident, ident.len())
      };

      match (consumed, self.scalar(name)) {
        (n, Some(resolved)) if n > 0 => {
          out.push_str(resolved);
          for _ in 0..rest[..n].chars().count() {
            chars.next();
          }
        }
        _ => out.push('$'),
      }
    }

    out
  }

  /// Set `pkgver`, resetting `pkgrel` to 1 when the version changes
  pub fn set_version(&mut self, version: &Version) -> ReleaseResult<VersionChange> {
    let target = pkgver_for(version);
    let current = self.require("pkgver")?.to_string();
    if current == target {
      return Ok(VersionChange::Unchanged);
    }

    self.set_scalar("pkgver", &target)?;
    if self.field("pkgrel").is_some() {
      self.set_scalar("pkgrel", "1")?;
    } else {
      self.insert_after("pkgver", "pkgrel=1")?;
    }

    Ok(VersionChange::Updated {
      from: current,
      to: target,
    })
  }

  /// Replace the value of a scalar field, keeping its quoting style
  pub fn set_scalar(&mut self, name: &str, value: &str) -> ReleaseResult<()> {
    let field = self.field(name).cloned().ok_or_else(|| {
      ReleaseError::Manifest(ManifestError::MissingField {
        field: name.to_string(),
      })
    })?;

    let indent = self.indent_of(field.span.0);
    let rendered = match field.quote {
      Some('\'') => format!("{}{}='{}'", indent, name, value.replace('\'', "'\\''")),
      Some(_) => format!("{}{}=\"{}\"", indent, name, escape_double(value)),
      None => format!("{}{}={}", indent, name, shell_words::quote(value)),
    };
    self.replace_lines(field.span, &rendered)
  }

  /// Replace (or append) an array field
  pub fn set_array(&mut self, name: &str, values: &[String]) -> ReleaseResult<()> {
    match self.field(name).cloned() {
      Some(field) => {
        let indent = self.indent_of(field.span.0);
        let rendered = render_array(&indent, name, values);
        self.replace_lines(field.span, &rendered)
      }
      None => {
        let mut text = self.text.trim_end_matches('\n').to_string();
        text.push('\n');
        text.push_str(&render_array("", name, values));
        text.push('\n');
        *self = Self::parse(&text)?;
        Ok(())
      }
    }
  }

  /// Rewrite `sha256sums`
  pub fn set_checksums(&mut self, sums: &[String]) -> ReleaseResult<()> {
    self.set_array("sha256sums", sums)
  }

  fn insert_after(&mut self, anchor: &str, line: &str) -> ReleaseResult<()> {
    let field = self.field(anchor).cloned().ok_or_else(|| {
      ReleaseError::Manifest(ManifestError::MissingField {
        field: anchor.to_string(),
      })
    })?;
    let mut lines: Vec<Cow<str>> = self.text.split('\n').map(Cow::Borrowed).collect();
    lines.insert(field.span.1 + 1, Cow::Owned(line.to_string()));
    let text = lines.join("\n");
    *self = Self::parse(&text)?;
    Ok(())
  }

  fn replace_lines(&mut self, span: (usize, usize), replacement: &str) -> ReleaseResult<()> {
    let lines: Vec<&str> = self.text.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend_from_slice(&lines[..span.0]);
    out.push(replacement);
    out.extend_from_slice(&lines[span.1 + 1..]);
    let text = out.join("\n");
    *self = Self::parse(&text)?;
    Ok(())
  }

  fn indent_of(&self, line: usize) -> String {
    self
      .text
      .split('\n')
      .nth(line)
      .map(|l| l.chars().take_while(|c| c.is_whitespace()).collect())
      .unwrap_or_default()
  }
}

/// `pkgver` spelling of a semantic version (`-` is not allowed in pkgver)
pub fn pkgver_for(version: &Version) -> String {
  version.to_string().replace('-', "_")
}

fn render_array(indent: &str, name: &str, values: &[String]) -> String {
  let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v.replace('\'', "'\\''"))).collect();
  let pad = " ".repeat(indent.len() + name.len() + 2);
  format!("{}{}=({})", indent, name, quoted.join(&format!("\n{}", pad)))
}

fn escape_double(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  for c in value.chars() {
    if matches!(c, '"' | '\\' | '`') {
      out.push('\\');
    }
    out.push(c);
  }
  out
}

fn parse_error(line: usize, reason: String) -> ReleaseError {
  ReleaseError::Manifest(ManifestError::Parse { line: line + 1, reason })
}

/// Leading shell identifier of `s` and the remainder
fn split_identifier(s: &str) -> (&str, &str) {
  let end = s
    .char_indices()
    .find(|(idx, c)| !(c.is_ascii_alphanumeric() || *c == '_') || (*idx == 0 && c.is_ascii_digit()))
    .map(|(idx, _)| idx)
    .unwrap_or(s.len());
  s.split_at(end)
}

/// `first` followed by all lines after `start`, joined with newlines
fn join_from(lines: &[&str], start: usize, first: &str) -> String {
  let mut out = first.to_string();
  for line in &lines[start + 1..] {
    out.push('\n');
    out.push_str(line);
  }
  out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
  /// Unquoted `)` closing an array
  CloseParen,
  /// `}` balancing the opening brace of a function body
  CloseBrace,
  /// Whole input (comment stripping only)
  EndOfInput,
}

struct Scanned {
  /// Byte offset of the closing character (or input length)
  offset: usize,
  /// Text before the offset with comments removed
  cleaned: String,
}

/// Quote- and comment-aware scan for the closing delimiter
fn scan(input: &str, target: Target) -> Option<Scanned> {
  #[derive(PartialEq)]
  enum State {
    Normal,
    Single,
    Double,
    Comment,
  }

  let mut state = State::Normal;
  let mut depth = 0usize;
  let mut cleaned = String::with_capacity(input.len());
  let mut escaped = false;
  let mut prev = ' ';

  for (idx, c) in input.char_indices() {
    match state {
      State::Comment => {
        if c == '\n' {
          state = State::Normal;
          cleaned.push(c);
          if target == Target::EndOfInput {
            return Some(Scanned { offset: idx, cleaned });
          }
        }
        prev = c;
        continue;
      }
      State::Single => {
        if c == '\'' {
          state = State::Normal;
        }
      }
      State::Double => {
        if escaped {
          escaped = false;
        } else if c == '\\' {
          escaped = true;
        } else if c == '"' {
          state = State::Normal;
        }
      }
      State::Normal => {
        if escaped {
          escaped = false;
        } else {
          match c {
            '\\' => escaped = true,
            '\'' => state = State::Single,
            '"' => state = State::Double,
            '#' if prev.is_whitespace() || prev == '(' => {
              state = State::Comment;
              prev = c;
              continue;
            }
            ')' if target == Target::CloseParen => return Some(Scanned { offset: idx, cleaned }),
            '{' if target == Target::CloseBrace => depth += 1,
            '}' if target == Target::CloseBrace => {
              if depth == 0 {
                return Some(Scanned { offset: idx, cleaned });
              }
              depth -= 1;
            }
            '\n' if target == Target::EndOfInput => return Some(Scanned { offset: idx, cleaned }),
            _ => {}
          }
        }
      }
    }
    cleaned.push(c);
    prev = c;
  }

  match target {
    Target::EndOfInput => Some(Scanned {
      offset: input.len(),
      cleaned,
    }),
    _ => None,
  }
}
