//! Small helpers shared by stages and commands

use std::path::Path;

/// Substitute `{key}` placeholders. Unknown placeholders are left as-is.
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
  let mut out = template.to_string();
  for (key, value) in vars {
    out = out.replace(&format!("{{{}}}", key), value);
  }
  out
}

/// Check if a path is a local filesystem path (not a remote URL)
///
/// Returns true for absolute paths, `./` and `../` relative paths and
/// Windows drive or UNC paths. Returns false for SSH and HTTPS URLs.
pub fn is_local_path(path: &str) -> bool {
  let p = Path::new(path);

  if path.starts_with("./") || path.starts_with("../") {
    return true;
  }

  // Windows drive letter (C:\ or C:/), checked before the URL test
  if path.len() >= 3 {
    let bytes = path.as_bytes();
    if bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && (bytes[2] == b'\\' || bytes[2] == b'/') {
      return true;
    }
  }

  if path.starts_with("\\\\") {
    return true;
  }

  if path.starts_with('/') && !path.contains("://") && !path.contains('@') {
    return true;
  }

  if p.is_absolute() {
    return true;
  }

  false
}

/// True when pushing to `remote` will go over SSH
pub fn is_ssh_remote(remote: &str) -> bool {
  if is_local_path(remote) {
    return false;
  }
  remote.starts_with("ssh://") || (remote.contains('@') && remote.contains(':') && !remote.contains("://"))
}
