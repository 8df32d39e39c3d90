//! `.SRCINFO` rendering
//!
//! Package repositories index packages by `.SRCINFO` rather than by
//! executing the PKGBUILD, so the file is regenerated whenever the manifest
//! is published. Field order follows `makepkg --printsrcinfo`.

use super::pkgbuild::Pkgbuild;
use crate::core::error::ReleaseResult;

/// Scalar fields, in output order
const SCALAR_KEYS: &[&str] = &["pkgdesc", "pkgver", "pkgrel", "epoch", "url", "install", "changelog"];

/// Array fields, in output order
const ARRAY_KEYS: &[&str] = &[
  "arch",
  "groups",
  "license",
  "checkdepends",
  "makedepends",
  "depends",
  "optdepends",
  "provides",
  "conflicts",
  "replaces",
  "backup",
  "options",
  "source",
  "validpgpkeys",
  "md5sums",
  "sha1sums",
  "sha224sums",
  "sha256sums",
  "sha384sums",
  "sha512sums",
  "b2sums",
];

/// Render `.SRCINFO` for a manifest
pub fn render_srcinfo(pkg: &Pkgbuild) -> ReleaseResult<String> {
  let pkgnames = pkg.array("pkgname");
  let first = pkg.require("pkgname")?;
  let pkgbase = pkg.scalar("pkgbase").unwrap_or(first);
  pkg.require("pkgver")?;

  let mut out = format!("pkgbase = {}\n", pkg.expand(pkgbase));

  for key in SCALAR_KEYS {
    if let Some(value) = pkg.scalar(key) {
      push_entry(&mut out, key, &pkg.expand(value));
    }
  }

  for key in ARRAY_KEYS {
    for value in pkg.array(key) {
      push_entry(&mut out, key, &pkg.expand(value));
    }
    // Architecture- or distribution-specific variants: depends_x86_64, focal_depends
    for field in pkg.fields() {
      if is_variant_of(&field.name, key) {
        for value in field.value.values() {
          push_entry(&mut out, &field.name, &pkg.expand(value));
        }
      }
    }
  }

  out.push('\n');
  for name in pkgnames {
    out.push_str(&format!("pkgname = {}\n", pkg.expand(name)));
  }

  Ok(out)
}

fn push_entry(out: &mut String, key: &str, value: &str) {
  out.push('\t');
  out.push_str(key);
  out.push_str(" = ");
  out.push_str(value);
  out.push('\n');
}

fn is_variant_of(name: &str, key: &str) -> bool {
  if name == key || name.starts_with('_') {
    return false;
  }
  let suffix = name
    .strip_prefix(key)
    .and_then(|rest| rest.strip_prefix('_'))
    .is_some_and(|arch| !arch.is_empty());
  let prefix = name
    .strip_suffix(key)
    .and_then(|rest| rest.strip_suffix('_'))
    .is_some_and(|distro| !distro.is_empty() && !distro.contains('_'));
  suffix || prefix
}
