//! Release inputs derived from the project
//!
//! - **version**: the one version string, read from Cargo metadata
//! - **record**: tag, title and notes of a release, notes taken from the
//!   changelog section of that version
//!
//! # Example release.toml
//!
//! ```toml
//! [project]
//! name = "Celeste"
//! cargo_toml = "Cargo.toml"
//! changelog = "CHANGELOG.md"
//!
//! [release]
//! tag_prefix = "v"
//! title = "{name} {tag}"
//! ```

pub mod record;
pub mod version;

pub use record::{ChangelogFile, ReleaseRecord};
pub use version::VersionSource;
