//! CLI commands for celeste-release
//!
//! ## Inspection
//! - **version**: resolved project version
//! - **notes**: changelog section of a version
//! - **plan**: stage order and gating for the current trigger
//!
//! ## Packaging manifest
//! - **manifest**: update, check and `.SRCINFO` rendering for the PKGBUILD
//!
//! ## Release
//! - **run**: execute the pipeline (dry-run unless `--apply`)
//! - **init**: write a default `release.toml`
//!
//! All commands accept `&ProjectContext` so the config is loaded once.

pub mod init;
pub mod manifest;
pub mod notes;
pub mod plan;
pub mod run;
pub mod version;

pub use init::run_init;
pub use manifest::{run_manifest_check, run_manifest_srcinfo, run_manifest_update};
pub use notes::run_notes;
pub use plan::run_plan;
pub use run::run_pipeline;
pub use version::run_version;
