//! Core building blocks shared by every command
//!
//! - **config**: `release.toml` parsing and validation
//! - **context**: Project context, built once in main.rs and passed everywhere
//! - **error**: Error types with contextual help messages and exit codes
//! - **exec**: External command execution behind the `CommandRunner` seam
//! - **vcs**: Git operations (SystemGit)

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod vcs;
