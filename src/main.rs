mod commands;
mod core;
mod manifest;
mod pipeline;
mod release;
mod secrets;
mod stages;
mod ui;
mod utils;

use clap::{Parser, Subcommand};
use core::error::{ReleaseError, print_error};
use tracing_subscriber::EnvFilter;

/// Release automation for Celeste: manifest, tag, package repositories and distributions
#[derive(Parser)]
#[command(name = "celeste-release")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  // ============================================================================
  // Inspection
  // ============================================================================
  /// Print the resolved project version
  Version {
    /// Output in JSON format
    #[arg(long)]
    json: bool,
  },

  /// Print the changelog section of a version
  Notes {
    /// Version to print (default: the resolved version)
    #[arg(long)]
    version: Option<String>,
  },

  /// Show stage order and gating for the current trigger
  Plan {
    /// Output the plan in JSON format (useful for CI/automation)
    #[arg(long)]
    json: bool,
  },

  // ============================================================================
  // Packaging manifest
  // ============================================================================
  /// PKGBUILD maintenance
  #[command(subcommand)]
  Manifest(ManifestCommands),

  // ============================================================================
  // Release
  // ============================================================================
  /// Execute the release pipeline
  Run {
    /// Actually publish (default: dry-run mode showing each stage's steps)
    #[arg(long)]
    apply: bool,
    /// Run only this stage; its prerequisites are assumed to have succeeded
    #[arg(long, env = "CELESTE_RELEASE_STAGE")]
    stage: Option<String>,
  },

  /// Write a default release.toml
  Init,
}

#[derive(Subcommand)]
enum ManifestCommands {
  /// Rewrite pkgver (and pkgrel, checksums) for the project version
  Update {
    /// Version to write (default: the resolved version)
    #[arg(long)]
    version: Option<String>,
    /// Actually write the manifest (default: dry-run showing the changes)
    #[arg(long)]
    apply: bool,
  },

  /// Fail unless pkgver matches the project version
  Check,

  /// Render .SRCINFO for the PKGBUILD
  Srcinfo {
    /// Write .SRCINFO next to the PKGBUILD instead of printing it
    #[arg(long)]
    write: bool,
  },
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  let cli = Cli::parse();

  // Diagnostics go to stderr so --json output stays clean
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .with_target(false)
    .init();

  let root = match std::env::current_dir() {
    Ok(dir) => dir,
    Err(e) => {
      eprintln!("Error: Failed to get current directory: {}", e);
      std::process::exit(1);
    }
  };

  // A config that exists but does not parse is fatal for every command
  let ctx = match core::context::ProjectContext::build(&root) {
    Ok(ctx) => ctx,
    Err(e) => handle_error(e),
  };

  let result = match cli.command {
    Commands::Version { json } => commands::run_version(&ctx, json),
    Commands::Notes { version } => commands::run_notes(&ctx, version),
    Commands::Plan { json } => commands::run_plan(&ctx, json),
    Commands::Manifest(manifest_cmd) => match manifest_cmd {
      ManifestCommands::Update { version, apply } => commands::run_manifest_update(&ctx, version, apply),
      ManifestCommands::Check => commands::run_manifest_check(&ctx),
      ManifestCommands::Srcinfo { write } => commands::run_manifest_srcinfo(&ctx, write),
    },
    Commands::Run { apply, stage } => commands::run_pipeline(&ctx, apply, stage),
    Commands::Init => commands::run_init(&ctx),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn handle_error(err: ReleaseError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
