mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use suitebuild_lib::consts::SUITE_FILE_NAME;

use crate::output::{OutputFormat, headline};

/// suite - incremental builds for multi-project suites
#[derive(Parser)]
#[command(name = "suite")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable debug logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

/// Options shared by every command that reads a suite.
#[derive(Debug, Clone, Args)]
pub struct SuiteArgs {
  /// Path to the suite description
  #[arg(default_value = SUITE_FILE_NAME)]
  pub file: PathBuf,

  /// Cache directory (default: $SUITE_CACHE_DIR, then the per-user cache)
  #[arg(long)]
  pub cache_dir: Option<PathBuf>,

  /// Output format
  #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
  pub output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
  /// Build every project of the suite
  Build {
    #[command(flatten)]
    suite: SuiteArgs,

    /// Maximum number of builders running at once
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Ignore and do not update stored results
    #[arg(long)]
    no_cache: bool,

    /// Output directory (default: the suite's target directory)
    #[arg(long)]
    target: Option<PathBuf>,
  },

  /// Show which builders would run, without running them
  Plan {
    #[command(flatten)]
    suite: SuiteArgs,
  },

  /// Remove build outputs and the stored results of the suite's builders
  Clean {
    #[command(flatten)]
    suite: SuiteArgs,
  },

  /// Remove stored results of builders no longer in the suite
  Gc {
    #[command(flatten)]
    suite: SuiteArgs,

    /// Show what would be removed without removing anything
    #[arg(long)]
    dry_run: bool,
  },
}

fn init_tracing(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  let result = match cli.command {
    Commands::Build {
      suite,
      jobs,
      no_cache,
      target,
    } => cmd::cmd_build(&suite, jobs, no_cache, target),
    Commands::Plan { suite } => cmd::cmd_plan(&suite),
    Commands::Clean { suite } => cmd::cmd_clean(&suite),
    Commands::Gc { suite, dry_run } => cmd::cmd_gc(&suite, dry_run),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      headline(false, &format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
