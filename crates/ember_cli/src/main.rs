//! Ember CLI: offline tools for code cache entries.
//!
//! Provides `ember inspect` to print an entry's header and check it against
//! the configured build, and `ember verify` to fully restore an entry
//! against its source text.

#![warn(missing_docs)]

mod inspect;
mod pipeline;
mod verify;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Ember: code cache tooling.
#[derive(Parser, Debug)]
#[command(name = "ember", version, about = "Ember code cache tools")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a custom `ember.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print an entry's header and check it against the configured build.
    Inspect(InspectArgs),
    /// Restore an entry against its source text.
    Verify(VerifyArgs),
}

/// Arguments for the `ember inspect` subcommand.
#[derive(Parser, Debug)]
pub struct InspectArgs {
    /// Cache entry file.
    pub file: String,

    /// Output format for the report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `ember verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Cache entry file.
    pub file: String,

    /// Source file the entry was produced from.
    #[arg(short, long)]
    pub source: String,

    /// Treat the source as a module.
    #[arg(long)]
    pub module: bool,

    /// Decode on a background thread.
    #[arg(long)]
    pub background: bool,

    /// Output format for the report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a custom config file.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Inspect(ref args) => inspect::run(args, &global),
        Command::Verify(ref args) => verify::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs a stderr subscriber. `RUST_LOG` overrides the level chosen by
/// `--quiet` and `--verbose`.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(global)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        "warn"
    }
}
