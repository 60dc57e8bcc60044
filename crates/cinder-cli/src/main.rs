//! `cinderc`: command-line driver for the Cinder compiler.
//!
//! Compiles source files in the order given, so later files may import
//! earlier ones by file stem. Options come from the `[compile]` table of
//! `cinder.toml` when present and are overridden by flags.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cinderc")]
#[command(about = "Cinder compiler", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project configuration file (defaults to ./cinder.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Disable the optimizer
    #[arg(long, global = true)]
    no_optimize: bool,

    /// Keep unused locals instead of culling them
    #[arg(long, global = true)]
    keep_unused: bool,

    /// Fail the compile on warnings
    #[arg(long, global = true)]
    warnings_as_errors: bool,

    /// Diagnostic output format
    #[arg(long, global = true, value_enum, default_value_t = Format::Pretty)]
    format: Format,

    /// When to color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    /// Log compiler phases (overridden by CINDER_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile without writing output
    Check {
        /// Source files, in dependency order
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compile to bytecode modules
    Build {
        /// Source files, in dependency order
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out_dir: PathBuf,
        /// Write JSON instead of the binary container
        #[arg(long)]
        json: bool,
    },

    /// Print the disassembly of a source file or `.cnb` module
    Disasm {
        /// Input file
        file: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("CINDER_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut options = config::load(cli.config.as_deref())?;
    if cli.no_optimize {
        options.optimize = false;
    }
    if cli.keep_unused {
        options.cull_unused = false;
    }
    if cli.warnings_as_errors {
        options.warnings_as_errors = true;
    }
    tracing::debug!(?options, "resolved compile options");

    let mut out = output::Reporter::new(output::resolve_color_choice(cli.color.as_deref()), cli.format);
    let ok = match cli.command {
        Commands::Check { files } => commands::check::execute(&files, options, &mut out)?,
        Commands::Build { files, out_dir, json } => {
            commands::build::execute(&files, &out_dir, json, options, &mut out)?
        }
        Commands::Disasm { file } => commands::disasm::execute(&file, options, &mut out)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
