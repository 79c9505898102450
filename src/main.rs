//! Gridforge command-line interface
//!
//! Build orchestrator for the voxgrid native extension module

use clap::{Parser, Subcommand};
use std::process;

/// Display an error with its chain of causes
fn display_error(err: &anyhow::Error) {
    eprintln!("error: {err}");

    let mut source = err.source();
    while let Some(err) = source {
        eprintln!("caused by: {err}");
        source = err.source();
    }
}

#[derive(Parser)]
#[command(name = "gridforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build orchestrator for the voxgrid native extension", long_about = None)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full build pipeline
    Build {
        /// Mirror outputs into the in-place package layout (editable
        /// builds)
        #[arg(long)]
        inplace: bool,

        /// Parallelism for nested native builds
        #[arg(long, short = 'j')]
        jobs: Option<usize>,

        /// Echo subprocess output
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long, short, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// Fetch pinned external dependencies without building
    Fetch {
        /// Echo patch application details
        #[arg(long)]
        verbose: bool,

        /// Suppress all output except errors
        #[arg(long, short, conflicts_with = "verbose")]
        quiet: bool,
    },

    /// Report the detected toolchain profile
    Doctor {
        /// Emit the profile as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            inplace,
            jobs,
            verbose,
            quiet,
        } => commands::build::run(inplace, jobs, verbose, quiet).await,
        Commands::Fetch { verbose, quiet } => commands::fetch::run(verbose, quiet),
        Commands::Doctor { json } => commands::doctor::run(json),
        Commands::Completion { shell } => commands::completion::run(shell),
    };

    if let Err(e) = result {
        display_error(&e);
        process::exit(1);
    }
}

mod commands;
