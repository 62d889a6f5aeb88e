//! fmdl - Inspect, check and convert FMDL model files
//!
//! # Commands
//!
//! - `fmdl info` - Print the bones, materials, meshes and mesh groups of a file
//! - `fmdl check` - Run export validation on a file and list every problem
//! - `fmdl convert` - Decode a file and encode it again with chosen transforms
//! - `fmdl batch` - Convert many files in parallel
//!
//! # Configuration (fmdl.toml)
//!
//! ```toml
//! [encode]
//! mesh_splitting = true
//! vertex_loop_preservation = true
//! antiblur = true
//!
//! [decode]
//! mesh_splitting = true
//! ```
//!
//! Missing keys default to `true`. Command-line flags override the file.

mod batch;
mod check;
mod config;
mod convert;
mod info;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

/// fmdl - FMDL model tool
#[derive(Parser)]
#[command(name = "fmdl")]
#[command(about = "Inspect, check and convert FMDL model files")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a summary of a model file
    Info(info::InfoArgs),

    /// Validate a model file for export and list every problem
    Check(check::CheckArgs),

    /// Decode a model file and encode it again
    Convert(convert::ConvertArgs),

    /// Convert many model files in parallel
    Batch(batch::BatchArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Info(args) => info::execute(args),
        Commands::Check(args) => check::execute(args),
        Commands::Convert(args) => convert::execute(args),
        Commands::Batch(args) => batch::execute(args),
    }
}
