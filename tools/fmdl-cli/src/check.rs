//! Check command - list every export validation problem

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;

/// Arguments for the check command
#[derive(Args)]
pub struct CheckArgs {
    /// .fmdl file to check
    pub file: PathBuf,
}

/// Execute the check command
pub fn execute(args: CheckArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let model = fmdl_common::decode(&bytes)
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;

    let errors = fmdl_common::validation_errors(&model);
    if errors.is_empty() {
        println!("{}: OK", args.file.display());
        return Ok(());
    }
    for error in &errors {
        println!("{}: {}", args.file.display(), error);
    }
    bail!("{} problem(s) found", errors.len())
}
