//! Batch command - convert many files in parallel

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use rayon::prelude::*;

use crate::config::TransformArgs;
use crate::convert::convert_file;

/// Arguments for the batch command
#[derive(Args)]
pub struct BatchArgs {
    /// Input .fmdl files
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory the converted files are written to, under their own names
    #[arg(long)]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub transforms: TransformArgs,
}

/// Execute the batch command
///
/// Every file is attempted; the command fails afterwards if any did.
pub fn execute(args: BatchArgs) -> Result<()> {
    let config = args.transforms.resolve()?;
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let results: Vec<(PathBuf, Result<PathBuf>)> = args
        .inputs
        .par_iter()
        .map(|input| {
            let result = match input.file_name() {
                Some(name) => {
                    let output = args.out_dir.join(name);
                    convert_file(input, &output, &config).map(|_| output)
                }
                None => Err(anyhow::anyhow!("Not a file: {}", input.display())),
            };
            (input.clone(), result)
        })
        .collect();

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(output) => println!("{} -> {}", input.display(), output.display()),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {:#}", input.display(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} files failed to convert", results.len());
    }
    println!("Converted {} files", results.len());
    Ok(())
}
