//! Convert command - decode a model and encode it again

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{FmdlConfig, TransformArgs};

/// Arguments for the convert command
#[derive(Args)]
pub struct ConvertArgs {
    /// Input .fmdl file
    pub input: PathBuf,

    /// Output .fmdl file
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub transforms: TransformArgs,
}

/// Sizes before and after one conversion
#[derive(Debug)]
pub struct ConvertReport {
    pub input_bytes: usize,
    pub output_bytes: usize,
    pub meshes: usize,
}

/// Decode `input` with the configured decode options and write it to
/// `output` with the configured encode options.
pub fn convert_file(input: &Path, output: &Path, config: &FmdlConfig) -> Result<ConvertReport> {
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let model = fmdl_common::decode_with(&bytes, &config.decode)
        .with_context(|| format!("Failed to decode {}", input.display()))?;
    let encoded = fmdl_common::encode(&model, &config.encode)
        .with_context(|| format!("Failed to encode {}", input.display()))?;
    std::fs::write(output, &encoded)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        bytes = encoded.len(),
        "converted model"
    );
    Ok(ConvertReport {
        input_bytes: bytes.len(),
        output_bytes: encoded.len(),
        meshes: model.meshes.len(),
    })
}

/// Execute the convert command
pub fn execute(args: ConvertArgs) -> Result<()> {
    let config = args.transforms.resolve()?;
    let report = convert_file(&args.input, &args.output, &config)?;
    println!(
        "{} -> {} ({} meshes, {} -> {} bytes)",
        args.input.display(),
        args.output.display(),
        report.meshes,
        report.input_bytes,
        report.output_bytes
    );
    Ok(())
}
