//! fmdl.toml parsing

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use fmdl_common::{DecodeOptions, EncodeOptions};
use serde::Deserialize;

/// fmdl.toml structure
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FmdlConfig {
    pub encode: EncodeOptions,
    pub decode: DecodeOptions,
}

impl FmdlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse fmdl.toml")
    }
}

/// Config file and transform switches shared by the converting commands
#[derive(Args, Clone)]
pub struct TransformArgs {
    /// Path to an fmdl.toml config file
    #[arg(short, long)]
    pub config: Option<std::path::PathBuf>,

    /// Do not split meshes over the format limits
    #[arg(long)]
    pub no_split: bool,

    /// Do not preserve vertex loops
    #[arg(long)]
    pub no_loops: bool,

    /// Do not generate anti-blur meshes
    #[arg(long)]
    pub no_antiblur: bool,
}

impl TransformArgs {
    /// The config file (or defaults) with the command-line switches applied.
    pub fn resolve(&self) -> Result<FmdlConfig> {
        let mut config = match &self.config {
            Some(path) => FmdlConfig::load(path)?,
            None => FmdlConfig::default(),
        };
        if self.no_split {
            config.encode.mesh_splitting = false;
        }
        if self.no_loops {
            config.encode.vertex_loop_preservation = false;
        }
        if self.no_antiblur {
            config.encode.antiblur = false;
        }
        Ok(config)
    }
}
