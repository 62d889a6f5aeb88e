//! Bytes ↔ model with the optional transforms applied

use fmdl_container::Container;
use serde::{Deserialize, Serialize};

use crate::antiblur::{decode_antiblur, encode_antiblur};
use crate::decode::decode_container;
use crate::encode::encode_model;
use crate::error::{ExportError, FormatError};
use crate::loops::{decode_loops, encode_loops};
use crate::model::Model;
use crate::splitting::{SkeletonMetadata, rejoin_split_meshes, split_meshes};
use crate::validate::validate;

/// Transforms applied before writing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    pub mesh_splitting: bool,
    pub vertex_loop_preservation: bool,
    pub antiblur: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            mesh_splitting: true,
            vertex_loop_preservation: true,
            antiblur: true,
        }
    }
}

/// Transforms undone after reading, when the file lists them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub mesh_splitting: bool,
    pub vertex_loop_preservation: bool,
    pub antiblur: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            mesh_splitting: true,
            vertex_loop_preservation: true,
            antiblur: true,
        }
    }
}

pub fn decode(bytes: &[u8]) -> Result<Model, FormatError> {
    decode_with(bytes, &DecodeOptions::default())
}

pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<Model, FormatError> {
    let container = Container::from_bytes(bytes)?;
    let mut model = decode_container(&container)?;
    if options.vertex_loop_preservation {
        decode_loops(&mut model);
    }
    if options.mesh_splitting {
        rejoin_split_meshes(&mut model);
    }
    if options.antiblur {
        decode_antiblur(&mut model);
    }
    Ok(model)
}

/// Encode with the built-in PES skeleton guiding mesh splitting.
pub fn encode(model: &Model, options: &EncodeOptions) -> Result<Vec<u8>, ExportError> {
    encode_with_skeleton(model, options, &SkeletonMetadata::pes())
}

/// Transform a copy of `model`, validate it and serialize it.
///
/// Validation runs after the transforms, so a mesh that splitting brings
/// within limits passes.
pub fn encode_with_skeleton(
    model: &Model,
    options: &EncodeOptions,
    skeleton: &SkeletonMetadata,
) -> Result<Vec<u8>, ExportError> {
    let mut model = model.clone();
    if options.antiblur {
        encode_antiblur(&mut model);
    }
    if options.mesh_splitting {
        split_meshes(&mut model, skeleton)?;
    }
    if options.vertex_loop_preservation {
        encode_loops(&mut model);
    }
    validate(&model)?;

    let container = encode_model(&model)?;
    Ok(container.to_bytes()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_to_enabled() {
        let options: EncodeOptions = toml::from_str("antiblur = false").unwrap();
        assert!(options.mesh_splitting);
        assert!(options.vertex_loop_preservation);
        assert!(!options.antiblur);

        let options: DecodeOptions = toml::from_str("").unwrap();
        assert_eq!(options, DecodeOptions::default());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            decode(b"not a model at all"),
            Err(FormatError::Container(_))
        ));
    }
}
