//! FMDL model graph and codecs
//!
//! This crate turns FMDL files (the 3D model format of the Fox engine) into a
//! host-neutral [`Model`] and back. It is shared between:
//! - `fmdl-cli` (inspection and conversion tools)
//! - editor import/export adapters
//!
//! # Modules
//!
//! - [`model`] - The model graph: bones, materials, meshes, mesh groups
//! - [`formats`] - Block record layouts and the vertex layout interpreter
//! - [`packing`] - Vertex datum packing (f32 → f16/unorm8, bone weights)
//! - [`encoding`] - Stored byte form of vertices and the keys derived from it
//! - [`extensions`] - `X-FMDL-Extensions` header text
//! - [`loops`] - Vertex/loop preservation
//! - [`splitting`] - Mesh splitting and rejoining
//! - [`antiblur`] - Anti-blur companion meshes
//! - [`pipeline`] - `decode`/`encode` entry points

pub mod antiblur;
pub mod decode;
pub mod encode;
pub mod encoding;
pub mod error;
pub mod extensions;
pub mod formats;
pub mod loops;
pub mod model;
pub mod packing;
pub mod pipeline;
pub mod splitting;
pub mod validate;

pub use error::{ExportError, FormatError, InternalFault};
pub use extensions::{ExtensionHeaders, MeshGroupMarker, MeshMarker};
pub use model::{
    Bone, BoneId, BoundingBox, Face, MaterialId, MaterialInstance, Mesh, MeshGroup, MeshGroupId,
    MeshId, Model, Texture, TextureResolver, Vertex, VertexFields,
};
pub use pipeline::{DecodeOptions, EncodeOptions, decode, decode_with, encode, encode_with_skeleton};
pub use splitting::{SkeletonMetadata, SplitLimits};
pub use validate::{validate, validation_errors};
