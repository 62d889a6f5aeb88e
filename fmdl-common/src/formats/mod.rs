//! Block record layouts
//!
//! Segment-0 blocks hold fixed-size records. Each record type here knows its
//! block ID and entry size and converts to and from its little-endian bytes.
//!
//! ```text
//! ID  Record                      Size  Layout
//! 0   BoneRecord                  48    name u16, parent i16, bbox u16, 1 u16, pad u64, local f32x4, global f32x4
//! 1   MeshGroupRecord             8     name u16, invisible u16, parent i16, -1 i16
//! 2   MeshGroupAssignmentRecord   32    pad 4, group u16, count u16, first u16, bbox u16, pad 4, 0 u16, pad 14
//! 3   MeshRecord                  48    alpha u8, shadow u8, pad 2, material u16, bone group u16,
//!                                       format u16, vertices u16, pad 4, first face vertex u32,
//!                                       face vertices u32, face index u64, pad 16
//! 4   MaterialInstanceRecord      16    name u16, pad 2, material u16, textures u8, params u8,
//!                                       first texture u16, first param u16, pad 4
//! 5   BoneGroupRecord             68    4 u16, count u16, bones u16 x 32
//! 6   TextureRecord               4     filename u16, directory u16
//! 7   AssignmentRecord            4     name u16, reference u16
//! 8   MaterialRecord              4     shader u16, technique u16
//! 9   MeshFormatAssignmentRecord  8     mesh formats u8, vertex formats u8, 0 u8, uvs u8, first mf u16, first vf u16
//! 10  MeshFormatRecord            8     buffer u8, vertex formats u8, stride u8, type u8, offset u32
//! 11  VertexFormatRecord          4     datum type u8, datum format u8, offset u16
//! 12  StringRecord                8     block u16, length u16, offset u32
//! 13  BoundingBoxRecord           32    max f32x4, min f32x4
//! 14  BufferOffsetRecord          16    last u32, length u32, offset u32, pad 4
//! 16  LodRecord                   16    levels u32, 1.0 f32 x 3
//! 17  FaceIndexRecord             8     first face vertex u32, face vertex count u32
//! 18  Unknown18Record             8     zero
//! 20  Unknown20Record             128   (0, 1, 1, 1) f32, (0, 0, 0, -1) i32, pad 96
//! ```

mod layout;
mod records;

#[cfg(test)]
mod tests;

pub use layout::{DatumFormat, DatumType, EmittedLayout, LayoutEntry, MAX_UV_SLOTS};
pub use records::*;

/// Segment-0 block IDs
pub mod block {
    pub const BONES: u16 = 0;
    pub const MESH_GROUPS: u16 = 1;
    pub const MESH_GROUP_ASSIGNMENTS: u16 = 2;
    pub const MESHES: u16 = 3;
    pub const MATERIAL_INSTANCES: u16 = 4;
    pub const BONE_GROUPS: u16 = 5;
    pub const TEXTURES: u16 = 6;
    pub const ASSIGNMENTS: u16 = 7;
    pub const MATERIALS: u16 = 8;
    pub const MESH_FORMAT_ASSIGNMENTS: u16 = 9;
    pub const MESH_FORMATS: u16 = 10;
    pub const VERTEX_FORMATS: u16 = 11;
    pub const STRINGS: u16 = 12;
    pub const BOUNDING_BOXES: u16 = 13;
    pub const BUFFER_OFFSETS: u16 = 14;
    pub const LEVELS_OF_DETAIL: u16 = 16;
    pub const FACE_INDICES: u16 = 17;
    pub const UNKNOWN_18: u16 = 18;
    pub const UNKNOWN_20: u16 = 20;
}

/// Segment-1 block IDs
pub mod blob {
    /// Material parameter values, 16 bytes (f32 x 4) each
    pub const MATERIAL_PARAMETERS: u32 = 0;
    /// Present, empty, whenever the model has bones
    pub const BONE_EXTRA: u32 = 1;
    /// Position buffer, data buffer and face buffer, located through block 14
    pub const VERTEX_BUFFER: u32 = 2;
    /// NUL-terminated strings followed by the extension header text
    pub const STRING_POOL: u32 = 3;
}

/// Fixed-size segment-0 record.
///
/// `deserialize` returns `None` if the slice is shorter than `SIZE`.
pub trait Record: Sized {
    /// Segment-0 block holding records of this type
    const BLOCK: u16;
    /// Serialized size in bytes
    const SIZE: usize;

    fn serialize(&self) -> Vec<u8>;

    fn deserialize(bytes: &[u8]) -> Option<Self>;
}
