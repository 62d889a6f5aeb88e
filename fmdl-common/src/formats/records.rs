//! Segment-0 record types

use glam::Vec4;

use super::{Record, block};
use crate::model::BoundingBox;

/// Little-endian record builder
struct Writer(Vec<u8>);

impl Writer {
    fn new(size: usize) -> Self {
        Self(Vec::with_capacity(size))
    }
    fn u8(mut self, v: u8) -> Self {
        self.0.push(v);
        self
    }
    fn u16(mut self, v: u16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn i16(mut self, v: i16) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u32(mut self, v: u32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn i32(mut self, v: i32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn u64(mut self, v: u64) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn f32(mut self, v: f32) -> Self {
        self.0.extend_from_slice(&v.to_le_bytes());
        self
    }
    fn vec4(self, v: Vec4) -> Self {
        self.f32(v.x).f32(v.y).f32(v.z).f32(v.w)
    }
    fn pad(mut self, n: usize) -> Self {
        self.0.resize(self.0.len() + n, 0);
        self
    }
    fn finish(self) -> Vec<u8> {
        self.0
    }
}

/// Little-endian record cursor. Callers check the slice length up front.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new<R: Record>(bytes: &'a [u8]) -> Option<Self> {
        (bytes.len() >= R::SIZE).then_some(Self { bytes, pos: 0 })
    }
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
    fn skip(&mut self, n: usize) -> &mut Self {
        self.pos += n;
        self
    }
    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }
    fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }
    fn i16(&mut self) -> i16 {
        i16::from_le_bytes(self.take())
    }
    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }
    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
    fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take())
    }
    fn vec4(&mut self) -> Vec4 {
        Vec4::new(self.f32(), self.f32(), self.f32(), self.f32())
    }
}

// ============================================================================
// Skeleton
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneRecord {
    pub name: u16,
    /// -1 for root bones
    pub parent: i16,
    pub bounding_box: u16,
    pub local_position: Vec4,
    pub global_position: Vec4,
}

impl Record for BoneRecord {
    const BLOCK: u16 = block::BONES;
    const SIZE: usize = 48;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.name)
            .i16(self.parent)
            .u16(self.bounding_box)
            .u16(1)
            .u64(0)
            .vec4(self.local_position)
            .vec4(self.global_position)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        let name = r.u16();
        let parent = r.i16();
        let bounding_box = r.u16();
        r.skip(2 + 8);
        Some(Self {
            name,
            parent,
            bounding_box,
            local_position: r.vec4(),
            global_position: r.vec4(),
        })
    }
}

/// Up to 32 bone table indices used by one mesh
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoneGroupRecord {
    pub bones: Vec<u16>,
}

impl BoneGroupRecord {
    pub const MAX_BONES: usize = 32;
}

impl Record for BoneGroupRecord {
    const BLOCK: u16 = block::BONE_GROUPS;
    const SIZE: usize = 68;

    fn serialize(&self) -> Vec<u8> {
        let count = self.bones.len().min(Self::MAX_BONES);
        let mut w = Writer::new(Self::SIZE).u16(4).u16(count as u16);
        for &bone in &self.bones[..count] {
            w = w.u16(bone);
        }
        w.pad((Self::MAX_BONES - count) * 2).finish()
    }

    /// Counts above 32 are clamped.
    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        r.skip(2);
        let count = usize::from(r.u16()).min(Self::MAX_BONES);
        Some(Self {
            bones: (0..count).map(|_| r.u16()).collect(),
        })
    }
}

// ============================================================================
// Mesh Groups
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGroupRecord {
    pub name: u16,
    pub invisible: bool,
    pub parent: i16,
}

impl Record for MeshGroupRecord {
    const BLOCK: u16 = block::MESH_GROUPS;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.name)
            .u16(u16::from(self.invisible))
            .i16(self.parent)
            .i16(-1)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            name: r.u16(),
            invisible: r.u16() != 0,
            parent: r.i16(),
        })
    }
}

/// Assigns a contiguous run of meshes (possibly empty) to a mesh group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshGroupAssignmentRecord {
    pub mesh_group: u16,
    pub mesh_count: u16,
    pub first_mesh: u16,
    pub bounding_box: u16,
}

impl Record for MeshGroupAssignmentRecord {
    const BLOCK: u16 = block::MESH_GROUP_ASSIGNMENTS;
    const SIZE: usize = 32;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .pad(4)
            .u16(self.mesh_group)
            .u16(self.mesh_count)
            .u16(self.first_mesh)
            .u16(self.bounding_box)
            .pad(4)
            .u16(0)
            .pad(14)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        r.skip(4);
        Some(Self {
            mesh_group: r.u16(),
            mesh_count: r.u16(),
            first_mesh: r.u16(),
            bounding_box: r.u16(),
        })
    }
}

// ============================================================================
// Meshes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRecord {
    pub alpha: u8,
    pub shadow: u8,
    pub material_instance: u16,
    pub bone_group: u16,
    pub mesh_format_assignment: u16,
    pub vertex_count: u16,
    /// In 16-bit units from the start of the face buffer
    pub first_face_vertex: u32,
    pub face_vertex_count: u32,
    pub first_face_index: u64,
}

impl Record for MeshRecord {
    const BLOCK: u16 = block::MESHES;
    const SIZE: usize = 48;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u8(self.alpha)
            .u8(self.shadow)
            .pad(2)
            .u16(self.material_instance)
            .u16(self.bone_group)
            .u16(self.mesh_format_assignment)
            .u16(self.vertex_count)
            .pad(4)
            .u32(self.first_face_vertex)
            .u32(self.face_vertex_count)
            .u64(self.first_face_index)
            .pad(16)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        let alpha = r.u8();
        let shadow = r.u8();
        r.skip(2);
        let material_instance = r.u16();
        let bone_group = r.u16();
        let mesh_format_assignment = r.u16();
        let vertex_count = r.u16();
        r.skip(4);
        Some(Self {
            alpha,
            shadow,
            material_instance,
            bone_group,
            mesh_format_assignment,
            vertex_count,
            first_face_vertex: r.u32(),
            face_vertex_count: r.u32(),
            first_face_index: r.u64(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceIndexRecord {
    pub first_face_vertex: u32,
    pub face_vertex_count: u32,
}

impl Record for FaceIndexRecord {
    const BLOCK: u16 = block::FACE_INDICES;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u32(self.first_face_vertex)
            .u32(self.face_vertex_count)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            first_face_vertex: r.u32(),
            face_vertex_count: r.u32(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodRecord {
    pub levels: u32,
}

impl Record for LodRecord {
    const BLOCK: u16 = block::LEVELS_OF_DETAIL;
    const SIZE: usize = 16;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u32(self.levels)
            .f32(1.0)
            .f32(1.0)
            .f32(1.0)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self { levels: r.u32() })
    }
}

/// Locates one of the three sub-buffers of the vertex buffer blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOffsetRecord {
    pub last: bool,
    pub length: u32,
    pub offset: u32,
}

impl Record for BufferOffsetRecord {
    const BLOCK: u16 = block::BUFFER_OFFSETS;
    const SIZE: usize = 16;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u32(u32::from(self.last))
            .u32(self.length)
            .u32(self.offset)
            .pad(4)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            last: r.u32() != 0,
            length: r.u32(),
            offset: r.u32(),
        })
    }
}

// ============================================================================
// Vertex Formats
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFormatAssignmentRecord {
    pub mesh_format_count: u8,
    pub vertex_format_count: u8,
    pub uv_count: u8,
    pub first_mesh_format: u16,
    pub first_vertex_format: u16,
}

impl Record for MeshFormatAssignmentRecord {
    const BLOCK: u16 = block::MESH_FORMAT_ASSIGNMENTS;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u8(self.mesh_format_count)
            .u8(self.vertex_format_count)
            .u8(0)
            .u8(self.uv_count)
            .u16(self.first_mesh_format)
            .u16(self.first_vertex_format)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        let mesh_format_count = r.u8();
        let vertex_format_count = r.u8();
        r.skip(1);
        Some(Self {
            mesh_format_count,
            vertex_format_count,
            uv_count: r.u8(),
            first_mesh_format: r.u16(),
            first_vertex_format: r.u16(),
        })
    }
}

/// A run of vertex formats stored interleaved in one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshFormatRecord {
    pub buffer: u8,
    pub vertex_format_count: u8,
    pub stride: u8,
    pub format_type: u8,
    pub buffer_offset: u32,
}

impl Record for MeshFormatRecord {
    const BLOCK: u16 = block::MESH_FORMATS;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u8(self.buffer)
            .u8(self.vertex_format_count)
            .u8(self.stride)
            .u8(self.format_type)
            .u32(self.buffer_offset)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            buffer: r.u8(),
            vertex_format_count: r.u8(),
            stride: r.u8(),
            format_type: r.u8(),
            buffer_offset: r.u32(),
        })
    }
}

/// Raw datum type and format; validated when the layout is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexFormatRecord {
    pub datum_type: u8,
    pub datum_format: u8,
    pub offset: u16,
}

impl Record for VertexFormatRecord {
    const BLOCK: u16 = block::VERTEX_FORMATS;
    const SIZE: usize = 4;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u8(self.datum_type)
            .u8(self.datum_format)
            .u16(self.offset)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            datum_type: r.u8(),
            datum_format: r.u8(),
            offset: r.u16(),
        })
    }
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialInstanceRecord {
    pub name: u16,
    pub material: u16,
    pub texture_count: u8,
    pub parameter_count: u8,
    pub first_texture: u16,
    pub first_parameter: u16,
}

impl Record for MaterialInstanceRecord {
    const BLOCK: u16 = block::MATERIAL_INSTANCES;
    const SIZE: usize = 16;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.name)
            .pad(2)
            .u16(self.material)
            .u8(self.texture_count)
            .u8(self.parameter_count)
            .u16(self.first_texture)
            .u16(self.first_parameter)
            .pad(4)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        let name = r.u16();
        r.skip(2);
        Some(Self {
            name,
            material: r.u16(),
            texture_count: r.u8(),
            parameter_count: r.u8(),
            first_texture: r.u16(),
            first_parameter: r.u16(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialRecord {
    pub shader: u16,
    pub technique: u16,
}

impl Record for MaterialRecord {
    const BLOCK: u16 = block::MATERIALS;
    const SIZE: usize = 4;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.shader)
            .u16(self.technique)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            shader: r.u16(),
            technique: r.u16(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureRecord {
    pub filename: u16,
    pub directory: u16,
}

impl Record for TextureRecord {
    const BLOCK: u16 = block::TEXTURES;
    const SIZE: usize = 4;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.filename)
            .u16(self.directory)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            filename: r.u16(),
            directory: r.u16(),
        })
    }
}

/// Names a texture role or material parameter and points at its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub name: u16,
    /// Texture index or material parameter index
    pub reference: u16,
}

impl Record for AssignmentRecord {
    const BLOCK: u16 = block::ASSIGNMENTS;
    const SIZE: usize = 4;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.name)
            .u16(self.reference)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            name: r.u16(),
            reference: r.u16(),
        })
    }
}

// ============================================================================
// Strings and Bounding Boxes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRecord {
    /// Segment-1 block holding the bytes
    pub block: u16,
    pub length: u16,
    pub offset: u32,
}

impl Record for StringRecord {
    const BLOCK: u16 = block::STRINGS;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .u16(self.block)
            .u16(self.length)
            .u32(self.offset)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        Some(Self {
            block: r.u16(),
            length: r.u16(),
            offset: r.u32(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBoxRecord(pub BoundingBox);

impl Record for BoundingBoxRecord {
    const BLOCK: u16 = block::BOUNDING_BOXES;
    const SIZE: usize = 32;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .vec4(self.0.max)
            .vec4(self.0.min)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        let mut r = Reader::new::<Self>(bytes)?;
        let max = r.vec4();
        let min = r.vec4();
        Some(Self(BoundingBox { min, max }))
    }
}

// ============================================================================
// Fixed-content blocks
// ============================================================================

/// Purpose unknown; always eight zero bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unknown18Record;

impl Record for Unknown18Record {
    const BLOCK: u16 = block::UNKNOWN_18;
    const SIZE: usize = 8;

    fn serialize(&self) -> Vec<u8> {
        vec![0; Self::SIZE]
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Reader::new::<Self>(bytes).map(|_| Self)
    }
}

/// Purpose unknown; written with the values every known file carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unknown20Record;

impl Record for Unknown20Record {
    const BLOCK: u16 = block::UNKNOWN_20;
    const SIZE: usize = 128;

    fn serialize(&self) -> Vec<u8> {
        Writer::new(Self::SIZE)
            .f32(0.0)
            .f32(1.0)
            .f32(1.0)
            .f32(1.0)
            .u32(0)
            .u32(0)
            .u32(0)
            .i32(-1)
            .pad(96)
            .finish()
    }

    fn deserialize(bytes: &[u8]) -> Option<Self> {
        Reader::new::<Self>(bytes).map(|_| Self)
    }
}
