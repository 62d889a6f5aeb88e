//! Vertex datum types, storage formats and the layout the encoder emits
//!
//! The encoder always writes positions to buffer 0 and everything else,
//! interleaved, to buffer 1:
//!
//! ```text
//! buffer 0: position f32x3                                   stride 12
//! buffer 1: normal f16x4 | tangent f16x4 | color u8x4 |
//!           weights u8x4 | indices u8x4 | uv f16x2 ...       stride varies
//! ```
//!
//! Aliased UV slots reuse the offset of the earlier, equal slot.

use super::{MeshFormatRecord, VertexFormatRecord};
use crate::FormatError;
use crate::model::VertexFields;

/// Most UV channels a vertex may carry
pub const MAX_UV_SLOTS: usize = 4;

/// What a vertex format entry holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DatumType {
    Position = 0,
    BoneWeights = 1,
    Normal = 2,
    Color = 3,
    BoneIndices = 7,
    Uv0 = 8,
    Uv1 = 9,
    Uv2 = 10,
    Uv3 = 11,
    Tangent = 14,
}

impl DatumType {
    pub const UV: [DatumType; MAX_UV_SLOTS] = [
        DatumType::Uv0,
        DatumType::Uv1,
        DatumType::Uv2,
        DatumType::Uv3,
    ];

    pub fn uv_slot(self) -> Option<usize> {
        DatumType::UV.iter().position(|&uv| uv == self)
    }

    /// The only storage format accepted for this datum
    pub fn expected_format(self) -> DatumFormat {
        match self {
            DatumType::Position => DatumFormat::TripleFloat32,
            DatumType::Normal | DatumType::Tangent => DatumFormat::QuadFloat16,
            DatumType::Color | DatumType::BoneWeights => DatumFormat::QuadFloat8,
            DatumType::BoneIndices => DatumFormat::QuadInt8,
            DatumType::Uv0 | DatumType::Uv1 | DatumType::Uv2 | DatumType::Uv3 => {
                DatumFormat::DoubleFloat16
            }
        }
    }
}

impl TryFrom<u8> for DatumType {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => DatumType::Position,
            1 => DatumType::BoneWeights,
            2 => DatumType::Normal,
            3 => DatumType::Color,
            7 => DatumType::BoneIndices,
            8 => DatumType::Uv0,
            9 => DatumType::Uv1,
            10 => DatumType::Uv2,
            11 => DatumType::Uv3,
            14 => DatumType::Tangent,
            other => return Err(FormatError::UnknownDatumType(other)),
        })
    }
}

/// How a datum is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DatumFormat {
    TripleFloat32 = 1,
    QuadFloat16 = 6,
    DoubleFloat16 = 7,
    /// Four unsigned normalized bytes
    QuadFloat8 = 8,
    QuadInt8 = 9,
}

impl DatumFormat {
    pub const fn size(self) -> usize {
        match self {
            DatumFormat::TripleFloat32 => 12,
            DatumFormat::QuadFloat16 => 8,
            DatumFormat::DoubleFloat16 | DatumFormat::QuadFloat8 | DatumFormat::QuadInt8 => 4,
        }
    }
}

impl TryFrom<u8> for DatumFormat {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => DatumFormat::TripleFloat32,
            6 => DatumFormat::QuadFloat16,
            7 => DatumFormat::DoubleFloat16,
            8 => DatumFormat::QuadFloat8,
            9 => DatumFormat::QuadInt8,
            other => return Err(FormatError::UnknownDatumFormat(other)),
        })
    }
}

/// A datum the encoder writes, and where
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    /// 0 = position buffer, 1 = data buffer
    pub buffer: usize,
    pub datum: DatumType,
    pub offset: usize,
}

/// Encoder vertex layout for one set of vertex fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedLayout {
    /// Data actually written per vertex (aliased UVs excluded)
    pub entries: Vec<LayoutEntry>,
    /// One record per datum, aliased UVs included
    pub vertex_formats: Vec<VertexFormatRecord>,
    /// Vertex format counts per mesh format type (0: position, 1: normal
    /// and tangent, 2: color, 3: bone data and UVs)
    pub type_counts: [u8; 4],
    pub position_stride: usize,
    pub data_stride: usize,
}

impl EmittedLayout {
    pub fn new(fields: &VertexFields) -> Self {
        let mut layout = Self {
            entries: Vec::new(),
            vertex_formats: Vec::new(),
            type_counts: [0; 4],
            position_stride: 0,
            data_stride: 0,
        };

        layout.push(0, 0, DatumType::Position);
        if fields.normal {
            layout.push(1, 1, DatumType::Normal);
        }
        if fields.tangent {
            layout.push(1, 1, DatumType::Tangent);
        }
        if fields.color {
            layout.push(1, 2, DatumType::Color);
        }
        if fields.bone_mapping {
            layout.push(1, 3, DatumType::BoneWeights);
            layout.push(1, 3, DatumType::BoneIndices);
        }

        let mut uv_offsets = [0usize; MAX_UV_SLOTS];
        for slot in 0..fields.uv_count.min(MAX_UV_SLOTS) {
            let datum = DatumType::UV[slot];
            match fields.uv_alias(slot) {
                Some(source) => {
                    uv_offsets[slot] = uv_offsets[source];
                    layout.vertex_formats.push(VertexFormatRecord {
                        datum_type: datum as u8,
                        datum_format: DatumFormat::DoubleFloat16 as u8,
                        offset: uv_offsets[slot] as u16,
                    });
                    layout.type_counts[3] += 1;
                }
                None => {
                    uv_offsets[slot] = layout.data_stride;
                    layout.push(1, 3, datum);
                }
            }
        }
        layout
    }

    fn push(&mut self, buffer: usize, format_type: usize, datum: DatumType) {
        let format = datum.expected_format();
        let stride = if buffer == 0 {
            &mut self.position_stride
        } else {
            &mut self.data_stride
        };
        let offset = *stride;
        *stride += format.size();
        self.entries.push(LayoutEntry {
            buffer,
            datum,
            offset,
        });
        self.vertex_formats.push(VertexFormatRecord {
            datum_type: datum as u8,
            datum_format: format as u8,
            offset: offset as u16,
        });
        self.type_counts[format_type] += 1;
    }

    /// Mesh format records for vertices starting at the given buffer offsets
    pub fn mesh_formats(&self, position_offset: u32, data_offset: u32) -> Vec<MeshFormatRecord> {
        let mut records = vec![MeshFormatRecord {
            buffer: 0,
            vertex_format_count: self.type_counts[0],
            stride: self.position_stride as u8,
            format_type: 0,
            buffer_offset: position_offset,
        }];
        for format_type in 1..4 {
            if self.type_counts[format_type] > 0 {
                records.push(MeshFormatRecord {
                    buffer: 1,
                    vertex_format_count: self.type_counts[format_type],
                    stride: self.data_stride as u8,
                    format_type: format_type as u8,
                    buffer_offset: data_offset,
                });
            }
        }
        records
    }
}
