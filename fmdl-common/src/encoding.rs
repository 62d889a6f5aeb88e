//! Stored byte form of a vertex
//!
//! A [`VertexEncoding`] holds exactly the bytes a vertex occupies in the
//! vertex buffers, with bone references kept as model-level [`BoneId`]s so
//! two encodings compare equal regardless of which bone group they end up in.
//!
//! Three byte keys are derived from it:
//! - topological: position + bone mapping
//! - nontopological: normal + color + UVs + tangent
//! - indistinguishable: all of the above

use smallvec::SmallVec;

use crate::formats::MAX_UV_SLOTS;
use crate::model::{Bone, BoneId, Vertex, VertexFields};
use crate::packing::{
    MAX_VERTEX_BONES, decode_unorm8, pack_color_unorm8, pack_vec2_f16, pack_vec3_f32,
    pack_vec4_f16, quantize_bone_weights, unpack_color_unorm8, unpack_vec2_f16, unpack_vec3_f32,
    unpack_vec4_f16,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VertexEncoding {
    pub position: [u8; 12],
    pub normal: Option<[u8; 8]>,
    pub tangent: Option<[u8; 8]>,
    pub color: Option<[u8; 4]>,
    /// One entry per UV slot, aliased slots included
    pub uv: SmallVec<[[u8; 4]; MAX_UV_SLOTS]>,
    /// Nonzero (bone, weight byte) pairs in stored order
    pub bone_mapping: SmallVec<[(BoneId, u8); MAX_VERTEX_BONES]>,
}

impl VertexEncoding {
    /// Encode a vertex for the channels `fields` declares. Missing values
    /// encode as zero.
    pub fn encode(vertex: &Vertex, fields: &VertexFields, bones: &[Bone]) -> Self {
        let uv = (0..fields.uv_count.min(MAX_UV_SLOTS))
            .map(|slot| {
                let source = fields.uv_alias(slot).unwrap_or(slot);
                pack_vec2_f16(vertex.uv.get(source).copied().unwrap_or_default())
            })
            .collect();

        let bone_mapping = if fields.bone_mapping {
            quantize_bone_weights(&vertex.bone_mapping, |bone: BoneId| {
                bones.get(bone.0).map_or("", |b| b.name.as_str())
            })
        } else {
            SmallVec::new()
        };

        Self {
            position: pack_vec3_f32(vertex.position),
            normal: fields
                .normal
                .then(|| pack_vec4_f16(vertex.normal.unwrap_or_default())),
            tangent: fields
                .tangent
                .then(|| pack_vec4_f16(vertex.tangent.unwrap_or_default())),
            color: fields
                .color
                .then(|| pack_color_unorm8(vertex.color.unwrap_or_default())),
            uv,
            bone_mapping,
        }
    }

    pub fn encode_all(vertices: &[Vertex], fields: &VertexFields, bones: &[Bone]) -> Vec<Self> {
        vertices
            .iter()
            .map(|vertex| Self::encode(vertex, fields, bones))
            .collect()
    }

    /// Whether these bytes still hold `vertex` in exactly the channels
    /// `fields` declares.
    pub fn describes(&self, vertex: &Vertex, fields: &VertexFields) -> bool {
        let channels_match = self.normal.is_some() == fields.normal
            && self.tangent.is_some() == fields.tangent
            && self.color.is_some() == fields.color
            && self.uv.len() == fields.uv_count.min(MAX_UV_SLOTS)
            && (fields.bone_mapping || self.bone_mapping.is_empty());
        channels_match
            && Vertex {
                shared_vertex: vertex.shared_vertex,
                ..self.to_vertex()
            } == *vertex
    }

    /// The vertex these bytes describe.
    pub fn to_vertex(&self) -> Vertex {
        Vertex {
            position: unpack_vec3_f32(self.position),
            normal: self.normal.map(unpack_vec4_f16),
            tangent: self.tangent.map(unpack_vec4_f16),
            color: self.color.map(unpack_color_unorm8),
            uv: self.uv.iter().copied().map(unpack_vec2_f16).collect(),
            bone_mapping: self
                .bone_mapping
                .iter()
                .map(|&(bone, weight)| (bone, decode_unorm8(weight)))
                .collect(),
            shared_vertex: None,
        }
    }

    pub fn topological_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(12 + self.bone_mapping.len() * 5);
        key.extend_from_slice(&self.position);
        for &(bone, weight) in &self.bone_mapping {
            key.extend_from_slice(&(bone.0 as u32).to_be_bytes());
            key.push(weight);
        }
        key
    }

    pub fn nontopological_key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(24 + self.uv.len() * 4);
        if let Some(normal) = &self.normal {
            key.extend_from_slice(normal);
        }
        if let Some(color) = &self.color {
            key.extend_from_slice(color);
        }
        for uv in &self.uv {
            key.extend_from_slice(uv);
        }
        if let Some(tangent) = &self.tangent {
            key.extend_from_slice(tangent);
        }
        key
    }

    pub fn indistinguishable_key(&self) -> Vec<u8> {
        let mut key = self.topological_key();
        key.extend(self.nontopological_key());
        key
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3, Vec4};

    use super::*;

    fn bones() -> Vec<Bone> {
        ["a", "b"]
            .iter()
            .map(|name| Bone {
                name: name.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn fields() -> VertexFields {
        VertexFields {
            normal: true,
            color: true,
            bone_mapping: true,
            uv_count: 1,
            ..Default::default()
        }
    }

    fn vertex() -> Vertex {
        Vertex {
            position: Vec3::new(1.0, 2.0, 3.0),
            normal: Some(Vec4::new(0.0, 1.0, 0.0, 1.0)),
            color: Some(Vec4::ONE),
            uv: vec![Vec2::new(0.5, 0.25)],
            bone_mapping: vec![(BoneId(1), 1.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_respects_fields() {
        let encoding = VertexEncoding::encode(&vertex(), &VertexFields::default(), &bones());
        assert!(encoding.normal.is_none());
        assert!(encoding.color.is_none());
        assert!(encoding.uv.is_empty());
        assert!(encoding.bone_mapping.is_empty());

        let encoding = VertexEncoding::encode(&vertex(), &fields(), &bones());
        assert_eq!(encoding.color, Some([255; 4]));
        assert_eq!(encoding.bone_mapping.as_slice(), [(BoneId(1), 255)]);
        assert_eq!(encoding.to_vertex().position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(encoding.to_vertex().uv, [Vec2::new(0.5, 0.25)]);
    }

    #[test]
    fn test_aliased_uv_copies_source() {
        let mut fields = fields();
        fields.uv_count = 2;
        fields.set_uv_equal(0, 1);
        let mut vertex = vertex();
        vertex.uv.push(Vec2::new(9.0, 9.0));
        let encoding = VertexEncoding::encode(&vertex, &fields, &bones());
        assert_eq!(encoding.uv[0], encoding.uv[1]);
    }

    #[test]
    fn test_describes_only_unchanged_vertices() {
        let encoding = VertexEncoding::encode(&vertex(), &fields(), &bones());
        let decoded = encoding.to_vertex();
        assert!(encoding.describes(&decoded, &fields()));

        let looped = Vertex {
            shared_vertex: Some(4),
            ..decoded.clone()
        };
        assert!(encoding.describes(&looped, &fields()));

        let mut moved = decoded.clone();
        moved.position = Vec3::new(9.0, 9.0, 9.0);
        assert!(!encoding.describes(&moved, &fields()));

        let mut reweighted = decoded.clone();
        reweighted.bone_mapping = vec![(BoneId(0), 1.0)];
        assert!(!encoding.describes(&reweighted, &fields()));

        let mut without_color = fields();
        without_color.color = false;
        assert!(!encoding.describes(&decoded, &without_color));
    }

    #[test]
    fn test_keys_split_payload() {
        let a = VertexEncoding::encode(&vertex(), &fields(), &bones());
        let mut other = vertex();
        other.uv[0] = Vec2::new(0.75, 0.25);
        let b = VertexEncoding::encode(&other, &fields(), &bones());

        assert_eq!(a.topological_key(), b.topological_key());
        assert_ne!(a.nontopological_key(), b.nontopological_key());
        assert_ne!(a.indistinguishable_key(), b.indistinguishable_key());
        assert!(a.indistinguishable_key().starts_with(&a.topological_key()));
    }

    #[test]
    fn test_bone_identity_in_topological_key() {
        let a = VertexEncoding::encode(&vertex(), &fields(), &bones());
        let mut other = vertex();
        other.bone_mapping = vec![(BoneId(0), 1.0)];
        let b = VertexEncoding::encode(&other, &fields(), &bones());
        assert_ne!(a.topological_key(), b.topological_key());
    }
}
