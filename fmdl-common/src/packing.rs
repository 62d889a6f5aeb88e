//! Vertex datum packing
//!
//! Converts between f32 model values and the stored vertex formats:
//! - f32 ↔ f16 (IEEE 754 half-float, normals/tangents/UVs)
//! - f32 ↔ unorm8 (colors, bone weights)
//! - bone → weight maps ↔ at most 4 (bone, weight byte) pairs

use glam::{Vec2, Vec3, Vec4};
use half::f16;
use smallvec::SmallVec;

/// Most bones a single vertex may reference
pub const MAX_VERTEX_BONES: usize = 4;

// ============================================================================
// Half-float
// ============================================================================

/// Encode to half precision, rounding to nearest even.
///
/// Values past the f16 range become ±inf; values below the subnormal range
/// flush to ±0. NaN stays NaN.
#[inline]
pub fn encode_f16(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

#[inline]
pub fn decode_f16(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

#[inline]
pub fn pack_vec4_f16(v: Vec4) -> [u8; 8] {
    bytemuck::cast(v.to_array().map(|x| encode_f16(x).to_le()))
}

#[inline]
pub fn unpack_vec4_f16(bytes: [u8; 8]) -> Vec4 {
    let halves: [u16; 4] = bytemuck::cast(bytes);
    Vec4::from_array(halves.map(|bits| decode_f16(u16::from_le(bits))))
}

#[inline]
pub fn pack_vec2_f16(v: Vec2) -> [u8; 4] {
    bytemuck::cast(v.to_array().map(|x| encode_f16(x).to_le()))
}

#[inline]
pub fn unpack_vec2_f16(bytes: [u8; 4]) -> Vec2 {
    let halves: [u16; 2] = bytemuck::cast(bytes);
    Vec2::from_array(halves.map(|bits| decode_f16(u16::from_le(bits))))
}

// ============================================================================
// Float32 positions
// ============================================================================

#[inline]
pub fn pack_vec3_f32(v: Vec3) -> [u8; 12] {
    bytemuck::cast(v.to_array().map(|x| x.to_bits().to_le()))
}

#[inline]
pub fn unpack_vec3_f32(bytes: [u8; 12]) -> Vec3 {
    let words: [u32; 3] = bytemuck::cast(bytes);
    Vec3::from_array(words.map(|bits| f32::from_bits(u32::from_le(bits))))
}

// ============================================================================
// Unorm8
// ============================================================================

/// Encode a [0, 1] value as `round(x * 255)`, saturating outside the range.
#[inline]
pub fn encode_unorm8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

#[inline]
pub fn decode_unorm8(byte: u8) -> f32 {
    byte as f32 / 255.0
}

#[inline]
pub fn pack_color_unorm8(color: Vec4) -> [u8; 4] {
    color.to_array().map(encode_unorm8)
}

#[inline]
pub fn unpack_color_unorm8(bytes: [u8; 4]) -> Vec4 {
    Vec4::from_array(bytes.map(decode_unorm8))
}

// ============================================================================
// Bone Weights
// ============================================================================

/// Quantize a bone → weight map to at most 4 (bone, weight byte) pairs.
///
/// Bones are ranked by (weight, name) descending and the top 4 kept. The
/// integral total `round(total * 255)` is spread over the kept bones in
/// proportion to their weight; the last kept bone takes whatever remains, so
/// the bytes sum to the rounded total of *all* source weights. Zero bytes are
/// dropped.
pub fn quantize_bone_weights<'a, B: Copy>(
    mapping: &[(B, f32)],
    name_of: impl Fn(B) -> &'a str,
) -> SmallVec<[(B, u8); MAX_VERTEX_BONES]> {
    let mut ordered: SmallVec<[(B, f64, &str); 8]> = mapping
        .iter()
        .map(|&(bone, weight)| (bone, f64::from(weight), name_of(bone)))
        .collect();
    ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.2.cmp(a.2)));

    if ordered.len() > MAX_VERTEX_BONES {
        tracing::warn!(
            bones = ordered.len(),
            "vertex weighted to more than {MAX_VERTEX_BONES} bones, keeping the heaviest"
        );
    }

    let total: f64 = ordered.iter().map(|entry| entry.1).sum();
    let mut remaining_integral = (total * 255.0).round() as i64;

    let selected = &ordered[..ordered.len().min(MAX_VERTEX_BONES)];
    let mut remaining_selected: f64 = selected.iter().map(|entry| entry.1).sum();

    let mut packed = SmallVec::new();
    for (i, &(bone, weight, _)) in selected.iter().enumerate() {
        let byte = if i + 1 == selected.len() {
            remaining_integral.clamp(0, 255)
        } else if remaining_selected <= 0.0 {
            0
        } else {
            let share = ((weight / remaining_selected) * remaining_integral as f64).round() as i64;
            let share = share.clamp(0, 255);
            remaining_integral -= share;
            remaining_selected -= weight;
            share
        };
        if byte > 0 {
            packed.push((bone, byte as u8));
        }
    }
    packed
}
