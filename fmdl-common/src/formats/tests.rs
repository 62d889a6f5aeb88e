use glam::Vec4;

use super::*;
use crate::model::{BoundingBox, VertexFields};

fn assert_size<R: Record>() {
    assert_eq!(
        fmdl_container::entry_size(R::BLOCK),
        Some(R::SIZE),
        "entry size mismatch for block {}",
        R::BLOCK
    );
}

#[test]
fn test_record_sizes_match_container() {
    assert_size::<BoneRecord>();
    assert_size::<MeshGroupRecord>();
    assert_size::<MeshGroupAssignmentRecord>();
    assert_size::<MeshRecord>();
    assert_size::<MaterialInstanceRecord>();
    assert_size::<BoneGroupRecord>();
    assert_size::<TextureRecord>();
    assert_size::<AssignmentRecord>();
    assert_size::<MaterialRecord>();
    assert_size::<MeshFormatAssignmentRecord>();
    assert_size::<MeshFormatRecord>();
    assert_size::<VertexFormatRecord>();
    assert_size::<StringRecord>();
    assert_size::<BoundingBoxRecord>();
    assert_size::<BufferOffsetRecord>();
    assert_size::<LodRecord>();
    assert_size::<FaceIndexRecord>();
    assert_size::<Unknown18Record>();
    assert_size::<Unknown20Record>();
}

#[test]
fn test_serialized_lengths() {
    assert_eq!(BoneGroupRecord { bones: vec![1, 2] }.serialize().len(), 68);
    assert_eq!(Unknown20Record.serialize().len(), 128);
    assert_eq!(
        MeshRecord {
            alpha: 0,
            shadow: 0,
            material_instance: 0,
            bone_group: 0,
            mesh_format_assignment: 0,
            vertex_count: 0,
            first_face_vertex: 0,
            face_vertex_count: 0,
            first_face_index: 0,
        }
        .serialize()
        .len(),
        48
    );
}

#[test]
fn test_mesh_group_layout() {
    let bytes = MeshGroupRecord {
        name: 3,
        invisible: true,
        parent: -1,
    }
    .serialize();
    assert_eq!(bytes, [3, 0, 1, 0, 0xff, 0xff, 0xff, 0xff]);
}

#[test]
fn test_mesh_group_invisible_is_any_nonzero() {
    let record = MeshGroupRecord::deserialize(&[0, 0, 7, 0, 2, 0, 0xff, 0xff]).unwrap();
    assert!(record.invisible);
    assert_eq!(record.parent, 2);
}

#[test]
fn test_bone_group_layout() {
    let bytes = BoneGroupRecord { bones: vec![5, 9] }.serialize();
    assert_eq!(&bytes[..8], [4, 0, 2, 0, 5, 0, 9, 0]);
    assert!(bytes[8..].iter().all(|&b| b == 0));
}

#[test]
fn test_bone_group_count_clamped() {
    let mut bytes = vec![0u8; 68];
    bytes[2] = 40;
    let record = BoneGroupRecord::deserialize(&bytes).unwrap();
    assert_eq!(record.bones.len(), BoneGroupRecord::MAX_BONES);
}

#[test]
fn test_bounding_box_stores_max_first() {
    let record = BoundingBoxRecord(BoundingBox {
        min: Vec4::new(-1.0, -2.0, -3.0, 1.0),
        max: Vec4::new(1.0, 2.0, 3.0, 1.0),
    });
    let bytes = record.serialize();
    assert_eq!(&bytes[..4], 1.0f32.to_le_bytes());
    assert_eq!(&bytes[16..20], (-1.0f32).to_le_bytes());
    assert_eq!(BoundingBoxRecord::deserialize(&bytes), Some(record));
}

#[test]
fn test_short_input_rejected() {
    assert_eq!(MeshRecord::deserialize(&[0; 47]), None);
    assert_eq!(StringRecord::deserialize(&[0; 7]), None);
    assert!(Unknown18Record::deserialize(&[0; 8]).is_some());
}

#[test]
fn test_datum_codes() {
    assert_eq!(DatumType::try_from(14).unwrap(), DatumType::Tangent);
    assert_eq!(DatumType::Uv2.uv_slot(), Some(2));
    assert_eq!(DatumType::Normal.uv_slot(), None);
    assert!(matches!(
        DatumType::try_from(4),
        Err(crate::FormatError::UnknownDatumType(4))
    ));
    assert_eq!(DatumFormat::try_from(9).unwrap(), DatumFormat::QuadInt8);
    assert!(DatumFormat::try_from(2).is_err());
}

#[test]
fn test_position_only_layout() {
    let layout = EmittedLayout::new(&VertexFields::default());
    assert_eq!(layout.position_stride, 12);
    assert_eq!(layout.data_stride, 0);
    assert_eq!(layout.type_counts, [1, 0, 0, 0]);

    let formats = layout.mesh_formats(0, 0);
    assert_eq!(formats.len(), 1);
    assert_eq!(formats[0].stride, 12);
}

#[test]
fn test_full_layout_offsets() {
    let fields = VertexFields {
        normal: true,
        tangent: true,
        color: true,
        bone_mapping: true,
        uv_count: 2,
        ..Default::default()
    };
    let layout = EmittedLayout::new(&fields);
    let offsets: Vec<_> = layout
        .entries
        .iter()
        .map(|entry| (entry.datum, entry.offset))
        .collect();
    assert_eq!(
        offsets,
        [
            (DatumType::Position, 0),
            (DatumType::Normal, 0),
            (DatumType::Tangent, 8),
            (DatumType::Color, 16),
            (DatumType::BoneWeights, 20),
            (DatumType::BoneIndices, 24),
            (DatumType::Uv0, 28),
            (DatumType::Uv1, 32),
        ]
    );
    assert_eq!(layout.data_stride, 36);
    assert_eq!(layout.type_counts, [1, 2, 1, 4]);

    let formats = layout.mesh_formats(48, 96);
    assert_eq!(formats.len(), 4);
    assert!(formats[1..].iter().all(|f| f.buffer == 1 && f.buffer_offset == 96));
    let total: usize = formats.iter().map(|f| usize::from(f.vertex_format_count)).sum();
    assert_eq!(total, layout.vertex_formats.len());
}

#[test]
fn test_aliased_uv_shares_offset() {
    let mut fields = VertexFields {
        uv_count: 3,
        ..Default::default()
    };
    fields.set_uv_equal(0, 2);
    let layout = EmittedLayout::new(&fields);

    assert_eq!(layout.data_stride, 8);
    assert_eq!(layout.entries.len(), 3);
    assert_eq!(layout.vertex_formats.len(), 4);
    let uv2 = layout
        .vertex_formats
        .iter()
        .find(|f| f.datum_type == DatumType::Uv2 as u8)
        .unwrap();
    assert_eq!(uv2.offset, 0);
    assert_eq!(layout.type_counts[3], 3);
}
