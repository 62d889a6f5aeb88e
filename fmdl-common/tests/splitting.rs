//! Mesh splitting through the encode/decode pipeline.

use glam::Vec3;

use fmdl_common::splitting::SPLIT_MESH_GROUP_NAME;
use fmdl_common::{
    Bone, BoneId, DecodeOptions, EncodeOptions, Face, MaterialInstance, Mesh, MeshGroup,
    MeshGroupMarker, MeshId, Model, SplitLimits, Vertex, VertexFields, decode, decode_with, encode,
};

fn model_with(mesh: Mesh, bones: Vec<Bone>) -> Model {
    Model {
        bones,
        materials: vec![MaterialInstance {
            name: "mat".into(),
            shader: "fox3ddf_blin".into(),
            technique: "fox3DDF_Blin".into(),
            ..Default::default()
        }],
        meshes: vec![mesh],
        mesh_groups: vec![MeshGroup {
            name: "body".into(),
            meshes: vec![MeshId(0)],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn line_of_vertices(count: usize) -> Mesh {
    Mesh {
        vertices: (0..count)
            .map(|i| Vertex::at(Vec3::new(i as f32, 0.0, 0.0)))
            .collect(),
        ..Default::default()
    }
}

fn sorted_positions(mesh: &Mesh) -> Vec<[u32; 3]> {
    let mut positions: Vec<_> = mesh
        .vertices
        .iter()
        .map(|v| v.position.to_array().map(f32::to_bits))
        .collect();
    positions.sort_unstable();
    positions
}

fn sorted_faces(mesh: &Mesh) -> Vec<[[u32; 3]; 3]> {
    let mut faces: Vec<_> = mesh
        .faces
        .iter()
        .map(|face| face.0.map(|v| mesh.vertices[v].position.to_array().map(f32::to_bits)))
        .collect();
    faces.sort_unstable();
    faces
}

#[test]
fn test_65536_vertices_split_and_rejoined() {
    let model = model_with(line_of_vertices(65536), Vec::new());
    let bytes = encode(&model, &EncodeOptions::default()).expect("encode failed");

    let raw = decode_with(
        &bytes,
        &DecodeOptions {
            mesh_splitting: false,
            ..Default::default()
        },
    )
    .expect("decode failed");
    assert!(raw.meshes.len() >= 2);
    assert!(raw.meshes.iter().all(|m| m.vertices.len() <= 65535));
    let split_group = raw
        .mesh_groups
        .iter()
        .find(|g| g.has_marker(MeshGroupMarker::SplitMeshGroup))
        .expect("no split mesh group");
    assert_eq!(split_group.name, SPLIT_MESH_GROUP_NAME);
    assert_eq!(split_group.meshes.len(), raw.meshes.len());
    assert!(raw.extension_headers.has_extension("mesh-splitting"));

    let decoded = decode(&bytes).expect("decode failed");
    assert_eq!(decoded.meshes.len(), 1);
    assert_eq!(decoded.meshes[0].vertices.len(), 65536);
    assert_eq!(sorted_positions(&decoded.meshes[0]), sorted_positions(&model.meshes[0]));
    assert_eq!(decoded.mesh_groups.len(), 1);
    assert_eq!(decoded.mesh_groups[0].meshes, [MeshId(0)]);
    assert!(decoded.extension_headers.is_empty());
}

#[test]
fn test_oversized_mesh_rejected_without_splitting() {
    let model = model_with(line_of_vertices(65536), Vec::new());
    let options = EncodeOptions {
        mesh_splitting: false,
        ..Default::default()
    };
    let err = encode(&model, &options).unwrap_err();
    assert!(err.messages().iter().any(|m| m.contains("65536 vertices")));
}

#[test]
fn test_skinned_mesh_over_bone_limit() {
    let bones: Vec<Bone> = (0..40)
        .map(|i| Bone {
            name: format!("sk_extra_{i}"),
            parent: (i > 0 && i % 4 != 0).then(|| BoneId(i - 1)),
            ..Default::default()
        })
        .collect();
    let mut mesh = Mesh {
        bone_group: (0..40).map(BoneId).collect(),
        vertex_fields: VertexFields {
            bone_mapping: true,
            ..Default::default()
        },
        ..Default::default()
    };
    for bone in 0..40 {
        let first = mesh.vertices.len();
        for offset in [Vec3::ZERO, Vec3::Y, Vec3::Z] {
            mesh.vertices.push(Vertex {
                position: Vec3::new(bone as f32, 0.0, 0.0) + offset,
                bone_mapping: vec![(BoneId(bone), 1.0)],
                ..Default::default()
            });
        }
        mesh.faces.push(Face([first, first + 1, first + 2]));
    }
    let model = model_with(mesh, bones);

    let bytes = encode(&model, &EncodeOptions::default()).expect("encode failed");
    let raw = decode_with(
        &bytes,
        &DecodeOptions {
            mesh_splitting: false,
            ..Default::default()
        },
    )
    .unwrap();
    for mesh in &raw.meshes {
        assert!(mesh.bone_group.len() <= SplitLimits::SOFT.bones);
        assert!(mesh.faces.len() <= SplitLimits::HARD.faces);
    }

    let decoded = decode(&bytes).unwrap();
    let joined = &decoded.meshes[0];
    assert_eq!(joined.vertices.len(), 120);
    assert_eq!(joined.bone_group, (0..40).map(BoneId).collect::<Vec<_>>());
    assert_eq!(sorted_faces(joined), sorted_faces(&model.meshes[0]));
}
