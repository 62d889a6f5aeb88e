use glam::{Vec2, Vec3};

use super::*;
use crate::model::{Bone, BoneId, Face, Vertex, VertexFields};

fn single_mesh_model(mesh: Mesh) -> Model {
    Model {
        meshes: vec![mesh],
        mesh_groups: vec![MeshGroup {
            name: "body".into(),
            meshes: vec![MeshId(0)],
            ..Default::default()
        }],
        ..Default::default()
    }
}

fn root_bone(name: &str) -> Bone {
    Bone {
        name: name.into(),
        ..Default::default()
    }
}

fn child_bone(name: &str, parent: usize) -> Bone {
    Bone {
        name: name.into(),
        parent: Some(BoneId(parent)),
        ..Default::default()
    }
}

/// One triangle per bone, fully weighted to that bone
fn triangle_per_bone(bones: usize) -> Mesh {
    let mut mesh = Mesh {
        bone_group: (0..bones).map(BoneId).collect(),
        vertex_fields: VertexFields {
            bone_mapping: true,
            ..Default::default()
        },
        ..Default::default()
    };
    for bone in 0..bones {
        let base = Vec3::new(bone as f32, 0.0, 0.0);
        let first = mesh.vertices.len();
        for offset in [Vec3::ZERO, Vec3::Y, Vec3::Z] {
            mesh.vertices.push(Vertex {
                position: base + offset,
                bone_mapping: vec![(BoneId(bone), 1.0)],
                ..Default::default()
            });
        }
        mesh.faces.push(Face([first, first + 1, first + 2]));
    }
    mesh
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

#[test]
fn test_limits() {
    let mut mesh = Mesh {
        vertices: vec![Vertex::default(); 65535],
        ..Default::default()
    };
    assert!(!needs_splitting(&mesh));
    mesh.vertices.push(Vertex::default());
    assert!(needs_splitting(&mesh));

    let mesh = Mesh {
        bone_group: (0..33).map(BoneId).collect(),
        ..Default::default()
    };
    assert!(needs_splitting(&mesh));
    assert!(SplitLimits::SOFT.vertices < SplitLimits::HARD.vertices);
}

#[test]
fn test_small_mesh_untouched() {
    let mut model = single_mesh_model(triangle_per_bone(2));
    let before = model.clone();
    split_meshes(&mut model, &SkeletonMetadata::pes()).unwrap();
    assert_eq!(model, before);
}

#[test]
fn test_split_65536_vertices() {
    let vertices = (0..65536)
        .map(|i| Vertex::at(Vec3::new(i as f32, 0.0, 0.0)))
        .collect();
    let mut model = single_mesh_model(Mesh {
        vertices,
        ..Default::default()
    });
    let original = model.meshes[0].clone();

    split_meshes(&mut model, &SkeletonMetadata::pes()).unwrap();
    assert!(model.meshes.len() >= 2);
    assert!(model.meshes.iter().all(|m| m.vertices.len() <= 65535));
    assert_eq!(model.meshes.iter().map(|m| m.vertices.len()).sum::<usize>(), 65536);
    assert_eq!(model.mesh_groups.len(), 2);
    assert!(model.mesh_groups[0].meshes.is_empty());
    let split_group = &model.mesh_groups[1];
    assert_eq!(split_group.name, SPLIT_MESH_GROUP_NAME);
    assert_eq!(split_group.parent, Some(MeshGroupId(0)));
    assert!(split_group.has_marker(MeshGroupMarker::SplitMeshGroup));
    assert_eq!(split_group.meshes.len(), model.meshes.len());
    assert!(model.extension_headers.has_extension("mesh-splitting"));

    rejoin_split_meshes(&mut model);
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.mesh_groups.len(), 1);
    assert_eq!(model.mesh_groups[0].meshes, [MeshId(0)]);
    assert_eq!(model.meshes[0].vertices.len(), 65536);
    assert_eq!(sorted_positions(&model.meshes[0]), sorted_positions(&original));
    assert!(!model.extension_headers.has_extension("mesh-splitting"));
}

#[test]
fn test_split_by_face_count_shares_vertices() {
    let mut model = single_mesh_model(Mesh {
        vertices: vec![Vertex::at(Vec3::ZERO), Vertex::at(Vec3::X), Vertex::at(Vec3::Y)],
        faces: vec![Face([0, 1, 2]); 21846],
        ..Default::default()
    });

    split_meshes(&mut model, &SkeletonMetadata::default()).unwrap();
    assert_eq!(model.meshes.len(), 2);
    assert_eq!(model.meshes[0].faces.len(), 20000);
    assert_eq!(model.meshes[1].faces.len(), 1846);
    assert!(model.meshes.iter().all(|m| m.vertices.len() == 3));

    rejoin_split_meshes(&mut model);
    assert_eq!(model.meshes[0].vertices.len(), 3);
    assert_eq!(model.meshes[0].faces.len(), 21846);
}

#[test]
fn test_split_40_bones() {
    let mut model = single_mesh_model(triangle_per_bone(40));
    model.bones = (0..40).map(|i| root_bone(&format!("bone{i}"))).collect();

    split_meshes(&mut model, &SkeletonMetadata::pes()).unwrap();
    assert!(model.meshes.len() >= 2);
    for mesh in &model.meshes {
        assert!(mesh.bone_group.len() <= SplitLimits::SOFT.bones);
        for vertex in &mesh.vertices {
            for (bone, _) in &vertex.bone_mapping {
                assert!(mesh.bone_group.contains(bone));
            }
        }
    }
    assert_eq!(model.meshes.iter().map(|m| m.faces.len()).sum::<usize>(), 40);

    rejoin_split_meshes(&mut model);
    let joined = &model.meshes[0];
    assert_eq!(joined.faces.len(), 40);
    assert_eq!(joined.vertices.len(), 120);
    assert_eq!(joined.bone_group, (0..40).map(BoneId).collect::<Vec<_>>());
}

#[test]
fn test_extremity_bones_split_first() {
    let mut model = single_mesh_model(triangle_per_bone(33));
    model.bones = (0..33).map(|i| root_bone(&format!("bone{i}"))).collect();
    model.bones[5].name = "sk_hand_r".into();

    split_meshes(&mut model, &SkeletonMetadata::pes()).unwrap();
    assert_eq!(model.meshes[0].bone_group, [BoneId(5)]);
    assert_eq!(model.meshes[1].bone_group, [BoneId(0)]);
}

#[test]
fn test_region_grows_to_ancestors() {
    // A 3-bone arm and 32 unrelated bones: the arm is selected as one region.
    let mut bones = vec![
        root_bone("sk_upperarm_l"),
        child_bone("sk_forearm_l", 0),
        child_bone("sk_hand_l", 1),
    ];
    bones.extend((0..32).map(|i| root_bone(&format!("extra{i}"))));
    let mut model = single_mesh_model(triangle_per_bone(35));
    model.bones = bones;

    split_meshes(&mut model, &SkeletonMetadata::pes()).unwrap();
    assert_eq!(model.meshes[0].bone_group, [BoneId(0), BoneId(1), BoneId(2)]);
    assert_eq!(model.meshes[0].faces.len(), 3);
}

#[test]
fn test_unsplittable_class_stalls() {
    // Every vertex shares one position, so all of them form one class that
    // can never fit in a submesh.
    let vertices = (0..65536)
        .map(|i| Vertex {
            uv: vec![Vec2::new(i as f32, 0.0)],
            ..Default::default()
        })
        .collect();
    let mut model = single_mesh_model(Mesh {
        vertices,
        vertex_fields: VertexFields {
            uv_count: 1,
            ..Default::default()
        },
        ..Default::default()
    });
    let err = split_meshes(&mut model, &SkeletonMetadata::default()).unwrap_err();
    assert_eq!(
        err,
        InternalFault::SplitStalled {
            mesh: 0,
            faces: 0,
            loose: 1
        }
    );
}

#[test]
fn test_effective_parents_follow_render_parents() {
    let bones = vec![
        root_bone("dsk_hip"),
        root_bone("sk_belly"),
        child_bone("sk_chest", 1),
        root_bone("sk_hand_l"),
        root_bone("unknown"),
    ];
    let parents = SkeletonMetadata::pes().effective_parents(&bones);
    // The hip/belly/chest chain is inverted around the chest.
    assert_eq!(parents[2], None);
    assert_eq!(parents[1], Some(BoneId(2)));
    assert_eq!(parents[0], Some(BoneId(1)));
    // Missing forearm, upper arm and shoulder are skipped.
    assert_eq!(parents[3], Some(BoneId(2)));
    assert_eq!(parents[4], None);
}

#[test]
fn test_effective_parents_drop_loops() {
    let bones = vec![child_bone("a", 1), child_bone("b", 0)];
    let parents = SkeletonMetadata::default().effective_parents(&bones);
    assert_eq!(parents, [Some(BoneId(1)), None]);
}

#[test]
fn test_effective_parents_keep_forward_parents() {
    // Children listed before their parents, no loop anywhere.
    let bones = vec![
        child_bone("finger", 1),
        child_bone("hand", 2),
        child_bone("arm", 3),
        root_bone("root"),
        child_bone("other", 3),
    ];
    let parents = SkeletonMetadata::default().effective_parents(&bones);
    assert_eq!(
        parents,
        [
            Some(BoneId(1)),
            Some(BoneId(2)),
            Some(BoneId(3)),
            None,
            Some(BoneId(3)),
        ]
    );
}

#[test]
fn test_effective_parents_drop_only_the_closing_edge() {
    let bones = vec![child_bone("a", 2), child_bone("b", 0), child_bone("c", 1)];
    let parents = SkeletonMetadata::default().effective_parents(&bones);
    assert_eq!(parents, [Some(BoneId(2)), Some(BoneId(0)), None]);
}

#[test]
fn test_partial_chain_not_inverted() {
    let bones = vec![root_bone("dsk_hip"), root_bone("sk_chest")];
    let metadata = SkeletonMetadata::new(Vec::<String>::new());
    let parents = metadata.effective_parents(&bones);
    assert_eq!(parents, [None, None]);
}

#[test]
fn test_combine_merges_loop_ids() {
    let shared = |position: Vec3, id: u32| Vertex {
        shared_vertex: Some(id),
        ..Vertex::at(position)
    };
    let first = Mesh {
        vertices: vec![shared(Vec3::ZERO, 0), shared(Vec3::X, 1), shared(Vec3::Y, 2)],
        faces: vec![Face([0, 1, 2])],
        ..Default::default()
    };
    let second = Mesh {
        vertices: vec![shared(Vec3::Y, 0), shared(Vec3::X, 1), shared(Vec3::Z, 2)],
        faces: vec![Face([1, 0, 2])],
        ..Default::default()
    };

    let joined = rejoin::combine_submeshes(&[first, second], &[]);
    assert_eq!(joined.vertices.len(), 4);
    assert_eq!(joined.faces, [Face([0, 1, 2]), Face([1, 2, 3])]);
    let ids: Vec<_> = joined.vertices.iter().map(|v| v.shared_vertex).collect();
    assert_eq!(ids, [Some(0), Some(1), Some(2), Some(3)]);
}
