//! Export validation
//!
//! Runs every check before anything is written so one pass reports all
//! problems in the model.

use crate::error::ExportError;
use crate::model::{Model, Vertex};
use crate::splitting::SplitLimits;

/// Every reason `model` cannot be written, one message each.
pub fn validation_errors(model: &Model) -> Vec<String> {
    let mut errors = Vec::new();
    let limits = SplitLimits::HARD;

    for (index, bone) in model.bones.iter().enumerate() {
        if let Some(parent) = bone.parent
            && parent.0 >= model.bones.len()
        {
            errors.push(format!("bone '{}' has invalid parent {}", bone.name, parent.0));
        }
        if has_cycle(index, model.bones.len(), |i| model.bones.get(i).and_then(|b| b.parent).map(|p| p.0)) {
            errors.push(format!("bone '{}' is its own ancestor", bone.name));
        }
    }

    for material in &model.materials {
        for (what, count) in [
            ("textures", material.textures.len()),
            ("parameters", material.parameters.len()),
        ] {
            if count > usize::from(u8::MAX) {
                errors.push(format!(
                    "material instance '{}' has {count} {what} (max {})",
                    material.name,
                    u8::MAX
                ));
            }
        }
    }

    for (index, mesh) in model.meshes.iter().enumerate() {
        let fields = &mesh.vertex_fields;
        if mesh.vertices.len() > limits.vertices {
            errors.push(format!(
                "mesh {index} has {} vertices (max {})",
                mesh.vertices.len(),
                limits.vertices
            ));
        }
        if mesh.faces.len() > limits.faces {
            errors.push(format!(
                "mesh {index} has {} faces (max {})",
                mesh.faces.len(),
                limits.faces
            ));
        }
        if mesh.bone_group.len() > limits.bones {
            errors.push(format!(
                "mesh {index} references {} bones (max {})",
                mesh.bone_group.len(),
                limits.bones
            ));
        }
        if mesh.material.0 >= model.materials.len() {
            errors.push(format!("mesh {index} has no material instance"));
        }
        if let Some(bone) = mesh.bone_group.iter().find(|b| b.0 >= model.bones.len()) {
            errors.push(format!("mesh {index} bone group references missing bone {}", bone.0));
        }
        if let Some(face) = mesh
            .faces
            .iter()
            .find(|face| face.0.iter().any(|&v| v >= mesh.vertices.len()))
        {
            errors.push(format!("mesh {index} has a face referencing missing vertices {:?}", face.0));
        }

        let missing = |present: fn(&Vertex) -> bool| !mesh.vertices.iter().all(present);
        if fields.normal && missing(|v| v.normal.is_some()) {
            errors.push(format!("mesh {index} declares normals but a vertex has none"));
        }
        if fields.tangent && missing(|v| v.tangent.is_some()) {
            errors.push(format!("mesh {index} declares tangents but a vertex has none"));
        }
        if fields.color && missing(|v| v.color.is_some()) {
            errors.push(format!("mesh {index} declares vertex colors but a vertex has none"));
        }
        if let Some(vertex) = mesh.vertices.iter().position(|v| v.uv.len() < fields.uv_count) {
            errors.push(format!(
                "mesh {index} vertex {vertex} has fewer than {} UV coordinates",
                fields.uv_count
            ));
        }
        if fields.bone_mapping {
            let stray = mesh.vertices.iter().enumerate().find_map(|(v, vertex)| {
                vertex
                    .bone_mapping
                    .iter()
                    .find(|(bone, weight)| *weight > 0.0 && !mesh.bone_group.contains(bone))
                    .map(|(bone, _)| (v, *bone))
            });
            if let Some((vertex, bone)) = stray {
                errors.push(format!(
                    "mesh {index} vertex {vertex} is weighted to bone '{}' outside its bone group",
                    model.bone_name(bone)
                ));
            }
        }
    }

    let mut owners = vec![0usize; model.meshes.len()];
    for (index, group) in model.mesh_groups.iter().enumerate() {
        if let Some(parent) = group.parent
            && parent.0 >= model.mesh_groups.len()
        {
            errors.push(format!("mesh group '{}' has invalid parent {}", group.name, parent.0));
        }
        if has_cycle(index, model.mesh_groups.len(), |i| {
            model.mesh_groups.get(i).and_then(|g| g.parent).map(|p| p.0)
        }) {
            errors.push(format!("mesh group '{}' is its own ancestor", group.name));
        }
        for mesh in &group.meshes {
            match owners.get_mut(mesh.0) {
                Some(count) => *count += 1,
                None => errors.push(format!(
                    "mesh group '{}' contains missing mesh {}",
                    group.name, mesh.0
                )),
            }
        }
    }
    for (mesh, &count) in owners.iter().enumerate() {
        match count {
            0 => errors.push(format!("mesh {mesh} is not in any mesh group")),
            1 => {}
            n => errors.push(format!("mesh {mesh} is in {n} mesh groups")),
        }
    }

    errors
}

/// Fail with every validation message at once.
pub fn validate(model: &Model) -> Result<(), ExportError> {
    let errors = validation_errors(model);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ExportError::Validation { errors })
    }
}

/// Whether walking parents from `start` ever returns to `start`.
///
/// Nodes that only lead into a loop are not part of it and report false.
fn has_cycle(start: usize, len: usize, parent: impl Fn(usize) -> Option<usize>) -> bool {
    let mut current = parent(start);
    for _ in 0..len {
        match current {
            Some(node) if node == start => return true,
            Some(node) => current = parent(node),
            None => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::model::{
        Bone, BoneId, Face, MaterialInstance, Mesh, MeshGroup, MeshGroupId, MeshId, VertexFields,
    };

    fn valid_model() -> Model {
        Model {
            materials: vec![MaterialInstance::default()],
            meshes: vec![Mesh {
                vertices: vec![Vertex::at(Vec3::ZERO), Vertex::at(Vec3::X), Vertex::at(Vec3::Y)],
                faces: vec![Face([0, 1, 2])],
                ..Default::default()
            }],
            mesh_groups: vec![MeshGroup {
                meshes: vec![MeshId(0)],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_model_passes() {
        assert!(validate(&valid_model()).is_ok());
    }

    #[test]
    fn test_errors_are_aggregated() {
        let mut model = valid_model();
        model.meshes[0].vertex_fields = VertexFields {
            normal: true,
            uv_count: 1,
            ..Default::default()
        };
        model.meshes[0].vertices = vec![Vertex::default(); 65536];
        model.mesh_groups.push(MeshGroup {
            meshes: vec![MeshId(0)],
            ..Default::default()
        });

        let errors = validation_errors(&model);
        assert_eq!(errors.len(), 4, "{errors:#?}");
        assert!(errors[0].contains("65536 vertices"));
        assert!(errors.iter().any(|e| e.contains("declares normals")));
        assert!(errors.iter().any(|e| e.contains("UV")));
        assert!(errors.iter().any(|e| e.contains("in 2 mesh groups")));

        let err = validate(&model).unwrap_err();
        assert_eq!(err.messages().len(), 4);
    }

    #[test]
    fn test_parent_cycles_reported() {
        let mut model = valid_model();
        model.bones = vec![
            Bone {
                name: "a".into(),
                parent: Some(BoneId(1)),
                ..Default::default()
            },
            Bone {
                name: "b".into(),
                parent: Some(BoneId(0)),
                ..Default::default()
            },
        ];
        model.mesh_groups[0].parent = Some(MeshGroupId(0));

        let errors = validation_errors(&model);
        assert!(errors.contains(&"bone 'a' is its own ancestor".to_string()));
        assert!(errors.contains(&"bone 'b' is its own ancestor".to_string()));
        assert!(errors.contains(&"mesh group '' is its own ancestor".to_string()));
    }

    #[test]
    fn test_material_lists_limited_to_255() {
        let mut model = valid_model();
        model.materials[0].name = "kit".into();
        model.materials[0].textures = vec![Default::default(); 255];
        model.materials[0].parameters = vec![Default::default(); 255];
        assert!(validate(&model).is_ok());

        model.materials[0].textures.push(Default::default());
        model.materials[0].parameters = vec![Default::default(); 300];
        let errors = validation_errors(&model);
        assert_eq!(
            errors,
            [
                "material instance 'kit' has 256 textures (max 255)",
                "material instance 'kit' has 300 parameters (max 255)",
            ]
        );
    }

    #[test]
    fn test_unassigned_mesh_and_stray_bone() {
        let mut model = valid_model();
        model.mesh_groups[0].meshes.clear();
        model.bones = vec![Bone::default()];
        model.meshes[0].vertex_fields.bone_mapping = true;
        model.meshes[0].vertices[0].bone_mapping = vec![(BoneId(0), 1.0)];

        let errors = validation_errors(&model);
        assert!(errors.iter().any(|e| e.contains("not in any mesh group")));
        assert!(errors.iter().any(|e| e.contains("outside its bone group")));
    }
}
