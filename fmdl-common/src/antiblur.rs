//! Anti-blur companion meshes
//!
//! The game blurs some meshes in motion unless a translucent "fuzz block"
//! copy of the mesh is drawn alongside. Meshes marked
//! [`MeshMarker::HasAntiblur`] get such a companion generated on encode;
//! decode removes the companions again.

use std::collections::BTreeSet;

use glam::Vec4;

use crate::extensions::{MeshMarker, extension};
use crate::model::{MaterialId, MaterialInstance, Mesh, MeshId, Model, Texture};

const FUZZBLOCK: (&str, &str) = ("fox3ddf_blin_fuzzblock", "fox3DDF_Blin_Fuzzblock");
const FUZZBLOCK_UVSCROLL: (&str, &str) = (
    "fox3ddf_blin_fuzzblock_uvscroll",
    "fox3DDF_Blin_Fuzzblock_UVScroll",
);
const UVSCROLL_PARAMETERS: [&str; 3] = ["UV0_Speed_U", "UV0_Speed_V", "Offset"];
const DUMMY_TEXTURE_DIRECTORY: &str = "/Assets/pes16/model/character/common/sourceimages/";

fn dummy_texture(filename: &str) -> Texture {
    Texture {
        directory: DUMMY_TEXTURE_DIRECTORY.to_string(),
        filename: filename.to_string(),
    }
}

/// The fuzz-block material drawn over meshes using `source`.
pub fn antiblur_material(source: &MaterialInstance) -> MaterialInstance {
    let uvscroll = source.parameter("UV0_Speed_U").is_some()
        && source.parameter("UV0_Speed_V").is_some();
    let (shader, technique) = if uvscroll { FUZZBLOCK_UVSCROLL } else { FUZZBLOCK };

    let mut parameters = vec![("MatParamIndex_0".to_string(), Vec4::ZERO)];
    if uvscroll {
        parameters.extend(
            source
                .parameters
                .iter()
                .filter(|(name, _)| UVSCROLL_PARAMETERS.contains(&name.as_str()))
                .cloned(),
        );
    }

    let base = source
        .texture("Base_Tex_SRGB")
        .or_else(|| {
            source
                .textures
                .iter()
                .find(|(role, _)| role.to_lowercase().contains("base"))
                .map(|(_, texture)| texture)
        })
        .or_else(|| source.textures.first().map(|(_, texture)| texture));
    let mut textures: Vec<(String, Texture)> = base
        .map(|texture| ("Base_Tex_SRGB".to_string(), texture.clone()))
        .into_iter()
        .collect();
    textures.push(("NormalMap_Tex_NRM".to_string(), dummy_texture("dummy_nrm.ftex")));
    textures.push(("SpecularMap_Tex_LIN".to_string(), dummy_texture("dummy_srm.ftex")));

    MaterialInstance {
        name: format!("{}_antiblur", source.name),
        shader: shader.to_string(),
        technique: technique.to_string(),
        textures,
        parameters,
    }
}

/// Generate a companion mesh after every mesh marked `HasAntiblur`, in the
/// same mesh group.
pub fn encode_antiblur(model: &mut Model) {
    let mut meshes = Vec::with_capacity(model.meshes.len());
    let mut new_ids: Vec<Vec<MeshId>> = Vec::with_capacity(model.meshes.len());
    let mut generated: Vec<(MaterialInstance, MaterialId)> = Vec::new();

    for mesh in std::mem::take(&mut model.meshes) {
        let mut ids = vec![MeshId(meshes.len())];
        let companion = mesh.has_marker(MeshMarker::HasAntiblur).then(|| {
            let material = model
                .materials
                .get(mesh.material.0)
                .map(antiblur_material)
                .unwrap_or_else(|| antiblur_material(&MaterialInstance::default()));
            let material = match generated.iter().find(|(m, _)| *m == material) {
                Some((_, id)) => *id,
                None => {
                    let id = MaterialId(model.materials.len());
                    model.materials.push(material.clone());
                    generated.push((material, id));
                    id
                }
            };
            let mut markers = mesh.markers.clone();
            markers.remove(&MeshMarker::HasAntiblur);
            markers.insert(MeshMarker::IsAntiblur);
            Mesh {
                material,
                alpha: 128 | (mesh.alpha & 32),
                shadow: 1,
                markers,
                ..mesh.clone()
            }
        });
        meshes.push(mesh);
        if let Some(companion) = companion {
            ids.push(MeshId(meshes.len()));
            meshes.push(companion);
        }
        new_ids.push(ids);
    }

    let added = meshes.len() - new_ids.len();
    model.replace_meshes(meshes, |old| new_ids.get(old.0).cloned().unwrap_or_default());
    if added > 0 {
        tracing::debug!(meshes = added, "generated anti-blur meshes");
        model.extension_headers.add_extension(extension::ANTIBLUR);
    }
}

/// Remove generated companion meshes and the materials only they used.
pub fn decode_antiblur(model: &mut Model) {
    if !model.extension_headers.has_extension(extension::ANTIBLUR) {
        return;
    }

    let mut freed = BTreeSet::new();
    let mut meshes = Vec::with_capacity(model.meshes.len());
    let mut new_ids = Vec::with_capacity(model.meshes.len());
    for mesh in std::mem::take(&mut model.meshes) {
        if mesh.has_marker(MeshMarker::IsAntiblur) {
            freed.insert(mesh.material);
            new_ids.push(None);
        } else {
            new_ids.push(Some(MeshId(meshes.len())));
            meshes.push(mesh);
        }
    }
    model.replace_meshes(meshes, |old| {
        new_ids.get(old.0).copied().flatten().into_iter().collect()
    });
    model.remove_unused_materials(&freed);
    model.extension_headers.remove_extension(extension::ANTIBLUR);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MeshGroup;

    fn textured(role: &str, filename: &str) -> (String, Texture) {
        (
            role.to_string(),
            Texture {
                directory: "/tex/".into(),
                filename: filename.into(),
            },
        )
    }

    fn model_with_marked_meshes() -> Model {
        let marked = |material| Mesh {
            material: MaterialId(material),
            alpha: 32 | 1,
            markers: BTreeSet::from([MeshMarker::HasAntiblur]),
            ..Default::default()
        };
        Model {
            materials: vec![MaterialInstance {
                name: "kit".into(),
                textures: vec![textured("Base_Tex_SRGB", "kit_bsm.ftex")],
                ..Default::default()
            }],
            meshes: vec![marked(0), Mesh::default(), marked(0)],
            mesh_groups: vec![
                MeshGroup {
                    meshes: vec![MeshId(0), MeshId(1)],
                    ..Default::default()
                },
                MeshGroup {
                    meshes: vec![MeshId(2)],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_companions_follow_their_source() {
        let mut model = model_with_marked_meshes();
        encode_antiblur(&mut model);

        assert_eq!(model.meshes.len(), 5);
        assert!(model.meshes[1].has_marker(MeshMarker::IsAntiblur));
        assert!(!model.meshes[1].has_marker(MeshMarker::HasAntiblur));
        assert!(model.meshes[4].has_marker(MeshMarker::IsAntiblur));
        assert_eq!(model.meshes[1].alpha, 160);
        assert_eq!(model.meshes[1].shadow, 1);
        assert_eq!(model.mesh_groups[0].meshes, [MeshId(0), MeshId(1), MeshId(2)]);
        assert_eq!(model.mesh_groups[1].meshes, [MeshId(3), MeshId(4)]);

        // Both companions share one generated material.
        assert_eq!(model.materials.len(), 2);
        assert_eq!(model.meshes[1].material, MaterialId(1));
        assert_eq!(model.meshes[4].material, MaterialId(1));
        assert_eq!(model.materials[1].name, "kit_antiblur");
        assert!(model.extension_headers.has_extension("antiblur"));
    }

    #[test]
    fn test_decode_restores_model() {
        let original = model_with_marked_meshes();
        let mut model = original.clone();
        encode_antiblur(&mut model);
        decode_antiblur(&mut model);
        assert_eq!(model, original);
    }

    #[test]
    fn test_unmarked_model_unchanged() {
        let mut model = Model {
            meshes: vec![Mesh::default()],
            ..Default::default()
        };
        let before = model.clone();
        encode_antiblur(&mut model);
        assert_eq!(model, before);
        decode_antiblur(&mut model);
        assert_eq!(model, before);
    }

    #[test]
    fn test_material_selection() {
        let source = MaterialInstance {
            name: "hair".into(),
            textures: vec![
                textured("NormalMap_Tex_NRM", "hair_nrm.ftex"),
                textured("Layer_BaseTex", "hair_bsm.ftex"),
            ],
            parameters: vec![
                ("UV0_Speed_U".into(), Vec4::X),
                ("UV0_Speed_V".into(), Vec4::Y),
                ("Offset".into(), Vec4::Z),
                ("Other".into(), Vec4::W),
            ],
            ..Default::default()
        };
        let material = antiblur_material(&source);
        assert_eq!(material.shader, "fox3ddf_blin_fuzzblock_uvscroll");
        assert_eq!(material.technique, "fox3DDF_Blin_Fuzzblock_UVScroll");
        assert_eq!(material.texture("Base_Tex_SRGB").unwrap().filename, "hair_bsm.ftex");
        assert_eq!(
            material.texture("SpecularMap_Tex_LIN").unwrap().filename,
            "dummy_srm.ftex"
        );
        let names: Vec<_> = material.parameters.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["MatParamIndex_0", "UV0_Speed_U", "UV0_Speed_V", "Offset"]);

        let plain = antiblur_material(&MaterialInstance::default());
        assert_eq!(plain.shader, "fox3ddf_blin_fuzzblock");
        assert_eq!(plain.textures.len(), 2);
        assert_eq!(plain.parameters, [("MatParamIndex_0".to_string(), Vec4::ZERO)]);
    }
}
