//! Info command - print a summary of a model

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use fmdl_common::{DecodeOptions, Model};
use serde::Serialize;

/// Arguments for the info command
#[derive(Args)]
pub struct InfoArgs {
    /// .fmdl file to inspect
    pub file: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the file as stored, without rejoining split meshes or
    /// removing generated meshes
    #[arg(long)]
    pub raw: bool,
}

#[derive(Serialize)]
struct ModelSummary {
    bones: Vec<BoneSummary>,
    materials: Vec<MaterialSummary>,
    meshes: Vec<MeshSummary>,
    mesh_groups: Vec<MeshGroupSummary>,
    extension_headers: Vec<(String, Vec<String>)>,
}

#[derive(Serialize)]
struct BoneSummary {
    name: String,
    parent: Option<String>,
}

#[derive(Serialize)]
struct MaterialSummary {
    name: String,
    shader: String,
    technique: String,
    textures: Vec<String>,
    parameters: Vec<String>,
}

#[derive(Serialize)]
struct MeshSummary {
    vertices: usize,
    faces: usize,
    material: String,
    bones: usize,
    channels: Vec<String>,
    markers: Vec<String>,
}

#[derive(Serialize)]
struct MeshGroupSummary {
    name: String,
    parent: Option<String>,
    meshes: Vec<usize>,
    visible: bool,
}

impl ModelSummary {
    fn new(model: &Model) -> Self {
        let bones = model
            .bones
            .iter()
            .map(|bone| BoneSummary {
                name: bone.name.clone(),
                parent: bone.parent.map(|p| model.bone_name(p).to_string()),
            })
            .collect();

        let materials = model
            .materials
            .iter()
            .map(|material| MaterialSummary {
                name: material.name.clone(),
                shader: material.shader.clone(),
                technique: material.technique.clone(),
                textures: material
                    .textures
                    .iter()
                    .map(|(role, t)| format!("{role}: {}{}", t.directory, t.filename))
                    .collect(),
                parameters: material.parameters.iter().map(|(n, _)| n.clone()).collect(),
            })
            .collect();

        let meshes = model
            .meshes
            .iter()
            .map(|mesh| {
                let fields = &mesh.vertex_fields;
                let mut channels = vec!["position".to_string()];
                for (present, name) in [
                    (fields.normal, "normal"),
                    (fields.tangent, "tangent"),
                    (fields.color, "color"),
                    (fields.bone_mapping, "bone_mapping"),
                ] {
                    if present {
                        channels.push(name.to_string());
                    }
                }
                channels.extend((0..fields.uv_count).map(|i| format!("uv{i}")));

                MeshSummary {
                    vertices: mesh.vertices.len(),
                    faces: mesh.faces.len(),
                    material: model
                        .materials
                        .get(mesh.material.0)
                        .map(|m| m.name.clone())
                        .unwrap_or_else(|| format!("#{}", mesh.material.0)),
                    bones: mesh.bone_group.len(),
                    channels,
                    markers: mesh
                        .markers
                        .iter()
                        .map(|m| m.header_name().to_string())
                        .collect(),
                }
            })
            .collect();

        let mesh_groups = model
            .mesh_groups
            .iter()
            .map(|group| MeshGroupSummary {
                name: group.name.clone(),
                parent: group
                    .parent
                    .and_then(|p| model.mesh_groups.get(p.0))
                    .map(|p| p.name.clone()),
                meshes: group.meshes.iter().map(|m| m.0).collect(),
                visible: group.visible,
            })
            .collect();

        let extension_headers = model
            .extension_headers
            .iter()
            .map(|(key, values)| (key.to_string(), values.to_vec()))
            .collect();

        Self {
            bones,
            materials,
            meshes,
            mesh_groups,
            extension_headers,
        }
    }

    fn print(&self) {
        println!("Bones: {}", self.bones.len());
        for bone in &self.bones {
            match &bone.parent {
                Some(parent) => println!("  {} (parent: {})", bone.name, parent),
                None => println!("  {}", bone.name),
            }
        }

        println!("Materials: {}", self.materials.len());
        for material in &self.materials {
            println!(
                "  {} [{} / {}] {} textures, {} parameters",
                material.name,
                material.shader,
                material.technique,
                material.textures.len(),
                material.parameters.len()
            );
        }

        println!("Meshes: {}", self.meshes.len());
        for (i, mesh) in self.meshes.iter().enumerate() {
            println!(
                "  #{i}: {} vertices, {} faces, {} bones, material {} ({})",
                mesh.vertices,
                mesh.faces,
                mesh.bones,
                mesh.material,
                mesh.channels.join(", ")
            );
            if !mesh.markers.is_empty() {
                println!("      markers: {}", mesh.markers.join(", "));
            }
        }

        println!("Mesh groups: {}", self.mesh_groups.len());
        for group in &self.mesh_groups {
            let hidden = if group.visible { "" } else { " (hidden)" };
            println!("  {}{} meshes {:?}", group.name, hidden, group.meshes);
        }

        if !self.extension_headers.is_empty() {
            println!("Extension headers:");
            for (key, values) in &self.extension_headers {
                println!("  {}: {}", key, values.join(" "));
            }
        }
    }
}

/// Execute the info command
pub fn execute(args: InfoArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let options = if args.raw {
        DecodeOptions {
            mesh_splitting: false,
            vertex_loop_preservation: false,
            antiblur: false,
        }
    } else {
        DecodeOptions::default()
    };
    let model = fmdl_common::decode_with(&bytes, &options)
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;

    let summary = ModelSummary::new(&model);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        summary.print();
    }
    Ok(())
}
