//! Vertex/loop preservation
//!
//! The file format only knows vertices and faces. Editors work with
//! vertices, faces and loops: one geometric vertex may appear with different
//! normals, colors, UVs or tangents in different faces. This module stores
//! that relation in the vertex order alone.
//!
//! Two stored vertices are *siblings* if their topological keys (position and
//! bone mapping bytes) match. A vertex is another loop of the vertex before it
//! if the two are siblings and its nontopological bytes sort strictly after
//! the previous vertex's. Files written this way list
//! `vertex-loop-preservation` in `X-FMDL-Extensions`.
//!
//! In the model, loops of one geometric vertex share a
//! [`Vertex::shared_vertex`](crate::model::Vertex::shared_vertex) id.

use std::collections::BTreeMap;

use hashbrown::HashMap;

use crate::encoding::VertexEncoding;
use crate::extensions::extension;
use crate::model::{Bone, Face, Mesh, Model};

/// One geometric vertex: its distinct loops, ascending by nontopological key
struct GeometricVertex {
    topological_key: Vec<u8>,
    /// (nontopological key, source vertex index)
    loops: Vec<(Vec<u8>, usize)>,
}

/// Reorder a mesh so its loop structure survives storage.
///
/// Identical loops of one geometric vertex are merged and faces remapped.
/// Every output vertex gets a `shared_vertex` id numbering geometric
/// vertices in storage order.
pub fn encode_mesh_loops(mesh: &Mesh, bones: &[Bone]) -> Mesh {
    let encodings = mesh.encoded_vertices(bones);

    // Group loops by (shared vertex, topological key); loose vertices stand alone.
    let mut geometric: Vec<GeometricVertex> = Vec::new();
    let mut loop_sets: Vec<BTreeMap<Vec<u8>, usize>> = Vec::new();
    let mut group_of: HashMap<(u32, Vec<u8>), usize> = HashMap::new();
    let mut replaced: HashMap<usize, usize> = HashMap::new();

    for (index, (vertex, encoding)) in mesh.vertices.iter().zip(&encodings).enumerate() {
        let topological_key = encoding.topological_key();
        let group = match vertex.shared_vertex {
            Some(id) => *group_of
                .entry((id, topological_key.clone()))
                .or_insert_with(|| {
                    geometric.push(GeometricVertex {
                        topological_key: topological_key.clone(),
                        loops: Vec::new(),
                    });
                    loop_sets.push(BTreeMap::new());
                    geometric.len() - 1
                }),
            None => {
                geometric.push(GeometricVertex {
                    topological_key,
                    loops: Vec::new(),
                });
                loop_sets.push(BTreeMap::new());
                geometric.len() - 1
            }
        };
        match loop_sets[group].get(&encoding.nontopological_key()) {
            Some(&first) => {
                replaced.insert(index, first);
            }
            None => {
                loop_sets[group].insert(encoding.nontopological_key(), index);
            }
        }
    }
    for (vertex, loops) in geometric.iter_mut().zip(loop_sets) {
        vertex.loops = loops.into_iter().collect();
    }

    // Siblings are emitted together, at the first appearance of their key,
    // in descending order of their first loop.
    let mut siblings: HashMap<&[u8], Vec<usize>> = HashMap::new();
    let mut key_order: Vec<&[u8]> = Vec::new();
    for (group, vertex) in geometric.iter().enumerate() {
        let key = vertex.topological_key.as_slice();
        siblings
            .entry(key)
            .or_insert_with(|| {
                key_order.push(key);
                Vec::new()
            })
            .push(group);
    }

    let mut vertices = Vec::with_capacity(mesh.vertices.len());
    let mut new_encodings: Vec<VertexEncoding> = Vec::with_capacity(mesh.vertices.len());
    let mut new_index = vec![0usize; mesh.vertices.len()];
    let mut next_id = 0u32;
    for key in key_order {
        let Some(mut groups) = siblings.remove(key) else {
            continue;
        };
        groups.sort_by(|&a, &b| geometric[b].loops[0].0.cmp(&geometric[a].loops[0].0));
        for group in groups {
            for &(_, source) in &geometric[group].loops {
                new_index[source] = vertices.len();
                let mut vertex = mesh.vertices[source].clone();
                vertex.shared_vertex = Some(next_id);
                vertices.push(vertex);
                new_encodings.push(encodings[source].clone());
            }
            next_id += 1;
        }
    }
    for (&duplicate, &kept) in &replaced {
        new_index[duplicate] = new_index[kept];
    }

    let faces = mesh
        .faces
        .iter()
        // Out-of-range corners are left for validation to report.
        .map(|face| Face(face.0.map(|v| new_index.get(v).copied().unwrap_or(v))))
        .collect();

    tracing::debug!(
        vertices = mesh.vertices.len(),
        stored = vertices.len(),
        geometric = next_id,
        "encoded vertex loops"
    );

    Mesh {
        vertices,
        faces,
        vertex_encoding: Some(new_encodings),
        ..mesh.clone()
    }
}

/// Recover loop structure from vertex order, assigning `shared_vertex` ids.
pub fn decode_mesh_loops(mesh: &mut Mesh, bones: &[Bone]) {
    let encodings = mesh.encoded_vertices(bones);
    let mut previous: Option<(Vec<u8>, Vec<u8>)> = None;
    let mut next_id = 0u32;
    let mut merged = 0usize;

    for (vertex, encoding) in mesh.vertices.iter_mut().zip(&encodings) {
        let topological = encoding.topological_key();
        let nontopological = encoding.nontopological_key();
        let continues = matches!(
            &previous,
            Some((prev_topological, prev_nontopological))
                if *prev_topological == topological && *prev_nontopological < nontopological
        );
        if continues {
            merged += 1;
        } else {
            next_id += 1;
        }
        vertex.shared_vertex = Some(next_id - 1);
        previous = Some((topological, nontopological));
    }

    tracing::debug!(vertices = mesh.vertices.len(), merged, "decoded vertex loops");
}

/// Apply loop preservation to every mesh and mark the model.
pub fn encode_loops(model: &mut Model) {
    let meshes = model
        .meshes
        .iter()
        .map(|mesh| encode_mesh_loops(mesh, &model.bones))
        .collect();
    model.meshes = meshes;
    model
        .extension_headers
        .add_extension(extension::VERTEX_LOOP_PRESERVATION);
}

/// Undo loop preservation if the model was written with it.
pub fn decode_loops(model: &mut Model) {
    if !model
        .extension_headers
        .has_extension(extension::VERTEX_LOOP_PRESERVATION)
    {
        return;
    }
    for mesh in &mut model.meshes {
        decode_mesh_loops(mesh, &model.bones);
    }
    model
        .extension_headers
        .remove_extension(extension::VERTEX_LOOP_PRESERVATION);
}
