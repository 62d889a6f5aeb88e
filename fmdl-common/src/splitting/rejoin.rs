//! Merging split submeshes back into one mesh

use hashbrown::HashMap;

use crate::encoding::VertexEncoding;
use crate::model::{Bone, BoneId, Face, Mesh, Vertex};

/// Union-find over merged vertex indices
struct LoopSets {
    parent: Vec<usize>,
}

impl LoopSets {
    fn push(&mut self) {
        self.parent.push(self.parent.len());
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            self.parent[a.max(b)] = a.min(b);
        }
    }
}

/// Merge the submeshes of one split group.
///
/// Vertices equal in every stored byte are the same source vertex: the Nth
/// copy of a vertex within one submesh is matched with the Nth copy already
/// merged. Loop ids are merged across submeshes so a geometric vertex keeps a
/// single `shared_vertex` id.
pub(super) fn combine_submeshes(submeshes: &[Mesh], bones: &[Bone]) -> Mesh {
    let Some(first) = submeshes.first() else {
        return Mesh::default();
    };

    let mut vertices: Vec<Vertex> = Vec::new();
    let mut encodings: Vec<VertexEncoding> = Vec::new();
    let mut faces: Vec<Face> = Vec::new();
    let mut merged: HashMap<Vec<u8>, Vec<usize>> = HashMap::new();
    let mut loops = LoopSets { parent: Vec::new() };
    let mut has_loop_id = Vec::new();

    for submesh in submeshes {
        let submesh_encodings = submesh.encoded_vertices(bones);
        let mut occurrences: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut loop_members: HashMap<u32, usize> = HashMap::new();
        let mut new_index = Vec::with_capacity(submesh.vertices.len());

        for (vertex, encoding) in submesh.vertices.iter().zip(&submesh_encodings) {
            let key = encoding.indistinguishable_key();
            let nth = occurrences.entry(key.clone()).or_insert(0);
            let copies = merged.entry(key).or_default();
            let index = match copies.get(*nth) {
                Some(&existing) => existing,
                None => {
                    let index = vertices.len();
                    copies.push(index);
                    vertices.push(vertex.clone());
                    encodings.push(encoding.clone());
                    loops.push();
                    has_loop_id.push(false);
                    index
                }
            };
            *nth += 1;

            if let Some(id) = vertex.shared_vertex {
                has_loop_id[index] = true;
                match loop_members.get(&id) {
                    Some(&member) => loops.union(member, index),
                    None => {
                        loop_members.insert(id, index);
                    }
                }
            }
            new_index.push(index);
        }

        faces.extend(
            submesh
                .faces
                .iter()
                .filter_map(|face| {
                    let corners = [
                        *new_index.get(face.0[0])?,
                        *new_index.get(face.0[1])?,
                        *new_index.get(face.0[2])?,
                    ];
                    Some(Face(corners))
                }),
        );
    }

    // Renumber loop roots in order of first appearance.
    let mut ids: HashMap<usize, u32> = HashMap::new();
    for (index, vertex) in vertices.iter_mut().enumerate() {
        vertex.shared_vertex = if has_loop_id[index] {
            let root = loops.find(index);
            let next = ids.len() as u32;
            Some(*ids.entry(root).or_insert(next))
        } else {
            None
        };
    }

    let bone_group = if first.vertex_fields.bone_mapping {
        let mut used = vec![false; bones.len()];
        for encoding in &encodings {
            for &(bone, _) in &encoding.bone_mapping {
                if let Some(flag) = used.get_mut(bone.0) {
                    *flag = true;
                }
            }
        }
        (0..bones.len()).filter(|&b| used[b]).map(BoneId).collect()
    } else {
        Vec::new()
    };

    Mesh {
        vertices,
        faces,
        bone_group,
        material: first.material,
        alpha: first.alpha,
        shadow: first.shadow,
        vertex_fields: first.vertex_fields,
        markers: first.markers.clone(),
        vertex_encoding: Some(encodings),
    }
}
