//! Region selection for a single oversized mesh

use std::collections::{BTreeSet, VecDeque};

use glam::DVec3;
use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use super::SplitLimits;
use super::pca::principal_axis;
use super::skeleton::SkeletonMetadata;
use crate::encoding::VertexEncoding;
use crate::error::InternalFault;
use crate::model::{Bone, BoneId, Face, Mesh};

/// Faces and loose equipresence classes not yet assigned to a submesh
#[derive(Debug, Clone, Default)]
struct ItemSet {
    faces: BTreeSet<usize>,
    loose: BTreeSet<usize>,
}

impl ItemSet {
    fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.loose.is_empty()
    }

    fn remove(&mut self, selection: &Selection) {
        self.faces.retain(|f| !selection.faces.contains(f));
        self.loose.retain(|c| !selection.classes.contains(c));
    }
}

/// Content of one submesh
#[derive(Debug, Default)]
struct Selection {
    faces: BTreeSet<usize>,
    classes: BTreeSet<usize>,
    bones: BTreeSet<BoneId>,
    vertices: usize,
}

impl Selection {
    fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.classes.is_empty()
    }
}

enum Candidate<'a> {
    Name(&'a str),
    Bone(BoneId),
}

pub(super) struct MeshSplitter<'a> {
    mesh: &'a Mesh,
    mesh_index: usize,
    bones: &'a [Bone],
    parents: &'a [Option<BoneId>],
    metadata: &'a SkeletonMetadata,
    bones_by_name: HashMap<&'a str, BoneId>,
    encodings: Vec<VertexEncoding>,
    /// Equipresence classes: vertices sharing a topological key, which must
    /// land in the same submeshes
    classes: Vec<Vec<usize>>,
    class_bones: Vec<SmallVec<[BoneId; 4]>>,
    face_classes: Vec<SmallVec<[usize; 3]>>,
    root: ItemSet,
    /// Items touching each bone or one of its descendants; empty when the
    /// mesh carries no bone mapping
    per_bone: Vec<ItemSet>,
}

impl<'a> MeshSplitter<'a> {
    /// Faces must reference existing vertices.
    pub(super) fn new(
        mesh: &'a Mesh,
        mesh_index: usize,
        bones: &'a [Bone],
        parents: &'a [Option<BoneId>],
        metadata: &'a SkeletonMetadata,
    ) -> Self {
        let encodings = mesh.encoded_vertices(bones);

        let mut class_index: HashMap<Vec<u8>, usize> = HashMap::new();
        let mut classes: Vec<Vec<usize>> = Vec::new();
        let mut class_of = Vec::with_capacity(encodings.len());
        for (vertex, encoding) in encodings.iter().enumerate() {
            let class = *class_index
                .entry(encoding.topological_key())
                .or_insert_with(|| {
                    classes.push(Vec::new());
                    classes.len() - 1
                });
            classes[class].push(vertex);
            class_of.push(class);
        }
        for members in &mut classes {
            members.sort_by_cached_key(|&v| encodings[v].indistinguishable_key());
        }

        let class_bones: Vec<SmallVec<[BoneId; 4]>> = classes
            .iter()
            .map(|members| {
                encodings[members[0]]
                    .bone_mapping
                    .iter()
                    .map(|&(bone, _)| bone)
                    .filter(|bone| bone.0 < bones.len())
                    .collect()
            })
            .collect();

        let face_classes: Vec<SmallVec<[usize; 3]>> = mesh
            .faces
            .iter()
            .map(|face| {
                let mut classes: SmallVec<[usize; 3]> =
                    face.0.iter().map(|&v| class_of[v]).collect();
                classes.sort_unstable();
                classes.dedup();
                classes
            })
            .collect();

        let mut used = vec![false; classes.len()];
        for class in face_classes.iter().flatten() {
            used[*class] = true;
        }
        let root = ItemSet {
            faces: (0..mesh.faces.len()).collect(),
            loose: (0..classes.len()).filter(|&c| !used[c]).collect(),
        };

        let mut splitter = Self {
            mesh,
            mesh_index,
            bones,
            parents,
            metadata,
            bones_by_name: bones
                .iter()
                .enumerate()
                .map(|(i, bone)| (bone.name.as_str(), BoneId(i)))
                .collect(),
            encodings,
            classes,
            class_bones,
            face_classes,
            root,
            per_bone: Vec::new(),
        };
        if mesh.vertex_fields.bone_mapping {
            splitter.index_bones();
        }
        splitter
    }

    /// Register every face and loose class with its bones and their ancestors.
    fn index_bones(&mut self) {
        let mut per_bone = vec![ItemSet::default(); self.bones.len()];
        for (face, classes) in self.face_classes.iter().enumerate() {
            for &class in classes {
                for &bone in &self.class_bones[class] {
                    climb(&mut per_bone, self.parents, bone, |items| items.faces.insert(face));
                }
            }
        }
        for &class in &self.root.loose {
            for &bone in &self.class_bones[class] {
                climb(&mut per_bone, self.parents, bone, |items| items.loose.insert(class));
            }
        }
        self.per_bone = per_bone;
    }

    /// Cut the mesh into submeshes that fit the soft limits.
    pub(super) fn split(mut self) -> Result<Vec<Mesh>, InternalFault> {
        let mut submeshes = Vec::new();
        while !self.root.is_empty() {
            let selection = self.select();
            if selection.is_empty() {
                return Err(InternalFault::SplitStalled {
                    mesh: self.mesh_index,
                    faces: self.root.faces.len(),
                    loose: self.root.loose.len(),
                });
            }
            submeshes.push(self.build_submesh(&selection));
            self.root.remove(&selection);
            for items in &mut self.per_bone {
                items.remove(&selection);
            }
        }
        if submeshes.is_empty() {
            submeshes.push(self.build_submesh(&Selection::default()));
        }

        tracing::debug!(
            mesh = self.mesh_index,
            submeshes = submeshes.len(),
            "split oversized mesh"
        );
        Ok(submeshes)
    }

    fn has_bones(&self) -> bool {
        !self.per_bone.is_empty()
    }

    fn items(&self, bone: Option<BoneId>) -> &ItemSet {
        match bone {
            Some(bone) => &self.per_bone[bone.0],
            None => &self.root,
        }
    }

    fn select(&self) -> Selection {
        let mut base = if self.has_bones() { self.base_bone() } else { None };
        let mut selection = self.expand(self.items(base));
        if !self.fits(&selection) {
            return self.fill_along_axis(base);
        }
        while let Some(bone) = base {
            let parent = self.parents[bone.0];
            let candidate = self.expand(self.items(parent));
            if !self.fits(&candidate) {
                break;
            }
            base = parent;
            selection = candidate;
        }
        selection
    }

    /// First bone with remaining content, trying extremities before the rest.
    fn base_bone(&self) -> Option<BoneId> {
        let mut queue: VecDeque<Candidate<'_>> = self
            .metadata
            .base_bones()
            .iter()
            .map(|name| Candidate::Name(name.as_str()))
            .collect();
        let mut tried = vec![false; self.bones.len()];
        let mut named: HashSet<&str> = HashSet::new();
        let mut all_bones_queued = false;

        loop {
            let Some(candidate) = queue.pop_front() else {
                if all_bones_queued {
                    return None;
                }
                all_bones_queued = true;
                queue.extend((0..self.bones.len()).map(|i| Candidate::Bone(BoneId(i))));
                continue;
            };
            let bone = match candidate {
                Candidate::Bone(bone) => bone,
                Candidate::Name(name) => match self.bones_by_name.get(name) {
                    Some(&bone) => bone,
                    None => {
                        if named.insert(name)
                            && let Some(parent) = self.metadata.render_parent(name)
                        {
                            queue.push_back(Candidate::Name(parent));
                        }
                        continue;
                    }
                },
            };
            if std::mem::replace(&mut tried[bone.0], true) {
                continue;
            }
            if self.per_bone[bone.0].is_empty() {
                if let Some(parent) = self.parents[bone.0] {
                    queue.push_back(Candidate::Bone(parent));
                }
                continue;
            }
            return Some(bone);
        }
    }

    fn expand(&self, items: &ItemSet) -> Selection {
        let mut selection = Selection {
            faces: items.faces.clone(),
            ..Default::default()
        };
        let classes = items
            .faces
            .iter()
            .flat_map(|&f| self.face_classes[f].iter().copied())
            .chain(items.loose.iter().copied());
        self.add_classes(&mut selection, classes);
        selection
    }

    fn fits(&self, selection: &Selection) -> bool {
        let limits = SplitLimits::SOFT;
        selection.faces.len() <= limits.faces
            && selection.vertices <= limits.vertices
            && (!self.has_bones() || selection.bones.len() <= limits.bones)
    }

    /// Whether adding `classes` keeps the selection within the soft limits.
    fn can_add(&self, selection: &Selection, classes: &[usize]) -> bool {
        let limits = SplitLimits::SOFT;
        let vertices: usize = classes.iter().map(|&c| self.classes[c].len()).sum();
        if selection.vertices + vertices > limits.vertices {
            return false;
        }
        if !self.has_bones() {
            return true;
        }
        let new_bones: BTreeSet<BoneId> = classes
            .iter()
            .flat_map(|&c| self.class_bones[c].iter().copied())
            .filter(|bone| !selection.bones.contains(bone))
            .collect();
        selection.bones.len() + new_bones.len() <= limits.bones
    }

    fn add_classes(&self, selection: &mut Selection, classes: impl IntoIterator<Item = usize>) {
        for class in classes {
            if selection.classes.insert(class) {
                selection.vertices += self.classes[class].len();
                selection.bones.extend(self.class_bones[class].iter().copied());
            }
        }
    }

    fn position(&self, vertex: usize) -> DVec3 {
        self.mesh.vertices[vertex].position.as_dvec3()
    }

    /// Greedy fill along the principal axis of the remaining content,
    /// starting from the end farthest from the bone.
    fn fill_along_axis(&self, base: Option<BoneId>) -> Selection {
        let limits = SplitLimits::SOFT;
        let items = self.items(base);

        let points: Vec<DVec3> = items
            .faces
            .iter()
            .flat_map(|&f| self.mesh.faces[f].0)
            .chain(items.loose.iter().map(|&c| self.classes[c][0]))
            .map(|v| self.position(v))
            .collect();
        let (centroid, mut axis) = principal_axis(&points);
        let origin = base.map_or(DVec3::ZERO, |bone| {
            self.bones[bone.0].global_position.truncate().as_dvec3()
        });
        if (centroid - origin).dot(axis) < 0.0 {
            axis = -axis;
        }
        let score = |vertex: usize| self.position(vertex).dot(axis);

        let mut faces: Vec<(f64, usize)> = items
            .faces
            .iter()
            .map(|&f| {
                let Face(corners) = self.mesh.faces[f];
                let best = corners.iter().map(|&v| score(v)).fold(f64::NEG_INFINITY, f64::max);
                (best, f)
            })
            .collect();
        faces.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut selection = Selection::default();
        for (_, face) in faces {
            if selection.faces.len() >= limits.faces {
                break;
            }
            let new_classes: SmallVec<[usize; 3]> = self.face_classes[face]
                .iter()
                .copied()
                .filter(|c| !selection.classes.contains(c))
                .collect();
            if self.can_add(&selection, &new_classes) {
                self.add_classes(&mut selection, new_classes.iter().copied());
                selection.faces.insert(face);
            }
        }

        let mut loose: Vec<(f64, usize)> = items
            .loose
            .iter()
            .map(|&c| (score(self.classes[c][0]), c))
            .collect();
        loose.sort_by(|a, b| b.0.total_cmp(&a.0));
        for (_, class) in loose {
            if selection.vertices >= limits.vertices {
                break;
            }
            if self.can_add(&selection, &[class]) {
                self.add_classes(&mut selection, [class]);
            }
        }
        selection
    }

    fn build_submesh(&self, selection: &Selection) -> Mesh {
        let mesh = self.mesh;
        let mut new_index = vec![0usize; mesh.vertices.len()];
        let mut vertices = Vec::with_capacity(selection.vertices);
        let mut encodings = Vec::with_capacity(selection.vertices);
        for &class in &selection.classes {
            for &vertex in &self.classes[class] {
                new_index[vertex] = vertices.len();
                vertices.push(mesh.vertices[vertex].clone());
                encodings.push(self.encodings[vertex].clone());
            }
        }
        let faces = selection
            .faces
            .iter()
            .map(|&f| Face(mesh.faces[f].0.map(|v| new_index[v])))
            .collect();

        let bone_group = if mesh.vertex_fields.bone_mapping {
            let mut group: Vec<BoneId> = mesh
                .bone_group
                .iter()
                .copied()
                .filter(|bone| selection.bones.contains(bone))
                .collect();
            for &bone in &selection.bones {
                if !group.contains(&bone) {
                    group.push(bone);
                }
            }
            group
        } else {
            Vec::new()
        };

        Mesh {
            vertices,
            faces,
            bone_group,
            material: mesh.material,
            alpha: mesh.alpha,
            shadow: mesh.shadow,
            vertex_fields: mesh.vertex_fields,
            markers: mesh.markers.clone(),
            vertex_encoding: Some(encodings),
        }
    }
}

/// Insert into `start` and its ancestors, stopping at the first set that
/// already held the item.
fn climb(
    per_bone: &mut [ItemSet],
    parents: &[Option<BoneId>],
    start: BoneId,
    mut insert: impl FnMut(&mut ItemSet) -> bool,
) {
    let mut current = Some(start);
    while let Some(bone) = current {
        let Some(items) = per_bone.get_mut(bone.0) else { break };
        if !insert(items) {
            break;
        }
        current = parents.get(bone.0).copied().flatten();
    }
}
