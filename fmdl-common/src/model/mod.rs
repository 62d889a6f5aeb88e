//! Host-neutral model graph
//!
//! Entities live in flat arrays on [`Model`] and refer to each other through
//! typed indices. Parents are stored; children are derived on demand.

mod bounds;
mod texture;

use std::collections::BTreeSet;

use glam::{Vec2, Vec3, Vec4};

use crate::encoding::VertexEncoding;
use crate::extensions::{ExtensionHeaders, MeshGroupMarker, MeshMarker};
use crate::formats::MAX_UV_SLOTS;

pub use texture::TextureResolver;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            #[inline]
            pub const fn index(self) -> usize {
                self.0
            }
        }
    };
}

define_id!(
    /// Index into [`Model::bones`]
    BoneId
);
define_id!(
    /// Index into [`Model::materials`]
    MaterialId
);
define_id!(
    /// Index into [`Model::meshes`]
    MeshId
);
define_id!(
    /// Index into [`Model::mesh_groups`]
    MeshGroupId
);

// ============================================================================
// Geometry primitives
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoundingBox {
    pub min: Vec4,
    pub max: Vec4,
}

impl BoundingBox {
    /// Box around a set of points with `w = 1`; the zero box (w = 1) when empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut points = points.into_iter();
        let Some(first) = points.next() else {
            return Self {
                min: Vec4::new(0.0, 0.0, 0.0, 1.0),
                max: Vec4::new(0.0, 0.0, 0.0, 1.0),
            };
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self {
            min: min.extend(1.0),
            max: max.extend(1.0),
        }
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

// ============================================================================
// Skeleton
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<BoneId>,
    /// Semantics vary between games; carried through untouched
    pub local_position: Vec4,
    pub global_position: Vec4,
    pub bounding_box: BoundingBox,
}

// ============================================================================
// Materials
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Texture {
    pub directory: String,
    pub filename: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialInstance {
    pub name: String,
    pub shader: String,
    pub technique: String,
    /// (role, texture) in stored order
    pub textures: Vec<(String, Texture)>,
    /// (parameter name, value) in stored order
    pub parameters: Vec<(String, Vec4)>,
}

impl MaterialInstance {
    pub fn texture(&self, role: &str) -> Option<&Texture> {
        self.textures
            .iter()
            .find_map(|(name, texture)| (name == role).then_some(texture))
    }

    pub fn parameter(&self, name: &str) -> Option<Vec4> {
        self.parameters
            .iter()
            .find_map(|(key, value)| (key == name).then_some(*value))
    }

    /// Pair every texture role with whatever the resolver finds for it.
    pub fn resolve_textures<R: TextureResolver>(
        &self,
        resolver: &R,
    ) -> Vec<(&str, Option<R::Image>)> {
        self.textures
            .iter()
            .map(|(role, texture)| (role.as_str(), resolver.resolve(texture)))
            .collect()
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// Which optional vertex channels a mesh carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct VertexFields {
    pub normal: bool,
    pub tangent: bool,
    pub color: bool,
    pub bone_mapping: bool,
    pub uv_count: usize,
    /// Bit `j` of entry `i` set: UV slot `i` always holds the same value as slot `j`
    pub uv_equalities: [u8; MAX_UV_SLOTS],
}

impl VertexFields {
    /// Mark two UV slots as value-identical.
    pub fn set_uv_equal(&mut self, a: usize, b: usize) {
        if a != b && a < MAX_UV_SLOTS && b < MAX_UV_SLOTS {
            self.uv_equalities[a] |= 1 << b;
            self.uv_equalities[b] |= 1 << a;
        }
    }

    pub fn uv_equal(&self, a: usize, b: usize) -> bool {
        a < MAX_UV_SLOTS && b < MAX_UV_SLOTS && self.uv_equalities[a] & (1 << b) != 0
    }

    /// Lowest earlier slot this UV slot shares storage with.
    pub fn uv_alias(&self, slot: usize) -> Option<usize> {
        (0..slot).find(|&earlier| self.uv_equal(slot, earlier))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Option<Vec4>,
    pub tangent: Option<Vec4>,
    pub color: Option<Vec4>,
    pub uv: Vec<Vec2>,
    /// (bone, weight in 0..=1); stored order is significant for ties
    pub bone_mapping: Vec<(BoneId, f32)>,
    /// Geometric vertex this loop belongs to. Vertices of one mesh with equal
    /// ids are loops of the same vertex; `None` stands alone.
    pub shared_vertex: Option<u32>,
}

impl Vertex {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// Three vertex indices, winding order significant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Face(pub [usize; 3]);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub faces: Vec<Face>,
    /// Bones the vertices may reference, at most 32 once stored
    pub bone_group: Vec<BoneId>,
    pub material: MaterialId,
    pub alpha: u8,
    pub shadow: u8,
    pub vertex_fields: VertexFields,
    pub markers: BTreeSet<MeshMarker>,
    /// Exact stored bytes per vertex, parallel to `vertices` when present
    pub vertex_encoding: Option<Vec<VertexEncoding>>,
}

impl Default for MaterialId {
    fn default() -> Self {
        MaterialId(0)
    }
}

impl Mesh {
    pub fn has_marker(&self, marker: MeshMarker) -> bool {
        self.markers.contains(&marker)
    }

    /// The stored form of every vertex. A cached encoding is reused only
    /// while it still describes the vertex at its position; edited vertices
    /// are encoded afresh.
    pub fn encoded_vertices(&self, bones: &[Bone]) -> Vec<VertexEncoding> {
        let cache = self.vertex_encoding.as_deref().unwrap_or_default();
        self.vertices
            .iter()
            .enumerate()
            .map(|(index, vertex)| match cache.get(index) {
                Some(cached) if cached.describes(vertex, &self.vertex_fields) => cached.clone(),
                _ => VertexEncoding::encode(vertex, &self.vertex_fields, bones),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshGroup {
    pub name: String,
    pub parent: Option<MeshGroupId>,
    pub meshes: Vec<MeshId>,
    pub bounding_box: BoundingBox,
    pub visible: bool,
    pub markers: BTreeSet<MeshGroupMarker>,
}

impl Default for MeshGroup {
    fn default() -> Self {
        Self {
            name: String::new(),
            parent: None,
            meshes: Vec::new(),
            bounding_box: BoundingBox::default(),
            visible: true,
            markers: BTreeSet::new(),
        }
    }
}

impl MeshGroup {
    pub fn has_marker(&self, marker: MeshGroupMarker) -> bool {
        self.markers.contains(&marker)
    }
}

// ============================================================================
// Model
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    pub bones: Vec<Bone>,
    pub materials: Vec<MaterialInstance>,
    pub meshes: Vec<Mesh>,
    pub mesh_groups: Vec<MeshGroup>,
    /// Headers not tied to a specific object, including `x-fmdl-extensions`
    pub extension_headers: ExtensionHeaders,
}

impl Model {
    pub fn find_bone(&self, name: &str) -> Option<BoneId> {
        self.bones.iter().position(|b| b.name == name).map(BoneId)
    }

    pub fn bone_children(&self, bone: BoneId) -> impl Iterator<Item = BoneId> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent == Some(bone))
            .map(|(i, _)| BoneId(i))
    }

    pub fn mesh_group_children(&self, group: MeshGroupId) -> impl Iterator<Item = MeshGroupId> + '_ {
        self.mesh_groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.parent == Some(group))
            .map(|(i, _)| MeshGroupId(i))
    }

    /// The group whose mesh list contains `mesh`.
    pub fn mesh_group_of(&self, mesh: MeshId) -> Option<MeshGroupId> {
        self.mesh_groups
            .iter()
            .position(|g| g.meshes.contains(&mesh))
            .map(MeshGroupId)
    }

    /// Bone name lookup that tolerates dangling ids.
    pub fn bone_name(&self, bone: BoneId) -> &str {
        self.bones.get(bone.0).map_or("", |b| b.name.as_str())
    }

    /// Cache the stored byte form of every mesh's vertices.
    pub fn precompute_vertex_encoding(&mut self) {
        for mesh in &mut self.meshes {
            if mesh.vertex_encoding.is_none() {
                mesh.vertex_encoding = Some(VertexEncoding::encode_all(
                    &mesh.vertices,
                    &mesh.vertex_fields,
                    &self.bones,
                ));
            }
        }
    }

    pub fn free_vertex_encoding(&mut self) {
        for mesh in &mut self.meshes {
            mesh.vertex_encoding = None;
        }
    }

    /// Replace the mesh list. `mapping(old)` gives the new ids standing in for
    /// mesh `old` in every mesh group.
    pub(crate) fn replace_meshes(
        &mut self,
        meshes: Vec<Mesh>,
        mapping: impl Fn(MeshId) -> Vec<MeshId>,
    ) {
        self.meshes = meshes;
        for group in &mut self.mesh_groups {
            group.meshes = group.meshes.iter().flat_map(|&m| mapping(m)).collect();
        }
    }

    /// Drop the given mesh groups, re-pointing surviving ids and parents.
    /// Children of a dropped group move to its parent.
    pub(crate) fn remove_mesh_groups(&mut self, removed: &BTreeSet<MeshGroupId>) {
        let mut new_ids = Vec::with_capacity(self.mesh_groups.len());
        let mut next = 0;
        for i in 0..self.mesh_groups.len() {
            if removed.contains(&MeshGroupId(i)) {
                new_ids.push(None);
            } else {
                new_ids.push(Some(MeshGroupId(next)));
                next += 1;
            }
        }

        let surviving_parent = |groups: &[MeshGroup], mut parent: Option<MeshGroupId>| {
            let mut steps = 0;
            while let Some(p) = parent {
                if !removed.contains(&p) || steps > groups.len() {
                    break;
                }
                parent = groups.get(p.0).and_then(|g| g.parent);
                steps += 1;
            }
            parent.and_then(|p| new_ids.get(p.0).copied().flatten())
        };

        let groups = std::mem::take(&mut self.mesh_groups);
        self.mesh_groups = groups
            .iter()
            .enumerate()
            .filter(|(i, _)| !removed.contains(&MeshGroupId(*i)))
            .map(|(_, group)| MeshGroup {
                parent: surviving_parent(&groups, group.parent),
                ..group.clone()
            })
            .collect();
    }

    /// Drop those `candidates` no mesh uses and renumber mesh references.
    pub(crate) fn remove_unused_materials(&mut self, candidates: &BTreeSet<MaterialId>) {
        let used: BTreeSet<MaterialId> = self.meshes.iter().map(|m| m.material).collect();
        let mut new_ids = vec![None; self.materials.len()];
        let mut kept = Vec::with_capacity(self.materials.len());
        for (i, material) in std::mem::take(&mut self.materials).into_iter().enumerate() {
            let id = MaterialId(i);
            if used.contains(&id) || !candidates.contains(&id) {
                new_ids[i] = Some(MaterialId(kept.len()));
                kept.push(material);
            }
        }
        self.materials = kept;
        for mesh in &mut self.meshes {
            if let Some(Some(id)) = new_ids.get(mesh.material.0) {
                mesh.material = *id;
            }
        }
    }
}
