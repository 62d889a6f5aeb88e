//! Mesh splitting
//!
//! Meshes over the format's hard limits are cut into submeshes that fit the
//! lower soft limits. The submeshes of one source mesh are wrapped in a child
//! mesh group marked [`MeshGroupMarker::SplitMeshGroup`], and the file lists
//! `mesh-splitting` in `X-FMDL-Extensions` so a reader can join them again.
//!
//! Regions grow along the skeleton: starting from an extremity bone, the
//! region is widened to ancestor bones while it still fits. Content under a
//! single bone that is too large on its own is filled greedily along its
//! principal axis instead.

mod pca;
mod rejoin;
mod skeleton;
mod splitter;

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use crate::error::InternalFault;
use crate::extensions::{MeshGroupMarker, extension};
use crate::model::{Mesh, MeshGroup, MeshGroupId, MeshId, Model};

pub use pca::principal_axis;
pub use skeleton::SkeletonMetadata;

use rejoin::combine_submeshes;
use splitter::MeshSplitter;

/// Name given to the mesh groups that hold submeshes
pub const SPLIT_MESH_GROUP_NAME: &str = "split-mesh";

/// Per-mesh size limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitLimits {
    pub bones: usize,
    pub vertices: usize,
    pub faces: usize,
}

impl SplitLimits {
    /// Maxima the file format can store
    pub const HARD: SplitLimits = SplitLimits {
        bones: 32,
        vertices: 65535,
        faces: 21845,
    };

    /// Targets for submeshes, leaving room for editors that grow a mesh
    pub const SOFT: SplitLimits = SplitLimits {
        bones: 30,
        vertices: 63000,
        faces: 20000,
    };

    pub fn exceeded_by(&self, mesh: &Mesh) -> bool {
        mesh.vertices.len() > self.vertices
            || mesh.faces.len() > self.faces
            || mesh.bone_group.len() > self.bones
    }
}

pub fn needs_splitting(mesh: &Mesh) -> bool {
    SplitLimits::HARD.exceeded_by(mesh)
}

/// Cut one mesh into submeshes within [`SplitLimits::SOFT`].
///
/// `mesh_index` only labels diagnostics.
pub fn split_mesh(
    model: &Model,
    mesh_index: usize,
    metadata: &SkeletonMetadata,
) -> Result<Vec<Mesh>, InternalFault> {
    let parents = metadata.effective_parents(&model.bones);
    let Some(mesh) = model.meshes.get(mesh_index) else {
        return Ok(Vec::new());
    };
    MeshSplitter::new(mesh, mesh_index, &model.bones, &parents, metadata).split()
}

/// Split every mesh over the hard limits, wrapping its submeshes in a new
/// split mesh group under the mesh's own group.
pub fn split_meshes(model: &mut Model, metadata: &SkeletonMetadata) -> Result<(), InternalFault> {
    let parents = metadata.effective_parents(&model.bones);

    let mut meshes = Vec::with_capacity(model.meshes.len());
    let mut new_ids: Vec<Vec<MeshId>> = Vec::with_capacity(model.meshes.len());
    let mut split_groups = Vec::new();
    for (index, mesh) in model.meshes.iter().enumerate() {
        let faces_valid = mesh
            .faces
            .iter()
            .all(|face| face.0.iter().all(|&v| v < mesh.vertices.len()));
        if !needs_splitting(mesh) || !faces_valid {
            new_ids.push(vec![MeshId(meshes.len())]);
            meshes.push(mesh.clone());
            continue;
        }

        let submeshes =
            MeshSplitter::new(mesh, index, &model.bones, &parents, metadata).split()?;
        let ids: Vec<MeshId> = (meshes.len()..meshes.len() + submeshes.len())
            .map(MeshId)
            .collect();
        meshes.extend(submeshes);
        split_groups.push((model.mesh_group_of(MeshId(index)), ids));
        new_ids.push(Vec::new());
    }

    if split_groups.is_empty() {
        return Ok(());
    }

    model.replace_meshes(meshes, |old| {
        new_ids.get(old.0).cloned().unwrap_or_default()
    });
    for (owner, ids) in split_groups {
        let (bounding_box, visible) = owner
            .and_then(|g| model.mesh_groups.get(g.0))
            .map_or((Default::default(), true), |g| (g.bounding_box, g.visible));
        model.mesh_groups.push(MeshGroup {
            name: SPLIT_MESH_GROUP_NAME.to_string(),
            parent: owner,
            meshes: ids,
            bounding_box,
            visible,
            markers: BTreeSet::from([MeshGroupMarker::SplitMeshGroup]),
        });
    }
    model.extension_headers.add_extension(extension::MESH_SPLITTING);
    Ok(())
}

/// Join the submeshes of every split mesh group back into one mesh, if the
/// model was written with mesh splitting.
///
/// The joined mesh takes the position of its group's first submesh and moves
/// into the parent group. A split group without a parent is kept as an
/// ordinary group holding the joined mesh.
pub fn rejoin_split_meshes(model: &mut Model) {
    if !model
        .extension_headers
        .has_extension(extension::MESH_SPLITTING)
    {
        return;
    }

    let split_groups: Vec<MeshGroupId> = model
        .mesh_groups
        .iter()
        .enumerate()
        .filter(|(_, g)| g.has_marker(MeshGroupMarker::SplitMeshGroup) && !g.meshes.is_empty())
        .map(|(i, _)| MeshGroupId(i))
        .collect();

    let mut split_of: Vec<Option<usize>> = vec![None; model.meshes.len()];
    let mut combined: Vec<Option<Mesh>> = Vec::with_capacity(split_groups.len());
    for (slot, &group) in split_groups.iter().enumerate() {
        let members = &model.mesh_groups[group.0].meshes;
        for mesh in members {
            if let Some(entry) = split_of.get_mut(mesh.0) {
                *entry = Some(slot);
            }
        }
        let submeshes: Vec<Mesh> = members
            .iter()
            .filter_map(|m| model.meshes.get(m.0).cloned())
            .collect();
        combined.push(Some(combine_submeshes(&submeshes, &model.bones)));
    }

    let mut meshes = Vec::with_capacity(model.meshes.len());
    let mut new_ids: Vec<Option<MeshId>> = Vec::with_capacity(model.meshes.len());
    let mut joined_ids: Vec<MeshId> = vec![MeshId(0); split_groups.len()];
    for (index, mesh) in std::mem::take(&mut model.meshes).into_iter().enumerate() {
        match split_of[index] {
            Some(slot) => {
                if let Some(joined) = combined[slot].take() {
                    joined_ids[slot] = MeshId(meshes.len());
                    meshes.push(joined);
                }
                new_ids.push(None);
            }
            None => {
                new_ids.push(Some(MeshId(meshes.len())));
                meshes.push(mesh);
            }
        }
    }
    model.replace_meshes(meshes, |old| {
        new_ids.get(old.0).copied().flatten().into_iter().collect()
    });

    let mut removed = BTreeSet::new();
    for (&group, &joined) in split_groups.iter().zip(&joined_ids) {
        match model.mesh_groups[group.0].parent {
            Some(parent) if parent.0 < model.mesh_groups.len() => {
                model.mesh_groups[parent.0].meshes.push(joined);
                removed.insert(group);
            }
            _ => {
                let group = &mut model.mesh_groups[group.0];
                group.meshes = vec![joined];
                group.markers.remove(&MeshGroupMarker::SplitMeshGroup);
            }
        }
    }
    model.remove_mesh_groups(&removed);

    tracing::debug!(groups = split_groups.len(), "rejoined split meshes");
    model
        .extension_headers
        .remove_extension(extension::MESH_SPLITTING);
}
