//! Bounding box recomputation

use glam::Vec3;

use super::{BoundingBox, Model};
use crate::extensions::MeshMarker;

impl Model {
    /// Recompute bone and mesh group bounding boxes from vertex positions.
    ///
    /// A bone's box covers the vertices weighted to it. A mesh group's box
    /// covers its meshes and its child groups. Groups holding a mesh marked
    /// [`MeshMarker::CustomBoundingBox`] keep their current box.
    pub fn compute_bounding_boxes(&mut self) {
        let mut bone_points: Vec<Vec<Vec3>> = vec![Vec::new(); self.bones.len()];
        for mesh in &self.meshes {
            for vertex in &mesh.vertices {
                for &(bone, weight) in &vertex.bone_mapping {
                    if weight > 0.0
                        && let Some(points) = bone_points.get_mut(bone.0)
                    {
                        points.push(vertex.position);
                    }
                }
            }
        }
        for (bone, points) in self.bones.iter_mut().zip(bone_points) {
            bone.bounding_box = BoundingBox::from_points(points);
        }

        // Children before parents: repeatedly settle groups whose children are settled.
        let count = self.mesh_groups.len();
        let mut boxes: Vec<Option<BoundingBox>> = vec![None; count];
        for _ in 0..=count {
            let mut progressed = false;
            for i in 0..count {
                if boxes[i].is_some() {
                    continue;
                }
                let children: Vec<usize> = (0..count)
                    .filter(|&c| self.mesh_groups[c].parent.map(|p| p.0) == Some(i))
                    .collect();
                if children.iter().any(|&c| boxes[c].is_none()) {
                    continue;
                }
                let group = &self.mesh_groups[i];
                let custom = group.meshes.iter().any(|m| {
                    self.meshes
                        .get(m.0)
                        .is_some_and(|mesh| mesh.has_marker(MeshMarker::CustomBoundingBox))
                });
                let bbox = if custom {
                    group.bounding_box
                } else {
                    let own = group
                        .meshes
                        .iter()
                        .filter_map(|m| self.meshes.get(m.0))
                        .flat_map(|mesh| mesh.vertices.iter().map(|v| v.position))
                        .collect::<Vec<_>>();
                    let mut bbox = (!own.is_empty()).then(|| BoundingBox::from_points(own));
                    for &c in &children {
                        if let Some(child) = boxes[c] {
                            bbox = Some(bbox.map_or(child, |b| b.union(&child)));
                        }
                    }
                    bbox.unwrap_or_else(|| BoundingBox::from_points([]))
                };
                boxes[i] = Some(bbox);
                progressed = true;
            }
            if !progressed {
                break;
            }
        }
        for (group, bbox) in self.mesh_groups.iter_mut().zip(boxes) {
            if let Some(bbox) = bbox {
                group.bounding_box = bbox;
            }
        }
    }
}
