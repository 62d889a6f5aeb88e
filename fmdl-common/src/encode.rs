//! Model → container
//!
//! Writes tables in a fixed order: strings first (the empty string is always
//! string 0), then bones, material instances, meshes with their vertex and
//! face data, mesh groups, and finally extension headers and the
//! fixed-content blocks. The model is assumed to have passed validation.

use fmdl_container::{Container, ContainerError};
use hashbrown::HashMap;

use crate::error::{ExportError, InternalFault};
use crate::formats::{
    AssignmentRecord, BoneGroupRecord, BoneRecord, BoundingBoxRecord, BufferOffsetRecord,
    DatumType, EmittedLayout, FaceIndexRecord, LodRecord, MaterialInstanceRecord, MaterialRecord,
    MeshFormatAssignmentRecord, MeshFormatRecord, MeshGroupAssignmentRecord, MeshGroupRecord,
    MeshRecord, Record, StringRecord, TextureRecord, Unknown18Record, Unknown20Record,
    VertexFormatRecord, blob,
};
use crate::model::{BoneId, BoundingBox, MaterialInstance, Mesh, MeshId, Model};

/// Serialize a model to a container.
pub fn encode_model(model: &Model) -> Result<Container, ExportError> {
    let mut encoder = Encoder {
        container: Container::new(),
        strings: HashMap::new(),
    };
    encoder.string("")?;

    encoder.bones(model)?;
    let material_ids = model
        .materials
        .iter()
        .map(|material| encoder.material_instance(material))
        .collect::<Result<Vec<_>, _>>()?;
    encoder.meshes(model, &material_ids)?;
    encoder.mesh_groups(model)?;
    encoder.extension_headers(model);

    let container = &mut encoder.container;
    container.push_entry(Unknown18Record::BLOCK, &Unknown18Record.serialize())?;
    container.push_entry(Unknown20Record::BLOCK, &Unknown20Record.serialize())?;

    for id in [blob::MATERIAL_PARAMETERS, blob::VERTEX_BUFFER, blob::STRING_POOL] {
        container.block_mut(id);
    }
    if !model.bones.is_empty() {
        container.block_mut(blob::BONE_EXTRA);
    }

    tracing::debug!(
        blocks = container.entries_block_ids().count(),
        strings = encoder.strings.len(),
        "encoded model"
    );
    Ok(encoder.container)
}

/// Convert an entry index to the 16-bit form records store.
fn index16(block: u16, index: usize) -> Result<u16, ContainerError> {
    u16::try_from(index).map_err(|_| ContainerError::TooManyEntries {
        id: block,
        count: index + 1,
    })
}

fn pad_to_16(buffer: &mut Vec<u8>) {
    let remainder = buffer.len() % 16;
    if remainder != 0 {
        buffer.resize(buffer.len() + 16 - remainder, 0);
    }
}

fn to_u32(value: usize) -> Result<u32, ContainerError> {
    u32::try_from(value).map_err(|_| ContainerError::TooLarge)
}

/// Material instance records count their textures and parameters in a byte.
fn count8(material: &str, what: &str, count: usize) -> Result<u8, ExportError> {
    u8::try_from(count).map_err(|_| ExportError::Validation {
        errors: vec![format!(
            "material instance '{material}' has {count} {what} (max {})",
            u8::MAX
        )],
    })
}

struct Encoder {
    container: Container,
    strings: HashMap<String, u16>,
}

impl Encoder {
    fn push<R: Record>(&mut self, record: &R) -> Result<u16, ContainerError> {
        let index = self.container.push_entry(R::BLOCK, &record.serialize())?;
        index16(R::BLOCK, index)
    }

    fn string(&mut self, value: &str) -> Result<u16, ContainerError> {
        if let Some(&index) = self.strings.get(value) {
            return Ok(index);
        }
        let pool = self.container.block_mut(blob::STRING_POOL);
        let offset = to_u32(pool.len())?;
        pool.extend_from_slice(value.as_bytes());
        pool.push(0);
        let length = u16::try_from(value.len()).map_err(|_| ContainerError::TooLarge)?;

        let index = self.push(&StringRecord {
            block: blob::STRING_POOL as u16,
            length,
            offset,
        })?;
        self.strings.insert(value.to_string(), index);
        Ok(index)
    }

    fn bounding_box(&mut self, bounding_box: BoundingBox) -> Result<u16, ContainerError> {
        self.push(&BoundingBoxRecord(bounding_box))
    }

    fn bones(&mut self, model: &Model) -> Result<(), ContainerError> {
        for bone in &model.bones {
            let record = BoneRecord {
                name: self.string(&bone.name)?,
                parent: match bone.parent {
                    Some(parent) => i16::try_from(parent.0).map_err(|_| ContainerError::TooManyEntries {
                        id: BoneRecord::BLOCK,
                        count: parent.0 + 1,
                    })?,
                    None => -1,
                },
                bounding_box: self.bounding_box(bone.bounding_box)?,
                local_position: bone.local_position,
                global_position: bone.global_position,
            };
            self.push(&record)?;
        }
        Ok(())
    }

    fn material_instance(&mut self, material: &MaterialInstance) -> Result<u16, ExportError> {
        let texture_count = count8(&material.name, "textures", material.textures.len())?;
        let parameter_count = count8(&material.name, "parameters", material.parameters.len())?;
        let name = self.string(&material.name)?;
        let material_record = MaterialRecord {
            shader: self.string(&material.shader)?,
            technique: self.string(&material.technique)?,
        };
        let material_id = self.push(&material_record)?;

        let first_texture = index16(
            AssignmentRecord::BLOCK,
            self.container.entry_count(AssignmentRecord::BLOCK),
        )?;
        for (role, texture) in &material.textures {
            let texture_record = TextureRecord {
                filename: self.string(&texture.filename)?,
                directory: self.string(&texture.directory)?,
            };
            let reference = self.push(&texture_record)?;
            let name = self.string(role)?;
            self.push(&AssignmentRecord { name, reference })?;
        }

        let first_parameter = index16(
            AssignmentRecord::BLOCK,
            self.container.entry_count(AssignmentRecord::BLOCK),
        )?;
        for (parameter, value) in &material.parameters {
            let parameters = self.container.block_mut(blob::MATERIAL_PARAMETERS);
            let reference = index16(AssignmentRecord::BLOCK, parameters.len() / 16)?;
            for component in value.to_array() {
                parameters.extend_from_slice(&component.to_le_bytes());
            }
            let name = self.string(parameter)?;
            self.push(&AssignmentRecord { name, reference })?;
        }

        self.push(&MaterialInstanceRecord {
            name,
            material: material_id,
            texture_count,
            parameter_count,
            first_texture,
            first_parameter,
        })
        .map_err(ExportError::from)
    }

    fn meshes(&mut self, model: &Model, material_ids: &[u16]) -> Result<(), ExportError> {
        self.push(&LodRecord { levels: 1 })?;

        let mut positions = Vec::new();
        let mut data = Vec::new();
        let mut faces = Vec::new();
        for (index, mesh) in model.meshes.iter().enumerate() {
            let material = material_ids.get(mesh.material.0).copied().unwrap_or_default();
            self.mesh(model, index, mesh, material, &mut positions, &mut data, &mut faces)?;
        }

        let (position_length, data_length) = (to_u32(positions.len())?, to_u32(data.len())?);
        self.push(&BufferOffsetRecord {
            last: false,
            length: position_length,
            offset: 0,
        })?;
        self.push(&BufferOffsetRecord {
            last: false,
            length: data_length,
            offset: position_length,
        })?;
        self.push(&BufferOffsetRecord {
            last: true,
            length: to_u32(faces.len())?,
            offset: position_length + data_length,
        })?;

        positions.extend_from_slice(&data);
        positions.extend_from_slice(&faces);
        self.container.set_block(blob::VERTEX_BUFFER, positions);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn mesh(
        &mut self,
        model: &Model,
        index: usize,
        mesh: &Mesh,
        material: u16,
        positions: &mut Vec<u8>,
        data: &mut Vec<u8>,
        faces: &mut Vec<u8>,
    ) -> Result<(), ExportError> {
        let encodings = mesh.encoded_vertices(&model.bones);

        let (bone_group, group_indices) = if mesh.vertex_fields.bone_mapping {
            let group = BoneGroupRecord {
                bones: mesh
                    .bone_group
                    .iter()
                    .map(|bone| index16(BoneRecord::BLOCK, bone.0))
                    .collect::<Result<_, _>>()?,
            };
            let indices: HashMap<BoneId, u8> = mesh
                .bone_group
                .iter()
                .enumerate()
                .map(|(i, &bone)| (bone, i as u8))
                .collect();
            (self.push(&group)?, indices)
        } else {
            (0, HashMap::new())
        };

        let layout = EmittedLayout::new(&mesh.vertex_fields);
        let (position_offset, data_offset) = (to_u32(positions.len())?, to_u32(data.len())?);
        let first_vertex_format = index16(
            VertexFormatRecord::BLOCK,
            self.container.entry_count(VertexFormatRecord::BLOCK),
        )?;
        for record in &layout.vertex_formats {
            self.push(record)?;
        }
        let first_mesh_format = index16(
            MeshFormatRecord::BLOCK,
            self.container.entry_count(MeshFormatRecord::BLOCK),
        )?;
        let mesh_formats = layout.mesh_formats(position_offset, data_offset);
        for record in &mesh_formats {
            self.push(record)?;
        }
        let format_assignment = self.push(&MeshFormatAssignmentRecord {
            mesh_format_count: mesh_formats.len() as u8,
            vertex_format_count: layout.vertex_formats.len() as u8,
            uv_count: mesh.vertex_fields.uv_count as u8,
            first_mesh_format,
            first_vertex_format,
        })?;

        let mut mesh_positions = vec![0u8; encodings.len() * layout.position_stride];
        let mut mesh_data = vec![0u8; encodings.len() * layout.data_stride];
        for (vertex, encoding) in encodings.iter().enumerate() {
            for entry in &layout.entries {
                let (buffer, stride) = if entry.buffer == 0 {
                    (&mut mesh_positions, layout.position_stride)
                } else {
                    (&mut mesh_data, layout.data_stride)
                };
                let at = vertex * stride + entry.offset;
                let mut weights = [0u8; 4];
                let mut bones = [0u8; 4];
                let bytes: &[u8] = match entry.datum {
                    DatumType::Position => &encoding.position,
                    DatumType::Normal => encoding.normal.as_ref().map_or(&[0; 8][..], |b| &b[..]),
                    DatumType::Tangent => encoding.tangent.as_ref().map_or(&[0; 8][..], |b| &b[..]),
                    DatumType::Color => encoding.color.as_ref().map_or(&[0; 4][..], |b| &b[..]),
                    DatumType::BoneWeights => {
                        for (slot, &(_, weight)) in weights.iter_mut().zip(&encoding.bone_mapping) {
                            *slot = weight;
                        }
                        &weights
                    }
                    DatumType::BoneIndices => {
                        for (slot, &(bone, _)) in bones.iter_mut().zip(&encoding.bone_mapping) {
                            *slot = *group_indices.get(&bone).ok_or(InternalFault::UnresolvedBoneIndex {
                                mesh: index,
                                bone: bone.0,
                            })?;
                        }
                        &bones
                    }
                    datum => datum
                        .uv_slot()
                        .and_then(|slot| encoding.uv.get(slot))
                        .map_or(&[0; 4][..], |b| &b[..]),
                };
                buffer[at..at + bytes.len()].copy_from_slice(bytes);
            }
        }
        pad_to_16(&mut mesh_positions);
        pad_to_16(&mut mesh_data);
        positions.extend_from_slice(&mesh_positions);
        data.extend_from_slice(&mesh_data);

        let face_vertex_count = to_u32(mesh.faces.len() * 3)?;
        let first_face_index = self.container.entry_count(FaceIndexRecord::BLOCK) as u64;
        self.push(&FaceIndexRecord {
            first_face_vertex: 0,
            face_vertex_count,
        })?;
        let first_face_vertex = to_u32(faces.len() / 2)?;
        for face in &mesh.faces {
            for &corner in &face.0 {
                faces.extend_from_slice(&index16(MeshRecord::BLOCK, corner)?.to_le_bytes());
            }
        }

        self.push(&MeshRecord {
            alpha: mesh.alpha,
            shadow: mesh.shadow,
            material_instance: material,
            bone_group,
            mesh_format_assignment: format_assignment,
            vertex_count: index16(MeshRecord::BLOCK, encodings.len())?,
            first_face_vertex,
            face_vertex_count,
            first_face_index,
        })?;
        Ok(())
    }

    fn mesh_groups(&mut self, model: &Model) -> Result<(), ContainerError> {
        self.container.ensure_entries_block(MeshGroupRecord::BLOCK)?;
        for group in &model.mesh_groups {
            let record = MeshGroupRecord {
                name: self.string(&group.name)?,
                invisible: !group.visible,
                parent: match group.parent {
                    Some(parent) => i16::try_from(parent.0).map_err(|_| ContainerError::TooManyEntries {
                        id: MeshGroupRecord::BLOCK,
                        count: parent.0 + 1,
                    })?,
                    None => -1,
                },
            };
            let mesh_group = self.push(&record)?;
            let bounding_box = self.bounding_box(group.bounding_box)?;

            // Runs of consecutive mesh ids share one assignment.
            let mut runs: Vec<(MeshId, usize)> = Vec::new();
            for &mesh in &group.meshes {
                match runs.last_mut() {
                    Some((first, count)) if first.0 + *count == mesh.0 => *count += 1,
                    _ => runs.push((mesh, 1)),
                }
            }
            if runs.is_empty() {
                runs.push((MeshId(0), 0));
            }
            for (first, count) in runs {
                self.push(&MeshGroupAssignmentRecord {
                    mesh_group,
                    mesh_count: index16(MeshGroupAssignmentRecord::BLOCK, count)?,
                    first_mesh: index16(MeshGroupAssignmentRecord::BLOCK, first.0)?,
                    bounding_box,
                })?;
            }
        }
        Ok(())
    }

    /// Append the header text after the last string.
    fn extension_headers(&mut self, model: &Model) {
        let mut headers = model.extension_headers.clone();
        for (index, mesh) in model.meshes.iter().enumerate() {
            for marker in &mesh.markers {
                headers.append(marker.header_name(), [index.to_string()]);
            }
        }
        for (index, group) in model.mesh_groups.iter().enumerate() {
            for marker in &group.markers {
                headers.append(marker.header_name(), [index.to_string()]);
            }
        }

        if let Some(text) = headers.to_text() {
            let pool = self.container.block_mut(blob::STRING_POOL);
            pool.extend_from_slice(text.as_bytes());
            pool.push(0);
        }
    }
}
