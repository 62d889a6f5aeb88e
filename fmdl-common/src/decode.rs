//! Container → model
//!
//! Reads every table, checks each cross reference, and builds a [`Model`].
//! Stops at the first fault. Optional transforms are undone later by the
//! pipeline, not here.

use std::collections::BTreeSet;

use fmdl_container::Container;
use glam::Vec4;
use smallvec::SmallVec;

use crate::encoding::VertexEncoding;
use crate::error::FormatError;
use crate::extensions::{ExtensionHeaders, MeshGroupMarker, MeshMarker};
use crate::formats::{
    AssignmentRecord, BoneGroupRecord, BoneRecord, BoundingBoxRecord, BufferOffsetRecord,
    DatumFormat, DatumType, FaceIndexRecord, LodRecord, MAX_UV_SLOTS, MaterialInstanceRecord,
    MaterialRecord, MeshFormatAssignmentRecord, MeshFormatRecord, MeshGroupAssignmentRecord,
    MeshGroupRecord, MeshRecord, Record, StringRecord, TextureRecord, VertexFormatRecord, blob,
    block,
};
use crate::model::{
    Bone, BoneId, BoundingBox, Face, MaterialId, MaterialInstance, Mesh, MeshGroup, MeshGroupId,
    MeshId, Model, Texture, VertexFields,
};

/// Build a model from a parsed container.
pub fn decode_container(container: &Container) -> Result<Model, FormatError> {
    let (strings, extension_headers) = read_strings(container)?;
    let mut decoder = Decoder {
        container,
        strings,
        bounding_boxes: records::<BoundingBoxRecord>(container)
            .into_iter()
            .map(|record| record.0)
            .collect(),
        extension_headers: extension_headers.unwrap_or_default(),
    };

    let bones = decoder.bones()?;
    let materials = decoder.materials()?;
    let mut meshes = decoder.meshes(&bones, materials.len())?;
    let mut mesh_groups = decoder.mesh_groups(meshes.len())?;

    let headers = &mut decoder.extension_headers;
    for marker in MeshMarker::ALL {
        for index in headers.take_marker_indices(marker.header_name(), meshes.len()) {
            meshes[index].markers.insert(marker);
        }
    }
    for marker in MeshGroupMarker::ALL {
        for index in headers.take_marker_indices(marker.header_name(), mesh_groups.len()) {
            mesh_groups[index].markers.insert(marker);
        }
    }

    tracing::debug!(
        bones = bones.len(),
        materials = materials.len(),
        meshes = meshes.len(),
        mesh_groups = mesh_groups.len(),
        "decoded model tables"
    );

    Ok(Model {
        bones,
        materials,
        meshes,
        mesh_groups,
        extension_headers: decoder.extension_headers,
    })
}

fn records<R: Record>(container: &Container) -> Vec<R> {
    container
        .entries(R::BLOCK)
        .filter_map(R::deserialize)
        .collect()
}

fn reference<'a, T>(items: &'a [T], index: usize, kind: &'static str, referrer: &'static str) -> Result<&'a T, FormatError> {
    items.get(index).ok_or(FormatError::InvalidReference {
        kind,
        index,
        referrer,
    })
}

fn read_bytes<const N: usize>(buffer: &[u8], offset: usize, what: &'static str) -> Result<[u8; N], FormatError> {
    offset
        .checked_add(N)
        .and_then(|end| buffer.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or(FormatError::OutOfBounds {
            what,
            offset,
            length: N,
        })
}

/// Follow parent links from every node and fail on the first loop.
fn check_parent_cycles(parents: &[Option<usize>], fault: fn(usize) -> FormatError) -> Result<(), FormatError> {
    for start in 0..parents.len() {
        let mut current = parents[start];
        let mut steps = 0;
        while let Some(parent) = current {
            steps += 1;
            if steps > parents.len() {
                return Err(fault(start));
            }
            current = parents.get(parent).copied().flatten();
        }
    }
    Ok(())
}

// ============================================================================
// Strings
// ============================================================================

/// All strings, plus the extension headers trailing the last pool string.
fn read_strings(container: &Container) -> Result<(Vec<String>, Option<ExtensionHeaders>), FormatError> {
    if !container.has_entries_block(block::STRINGS) {
        return Ok((Vec::new(), None));
    }

    let mut strings = Vec::new();
    let mut last_string_end = 0usize;
    for record in records::<StringRecord>(container) {
        let source = container
            .block(u32::from(record.block))
            .ok_or(FormatError::InvalidReference {
                kind: "block",
                index: usize::from(record.block),
                referrer: "string",
            })?;
        let offset = record.offset as usize;
        let length = usize::from(record.length);
        let bytes = source
            .get(offset..offset + length)
            .ok_or(FormatError::OutOfBounds {
                what: "string",
                offset,
                length,
            })?;
        let string = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8(offset))?;
        strings.push(string.to_string());

        if u32::from(record.block) == blob::STRING_POOL {
            last_string_end = last_string_end.max(offset + length);
        }
    }

    let pool = container.block(blob::STRING_POOL).unwrap_or(&[]);
    let start = last_string_end + 1;
    let headers = match pool.get(start..) {
        Some(tail) if !tail.is_empty() => {
            let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
            let text = std::str::from_utf8(&tail[..end]).map_err(|_| FormatError::InvalidUtf8(start))?;
            ExtensionHeaders::parse(text)
        }
        _ => None,
    };

    Ok((strings, headers))
}

// ============================================================================
// Vertex layout
// ============================================================================

/// Where one datum of a mesh's vertices lives in the vertex buffer
#[derive(Debug, Clone, Copy)]
struct DatumLocation {
    datum: DatumType,
    offset: usize,
    stride: usize,
}

/// A mesh format assignment resolved to absolute buffer locations
#[derive(Debug, Clone)]
struct VertexLayout {
    locations: Vec<DatumLocation>,
    fields: VertexFields,
}

impl VertexLayout {
    fn resolve(
        assignment: &MeshFormatAssignmentRecord,
        mesh_formats: &[MeshFormatRecord],
        vertex_formats: &[VertexFormatRecord],
        buffer_offsets: &[BufferOffsetRecord],
    ) -> Result<Self, FormatError> {
        let first_mesh_format = usize::from(assignment.first_mesh_format);
        let mesh_format_end = first_mesh_format + usize::from(assignment.mesh_format_count);
        let formats = mesh_formats
            .get(first_mesh_format..mesh_format_end)
            .ok_or(FormatError::InvalidReference {
                kind: "mesh format",
                index: mesh_format_end,
                referrer: "mesh format assignment",
            })?;

        let first_vertex_format = usize::from(assignment.first_vertex_format);
        let vertex_format_end = first_vertex_format + usize::from(assignment.vertex_format_count);
        let entries = vertex_formats
            .get(first_vertex_format..vertex_format_end)
            .ok_or(FormatError::InvalidReference {
                kind: "vertex format",
                index: vertex_format_end,
                referrer: "mesh format assignment",
            })?;

        // Each mesh format covers the next `vertex_format_count` vertex formats.
        let mut bases = Vec::with_capacity(entries.len());
        for format in formats {
            let buffer = reference(
                buffer_offsets,
                usize::from(format.buffer),
                "buffer offset",
                "mesh format",
            )?;
            let base = buffer.offset as usize + format.buffer_offset as usize;
            let stride = usize::from(format.stride);
            bases.extend(std::iter::repeat_n((base, stride), usize::from(format.vertex_format_count)));
        }
        if bases.len() != entries.len() {
            return Err(FormatError::VertexFormatCount {
                expected: entries.len(),
                found: bases.len(),
            });
        }

        let mut locations: Vec<DatumLocation> = Vec::with_capacity(entries.len());
        let mut fields = VertexFields::default();
        let mut uv_offsets = [None; MAX_UV_SLOTS];
        let (mut weights, mut indices) = (false, false);

        for (entry, &(base, stride)) in entries.iter().zip(&bases) {
            let datum = DatumType::try_from(entry.datum_type)?;
            let format = DatumFormat::try_from(entry.datum_format)?;
            if locations.iter().any(|location| location.datum == datum) {
                return Err(FormatError::DuplicateDatumType(datum));
            }
            if format != datum.expected_format() {
                return Err(FormatError::UnexpectedDatumFormat { datum, format });
            }

            let offset = base + usize::from(entry.offset);
            match datum {
                DatumType::Position => {}
                DatumType::Normal => fields.normal = true,
                DatumType::Tangent => fields.tangent = true,
                DatumType::Color => fields.color = true,
                DatumType::BoneWeights => weights = true,
                DatumType::BoneIndices => indices = true,
                DatumType::Uv0 | DatumType::Uv1 | DatumType::Uv2 | DatumType::Uv3 => {
                    if let Some(slot) = datum.uv_slot() {
                        uv_offsets[slot] = Some(offset);
                    }
                }
            }
            locations.push(DatumLocation {
                datum,
                offset,
                stride,
            });
        }

        for slot in 1..MAX_UV_SLOTS {
            if uv_offsets[slot].is_some() && uv_offsets[slot - 1].is_none() {
                return Err(FormatError::NonMonotonicUv {
                    present: slot,
                    missing: slot - 1,
                });
            }
        }
        if weights != indices {
            return Err(FormatError::IncompleteBoneMapping);
        }
        fields.bone_mapping = weights;
        fields.uv_count = uv_offsets.iter().flatten().count();
        for a in 0..fields.uv_count {
            for b in 0..fields.uv_count {
                if a != b && uv_offsets[a] == uv_offsets[b] {
                    fields.set_uv_equal(a, b);
                }
            }
        }

        Ok(Self { locations, fields })
    }

    /// Read one vertex. Bone indices outside `bone_group` are dropped.
    fn read_vertex(
        &self,
        buffer: &[u8],
        index: usize,
        bone_group: &[BoneId],
        mesh: usize,
    ) -> Result<VertexEncoding, FormatError> {
        let mut encoding = VertexEncoding::default();
        let mut uv: [Option<[u8; 4]>; MAX_UV_SLOTS] = [None; MAX_UV_SLOTS];
        let mut weights = [0u8; 4];
        let mut indices = [0u8; 4];

        for location in &self.locations {
            let at = location.offset + index * location.stride;
            match location.datum {
                DatumType::Position => encoding.position = read_bytes(buffer, at, "vertex position")?,
                DatumType::Normal => encoding.normal = Some(read_bytes(buffer, at, "vertex normal")?),
                DatumType::Tangent => encoding.tangent = Some(read_bytes(buffer, at, "vertex tangent")?),
                DatumType::Color => encoding.color = Some(read_bytes(buffer, at, "vertex color")?),
                DatumType::BoneWeights => weights = read_bytes(buffer, at, "vertex bone weights")?,
                DatumType::BoneIndices => indices = read_bytes(buffer, at, "vertex bone indices")?,
                datum => {
                    if let Some(slot) = datum.uv_slot() {
                        uv[slot] = Some(read_bytes(buffer, at, "vertex uv")?);
                    }
                }
            }
        }

        encoding.uv = uv.into_iter().flatten().collect();
        if self.fields.bone_mapping {
            let mut mapping = SmallVec::new();
            for (&weight, &bone_index) in weights.iter().zip(&indices) {
                if weight == 0 {
                    continue;
                }
                match bone_group.get(usize::from(bone_index)) {
                    Some(&bone) => mapping.push((bone, weight)),
                    None => tracing::warn!(
                        mesh,
                        vertex = index,
                        bone_index,
                        "vertex references bone outside its bone group, ignoring weight"
                    ),
                }
            }
            encoding.bone_mapping = mapping;
        }
        Ok(encoding)
    }
}

// ============================================================================
// Tables
// ============================================================================

struct Decoder<'a> {
    container: &'a Container,
    strings: Vec<String>,
    bounding_boxes: Vec<BoundingBox>,
    extension_headers: ExtensionHeaders,
}

impl Decoder<'_> {
    fn string(&self, index: u16, referrer: &'static str) -> Result<String, FormatError> {
        reference(&self.strings, usize::from(index), "string", referrer).cloned()
    }

    fn bounding_box(&self, index: u16, referrer: &'static str) -> Result<BoundingBox, FormatError> {
        reference(&self.bounding_boxes, usize::from(index), "bounding box", referrer).copied()
    }

    fn bones(&self) -> Result<Vec<Bone>, FormatError> {
        let records = records::<BoneRecord>(self.container);
        let mut bones = Vec::with_capacity(records.len());
        for record in &records {
            let parent = match usize::try_from(record.parent) {
                Ok(parent) if parent >= records.len() => {
                    return Err(FormatError::InvalidReference {
                        kind: "bone parent",
                        index: parent,
                        referrer: "bone",
                    });
                }
                Ok(parent) => Some(BoneId(parent)),
                Err(_) => None,
            };
            bones.push(Bone {
                name: self.string(record.name, "bone")?,
                parent,
                local_position: record.local_position,
                global_position: record.global_position,
                bounding_box: self.bounding_box(record.bounding_box, "bone")?,
            });
        }

        let parents: Vec<_> = bones.iter().map(|b| b.parent.map(BoneId::index)).collect();
        check_parent_cycles(&parents, FormatError::BoneCycle)?;
        Ok(bones)
    }

    fn materials(&self) -> Result<Vec<MaterialInstance>, FormatError> {
        let materials = records::<MaterialRecord>(self.container);
        let textures = records::<TextureRecord>(self.container);
        let assignments = records::<AssignmentRecord>(self.container);
        let parameters: Vec<Vec4> = self
            .container
            .block(blob::MATERIAL_PARAMETERS)
            .unwrap_or(&[])
            .chunks_exact(16)
            .map(|chunk| {
                let float = |i: usize| f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]]);
                Vec4::new(float(0), float(4), float(8), float(12))
            })
            .collect();

        let mut instances = Vec::new();
        for record in records::<MaterialInstanceRecord>(self.container) {
            let material = reference(&materials, usize::from(record.material), "material", "material instance")?;
            let mut instance = MaterialInstance {
                name: self.string(record.name, "material instance")?,
                shader: self.string(material.shader, "material")?,
                technique: self.string(material.technique, "material")?,
                textures: Vec::new(),
                parameters: Vec::new(),
            };

            let first = usize::from(record.first_texture);
            for index in first..first + usize::from(record.texture_count) {
                let assignment = reference(&assignments, index, "texture assignment", "material instance")?;
                let texture = reference(&textures, usize::from(assignment.reference), "texture", "texture assignment")?;
                instance.textures.push((
                    self.string(assignment.name, "texture assignment")?,
                    Texture {
                        directory: self.string(texture.directory, "texture")?,
                        filename: self.string(texture.filename, "texture")?,
                    },
                ));
            }

            let first = usize::from(record.first_parameter);
            for index in first..first + usize::from(record.parameter_count) {
                let assignment = reference(&assignments, index, "parameter assignment", "material instance")?;
                let value = reference(&parameters, usize::from(assignment.reference), "material parameter", "parameter assignment")?;
                instance
                    .parameters
                    .push((self.string(assignment.name, "parameter assignment")?, *value));
            }
            instances.push(instance);
        }
        Ok(instances)
    }

    fn meshes(&self, bones: &[Bone], material_count: usize) -> Result<Vec<Mesh>, FormatError> {
        if !self.container.has_entries_block(block::MESHES) {
            return Ok(Vec::new());
        }

        let lods = self.container.entry_count(LodRecord::BLOCK);
        if lods != 1 {
            return Err(FormatError::LevelOfDetailCount(lods));
        }
        let buffer_offsets = records::<BufferOffsetRecord>(self.container);
        if buffer_offsets.len() < 3 {
            return Err(FormatError::MissingBlock("face buffer"));
        }

        let mut bone_groups = Vec::new();
        for record in records::<BoneGroupRecord>(self.container) {
            let group = record
                .bones
                .iter()
                .map(|&bone| {
                    reference(bones, usize::from(bone), "bone", "bone group").map(|_| BoneId(usize::from(bone)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            bone_groups.push(group);
        }

        let mesh_formats = records::<MeshFormatRecord>(self.container);
        let vertex_formats = records::<VertexFormatRecord>(self.container);
        let layouts = records::<MeshFormatAssignmentRecord>(self.container)
            .iter()
            .map(|assignment| VertexLayout::resolve(assignment, &mesh_formats, &vertex_formats, &buffer_offsets))
            .collect::<Result<Vec<_>, _>>()?;
        let face_indices = records::<FaceIndexRecord>(self.container);
        let buffer = self
            .container
            .block(blob::VERTEX_BUFFER)
            .ok_or(FormatError::MissingBlock("vertex buffer"))?;
        let face_base = buffer_offsets[2].offset as usize;

        let mut meshes = Vec::new();
        for (mesh_index, record) in records::<MeshRecord>(self.container).iter().enumerate() {
            let layout = reference(&layouts, usize::from(record.mesh_format_assignment), "mesh format assignment", "mesh")?;
            if usize::from(record.material_instance) >= material_count {
                return Err(FormatError::InvalidReference {
                    kind: "material instance",
                    index: usize::from(record.material_instance),
                    referrer: "mesh",
                });
            }
            let bone_group = if layout.fields.bone_mapping {
                reference(&bone_groups, usize::from(record.bone_group), "bone group", "mesh")?.clone()
            } else {
                Vec::new()
            };

            let lod = usize::try_from(record.first_face_index)
                .ok()
                .and_then(|index| face_indices.get(index))
                .ok_or(FormatError::InvalidReference {
                    kind: "face index",
                    index: record.first_face_index as usize,
                    referrer: "mesh",
                })?;

            let vertex_count = usize::from(record.vertex_count);
            let encodings = (0..vertex_count)
                .map(|vertex| layout.read_vertex(buffer, vertex, &bone_group, mesh_index))
                .collect::<Result<Vec<_>, _>>()?;

            let first_face_vertex = record.first_face_vertex as usize + lod.first_face_vertex as usize;
            let mut faces = Vec::with_capacity(lod.face_vertex_count as usize / 3);
            for face in 0..lod.face_vertex_count as usize / 3 {
                let at = face_base + (first_face_vertex + face * 3) * 2;
                let mut corners = [0usize; 3];
                for (corner, slot) in corners.iter_mut().enumerate() {
                    let index = usize::from(u16::from_le_bytes(read_bytes(buffer, at + corner * 2, "face")?));
                    if index >= vertex_count {
                        return Err(FormatError::InvalidReference {
                            kind: "vertex",
                            index,
                            referrer: "face",
                        });
                    }
                    *slot = index;
                }
                faces.push(Face(corners));
            }

            meshes.push(Mesh {
                vertices: encodings.iter().map(VertexEncoding::to_vertex).collect(),
                faces,
                bone_group,
                material: MaterialId(usize::from(record.material_instance)),
                alpha: record.alpha,
                shadow: record.shadow,
                vertex_fields: layout.fields,
                markers: BTreeSet::new(),
                vertex_encoding: Some(encodings),
            });
        }
        Ok(meshes)
    }

    fn mesh_groups(&self, mesh_count: usize) -> Result<Vec<MeshGroup>, FormatError> {
        let group_records = records::<MeshGroupRecord>(self.container);
        let mut groups = Vec::with_capacity(group_records.len());
        for record in &group_records {
            let parent = match usize::try_from(record.parent) {
                Ok(parent) if parent >= group_records.len() => {
                    return Err(FormatError::InvalidReference {
                        kind: "mesh group parent",
                        index: parent,
                        referrer: "mesh group",
                    });
                }
                Ok(parent) => Some(MeshGroupId(parent)),
                Err(_) => None,
            };
            groups.push(MeshGroup {
                name: self.string(record.name, "mesh group")?,
                parent,
                visible: !record.invisible,
                ..Default::default()
            });
        }

        let parents: Vec<_> = groups.iter().map(|g| g.parent.map(MeshGroupId::index)).collect();
        check_parent_cycles(&parents, FormatError::MeshGroupCycle)?;

        let mut assigned: Vec<Option<usize>> = vec![None; mesh_count];
        let mut group_boxes: Vec<Option<BoundingBox>> = vec![None; groups.len()];
        for assignment in records::<MeshGroupAssignmentRecord>(self.container) {
            let group = usize::from(assignment.mesh_group);
            if group >= groups.len() {
                return Err(FormatError::InvalidReference {
                    kind: "mesh group",
                    index: group,
                    referrer: "mesh group assignment",
                });
            }
            let first = usize::from(assignment.first_mesh);
            let end = first + usize::from(assignment.mesh_count);
            if end > mesh_count {
                return Err(FormatError::InvalidReference {
                    kind: "mesh",
                    index: end,
                    referrer: "mesh group assignment",
                });
            }
            let bounding_box = self.bounding_box(assignment.bounding_box, "mesh group assignment")?;

            for mesh in first..end {
                if assigned[mesh].is_some() {
                    return Err(FormatError::DoubleAssignment(mesh));
                }
                assigned[mesh] = Some(group);
            }
            match group_boxes[group] {
                Some(existing) if existing != bounding_box => {
                    return Err(FormatError::ConflictingBoundingBox(group));
                }
                _ => group_boxes[group] = Some(bounding_box),
            }
        }

        for (mesh, group) in assigned.iter().enumerate() {
            let group = group.ok_or(FormatError::UnassignedMesh(mesh))?;
            groups[group].meshes.push(MeshId(mesh));
        }
        for (group, bounding_box) in groups.iter_mut().zip(group_boxes) {
            group.bounding_box = bounding_box.unwrap_or_default();
        }
        Ok(groups)
    }
}
