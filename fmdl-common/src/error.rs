//! Error types for decoding and encoding models
//!
//! Decoding stops at the first fault ([`FormatError`]). Encoding validates the
//! whole model first and reports every violation at once ([`ExportError`]).

use fmdl_container::ContainerError;

use crate::formats::{DatumFormat, DatumType};

/// A single fatal fault found while decoding a file
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// An index into another table is out of range
    #[error("invalid {kind} {index} referenced by {referrer}")]
    InvalidReference {
        kind: &'static str,
        index: usize,
        referrer: &'static str,
    },

    #[error("invalid vertex datum type {0}")]
    UnknownDatumType(u8),

    #[error("invalid vertex datum format {0}")]
    UnknownDatumFormat(u8),

    #[error("unexpected format {format:?} for vertex {datum:?} data")]
    UnexpectedDatumFormat {
        datum: DatumType,
        format: DatumFormat,
    },

    #[error("duplicate vertex field {0:?} in vertex format definition")]
    DuplicateDatumType(DatumType),

    #[error("non-monotonic UV map in vertex format definition: has uv{present} but not uv{missing}")]
    NonMonotonicUv { present: usize, missing: usize },

    #[error("vertex format contains one of (bone weights, bone indices) but not the other")]
    IncompleteBoneMapping,

    #[error("mesh formats cover {found} vertex formats, assignment declares {expected}")]
    VertexFormatCount { expected: usize, found: usize },

    #[error("bone parent loop detected for bone {0}")]
    BoneCycle(usize),

    #[error("mesh group parent loop detected for mesh group {0}")]
    MeshGroupCycle(usize),

    #[error("expected exactly 1 level of detail record, found {0}")]
    LevelOfDetailCount(usize),

    #[error("missing {0}")]
    MissingBlock(&'static str),

    #[error("mesh {0} not assigned to a mesh group")]
    UnassignedMesh(usize),

    #[error("mesh {0} assigned to more than one mesh group")]
    DoubleAssignment(usize),

    #[error("conflicting bounding boxes assigned to mesh group {0}")]
    ConflictingBoundingBox(usize),

    #[error("invalid UTF-8 in string at offset {0}")]
    InvalidUtf8(usize),

    #[error("{what} at {offset}+{length} lies outside the buffer")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        length: usize,
    },
}

/// Faults that validated input can never trigger
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalFault {
    #[error("bone {bone} weighted in mesh {mesh} is missing from its bone group")]
    UnresolvedBoneIndex { mesh: usize, bone: usize },

    #[error(
        "mesh splitting stalled on mesh {mesh} with {faces} faces and {loose} loose vertex classes left"
    )]
    SplitStalled {
        mesh: usize,
        faces: usize,
        loose: usize,
    },
}

/// Failure to encode a model
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Every violation found in the model, one message each
    #[error("model failed export validation:\n{}", .errors.join("\n"))]
    Validation { errors: Vec<String> },

    #[error(transparent)]
    Internal(#[from] InternalFault),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl ExportError {
    /// Individual messages; a single message for non-validation failures.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ExportError::Validation { errors } => errors.clone(),
            other => vec![other.to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            FormatError::InvalidReference {
                kind: "material instance",
                index: 7,
                referrer: "mesh",
            }
            .to_string(),
            "invalid material instance 7 referenced by mesh"
        );
        assert_eq!(
            FormatError::NonMonotonicUv {
                present: 2,
                missing: 1
            }
            .to_string(),
            "non-monotonic UV map in vertex format definition: has uv2 but not uv1"
        );
        assert_eq!(
            FormatError::UnexpectedDatumFormat {
                datum: DatumType::Normal,
                format: DatumFormat::QuadFloat8,
            }
            .to_string(),
            "unexpected format QuadFloat8 for vertex Normal data"
        );
    }

    #[test]
    fn test_validation_lists_every_error() {
        let err = ExportError::Validation {
            errors: vec!["mesh 0: a".into(), "mesh 3: b".into()],
        };
        assert_eq!(
            err.to_string(),
            "model failed export validation:\nmesh 0: a\nmesh 3: b"
        );
        assert_eq!(err.messages().len(), 2);
    }
}
