//! FMDL block container codec
//!
//! An FMDL file is a header, an array of block descriptors and two segments:
//!
//! ```text
//! ┌──────────────┬─────────────┬─────────────────────┬──────────────────────┐
//! │ header (64)  │ descriptors │ segment 0           │ segment 1            │
//! │              │ (16-aligned)│ fixed-size records, │ variable-length      │
//! │              │             │ one table per ID    │ byte blobs           │
//! └──────────────┴─────────────┴─────────────────────┴──────────────────────┘
//! ```
//!
//! Segment-0 blocks are arrays of fixed-size entries whose size is a function
//! of the block ID ([`entry_size`]). Segment-1 blocks are opaque byte blobs.
//! This crate knows nothing about what the records mean.

mod container;
mod error;
mod header;
mod io;

pub use container::Container;
pub use error::ContainerError;
pub use header::{Header, Segment0Descriptor, Segment1Descriptor};

// =============================================================================
// Constants
// =============================================================================

/// File magic
pub const MAGIC: [u8; 4] = *b"FMDL";

/// Format version written by this crate (2.03)
pub const VERSION: u32 = 0x4001_eb85;

/// Bytes reserved for the header; descriptors start right after
pub const HEADER_REGION_SIZE: usize = 64;

/// Segment-0 blocks, the segment-0 total and the descriptor array are padded to this
pub const BLOCK_ALIGNMENT: usize = 16;

/// Segment-1 block whose declared length is always replaced by the bytes
/// remaining in the file (the string pool, which trails extension headers)
pub const TAIL_BLOCK_ID: u32 = 3;

/// Entry size in bytes of a segment-0 block, or `None` for unknown IDs.
pub const fn entry_size(id: u16) -> Option<usize> {
    match id {
        0 => Some(48),
        1 => Some(8),
        2 => Some(32),
        3 => Some(48),
        4 => Some(16),
        5 => Some(68),
        6..=8 => Some(4),
        9 | 10 => Some(8),
        11 => Some(4),
        12 => Some(8),
        13 => Some(32),
        14 => Some(16),
        16 => Some(16),
        17 | 18 => Some(8),
        20 => Some(128),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_size_table() {
        let known: Vec<u16> = (0..64).filter(|&id| entry_size(id).is_some()).collect();
        assert_eq!(
            known,
            [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 18, 20]
        );
        assert_eq!(entry_size(5), Some(68));
        assert_eq!(entry_size(20), Some(128));
        assert_eq!(entry_size(15), None);
    }
}
