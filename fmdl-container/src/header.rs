//! File header and block descriptors
//!
//! ```text
//! Header (56 bytes, little-endian):
//!   0x00  magic               [u8; 4]   "FMDL"
//!   0x04  version             u32
//!   0x08  descriptors_offset  u64       absolute
//!   0x10  segment0_bitmap     u64       bit N set = block N present
//!   0x18  segment1_bitmap     u64
//!   0x20  segment0_count      u32
//!   0x24  segment1_count      u32
//!   0x28  segment0_offset     u32       absolute
//!   0x2C  segment0_length     u32
//!   0x30  segment1_offset     u32       absolute
//!   0x34  segment1_length     u32
//!
//! Segment-0 descriptor (8 bytes):  id u16, entry_count u16, offset u32
//! Segment-1 descriptor (12 bytes): id u32, offset u32, length u32
//! ```
//!
//! Descriptor offsets are relative to the start of their segment.

use std::io::Cursor;

use crate::io::{read_magic, read_u16, read_u32, read_u64};
use crate::{ContainerError, MAGIC};

/// Container file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    pub descriptors_offset: u64,
    pub segment0_bitmap: u64,
    pub segment1_bitmap: u64,
    pub segment0_count: u32,
    pub segment1_count: u32,
    pub segment0_offset: u32,
    pub segment0_length: u32,
    pub segment1_offset: u32,
    pub segment1_length: u32,
}

impl Header {
    pub const SIZE: usize = 56;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..16].copy_from_slice(&self.descriptors_offset.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.segment0_bitmap.to_le_bytes());
        bytes[24..32].copy_from_slice(&self.segment1_bitmap.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.segment0_count.to_le_bytes());
        bytes[36..40].copy_from_slice(&self.segment1_count.to_le_bytes());
        bytes[40..44].copy_from_slice(&self.segment0_offset.to_le_bytes());
        bytes[44..48].copy_from_slice(&self.segment0_length.to_le_bytes());
        bytes[48..52].copy_from_slice(&self.segment1_offset.to_le_bytes());
        bytes[52..56].copy_from_slice(&self.segment1_length.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ContainerError> {
        let mut cursor = Cursor::new(bytes);
        let magic = read_magic(&mut cursor)?;
        if magic != MAGIC {
            return Err(ContainerError::BadMagic(magic));
        }
        Ok(Self {
            version: read_u32(&mut cursor, "header")?,
            descriptors_offset: read_u64(&mut cursor, "header")?,
            segment0_bitmap: read_u64(&mut cursor, "header")?,
            segment1_bitmap: read_u64(&mut cursor, "header")?,
            segment0_count: read_u32(&mut cursor, "header")?,
            segment1_count: read_u32(&mut cursor, "header")?,
            segment0_offset: read_u32(&mut cursor, "header")?,
            segment0_length: read_u32(&mut cursor, "header")?,
            segment1_offset: read_u32(&mut cursor, "header")?,
            segment1_length: read_u32(&mut cursor, "header")?,
        })
    }
}

/// Locates one fixed-entry-size block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment0Descriptor {
    pub id: u16,
    pub entry_count: u16,
    pub offset: u32,
}

impl Segment0Descriptor {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..2].copy_from_slice(&self.id.to_le_bytes());
        bytes[2..4].copy_from_slice(&self.entry_count.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes
    }

    pub(crate) fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, ContainerError> {
        Ok(Self {
            id: read_u16(cursor, "block descriptor")?,
            entry_count: read_u16(cursor, "block descriptor")?,
            offset: read_u32(cursor, "block descriptor")?,
        })
    }
}

/// Locates one variable-length block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment1Descriptor {
    pub id: u32,
    pub offset: u32,
    pub length: u32,
}

impl Segment1Descriptor {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.id.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.offset.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    pub(crate) fn read(cursor: &mut Cursor<&[u8]>) -> Result<Self, ContainerError> {
        Ok(Self {
            id: read_u32(cursor, "block descriptor")?,
            offset: read_u32(cursor, "block descriptor")?,
            length: read_u32(cursor, "block descriptor")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            version: crate::VERSION,
            descriptors_offset: 64,
            segment0_bitmap: 0b1011,
            segment1_bitmap: 0b1101,
            segment0_count: 3,
            segment1_count: 3,
            segment0_offset: 128,
            segment0_length: 96,
            segment1_offset: 224,
            segment1_length: 17,
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_header().to_bytes();
        assert_eq!(&bytes[0..4], b"FMDL");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 0x4001_eb85);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 64);
        assert_eq!(u32::from_le_bytes(bytes[52..56].try_into().unwrap()), 17);
        assert_eq!(Header::from_bytes(&bytes).unwrap(), sample_header());
    }

    #[test]
    fn test_header_bad_magic() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(
            Header::from_bytes(&bytes),
            Err(ContainerError::BadMagic(m)) if &m == b"XMDL"
        ));
    }

    #[test]
    fn test_header_truncated() {
        let bytes = sample_header().to_bytes();
        assert!(matches!(
            Header::from_bytes(&bytes[..40]),
            Err(ContainerError::Truncated(_))
        ));
    }

    #[test]
    fn test_descriptor_layout() {
        let d = Segment0Descriptor {
            id: 12,
            entry_count: 3,
            offset: 0x100,
        };
        assert_eq!(d.to_bytes(), [12, 0, 3, 0, 0, 1, 0, 0]);
        let d = Segment1Descriptor {
            id: 3,
            offset: 0x10,
            length: 5,
        };
        assert_eq!(d.to_bytes(), [3, 0, 0, 0, 0x10, 0, 0, 0, 5, 0, 0, 0]);
    }
}
