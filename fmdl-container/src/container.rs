//! Block container reader and writer

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::slice::ChunksExact;

use crate::header::{Header, Segment0Descriptor, Segment1Descriptor};
use crate::io::{padding_for, slice_at};
use crate::{
    BLOCK_ALIGNMENT, ContainerError, HEADER_REGION_SIZE, TAIL_BLOCK_ID, VERSION, entry_size,
};

/// An FMDL container: fixed-entry segment-0 blocks and free-form segment-1 blocks.
///
/// Entries are opaque byte records; interpreting them is the model layer's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    pub version: u32,
    /// Block ID → entries stored back to back (`entry_size(id)` bytes each)
    segment0: BTreeMap<u16, Vec<u8>>,
    segment1: BTreeMap<u32, Vec<u8>>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self {
            version: VERSION,
            segment0: BTreeMap::new(),
            segment1: BTreeMap::new(),
        }
    }

    // ========================================================================
    // Segment 0
    // ========================================================================

    /// Entries of a segment-0 block. A missing block yields no entries.
    pub fn entries(&self, id: u16) -> ChunksExact<'_, u8> {
        let size = entry_size(id).unwrap_or(1);
        self.segment0
            .get(&id)
            .map_or(&[][..], Vec::as_slice)
            .chunks_exact(size)
    }

    pub fn entry_count(&self, id: u16) -> usize {
        self.entries(id).len()
    }

    pub fn has_entries_block(&self, id: u16) -> bool {
        self.segment0.contains_key(&id)
    }

    /// Append one entry to a segment-0 block and return its index.
    pub fn push_entry(&mut self, id: u16, entry: &[u8]) -> Result<usize, ContainerError> {
        let expected = entry_size(id).ok_or(ContainerError::UnknownBlock(id))?;
        if entry.len() != expected {
            return Err(ContainerError::EntrySize {
                id,
                expected,
                actual: entry.len(),
            });
        }
        let block = self.segment0.entry(id).or_default();
        block.extend_from_slice(entry);
        Ok(block.len() / expected - 1)
    }

    /// Make sure a segment-0 block exists, even if it stays empty.
    pub fn ensure_entries_block(&mut self, id: u16) -> Result<(), ContainerError> {
        entry_size(id).ok_or(ContainerError::UnknownBlock(id))?;
        self.segment0.entry(id).or_default();
        Ok(())
    }

    pub fn entries_block_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.segment0.keys().copied()
    }

    // ========================================================================
    // Segment 1
    // ========================================================================

    pub fn block(&self, id: u32) -> Option<&[u8]> {
        self.segment1.get(&id).map(Vec::as_slice)
    }

    /// Mutable access to a segment-1 block, creating it empty if absent.
    pub fn block_mut(&mut self, id: u32) -> &mut Vec<u8> {
        self.segment1.entry(id).or_default()
    }

    pub fn set_block(&mut self, id: u32, data: Vec<u8>) {
        self.segment1.insert(id, data);
    }

    pub fn block_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.segment1.keys().copied()
    }

    // ========================================================================
    // Reading
    // ========================================================================

    pub fn read_from(mut reader: impl Read) -> Result<Self, ContainerError> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parse a container from a complete file image.
    ///
    /// Segment-0 blocks with unknown IDs are skipped. Segment-1 lengths that
    /// run past the end of the file are clamped, as is the tail block.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ContainerError> {
        let header_bytes = data
            .get(..Header::SIZE)
            .ok_or_else(|| ContainerError::Truncated("header".to_string()))?;
        let header = Header::from_bytes(header_bytes)?;

        let mut cursor = Cursor::new(data);
        cursor.set_position(header.descriptors_offset);
        let segment0_descriptors = (0..header.segment0_count)
            .map(|_| Segment0Descriptor::read(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;
        let segment1_descriptors = (0..header.segment1_count)
            .map(|_| Segment1Descriptor::read(&mut cursor))
            .collect::<Result<Vec<_>, _>>()?;

        let mut container = Self {
            version: header.version,
            ..Self::new()
        };

        for descriptor in segment0_descriptors {
            let Some(size) = entry_size(descriptor.id) else {
                tracing::debug!(id = descriptor.id, "skipping unknown segment 0 block");
                continue;
            };
            if container.segment0.contains_key(&descriptor.id) {
                return Err(ContainerError::DuplicateBlock {
                    segment: 0,
                    id: u32::from(descriptor.id),
                });
            }
            let offset = u64::from(descriptor.offset) + u64::from(header.segment0_offset);
            let length = size as u64 * u64::from(descriptor.entry_count);
            let bytes = slice_at(data, offset, length, || {
                format!("segment 0 block {} entry", descriptor.id)
            })?;
            container.segment0.insert(descriptor.id, bytes.to_vec());
        }

        let file_length = data.len() as u64;
        for descriptor in segment1_descriptors {
            if container.segment1.contains_key(&descriptor.id) {
                return Err(ContainerError::DuplicateBlock {
                    segment: 1,
                    id: descriptor.id,
                });
            }
            let offset = u64::from(descriptor.offset) + u64::from(header.segment1_offset);
            let remaining = file_length.checked_sub(offset).ok_or_else(|| {
                ContainerError::Truncated(format!("segment 1 block {}", descriptor.id))
            })?;
            let mut length = u64::from(descriptor.length);
            if length > remaining || descriptor.id == TAIL_BLOCK_ID {
                length = remaining;
            }
            let bytes = slice_at(data, offset, length, || {
                format!("segment 1 block {}", descriptor.id)
            })?;
            container.segment1.insert(descriptor.id, bytes.to_vec());
        }

        tracing::debug!(
            segment0 = container.segment0.len(),
            segment1 = container.segment1.len(),
            "read container"
        );
        Ok(container)
    }

    // ========================================================================
    // Writing
    // ========================================================================

    pub fn write_to(&self, mut writer: impl Write) -> Result<(), ContainerError> {
        writer.write_all(&self.to_bytes()?)?;
        Ok(())
    }

    /// Serialize the container.
    ///
    /// Layout: header, descriptors, segment 0, segment 1. Blocks appear in
    /// ascending ID order and each segment-0 block is padded to 16 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContainerError> {
        let mut descriptors = Vec::new();
        let mut segment0 = Vec::new();
        let mut segment0_bitmap = 0u64;
        for (&id, block) in &self.segment0 {
            let count = self.entry_count(id);
            let entry_count =
                u16::try_from(count).map_err(|_| ContainerError::TooManyEntries { id, count })?;
            let descriptor = Segment0Descriptor {
                id,
                entry_count,
                offset: to_u32(segment0.len())?,
            };
            descriptors.extend_from_slice(&descriptor.to_bytes());
            segment0.extend_from_slice(block);
            segment0.resize(segment0.len() + padding_for(block.len(), BLOCK_ALIGNMENT), 0);
            segment0_bitmap |= 1u64.checked_shl(u32::from(id)).unwrap_or(0);
        }
        segment0.resize(segment0.len() + padding_for(segment0.len(), BLOCK_ALIGNMENT), 0);

        let mut segment1 = Vec::new();
        let mut segment1_bitmap = 0u64;
        for (&id, block) in &self.segment1 {
            let descriptor = Segment1Descriptor {
                id,
                offset: to_u32(segment1.len())?,
                length: to_u32(block.len())?,
            };
            descriptors.extend_from_slice(&descriptor.to_bytes());
            segment1.extend_from_slice(block);
            segment1_bitmap |= 1u64.checked_shl(id).unwrap_or(0);
        }
        descriptors.resize(
            descriptors.len() + padding_for(descriptors.len(), BLOCK_ALIGNMENT),
            0,
        );

        let segment0_offset = HEADER_REGION_SIZE + descriptors.len();
        let segment1_offset = segment0_offset + segment0.len();
        let header = Header {
            version: self.version,
            descriptors_offset: HEADER_REGION_SIZE as u64,
            segment0_bitmap,
            segment1_bitmap,
            segment0_count: to_u32(self.segment0.len())?,
            segment1_count: to_u32(self.segment1.len())?,
            segment0_offset: to_u32(segment0_offset)?,
            segment0_length: to_u32(segment0.len())?,
            segment1_offset: to_u32(segment1_offset)?,
            segment1_length: to_u32(segment1.len())?,
        };

        let mut out = Vec::with_capacity(segment1_offset + segment1.len());
        out.extend_from_slice(&header.to_bytes());
        out.resize(HEADER_REGION_SIZE, 0);
        out.extend_from_slice(&descriptors);
        out.extend_from_slice(&segment0);
        out.extend_from_slice(&segment1);
        tracing::debug!(bytes = out.len(), "wrote container");
        Ok(out)
    }
}

fn to_u32(value: usize) -> Result<u32, ContainerError> {
    u32::try_from(value).map_err(|_| ContainerError::TooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Container {
        let mut container = Container::new();
        container.push_entry(8, &[1, 0, 2, 0]).unwrap();
        container.push_entry(8, &[3, 0, 4, 0]).unwrap();
        container.push_entry(12, &[3, 0, 1, 0, 0, 0, 0, 0]).unwrap();
        container.set_block(0, vec![0xAA; 16]);
        container.set_block(3, b"\0s\0t\0".to_vec());
        container
    }

    #[test]
    fn test_write_then_read() {
        let container = sample();
        let bytes = container.to_bytes().unwrap();
        let parsed = Container::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, container);
        assert_eq!(parsed.entry_count(8), 2);
        assert_eq!(parsed.entries(8).nth(1).unwrap(), &[3, 0, 4, 0]);
    }

    #[test]
    fn test_written_layout() {
        let bytes = sample().to_bytes().unwrap();
        let header = Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.descriptors_offset, 64);
        assert_eq!(header.segment0_bitmap, (1 << 8) | (1 << 12));
        assert_eq!(header.segment1_bitmap, 1 | (1 << 3));
        // 4 descriptors: 2 * 8 + 2 * 12 = 40, padded to 48
        assert_eq!(header.segment0_offset, 64 + 48);
        // block 8 (8 bytes) and block 12 (8 bytes), each padded to 16
        assert_eq!(header.segment0_length, 32);
        assert_eq!(header.segment1_length, 16 + 5);
        assert_eq!(bytes.len(), 64 + 48 + 32 + 21);
        assert!(bytes[56..64].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_missing_block_is_empty() {
        let container = sample();
        assert_eq!(container.entries(0).count(), 0);
        assert!(!container.has_entries_block(0));
        assert!(container.block(2).is_none());
    }

    #[test]
    fn test_push_entry_checks_size() {
        let mut container = Container::new();
        assert_eq!(container.push_entry(6, &[0; 4]).unwrap(), 0);
        assert_eq!(container.push_entry(6, &[0; 4]).unwrap(), 1);
        assert!(matches!(
            container.push_entry(6, &[0; 5]),
            Err(ContainerError::EntrySize { id: 6, expected: 4, actual: 5 })
        ));
        assert!(matches!(
            container.push_entry(15, &[0; 4]),
            Err(ContainerError::UnknownBlock(15))
        ));
    }

    #[test]
    fn test_overlong_segment1_block_is_clamped() {
        let mut bytes = sample().to_bytes().unwrap();
        let header = Header::from_bytes(&bytes).unwrap();
        // Segment-1 descriptors follow the two segment-0 descriptors; block 0 first.
        let length_field = 64 + 2 * 8 + 8;
        bytes[length_field..length_field + 4].copy_from_slice(&1000u32.to_le_bytes());
        let parsed = Container::from_bytes(&bytes).unwrap();
        let expected = bytes.len() - header.segment1_offset as usize;
        assert_eq!(parsed.block(0).unwrap().len(), expected);
    }

    #[test]
    fn test_tail_block_takes_remaining_bytes() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.extend_from_slice(b"X-FMDL-Extensions: a\n\0");
        let parsed = Container::from_bytes(&bytes).unwrap();
        assert!(parsed.block(3).unwrap().ends_with(b"a\n\0"));
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        // Rewrite the block 12 descriptor ID to 8.
        bytes[64 + 8] = 8;
        assert!(matches!(
            Container::from_bytes(&bytes),
            Err(ContainerError::DuplicateBlock { segment: 0, id: 8 })
        ));
    }

    #[test]
    fn test_truncated_segment0_rejected() {
        let bytes = sample().to_bytes().unwrap();
        let header = Header::from_bytes(&bytes).unwrap();
        let cut = header.segment0_offset as usize + 4;
        assert!(matches!(
            Container::from_bytes(&bytes[..cut]),
            Err(ContainerError::Truncated(_))
        ));
    }

    #[test]
    fn test_too_many_entries() {
        let mut container = Container::new();
        for _ in 0..=u16::MAX as usize {
            container.push_entry(6, &[0; 4]).unwrap();
        }
        assert!(matches!(
            container.to_bytes(),
            Err(ContainerError::TooManyEntries { id: 6, count: 65536 })
        ));
    }
}
