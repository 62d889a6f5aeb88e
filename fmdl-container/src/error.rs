//! Container error types

/// Errors raised while reading or writing the block container
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// File does not start with `FMDL`
    #[error("unexpected magic number {0:02x?}")]
    BadMagic([u8; 4]),

    /// A read ran past the end of the data
    #[error("unexpected end of file reading {0}")]
    Truncated(String),

    /// The same block ID was declared twice within one segment
    #[error("duplicate segment {segment} block {id}")]
    DuplicateBlock { segment: u8, id: u32 },

    /// A segment-0 block holds more entries than its descriptor can count
    #[error("segment 0 block {id} has {count} entries (max {max})", max = u16::MAX)]
    TooManyEntries { id: u16, count: usize },

    /// A segment-0 block was given bytes that are not a whole number of entries
    #[error("segment 0 block {id} entry has {actual} bytes, expected {expected}")]
    EntrySize {
        id: u16,
        expected: usize,
        actual: usize,
    },

    /// The block ID has no known fixed entry size
    #[error("segment 0 block {0} has no known entry size")]
    UnknownBlock(u16),

    /// Offsets no longer fit the 32-bit fields of the header
    #[error("container exceeds 4 GiB")]
    TooLarge,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
