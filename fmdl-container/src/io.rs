//! Little-endian cursor readers shared by the header and descriptor parsers

use std::io::{Cursor, Read};

use crate::ContainerError;

fn read_array<const N: usize>(
    cursor: &mut Cursor<&[u8]>,
    what: &str,
) -> Result<[u8; N], ContainerError> {
    let mut buf = [0u8; N];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| ContainerError::Truncated(what.to_string()))?;
    Ok(buf)
}

pub(crate) fn read_magic(cursor: &mut Cursor<&[u8]>) -> Result<[u8; 4], ContainerError> {
    read_array(cursor, "header")
}

pub(crate) fn read_u16(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u16, ContainerError> {
    read_array(cursor, what).map(u16::from_le_bytes)
}

pub(crate) fn read_u32(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32, ContainerError> {
    read_array(cursor, what).map(u32::from_le_bytes)
}

pub(crate) fn read_u64(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u64, ContainerError> {
    read_array(cursor, what).map(u64::from_le_bytes)
}

/// Borrow `length` bytes at `offset`, failing if the range leaves `data`.
pub(crate) fn slice_at<'a>(
    data: &'a [u8],
    offset: u64,
    length: u64,
    what: impl Fn() -> String,
) -> Result<&'a [u8], ContainerError> {
    let start = usize::try_from(offset).map_err(|_| ContainerError::Truncated(what()))?;
    let len = usize::try_from(length).map_err(|_| ContainerError::Truncated(what()))?;
    start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| ContainerError::Truncated(what()))
}

/// Zero bytes needed to bring `len` up to a multiple of `alignment`.
#[inline]
pub(crate) fn padding_for(len: usize, alignment: usize) -> usize {
    (alignment - len % alignment) % alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padding_for() {
        assert_eq!(padding_for(0, 16), 0);
        assert_eq!(padding_for(1, 16), 15);
        assert_eq!(padding_for(16, 16), 0);
        assert_eq!(padding_for(40, 16), 8);
    }

    #[test]
    fn test_slice_at_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(slice_at(&data, 1, 2, String::new).unwrap(), &[2, 3]);
        assert!(slice_at(&data, 3, 2, String::new).is_err());
        assert!(slice_at(&data, u64::MAX, 1, String::new).is_err());
    }

    #[test]
    fn test_read_truncated() {
        let data = [0u8; 3];
        let mut cursor = Cursor::new(&data[..]);
        let err = read_u32(&mut cursor, "descriptor").unwrap_err();
        assert!(matches!(err, ContainerError::Truncated(ref what) if what == "descriptor"));
    }
}
