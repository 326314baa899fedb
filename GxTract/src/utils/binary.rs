//! Bounds-checked helpers for parsing big-endian console data
//!
//! Every reader in this crate works on in-memory buffers. Truncated input is
//! reported as [`Error::CorruptData`] rather than an IO error, so callers can
//! classify it per file.

use std::io::{self, Cursor};

use crate::error::{Error, Result};

/// Borrow `len` bytes starting at `offset`, or fail with `CorruptData`.
///
/// # Errors
/// Returns [`Error::CorruptData`] if the range extends past the buffer.
pub fn slice_at<'a>(data: &'a [u8], offset: usize, len: usize, what: &str) -> Result<&'a [u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            Error::corrupt(format!(
                "{what} at 0x{offset:X} (+{len}) exceeds buffer of {} bytes",
                data.len()
            ))
        })
}

/// Create a cursor positioned at `offset` after checking that it is in range.
///
/// # Errors
/// Returns [`Error::CorruptData`] if `offset` is past the end of the buffer.
pub fn read_at<'a>(data: &'a [u8], offset: usize, what: &str) -> Result<Cursor<&'a [u8]>> {
    if offset > data.len() {
        return Err(Error::corrupt(format!(
            "{what} offset 0x{offset:X} exceeds buffer of {} bytes",
            data.len()
        )));
    }
    let mut cursor = Cursor::new(data);
    cursor.set_position(offset as u64);
    Ok(cursor)
}

/// Map an IO error from a cursor read into `CorruptData` when it is a truncation.
pub(crate) fn truncated(what: &'static str) -> impl Fn(io::Error) -> Error {
    move |err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::corrupt(format!("{what} is truncated"))
        } else {
            Error::Io(err)
        }
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
#[must_use]
pub fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{BigEndian, ReadBytesExt};

    #[test]
    fn test_slice_at_bounds() {
        let data = [1u8, 2, 3, 4];
        assert_eq!(slice_at(&data, 1, 2, "x").unwrap(), &[2, 3]);
        assert!(slice_at(&data, 3, 2, "x").is_err());
        assert!(slice_at(&data, usize::MAX, 2, "x").is_err());
    }

    #[test]
    fn test_truncated_read_is_corrupt() {
        let data = [0u8, 1];
        let mut cursor = read_at(&data, 0, "header").unwrap();
        let err = cursor
            .read_u32::<BigEndian>()
            .map_err(truncated("header"))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 32), 0);
        assert_eq!(align_up(1, 32), 32);
        assert_eq!(align_up(64, 32), 64);
    }
}
