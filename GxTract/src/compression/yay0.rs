//! Nintendo Yay0 decompression
//!
//! Yay0 splits the stream into three sections: 32-bit flag words starting
//! at 0x10, a table of 16-bit back-references, and a table of literal and
//! extended-length bytes. The header stores the decompressed size and the
//! offsets of the latter two sections.

use super::Compression;
use crate::error::{Error, Result};

/// Magic bytes at offset 0.
pub const MAGIC: &[u8; 4] = b"Yay0";

const HEADER_SIZE: usize = 0x10;

/// Yay0 codec (decompression only).
#[derive(Debug, Clone, Copy, Default)]
pub struct Yay0;

impl Compression for Yay0 {
    fn name(&self) -> &'static str {
        "Yay0"
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        false
    }

    fn is_match(&self, data: &[u8]) -> bool {
        data.len() > 4 && data.starts_with(MAGIC)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < HEADER_SIZE || !data.starts_with(MAGIC) {
            return Err(Error::FormatMismatch {
                expected: "Yay0".to_string(),
            });
        }
        let be32 = |at: usize| {
            u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) as usize
        };
        let size = be32(4);
        let mut links = be32(8);
        let mut chunks = be32(12);
        let mut masks = HEADER_SIZE;

        let byte_at = |at: usize, what: &str| -> Result<u8> {
            data.get(at)
                .copied()
                .ok_or_else(|| Error::corrupt(format!("Yay0 {what} table truncated at 0x{at:X}")))
        };

        let mut out = Vec::with_capacity(size.min(data.len().saturating_mul(9)));
        let mut mask = 0u32;
        let mut bits = 0;
        while out.len() < size {
            if bits == 0 {
                let word = data
                    .get(masks..masks + 4)
                    .ok_or_else(|| Error::corrupt(format!("Yay0 flag word truncated at 0x{masks:X}")))?;
                mask = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
                masks += 4;
                bits = 32;
            }

            if mask & 0x8000_0000 != 0 {
                out.push(byte_at(chunks, "literal")?);
                chunks += 1;
            } else {
                let link = u16::from_be_bytes([byte_at(links, "link")?, byte_at(links + 1, "link")?]);
                links += 2;
                let distance = usize::from(link & 0x0FFF) + 1;
                let length = match link >> 12 {
                    0 => {
                        let extra = byte_at(chunks, "length")?;
                        chunks += 1;
                        usize::from(extra) + 0x12
                    }
                    n => usize::from(n) + 2,
                };
                let start = out.len().checked_sub(distance).ok_or_else(|| {
                    Error::corrupt(format!(
                        "Yay0 back-reference {distance} before start of output at 0x{:X}",
                        out.len()
                    ))
                })?;
                if out.len() + length > size {
                    return Err(Error::corrupt(format!(
                        "Yay0 back-reference overruns declared size 0x{size:X}"
                    )));
                }
                for i in 0..length {
                    let byte = out[start + i];
                    out.push(byte);
                }
            }

            mask <<= 1;
            bits -= 1;
        }
        Ok(out)
    }
}
