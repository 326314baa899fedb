//! Nintendo Yaz0 compression
//!
//! A 16-byte header (`Yaz0`, big-endian decompressed size, 8 reserved bytes)
//! is followed by groups of one flag byte and eight chunks. A set flag bit
//! (MSB first) is a literal byte; a clear bit is a back-reference:
//!
//! ```text
//! NNNN DDDD DDDD DDDD            length N + 2 (N != 0)
//! 0000 DDDD DDDD DDDD NNNN NNNN  length N + 0x12
//! ```
//!
//! with distance `D + 1` counted back from the current output position.

use super::{Compression, CompressionLevel};
use crate::error::{Error, Result};

/// Magic bytes at offset 0.
pub const MAGIC: &[u8; 4] = b"Yaz0";

const HEADER_SIZE: usize = 0x10;
const WINDOW: usize = 0x1000;
const FAST_WINDOW: usize = 0x400;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 0xFF + 0x12;

/// Yaz0 codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaz0;

impl Compression for Yaz0 {
    fn name(&self) -> &'static str {
        "Yaz0"
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn is_match(&self, data: &[u8]) -> bool {
        data.len() > 4 && data.starts_with(MAGIC)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let size = declared_size(data)?;
        decode(&data[HEADER_SIZE..], size).map(|(out, _)| out)
    }

    fn compress_with_level(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let size = u32::try_from(data.len()).map_err(|_| {
            Error::InvalidOptions(format!("Yaz0 input of {} bytes exceeds 4 GiB", data.len()))
        })?;
        let mut out = Vec::with_capacity(HEADER_SIZE + data.len() / 2);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(&[0; 8]);
        encode(data, level, &mut out);
        Ok(out)
    }
}

/// Bytes a Yaz0 stream at the start of `data` occupies, header included.
/// Anything after the stream is ignored.
///
/// # Errors
/// Same as [`Yaz0::decompress`].
pub fn stream_len(data: &[u8]) -> Result<usize> {
    let size = declared_size(data)?;
    decode(&data[HEADER_SIZE..], size).map(|(_, consumed)| HEADER_SIZE + consumed)
}

fn declared_size(data: &[u8]) -> Result<usize> {
    if !data.starts_with(MAGIC) {
        return Err(Error::FormatMismatch {
            expected: "Yaz0".to_string(),
        });
    }
    if data.len() < HEADER_SIZE {
        return Err(Error::corrupt("Yaz0 header truncated"));
    }
    Ok(u32::from_be_bytes([data[4], data[5], data[6], data[7]]) as usize)
}

/// Decode a headerless Yaz0 stream into exactly `size` bytes. Also returns
/// the number of input bytes consumed.
fn decode(src: &[u8], size: usize) -> Result<(Vec<u8>, usize)> {
    // declared size is untrusted, reserve at most a plausible expansion of the input
    let mut out = Vec::with_capacity(size.min(src.len().saturating_mul(9)));
    let mut pos = 0usize;
    let next = |pos: &mut usize| -> Result<u8> {
        let byte = src
            .get(*pos)
            .copied()
            .ok_or_else(|| Error::corrupt(format!("Yaz0 stream truncated at input offset 0x{pos:X}")))?;
        *pos += 1;
        Ok(byte)
    };

    while out.len() < size {
        let flags = next(&mut pos)?;
        for bit in (0..8).rev() {
            if out.len() >= size {
                break;
            }
            if flags & (1 << bit) != 0 {
                out.push(next(&mut pos)?);
                continue;
            }
            let b1 = next(&mut pos)?;
            let b2 = next(&mut pos)?;
            let distance = ((usize::from(b1 & 0x0F) << 8) | usize::from(b2)) + 1;
            let length = match b1 >> 4 {
                0 => usize::from(next(&mut pos)?) + 0x12,
                n => usize::from(n) + 2,
            };
            let start = out.len().checked_sub(distance).ok_or_else(|| {
                Error::corrupt(format!(
                    "Yaz0 back-reference {distance} before start of output at 0x{:X}",
                    out.len()
                ))
            })?;
            if out.len() + length > size {
                return Err(Error::corrupt(format!(
                    "Yaz0 back-reference overruns declared size 0x{size:X}"
                )));
            }
            // overlapping copies repeat bytes, so copy one at a time
            for i in 0..length {
                let byte = out[start + i];
                out.push(byte);
            }
        }
    }
    Ok((out, pos))
}

/// Longest match for `src[pos..]` inside the window, as `(length, position)`.
///
/// Lengths below [`MIN_MATCH`] are reported as 1 (emit a literal).
fn find_match(src: &[u8], pos: usize, window: usize) -> (usize, usize) {
    let max = (src.len() - pos).min(MAX_MATCH);
    let ahead = &src[pos..pos + max];
    let mut best = (1, 0);
    for candidate in pos.saturating_sub(window)..pos {
        let len = src[candidate..]
            .iter()
            .zip(ahead)
            .take_while(|(a, b)| a == b)
            .count();
        if len > best.0 {
            best = (len, candidate);
            if len == max {
                break;
            }
        }
    }
    if best.0 < MIN_MATCH {
        best.0 = 1;
    }
    best
}

/// Chunk group being assembled: one flag byte and up to eight chunks.
struct Group {
    flags: u8,
    count: u32,
    body: Vec<u8>,
}

impl Group {
    fn new() -> Self {
        Self {
            flags: 0,
            count: 0,
            body: Vec::with_capacity(24),
        }
    }

    fn literal(&mut self, byte: u8) {
        self.flags |= 0x80 >> self.count;
        self.body.push(byte);
        self.count += 1;
    }

    fn reference(&mut self, distance: usize, length: usize) {
        let dist = distance - 1;
        if length >= 0x12 {
            self.body.push((dist >> 8) as u8);
            self.body.push((dist & 0xFF) as u8);
            self.body.push((length - 0x12) as u8);
        } else {
            self.body.push((((length - 2) << 4) | (dist >> 8)) as u8);
            self.body.push((dist & 0xFF) as u8);
        }
        self.count += 1;
    }

    fn flush_if_full(&mut self, out: &mut Vec<u8>) {
        if self.count == 8 {
            self.flush(out);
        }
    }

    fn flush(&mut self, out: &mut Vec<u8>) {
        if self.count > 0 {
            out.push(self.flags);
            out.append(&mut self.body);
            self.flags = 0;
            self.count = 0;
        }
    }
}

fn encode(src: &[u8], level: CompressionLevel, out: &mut Vec<u8>) {
    let mut group = Group::new();

    if level == CompressionLevel::NoCompression {
        for &byte in src {
            group.literal(byte);
            group.flush_if_full(out);
        }
        group.flush(out);
        return;
    }

    let (window, look_ahead) = match level {
        CompressionLevel::Fastest => (FAST_WINDOW, false),
        _ => (WINDOW, true),
    };

    let mut pos = 0;
    // match found for pos + 1 while looking ahead, used on the next step
    let mut pending: Option<(usize, usize)> = None;
    while pos < src.len() {
        let from_pending = pending.is_some();
        let (mut length, match_pos) = match pending.take() {
            Some(found) => found,
            None => find_match(src, pos, window),
        };

        if look_ahead && !from_pending && length >= MIN_MATCH && pos + 1 < src.len() {
            let next = find_match(src, pos + 1, window);
            if next.0 >= length + 2 {
                length = 1;
                pending = Some(next);
            }
        }

        if length < MIN_MATCH {
            group.literal(src[pos]);
            pos += 1;
        } else {
            group.reference(pos - match_pos, length);
            pos += length;
        }
        group.flush_if_full(out);
    }
    group.flush(out);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..2000u32 {
            data.extend_from_slice(b"texture ");
            data.push((i % 7) as u8);
            data.extend(std::iter::repeat_n((i % 251) as u8, (i % 40) as usize));
        }
        data
    }

    #[test]
    fn test_roundtrip_all_levels() {
        let data = sample();
        for level in [
            CompressionLevel::NoCompression,
            CompressionLevel::Fastest,
            CompressionLevel::Optimal,
            CompressionLevel::SmallestSize,
        ] {
            let packed = Yaz0.compress_with_level(&data, level).unwrap();
            assert_eq!(Yaz0.decompress(&packed).unwrap(), data, "{level:?}");
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_data() {
        let data = vec![0xAB; 4096];
        let packed = Yaz0.compress(&data).unwrap();
        assert!(packed.len() < 200);
        let stored = Yaz0
            .compress_with_level(&data, CompressionLevel::NoCompression)
            .unwrap();
        assert_eq!(stored.len(), HEADER_SIZE + 4096 + 4096 / 8);
    }

    #[test]
    fn test_decode_known_stream() {
        // literal 'a', then copy 3 from distance 1
        let data = [
            b'Y', b'a', b'z', b'0', 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0x80, b'a', 0x10, 0x00,
        ];
        assert_eq!(Yaz0.decompress(&data).unwrap(), b"aaaa");
    }

    #[test]
    fn test_truncated_is_corrupt() {
        let packed = Yaz0.compress(&sample()).unwrap();
        let err = Yaz0.decompress(&packed[..packed.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn test_reference_before_start_is_corrupt() {
        let data = [
            b'Y', b'a', b'z', b'0', 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0x00, 0x10, 0x05,
        ];
        assert!(matches!(
            Yaz0.decompress(&data),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn test_truncated_header_is_corrupt() {
        assert!(matches!(
            Yaz0.decompress(b"Yaz0\0\0\0\x10"),
            Err(Error::CorruptData { .. })
        ));
        assert!(matches!(
            Yaz0.decompress(b"Yay0\0\0\0\x10\0\0\0\0\0\0\0\0"),
            Err(Error::FormatMismatch { .. })
        ));
    }

    #[test]
    fn test_oversized_declared_length_is_corrupt() {
        let data = [b'Y', b'a', b'z', b'0', 0xFF, 0xFF, 0xFF, 0xF0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, b'x'];
        assert!(matches!(
            Yaz0.decompress(&data),
            Err(Error::CorruptData { .. })
        ));
    }

    #[test]
    fn test_stream_len_ignores_trailing_data() {
        let mut packed = Yaz0.compress(&sample()).unwrap();
        let len = packed.len();
        packed.extend_from_slice(b"trailing bytes");
        assert_eq!(stream_len(&packed).unwrap(), len);
    }

    #[test]
    fn test_empty_input() {
        let packed = Yaz0.compress(&[]).unwrap();
        assert_eq!(packed.len(), HEADER_SIZE);
        assert!(Yaz0.decompress(&packed).unwrap().is_empty());
    }
}
