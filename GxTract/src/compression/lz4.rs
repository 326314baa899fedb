//! LZ4 frame format via `lz4_flex`

use std::io::{Read, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use super::{Compression, CompressionLevel};
use crate::error::{Error, Result};

/// LZ4 frame magic number (little-endian `0x184D2204`).
pub const FRAME_MAGIC: [u8; 4] = [0x04, 0x22, 0x4D, 0x18];

/// LZ4 frame codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4;

impl Compression for Lz4 {
    fn name(&self) -> &'static str {
        "LZ4"
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn is_match(&self, data: &[u8]) -> bool {
        data.len() > 4 && data.starts_with(&FRAME_MAGIC)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 2);
        FrameDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt(format!("LZ4: {e}")))?;
        Ok(out)
    }

    /// `lz4_flex` has a single compression mode, so the level is ignored.
    fn compress_with_level(&self, data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        let mut encoder = FrameEncoder::new(Vec::with_capacity(data.len() / 2));
        encoder.write_all(data)?;
        encoder
            .finish()
            .map_err(|e| Error::corrupt(format!("LZ4: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"0123456789".repeat(500);
        let packed = Lz4.compress(&data).unwrap();
        assert!(Lz4.is_match(&packed));
        assert!(packed.len() < data.len());
        assert_eq!(Lz4.decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_truncated_frame_is_corrupt() {
        let packed = Lz4.compress(&b"abcdefgh".repeat(200)).unwrap();
        assert!(matches!(
            Lz4.decompress(&packed[..packed.len() - 6]),
            Err(Error::CorruptData { .. })
        ));
    }
}
