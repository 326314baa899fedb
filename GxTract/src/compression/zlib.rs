//! Zlib (RFC 1950) streams via `flate2`

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use super::{Compression, CompressionLevel};
use crate::error::{Error, Result};

/// Zlib codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Zlib;

/// Whether `data` starts with a valid zlib header.
///
/// Checks the deflate method nibble, the window size and the FCHECK bits
/// (`(CMF << 8 | FLG) % 31 == 0`).
pub fn is_zlib_stream(data: &[u8]) -> bool {
    let &[cmf, flg, ..] = data else {
        return false;
    };
    cmf & 0x0F == 8 && cmf >> 4 <= 7 && (u16::from(cmf) << 8 | u16::from(flg)) % 31 == 0
}

impl Compression for Zlib {
    fn name(&self) -> &'static str {
        "Zlib"
    }

    fn can_read(&self) -> bool {
        true
    }

    fn can_write(&self) -> bool {
        true
    }

    fn is_match(&self, data: &[u8]) -> bool {
        is_zlib_stream(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 4);
        ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt(format!("Zlib: {e}")))?;
        Ok(out)
    }

    fn compress_with_level(&self, data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        let level = match level {
            CompressionLevel::NoCompression => flate2::Compression::none(),
            CompressionLevel::Fastest => flate2::Compression::fast(),
            CompressionLevel::Optimal => flate2::Compression::default(),
            CompressionLevel::SmallestSize => flate2::Compression::best(),
        };
        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), level);
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}
