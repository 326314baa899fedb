//! Compression codecs
//!
//! Containers found inside game files are frequently wrapped in one of a
//! handful of compression formats. Each codec implements [`Compression`] and
//! is stateless, so the process-wide instances returned by [`codecs`] are
//! shared across scan workers.

pub mod lz4;
pub mod yay0;
pub mod yaz0;
pub mod zlib;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use lz4::Lz4;
pub use yay0::Yay0;
pub use yaz0::Yaz0;
pub use zlib::Zlib;

/// How hard a codec should try when compressing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionLevel {
    /// Store the data without compressing it (still in the codec's framing).
    NoCompression,
    /// Good compression within reasonable time.
    #[default]
    Optimal,
    /// Finish as soon as possible, even if the output is larger.
    Fastest,
    /// Produce the smallest output the codec can, regardless of time.
    SmallestSize,
}

/// Registered codec identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodecKind {
    Yaz0,
    Yay0,
    Zlib,
    Lz4,
}

/// A compression format.
///
/// Directions a codec does not implement fall back to the provided methods,
/// which fail with [`Error::CapabilityUnsupported`].
pub trait Compression: Send + Sync {
    /// Display name of the codec.
    fn name(&self) -> &'static str;

    /// Whether [`Compression::decompress`] is implemented.
    fn can_read(&self) -> bool;

    /// Whether [`Compression::compress`] is implemented.
    fn can_write(&self) -> bool;

    /// Whether `data` looks like output of this codec. Never fails on short input.
    fn is_match(&self, data: &[u8]) -> bool;

    /// Decompress a complete buffer.
    ///
    /// # Errors
    /// Returns [`Error::CorruptData`] for truncated or inconsistent input, or
    /// [`Error::CapabilityUnsupported`] if the codec cannot decompress.
    fn decompress(&self, _data: &[u8]) -> Result<Vec<u8>> {
        Err(Error::CapabilityUnsupported {
            codec: self.name(),
            operation: "decompression",
        })
    }

    /// Compress with [`CompressionLevel::Optimal`].
    ///
    /// # Errors
    /// Returns [`Error::CapabilityUnsupported`] if the codec cannot compress.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.compress_with_level(data, CompressionLevel::default())
    }

    /// Compress with an explicit level.
    ///
    /// # Errors
    /// Returns [`Error::CapabilityUnsupported`] if the codec cannot compress.
    fn compress_with_level(&self, _data: &[u8], _level: CompressionLevel) -> Result<Vec<u8>> {
        Err(Error::CapabilityUnsupported {
            codec: self.name(),
            operation: "compression",
        })
    }
}

static CODECS: [&dyn Compression; 4] = [&Yaz0, &Yay0, &Zlib, &Lz4];

/// Every registered codec, in matching order.
pub fn codecs() -> &'static [&'static dyn Compression] {
    &CODECS
}

/// The instance for a codec kind.
pub fn codec(kind: CodecKind) -> &'static dyn Compression {
    match kind {
        CodecKind::Yaz0 => &Yaz0,
        CodecKind::Yay0 => &Yay0,
        CodecKind::Zlib => &Zlib,
        CodecKind::Lz4 => &Lz4,
    }
}

/// Look up a codec by name, ignoring case.
pub fn codec_by_name(name: &str) -> Option<&'static dyn Compression> {
    codecs()
        .iter()
        .copied()
        .find(|c| c.name().eq_ignore_ascii_case(name))
}

/// Decompress `data` with the first matching codec that succeeds.
///
/// Returns the decompressed bytes together with the codec's name.
///
/// # Errors
/// Returns [`Error::NoCodecMatched`] if no readable codec recognizes the
/// data, or the error of the last matching codec if all of them failed.
pub fn try_decompress(data: &[u8]) -> Result<(Vec<u8>, &'static str)> {
    let mut last_error = None;
    for codec in codecs().iter().filter(|c| c.can_read() && c.is_match(data)) {
        match codec.decompress(data) {
            Ok(out) => return Ok((out, codec.name())),
            Err(e) => {
                tracing::debug!("{} failed to decompress: {e}", codec.name());
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or(Error::NoCodecMatched))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Codec that only declares itself; every operation uses the defaults.
    struct StoreOnly;

    impl Compression for StoreOnly {
        fn name(&self) -> &'static str {
            "Store"
        }
        fn can_read(&self) -> bool {
            false
        }
        fn can_write(&self) -> bool {
            false
        }
        fn is_match(&self, _data: &[u8]) -> bool {
            true
        }
    }

    #[test]
    fn test_capability_defaults() {
        let err = StoreOnly.decompress(b"abc").unwrap_err();
        assert!(matches!(
            err,
            Error::CapabilityUnsupported { codec: "Store", operation: "decompression" }
        ));
        let err = StoreOnly.compress(b"abc").unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_registry_capabilities() {
        for codec in codecs() {
            assert!(codec.can_read(), "{}", codec.name());
        }
        assert!(!codec(CodecKind::Yay0).can_write());
        assert!(codec(CodecKind::Yaz0).can_write());
        assert_eq!(codec_by_name("zlib").map(|c| c.name()), Some("Zlib"));
    }

    #[test]
    fn test_try_decompress_picks_codec() {
        let packed = Yaz0.compress(b"hello hello hello hello").unwrap();
        let (out, name) = try_decompress(&packed).unwrap();
        assert_eq!(out, b"hello hello hello hello");
        assert_eq!(name, "Yaz0");
    }

    #[test]
    fn test_try_decompress_no_match() {
        assert!(matches!(
            try_decompress(b"\x01\x02\x03\x04"),
            Err(Error::NoCodecMatched)
        ));
    }
}
