//! Texture palettes (TLUTs)

use image::Rgba;

use super::color::decode_entry;
use super::format::GxPaletteFormat;
use crate::error::{Error, Result};

/// An ordered list of 16-bit palette entries in one [`GxPaletteFormat`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Palette {
    format: GxPaletteFormat,
    entries: Vec<u16>,
}

impl Palette {
    #[must_use]
    pub fn new(format: GxPaletteFormat, entries: Vec<u16>) -> Self {
        Self { format, entries }
    }

    /// Parse big-endian entries. A trailing odd byte is ignored.
    #[must_use]
    pub fn from_bytes(format: GxPaletteFormat, bytes: &[u8]) -> Self {
        let entries = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        Self { format, entries }
    }

    /// Entries as big-endian bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|e| e.to_be_bytes()).collect()
    }

    #[must_use]
    pub fn format(&self) -> GxPaletteFormat {
        self.format
    }

    #[must_use]
    pub fn entries(&self) -> &[u16] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size in bytes (two per entry).
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.entries.len() * 2
    }

    /// Decoded color of entry `index`.
    ///
    /// # Errors
    /// Returns [`Error::PaletteIndexOutOfRange`] if `index >= len()`.
    pub fn color(&self, index: usize) -> Result<Rgba<u8>> {
        self.entries
            .get(index)
            .map(|&v| decode_entry(self.format, v))
            .ok_or(Error::PaletteIndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// All entries decoded.
    #[must_use]
    pub fn colors(&self) -> Vec<Rgba<u8>> {
        self.entries
            .iter()
            .map(|&v| decode_entry(self.format, v))
            .collect()
    }
}
