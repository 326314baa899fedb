//! GX pixel and palette formats and their block geometry

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Block-based pixel encodings of the GameCube/Wii GPU.
///
/// Discriminants are the values stored in texture headers and in Dolphin
/// texture names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum GxImageFormat {
    I4 = 0,
    I8 = 1,
    Ia4 = 2,
    Ia8 = 3,
    Rgb565 = 4,
    Rgb5a3 = 5,
    Rgba32 = 6,
    C4 = 8,
    C8 = 9,
    C14x2 = 10,
    Cmpr = 14,
}

/// Encodings of 16-bit palette entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GxPaletteFormat {
    #[default]
    Ia8 = 0,
    Rgb565 = 1,
    Rgb5a3 = 2,
}

impl GxImageFormat {
    /// Every format, in discriminant order.
    pub const ALL: [GxImageFormat; 11] = [
        Self::I4,
        Self::I8,
        Self::Ia4,
        Self::Ia8,
        Self::Rgb565,
        Self::Rgb5a3,
        Self::Rgba32,
        Self::C4,
        Self::C8,
        Self::C14x2,
        Self::Cmpr,
    ];

    /// Header value of the format.
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    /// Block width in pixels.
    #[must_use]
    pub const fn block_width(self) -> u32 {
        match self {
            Self::I4 | Self::I8 | Self::Ia4 | Self::C4 | Self::C8 | Self::Cmpr => 8,
            Self::Ia8 | Self::Rgb565 | Self::Rgb5a3 | Self::Rgba32 | Self::C14x2 => 4,
        }
    }

    /// Block height in pixels.
    #[must_use]
    pub const fn block_height(self) -> u32 {
        match self {
            Self::I4 | Self::C4 | Self::Cmpr => 8,
            Self::I8
            | Self::Ia4
            | Self::C8
            | Self::Ia8
            | Self::Rgb565
            | Self::Rgb5a3
            | Self::Rgba32
            | Self::C14x2 => 4,
        }
    }

    #[must_use]
    pub const fn bits_per_pixel(self) -> u32 {
        match self {
            Self::I4 | Self::C4 | Self::Cmpr => 4,
            Self::I8 | Self::Ia4 | Self::C8 => 8,
            Self::Ia8 | Self::Rgb565 | Self::Rgb5a3 | Self::C14x2 => 16,
            Self::Rgba32 => 32,
        }
    }

    /// Bytes per block. Always 32 except RGBA32 (64).
    #[must_use]
    pub const fn block_size(self) -> usize {
        (self.bits_per_pixel() * self.block_width() * self.block_height() / 8) as usize
    }

    /// Whether pixels are indices into a palette.
    #[must_use]
    pub const fn is_palette_format(self) -> bool {
        matches!(self, Self::C4 | Self::C8 | Self::C14x2)
    }

    /// Palette capacity of an indexed format, 0 otherwise.
    #[must_use]
    pub const fn max_palette_colors(self) -> usize {
        match self {
            Self::C4 => 16,
            Self::C8 => 256,
            Self::C14x2 => 16384,
            _ => 0,
        }
    }

    /// Number of blocks horizontally and vertically.
    #[must_use]
    pub const fn block_count(self, width: u32, height: u32) -> (u32, u32) {
        (
            width.div_ceil(self.block_width()),
            height.div_ceil(self.block_height()),
        )
    }

    /// Bytes of block data for one image of the given size.
    #[must_use]
    pub const fn data_size(self, width: u32, height: u32) -> usize {
        let (bx, by) = self.block_count(width, height);
        bx as usize * by as usize * self.block_size()
    }

    /// Bytes of block data for mip `level`, 0 when the level would be empty.
    #[must_use]
    pub fn data_size_mip(self, width: u32, height: u32, level: u32) -> usize {
        mip_dimensions(width, height, level).map_or(0, |(w, h)| self.data_size(w, h))
    }

    /// Bytes of the base image plus `mips` mip levels.
    #[must_use]
    pub fn total_data_size(self, width: u32, height: u32, mips: u32) -> usize {
        (0..=mips)
            .map(|level| self.data_size_mip(width, height, level))
            .sum()
    }

    /// How many mip levels beyond the base fit into `data_len` bytes.
    #[must_use]
    pub fn mipmaps_from_size(self, width: u32, height: u32, data_len: usize) -> u32 {
        let mut used = self.data_size(width, height);
        let mut mips = 0;
        loop {
            let next = self.data_size_mip(width, height, mips + 1);
            if next == 0 || used + next > data_len {
                return mips;
            }
            used += next;
            mips += 1;
        }
    }

    /// Byte range of a palette referenced by the indices in `data`, as
    /// `(start, length)`, computed the way Dolphin does for its TLUT hash.
    /// `None` for formats without a palette.
    #[must_use]
    pub fn tlut_range(self, data: &[u8]) -> Option<(usize, usize)> {
        let (min, max) = match self {
            Self::C4 => data.iter().fold((usize::MAX, 0), |(lo, hi), &b| {
                let (h, l) = (usize::from(b >> 4), usize::from(b & 0xF));
                (lo.min(h).min(l), hi.max(h).max(l))
            }),
            Self::C8 => data.iter().fold((usize::MAX, 0), |(lo, hi), &b| {
                (lo.min(usize::from(b)), hi.max(usize::from(b)))
            }),
            Self::C14x2 => data.chunks_exact(2).fold((usize::MAX, 0), |(lo, hi), pair| {
                let index = usize::from(u16::from_be_bytes([pair[0], pair[1]]) & 0x3FFF);
                (lo.min(index), hi.max(index))
            }),
            _ => return None,
        };
        if min == usize::MAX {
            return Some((0, 0));
        }
        Some((min * 2, (max + 1 - min) * 2))
    }
}

impl TryFrom<u32> for GxImageFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|f| f.id() == value)
            .ok_or_else(|| Error::UnsupportedVariant {
                kind: "GX image format",
                variant: format!("0x{value:X}"),
            })
    }
}

impl fmt::Display for GxImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::Ia4 => "IA4",
            Self::Ia8 => "IA8",
            Self::Rgb565 => "RGB565",
            Self::Rgb5a3 => "RGB5A3",
            Self::Rgba32 => "RGBA32",
            Self::C4 => "C4",
            Self::C8 => "C8",
            Self::C14x2 => "C14X2",
            Self::Cmpr => "CMPR",
        })
    }
}

impl TryFrom<u32> for GxPaletteFormat {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(Self::Ia8),
            1 => Ok(Self::Rgb565),
            2 => Ok(Self::Rgb5a3),
            _ => Err(Error::UnsupportedVariant {
                kind: "GX palette format",
                variant: format!("0x{value:X}"),
            }),
        }
    }
}

impl fmt::Display for GxPaletteFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ia8 => "IA8",
            Self::Rgb565 => "RGB565",
            Self::Rgb5a3 => "RGB5A3",
        })
    }
}

/// Size of mip `level`, or `None` once a dimension reaches zero.
#[must_use]
pub fn mip_dimensions(width: u32, height: u32, level: u32) -> Option<(u32, u32)> {
    let w = width.checked_shr(level).unwrap_or(0);
    let h = height.checked_shr(level).unwrap_or(0);
    (w > 0 && h > 0).then_some((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_geometry() {
        for format in GxImageFormat::ALL {
            let expected = if format == GxImageFormat::Rgba32 { 64 } else { 32 };
            assert_eq!(format.block_size(), expected, "{format}");
        }
        assert_eq!(GxImageFormat::I4.block_count(9, 8), (2, 1));
        assert_eq!(GxImageFormat::Ia8.data_size(4, 4), 32);
        assert_eq!(GxImageFormat::Cmpr.data_size(1, 1), 32);
    }

    #[test]
    fn test_mip_sizes() {
        let f = GxImageFormat::Rgb565;
        assert_eq!(f.data_size_mip(16, 16, 1), 128);
        assert_eq!(f.data_size_mip(16, 16, 5), 0);
        assert_eq!(f.total_data_size(16, 16, 2), 512 + 128 + 32);
        assert_eq!(f.mipmaps_from_size(16, 16, 512 + 128 + 32 + 10), 2);
        assert_eq!(f.mipmaps_from_size(16, 16, 100), 0);
    }

    #[test]
    fn test_try_from() {
        assert_eq!(GxImageFormat::try_from(14).unwrap(), GxImageFormat::Cmpr);
        assert!(GxImageFormat::try_from(7).unwrap_err().is_unsupported());
        assert_eq!(GxPaletteFormat::try_from(2).unwrap(), GxPaletteFormat::Rgb5a3);
        assert!(GxPaletteFormat::try_from(3).is_err());
    }

    #[test]
    fn test_tlut_range() {
        assert_eq!(GxImageFormat::C4.tlut_range(&[0x31, 0x25]), Some((2, 10)));
        assert_eq!(GxImageFormat::C8.tlut_range(&[4, 9, 6]), Some((8, 12)));
        assert_eq!(
            GxImageFormat::C14x2.tlut_range(&[0xC0, 0x02, 0x00, 0x05]),
            Some((4, 8))
        );
        assert_eq!(GxImageFormat::I8.tlut_range(&[1]), None);
    }
}
