//! A decoded texture container entry: one image with its mip levels and
//! palettes, still in GX block form.

use image::{Rgba, RgbaImage, imageops};

use super::codec::{decode, encode};
use super::format::{GxImageFormat, GxPaletteFormat, mip_dimensions};
use super::hash::{DolphinTextureHashInfo, TextureHash, texture_hash, tlut_hash};
use super::palette::Palette;
use crate::error::{Error, Result};

/// Mipmaps that differ from a nearest-neighbor downscale of their parent by
/// at least this much on average are treated as hand-made.
pub const ARBITRARY_MIPMAP_THRESHOLD: f32 = 0.18;

/// Sampler state stored alongside the texels. Carried through unchanged on
/// read and write.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sampling {
    pub wrap_s: u8,
    pub wrap_t: u8,
    pub min_filter: u8,
    pub mag_filter: u8,
    pub lod_bias: f32,
    pub edge_lod: bool,
}

/// One texture image with its mip levels and palettes.
#[derive(Debug, Clone, PartialEq)]
pub struct TexEntry {
    pub format: GxImageFormat,
    pub width: u32,
    pub height: u32,
    pub palette_format: GxPaletteFormat,
    pub palettes: Vec<Palette>,
    /// Block data per mip level, base level first.
    pub levels: Vec<Vec<u8>>,
    pub min_lod: f32,
    pub max_lod: f32,
    pub sampling: Sampling,
}

impl TexEntry {
    /// Entry with a single level and no palette.
    #[must_use]
    pub fn new(format: GxImageFormat, width: u32, height: u32, base: Vec<u8>) -> Self {
        Self {
            format,
            width,
            height,
            palette_format: GxPaletteFormat::default(),
            palettes: Vec::new(),
            levels: vec![base],
            min_lod: 0.0,
            max_lod: 0.0,
            sampling: Sampling::default(),
        }
    }

    /// Encode an RGBA image as a single-level entry.
    ///
    /// # Errors
    /// Propagates [`encode`] errors.
    pub fn from_image(
        image: &RgbaImage,
        format: GxImageFormat,
        palette_format: GxPaletteFormat,
    ) -> Result<Self> {
        let pixels: Vec<Rgba<u8>> = image.pixels().copied().collect();
        let encoded = encode(&pixels, format, image.width(), image.height(), palette_format)?;
        let mut entry = Self::new(format, image.width(), image.height(), encoded.data);
        entry.palette_format = palette_format;
        entry.palettes = encoded.palette.into_iter().collect();
        Ok(entry)
    }

    /// Slice the base level and up to `mipmaps` further levels out of `data`.
    ///
    /// Mip levels stop early once a dimension reaches zero or the data runs
    /// out; only the base level is required.
    ///
    /// # Errors
    /// Returns [`Error::CorruptData`] if the base level does not fit.
    pub fn read_levels(
        data: &[u8],
        format: GxImageFormat,
        width: u32,
        height: u32,
        mipmaps: u32,
    ) -> Result<Vec<Vec<u8>>> {
        let base = format.data_size(width, height);
        let first = data.get(..base).ok_or_else(|| {
            Error::corrupt(format!(
                "{format} {width}x{height} base level needs {base} bytes, {} available",
                data.len()
            ))
        })?;
        let mut levels = vec![first.to_vec()];
        let mut offset = base;
        for level in 1..=mipmaps {
            let size = format.data_size_mip(width, height, level);
            if size == 0 {
                break;
            }
            let Some(bytes) = data.get(offset..offset + size) else {
                tracing::debug!(level, "mip data runs past the end of the texture");
                break;
            };
            levels.push(bytes.to_vec());
            offset += size;
        }
        Ok(levels)
    }

    /// Split raw palette bytes into palettes of `count` entries each.
    #[must_use]
    pub fn split_palettes(bytes: &[u8], palette_format: GxPaletteFormat, count: usize) -> Vec<Palette> {
        if count == 0 {
            return Vec::new();
        }
        bytes
            .chunks_exact(count * 2)
            .map(|chunk| Palette::from_bytes(palette_format, chunk))
            .collect()
    }

    /// Number of levels beyond the base.
    #[must_use]
    pub fn mipmap_count(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Whether Dolphin treats the texture as mipmapped.
    ///
    /// With `dolphin_detection`, a single-level texture whose `max_lod` is
    /// non-zero also counts, as that is what the emulator looks at.
    #[must_use]
    pub fn has_mips(&self, dolphin_detection: bool) -> bool {
        self.levels.len() != 1 || (dolphin_detection && self.max_lod.abs() > f32::EPSILON)
    }

    /// Hash of the base level.
    #[must_use]
    pub fn hash(&self) -> u64 {
        self.levels.first().map_or(0, |base| texture_hash(base))
    }

    /// Palette hash for palette `index`, 0 without a palette.
    #[must_use]
    pub fn tlut_hash(&self, index: usize) -> u64 {
        match (self.levels.first(), self.palettes.get(index)) {
            (Some(base), Some(palette)) => tlut_hash(self.format, base, &palette.to_bytes()),
            _ => 0,
        }
    }

    #[must_use]
    pub fn texture_hash(&self, palette: usize) -> TextureHash {
        TextureHash::new(self.hash(), self.tlut_hash(palette))
    }

    /// Dolphin name info for the base level with palette `palette`.
    #[must_use]
    pub fn hash_info(&self, palette: usize, dolphin_detection: bool) -> DolphinTextureHashInfo {
        DolphinTextureHashInfo::new(self.width, self.height, self.texture_hash(palette), self.format)
            .with_mips(self.has_mips(dolphin_detection))
    }

    /// Decode mip `level` using palette `palette`.
    ///
    /// # Errors
    /// Returns [`Error::EntryNotFound`] for a missing level and propagates
    /// [`decode`] errors.
    pub fn image(&self, level: usize, palette: usize) -> Result<RgbaImage> {
        let data = self
            .levels
            .get(level)
            .ok_or_else(|| Error::EntryNotFound(format!("mip level {level}")))?;
        let (width, height) = u32::try_from(level)
            .ok()
            .and_then(|l| mip_dimensions(self.width, self.height, l))
            .ok_or_else(|| Error::EntryNotFound(format!("mip level {level}")))?;
        let pixels = decode(data, self.format, width, height, self.palettes.get(palette))?;
        let raw: Vec<u8> = pixels.into_iter().flat_map(|px| px.0).collect();
        RgbaImage::from_raw(width, height, raw)
            .ok_or_else(|| Error::ImageError(format!("{width}x{height} pixel buffer size mismatch")))
    }
}

/// Average per-pixel RGBA distance (channels scaled to 0..=1) between two
/// images of equal size, `f32::MAX` if the sizes differ.
fn compare(a: &RgbaImage, b: &RgbaImage) -> f32 {
    if a.dimensions() != b.dimensions() {
        return f32::MAX;
    }
    let total: f32 = a
        .pixels()
        .zip(b.pixels())
        .map(|(pa, pb)| {
            pa.0.iter()
                .zip(pb.0)
                .map(|(&x, y)| {
                    let d = (f32::from(x) - f32::from(y)) / 255.0;
                    d * d
                })
                .sum::<f32>()
                .sqrt()
        })
        .sum();
    total / (a.width() * a.height()) as f32
}

fn downscale(image: &RgbaImage) -> RgbaImage {
    let width = (image.width() >> 1).max(1);
    let height = (image.height() >> 1).max(1);
    imageops::resize(image, width, height, imageops::FilterType::Nearest)
}

/// How far the mip chain `levels` (base first) departs from plain
/// downscaling. Only the first two mips are inspected.
#[must_use]
pub fn mipmap_difference(levels: &[RgbaImage]) -> f32 {
    let Some((base, mips)) = levels.split_first() else {
        return 0.0;
    };
    let mips = &mips[..mips.len().min(2)];
    let Some(first) = mips.first() else {
        return 0.0;
    };
    let mut diff = compare(&downscale(base), first);
    if let Some(second) = mips.get(1) {
        diff = (compare(&downscale(first), second) + diff) / 2.0;
    }
    diff
}

/// Whether the mip chain looks hand-made rather than generated.
#[must_use]
pub fn is_arbitrary_mipmap(levels: &[RgbaImage]) -> bool {
    levels.len() > 1 && mipmap_difference(levels) >= ARBITRARY_MIPMAP_THRESHOLD
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x / 2 + y / 2) % 2 == 0 {
                Rgba([0xF8, 0xFC, 0xF8, 0xFF])
            } else {
                Rgba([0, 0, 0, 0xFF])
            }
        })
    }

    #[test]
    fn test_read_levels_stops_at_end_of_data() {
        let format = GxImageFormat::I8;
        let full = format.total_data_size(16, 8, 2);
        let data = vec![7u8; full];
        let levels = TexEntry::read_levels(&data, format, 16, 8, 5).unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[1].len(), format.data_size(8, 4));

        let levels = TexEntry::read_levels(&data[..full - 1], format, 16, 8, 2).unwrap();
        assert_eq!(levels.len(), 2);

        assert!(TexEntry::read_levels(&data[..10], format, 16, 8, 0).is_err());
    }

    #[test]
    fn test_split_palettes() {
        let bytes: Vec<u8> = (0..16).collect();
        let palettes = TexEntry::split_palettes(&bytes, GxPaletteFormat::Rgb565, 4);
        assert_eq!(palettes.len(), 2);
        assert_eq!(palettes[1].entries()[0], 0x0809);
        assert!(TexEntry::split_palettes(&bytes, GxPaletteFormat::Rgb565, 0).is_empty());
    }

    #[test]
    fn test_has_mips() {
        let mut entry = TexEntry::new(GxImageFormat::I8, 8, 4, vec![0; 32]);
        assert!(!entry.has_mips(true));
        entry.max_lod = 1.0;
        assert!(entry.has_mips(true));
        assert!(!entry.has_mips(false));
        entry.levels.push(vec![0; 32]);
        assert!(entry.has_mips(false));
    }

    #[test]
    fn test_from_image_roundtrip() {
        let source = checker(8, 8);
        let entry = TexEntry::from_image(&source, GxImageFormat::Rgb565, GxPaletteFormat::Ia8).unwrap();
        assert_eq!(entry.image(0, 0).unwrap(), source);
        assert!(matches!(entry.image(1, 0), Err(Error::EntryNotFound(_))));
    }

    #[test]
    fn test_indexed_hash_info() {
        let source = checker(8, 8);
        let entry = TexEntry::from_image(&source, GxImageFormat::C4, GxPaletteFormat::Rgb565).unwrap();
        assert_eq!(entry.palettes.len(), 1);
        let info = entry.hash_info(0, true);
        assert_ne!(info.tlut_hash, 0);
        assert_eq!(info.hash, texture_hash(&entry.levels[0]));
        assert!(info.build().starts_with("tex1_8x8_"));
    }

    #[test]
    fn test_arbitrary_mipmap_detection() {
        let base = checker(16, 16);
        let generated = vec![base.clone(), downscale(&base), downscale(&downscale(&base))];
        assert!(mipmap_difference(&generated) < f32::EPSILON);
        assert!(!is_arbitrary_mipmap(&generated));

        let inverted = RgbaImage::from_fn(8, 8, |x, y| {
            let px = generated[1].get_pixel(x, y).0;
            Rgba([255 - px[0], 255 - px[1], 255 - px[2], 0xFF])
        });
        assert!(is_arbitrary_mipmap(&[base, inverted]));
        assert!(!is_arbitrary_mipmap(&generated[..1]));
    }
}
