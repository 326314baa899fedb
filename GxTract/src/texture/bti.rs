//! J3D BTI textures
//!
//! A 32-byte big-endian header followed by palette and texel data. BTI
//! files carry no magic and are recognized by their `.bti` extension.
//!
//! | Offset | Size | Field                     |
//! |--------|------|---------------------------|
//! | 0x00   | 1    | Image format              |
//! | 0x01   | 1    | Alpha setting             |
//! | 0x02   | 2    | Width                     |
//! | 0x04   | 2    | Height                    |
//! | 0x06   | 1    | Wrap S                    |
//! | 0x07   | 1    | Wrap T                    |
//! | 0x08   | 1    | Is indexed                |
//! | 0x09   | 1    | Palette format            |
//! | 0x0A   | 2    | Palette entry count       |
//! | 0x0C   | 4    | Palette data offset       |
//! | 0x10   | 1    | Mipmaps enabled           |
//! | 0x11   | 1    | Edge LOD                  |
//! | 0x12   | 1    | Clamp LOD bias            |
//! | 0x13   | 1    | Max anisotropy            |
//! | 0x14   | 1    | Min filter                |
//! | 0x15   | 1    | Mag filter                |
//! | 0x16   | 1    | Min LOD × 8 (signed)      |
//! | 0x17   | 1    | Max LOD × 8 (signed)      |
//! | 0x18   | 1    | Image count               |
//! | 0x19   | 1    | Unknown                   |
//! | 0x1A   | 2    | LOD bias × 100 (signed)   |
//! | 0x1C   | 4    | Image data offset         |
//!
//! Offsets are relative to the start of the header.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::entry::{Sampling, TexEntry};
use super::format::{GxImageFormat, GxPaletteFormat};
use crate::error::{Error, Result};
use crate::utils::binary::{slice_at, truncated};

/// Canonical file extension.
pub const EXTENSION: &str = "bti";

const HEADER_SIZE: usize = 0x20;

/// Parse a BTI file.
///
/// # Errors
/// Returns [`Error::CorruptData`] for a short header or out-of-range data
/// and [`Error::UnsupportedVariant`] for unknown pixel or palette formats.
pub fn read(data: &[u8]) -> Result<TexEntry> {
    let header = slice_at(data, 0, HEADER_SIZE, "BTI header")?;
    let mut c = Cursor::new(header);
    let parse = |c: &mut Cursor<&[u8]>| -> std::io::Result<RawHeader> {
        Ok(RawHeader {
            format: c.read_u8()?,
            _alpha: c.read_u8()?,
            width: c.read_u16::<BigEndian>()?,
            height: c.read_u16::<BigEndian>()?,
            wrap_s: c.read_u8()?,
            wrap_t: c.read_u8()?,
            _indexed: c.read_u8()?,
            palette_format: c.read_u8()?,
            palette_count: c.read_u16::<BigEndian>()?,
            palette_offset: c.read_u32::<BigEndian>()?,
            mips_enabled: c.read_u8()? != 0,
            edge_lod: c.read_u8()? != 0,
            _clamp_lod_bias: c.read_u8()?,
            _max_aniso: c.read_u8()?,
            min_filter: c.read_u8()?,
            mag_filter: c.read_u8()?,
            min_lod: c.read_i8()?,
            max_lod: c.read_i8()?,
            image_count: c.read_u8()?,
            _unknown: c.read_u8()?,
            lod_bias: c.read_i16::<BigEndian>()?,
            image_offset: c.read_u32::<BigEndian>()?,
        })
    };
    let raw = parse(&mut c).map_err(truncated("BTI header"))?;

    let format = GxImageFormat::try_from(u32::from(raw.format))?;
    let palette_format = GxPaletteFormat::try_from(u32::from(raw.palette_format))?;
    let (width, height) = (u32::from(raw.width), u32::from(raw.height));
    let mipmaps = if raw.mips_enabled && raw.image_count != 0 {
        u32::from(raw.image_count) - 1
    } else {
        0
    };

    let palettes = if format.is_palette_format() {
        let count = usize::from(raw.palette_count);
        let bytes = slice_at(data, raw.palette_offset as usize, count * 2, "BTI palette data")?;
        TexEntry::split_palettes(bytes, palette_format, count)
    } else {
        Vec::new()
    };
    let texels = data.get(raw.image_offset as usize..).ok_or_else(|| {
        Error::corrupt(format!("BTI image data offset 0x{:X} outside file", raw.image_offset))
    })?;
    let levels = TexEntry::read_levels(texels, format, width, height, mipmaps)?;

    Ok(TexEntry {
        format,
        width,
        height,
        palette_format,
        palettes,
        levels,
        min_lod: f32::from(raw.min_lod) / 8.0,
        max_lod: if raw.mips_enabled { f32::from(raw.max_lod) / 8.0 } else { 0.0 },
        sampling: Sampling {
            wrap_s: raw.wrap_s,
            wrap_t: raw.wrap_t,
            min_filter: raw.min_filter,
            mag_filter: raw.mag_filter,
            lod_bias: f32::from(raw.lod_bias) / 100.0,
            edge_lod: raw.edge_lod,
        },
    })
}

struct RawHeader {
    format: u8,
    _alpha: u8,
    width: u16,
    height: u16,
    wrap_s: u8,
    wrap_t: u8,
    _indexed: u8,
    palette_format: u8,
    palette_count: u16,
    palette_offset: u32,
    mips_enabled: bool,
    edge_lod: bool,
    _clamp_lod_bias: u8,
    _max_aniso: u8,
    min_filter: u8,
    mag_filter: u8,
    min_lod: i8,
    max_lod: i8,
    image_count: u8,
    _unknown: u8,
    lod_bias: i16,
    image_offset: u32,
}

/// Serialize an entry as a BTI file: header, then every palette, then every
/// mip level.
///
/// # Errors
/// Returns [`Error::InvalidOptions`] if a dimension or the palette does not
/// fit the header fields.
pub fn write(entry: &TexEntry) -> Result<Vec<u8>> {
    let width = u16::try_from(entry.width)
        .map_err(|_| Error::InvalidOptions(format!("BTI width {} too large", entry.width)))?;
    let height = u16::try_from(entry.height)
        .map_err(|_| Error::InvalidOptions(format!("BTI height {} too large", entry.height)))?;
    let palette_entries: usize = entry.palettes.iter().map(|p| p.len()).sum();
    let palette_count = u16::try_from(palette_entries)
        .map_err(|_| Error::InvalidOptions(format!("BTI palette of {palette_entries} entries too large")))?;
    let image_count = u8::try_from(entry.levels.len())
        .map_err(|_| Error::InvalidOptions(format!("BTI with {} levels", entry.levels.len())))?;
    let palette_offset = HEADER_SIZE;
    let image_offset = palette_offset + palette_entries * 2;

    let mut out = Vec::with_capacity(image_offset + entry.levels.iter().map(Vec::len).sum::<usize>());
    out.write_u8(entry.format as u8)?;
    out.write_u8(0)?;
    out.write_u16::<BigEndian>(width)?;
    out.write_u16::<BigEndian>(height)?;
    out.write_u8(entry.sampling.wrap_s)?;
    out.write_u8(entry.sampling.wrap_t)?;
    out.write_u8(u8::from(entry.format.is_palette_format()))?;
    out.write_u8(entry.palette_format as u8)?;
    out.write_u16::<BigEndian>(palette_count)?;
    out.write_u32::<BigEndian>(palette_offset as u32)?;
    out.write_u8(u8::from(entry.levels.len() > 1))?;
    out.write_u8(u8::from(entry.sampling.edge_lod))?;
    out.write_u8(1)?;
    out.write_u8(0)?;
    out.write_u8(entry.sampling.min_filter)?;
    out.write_u8(entry.sampling.mag_filter)?;
    out.write_i8((entry.min_lod * 8.0) as i8)?;
    out.write_i8((entry.max_lod * 8.0) as i8)?;
    out.write_u8(image_count)?;
    out.write_u8(0)?;
    out.write_i16::<BigEndian>((entry.sampling.lod_bias * 100.0) as i16)?;
    out.write_u32::<BigEndian>(image_offset as u32)?;

    for palette in &entry.palettes {
        out.extend_from_slice(&palette.to_bytes());
    }
    for level in &entry.levels {
        out.extend_from_slice(level);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_roundtrip() {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 32) as u8, (y * 32) as u8, 0, 0x80]));
        let mut entry = TexEntry::from_image(&image, GxImageFormat::Rgba32, GxPaletteFormat::Ia8).unwrap();
        entry.levels.push(vec![0xAB; GxImageFormat::Rgba32.data_size(4, 4)]);
        entry.max_lod = 1.0;
        entry.min_lod = 0.5;
        entry.sampling.lod_bias = -0.25;
        entry.sampling.edge_lod = true;

        let bytes = write(&entry).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 64 * 4 + 64);
        let read_back = read(&bytes).unwrap();
        assert_eq!(read_back, entry);
        assert_eq!(read_back.image(0, 0).unwrap(), image);
    }

    #[test]
    fn test_indexed_roundtrip() {
        let image = RgbaImage::from_fn(8, 8, |x, y| {
            if (x + y) % 2 == 0 { Rgba([0x40, 0x40, 0x40, 0xFF]) } else { Rgba([0xC0, 0xC0, 0xC0, 0x20]) }
        });
        let entry = TexEntry::from_image(&image, GxImageFormat::C4, GxPaletteFormat::Ia8).unwrap();
        let read_back = read(&write(&entry).unwrap()).unwrap();
        assert_eq!(read_back.palettes, entry.palettes);
        assert_eq!(read_back.image(0, 0).unwrap(), image);
    }

    #[test]
    fn test_mips_disabled_ignores_max_lod() {
        let entry = TexEntry::new(GxImageFormat::I8, 8, 4, vec![0; 32]);
        let mut bytes = write(&entry).unwrap();
        bytes[0x17] = 16;
        let read_back = read(&bytes).unwrap();
        assert!(read_back.max_lod.abs() < f32::EPSILON);
        assert_eq!(read_back.levels.len(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(read(&[0; 16]), Err(Error::CorruptData { .. })));
        let mut bytes = write(&TexEntry::new(GxImageFormat::I8, 8, 4, vec![0; 32])).unwrap();
        bytes[0] = 0x0B;
        assert!(read(&bytes).unwrap_err().is_unsupported());
    }
}
