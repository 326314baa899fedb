//! Nintendo TPL texture palettes
//!
//! Layout (all integers big-endian):
//!
//! | Offset | Size | Field                          |
//! |--------|------|--------------------------------|
//! | 0x00   | 4    | Magic `00 20 AF 30`            |
//! | 0x04   | 4    | Image count                    |
//! | 0x08   | 4    | Offset of the image table      |
//!
//! The image table holds one pair of offsets per image: the image header
//! and the palette header (0 when the image is not indexed). Image headers
//! are 36 bytes, palette headers 12. All data offsets are absolute.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::entry::{Sampling, TexEntry};
use super::format::{GxImageFormat, GxPaletteFormat};
use super::palette::Palette;
use crate::error::{Error, Result};
use crate::utils::binary::{align_up, read_at, slice_at, truncated};

/// Magic bytes at offset 0.
pub const MAGIC: [u8; 4] = [0x00, 0x20, 0xAF, 0x30];

const HEADER_SIZE: usize = 0x0C;
const ALIGN: usize = 0x20;
/// Palette format used by some TPX files: IA8 entries, count halved.
const PALETTE_FORMAT_TPX: u32 = 0xFF;
/// Largest plausible image count of a TPL file found inside other data.
const MAX_IMAGES: usize = 1024;

/// Parse every image of a TPL file.
///
/// # Errors
/// Returns [`Error::FormatMismatch`] without the magic, [`Error::CorruptData`]
/// for out-of-range offsets and [`Error::UnsupportedVariant`] for unknown
/// pixel or palette formats.
pub fn read(data: &[u8]) -> Result<Vec<TexEntry>> {
    if data.len() < HEADER_SIZE || data[..4] != MAGIC {
        return Err(Error::FormatMismatch {
            expected: "TPL".to_string(),
        });
    }
    let mut header = read_at(data, 4, "TPL header")?;
    let count = header.read_u32::<BigEndian>().map_err(truncated("TPL header"))? as usize;
    let table = header.read_u32::<BigEndian>().map_err(truncated("TPL header"))? as usize;
    let table = slice_at(data, table, count.saturating_mul(8), "TPL image table")?;

    table
        .chunks_exact(8)
        .map(|pair| {
            let image = u32::from_be_bytes([pair[0], pair[1], pair[2], pair[3]]) as usize;
            let palette = u32::from_be_bytes([pair[4], pair[5], pair[6], pair[7]]) as usize;
            read_image(data, image, palette)
        })
        .collect()
}

/// Bytes a TPL file at the start of `data` spans: up to the end of the
/// last header, palette or texel block it references.
///
/// # Errors
/// Returns [`Error::FormatMismatch`] without the magic and
/// [`Error::CorruptData`] for an implausible image count or a reference
/// past the end of `data`.
pub fn data_len(data: &[u8]) -> Result<usize> {
    if data.len() < HEADER_SIZE || data[..4] != MAGIC {
        return Err(Error::FormatMismatch {
            expected: "TPL".to_string(),
        });
    }
    let mut header = read_at(data, 4, "TPL header")?;
    let count = header.read_u32::<BigEndian>().map_err(truncated("TPL header"))? as usize;
    let table = header.read_u32::<BigEndian>().map_err(truncated("TPL header"))? as usize;
    if count == 0 || count > MAX_IMAGES {
        return Err(Error::corrupt(format!("TPL image count {count}")));
    }
    let table = slice_at(data, table, count * 8, "TPL image table")?;

    let mut end = HEADER_SIZE;
    for pair in table.chunks_exact(8) {
        let image = u32::from_be_bytes([pair[0], pair[1], pair[2], pair[3]]) as usize;
        let palette = u32::from_be_bytes([pair[4], pair[5], pair[6], pair[7]]) as usize;

        let raw = slice_at(data, image, 36, "TPL image header")?;
        let be32 = |at: usize| u32::from_be_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let height = u32::from(u16::from_be_bytes([raw[0], raw[1]]));
        let width = u32::from(u16::from_be_bytes([raw[2], raw[3]]));
        let format = GxImageFormat::try_from(be32(4))?;
        let address = be32(8) as usize;
        let max_lod = u32::from(raw[34]);
        end = end
            .max(image + 36)
            .max(address + format.total_data_size(width, height, max_lod));

        if palette != 0 {
            let raw = slice_at(data, palette, 12, "TPL palette header")?;
            let count = usize::from(u16::from_be_bytes([raw[0], raw[1]]));
            let address = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]) as usize;
            end = end.max(palette + 12).max(address + count * 2);
        }
    }
    if end > data.len() {
        return Err(Error::corrupt(format!(
            "TPL spans 0x{end:X} bytes, only 0x{:X} available",
            data.len()
        )));
    }
    Ok(end)
}

fn read_palette(data: &[u8], offset: usize) -> Result<(GxPaletteFormat, Vec<Palette>)> {
    let mut cursor = read_at(data, offset, "TPL palette header")?;
    let read = |cursor: &mut std::io::Cursor<&[u8]>| -> std::io::Result<(u16, u32, u32)> {
        let count = cursor.read_u16::<BigEndian>()?;
        let _unpacked = cursor.read_u8()?;
        let _pad = cursor.read_u8()?;
        Ok((count, cursor.read_u32::<BigEndian>()?, cursor.read_u32::<BigEndian>()?))
    };
    let (count, raw_format, address) = read(&mut cursor).map_err(truncated("TPL palette header"))?;

    let (count, format) = if raw_format == PALETTE_FORMAT_TPX {
        (usize::from(count) * 2, GxPaletteFormat::Ia8)
    } else {
        (usize::from(count), GxPaletteFormat::try_from(raw_format)?)
    };
    let bytes = slice_at(data, address as usize, count * 2, "TPL palette data")?;
    Ok((format, TexEntry::split_palettes(bytes, format, count)))
}

fn read_image(data: &[u8], offset: usize, palette_offset: usize) -> Result<TexEntry> {
    let raw = slice_at(data, offset, 36, "TPL image header")?;
    let mut cursor = std::io::Cursor::new(raw);
    let height = u32::from(cursor.read_u16::<BigEndian>()?);
    let width = u32::from(cursor.read_u16::<BigEndian>()?);
    let format = GxImageFormat::try_from(cursor.read_u32::<BigEndian>()?)?;
    let address = cursor.read_u32::<BigEndian>()? as usize;
    let wrap_s = cursor.read_u32::<BigEndian>()? as u8;
    let wrap_t = cursor.read_u32::<BigEndian>()? as u8;
    let min_filter = cursor.read_u32::<BigEndian>()? as u8;
    let mag_filter = cursor.read_u32::<BigEndian>()? as u8;
    let lod_bias = cursor.read_f32::<BigEndian>()?;
    let edge_lod = cursor.read_u8()? != 0;
    let min_lod = cursor.read_u8()?;
    let max_lod = cursor.read_u8()?;

    let (palette_format, palettes) = if palette_offset == 0 {
        (GxPaletteFormat::default(), Vec::new())
    } else {
        read_palette(data, palette_offset)?
    };
    let texels = data
        .get(address..)
        .ok_or_else(|| Error::corrupt(format!("TPL image data offset 0x{address:X} outside file")))?;
    let levels = TexEntry::read_levels(texels, format, width, height, u32::from(max_lod))?;

    tracing::debug!(%format, width, height, mips = levels.len() - 1, "read TPL image");
    Ok(TexEntry {
        format,
        width,
        height,
        palette_format,
        palettes,
        levels,
        min_lod: f32::from(min_lod),
        max_lod: f32::from(max_lod),
        sampling: Sampling {
            wrap_s,
            wrap_t,
            min_filter,
            mag_filter,
            lod_bias,
            edge_lod,
        },
    })
}

fn pad(out: &mut Vec<u8>) {
    out.resize(align_up(out.len(), ALIGN), 0);
}

fn patch_u32(out: &mut [u8], at: usize, value: usize) {
    out[at..at + 4].copy_from_slice(&(value as u32).to_be_bytes());
}

/// Serialize entries into a TPL file. Only the first palette of each entry
/// is stored; headers and data are aligned to 32 bytes.
///
/// # Errors
/// Returns [`Error::InvalidOptions`] if an indexed entry has no palette or
/// a dimension does not fit the 16-bit header fields.
pub fn write(entries: &[TexEntry]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.write_u32::<BigEndian>(entries.len() as u32)?;
    out.write_u32::<BigEndian>(HEADER_SIZE as u32)?;
    out.resize(HEADER_SIZE + entries.len() * 8, 0);
    pad(&mut out);

    for (i, entry) in entries.iter().enumerate() {
        let width = u16::try_from(entry.width)
            .map_err(|_| Error::InvalidOptions(format!("TPL width {} too large", entry.width)))?;
        let height = u16::try_from(entry.height)
            .map_err(|_| Error::InvalidOptions(format!("TPL height {} too large", entry.height)))?;

        let mut palette_header = 0;
        if entry.format.is_palette_format() {
            let palette = entry.palettes.first().ok_or_else(|| {
                Error::InvalidOptions(format!("{} texture without a palette", entry.format))
            })?;
            palette_header = out.len();
            out.write_u16::<BigEndian>(palette.len() as u16)?;
            out.write_u16::<BigEndian>(0)?;
            out.write_u32::<BigEndian>(palette.format() as u32)?;
            out.write_u32::<BigEndian>(0)?;
            pad(&mut out);
            let address = out.len();
            patch_u32(&mut out, palette_header + 8, address);
            out.extend_from_slice(&palette.to_bytes());
            pad(&mut out);
        }

        let image_header = out.len();
        out.write_u16::<BigEndian>(height)?;
        out.write_u16::<BigEndian>(width)?;
        out.write_u32::<BigEndian>(entry.format.id())?;
        out.write_u32::<BigEndian>(0)?;
        let sampling = &entry.sampling;
        out.write_u32::<BigEndian>(u32::from(sampling.wrap_s))?;
        out.write_u32::<BigEndian>(u32::from(sampling.wrap_t))?;
        out.write_u32::<BigEndian>(u32::from(sampling.min_filter))?;
        out.write_u32::<BigEndian>(u32::from(sampling.mag_filter))?;
        out.write_f32::<BigEndian>(sampling.lod_bias)?;
        out.write_u8(u8::from(sampling.edge_lod))?;
        out.write_u8(entry.min_lod as u8)?;
        out.write_u8(entry.mipmap_count() as u8)?;
        out.write_u8(0)?;
        pad(&mut out);
        let address = out.len();
        patch_u32(&mut out, image_header + 8, address);
        for level in &entry.levels {
            out.extend_from_slice(level);
        }
        pad(&mut out);

        patch_u32(&mut out, HEADER_SIZE + i * 8, image_header);
        patch_u32(&mut out, HEADER_SIZE + i * 8 + 4, palette_header);
    }
    Ok(out)
}
