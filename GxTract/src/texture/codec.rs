//! Block codec for GX texel data
//!
//! Every format stores its image as a row-major grid of fixed-size blocks,
//! each block holding its pixels row-major. Images whose size is not a
//! multiple of the block size are padded to whole blocks.

use std::collections::{HashMap, HashSet};

use image::Rgba;

use super::cmpr;
use super::color::{
    TRANSPARENT, decode_ia8, decode_rgb5a3, decode_rgb565, encode_entry, encode_ia8, encode_rgb5a3,
    encode_rgb565, expand4, grey, intensity,
};
use super::format::{GxImageFormat, GxPaletteFormat};
use super::palette::Palette;
use crate::error::{Error, Result};

/// Output of [`encode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTexture {
    /// Block data of the image.
    pub data: Vec<u8>,
    /// Palette built for indexed formats.
    pub palette: Option<Palette>,
}

/// Decode block data into `width * height` row-major pixels.
///
/// # Errors
/// - [`Error::CorruptData`] if `data` is shorter than the image or an
///   indexed format has no palette.
/// - [`Error::PaletteIndexOutOfRange`] if any index in the block data,
///   including padding, is outside the palette.
pub fn decode(
    data: &[u8],
    format: GxImageFormat,
    width: u32,
    height: u32,
    palette: Option<&Palette>,
) -> Result<Vec<Rgba<u8>>> {
    let needed = format.data_size(width, height);
    if data.len() < needed {
        return Err(Error::corrupt(format!(
            "{format} {width}x{height} needs {needed} bytes, got {}",
            data.len()
        )));
    }
    let colors = match (format.is_palette_format(), palette) {
        (false, _) => Vec::new(),
        (true, Some(palette)) => palette.colors(),
        (true, None) => {
            return Err(Error::corrupt(format!("{format} texture without a palette")));
        }
    };

    let (bw, bh) = (format.block_width() as usize, format.block_height() as usize);
    let (blocks_x, _) = format.block_count(width, height);
    let (width, height) = (width as usize, height as usize);
    let mut pixels = vec![TRANSPARENT; width * height];
    let mut block_pixels = vec![TRANSPARENT; bw * bh];

    for (i, block) in data[..needed]
        .chunks_exact(format.block_size())
        .enumerate()
    {
        decode_block(format, block, &colors, &mut block_pixels)?;
        let x0 = (i % blocks_x as usize) * bw;
        let y0 = (i / blocks_x as usize) * bh;
        for by in 0..bh.min(height.saturating_sub(y0)) {
            let cols = bw.min(width.saturating_sub(x0));
            let dst = (y0 + by) * width + x0;
            pixels[dst..dst + cols].copy_from_slice(&block_pixels[by * bw..by * bw + cols]);
        }
    }
    Ok(pixels)
}

fn lookup(colors: &[Rgba<u8>], index: usize) -> Result<Rgba<u8>> {
    colors
        .get(index)
        .copied()
        .ok_or(Error::PaletteIndexOutOfRange {
            index,
            len: colors.len(),
        })
}

fn be16(pair: &[u8]) -> u16 {
    u16::from_be_bytes([pair[0], pair[1]])
}

fn decode_block(
    format: GxImageFormat,
    block: &[u8],
    colors: &[Rgba<u8>],
    out: &mut [Rgba<u8>],
) -> Result<()> {
    match format {
        GxImageFormat::I4 => {
            for (i, &b) in block.iter().enumerate() {
                out[i * 2] = grey(expand4(b >> 4), 0xFF);
                out[i * 2 + 1] = grey(expand4(b & 0xF), 0xFF);
            }
        }
        GxImageFormat::I8 => {
            for (px, &b) in out.iter_mut().zip(block) {
                *px = grey(b, 0xFF);
            }
        }
        GxImageFormat::Ia4 => {
            for (px, &b) in out.iter_mut().zip(block) {
                *px = grey(expand4(b & 0xF), expand4(b >> 4));
            }
        }
        GxImageFormat::Ia8 => {
            for (px, pair) in out.iter_mut().zip(block.chunks_exact(2)) {
                *px = decode_ia8(be16(pair));
            }
        }
        GxImageFormat::Rgb565 => {
            for (px, pair) in out.iter_mut().zip(block.chunks_exact(2)) {
                *px = decode_rgb565(be16(pair));
            }
        }
        GxImageFormat::Rgb5a3 => {
            for (px, pair) in out.iter_mut().zip(block.chunks_exact(2)) {
                *px = decode_rgb5a3(be16(pair));
            }
        }
        GxImageFormat::Rgba32 => {
            let (ar, gb) = block.split_at(32);
            for (i, px) in out.iter_mut().enumerate() {
                *px = Rgba([ar[i * 2 + 1], gb[i * 2], gb[i * 2 + 1], ar[i * 2]]);
            }
        }
        GxImageFormat::C4 => {
            for (i, &b) in block.iter().enumerate() {
                out[i * 2] = lookup(colors, usize::from(b >> 4))?;
                out[i * 2 + 1] = lookup(colors, usize::from(b & 0xF))?;
            }
        }
        GxImageFormat::C8 => {
            for (px, &b) in out.iter_mut().zip(block) {
                *px = lookup(colors, usize::from(b))?;
            }
        }
        GxImageFormat::C14x2 => {
            for (px, pair) in out.iter_mut().zip(block.chunks_exact(2)) {
                *px = lookup(colors, usize::from(be16(pair) & 0x3FFF))?;
            }
        }
        GxImageFormat::Cmpr => cmpr::decode_block(block, out),
    }
    Ok(())
}

/// Encode `width * height` row-major pixels into block data.
///
/// Block positions outside the image repeat the previous pixel of the
/// block. Indexed formats get a palette of the distinct colors in
/// first-seen order, converted to `palette_format`.
///
/// # Errors
/// - [`Error::PixelCountMismatch`] if `pixels` does not match the size.
/// - [`Error::PaletteOverflow`] if an indexed image has more distinct
///   colors than the format can address.
pub fn encode(
    pixels: &[Rgba<u8>],
    format: GxImageFormat,
    width: u32,
    height: u32,
    palette_format: GxPaletteFormat,
) -> Result<EncodedTexture> {
    let expected = width as usize * height as usize;
    if pixels.len() != expected {
        return Err(Error::PixelCountMismatch {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }

    let palette = format
        .is_palette_format()
        .then(|| build_palette(pixels, format, palette_format))
        .transpose()?;
    let index_of: HashMap<u16, usize> = palette
        .iter()
        .flat_map(|p| p.entries().iter().enumerate().map(|(i, &e)| (e, i)))
        .collect();
    let index = |px: Rgba<u8>| {
        index_of
            .get(&encode_entry(palette_format, px))
            .copied()
            .unwrap_or(0)
    };

    let (bw, bh) = (format.block_width() as usize, format.block_height() as usize);
    let (blocks_x, _) = format.block_count(width, height);
    let mut data = vec![0u8; format.data_size(width, height)];
    let (width, height) = (width as usize, height as usize);
    let mut block_pixels = vec![TRANSPARENT; bw * bh];

    for (i, out) in data.chunks_exact_mut(format.block_size()).enumerate() {
        let x0 = (i % blocks_x as usize) * bw;
        let y0 = (i / blocks_x as usize) * bh;
        let mut previous = TRANSPARENT;
        for (p, slot) in block_pixels.iter_mut().enumerate() {
            let (x, y) = (x0 + p % bw, y0 + p / bw);
            if x < width && y < height {
                previous = pixels[y * width + x];
            }
            *slot = previous;
        }
        encode_block(format, &block_pixels, &index, out);
    }

    Ok(EncodedTexture { data, palette })
}

fn build_palette(
    pixels: &[Rgba<u8>],
    format: GxImageFormat,
    palette_format: GxPaletteFormat,
) -> Result<Palette> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for &px in pixels {
        let entry = encode_entry(palette_format, px);
        if seen.insert(entry) {
            entries.push(entry);
        }
    }
    let max = format.max_palette_colors();
    if entries.len() > max {
        return Err(Error::PaletteOverflow {
            colors: entries.len(),
            max,
        });
    }
    Ok(Palette::new(palette_format, entries))
}

fn encode_block(
    format: GxImageFormat,
    pixels: &[Rgba<u8>],
    index: &impl Fn(Rgba<u8>) -> usize,
    out: &mut [u8],
) {
    let put16 = |out: &mut [u8], values: &mut dyn Iterator<Item = u16>| {
        for (pair, v) in out.chunks_exact_mut(2).zip(values) {
            pair.copy_from_slice(&v.to_be_bytes());
        }
    };
    match format {
        GxImageFormat::I4 => {
            for (b, pair) in out.iter_mut().zip(pixels.chunks_exact(2)) {
                *b = (intensity(pair[0]) & 0xF0) | (intensity(pair[1]) >> 4);
            }
        }
        GxImageFormat::I8 => {
            for (b, &px) in out.iter_mut().zip(pixels) {
                *b = intensity(px);
            }
        }
        GxImageFormat::Ia4 => {
            for (b, &px) in out.iter_mut().zip(pixels) {
                *b = (px.0[3] & 0xF0) | (intensity(px) >> 4);
            }
        }
        GxImageFormat::Ia8 => put16(out, &mut pixels.iter().map(|&px| encode_ia8(px))),
        GxImageFormat::Rgb565 => put16(out, &mut pixels.iter().map(|&px| encode_rgb565(px))),
        GxImageFormat::Rgb5a3 => put16(out, &mut pixels.iter().map(|&px| encode_rgb5a3(px))),
        GxImageFormat::Rgba32 => {
            let (ar, gb) = out.split_at_mut(32);
            for (i, px) in pixels.iter().enumerate() {
                let [r, g, b, a] = px.0;
                ar[i * 2] = a;
                ar[i * 2 + 1] = r;
                gb[i * 2] = g;
                gb[i * 2 + 1] = b;
            }
        }
        GxImageFormat::C4 => {
            for (b, pair) in out.iter_mut().zip(pixels.chunks_exact(2)) {
                *b = ((index(pair[0]) as u8) << 4) | (index(pair[1]) as u8 & 0xF);
            }
        }
        GxImageFormat::C8 => {
            for (b, &px) in out.iter_mut().zip(pixels) {
                *b = index(px) as u8;
            }
        }
        GxImageFormat::C14x2 => put16(out, &mut pixels.iter().map(|&px| index(px) as u16 & 0x3FFF)),
        GxImageFormat::Cmpr => cmpr::encode_block(pixels, out),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::texture::color::decode_entry;

    /// Deterministic byte stream for test images.
    fn noise(seed: u32) -> impl Iterator<Item = u16> {
        let mut state = seed;
        std::iter::repeat_with(move || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (state >> 8) as u16
        })
    }

    /// An image of values that survive an encode in `format` unchanged.
    fn representable(format: GxImageFormat, width: u32, height: u32) -> Vec<Rgba<u8>> {
        let count = (width * height) as usize;
        let red = decode_rgb565(0xF800);
        let blue = decode_rgb565(0x001F);
        noise(width * 31 + height)
            .take(count)
            .enumerate()
            .map(|(i, v)| match format {
                GxImageFormat::I4 => grey(expand4((v & 0xF) as u8), 0xFF),
                GxImageFormat::I8 => grey(v as u8, 0xFF),
                GxImageFormat::Ia4 => grey(expand4((v & 0xF) as u8), expand4((v >> 4 & 0xF) as u8)),
                GxImageFormat::Ia8 => decode_ia8(v),
                GxImageFormat::Rgb565 => decode_rgb565(v),
                GxImageFormat::Rgb5a3 => decode_rgb5a3(v),
                GxImageFormat::Rgba32 => Rgba([v as u8, (v >> 8) as u8, (v >> 3) as u8, (v >> 5) as u8]),
                GxImageFormat::C4 => decode_entry(GxPaletteFormat::Rgb5a3, v & 0xF),
                GxImageFormat::C8 => decode_entry(GxPaletteFormat::Rgb5a3, 0x8000 | (v & 0xFF)),
                GxImageFormat::C14x2 => decode_entry(GxPaletteFormat::Rgb5a3, 0x8000 | (v & 0x3FF)),
                GxImageFormat::Cmpr => match i % 3 {
                    0 => red,
                    1 => blue,
                    _ => TRANSPARENT,
                },
            })
            .collect()
    }

    #[test]
    fn test_roundtrip_every_format() {
        for format in GxImageFormat::ALL {
            for (w, h) in [(8, 8), (16, 4), (5, 3), (13, 9), (1, 1)] {
                let pixels = representable(format, w, h);
                let encoded = encode(&pixels, format, w, h, GxPaletteFormat::Rgb5a3).unwrap();
                assert_eq!(encoded.data.len(), format.data_size(w, h));
                assert_eq!(encoded.palette.is_some(), format.is_palette_format());
                let decoded = decode(&encoded.data, format, w, h, encoded.palette.as_ref()).unwrap();
                assert_eq!(decoded, pixels, "{format} {w}x{h}");
            }
        }
    }

    #[test]
    fn test_ia8_block() {
        let pairs: Vec<(u8, u8)> = (0..16u8).map(|i| (i * 16 + 3, 255 - i * 9)).collect();
        let pixels: Vec<Rgba<u8>> = pairs.iter().map(|&(i, a)| grey(i, a)).collect();
        let encoded = encode(&pixels, GxImageFormat::Ia8, 4, 4, GxPaletteFormat::Ia8).unwrap();
        assert_eq!(&encoded.data[..2], &[255, 3]);
        let decoded = decode(&encoded.data, GxImageFormat::Ia8, 4, 4, None).unwrap();
        let back: Vec<(u8, u8)> = decoded.iter().map(|px| (px.0[0], px.0[3])).collect();
        assert_eq!(back, pairs);
    }

    #[test]
    fn test_indexed_layout_rgb5a3() {
        let palette = Palette::new(GxPaletteFormat::Rgb5a3, vec![0x8000, 0xFC00, 0x3F0F, 0x03E0]);
        let colors = palette.colors();
        let index_at = |x: usize, y: usize| (x * 3 + y) % 4;

        // C4: 8x8 single block, two pixels per byte
        let mut c4 = vec![0u8; 32];
        for y in 0..8 {
            for x in 0..8 {
                let i = y * 8 + x;
                c4[i / 2] |= (index_at(x, y) as u8) << if i % 2 == 0 { 4 } else { 0 };
            }
        }
        let pixels = decode(&c4, GxImageFormat::C4, 8, 8, Some(&palette)).unwrap();
        assert_eq!(pixels.len(), 64);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(pixels[y * 8 + x], colors[index_at(x, y)]);
            }
        }

        // C8: 8x4 blocks, two blocks stacked
        let mut c8 = vec![0u8; 64];
        for y in 0..8 {
            for x in 0..8 {
                c8[(y / 4) * 32 + (y % 4) * 8 + x] = index_at(x, y) as u8;
            }
        }
        let pixels = decode(&c8, GxImageFormat::C8, 8, 8, Some(&palette)).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(pixels[y * 8 + x], colors[index_at(x, y)]);
            }
        }
    }

    #[test]
    fn test_palette_bounds() {
        let palette = Palette::new(GxPaletteFormat::Ia8, vec![0xFF00, 0xFF80, 0xFFFF]);
        let last = vec![2u8; 32];
        assert!(decode(&last, GxImageFormat::C8, 8, 4, Some(&palette)).is_ok());

        let past = vec![3u8; 32];
        let err = decode(&past, GxImageFormat::C8, 8, 4, Some(&palette)).unwrap_err();
        assert!(matches!(err, Error::PaletteIndexOutOfRange { index: 3, len: 3 }));
    }

    #[test]
    fn test_decode_errors() {
        let err = decode(&[0; 31], GxImageFormat::I4, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
        let err = decode(&[0; 32], GxImageFormat::C4, 8, 8, None).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn test_encode_errors() {
        let err = encode(&[TRANSPARENT; 3], GxImageFormat::I8, 2, 2, GxPaletteFormat::Ia8).unwrap_err();
        assert!(matches!(err, Error::PixelCountMismatch { expected: 4, actual: 3, .. }));

        let pixels: Vec<Rgba<u8>> = (0..17u8).map(|i| grey(i, 0xFF)).collect();
        let err = encode(&pixels, GxImageFormat::C4, 17, 1, GxPaletteFormat::Ia8).unwrap_err();
        assert!(matches!(err, Error::PaletteOverflow { colors: 17, max: 16 }));
    }

    #[test]
    fn test_palette_first_seen_order() {
        let pixels = [grey(9, 0xFF), grey(3, 0xFF), grey(9, 0xFF), grey(1, 0xFF)];
        let encoded = encode(&pixels, GxImageFormat::C8, 2, 2, GxPaletteFormat::Ia8).unwrap();
        let palette = encoded.palette.unwrap();
        assert_eq!(palette.entries(), &[0xFF09, 0xFF03, 0xFF01]);
        assert_eq!(&encoded.data[..2], &[0, 1]);
        assert_eq!(&encoded.data[8..10], &[0, 2]);
    }

    #[test]
    fn test_edge_padding_repeats_previous_pixel() {
        let pixels = [grey(10, 0xFF), grey(20, 0xFF), grey(30, 0xFF)];
        let encoded = encode(&pixels, GxImageFormat::I8, 3, 1, GxPaletteFormat::Ia8).unwrap();
        assert_eq!(&encoded.data[..8], &[10, 20, 30, 30, 30, 30, 30, 30]);
        assert!(encoded.data[8..].iter().all(|&b| b == 30));
    }
}
