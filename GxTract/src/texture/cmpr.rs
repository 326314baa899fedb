//! CMPR: GX flavor of DXT1
//!
//! An 8×8 block holds four 4×4 sub-blocks (top-left, top-right,
//! bottom-left, bottom-right), each 8 bytes: two big-endian RGB565
//! endpoints and 16 two-bit indices, most significant first.

use image::Rgba;

use super::color::{TRANSPARENT, decode_rgb565, encode_rgb565};

/// Alpha below this is encoded as the transparent index.
const ALPHA_THRESHOLD: u8 = 0x80;

/// The four colors a sub-block can reference.
fn interpolate(c0: u16, c1: u16) -> [Rgba<u8>; 4] {
    let a = decode_rgb565(c0);
    let b = decode_rgb565(c1);
    let mix = |wa: u16, wb: u16, div: u16| -> Rgba<u8> {
        let ch = |i: usize| ((u16::from(a.0[i]) * wa + u16::from(b.0[i]) * wb) / div) as u8;
        Rgba([ch(0), ch(1), ch(2), 0xFF])
    };
    if c0 > c1 {
        [a, b, mix(2, 1, 3), mix(1, 2, 3)]
    } else {
        [a, b, mix(1, 1, 2), TRANSPARENT]
    }
}

/// Decode a 32-byte CMPR block into 64 row-major pixels.
pub(crate) fn decode_block(block: &[u8], out: &mut [Rgba<u8>]) {
    for sub in 0..4 {
        let bytes = &block[sub * 8..sub * 8 + 8];
        let c0 = u16::from_be_bytes([bytes[0], bytes[1]]);
        let c1 = u16::from_be_bytes([bytes[2], bytes[3]]);
        let indices = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let colors = interpolate(c0, c1);
        let (sx, sy) = ((sub & 1) * 4, (sub >> 1) * 4);
        for p in 0..16 {
            let index = (indices >> ((15 - p) * 2)) & 3;
            let (x, y) = (sx + (p & 3), sy + (p >> 2));
            out[y * 8 + x] = colors[index as usize];
        }
    }
}

fn distance(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    (0..3)
        .map(|i| {
            let d = i32::from(a.0[i]) - i32::from(b.0[i]);
            d.unsigned_abs() * d.unsigned_abs()
        })
        .sum()
}

/// Encode one 4×4 sub-block into 8 bytes.
///
/// The two most distant opaque colors become the endpoints, so sub-blocks
/// with at most two distinct RGB565 colors (plus transparency) round-trip
/// exactly.
fn encode_sub_block(pixels: &[Rgba<u8>; 16], out: &mut [u8]) {
    let has_alpha = pixels.iter().any(|p| p.0[3] < ALPHA_THRESHOLD);
    let mut opaque: Vec<u16> = pixels
        .iter()
        .filter(|p| p.0[3] >= ALPHA_THRESHOLD)
        .map(|&p| encode_rgb565(p))
        .collect();
    opaque.sort_unstable();
    opaque.dedup();

    let (mut lo, mut hi) = (0u16, 0u16);
    let mut best = 0;
    for (i, &a) in opaque.iter().enumerate() {
        if i == 0 {
            (lo, hi) = (a, a);
        }
        for &b in &opaque[i + 1..] {
            let d = distance(decode_rgb565(a), decode_rgb565(b));
            if d > best {
                best = d;
                (lo, hi) = (a, b);
            }
        }
    }
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    // c0 <= c1 selects the three-color mode with a transparent index
    let (c0, c1) = if has_alpha { (lo, hi) } else { (hi, lo) };
    let colors = interpolate(c0, c1);
    let usable = if c0 > c1 { 4 } else { 3 };

    let mut indices = 0u32;
    for (p, &px) in pixels.iter().enumerate() {
        let index = if px.0[3] < ALPHA_THRESHOLD {
            3
        } else {
            (0..usable)
                .min_by_key(|&i| distance(px, colors[i]))
                .unwrap_or(0)
        };
        indices |= (index as u32) << ((15 - p) * 2);
    }

    out[0..2].copy_from_slice(&c0.to_be_bytes());
    out[2..4].copy_from_slice(&c1.to_be_bytes());
    out[4..8].copy_from_slice(&indices.to_be_bytes());
}

/// Encode 64 row-major pixels into a 32-byte CMPR block.
pub(crate) fn encode_block(pixels: &[Rgba<u8>], out: &mut [u8]) {
    for sub in 0..4 {
        let (sx, sy) = ((sub & 1) * 4, (sub >> 1) * 4);
        let mut sub_pixels = [TRANSPARENT; 16];
        for (p, slot) in sub_pixels.iter_mut().enumerate() {
            *slot = pixels[(sy + (p >> 2)) * 8 + sx + (p & 3)];
        }
        encode_sub_block(&sub_pixels, &mut out[sub * 8..sub * 8 + 8]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_four_color_mode() {
        // c0 = white, c1 = black, indices 0,1,2,3 repeating
        let mut block = [0u8; 32];
        for sub in 0..4 {
            block[sub * 8..sub * 8 + 8].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0x1B, 0x1B, 0x1B, 0x1B]);
        }
        let mut out = [TRANSPARENT; 64];
        decode_block(&block, &mut out);
        assert_eq!(out[0], Rgba([0xF8, 0xFC, 0xF8, 0xFF]));
        assert_eq!(out[1], Rgba([0, 0, 0, 0xFF]));
        assert_eq!(out[2], Rgba([0xA5, 0xA8, 0xA5, 0xFF]));
        assert_eq!(out[3], Rgba([0x52, 0x54, 0x52, 0xFF]));
    }

    #[test]
    fn test_three_color_mode_is_transparent() {
        let colors = interpolate(0x0000, 0xFFFF);
        assert_eq!(colors[2], Rgba([0x7C, 0x7E, 0x7C, 0xFF]));
        assert_eq!(colors[3], TRANSPARENT);
    }

    #[test]
    fn test_two_colors_with_alpha_roundtrip() {
        let red = decode_rgb565(0xF800);
        let blue = decode_rgb565(0x001F);
        let pixels: Vec<Rgba<u8>> = (0..64)
            .map(|i| match i % 3 {
                0 => red,
                1 => blue,
                _ => TRANSPARENT,
            })
            .collect();
        let mut block = [0u8; 32];
        encode_block(&pixels, &mut block);
        let mut out = [TRANSPARENT; 64];
        decode_block(&block, &mut out);
        assert_eq!(out.to_vec(), pixels);
    }
}
