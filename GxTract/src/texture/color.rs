//! Conversions between GX pixel encodings and 8-bit RGBA

use image::Rgba;

use super::format::GxPaletteFormat;

pub(crate) const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[inline]
pub(crate) fn expand4(n: u8) -> u8 {
    (n << 4) | n
}

/// Luma with weights 0.30/0.59/0.11, rounded.
#[inline]
pub fn intensity(px: Rgba<u8>) -> u8 {
    let [r, g, b, _] = px.0;
    ((u32::from(r) * 30 + u32::from(g) * 59 + u32::from(b) * 11 + 50) / 100) as u8
}

#[inline]
pub fn grey(i: u8, a: u8) -> Rgba<u8> {
    Rgba([i, i, i, a])
}

/// IA8: alpha in the high byte, intensity in the low byte.
#[inline]
pub fn decode_ia8(v: u16) -> Rgba<u8> {
    grey((v & 0xFF) as u8, (v >> 8) as u8)
}

#[inline]
pub fn encode_ia8(px: Rgba<u8>) -> u16 {
    (u16::from(px.0[3]) << 8) | u16::from(intensity(px))
}

#[inline]
pub fn decode_rgb565(v: u16) -> Rgba<u8> {
    Rgba([
        (((v >> 11) & 0x1F) << 3) as u8,
        (((v >> 5) & 0x3F) << 2) as u8,
        ((v & 0x1F) << 3) as u8,
        0xFF,
    ])
}

#[inline]
pub fn encode_rgb565(px: Rgba<u8>) -> u16 {
    let [r, g, b, _] = px.0;
    (u16::from(r >> 3) << 11) | (u16::from(g >> 2) << 5) | u16::from(b >> 3)
}

/// RGB5A3: top bit set is opaque RGB555, clear is A3 RGB444.
#[inline]
pub fn decode_rgb5a3(v: u16) -> Rgba<u8> {
    if v & 0x8000 != 0 {
        Rgba([
            (((v >> 10) & 0x1F) << 3) as u8,
            (((v >> 5) & 0x1F) << 3) as u8,
            ((v & 0x1F) << 3) as u8,
            0xFF,
        ])
    } else {
        let a = ((v >> 12) & 0x7) as u8;
        Rgba([
            (((v >> 8) & 0xF) << 4) as u8,
            (((v >> 4) & 0xF) << 4) as u8,
            ((v & 0xF) << 4) as u8,
            (a << 5) | (a << 2) | (a >> 1),
        ])
    }
}

#[inline]
pub fn encode_rgb5a3(px: Rgba<u8>) -> u16 {
    let [r, g, b, a] = px.0;
    if a == 0xFF {
        0x8000 | (u16::from(r >> 3) << 10) | (u16::from(g >> 3) << 5) | u16::from(b >> 3)
    } else {
        (u16::from(a >> 5) << 12) | (u16::from(r >> 4) << 8) | (u16::from(g >> 4) << 4) | u16::from(b >> 4)
    }
}

/// Decode one palette entry.
#[inline]
pub fn decode_entry(format: GxPaletteFormat, v: u16) -> Rgba<u8> {
    match format {
        GxPaletteFormat::Ia8 => decode_ia8(v),
        GxPaletteFormat::Rgb565 => decode_rgb565(v),
        GxPaletteFormat::Rgb5a3 => decode_rgb5a3(v),
    }
}

/// Encode one palette entry.
#[inline]
pub fn encode_entry(format: GxPaletteFormat, px: Rgba<u8>) -> u16 {
    match format {
        GxPaletteFormat::Ia8 => encode_ia8(px),
        GxPaletteFormat::Rgb565 => encode_rgb565(px),
        GxPaletteFormat::Rgb5a3 => encode_rgb5a3(px),
    }
}
