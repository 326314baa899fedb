//! Dolphin-compatible texture hashes and file names
//!
//! Dolphin identifies textures for dumping and replacement by XXH64 of the
//! base level texels and, for indexed formats, of the palette range the
//! base level actually references.

use std::fmt;

use xxhash_rust::xxh64::xxh64;

use super::format::GxImageFormat;

/// XXH64 (seed 0) of one level of GX block data.
#[must_use]
pub fn texture_hash(level_data: &[u8]) -> u64 {
    xxh64(level_data, 0)
}

/// XXH64 of the palette bytes referenced by `base_level`.
///
/// Returns 0 for non-indexed formats and when the palette is shorter than
/// the referenced range.
#[must_use]
pub fn tlut_hash(format: GxImageFormat, base_level: &[u8], palette: &[u8]) -> u64 {
    let Some((start, len)) = format.tlut_range(base_level) else {
        return 0;
    };
    match palette.get(start..start + len) {
        Some(range) => xxh64(range, 0),
        None => {
            tracing::debug!(start, len, palette_len = palette.len(), "TLUT range exceeds palette");
            0
        }
    }
}

/// The pair of hashes that identifies a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TextureHash {
    pub hash: u64,
    pub tlut_hash: u64,
}

impl TextureHash {
    #[must_use]
    pub fn new(hash: u64, tlut_hash: u64) -> Self {
        Self { hash, tlut_hash }
    }
}

/// Everything encoded in a Dolphin texture dump name.
///
/// Names look like `tex1_64x32_m_0123456789abcdef_$_9_arb_mip1`:
/// size, `m_` when the texture has mips, texel hash, palette hash (or `$`)
/// for indexed formats, format id, `_arb` for arbitrary mipmaps and
/// `_mipN` for level N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DolphinTextureHashInfo {
    pub width: u32,
    pub height: u32,
    pub hash: u64,
    pub tlut_hash: u64,
    pub format: GxImageFormat,
    pub mip_level: u32,
    pub has_mips: bool,
    pub is_arbitrary_mipmap: bool,
}

impl DolphinTextureHashInfo {
    #[must_use]
    pub fn new(width: u32, height: u32, hash: TextureHash, format: GxImageFormat) -> Self {
        Self {
            width,
            height,
            hash: hash.hash,
            tlut_hash: hash.tlut_hash,
            format,
            mip_level: 0,
            has_mips: false,
            is_arbitrary_mipmap: false,
        }
    }

    #[must_use]
    pub fn with_mips(mut self, has_mips: bool) -> Self {
        self.has_mips = has_mips;
        self
    }

    #[must_use]
    pub fn with_mip_level(mut self, level: u32) -> Self {
        self.mip_level = level;
        self
    }

    #[must_use]
    pub fn with_arbitrary_mipmap(mut self, arbitrary: bool) -> Self {
        self.is_arbitrary_mipmap = arbitrary;
        self
    }

    #[must_use]
    pub fn texture_hash(&self) -> TextureHash {
        TextureHash::new(self.hash, self.tlut_hash)
    }

    /// The Dolphin file name, without extension.
    #[must_use]
    pub fn build(&self) -> String {
        let mut name = format!("tex1_{}x{}_", self.width, self.height);
        if self.has_mips {
            name.push_str("m_");
        }
        name.push_str(&format!("{:016x}_", self.hash));
        if self.format.is_palette_format() {
            if self.tlut_hash == 0 {
                name.push_str("$_");
            } else {
                name.push_str(&format!("{:016x}_", self.tlut_hash));
            }
        }
        name.push_str(&self.format.id().to_string());
        if self.is_arbitrary_mipmap {
            name.push_str("_arb");
        }
        if self.mip_level != 0 {
            name.push_str(&format!("_mip{}", self.mip_level));
        }
        name
    }

    /// Parse a name produced by [`build`](Self::build). A file extension is
    /// ignored. Returns `None` for anything else.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
        let mut parts = stem.strip_prefix("tex1_")?.split('_').peekable();

        let (width, height) = parts.next()?.split_once('x')?;
        let (width, height) = (width.parse().ok()?, height.parse().ok()?);
        let has_mips = parts.next_if_eq(&"m").is_some();
        let hash = parse_hash(parts.next()?)?;
        let tlut_hash = match parts.next_if(|token| *token == "$" || token.len() == 16) {
            Some("$") => Some(0),
            Some(token) => Some(parse_hash(token)?),
            None => None,
        };
        let format = GxImageFormat::try_from(parts.next()?.parse::<u32>().ok()?).ok()?;
        if format.is_palette_format() != tlut_hash.is_some() {
            return None;
        }
        let is_arbitrary_mipmap = parts.next_if_eq(&"arb").is_some();
        let mip_level = match parts.next() {
            Some(token) => token.strip_prefix("mip")?.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            width,
            height,
            hash,
            tlut_hash: tlut_hash.unwrap_or(0),
            format,
            mip_level,
            has_mips,
            is_arbitrary_mipmap,
        })
    }
}

/// Name of a texture combined from two palette variants of one indexed
/// texture: the first supplies red and green, the second blue and alpha.
///
/// Names look like `RGBA_64x32_m_{hash}_{tlut}_{tlut2}_9_mip1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SplitTextureHashInfo {
    pub width: u32,
    pub height: u32,
    pub hash: u64,
    pub tlut_hash: u64,
    pub tlut_hash2: u64,
    pub format: GxImageFormat,
    pub mip_level: u32,
    pub has_mips: bool,
    pub is_arbitrary_mipmap: bool,
}

impl SplitTextureHashInfo {
    /// Combine two variants; everything but the second palette hash comes
    /// from `first`.
    #[must_use]
    pub fn new(first: &DolphinTextureHashInfo, second: &DolphinTextureHashInfo) -> Self {
        Self {
            width: first.width,
            height: first.height,
            hash: first.hash,
            tlut_hash: first.tlut_hash,
            tlut_hash2: second.tlut_hash,
            format: first.format,
            mip_level: first.mip_level,
            has_mips: first.has_mips,
            is_arbitrary_mipmap: first.is_arbitrary_mipmap,
        }
    }

    /// The two Dolphin names this texture was combined from.
    #[must_use]
    pub fn split(&self) -> (DolphinTextureHashInfo, DolphinTextureHashInfo) {
        let base = DolphinTextureHashInfo {
            width: self.width,
            height: self.height,
            hash: self.hash,
            tlut_hash: self.tlut_hash,
            format: self.format,
            mip_level: self.mip_level,
            has_mips: self.has_mips,
            is_arbitrary_mipmap: self.is_arbitrary_mipmap,
        };
        (base, DolphinTextureHashInfo { tlut_hash: self.tlut_hash2, ..base })
    }

    #[must_use]
    pub fn build(&self) -> String {
        let mut name = format!("RGBA_{}x{}_", self.width, self.height);
        if self.has_mips {
            name.push_str("m_");
        }
        name.push_str(&format!("{:016x}_", self.hash));
        if self.format.is_palette_format() {
            name.push_str(&format!("{:016x}_{:016x}_", self.tlut_hash, self.tlut_hash2));
        }
        name.push_str(&self.format.id().to_string());
        if self.is_arbitrary_mipmap {
            name.push_str("_arb");
        }
        if self.mip_level != 0 {
            name.push_str(&format!("_mip{}", self.mip_level));
        }
        name
    }

    /// Parse a name produced by [`build`](Self::build). A `$` palette hash
    /// reads as 0; a file extension is ignored.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
        let mut parts = stem.strip_prefix("RGBA_")?.split('_').peekable();

        let (width, height) = parts.next()?.split_once('x')?;
        let (width, height) = (width.parse().ok()?, height.parse().ok()?);
        let has_mips = parts.next_if_eq(&"m").is_some();
        let hash = parse_hash(parts.next()?)?;
        let tlut = |token: &str| if token == "$" { Some(0) } else { parse_hash(token) };
        let tlut_hash = tlut(parts.next()?)?;
        let tlut_hash2 = tlut(parts.next()?)?;
        let format = GxImageFormat::try_from(parts.next()?.parse::<u32>().ok()?).ok()?;
        if !format.is_palette_format() {
            return None;
        }
        let is_arbitrary_mipmap = parts.next_if_eq(&"arb").is_some();
        let mip_level = match parts.next() {
            Some(token) => token.strip_prefix("mip")?.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            width,
            height,
            hash,
            tlut_hash,
            tlut_hash2,
            format,
            mip_level,
            has_mips,
            is_arbitrary_mipmap,
        })
    }
}

impl fmt::Display for SplitTextureHashInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

fn parse_hash(token: &str) -> Option<u64> {
    if token.len() != 16 {
        return None;
    }
    u64::from_str_radix(token, 16).ok()
}

impl fmt::Display for DolphinTextureHashInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_hash_is_deterministic_and_sensitive() {
        let mut data = vec![0x5Au8; 256];
        let a = texture_hash(&data);
        assert_eq!(a, texture_hash(&data.clone()));
        data[200] ^= 1;
        assert_ne!(a, texture_hash(&data));
        assert_eq!(texture_hash(&[]), 0xEF46_DB37_51D8_E999);
    }

    #[test]
    fn test_tlut_hash_uses_referenced_range() {
        // C8 indices 2..=3 reference palette bytes 4..8
        let base = [2u8, 3, 3, 2];
        let palette: Vec<u8> = (0..16).collect();
        assert_eq!(tlut_hash(GxImageFormat::C8, &base, &palette), xxh64(&palette[4..8], 0));
        assert_eq!(tlut_hash(GxImageFormat::C8, &base, &palette[..6]), 0);
        assert_eq!(tlut_hash(GxImageFormat::I8, &base, &palette), 0);
    }

    #[test]
    fn test_build_names() {
        let info = DolphinTextureHashInfo::new(
            64,
            32,
            TextureHash::new(0x0123_4567_89AB_CDEF, 0),
            GxImageFormat::Cmpr,
        );
        assert_eq!(info.build(), "tex1_64x32_0123456789abcdef_14");
        assert_eq!(
            info.with_mips(true).with_mip_level(2).build(),
            "tex1_64x32_m_0123456789abcdef_14_mip2"
        );

        let indexed = DolphinTextureHashInfo::new(8, 8, TextureHash::new(1, 0), GxImageFormat::C4);
        assert_eq!(indexed.build(), "tex1_8x8_0000000000000001_$_8");
        let indexed = DolphinTextureHashInfo::new(8, 8, TextureHash::new(1, 0xFF), GxImageFormat::C4)
            .with_arbitrary_mipmap(true);
        assert_eq!(indexed.build(), "tex1_8x8_0000000000000001_00000000000000ff_8_arb");
    }

    #[test]
    fn test_parse_inverts_build() {
        let names = [
            "tex1_64x32_0123456789abcdef_14",
            "tex1_64x32_m_0123456789abcdef_14_mip2",
            "tex1_8x8_0000000000000001_$_8",
            "tex1_8x8_m_0000000000000001_00000000000000ff_9_arb_mip1",
        ];
        for name in names {
            let info = DolphinTextureHashInfo::parse(name).unwrap();
            assert_eq!(info.build(), name);
        }
        let info = DolphinTextureHashInfo::parse("tex1_4x4_00000000000000aa_5.png").unwrap();
        assert_eq!(info.format, GxImageFormat::Rgb5a3);
        assert_eq!(info.hash, 0xAA);
    }

    #[test]
    fn test_split_names() {
        let first = DolphinTextureHashInfo::new(16, 8, TextureHash::new(0xAB, 0x11), GxImageFormat::C8)
            .with_mips(true);
        let second = DolphinTextureHashInfo { tlut_hash: 0x22, ..first };
        let split = SplitTextureHashInfo::new(&first, &second);
        let name = split.build();
        assert_eq!(
            name,
            "RGBA_16x8_m_00000000000000ab_0000000000000011_0000000000000022_9"
        );
        assert_eq!(SplitTextureHashInfo::parse(&format!("{name}.png")), Some(split));
        assert_eq!(split.split(), (first, second));
        assert_eq!(SplitTextureHashInfo::parse("tex1_16x8_00000000000000ab_9"), None);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for name in [
            "",
            "texture.png",
            "tex1_64_0123456789abcdef_14",
            "tex1_64x32_0123456789abcdef",
            "tex1_64x32_0123_14",
            "tex1_64x32_0123456789abcdef_7",
            "tex1_8x8_0000000000000001_8",
            "tex1_64x32_0123456789abcdef_14_extra",
        ] {
            assert_eq!(DolphinTextureHashInfo::parse(name), None, "{name}");
        }
    }
}
