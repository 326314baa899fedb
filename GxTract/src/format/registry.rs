//! The process-wide format table

use std::sync::LazyLock;

use super::{FormatHandler, FormatInfo, FormatType};
use crate::compression::{CodecKind, lz4, zlib};

const NINTENDO: &str = "Nintendo";
const COMPRESSED: &str = "compressed";

static REGISTRY: LazyLock<Vec<FormatInfo>> = LazyLock::new(|| {
    let mut formats = vec![
        // Nintendo archives
        FormatInfo::new(".arc", b"RARC", FormatType::Archive, "Archive", NINTENDO),
        FormatInfo::new(".arc", &[0x55, 0xAA, 0x38, 0x2D], FormatType::Archive, "Archive", NINTENDO)
            .with_handler(FormatHandler::U8Archive),
        FormatInfo::new(".szs", b"Yaz0", FormatType::Archive, COMPRESSED, NINTENDO)
            .with_handler(FormatHandler::Compression(CodecKind::Yaz0)),
        FormatInfo::new(".szp", b"Yay0", FormatType::Archive, COMPRESSED, NINTENDO)
            .with_handler(FormatHandler::Compression(CodecKind::Yay0)),
        FormatInfo::new(".brres", b"bres", FormatType::Archive, "Wii Resources Archive", NINTENDO),
        // Nintendo textures
        FormatInfo::new(".breft", b"REFT", FormatType::Texture, "Wii Effect Texture", NINTENDO),
        FormatInfo::new(".tpl", &[0x00, 0x20, 0xAF, 0x30], FormatType::Texture, "Texture Palette Library", NINTENDO)
            .with_handler(FormatHandler::Tpl),
        FormatInfo::by_extension(".bti", FormatType::Texture, "Binary Texture Image", NINTENDO)
            .with_handler(FormatHandler::Bti),
        FormatInfo::new(".tex1", b"TEX1", FormatType::Texture, "J3D Texture", NINTENDO),
        // J3D
        FormatInfo::new(".bdl", b"J3D2bdl4", FormatType::Model, "J3D Binary Display Lists v4", NINTENDO),
        FormatInfo::new(".bmd", b"J3D2bmd3", FormatType::Model, "J3D Binary Model Display v3", NINTENDO),
        FormatInfo::new(".bck", b"J3D1bck1", FormatType::Animation, "J3D skeletal transformation animation", NINTENDO),
        FormatInfo::new(".btk", b"J3D1btk1", FormatType::Animation, "J3D texture animation", NINTENDO),
        FormatInfo::new(".brk", b"J3D1brk1", FormatType::Animation, "J3D TEV color animation", NINTENDO),
        // Audio
        FormatInfo::by_extension(".dsp", FormatType::Audio, "Nintendo ADPCM codec", NINTENDO),
        FormatInfo::new(".idsp", b"IDSP", FormatType::Audio, "Nintendo ADPCM codec", NINTENDO),
        FormatInfo::new(".wav", b"RIFF", FormatType::Audio, "Resource Interchange File Format", "Microsoft"),
        // Video
        FormatInfo::new(".thp", b"THP\0", FormatType::Video, "THP Video", NINTENDO),
        // Generic
        FormatInfo::new(".png", &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A], FormatType::Texture, "Portable Network Graphics", ""),
        FormatInfo::new(".lz4", &lz4::FRAME_MAGIC, FormatType::Archive, COMPRESSED, "Yann Collet")
            .with_handler(FormatHandler::Compression(CodecKind::Lz4)),
        FormatInfo::by_extension(".zlib", FormatType::Archive, COMPRESSED, "Mark Adler")
            .with_sniffer(zlib::is_zlib_stream)
            .with_handler(FormatHandler::Compression(CodecKind::Zlib)),
    ];
    formats.sort_by_key(match_priority);
    formats
});

/// Longer identifiers first, sniffed formats next, extension-only formats last.
fn match_priority(format: &FormatInfo) -> (u8, std::cmp::Reverse<usize>) {
    match (&format.identifier, format.sniffer) {
        (Some(id), _) => (0, std::cmp::Reverse(id.len())),
        (None, Some(_)) => (1, std::cmp::Reverse(0)),
        (None, None) => (2, std::cmp::Reverse(0)),
    }
}

/// All registered formats in matching order.
pub fn registry() -> &'static [FormatInfo] {
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        let formats = registry();
        let lens: Vec<usize> = formats
            .iter()
            .filter_map(|f| f.identifier.as_ref().map(super::super::Identifier::len))
            .collect();
        assert!(lens.windows(2).all(|w| w[0] >= w[1]));
        let last = formats.last().unwrap();
        assert!(last.identifier.is_none());
    }

    #[test]
    fn test_readable_handlers() {
        for format in registry() {
            if format.handler == FormatHandler::None {
                assert!(!format.can_read(), "{}", format.name());
            }
        }
        let yay0 = registry().iter().find(|f| f.name() == "Yay0").unwrap();
        assert!(yay0.can_read());
        assert!(!yay0.can_write());
    }
}
