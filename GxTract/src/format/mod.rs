//! Format recognition
//!
//! Every blob the scanner meets is classified against a static table of
//! [`FormatInfo`] descriptors. Matching looks at content first (a magic
//! [`Identifier`] at a fixed offset, or a content sniffer for formats without
//! one) and falls back to the file extension only for formats that carry no
//! signature at all.
//!
//! Recognition is pure: it works on byte slices, never fails on short input,
//! and returns an [`FormatType::Unknown`] descriptor when nothing matches.

mod identifier;
mod registry;

use std::borrow::Cow;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use serde::Serialize;

pub use identifier::Identifier;
pub use registry::registry;

use crate::compression::{self, CodecKind};
use crate::error::Result;
use identifier::printable_prefix;

/// How many bytes [`identify_reader`] inspects.
pub const SNIFF_LEN: usize = 0x40;

/// Broad classification of a file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum FormatType {
    Unknown,
    Archive,
    Texture,
    Audio,
    Model,
    Collision,
    Video,
    Text,
    Font,
    Layout,
    Animation,
    Parameter,
    Executable,
    Effect,
    Shader,
    Rom,
    Iso,
    Else,
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The loader the pipeline dispatches a recognized format to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatHandler {
    /// Recognized, but nothing in this crate reads it.
    None,
    /// U8 archive (see [`crate::archive::u8_archive`]).
    U8Archive,
    /// A compressed wrapper around another blob.
    Compression(CodecKind),
    /// TPL texture palette container.
    Tpl,
    /// BTI texture.
    Bti,
}

impl FormatHandler {
    #[must_use]
    pub fn can_read(self) -> bool {
        match self {
            FormatHandler::None => false,
            FormatHandler::Compression(kind) => compression::codec(kind).can_read(),
            FormatHandler::U8Archive | FormatHandler::Tpl | FormatHandler::Bti => true,
        }
    }

    #[must_use]
    pub fn can_write(self) -> bool {
        match self {
            FormatHandler::None => false,
            FormatHandler::Compression(kind) => compression::codec(kind).can_write(),
            FormatHandler::U8Archive | FormatHandler::Tpl | FormatHandler::Bti => true,
        }
    }
}

/// Description of one recognizable file format.
#[derive(Debug, Clone)]
pub struct FormatInfo {
    /// Classification tag.
    pub typ: FormatType,
    /// Canonical extension including the dot (`".szs"`), may be empty.
    pub extension: Cow<'static, str>,
    /// Magic signature, if the format has one.
    pub identifier: Option<Identifier>,
    /// Byte offset of the identifier.
    pub identifier_offset: usize,
    /// Human readable description.
    pub description: &'static str,
    /// Who created the format.
    pub developer: &'static str,
    /// Loader tag.
    pub handler: FormatHandler,
    sniffer: Option<fn(&[u8]) -> bool>,
}

impl FormatInfo {
    /// Format recognized by an identifier at offset 0.
    #[must_use]
    pub const fn new(
        extension: &'static str,
        identifier: &'static [u8],
        typ: FormatType,
        description: &'static str,
        developer: &'static str,
    ) -> Self {
        Self {
            typ,
            extension: Cow::Borrowed(extension),
            identifier: Some(Identifier::new(identifier)),
            identifier_offset: 0,
            description,
            developer,
            handler: FormatHandler::None,
            sniffer: None,
        }
    }

    /// Format recognized only by its extension.
    #[must_use]
    pub const fn by_extension(
        extension: &'static str,
        typ: FormatType,
        description: &'static str,
        developer: &'static str,
    ) -> Self {
        Self {
            typ,
            extension: Cow::Borrowed(extension),
            identifier: None,
            identifier_offset: 0,
            description,
            developer,
            handler: FormatHandler::None,
            sniffer: None,
        }
    }

    #[must_use]
    pub const fn with_offset(mut self, offset: usize) -> Self {
        self.identifier_offset = offset;
        self
    }

    #[must_use]
    pub const fn with_handler(mut self, handler: FormatHandler) -> Self {
        self.handler = handler;
        self
    }

    /// Recognize the format with a content check instead of a fixed identifier.
    #[must_use]
    pub const fn with_sniffer(mut self, sniffer: fn(&[u8]) -> bool) -> Self {
        self.sniffer = Some(sniffer);
        self
    }

    /// Descriptor for data no registered format recognized.
    ///
    /// Like the registered formats, an unknown blob whose first 4 or 8 bytes
    /// look like a text tag gets that tag as identifier so that reports can
    /// group identical unknown formats.
    #[must_use]
    pub fn unknown(extension: &str, data: &[u8]) -> Self {
        let identifier = if data.len() >= 0x20 {
            match printable_prefix(&data[..0x10]) {
                3 | 4 => Some(Identifier::from_slice(&data[..4])),
                7 | 8 => Some(Identifier::from_slice(&data[..8])),
                _ => None,
            }
        } else {
            None
        };
        Self {
            typ: FormatType::Unknown,
            extension: Cow::Owned(normalize_extension(extension)),
            identifier,
            identifier_offset: 0,
            description: "",
            developer: "",
            handler: FormatHandler::None,
            sniffer: None,
        }
    }

    /// Whether `data` (with the given file extension) is this format.
    ///
    /// Short data never matches a signature and never errors.
    #[must_use]
    pub fn is_match(&self, data: &[u8], extension: &str) -> bool {
        if let Some(sniff) = self.sniffer {
            return sniff(data);
        }
        if let Some(identifier) = &self.identifier {
            return identifier.matches_at(data, self.identifier_offset);
        }
        let extension = extension.trim_start_matches('.');
        !extension.is_empty()
            && self
                .extension
                .trim_start_matches('.')
                .eq_ignore_ascii_case(extension)
    }

    #[must_use]
    pub fn can_read(&self) -> bool {
        self.handler.can_read()
    }

    #[must_use]
    pub fn can_write(&self) -> bool {
        self.handler.can_write()
    }

    /// Short name: identifier text when it has at least three printable
    /// characters, else the extension.
    #[must_use]
    pub fn name(&self) -> String {
        match &self.identifier {
            Some(id) if id.valid_len() >= 3 => id.text().to_string(),
            _ => self.extension.to_string(),
        }
    }

    /// `"ext ident"`, used to group unknown formats in reports.
    #[must_use]
    pub fn type_name(&self) -> String {
        match &self.identifier {
            Some(id) if id.len() <= 8 => {
                if self.extension.is_empty() {
                    id.to_string()
                } else {
                    format!("{} {id}", self.extension)
                }
            }
            _ => self.extension.to_string(),
        }
    }

    /// `"developer name description"`.
    #[must_use]
    pub fn full_description(&self) -> String {
        let mut out = String::new();
        if !self.developer.is_empty() {
            out.push_str(self.developer);
            out.push(' ');
        }
        out.push_str(&self.name());
        out.push(' ');
        out.push_str(self.description);
        out
    }
}

/// Two descriptors are the same format when their identifiers match, or
/// for identifier-less formats, their extensions.
impl PartialEq for FormatInfo {
    fn eq(&self, other: &Self) -> bool {
        match (&self.identifier, &other.identifier) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.extension.eq_ignore_ascii_case(&other.extension),
            _ => false,
        }
    }
}

impl Eq for FormatInfo {}

impl fmt::Display for FormatInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_description())
    }
}

fn normalize_extension(extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        extension.to_string()
    } else {
        format!(".{extension}")
    }
}

/// Identify a blob.
///
/// Tries every registered format in registry order (longest identifier
/// first, identifier-less formats last) and returns the first match, or an
/// [`FormatType::Unknown`] descriptor carrying `extension`.
#[must_use]
pub fn identify(data: &[u8], extension: &str) -> FormatInfo {
    registry()
        .iter()
        .find(|format| format.is_match(data, extension))
        .cloned()
        .unwrap_or_else(|| FormatInfo::unknown(extension, data))
}

/// Identify the format of a seekable stream.
///
/// Reads at most [`SNIFF_LEN`] bytes from the start and restores the
/// stream position before returning.
///
/// # Errors
/// Returns [`Error::Io`] if seeking or reading fails.
///
/// [`Error::Io`]: crate::Error::Io
pub fn identify_reader<R: Read + Seek>(reader: &mut R, extension: &str) -> Result<FormatInfo> {
    let position = reader.stream_position()?;
    reader.seek(SeekFrom::Start(0))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    let read = reader
        .by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head);
    reader.seek(SeekFrom::Start(position))?;
    read?;
    Ok(identify(&head, extension))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_identify_yaz0() {
        let data = b"Yaz0\0\0\0\x10\0\0\0\0\0\0\0\0";
        let format = identify(data, ".szs");
        assert_eq!(format.typ, FormatType::Archive);
        assert_eq!(format.handler, FormatHandler::Compression(CodecKind::Yaz0));
        assert_eq!(format.name(), "Yaz0");
    }

    #[test]
    fn test_identify_tpl_renders_hex() {
        let data = [0x00, 0x20, 0xAF, 0x30, 0, 0, 0, 1, 0, 0, 0, 0x0C];
        let format = identify(&data, "");
        assert_eq!(format.handler, FormatHandler::Tpl);
        assert_eq!(format.type_name(), ".tpl 00-20-AF-30");
        assert_eq!(format.name(), ".tpl");
    }

    #[test]
    fn test_extension_only_format() {
        let format = identify(&[1, 2, 3], "BTI");
        assert_eq!(format.handler, FormatHandler::Bti);
        let format = identify(&[1, 2, 3], "");
        assert_eq!(format.typ, FormatType::Unknown);
    }

    #[test]
    fn test_truncated_is_unknown() {
        let format = identify(b"Ya", ".bin");
        assert_eq!(format.typ, FormatType::Unknown);
        assert_eq!(format.extension, ".bin");
        assert!(!format.can_read());
    }

    #[test]
    fn test_unknown_text_tag() {
        let mut data = b"ABCD".to_vec();
        data.resize(0x20, 0xFF);
        let format = identify(&data, "dat");
        assert_eq!(format.typ, FormatType::Unknown);
        assert_eq!(format.type_name(), ".dat ABCD");
    }

    #[test]
    fn test_identify_reader_restores_position() {
        let mut cursor = Cursor::new(b"RARC\0\0\0\0".to_vec());
        cursor.set_position(3);
        let format = identify_reader(&mut cursor, ".arc").unwrap();
        assert_eq!(format.name(), "RARC");
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_full_description() {
        let format = identify(b"Yay0\0\0\0\0", "");
        assert_eq!(format.full_description(), "Nintendo Yay0 compressed");
    }
}
