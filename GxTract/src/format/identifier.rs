//! Magic byte signatures

use std::borrow::Cow;
use std::fmt;
use std::ops::Index;

/// A byte signature identifying a file format.
///
/// Identifiers are usually 4 or 8 bytes (`Yaz0`, `J3D2bmd3`) but any length
/// is accepted. Rendering prefers text when the leading bytes are printable
/// and falls back to hyphenated hex (`00-20-AF-30`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(Cow<'static, [u8]>);

impl Identifier {
    /// Identifier from a static byte string.
    #[must_use]
    pub const fn new(bytes: &'static [u8]) -> Self {
        Self(Cow::Borrowed(bytes))
    }

    /// Identifier owning a copy of `bytes`.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self(Cow::Owned(bytes.to_vec()))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of leading printable ASCII bytes.
    #[must_use]
    pub fn valid_len(&self) -> usize {
        printable_prefix(&self.0)
    }

    /// The printable prefix as text.
    #[must_use]
    pub fn text(&self) -> &str {
        // printable ASCII is always valid UTF-8
        std::str::from_utf8(&self.0[..self.valid_len()]).unwrap_or_default()
    }

    /// Whether `data` carries this identifier at `offset`.
    ///
    /// Data too short to hold the identifier never matches.
    #[must_use]
    pub fn matches_at(&self, data: &[u8], offset: usize) -> bool {
        offset
            .checked_add(self.len())
            .and_then(|end| data.get(offset..end))
            .is_some_and(|window| window == self.as_bytes())
    }
}

/// Count of leading bytes in the printable ASCII range.
pub(crate) fn printable_prefix(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .take_while(|&&b| (0x20..0x7F).contains(&b))
        .count()
}

impl Index<usize> for Identifier {
    type Output = u8;

    fn index(&self, index: usize) -> &u8 {
        &self.0[index]
    }
}

impl PartialEq<str> for Identifier {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for Identifier {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<[u8]> for Identifier {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.valid_len() > 2 {
            return f.write_str(self.text());
        }
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl From<&'static str> for Identifier {
    fn from(value: &'static str) -> Self {
        Self::new(value.as_bytes())
    }
}
