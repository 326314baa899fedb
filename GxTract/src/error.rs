//! Error types for `GxTract`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `GxTract` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error walking a directory tree.
    #[error("directory walk error: {0}")]
    WalkDirError(String),

    // ==================== Format Recognition Errors ====================
    /// The data does not match the expected format.
    #[error("format mismatch: expected {expected}")]
    FormatMismatch {
        /// Name of the format that was expected.
        expected: String,
    },

    /// The format was recognized, but this variant is not implemented.
    #[error("unsupported {kind} variant: {variant}")]
    UnsupportedVariant {
        /// What kind of variant (image format, palette format, codec, ...).
        kind: &'static str,
        /// The variant value or name as found in the data.
        variant: String,
    },

    /// Structurally invalid bytes inside a recognized format.
    #[error("corrupt data: {message}")]
    CorruptData {
        /// Description of what is inconsistent.
        message: String,
    },

    // ==================== Texture Codec Errors ====================
    /// A palette index refers past the end of the palette.
    #[error("palette index {index} out of range (palette has {len} entries)")]
    PaletteIndexOutOfRange {
        /// The index found in the pixel data.
        index: usize,
        /// Number of entries in the palette.
        len: usize,
    },

    /// An image has more distinct colors than the palette format can hold.
    #[error("palette overflow: {colors} distinct colors, format allows {max}")]
    PaletteOverflow {
        /// Number of distinct colors in the image.
        colors: usize,
        /// Maximum palette size of the target format.
        max: usize,
    },

    /// Pixel buffer length does not match the image dimensions.
    #[error("pixel buffer holds {actual} pixels, {width}x{height} requires {expected}")]
    PixelCountMismatch {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
        /// Expected pixel count.
        expected: usize,
        /// Actual pixel count.
        actual: usize,
    },

    /// Failed to encode or decode an image file (PNG).
    #[error("image error: {0}")]
    ImageError(String),

    // ==================== Compression Errors ====================
    /// A codec was asked for a direction it does not support.
    #[error("{codec} does not support {operation}")]
    CapabilityUnsupported {
        /// Codec name.
        codec: &'static str,
        /// `"compression"` or `"decompression"`.
        operation: &'static str,
    },

    /// No registered codec could decompress the data.
    #[error("no compression codec matched the data")]
    NoCodecMatched,

    // ==================== Archive Errors ====================
    /// The export destination already exists and overwrite was not requested.
    #[error("destination occupied: {path}")]
    DestinationOccupied {
        /// The occupied destination path.
        path: PathBuf,
    },

    /// A path inside an archive does not exist.
    #[error("archive entry not found: {0}")]
    EntryNotFound(String),

    /// An archive entry name is not a valid single path component.
    #[error("invalid archive entry name: {0:?}")]
    InvalidEntryName(String),

    // ==================== Scan Errors ====================
    /// The scan source does not exist.
    #[error("scan source does not exist: {path}")]
    SourceNotFound {
        /// The missing source path.
        path: PathBuf,
    },

    /// The worker pool could not be created.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),

    // ==================== Configuration Errors ====================
    /// Failed to parse or serialize a configuration file.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Option values are inconsistent.
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl Error {
    /// Shorthand for [`Error::CorruptData`].
    pub(crate) fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptData {
            message: message.into(),
        }
    }

    /// Whether the error means the data was recognized but not handled,
    /// as opposed to the data being damaged or an IO failure.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedVariant { .. } | Error::CapabilityUnsupported { .. }
        )
    }
}

// Add conversion from walkdir::Error
impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::WalkDirError(err.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ImageError(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

/// A specialized Result type for `GxTract` operations.
pub type Result<T> = std::result::Result<T, Error>;
