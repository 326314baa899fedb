//! # `GxTract`
//!
//! A pure-Rust library for finding and extracting GameCube and Wii textures
//! from game files.
//!
//! ## Supported Formats
//!
//! - **U8 archives** - Read into a directory tree, written back, exported to disk
//! - **Yaz0/Yay0/Zlib/LZ4** - Compressed wrappers, unwrapped transparently
//! - **TPL/BTI** - Texture containers with all GX pixel and palette formats
//! - **PNG** - Output, named the way Dolphin names texture dumps
//!
//! ## Quick Start
//!
//! ### Extracting Textures
//!
//! ```no_run
//! use gxtract::scan::{ScanOptions, TextureExtractor};
//!
//! let options = ScanOptions::new().with_mips(true);
//! let result = TextureExtractor::run("game/files", "dump", &options)?;
//! println!("{result}");
//! # Ok::<(), gxtract::Error>(())
//! ```
//!
//! ### Decoding a Single Texture
//!
//! ```no_run
//! use gxtract::texture::{bti, save_png};
//!
//! let data = std::fs::read("water.bti")?;
//! let texture = bti::read(&data)?;
//! println!("{}", texture.hash_info(0, true));
//! save_png(&texture.image(0, 0)?, "water.png".as_ref())?;
//! # Ok::<(), gxtract::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use gxtract::prelude::*;
//!
//! let format = identify(b"Yaz0\0\0\0\x10", ".szs");
//! assert!(format.can_read());
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` - Enables the `gxtract` command-line binary

pub mod archive;
pub mod compression;
pub mod error;
pub mod format;
pub mod scan;
pub mod texture;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{Error, Result};

    pub use crate::archive::{DirectoryNode, FileNode, Node};
    pub use crate::compression::{Compression, CompressionLevel, codec_by_name, try_decompress};
    pub use crate::format::{FormatInfo, FormatType, identify, registry};
    pub use crate::texture::{
        DolphinTextureHashInfo, GxImageFormat, GxPaletteFormat, Palette, TexEntry, decode, encode,
    };

    // Scan stages
    pub use crate::scan::{
        CancellationToken, CombineResult, CombineRgba, Compress, CompressResult, Cutter,
        CutterResult, ExtractorResult, Finalize, FinalizeResult, ScanOptions, ScanProgress,
        TextureExtractor, Unpack, UnpackResult,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// CLI module (feature-gated)
#[cfg(feature = "cli")]
pub mod cli;
