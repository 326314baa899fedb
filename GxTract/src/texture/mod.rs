//! GameCube/Wii texture handling
//!
//! - [`format`]: GX pixel and palette formats with their block geometry
//! - [`codec`]: block data to RGBA and back
//! - [`hash`]: Dolphin-compatible hashes and dump names
//! - [`tpl`] / [`bti`]: texture containers, read into [`TexEntry`] values
//! - [`png`]: PNG files for decoded levels

mod cmpr;
pub mod bti;
pub mod codec;
pub mod color;
pub mod entry;
pub mod format;
pub mod hash;
pub mod palette;
pub mod png;
pub mod tpl;

pub use codec::{EncodedTexture, decode, encode};
pub use entry::{ARBITRARY_MIPMAP_THRESHOLD, Sampling, TexEntry, is_arbitrary_mipmap, mipmap_difference};
pub use format::{GxImageFormat, GxPaletteFormat, mip_dimensions};
pub use hash::{DolphinTextureHashInfo, SplitTextureHashInfo, TextureHash, texture_hash, tlut_hash};
pub use palette::Palette;
pub use png::{decode_png, encode_png, save_png};
