//! PNG input and output for decoded textures

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::error::Result;

/// Encode an image as PNG bytes.
///
/// # Errors
/// Returns [`Error::ImageError`](crate::Error::ImageError) if encoding fails.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
    image.write_with_encoder(encoder)?;
    Ok(png_data)
}

/// Decode PNG bytes.
///
/// # Errors
/// Returns [`Error::ImageError`](crate::Error::ImageError) for invalid data.
pub fn decode_png(data: &[u8]) -> Result<DynamicImage> {
    Ok(image::load_from_memory_with_format(data, ImageFormat::Png)?)
}

/// Write an RGBA image to `path` as PNG, creating parent directories.
///
/// Returns the number of bytes written.
///
/// # Errors
/// Returns an error if encoding or writing fails.
pub fn save_png(image: &RgbaImage, path: &Path) -> Result<u64> {
    let png_data = encode_png(&DynamicImage::ImageRgba8(image.clone()))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut output = BufWriter::new(File::create(path)?);
    output.write_all(&png_data)?;
    output.flush()?;
    Ok(png_data.len() as u64)
}
