//! Finalize stage: deduplicate and shrink a texture dump

use std::fs;
use std::path::Path;

use image::{DynamicImage, RgbaImage};

use super::{
    CancellationToken, FileOutcome, FinalizeResult, ScanOptions, ScanProgress, SourceFile,
    discover, run_files,
};
use crate::error::Result;
use crate::texture::{DolphinTextureHashInfo, GxImageFormat, decode_png, encode_png};

/// Copies a directory of dumped textures, dropping textures whose Dolphin
/// name (size, format, hashes and mip level) was already seen and storing
/// PNGs in the smallest lossless color type their GX format allows.
///
/// Files that are not Dolphin texture dumps are copied unchanged.
pub struct Finalize;

impl Finalize {
    /// Finalize the dump in `source` into `dest`.
    ///
    /// # Errors
    /// Fails only if the source is missing, cannot be listed, or the worker
    /// pool cannot be created.
    pub fn run(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &ScanOptions,
    ) -> Result<FinalizeResult> {
        Self::run_with_progress(source, dest, options, &CancellationToken::new(), |_| {})
    }

    /// Like [`run`](Self::run) with progress reporting and cancellation.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_progress<F>(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &ScanOptions,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<FinalizeResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!("Finalizing {} files from {}", files.len(), source.display());

        let result = FinalizeResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            if let Err(e) = finalize_file(file, dest, options, &result) {
                tracing::warn!("Failed to finalize {}: {e}", file.relative.display());
            }
            FileOutcome::Done
        })?;
        Ok(result.finish(scan))
    }
}

fn finalize_file(file: &SourceFile, dest: &Path, options: &ScanOptions, result: &FinalizeResult) -> Result<()> {
    let target = dest.join(&file.relative);
    let info = file
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| name.to_ascii_lowercase().ends_with(".png"))
        .and_then(DolphinTextureHashInfo::parse);

    let Some(info) = info else {
        result.add_copied();
        return copy(&file.path, &target, options);
    };

    // a dump that cannot be read must not shadow a later copy of the texture
    let data = fs::read(&file.path)?;
    let optimized = optimize(&data, info.format)?;
    if !result.add_hash_if_needed(info) {
        tracing::debug!("Duplicate {}", file.relative.display());
        return Ok(());
    }

    if let Some(smaller) = optimized {
        result.add_optimization();
        result.add_size(data.len() as u64, smaller.len() as u64);
        if !options.dry_run && !target.exists() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, smaller)?;
        }
        return Ok(());
    }
    copy(&file.path, &target, options)
}

fn copy(from: &Path, to: &Path, options: &ScanOptions) -> Result<()> {
    if options.dry_run || to.exists() {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

/// Re-encode `png` with fewer channels when the GX format makes that
/// lossless: intensity formats as grey+alpha, RGB565 as RGB. Returns the
/// new bytes only if they are smaller.
fn optimize(png: &[u8], format: GxImageFormat) -> Result<Option<Vec<u8>>> {
    let image = decode_png(png)?.to_rgba8();
    let reduced: DynamicImage = match format {
        GxImageFormat::I4 | GxImageFormat::I8 | GxImageFormat::Ia4 | GxImageFormat::Ia8
            if is_grey(&image) =>
        {
            DynamicImage::ImageRgba8(image).to_luma_alpha8().into()
        }
        GxImageFormat::Rgb565 if is_opaque(&image) => DynamicImage::ImageRgba8(image).to_rgb8().into(),
        _ => return Ok(None),
    };
    let encoded = encode_png(&reduced)?;
    Ok((encoded.len() < png.len()).then_some(encoded))
}

fn is_grey(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[0] == p[1] && p[1] == p[2])
}

fn is_opaque(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[3] == u8::MAX)
}
