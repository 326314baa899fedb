//! Combine stage: rebuild RGBA textures that were split over two palettes
//!
//! Some games store a full-color texture as one indexed texture drawn
//! twice with two grey-scale palettes, one carrying red and green and the
//! other blue and alpha (as grey and alpha). Dolphin dumps these as two
//! PNGs that differ only in their palette hash. This stage finds such
//! pairs and merges them back into one image.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use image::imageops::{self, FilterType};

use super::{
    CancellationToken, CombineResult, FileOutcome, ScanOptions, ScanProgress, SourceFile, discover,
    run_files,
};
use crate::error::Result;
use crate::texture::{DolphinTextureHashInfo, SplitTextureHashInfo, decode_png, save_png};

/// Directory combinations in the less likely channel order go to.
pub const ALTERNATIVES_DIR: &str = "~Alternatives";

/// Directory undecodable images are copied to.
pub const CORRUPT_DIR: &str = "~Corrupt";

/// Trend beyond which only one channel order is written.
const CONFIDENT_TREND: i64 = 100;

/// Merges pairs of grey palette variants in a texture dump into RGBA
/// textures named with [`SplitTextureHashInfo`].
///
/// Both channel orders are written unless the pixel analysis is confident;
/// the less likely one goes to [`ALTERNATIVES_DIR`].
pub struct CombineRgba;

impl CombineRgba {
    /// Combine the pairs found in `source` into `dest`.
    ///
    /// # Errors
    /// Fails only if the source is missing, cannot be listed, or the worker
    /// pool cannot be created.
    pub fn run(source: impl AsRef<Path>, dest: impl AsRef<Path>, options: &ScanOptions) -> Result<CombineResult> {
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
    ) -> Result<CombineResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!("Combining palette pairs of {} files from {}", files.len(), source.display());

        let result = CombineResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            if let Err(e) = combine_file(file, dest, options, &result) {
                tracing::warn!("Failed to combine {}: {e}", file.relative.display());
            }
            FileOutcome::Done
        })?;
        Ok(result.finish(scan))
    }
}

fn dump_name(path: &Path) -> Option<DolphinTextureHashInfo> {
    path.file_name()
        .and_then(|name| name.to_str())
        .filter(|name| name.to_ascii_lowercase().ends_with(".png"))
        .and_then(DolphinTextureHashInfo::parse)
        .filter(|info| info.format.is_palette_format())
}

/// The name with the palette hash cleared, shared by all palette variants.
fn without_palette(info: DolphinTextureHashInfo) -> DolphinTextureHashInfo {
    DolphinTextureHashInfo { tlut_hash: 0, ..info }
}

fn combine_file(file: &SourceFile, dest: &Path, options: &ScanOptions, result: &CombineResult) -> Result<()> {
    let Some(info) = dump_name(&file.path) else {
        return Ok(());
    };

    let image = match fs::read(&file.path).map_err(Into::into).and_then(|data| decode_png(&data)) {
        Ok(image) => image.to_rgba8(),
        Err(e) => {
            tracing::warn!("Corrupt image {}: {e}", file.relative.display());
            result.add_corrupt();
            if !options.dry_run {
                let target = dest.join(CORRUPT_DIR).join(&file.relative);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(&file.path, target)?;
            }
            return Ok(());
        }
    };

    let Some((partner_path, partner)) = find_partner(&file.path, info)? else {
        return Ok(());
    };
    // each pair is handled once, from its first file
    if partner_path < file.path {
        return Ok(());
    }
    if !is_grey(&image) {
        return Ok(());
    }
    let mut partner_image = decode_png(&fs::read(&partner_path)?)?.to_rgba8();
    if !is_grey(&partner_image) {
        return Ok(());
    }
    if !result.add_hash_if_needed(without_palette(info)) {
        tracing::debug!("Duplicate {}", file.relative.display());
        return Ok(());
    }
    if partner_image.dimensions() != image.dimensions() {
        partner_image = imageops::resize(&partner_image, image.width(), image.height(), FilterType::CatmullRom);
    }

    let trend = channel_trend(&image, &partner_image);
    let subdir = file.relative.parent().map(Path::to_path_buf).unwrap_or_default();
    let outputs = [
        (trend < CONFIDENT_TREND, trend > 0, (&partner, &partner_image), (&info, &image)),
        (trend > -CONFIDENT_TREND, trend <= 0, (&info, &image), (&partner, &partner_image)),
    ];
    for (wanted, alternative, (rg_name, rg), (ba_name, ba)) in outputs {
        if !wanted {
            continue;
        }
        let dir = if alternative {
            dest.join(ALTERNATIVES_DIR).join(&subdir)
        } else {
            dest.join(&subdir)
        };
        let target = dir.join(format!("{}.png", SplitTextureHashInfo::new(rg_name, ba_name).build()));
        if !options.dry_run {
            save_png(&merge(rg, ba), &target)?;
        }
        tracing::info!("{} RGBA tendency {trend}", target.display());
        result.add_combined(alternative);
    }
    Ok(())
}

/// The only other palette variant of `info` next to `path`. Returns `None`
/// unless exactly one exists.
fn find_partner(path: &Path, info: DolphinTextureHashInfo) -> Result<Option<(PathBuf, DolphinTextureHashInfo)>> {
    let Some(dir) = path.parent() else {
        return Ok(None);
    };
    let key = without_palette(info);
    let mut partners = Vec::new();
    for entry in fs::read_dir(dir)? {
        let candidate = entry?.path();
        if candidate == path || !candidate.is_file() {
            continue;
        }
        if let Some(other) = dump_name(&candidate).filter(|other| without_palette(*other) == key) {
            partners.push((candidate, other));
        }
    }
    Ok(match partners.len() {
        1 => partners.pop(),
        _ => None,
    })
}

fn is_grey(image: &RgbaImage) -> bool {
    image.pixels().all(|p| p[0] == p[1] && p[1] == p[2])
}

/// Red and green from the grey and alpha of `rg`, blue and alpha from
/// those of `ba`.
fn merge(rg: &RgbaImage, ba: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(rg.width(), rg.height(), |x, y| {
        let a = rg.get_pixel(x, y);
        let b = ba.get_pixel(x, y);
        image::Rgba([a[0], a[3], b[0], b[3]])
    })
}

/// Running state of one image's alpha channel.
#[derive(Default)]
struct AlphaTrend {
    last: (u8, u8),
    direction: i8,
}

impl AlphaTrend {
    /// Feed the next (grey, alpha) pixel. True if the alpha keeps moving the
    /// way it did before.
    fn steady(&mut self, pixel: (u8, u8)) -> bool {
        let direction = match self.last.1.cmp(&pixel.1) {
            std::cmp::Ordering::Less => 1,
            std::cmp::Ordering::Greater => -1,
            std::cmp::Ordering::Equal => 0,
        };
        let steady = self.direction == 0 || direction == self.direction;
        self.direction = direction;
        self.last = pixel;
        steady
    }
}

/// Score how likely `first` holds red and green: negative favors `second`
/// as the red and green half, positive favors `first`.
fn channel_trend(first: &RgbaImage, second: &RgbaImage) -> i64 {
    let mut trend = 0i64;
    let mut first_alpha = AlphaTrend::default();
    let mut second_alpha = AlphaTrend::default();

    for (a, b) in first.pixels().zip(second.pixels()) {
        let p1 = (a[0], a[3]);
        let p2 = (b[0], b[3]);

        // fully transparent pixels tend to keep their grey in the alpha half
        if p1.0 == p2.0 && p1.0 == p2.1 {
            trend -= if p1.1 == 0 { 30 } else { 10 };
        }
        if p1.0 == p2.0 && p1.0 == p1.1 {
            trend += if p2.1 == 0 { 30 } else { 10 };
        }

        // with the grey unchanged, a lone moving value is probably alpha
        let (last1, last2) = (first_alpha.last, second_alpha.last);
        if last1.0 == p1.0 && last2.0 == p2.0 {
            if last1.1 == p1.1 && last2.1 != p2.1 {
                trend += 5;
            } else if last2.1 == p2.1 && last1.1 != p1.1 {
                trend -= 5;
            }
        }

        trend += if first_alpha.steady(p1) { -1 } else { 3 };
        trend += if second_alpha.steady(p2) { 1 } else { -3 };
    }
    trend
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::texture::{GxImageFormat, TextureHash};

    fn info(tlut: u64) -> DolphinTextureHashInfo {
        DolphinTextureHashInfo::new(8, 8, TextureHash::new(0xABCD, tlut), GxImageFormat::C8)
    }

    fn ramp(x: u32, y: u32) -> u8 {
        ((y * 8 + x) * 3) as u8
    }

    /// Grey ramp, opaque.
    fn opaque() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            let v = ramp(x, y);
            Rgba([v, v, v, 255])
        })
    }

    /// Grey ramp with alpha following the grey.
    fn faded() -> RgbaImage {
        RgbaImage::from_fn(8, 8, |x, y| {
            let v = ramp(x, y);
            Rgba([v, v, v, v])
        })
    }

    fn write_pair(dir: &Path) {
        save_png(&opaque(), &dir.join(format!("{}.png", info(1).build()))).unwrap();
        save_png(&faded(), &dir.join(format!("{}.png", info(2).build()))).unwrap();
    }

    #[test]
    fn test_trend_favors_alpha_tracking_half() {
        assert!(channel_trend(&opaque(), &faded()) <= -CONFIDENT_TREND);
    }

    #[test]
    fn test_merge_channels() {
        let merged = merge(&faded(), &opaque());
        assert_eq!(*merged.get_pixel(1, 0), Rgba([3, 3, 3, 255]));
    }

    #[test]
    fn test_combines_pair_once() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_pair(&src.path().join("a"));
        write_pair(&src.path().join("b"));

        let result = CombineRgba::run(src.path(), out.path(), &ScanOptions::new().with_threads(1)).unwrap();
        assert_eq!(result.combined(), 1);
        assert_eq!(result.alternatives(), 0);

        let name = SplitTextureHashInfo::new(&info(2), &info(1));
        let written = out.path().join("a").join(format!("{}.png", name.build()));
        let written = if written.exists() {
            written
        } else {
            out.path().join("b").join(format!("{}.png", name.build()))
        };
        let image = decode_png(&fs::read(&written).unwrap()).unwrap().to_rgba8();
        assert_eq!(*image.get_pixel(1, 0), Rgba([3, 3, 3, 255]));
    }

    #[test]
    fn test_colored_and_unpaired_dumps_are_ignored() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let red = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]));
        save_png(&red, &src.path().join("pair").join(format!("{}.png", info(1).build()))).unwrap();
        save_png(&opaque(), &src.path().join("pair").join(format!("{}.png", info(2).build()))).unwrap();
        save_png(&opaque(), &src.path().join("alone").join(format!("{}.png", info(3).build()))).unwrap();

        let result = CombineRgba::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.combined() + result.alternatives(), 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_corrupt_dump_is_copied_aside() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let name = format!("{}.png", info(4).build());
        fs::write(src.path().join(&name), b"not a png").unwrap();

        let result = CombineRgba::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.corrupt(), 1);
        assert!(out.path().join(CORRUPT_DIR).join(&name).exists());
    }

    #[test]
    fn test_split_name_roundtrip() {
        let name = SplitTextureHashInfo::new(&info(2), &info(1));
        let parsed = SplitTextureHashInfo::parse(&format!("{}.png", name.build())).unwrap();
        assert_eq!(parsed.split(), (info(2), info(1)));
    }
}
