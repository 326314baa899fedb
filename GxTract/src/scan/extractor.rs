//! Texture extraction stage

use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use super::results::ExtractorTally;
use super::{
    CancellationToken, ExtractorResult, FileOutcome, RAW_DIR, ScanOptions, ScanProgress,
    SourceFile, discover, run_files, without_extension,
};
use crate::archive::u8_archive;
use crate::compression::{self, codec};
use crate::error::{Error, Result};
use crate::format::{FormatHandler, FormatInfo, FormatType, identify};
use crate::texture::{DolphinTextureHashInfo, TexEntry, bti, is_arbitrary_mipmap, save_png, tpl};
use crate::utils::{is_blacklisted, sanitize_path};

/// Scans files for textures and writes each unique one as a PNG named the
/// way Dolphin names its texture dumps.
///
/// Compressed data is unwrapped and archives are opened recursively. A
/// texture that was already seen anywhere in the scan (same size, format,
/// content and palette hash) is counted as duplicate and not written again.
///
/// # Example
///
/// ```no_run
/// use gxtract::scan::{ScanOptions, TextureExtractor};
///
/// let result = TextureExtractor::run("game/files", "dump", &ScanOptions::new())?;
/// println!("{result}");
/// # Ok::<(), gxtract::Error>(())
/// ```
pub struct TextureExtractor;

impl TextureExtractor {
    /// Extract all textures below `source` into `dest`.
    ///
    /// # Errors
    /// Fails only if the source is missing, cannot be listed, or the worker
    /// pool cannot be created. Problems with individual files are counted
    /// in the result.
    pub fn run(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &ScanOptions,
    ) -> Result<ExtractorResult> {
        Self::run_with_progress(source, dest, options, &CancellationToken::new(), |_| {})
    }

    /// Like [`run`](Self::run), reporting progress and stopping early once
    /// `cancel` is triggered.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_progress<F>(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &ScanOptions,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<ExtractorResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!(
            "Extracting textures from {} files in {}",
            files.len(),
            source.display()
        );

        let result = ExtractorResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            extract_file(file, dest, options, cancel, &result)
        })?;
        let result = result.finish(scan);

        tracing::info!(
            "Extracted {} textures ({} duplicates) in {:.3}s",
            result.extracted_textures(),
            result.duplicates(),
            result.scan().total_time.as_secs_f64()
        );
        Ok(result)
    }
}

fn extract_file(
    file: &SourceFile,
    dest: &Path,
    options: &ScanOptions,
    cancel: &CancellationToken,
    result: &ExtractorResult,
) -> FileOutcome {
    let data = match fs::read(&file.path) {
        Ok(data) => data,
        Err(e) => {
            tracing::warn!("Failed to read {}: {e}", file.path.display());
            let mut tally = ExtractorTally::default();
            tally.add_leaf(file.size);
            tally.add_unsupported(&FormatInfo::unknown(&file.extension(), &[]), file.size);
            result.commit(tally);
            return FileOutcome::Done;
        }
    };

    let mut worker = Worker::new(dest, options, cancel, result);
    let flow = worker.process(&data, &file.extension(), &without_extension(&file.relative), 0);
    if flow.is_break() {
        tracing::debug!("Cancelled while processing {}", file.relative.display());
    }
    worker.finish(flow)
}

/// Per-file state of one worker. The tally is committed to the shared
/// result only once the whole file was processed; the texture keys the
/// file recorded are released again if it was not.
struct Worker<'a> {
    dest: &'a Path,
    options: &'a ScanOptions,
    cancel: &'a CancellationToken,
    result: &'a ExtractorResult,
    tally: ExtractorTally,
    recorded: Vec<DolphinTextureHashInfo>,
}

impl<'a> Worker<'a> {
    fn new(
        dest: &'a Path,
        options: &'a ScanOptions,
        cancel: &'a CancellationToken,
        result: &'a ExtractorResult,
    ) -> Self {
        Self {
            dest,
            options,
            cancel,
            result,
            tally: ExtractorTally::default(),
            recorded: Vec::new(),
        }
    }

    fn finish(self, flow: ControlFlow<()>) -> FileOutcome {
        match flow {
            ControlFlow::Continue(()) => {
                self.result.commit(self.tally);
                FileOutcome::Done
            }
            ControlFlow::Break(()) => {
                self.result.release_hashes(&self.recorded);
                FileOutcome::Cancelled
            }
        }
    }

    /// Classify one blob and dispatch it. `subdir` is where textures found
    /// in it are written, relative to the destination.
    fn process(&mut self, data: &[u8], extension: &str, subdir: &Path, depth: u32) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }

        let format = identify(data, extension);
        let size = data.len() as u64;
        tracing::debug!("{}: {}", subdir.display(), format.full_description());

        match format.handler {
            FormatHandler::Compression(kind) => {
                if !self.options.allows_depth(depth) {
                    self.tally.add_leaf(size);
                    self.tally.add_skipped(size);
                    return ControlFlow::Continue(());
                }
                match codec(kind).decompress(data) {
                    Ok(inner) => self.process(&inner, extension, subdir, depth + 1),
                    Err(e) => {
                        self.unsupported(&format, size, subdir, &e);
                        ControlFlow::Continue(())
                    }
                }
            }
            FormatHandler::U8Archive => {
                if !self.options.allows_depth(depth) {
                    self.tally.add_leaf(size);
                    self.tally.add_skipped(size);
                    return ControlFlow::Continue(());
                }
                let name = subdir.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                match u8_archive::read(data, &name) {
                    Ok(root) => {
                        for (path, file) in root.files() {
                            let member = subdir.join(without_extension(&sanitize_path(&path)));
                            self.process(file.data(), file.extension(), &member, depth + 1)?;
                        }
                        ControlFlow::Continue(())
                    }
                    Err(e) => {
                        self.unsupported(&format, size, subdir, &e);
                        ControlFlow::Continue(())
                    }
                }
            }
            FormatHandler::Tpl => match tpl::read(data) {
                Ok(entries) => self.textures(&entries, data, &format, subdir),
                Err(e) => {
                    self.unsupported(&format, size, subdir, &e);
                    ControlFlow::Continue(())
                }
            },
            FormatHandler::Bti => match bti::read(data) {
                Ok(entry) => self.textures(&[entry], data, &format, subdir),
                Err(e) => {
                    self.unsupported(&format, size, subdir, &e);
                    ControlFlow::Continue(())
                }
            },
            FormatHandler::None if format.typ == FormatType::Unknown => {
                self.unknown(data, extension, &format, subdir, depth)
            }
            FormatHandler::None => {
                self.tally.add_leaf(size);
                self.tally.add_unsupported(&format, size);
                ControlFlow::Continue(())
            }
        }
    }

    fn unknown(
        &mut self,
        data: &[u8],
        extension: &str,
        format: &FormatInfo,
        subdir: &Path,
        depth: u32,
    ) -> ControlFlow<()> {
        if self.options.force && self.options.allows_depth(depth) {
            if let Ok((inner, name)) = compression::try_decompress(data) {
                tracing::debug!("{}: forced {name} decompression", subdir.display());
                return self.process(&inner, extension, subdir, depth + 1);
            }
        }
        let size = data.len() as u64;
        self.tally.add_leaf(size);
        self.tally.add_unknown(format, size);
        ControlFlow::Continue(())
    }

    fn unsupported(&mut self, format: &FormatInfo, size: u64, subdir: &Path, error: &Error) {
        tracing::warn!("{}: {error}", subdir.display());
        self.tally.add_leaf(size);
        self.tally.add_unsupported(format, size);
    }

    /// Decode, deduplicate and write the textures of one container.
    ///
    /// A texture is only recorded once it decoded; a write failure drops
    /// the record again so a later copy can still be extracted.
    fn textures(
        &mut self,
        entries: &[TexEntry],
        data: &[u8],
        format: &FormatInfo,
        subdir: &Path,
    ) -> ControlFlow<()> {
        let size = data.len() as u64;
        let mut extracted = 0;
        let mut last_error = None;

        for entry in entries {
            let palettes = if entry.format.is_palette_format() {
                entry.palettes.len()
            } else {
                1
            };
            for palette in 0..palettes {
                if self.cancel.is_cancelled() {
                    return ControlFlow::Break(());
                }
                let levels = match self.decode_levels(entry, palette) {
                    Ok(levels) => levels,
                    Err(e) => {
                        tracing::debug!("{}: failed to decode {}: {e}", subdir.display(), entry.format);
                        last_error = Some(e);
                        continue;
                    }
                };
                let info = entry.hash_info(palette, self.options.dolphin_mip_detection);
                if !self.result.add_hash_if_needed(info) {
                    self.tally.duplicates += 1;
                    continue;
                }
                if !self.options.dry_run {
                    if let Err(e) = self.save_levels(&levels, info, subdir) {
                        tracing::debug!("{}: failed to write {info}: {e}", subdir.display());
                        self.result.release_hashes(&[info]);
                        last_error = Some(e);
                        continue;
                    }
                }
                self.recorded.push(info);
                extracted += 1;
            }
        }

        if extracted > 0 {
            self.tally.add_leaf(size);
            self.tally.add_extracted(size);
            self.tally.extracted_textures += extracted;
            if self.options.raw && !self.options.dry_run {
                self.write_raw(data, format, subdir);
            }
        } else if let Some(e) = last_error {
            self.unsupported(format, size, subdir, &e);
        } else {
            self.tally.add_leaf(size);
            self.tally.add_skipped(size);
        }
        ControlFlow::Continue(())
    }

    /// Decode the levels that may be written: the whole chain when mips
    /// are wanted or could turn out arbitrary, else the base level.
    fn decode_levels(&self, entry: &TexEntry, palette: usize) -> Result<Vec<RgbaImage>> {
        let with_levels = entry.levels.len() > 1
            && (self.options.mips || self.options.arbitrary_mipmap_detection);
        if with_levels {
            (0..entry.levels.len())
                .map(|level| entry.image(level, palette))
                .collect()
        } else {
            Ok(vec![entry.image(0, palette)?])
        }
    }

    fn save_levels(&self, levels: &[RgbaImage], info: DolphinTextureHashInfo, subdir: &Path) -> Result<()> {
        let arbitrary = self.options.arbitrary_mipmap_detection && is_arbitrary_mipmap(levels);
        let info = info.with_arbitrary_mipmap(arbitrary);
        let count = if self.options.mips || arbitrary { levels.len() } else { 1 };

        let dir = self.dest.join(subdir);
        for (level, image) in (0u32..).zip(levels.iter().take(count)) {
            let path = dir.join(format!("{}.png", info.with_mip_level(level).build()));
            if is_blacklisted(&path) || path.exists() {
                continue;
            }
            save_png(image, &path)?;
            tracing::info!("Extracted {}", path.display());
        }
        Ok(())
    }

    fn write_raw(&self, data: &[u8], format: &FormatInfo, subdir: &Path) {
        let extension = format.extension.trim_start_matches('.');
        let path: PathBuf = self.dest.join(RAW_DIR).join(subdir).with_extension(extension);
        if path.exists() || is_blacklisted(&path) {
            return;
        }
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, data));
        if let Err(e) = written {
            tracing::warn!("Failed to write {}: {e}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use image::Rgba;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::archive::{DirectoryNode, FileNode};
    use crate::compression::{Compression, Yaz0};
    use crate::texture::{GxImageFormat, GxPaletteFormat, Palette};

    fn texture(seed: u8) -> TexEntry {
        let mut image = RgbaImage::new(8, 8);
        for (i, px) in image.pixels_mut().enumerate() {
            *px = Rgba([seed.wrapping_add(i as u8), seed, 0x40, 0xFF]);
        }
        TexEntry::from_image(&image, GxImageFormat::Rgba32, GxPaletteFormat::Ia8).unwrap()
    }

    fn pngs(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "png"))
            .map(|e| e.path().to_path_buf())
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_extracts_tpl_and_names_by_hash() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let entry = texture(1);
        fs::write(src.path().join("a.tpl"), tpl::write(std::slice::from_ref(&entry)).unwrap()).unwrap();

        let result = TextureExtractor::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.extracted_textures(), 1);
        assert_eq!(result.extracted_files(), 1);

        let expected = out
            .path()
            .join("a")
            .join(format!("{}.png", entry.hash_info(0, true).build()));
        assert_eq!(pngs(out.path()), vec![expected]);
    }

    #[test]
    fn test_nested_yaz0_u8_archive() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut root = DirectoryNode::new("");
        root.add_path("tex", FileNode::new("one.tpl", tpl::write(&[texture(1)]).unwrap()))
            .unwrap();
        root.add(FileNode::new("two.bti", bti::write(&texture(2)).unwrap()))
            .unwrap();
        root.add(FileNode::new("notes.txt", b"hello".to_vec())).unwrap();
        let archive = Yaz0.compress(&u8_archive::write(&root).unwrap()).unwrap();
        fs::write(src.path().join("stage.szs"), archive).unwrap();

        let result = TextureExtractor::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.extracted_textures(), 2);
        assert_eq!(result.unknown(), 1);
        assert_eq!(result.files_processed(), 3);
        let found = pngs(out.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.starts_with(out.path().join("stage/tex/one"))));
        assert!(found.iter().any(|p| p.starts_with(out.path().join("stage/two"))));
    }

    #[test]
    fn test_depth_limit_skips_containers() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let packed = Yaz0.compress(&tpl::write(&[texture(3)]).unwrap()).unwrap();
        fs::write(src.path().join("a.szs"), &packed).unwrap();

        let options = ScanOptions::new().with_max_depth(1);
        let result = TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        assert_eq!(result.extracted_textures(), 1);

        let out = tempfile::tempdir().unwrap();
        let nested = Yaz0.compress(&packed).unwrap();
        fs::write(src.path().join("a.szs"), nested).unwrap();
        let result = TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        assert_eq!(result.extracted_textures(), 0);
        assert_eq!(result.skipped(), 1);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.tpl"), tpl::write(&[texture(4)]).unwrap()).unwrap();

        let options = ScanOptions::new().with_dry_run(true).with_raw(true);
        let result = TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        assert_eq!(result.extracted_textures(), 1);
        assert!(pngs(out.path()).is_empty());
        assert!(!out.path().join(RAW_DIR).exists());
    }

    #[test]
    fn test_raw_copy() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let data = tpl::write(&[texture(5)]).unwrap();
        fs::write(src.path().join("a.tpl"), &data).unwrap();

        let options = ScanOptions::new().with_raw(true);
        TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        assert_eq!(fs::read(out.path().join(RAW_DIR).join("a.tpl")).unwrap(), data);
    }

    #[test]
    fn test_mips_written_on_request() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut entry = texture(6);
        let mip = RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 255]));
        let mip = TexEntry::from_image(&mip, GxImageFormat::Rgba32, GxPaletteFormat::Ia8).unwrap();
        entry.levels.push(mip.levels[0].clone());
        fs::write(src.path().join("a.tpl"), tpl::write(&[entry]).unwrap()).unwrap();

        let options = ScanOptions::new()
            .with_mips(true)
            .with_arbitrary_mipmap_detection(false);
        TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        let found = pngs(out.path());
        assert_eq!(found.len(), 2);
        assert!(found.iter().any(|p| p.to_string_lossy().ends_with("_6_mip1.png")));
    }

    #[test]
    fn test_unknown_and_unsupported_are_counted() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("blob.bin"), [7u8; 64]).unwrap();
        // Valid TPL magic with an image offset past the end.
        fs::write(
            src.path().join("broken.tpl"),
            [0x00, 0x20, 0xAF, 0x30, 0, 0, 0, 1, 0, 0, 0, 0x0C, 0, 0, 0x10, 0, 0, 0, 0, 0],
        )
        .unwrap();

        let result = TextureExtractor::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.unknown(), 1);
        assert_eq!(result.unsupported(), 1);
        assert_eq!(result.bytes_processed(), 84);
        assert_eq!(result.unsupported_formats().len(), 1);
    }

    /// C8 texture whose texels index past its one-entry palette.
    fn undecodable_tpl() -> Vec<u8> {
        let mut entry = TexEntry::new(GxImageFormat::C8, 8, 4, vec![1; 32]);
        entry.palette_format = GxPaletteFormat::Rgb565;
        entry.palettes = vec![Palette::new(GxPaletteFormat::Rgb565, vec![0xF800])];
        tpl::write(&[entry]).unwrap()
    }

    #[test]
    fn test_undecodable_copies_are_each_unsupported() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.tpl"), undecodable_tpl()).unwrap();
        fs::write(src.path().join("b.tpl"), undecodable_tpl()).unwrap();

        let options = ScanOptions::new().with_threads(1);
        let result = TextureExtractor::run(src.path(), out.path(), &options).unwrap();
        assert_eq!(result.unsupported(), 2);
        assert_eq!(result.skipped(), 0);
        assert_eq!(result.duplicates(), 0);
        assert_eq!(result.extracted_files(), 0);
        assert_eq!(result.unique_hashes(), 0);
        assert!(pngs(out.path()).is_empty());
    }

    #[test]
    fn test_undecodable_copy_does_not_hide_good_texture() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut root = DirectoryNode::new("");
        root.add(FileNode::new("bad.tpl", undecodable_tpl())).unwrap();
        root.add(FileNode::new("good.tpl", tpl::write(&[texture(9)]).unwrap()))
            .unwrap();
        fs::write(src.path().join("pack.arc"), u8_archive::write(&root).unwrap()).unwrap();

        let result = TextureExtractor::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.unsupported(), 1);
        assert_eq!(result.extracted_textures(), 1);
        assert_eq!(result.unique_hashes(), 1);
    }

    #[test]
    fn test_cancelled_file_releases_its_hashes() {
        let out = tempfile::tempdir().unwrap();
        let options = ScanOptions::new().with_dry_run(true);
        let cancel = CancellationToken::new();
        let result = ExtractorResult::new();

        let mut root = DirectoryNode::new("");
        root.add(FileNode::new("a.tpl", tpl::write(&[texture(1)]).unwrap()))
            .unwrap();
        let archive = u8_archive::write(&root).unwrap();

        let mut worker = Worker::new(out.path(), &options, &cancel, &result);
        assert!(worker.process(&archive, ".arc", Path::new("stage"), 0).is_continue());
        assert_eq!(result.unique_hashes(), 1);

        cancel.cancel();
        let second = tpl::write(&[texture(2)]).unwrap();
        let flow = worker.process(&second, ".tpl", Path::new("stage/b"), 1);
        assert!(flow.is_break());
        assert!(matches!(worker.finish(flow), FileOutcome::Cancelled));

        assert_eq!(result.unique_hashes(), 0);
        assert_eq!(result.files_processed(), 0);
        assert_eq!(result.extracted_textures(), 0);
    }
}
