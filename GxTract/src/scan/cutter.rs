//! Cutter stage: split blobs into the files embedded in them
//!
//! A blob is searched for the identifiers of known formats. Formats that
//! record their own length are cut exactly; everything else runs up to the
//! next identifier or the end of the blob.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    CancellationToken, CutterResult, FileOutcome, ScanOptions, ScanProgress, SourceFile, discover,
    run_files, without_extension,
};
use crate::archive::u8_archive;
use crate::compression::{CodecKind, yaz0};
use crate::error::{Error, Result};
use crate::format::{FormatHandler, FormatInfo, Identifier, registry};
use crate::texture::tpl;

/// Failed candidates tolerated (net of successful cuts) before a blob is
/// given up as corrupt.
const MAX_ERRORS: usize = 15;

/// Shortest identifier searched for by default.
const MIN_PATTERN_LEN: usize = 4;

/// One embedded file found in a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Start of the file in the blob.
    pub offset: usize,
    pub len: usize,
    /// Extension including the dot.
    pub extension: String,
}

/// An identifier to search for and the format it announces.
#[derive(Debug, Clone)]
struct Pattern {
    bytes: Vec<u8>,
    format: FormatInfo,
}

impl Pattern {
    fn from_bytes(bytes: &[u8]) -> Self {
        let format = registry()
            .iter()
            .find(|f| f.identifier.as_ref().is_some_and(|id| id.as_bytes() == bytes))
            .cloned()
            .unwrap_or_else(|| {
                let mut format = FormatInfo::unknown(".bin", &[]);
                format.identifier = Some(Identifier::from_slice(bytes));
                format
            });
        Self {
            bytes: bytes.to_vec(),
            format,
        }
    }
}

/// Identifiers of every readable registered format.
fn default_patterns() -> Vec<Pattern> {
    registry()
        .iter()
        .filter(|f| f.can_read())
        .filter_map(|f| {
            let id = f.identifier.as_ref()?;
            (id.len() >= MIN_PATTERN_LEN).then(|| Pattern {
                bytes: id.as_bytes().to_vec(),
                format: f.clone(),
            })
        })
        .collect()
}

/// Splits every file below a source path into the files embedded in it.
///
/// A blob holding one file is written under its own name; a blob holding
/// several is written as `entry_<n>` files into a directory named after it.
pub struct Cutter;

impl Cutter {
    /// Cut everything below `source` into `dest`, searching for the
    /// identifiers of all readable formats.
    ///
    /// # Errors
    /// Fails only if the source is missing, cannot be listed, or the worker
    /// pool cannot be created.
    pub fn run(source: impl AsRef<Path>, dest: impl AsRef<Path>, options: &ScanOptions) -> Result<CutterResult> {
        Self::run_with_progress(source, dest, None, options, &CancellationToken::new(), |_| {})
    }

    /// The files embedded in `data`, found with the default identifiers.
    ///
    /// # Errors
    /// Returns [`Error::CorruptData`] when too many candidates fail
    /// validation.
    pub fn split(data: &[u8]) -> Result<Vec<Segment>> {
        split(data, &default_patterns())
    }

    /// Cut with a custom list of identifiers.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_patterns(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        patterns: &[Vec<u8>],
        options: &ScanOptions,
    ) -> Result<CutterResult> {
        Self::run_with_progress(source, dest, Some(patterns), options, &CancellationToken::new(), |_| {})
    }

    /// Like [`run_with_patterns`](Self::run_with_patterns) with progress
    /// reporting and cancellation. `None` searches for the default
    /// identifiers.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_progress<F>(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        patterns: Option<&[Vec<u8>]>,
        options: &ScanOptions,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<CutterResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        let patterns = match patterns {
            Some(custom) => custom
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| Pattern::from_bytes(p))
                .collect(),
            None => default_patterns(),
        };
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!(
            "Cutting {} files from {} with {} patterns",
            files.len(),
            source.display(),
            patterns.len()
        );

        let result = CutterResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            match cut_file(file, dest, &patterns, options) {
                Ok(0) => result.add_empty(),
                Ok(segments) => result.add_cut(segments),
                Err(e) => {
                    tracing::warn!("Failed to cut {}: {e}", file.relative.display());
                    result.add_failed();
                }
            }
            FileOutcome::Done
        })?;
        Ok(result.finish(scan))
    }
}

fn cut_file(file: &SourceFile, dest: &Path, patterns: &[Pattern], options: &ScanOptions) -> Result<usize> {
    let data = fs::read(&file.path)?;
    let segments = split(&data, patterns)?;
    let base = dest.join(without_extension(&file.relative));

    let targets: Vec<(PathBuf, &Segment)> = match segments.as_slice() {
        [] => return Ok(0),
        [only] => vec![(base.with_extension(only.extension.trim_start_matches('.')), only)],
        many => many
            .iter()
            .enumerate()
            .map(|(i, s)| (base.join(format!("entry_{}{}", i + 1, s.extension)), s))
            .collect(),
    };
    if segments.len() > 1 {
        tracing::info!("{} holds {} files", file.relative.display(), segments.len());
    }

    for (target, segment) in &targets {
        if target.exists() && !options.overwrite {
            return Err(Error::DestinationOccupied { path: target.clone() });
        }
        if options.dry_run {
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, &data[segment.offset..segment.offset + segment.len])?;
    }
    Ok(targets.len())
}

/// Earliest occurrence of any pattern at or after `from`. At equal
/// positions the earlier pattern wins.
fn find_next(data: &[u8], from: usize, patterns: &[Pattern]) -> Option<(usize, usize)> {
    (from..data.len()).find_map(|pos| {
        patterns
            .iter()
            .position(|p| data[pos..].starts_with(&p.bytes))
            .map(|index| (pos, index))
    })
}

/// Split `data` into the files it embeds.
///
/// # Errors
/// Returns [`Error::CorruptData`] when more candidates fail validation than
/// the tolerance allows.
fn split(data: &[u8], patterns: &[Pattern]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut errors = 0usize;
    let mut search = 0;

    while let Some((pos, index)) = find_next(data, search, patterns) {
        if errors > MAX_ERRORS {
            break;
        }
        let pattern = &patterns[index];
        let Some(start) = pos.checked_sub(pattern.format.identifier_offset) else {
            errors += 1;
            search = pos + 1;
            continue;
        };
        match segment_len(data, start, pos + pattern.bytes.len(), pattern, patterns) {
            Some(len) => {
                errors = errors.saturating_sub(1);
                let extension = match pattern.format.extension.as_ref() {
                    "" => ".bin".to_string(),
                    ext => ext.to_string(),
                };
                segments.push(Segment {
                    offset: start,
                    len,
                    extension,
                });
                search = start + len;
            }
            None => {
                errors += 1;
                search = pos + 1;
            }
        }
    }

    if errors > MAX_ERRORS {
        return Err(Error::corrupt(format!(
            "more than {MAX_ERRORS} invalid candidates"
        )));
    }
    Ok(segments)
}

/// Length of the file of `pattern`'s format at `start`, or `None` if the
/// candidate does not hold up.
fn segment_len(data: &[u8], start: usize, after_id: usize, pattern: &Pattern, patterns: &[Pattern]) -> Option<usize> {
    let entry = &data[start..];
    if !pattern.format.is_match(entry, "") {
        return None;
    }
    let up_to_next = |from: usize| {
        find_next(data, from, patterns).map_or(data.len(), |(pos, _)| pos) - start
    };

    let len = match (pattern.format.handler, pattern.bytes.as_slice()) {
        (FormatHandler::U8Archive, _) => u8_archive::archive_len(entry).ok()?,
        (FormatHandler::Compression(CodecKind::Yaz0), _) => yaz0::stream_len(entry).ok()?,
        // palette data may be followed by padding, keep it with the file
        (FormatHandler::Tpl, _) => up_to_next(start + tpl::data_len(entry).ok()?),
        (_, b"RARC") => be32(entry, 4)? as usize,
        (_, b"bres" | b"REFT") => {
            if entry.get(4..6)? != [0xFE, 0xFF] {
                return None;
            }
            be32(entry, 8)? as usize
        }
        _ => up_to_next(after_id),
    };
    (len > 0 && len <= entry.len()).then_some(len)
}

fn be32(data: &[u8], at: usize) -> Option<u32> {
    let bytes = data.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::archive::{DirectoryNode, FileNode};
    use crate::compression::{Compression, Yaz0};
    use crate::texture::{GxImageFormat, GxPaletteFormat, TexEntry};

    fn tpl_bytes(seed: u8) -> Vec<u8> {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([seed, x as u8 * 16, y as u8 * 16, 0xFF]));
        let entry = TexEntry::from_image(&image, GxImageFormat::Rgba32, GxPaletteFormat::Ia8).unwrap();
        tpl::write(&[entry]).unwrap()
    }

    fn archive_bytes() -> Vec<u8> {
        let mut root = DirectoryNode::new("");
        root.add(FileNode::new("a.txt", b"inside the archive".to_vec())).unwrap();
        u8_archive::write(&root).unwrap()
    }

    #[test]
    fn test_split_concatenated_blob() {
        let archive = archive_bytes();
        let packed = Yaz0.compress(&[7u8; 300]).unwrap();
        let texture = tpl_bytes(1);

        let mut blob = vec![0u8; 16];
        blob.extend_from_slice(&archive);
        blob.extend_from_slice(&packed);
        blob.extend_from_slice(&texture);

        let segments = split(&blob, &default_patterns()).unwrap();
        let found: Vec<(usize, usize, &str)> = segments
            .iter()
            .map(|s| (s.offset, s.len, s.extension.as_str()))
            .collect();
        assert_eq!(
            found,
            vec![
                (16, archive.len(), ".arc"),
                (16 + archive.len(), packed.len(), ".szs"),
                (16 + archive.len() + packed.len(), texture.len(), ".tpl"),
            ]
        );
    }

    #[test]
    fn test_truncated_candidate_is_skipped() {
        let archive = archive_bytes();
        let mut blob = tpl_bytes(2);
        blob.extend_from_slice(&archive[..archive.len() / 2]);

        let segments = split(&blob, &default_patterns()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].extension, ".tpl");
        assert_eq!(segments[0].len, tpl_bytes(2).len());
    }

    #[test]
    fn test_too_many_bad_candidates_is_corrupt() {
        let blob = b"Yaz0".repeat(40);
        let err = split(&blob, &default_patterns()).unwrap_err();
        assert!(matches!(err, Error::CorruptData { .. }));
    }

    #[test]
    fn test_custom_pattern_runs_to_next_match() {
        let mut blob = b"junkMAGIC111MAGIC2222".to_vec();
        blob.extend_from_slice(b"tail");
        let patterns = vec![Pattern::from_bytes(b"MAGIC")];
        let segments = split(&blob, &patterns).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment { offset: 4, len: 8, extension: ".bin".to_string() },
                Segment { offset: 12, len: 13, extension: ".bin".to_string() },
            ]
        );
    }

    #[test]
    fn test_cutter_writes_entries() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut blob = tpl_bytes(3);
        blob.extend_from_slice(&archive_bytes());
        fs::write(src.path().join("data.bin"), &blob).unwrap();
        fs::write(src.path().join("single.dat"), archive_bytes()).unwrap();
        fs::write(src.path().join("plain.txt"), b"nothing to see").unwrap();

        let result = Cutter::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.files_cut(), 2);
        assert_eq!(result.segments(), 3);
        assert_eq!(result.empty(), 1);
        assert_eq!(result.failed(), 0);

        assert_eq!(fs::read(out.path().join("data/entry_1.tpl")).unwrap(), tpl_bytes(3));
        assert_eq!(fs::read(out.path().join("data/entry_2.arc")).unwrap(), archive_bytes());
        assert_eq!(fs::read(out.path().join("single.arc")).unwrap(), archive_bytes());
        assert!(!out.path().join("plain.txt").exists());
    }

    #[test]
    fn test_cutter_with_custom_patterns() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.pak"), b"xxTAGoneTAGtwo").unwrap();

        let result = Cutter::run_with_patterns(src.path(), out.path(), &[b"TAG".to_vec()], &ScanOptions::new())
            .unwrap();
        assert_eq!(result.segments(), 2);
        assert_eq!(fs::read(out.path().join("a/entry_1.bin")).unwrap(), b"TAGone");
        assert_eq!(fs::read(out.path().join("a/entry_2.bin")).unwrap(), b"TAGtwo");
    }
}
