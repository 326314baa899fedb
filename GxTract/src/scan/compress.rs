//! Compress stage: compress every file of a directory with one codec

use std::fs;
use std::path::Path;

use super::{
    CancellationToken, CompressResult, FileOutcome, ScanOptions, ScanProgress, SourceFile,
    discover, run_files,
};
use crate::compression::{Compression, CompressionLevel};
use crate::error::{Error, Result};

/// Compresses every file below a source path into the same relative path
/// under the destination.
///
/// An existing destination file is left alone and counted as failed unless
/// the options allow overwriting.
pub struct Compress;

impl Compress {
    /// Compress everything below `source` into `dest` with `codec`.
    ///
    /// # Errors
    /// Returns [`Error::CapabilityUnsupported`] if the codec cannot compress,
    /// otherwise fails only if the source is missing, cannot be listed, or
    /// the worker pool cannot be created.
    pub fn run(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        codec: &dyn Compression,
        level: CompressionLevel,
        options: &ScanOptions,
    ) -> Result<CompressResult> {
        Self::run_with_progress(source, dest, codec, level, options, &CancellationToken::new(), |_| {})
    }

    /// Like [`run`](Self::run) with progress reporting and cancellation.
    ///
    /// # Errors
    /// See [`run`](Self::run).
    pub fn run_with_progress<F>(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        codec: &dyn Compression,
        level: CompressionLevel,
        options: &ScanOptions,
        cancel: &CancellationToken,
        progress: F,
    ) -> Result<CompressResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        if !codec.can_write() {
            return Err(Error::CapabilityUnsupported {
                codec: codec.name(),
                operation: "compression",
            });
        }
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!(
            "Compressing {} files from {} with {}",
            files.len(),
            source.display(),
            codec.name()
        );

        let result = CompressResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            match compress_file(file, dest, codec, level, options) {
                Ok((old, new)) => result.add_compressed(old, new),
                Err(e) => {
                    tracing::warn!("Failed to compress {}: {e}", file.relative.display());
                    result.add_failed();
                }
            }
            FileOutcome::Done
        })?;
        Ok(result.finish(scan))
    }
}

fn compress_file(
    file: &SourceFile,
    dest: &Path,
    codec: &dyn Compression,
    level: CompressionLevel,
    options: &ScanOptions,
) -> Result<(u64, u64)> {
    let target = dest.join(&file.relative);
    if target.exists() && !options.overwrite {
        return Err(Error::DestinationOccupied { path: target });
    }
    let data = fs::read(&file.path)?;
    let packed = codec.compress_with_level(&data, level)?;
    if !options.dry_run {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &packed)?;
    }
    tracing::debug!(
        "{}: {} -> {} bytes",
        file.relative.display(),
        data.len(),
        packed.len()
    );
    Ok((data.len() as u64, packed.len() as u64))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::compression::{Yay0, Yaz0};

    #[test]
    fn test_compresses_tree() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        let data = b"texture data ".repeat(64);
        fs::write(src.path().join("sub/a.bin"), &data).unwrap();
        fs::write(src.path().join("b.bin"), b"tiny").unwrap();

        let result = Compress::run(src.path(), out.path(), &Yaz0, CompressionLevel::Optimal, &ScanOptions::new())
            .unwrap();
        assert_eq!(result.compressed(), 2);
        assert_eq!(result.failed(), 0);
        assert!(result.compression_rate() < 0.0);

        let packed = fs::read(out.path().join("sub/a.bin")).unwrap();
        assert_eq!(Yaz0.decompress(&packed).unwrap(), data);
        assert_eq!(result.old_size(), data.len() as u64 + 4);
    }

    #[test]
    fn test_existing_target_is_kept() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.bin"), b"abcabcabc").unwrap();
        fs::write(out.path().join("a.bin"), b"keep").unwrap();

        let result = Compress::run(src.path(), out.path(), &Yaz0, CompressionLevel::Fastest, &ScanOptions::new())
            .unwrap();
        assert_eq!(result.failed(), 1);
        assert_eq!(fs::read(out.path().join("a.bin")).unwrap(), b"keep");

        let options = ScanOptions::new().with_overwrite(true);
        let result = Compress::run(src.path(), out.path(), &Yaz0, CompressionLevel::Fastest, &options).unwrap();
        assert_eq!(result.compressed(), 1);
        assert_ne!(fs::read(out.path().join("a.bin")).unwrap(), b"keep");
    }

    #[test]
    fn test_decode_only_codec_is_rejected() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let err = Compress::run(src.path(), out.path(), &Yay0, CompressionLevel::Optimal, &ScanOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::CapabilityUnsupported { codec: "Yay0", .. }));
    }
}
