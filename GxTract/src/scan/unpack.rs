//! Unpack stage: unwrap compression and export archives to disk

use std::fs;
use std::ops::ControlFlow;
use std::path::Path;

use super::{
    CancellationToken, FileOutcome, ScanOptions, ScanProgress, SourceFile, UnpackResult,
    discover, run_files, without_extension,
};
use crate::archive::u8_archive;
use crate::compression::codec;
use crate::error::Result;
use crate::format::{FormatHandler, identify};
use crate::utils::sanitize_path;

/// Recursively unwraps compressed files and exports every readable archive
/// below a source path.
///
/// An archive `dir/stage.arc` is exported to `dest/dir/stage/`; archives
/// inside it are exported next to their own file, without the extension.
/// A compressed file that holds no archive is written decompressed with
/// the extension of its content.
pub struct Unpack;

impl Unpack {
    /// Unpack everything below `source` into `dest`.
    ///
    /// # Errors
    /// Fails only if the source is missing, cannot be listed, or the worker
    /// pool cannot be created.
    pub fn run(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        options: &ScanOptions,
    ) -> Result<UnpackResult> {
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
    ) -> Result<UnpackResult>
    where
        F: Fn(&ScanProgress) + Send + Sync,
    {
        let source = source.as_ref();
        let dest = dest.as_ref();
        let files = discover(source)?;
        tracing::info!("Unpacking {} files from {}", files.len(), source.display());

        let result = UnpackResult::new();
        let scan = run_files(&files, options, cancel, &progress, |file| {
            let mut unpacker = Unpacker {
                dest,
                options,
                cancel,
                result: &result,
            };
            unpacker.file(file)
        })?;
        Ok(result.finish(scan))
    }
}

struct Unpacker<'a> {
    dest: &'a Path,
    options: &'a ScanOptions,
    cancel: &'a CancellationToken,
    result: &'a UnpackResult,
}

impl Unpacker<'_> {
    fn file(&mut self, file: &SourceFile) -> FileOutcome {
        let data = match fs::read(&file.path) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}", file.path.display());
                self.result.add_failed();
                return FileOutcome::Done;
            }
        };
        match self.blob(&data, &file.extension(), &without_extension(&file.relative), 0, false) {
            ControlFlow::Continue(()) => FileOutcome::Done,
            ControlFlow::Break(()) => FileOutcome::Cancelled,
        }
    }

    /// Unpack one blob to `target` (relative to the destination, without
    /// extension). `unwrapped` is set when the blob came out of a
    /// decompressor and has no file of its own yet.
    fn blob(
        &mut self,
        data: &[u8],
        extension: &str,
        target: &Path,
        depth: u32,
        unwrapped: bool,
    ) -> ControlFlow<()> {
        if self.cancel.is_cancelled() {
            return ControlFlow::Break(());
        }
        let format = identify(data, extension);

        match format.handler {
            FormatHandler::Compression(kind) if self.options.allows_depth(depth) => {
                match codec(kind).decompress(data) {
                    Ok(inner) => {
                        self.result.add_decompressed();
                        self.blob(&inner, "", target, depth + 1, true)
                    }
                    Err(e) => {
                        tracing::warn!("{}: {e}", target.display());
                        self.result.add_failed();
                        ControlFlow::Continue(())
                    }
                }
            }
            FormatHandler::U8Archive if self.options.allows_depth(depth) => {
                self.archive(data, target, depth)
            }
            _ if unwrapped => {
                let extension = if format.extension.is_empty() {
                    ".bin"
                } else {
                    format.extension.as_ref()
                };
                let path = self
                    .dest
                    .join(target)
                    .with_extension(extension.trim_start_matches('.'));
                if let Err(e) = self.write(&path, data) {
                    tracing::warn!("{}: {e}", path.display());
                    self.result.add_failed();
                }
                ControlFlow::Continue(())
            }
            _ => ControlFlow::Continue(()),
        }
    }

    fn archive(&mut self, data: &[u8], target: &Path, depth: u32) -> ControlFlow<()> {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let parent = self.dest.join(target.parent().unwrap_or(Path::new("")));
        let exported = u8_archive::read(data, &name).and_then(|root| {
            if !self.options.dry_run {
                root.export(&parent, self.options.overwrite)?;
            }
            Ok(root)
        });
        let root = match exported {
            Ok(root) => root,
            Err(e) => {
                tracing::warn!("{}: {e}", target.display());
                self.result.add_failed();
                return ControlFlow::Continue(());
            }
        };
        self.result.add_archive(root.file_count());
        tracing::info!("Unpacked {} ({} files)", target.display(), root.file_count());

        for (path, file) in root.files() {
            let member = target.join(without_extension(&sanitize_path(&path)));
            self.blob(file.data(), file.extension(), &member, depth + 1, false)?;
        }
        ControlFlow::Continue(())
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        if self.options.dry_run || path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::archive::{DirectoryNode, FileNode};
    use crate::compression::{Compression, Yaz0};

    fn archive(files: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut root = DirectoryNode::new("");
        for (path, data) in files {
            let (dir, name) = path.rsplit_once('/').unwrap_or(("", *path));
            root.add_path(dir, FileNode::new(name, data.clone())).unwrap();
        }
        u8_archive::write(&root).unwrap()
    }

    #[test]
    fn test_unpacks_nested_archives() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let inner = Yaz0.compress(&archive(&[("img/a.bin", vec![1, 2, 3])])).unwrap();
        let outer = archive(&[("inner.szs", inner), ("readme.txt", b"hi".to_vec())]);
        fs::create_dir(src.path().join("data")).unwrap();
        fs::write(src.path().join("data/stage.arc"), outer).unwrap();

        let result = Unpack::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.archives(), 2);
        assert_eq!(result.decompressed(), 1);
        assert_eq!(result.files_written(), 3);
        assert_eq!(result.failed(), 0);
        assert!(result.scan().is_completed);

        let stage = out.path().join("data/stage");
        assert_eq!(fs::read(stage.join("readme.txt")).unwrap(), b"hi");
        assert!(stage.join("inner.szs").exists());
        assert_eq!(fs::read(stage.join("inner/img/a.bin")).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_plain_compressed_file_is_decompressed() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let payload = vec![0x42u8; 100];
        fs::write(src.path().join("blob.szs"), Yaz0.compress(&payload).unwrap()).unwrap();

        let result = Unpack::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.decompressed(), 1);
        assert_eq!(fs::read(out.path().join("blob.bin")).unwrap(), payload);
    }

    #[test]
    fn test_occupied_destination_fails_without_overwrite() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(src.path().join("a.arc"), archive(&[("x.bin", vec![9])])).unwrap();
        fs::create_dir(out.path().join("a")).unwrap();
        fs::write(out.path().join("a/keep.txt"), "old").unwrap();

        let result = Unpack::run(src.path(), out.path(), &ScanOptions::new()).unwrap();
        assert_eq!(result.failed(), 1);
        assert!(!out.path().join("a/x.bin").exists());

        let result = Unpack::run(src.path(), out.path(), &ScanOptions::new().with_overwrite(true)).unwrap();
        assert_eq!(result.archives(), 1);
        assert!(out.path().join("a/x.bin").exists());
        assert!(!out.path().join("a/keep.txt").exists());
    }
}
