//! Scan pipeline
//!
//! A scan discovers the files below a source path and hands each one to a
//! worker of a fixed-size rayon pool. Each file is processed to completion
//! by one worker; nested archive members are handled sequentially inside
//! that worker. Workers share nothing but the stage's aggregate.
//!
//! Stages built on the same driver:
//! - [`TextureExtractor`]: find and dump every texture as Dolphin-named PNG
//! - [`Finalize`]: deduplicate and shrink a directory of dumped PNGs
//! - [`Unpack`]: unwrap compression and export every archive to disk
//! - [`Compress`]: compress every file with one codec
//! - [`Cutter`]: split blobs into the files embedded in them
//! - [`CombineRgba`]: merge split palette dumps back into RGBA textures

mod combine;
mod compress;
mod cutter;
mod extractor;
mod finalize;
mod options;
mod progress;
mod results;
mod unpack;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use walkdir::WalkDir;

pub use combine::{ALTERNATIVES_DIR, CORRUPT_DIR, CombineRgba};
pub use compress::Compress;
pub use cutter::{Cutter, Segment};
pub use extractor::TextureExtractor;
pub use finalize::Finalize;
pub use options::ScanOptions;
pub use progress::{CancellationToken, ScanPhase, ScanProgress};
pub use results::{
    CombineResult, CompressResult, CutterResult, ExtractorResult, FinalizeResult, ScanResults,
    UnpackResult,
};
pub use unpack::Unpack;

use crate::error::{Error, Result};
use crate::utils::is_blacklisted;

/// Name of the directory raw texture containers are copied to.
pub const RAW_DIR: &str = "~Raw";

/// A file taken from the source tree.
#[derive(Debug, Clone)]
pub(crate) struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative: PathBuf,
    pub size: u64,
}

impl SourceFile {
    /// Extension of the file including the dot, or empty.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }
}

/// Collect the files of `source`, sorted by path.
///
/// A file source yields just that file, relative to its parent directory.
/// Directories are walked recursively following symlinks; blacklisted
/// names are left out.
pub(crate) fn discover(source: &Path) -> Result<Vec<SourceFile>> {
    if !source.exists() {
        return Err(Error::SourceNotFound {
            path: source.to_path_buf(),
        });
    }

    if source.is_file() {
        let relative = source
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| source.to_path_buf());
        return Ok(vec![SourceFile {
            path: source.to_path_buf(),
            relative,
            size: source.metadata()?.len(),
        }]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || is_blacklisted(entry.path()) {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or(entry.path())
            .to_path_buf();
        files.push(SourceFile {
            path: entry.path().to_path_buf(),
            relative,
            size: entry.metadata()?.len(),
        });
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Whether a worker finished its file or gave up because of cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileOutcome {
    Done,
    Cancelled,
}

/// Run `work` for every file on a pool of `options.thread_count()` workers.
///
/// The token is checked before each file is started. Returns the timing and
/// file counters of the scan; the stage-specific counters live in whatever
/// `work` updates.
pub(crate) fn run_files<W, P>(
    files: &[SourceFile],
    options: &ScanOptions,
    cancel: &CancellationToken,
    progress: &P,
    work: W,
) -> Result<ScanResults>
where
    W: Fn(&SourceFile) -> FileOutcome + Send + Sync,
    P: Fn(&ScanProgress) + Send + Sync,
{
    let start = Instant::now();
    let total = files.len();
    let work_length: u64 = files.iter().map(|f| f.size).sum();
    progress(&ScanProgress::new(ScanPhase::Discovering, 0, total).with_bytes(0, work_length));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.thread_count())
        .build()
        .map_err(|e| Error::ThreadPool(e.to_string()))?;

    let started = AtomicUsize::new(0);
    let completed = AtomicUsize::new(0);
    let progress_length = AtomicU64::new(0);

    pool.install(|| {
        files.par_iter().for_each(|file| {
            if cancel.is_cancelled() {
                return;
            }
            let current = started.fetch_add(1, Ordering::SeqCst) + 1;
            progress(
                &ScanProgress::new(ScanPhase::Processing, current, total)
                    .with_bytes(progress_length.load(Ordering::SeqCst), work_length)
                    .with_file(file.relative.to_string_lossy()),
            );

            if work(file) == FileOutcome::Done {
                completed.fetch_add(1, Ordering::SeqCst);
                progress_length.fetch_add(file.size, Ordering::SeqCst);
            }
        });
    });

    let files_completed = completed.load(Ordering::SeqCst);
    let progress_length = progress_length.load(Ordering::SeqCst);
    progress(
        &ScanProgress::new(ScanPhase::Complete, files_completed, total)
            .with_bytes(progress_length, work_length),
    );

    Ok(ScanResults {
        total_time: start.elapsed(),
        is_completed: files_completed == total && !cancel.is_cancelled(),
        work_length,
        progress_length,
        files_enqueued: total,
        files_completed,
    })
}

/// `path` with the extension of its last component removed.
pub(crate) fn without_extension(path: &Path) -> PathBuf {
    match path.file_stem() {
        Some(stem) => path.with_file_name(stem),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_discover_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.bin"), [1, 2]).unwrap();
        fs::write(dir.path().join("sub/a.bin"), [1]).unwrap();
        fs::write(dir.path().join("Thumbs.db"), [0]).unwrap();

        let files = discover(dir.path()).unwrap();
        let relative: Vec<_> = files.iter().map(|f| f.relative.clone()).collect();
        assert_eq!(relative, vec![PathBuf::from("b.bin"), PathBuf::from("sub/a.bin")]);
        assert_eq!(files[0].size, 2);
        assert_eq!(files[0].extension(), ".bin");
    }

    #[test]
    fn test_discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.tpl");
        fs::write(&path, [0; 8]).unwrap();
        let files = discover(&path).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative, PathBuf::from("tex.tpl"));
    }

    #[test]
    fn test_discover_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::SourceNotFound { .. }));
    }

    #[test]
    fn test_run_files_counts_and_cancels() {
        let files: Vec<SourceFile> = (0..20)
            .map(|i| SourceFile {
                path: PathBuf::from(format!("{i}.bin")),
                relative: PathBuf::from(format!("{i}.bin")),
                size: 10,
            })
            .collect();
        let options = ScanOptions::new().with_threads(4);

        let cancel = CancellationToken::new();
        let scan = run_files(&files, &options, &cancel, &|_: &ScanProgress| {}, |_| FileOutcome::Done).unwrap();
        assert!(scan.is_completed);
        assert_eq!(scan.files_completed, 20);
        assert_eq!(scan.progress_length, 200);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let scan = run_files(&files, &options, &cancel, &|_: &ScanProgress| {}, |_| FileOutcome::Done).unwrap();
        assert!(!scan.is_completed);
        assert_eq!(scan.files_completed, 0);
        assert_eq!(scan.work_length, 200);
    }

    #[test]
    fn test_without_extension() {
        assert_eq!(without_extension(Path::new("a/b.tpl")), PathBuf::from("a/b"));
        assert_eq!(without_extension(Path::new("a/b")), PathBuf::from("a/b"));
    }
}
