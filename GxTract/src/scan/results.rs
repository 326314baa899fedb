//! Scan aggregates
//!
//! Workers update the aggregates concurrently. Each aggregate keeps its
//! counters and its texture hash set behind two separate mutexes so the
//! dedup check does not contend with size bookkeeping. Once a scan
//! returns, the aggregate is only read.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::format::FormatInfo;
use crate::texture::DolphinTextureHashInfo;
use crate::utils::format_size;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn into_inner<T>(mutex: Mutex<T>) -> T {
    mutex.into_inner().unwrap_or_else(PoisonError::into_inner)
}

/// Summary common to every scan stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResults {
    pub total_time: Duration,
    /// False when the scan was cancelled.
    pub is_completed: bool,
    /// Bytes of all discovered source files.
    pub work_length: u64,
    /// Bytes of source files finished.
    pub progress_length: u64,
    /// Source files discovered.
    pub files_enqueued: usize,
    /// Source files finished.
    pub files_completed: usize,
}

impl fmt::Display for ScanResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan time: {:.3}s", self.total_time.as_secs_f64())
    }
}

/// Per-leaf outcome counters. Workers fill one per source file and commit
/// it to the [`ExtractorResult`] when the file is done.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExtractorTally {
    pub extracted_files: usize,
    pub extracted_textures: usize,
    pub duplicates: usize,
    pub unsupported: usize,
    pub unknown: usize,
    pub skipped: usize,
    pub extracted_size: u64,
    pub unsupported_size: u64,
    pub skipped_size: u64,
    /// Leaves reached, counted independently of their outcome.
    pub leaves: usize,
    pub leaf_bytes: u64,
    pub unsupported_formats: Vec<FormatInfo>,
    pub unknown_formats: Vec<FormatInfo>,
}

impl ExtractorTally {
    pub fn add_leaf(&mut self, size: u64) {
        self.leaves += 1;
        self.leaf_bytes += size;
    }

    pub fn add_unsupported(&mut self, format: &FormatInfo, size: u64) {
        self.unsupported += 1;
        self.unsupported_size += size;
        if !self.unsupported_formats.contains(format) {
            self.unsupported_formats.push(format.clone());
        }
    }

    pub fn add_unknown(&mut self, format: &FormatInfo, size: u64) {
        self.unknown += 1;
        self.skipped_size += size;
        if !self.unknown_formats.contains(format) {
            self.unknown_formats.push(format.clone());
        }
    }

    pub fn add_skipped(&mut self, size: u64) {
        self.skipped += 1;
        self.skipped_size += size;
    }

    pub fn add_extracted(&mut self, size: u64) {
        self.extracted_files += 1;
        self.extracted_size += size;
    }

    fn merge(&mut self, other: Self) {
        self.extracted_files += other.extracted_files;
        self.extracted_textures += other.extracted_textures;
        self.duplicates += other.duplicates;
        self.unsupported += other.unsupported;
        self.unknown += other.unknown;
        self.skipped += other.skipped;
        self.extracted_size += other.extracted_size;
        self.unsupported_size += other.unsupported_size;
        self.skipped_size += other.skipped_size;
        self.leaves += other.leaves;
        self.leaf_bytes += other.leaf_bytes;
        for format in other.unsupported_formats {
            if !self.unsupported_formats.contains(&format) {
                self.unsupported_formats.push(format);
            }
        }
        for format in other.unknown_formats {
            if !self.unknown_formats.contains(&format) {
                self.unknown_formats.push(format);
            }
        }
    }
}

/// Aggregate of a texture extraction scan.
///
/// Every leaf blob (a file that is neither compressed nor an archive after
/// unwrapping) ends in exactly one of four outcomes, so
/// `extracted_files + unsupported + unknown + skipped == files_processed`
/// and `extracted_size + skipped_size + unsupported_size == bytes_processed`.
#[derive(Debug, Default)]
pub struct ExtractorResult {
    scan: ScanResults,
    counts: Mutex<ExtractorTally>,
    hashes: Mutex<HashSet<DolphinTextureHashInfo>>,
}

impl ExtractorResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a texture; true if no texture with the same key was seen.
    ///
    /// The check and insert happen under one lock, so among concurrent
    /// callers with the same key exactly one gets `true`.
    pub fn add_hash_if_needed(&self, key: DolphinTextureHashInfo) -> bool {
        lock(&self.hashes).insert(key)
    }

    /// Forget keys recorded by a file that did not finish.
    pub(crate) fn release_hashes(&self, keys: &[DolphinTextureHashInfo]) {
        let mut hashes = lock(&self.hashes);
        for key in keys {
            hashes.remove(key);
        }
    }

    pub(crate) fn commit(&self, tally: ExtractorTally) {
        lock(&self.counts).merge(tally);
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    fn read<R>(&self, f: impl FnOnce(&ExtractorTally) -> R) -> R {
        f(&lock(&self.counts))
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.scan.is_completed
    }

    /// Unique textures written (or that would be, in a dry run).
    #[must_use]
    pub fn extracted_textures(&self) -> usize {
        self.read(|c| c.extracted_textures)
    }

    /// Leaf files that yielded at least one new texture.
    #[must_use]
    pub fn extracted_files(&self) -> usize {
        self.read(|c| c.extracted_files)
    }

    /// Textures dropped because an identical one was already extracted.
    #[must_use]
    pub fn duplicates(&self) -> usize {
        self.read(|c| c.duplicates)
    }

    #[must_use]
    pub fn unsupported(&self) -> usize {
        self.read(|c| c.unsupported)
    }

    #[must_use]
    pub fn unknown(&self) -> usize {
        self.read(|c| c.unknown)
    }

    /// Leaf files whose textures were all duplicates, or that were not
    /// opened because of the depth limit.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.read(|c| c.skipped)
    }

    #[must_use]
    pub fn extracted_size(&self) -> u64 {
        self.read(|c| c.extracted_size)
    }

    #[must_use]
    pub fn unsupported_size(&self) -> u64 {
        self.read(|c| c.unsupported_size)
    }

    /// Bytes of skipped and unknown leaves.
    #[must_use]
    pub fn skipped_size(&self) -> u64 {
        self.read(|c| c.skipped_size)
    }

    /// Leaf blobs reached by finished files.
    #[must_use]
    pub fn files_processed(&self) -> usize {
        self.read(|c| c.leaves)
    }

    /// Unwrapped bytes of all leaves reached by finished files.
    #[must_use]
    pub fn bytes_processed(&self) -> u64 {
        self.read(|c| c.leaf_bytes)
    }

    #[must_use]
    pub fn unsupported_formats(&self) -> Vec<FormatInfo> {
        self.read(|c| c.unsupported_formats.clone())
    }

    #[must_use]
    pub fn unknown_formats(&self) -> Vec<FormatInfo> {
        self.read(|c| c.unknown_formats.clone())
    }

    /// Distinct texture keys recorded by finished files.
    #[must_use]
    pub fn unique_hashes(&self) -> usize {
        lock(&self.hashes).len()
    }

    /// Share of processed bytes that were extracted, in percent.
    #[must_use]
    pub fn min_extraction_rate(&self) -> u32 {
        let (extracted, skipped, unsupported) =
            self.read(|c| (c.extracted_size, c.skipped_size, c.unsupported_size));
        rate(extracted, skipped, unsupported)
    }

    /// Like [`min_extraction_rate`](Self::min_extraction_rate), but for
    /// large scans the skipped bytes are weighted down by the number of
    /// textures found per 150.
    #[must_use]
    pub fn max_extraction_rate(&self) -> u32 {
        let (textures, extracted, skipped, unsupported) = self.read(|c| {
            (c.extracted_textures, c.extracted_size, c.skipped_size, c.unsupported_size)
        });
        if textures > 150 {
            rate(extracted, skipped / (textures as u64 / 150), unsupported)
        } else {
            rate(extracted, skipped, unsupported)
        }
    }

    /// `"~ N%"`, or `"~ A% - B%"` when the two rates are far apart.
    #[must_use]
    pub fn extraction_rate_display(&self) -> String {
        let min = self.min_extraction_rate();
        let max = self.max_extraction_rate();
        if min + min / 10 >= max {
            format!("~ {}%", (min + max) / 2)
        } else {
            format!("~ {min}% - {max}%")
        }
    }
}

fn rate(extracted: u64, skipped: u64, unsupported: u64) -> u32 {
    let total = extracted + skipped + unsupported;
    if total == 0 {
        return 0;
    }
    (100.0 * extracted as f64 / total as f64).round() as u32
}

impl fmt::Display for ExtractorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Extracted textures: {}", self.extracted_textures())?;
        writeln!(f, "Unsupported files: {}", self.unsupported())?;
        let unsupported = self.unsupported_formats();
        if !unsupported.is_empty() {
            let names: Vec<String> = unsupported.iter().map(FormatInfo::full_description).collect();
            writeln!(f, "Unsupported file types: {}", names.join(", "))?;
        }
        writeln!(f, "Unknown files: {}", self.unknown())?;
        let unknown = self.unknown_formats();
        if !unknown.is_empty() {
            let names: Vec<String> = unknown.iter().map(FormatInfo::type_name).collect();
            writeln!(f, "Unknown file types: {}", names.join(", "))?;
        }
        writeln!(f, "Extraction rate: {}", self.extraction_rate_display())?;
        write!(f, "{}", self.scan)
    }
}

#[derive(Debug, Default)]
struct FinalizeCounts {
    optimizations: usize,
    duplicates: usize,
    copied: usize,
    old_size: u64,
    new_size: u64,
}

/// Aggregate of a finalize scan.
#[derive(Debug, Default)]
pub struct FinalizeResult {
    scan: ScanResults,
    counts: Mutex<FinalizeCounts>,
    hashes: Mutex<HashSet<DolphinTextureHashInfo>>,
}

impl FinalizeResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_optimization(&self) {
        lock(&self.counts).optimizations += 1;
    }

    pub fn add_size(&self, old: u64, new: u64) {
        let mut counts = lock(&self.counts);
        counts.old_size += old;
        counts.new_size += new;
    }

    pub(crate) fn add_copied(&self) {
        lock(&self.counts).copied += 1;
    }

    /// Record a texture; true if it was not seen before. Duplicates are
    /// counted.
    pub fn add_hash_if_needed(&self, key: DolphinTextureHashInfo) -> bool {
        let new = lock(&self.hashes).insert(key);
        if !new {
            lock(&self.counts).duplicates += 1;
        }
        new
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    #[must_use]
    pub fn optimizations(&self) -> usize {
        lock(&self.counts).optimizations
    }

    #[must_use]
    pub fn duplicates(&self) -> usize {
        lock(&self.counts).duplicates
    }

    /// Files that were not Dolphin textures and were copied unchanged.
    #[must_use]
    pub fn copied(&self) -> usize {
        lock(&self.counts).copied
    }

    #[must_use]
    pub fn old_size(&self) -> u64 {
        lock(&self.counts).old_size
    }

    #[must_use]
    pub fn new_size(&self) -> u64 {
        lock(&self.counts).new_size
    }

    /// Distinct textures seen.
    #[must_use]
    pub fn textures(&self) -> usize {
        lock(&self.hashes).len()
    }

    /// Size change of the optimized files in percent (negative is smaller).
    #[must_use]
    pub fn optimization_rate(&self) -> f64 {
        let counts = lock(&self.counts);
        if counts.old_size == 0 {
            return 0.0;
        }
        counts.new_size as f64 / counts.old_size as f64 * 100.0 - 100.0
    }
}

impl fmt::Display for FinalizeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Textures processed: {}", self.textures())?;
        if self.optimizations() > 0 {
            writeln!(f, "Optimizations: {}", self.optimizations())?;
            writeln!(
                f,
                "File size from {} to {}",
                format_size(self.old_size()),
                format_size(self.new_size())
            )?;
            writeln!(f, "File size ratio: {:+.2}%", self.optimization_rate())?;
        }
        if self.duplicates() > 0 {
            writeln!(f, "Duplicates: {}", self.duplicates())?;
        }
        write!(f, "{}", self.scan)
    }
}

#[derive(Debug, Default)]
struct UnpackCounts {
    archives: usize,
    decompressed: usize,
    files_written: usize,
    failed: usize,
}

/// Aggregate of an unpack scan.
#[derive(Debug, Default)]
pub struct UnpackResult {
    scan: ScanResults,
    counts: Mutex<UnpackCounts>,
}

impl UnpackResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_archive(&self, files: usize) {
        let mut counts = lock(&self.counts);
        counts.archives += 1;
        counts.files_written += files;
    }

    pub(crate) fn add_decompressed(&self) {
        lock(&self.counts).decompressed += 1;
    }

    pub(crate) fn add_failed(&self) {
        lock(&self.counts).failed += 1;
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    #[must_use]
    pub fn archives(&self) -> usize {
        lock(&self.counts).archives
    }

    #[must_use]
    pub fn decompressed(&self) -> usize {
        lock(&self.counts).decompressed
    }

    #[must_use]
    pub fn files_written(&self) -> usize {
        lock(&self.counts).files_written
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        lock(&self.counts).failed
    }
}

impl fmt::Display for UnpackResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Archives unpacked: {}", self.archives())?;
        writeln!(f, "Files decompressed: {}", self.decompressed())?;
        writeln!(f, "Files written: {}", self.files_written())?;
        if self.failed() > 0 {
            writeln!(f, "Failed: {}", self.failed())?;
        }
        write!(f, "{}", self.scan)
    }
}

#[derive(Debug, Default)]
struct CompressCounts {
    compressed: usize,
    failed: usize,
    old_size: u64,
    new_size: u64,
}

/// Aggregate of a compress scan.
#[derive(Debug, Default)]
pub struct CompressResult {
    scan: ScanResults,
    counts: Mutex<CompressCounts>,
}

impl CompressResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_compressed(&self, old: u64, new: u64) {
        let mut counts = lock(&self.counts);
        counts.compressed += 1;
        counts.old_size += old;
        counts.new_size += new;
    }

    pub(crate) fn add_failed(&self) {
        lock(&self.counts).failed += 1;
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    #[must_use]
    pub fn compressed(&self) -> usize {
        lock(&self.counts).compressed
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        lock(&self.counts).failed
    }

    #[must_use]
    pub fn old_size(&self) -> u64 {
        lock(&self.counts).old_size
    }

    #[must_use]
    pub fn new_size(&self) -> u64 {
        lock(&self.counts).new_size
    }

    /// Size change in percent over all compressed files (negative is smaller).
    #[must_use]
    pub fn compression_rate(&self) -> f64 {
        let counts = lock(&self.counts);
        if counts.old_size == 0 {
            return 0.0;
        }
        counts.new_size as f64 / counts.old_size as f64 * 100.0 - 100.0
    }
}

impl fmt::Display for CompressResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files compressed: {}", self.compressed())?;
        writeln!(
            f,
            "File size from {} to {}",
            format_size(self.old_size()),
            format_size(self.new_size())
        )?;
        writeln!(f, "Compression rate: {:+.2}%", self.compression_rate())?;
        if self.failed() > 0 {
            writeln!(f, "Failed: {}", self.failed())?;
        }
        write!(f, "{}", self.scan)
    }
}

#[derive(Debug, Default)]
struct CutterCounts {
    files_cut: usize,
    segments: usize,
    empty: usize,
    failed: usize,
}

/// Aggregate of a cutter scan.
#[derive(Debug, Default)]
pub struct CutterResult {
    scan: ScanResults,
    counts: Mutex<CutterCounts>,
}

impl CutterResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_cut(&self, segments: usize) {
        let mut counts = lock(&self.counts);
        counts.files_cut += 1;
        counts.segments += segments;
    }

    pub(crate) fn add_empty(&self) {
        lock(&self.counts).empty += 1;
    }

    pub(crate) fn add_failed(&self) {
        lock(&self.counts).failed += 1;
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    /// Source files at least one segment was cut from.
    #[must_use]
    pub fn files_cut(&self) -> usize {
        lock(&self.counts).files_cut
    }

    #[must_use]
    pub fn segments(&self) -> usize {
        lock(&self.counts).segments
    }

    /// Source files without any known signature.
    #[must_use]
    pub fn empty(&self) -> usize {
        lock(&self.counts).empty
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        lock(&self.counts).failed
    }
}

impl fmt::Display for CutterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files cut: {}", self.files_cut())?;
        writeln!(f, "Segments written: {}", self.segments())?;
        writeln!(f, "Files without signatures: {}", self.empty())?;
        if self.failed() > 0 {
            writeln!(f, "Failed: {}", self.failed())?;
        }
        write!(f, "{}", self.scan)
    }
}

#[derive(Debug, Default)]
struct CombineCounts {
    combined: usize,
    alternatives: usize,
    corrupt: usize,
}

/// Aggregate of a combine-RGBA scan.
#[derive(Debug, Default)]
pub struct CombineResult {
    scan: ScanResults,
    counts: Mutex<CombineCounts>,
    hashes: Mutex<HashSet<DolphinTextureHashInfo>>,
}

impl CombineResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a texture; true if it was not seen before.
    pub fn add_hash_if_needed(&self, key: DolphinTextureHashInfo) -> bool {
        lock(&self.hashes).insert(key)
    }

    pub(crate) fn add_combined(&self, alternative: bool) {
        let mut counts = lock(&self.counts);
        if alternative {
            counts.alternatives += 1;
        } else {
            counts.combined += 1;
        }
    }

    pub(crate) fn add_corrupt(&self) {
        lock(&self.counts).corrupt += 1;
    }

    pub(crate) fn finish(mut self, scan: ScanResults) -> Self {
        self.scan = scan;
        self
    }

    #[must_use]
    pub fn scan(&self) -> &ScanResults {
        &self.scan
    }

    /// Combined textures written as the preferred channel order.
    #[must_use]
    pub fn combined(&self) -> usize {
        lock(&self.counts).combined
    }

    /// Combined textures written to the alternatives directory.
    #[must_use]
    pub fn alternatives(&self) -> usize {
        lock(&self.counts).alternatives
    }

    /// Images that could not be decoded.
    #[must_use]
    pub fn corrupt(&self) -> usize {
        lock(&self.counts).corrupt
    }
}

impl fmt::Display for CombineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Combined textures: {}", self.combined())?;
        writeln!(f, "Alternatives: {}", self.alternatives())?;
        if self.corrupt() > 0 {
            writeln!(f, "Corrupt images: {}", self.corrupt())?;
        }
        write!(f, "{}", self.scan)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::texture::{GxImageFormat, TextureHash};

    fn key(hash: u64) -> DolphinTextureHashInfo {
        DolphinTextureHashInfo::new(8, 8, TextureHash::new(hash, 0), GxImageFormat::I8)
    }

    #[test]
    fn test_dedup_is_exact_under_contention() {
        let result = Arc::new(ExtractorResult::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let result = Arc::clone(&result);
                thread::spawn(move || (0..100).filter(|&i| result.add_hash_if_needed(key(i))).count())
            })
            .collect();
        let wins: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(wins, 100);
        assert_eq!(result.unique_hashes(), 100);
    }

    #[test]
    fn test_release_hashes_only_drops_given_keys() {
        let result = ExtractorResult::new();
        assert!(result.add_hash_if_needed(key(1)));
        assert!(result.add_hash_if_needed(key(2)));
        result.release_hashes(&[key(2), key(3)]);
        assert_eq!(result.unique_hashes(), 1);
        assert!(result.add_hash_if_needed(key(2)));
        assert!(!result.add_hash_if_needed(key(1)));
    }

    #[test]
    fn test_tally_conservation() {
        let result = ExtractorResult::new();
        let unknown = FormatInfo::unknown(".bin", &[0; 4]);
        let mut tally = ExtractorTally::default();
        for size in [100, 40, 30, 5] {
            tally.add_leaf(size);
        }
        tally.add_extracted(100);
        tally.extracted_textures += 2;
        tally.add_skipped(40);
        tally.add_unknown(&unknown, 30);
        tally.add_unknown(&unknown, 5);
        result.commit(tally.clone());
        result.commit(tally);

        assert_eq!(result.files_processed(), 8);
        assert_eq!(result.bytes_processed(), 350);
        assert_eq!(
            result.extracted_size() + result.skipped_size() + result.unsupported_size(),
            result.bytes_processed()
        );
        assert_eq!(result.unknown_formats().len(), 1);
    }

    #[test]
    fn test_compression_rate() {
        let result = CompressResult::new();
        assert!(result.compression_rate().abs() < f64::EPSILON);
        result.add_compressed(200, 50);
        result.add_compressed(200, 150);
        assert_eq!(result.compressed(), 2);
        assert!((result.compression_rate() + 50.0).abs() < 1e-9);
        assert!(result.to_string().contains("Compression rate: -50.00%"));
    }

    #[test]
    fn test_extraction_rates() {
        let result = ExtractorResult::new();
        assert_eq!(result.min_extraction_rate(), 0);

        let mut tally = ExtractorTally::default();
        tally.add_extracted(600);
        tally.extracted_textures = 300;
        tally.add_skipped(400);
        result.commit(tally);
        assert_eq!(result.min_extraction_rate(), 60);
        // 400 / (300 / 150) = 200 skipped weight
        assert_eq!(result.max_extraction_rate(), 75);
        assert_eq!(result.extraction_rate_display(), "~ 60% - 75%");
    }

    #[test]
    fn test_small_scan_rate_is_single_value() {
        let result = ExtractorResult::new();
        let mut tally = ExtractorTally::default();
        tally.add_extracted(90);
        tally.extracted_textures = 3;
        tally.add_skipped(10);
        result.commit(tally);
        assert_eq!(result.extraction_rate_display(), "~ 90%");
        let summary = result.to_string();
        assert!(summary.contains("Extracted textures: 3"));
        assert!(summary.contains("Extraction rate: ~ 90%"));
    }

    #[test]
    fn test_finalize_counts() {
        let result = FinalizeResult::new();
        assert!(result.add_hash_if_needed(key(1)));
        assert!(!result.add_hash_if_needed(key(1)));
        result.add_optimization();
        result.add_size(200, 150);
        assert_eq!(result.duplicates(), 1);
        assert_eq!(result.textures(), 1);
        assert!((result.optimization_rate() + 25.0).abs() < 1e-9);
        assert!(result.to_string().contains("File size ratio: -25.00%"));
    }
}
