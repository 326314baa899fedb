//! CLI commands for compression

use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::cli::progress::{DISK, print_done, print_step, scan_bar, update_bar};
use crate::compression::{CompressionLevel, codec_by_name, try_decompress};
use crate::scan::{CancellationToken, Compress, ScanOptions};
use crate::utils::format_size;

/// Compress one file, or every file of a directory into a mirrored tree.
pub fn compress(
    source: &Path,
    destination: &Path,
    codec: &str,
    level: CompressionLevel,
    options: &ScanOptions,
) -> anyhow::Result<()> {
    let codec = codec_by_name(codec).with_context(|| format!("Unknown codec: {codec}"))?;
    if source.is_dir() {
        let start = Instant::now();
        print_step(1, 1, DISK, &format!("Compressing {} with {}", source.display(), codec.name()));
        let pb = scan_bar(false);
        let result = Compress::run_with_progress(
            source,
            destination,
            codec,
            level,
            options,
            &CancellationToken::new(),
            |progress| update_bar(&pb, progress),
        )?;
        pb.finish_and_clear();

        println!();
        print!("{result}");
        print_done(start.elapsed());
        return Ok(());
    }

    let data = std::fs::read(source)?;
    let packed = codec.compress_with_level(&data, level)?;
    std::fs::write(destination, &packed)?;

    println!(
        "Compressed with {}: {} -> {}",
        codec.name(),
        format_size(data.len() as u64),
        format_size(packed.len() as u64)
    );
    Ok(())
}

pub fn decompress(source: &Path, destination: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(source)?;
    let (unpacked, name) = try_decompress(&data)
        .with_context(|| format!("Failed to decompress {}", source.display()))?;
    std::fs::write(destination, &unpacked)?;

    println!(
        "Decompressed {name}: {} -> {}",
        format_size(data.len() as u64),
        format_size(unpacked.len() as u64)
    );
    Ok(())
}
