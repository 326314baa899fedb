//! CLI command for texture extraction

use std::time::Instant;

use super::ScanArgs;
use crate::cli::progress::{LOOKING_GLASS, PICTURE, print_done, print_step, scan_bar, update_bar};
use crate::scan::{CancellationToken, ScanOptions, TextureExtractor};

pub fn execute(args: &ScanArgs, options: &ScanOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 2, LOOKING_GLASS, &format!("Scanning {}", args.source.display()));
    if options.dry_run {
        println!("  (dry run, nothing is written)");
    }

    print_step(2, 2, PICTURE, "Extracting textures...");
    let pb = scan_bar(args.quiet);
    let result = TextureExtractor::run_with_progress(
        &args.source,
        &args.destination,
        options,
        &CancellationToken::new(),
        |progress| update_bar(&pb, progress),
    )?;
    pb.finish_and_clear();

    println!();
    print!("{result}");
    println!("  Duplicates: {}", result.duplicates());
    println!("  Skipped files: {}", result.skipped());
    print_done(start.elapsed());
    Ok(())
}
