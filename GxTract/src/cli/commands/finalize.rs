//! CLI command for finalizing a texture dump

use std::time::Instant;

use super::ScanArgs;
use crate::cli::progress::{GEAR, print_done, print_step, scan_bar, update_bar};
use crate::scan::{CancellationToken, Finalize, ScanOptions};

pub fn execute(args: &ScanArgs, options: &ScanOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 1, GEAR, &format!("Finalizing {}", args.source.display()));

    let pb = scan_bar(args.quiet);
    let result = Finalize::run_with_progress(
        &args.source,
        &args.destination,
        options,
        &CancellationToken::new(),
        |progress| update_bar(&pb, progress),
    )?;
    pb.finish_and_clear();

    println!();
    print!("{result}");
    println!("  Copied unchanged: {}", result.copied());
    print_done(start.elapsed());
    Ok(())
}
