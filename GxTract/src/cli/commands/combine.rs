//! CLI command for combining split palette dumps

use std::time::Instant;

use super::ScanArgs;
use crate::cli::progress::{PICTURE, print_done, print_step, scan_bar, update_bar};
use crate::scan::{CancellationToken, CombineRgba, ScanOptions};

pub fn execute(args: &ScanArgs, options: &ScanOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 1, PICTURE, &format!("Combining {}", args.source.display()));

    let pb = scan_bar(args.quiet);
    let result = CombineRgba::run_with_progress(
        &args.source,
        &args.destination,
        options,
        &CancellationToken::new(),
        |progress| update_bar(&pb, progress),
    )?;
    pb.finish_and_clear();

    println!();
    print!("{result}");
    print_done(start.elapsed());
    Ok(())
}
