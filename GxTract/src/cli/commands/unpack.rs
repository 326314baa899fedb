//! CLI command for unpacking archives

use std::time::Instant;

use super::ScanArgs;
use crate::cli::progress::{PACKAGE, print_done, print_step, scan_bar, update_bar};
use crate::scan::{CancellationToken, ScanOptions, Unpack};

pub fn execute(args: &ScanArgs, options: &ScanOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 1, PACKAGE, &format!("Unpacking {}", args.source.display()));

    let pb = scan_bar(args.quiet);
    let result = Unpack::run_with_progress(
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
