//! CLI command for cutting blobs into embedded files

use std::time::Instant;

use anyhow::Context;

use super::ScanArgs;
use crate::cli::progress::{LOOKING_GLASS, print_done, print_step, scan_bar, update_bar};
use crate::scan::{CancellationToken, Cutter, ScanOptions};

pub fn execute(args: &ScanArgs, patterns: &[String], options: &ScanOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    print_step(1, 1, LOOKING_GLASS, &format!("Cutting {}", args.source.display()));

    let patterns = patterns
        .iter()
        .map(|p| parse_pattern(p))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let patterns = (!patterns.is_empty()).then_some(patterns.as_slice());

    let pb = scan_bar(args.quiet);
    let result = Cutter::run_with_progress(
        &args.source,
        &args.destination,
        patterns,
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

/// `0x`-prefixed hex, or the text itself.
fn parse_pattern(pattern: &str) -> anyhow::Result<Vec<u8>> {
    let Some(hex) = pattern.strip_prefix("0x") else {
        return Ok(pattern.as_bytes().to_vec());
    };
    anyhow::ensure!(
        !hex.is_empty() && hex.len() % 2 == 0 && hex.is_ascii(),
        "Invalid hex pattern: {pattern}"
    );
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16).with_context(|| format!("Invalid hex pattern: {pattern}"))
        })
        .collect()
}
