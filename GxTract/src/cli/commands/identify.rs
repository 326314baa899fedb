//! CLI command for format identification

use std::fs::File;
use std::path::PathBuf;

use console::style;

use crate::format::identify_reader;
use crate::utils::format_size;

pub fn execute(files: &[PathBuf], json: bool) -> anyhow::Result<()> {
    for path in files {
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut file = File::open(path)?;
        let size = file.metadata()?.len();
        let format = identify_reader(&mut file, &extension)?;

        if json {
            let value = serde_json::json!({
                "path": path.to_string_lossy(),
                "size": size,
                "type": format.typ,
                "name": format.name(),
                "extension": format.extension,
                "description": format.description,
                "developer": format.developer,
                "readable": format.can_read(),
                "writable": format.can_write(),
            });
            println!("{value}");
            continue;
        }

        let support = if format.can_read() {
            style("readable").green()
        } else {
            style("not readable").dim()
        };
        println!(
            "{}: {} [{}] {} ({})",
            path.display(),
            format.full_description().trim(),
            format.typ,
            support,
            format_size(size)
        );
    }
    Ok(())
}
