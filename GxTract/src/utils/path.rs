//! Path utilities

use std::path::{Component, Path, PathBuf};

/// File names that are never written to an output directory.
pub const BLACKLISTED_NAMES: &[&str] = &["desktop.ini", "Thumbs.db", ".DS_Store"];

/// Turn an archive-internal path into a relative filesystem path.
///
/// Leading separators, `.` and `..` components are dropped so that archive
/// contents can never escape the destination directory.
pub fn sanitize_path(path: &str) -> PathBuf {
    Path::new(&path.replace('\\', "/"))
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// Whether a file with this name must not be written.
pub fn is_blacklisted(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| {
            BLACKLISTED_NAMES
                .iter()
                .any(|b| b.eq_ignore_ascii_case(name))
        })
}

/// Render a byte count with a binary suffix (`"1.50 MiB"`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
