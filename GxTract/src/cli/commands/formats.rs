//! CLI command listing the format registry

use console::style;

use crate::format::registry;

pub fn execute(readable_only: bool) {
    for format in registry() {
        if readable_only && !format.can_read() {
            continue;
        }
        let name = if format.can_read() {
            style(format.name()).green().bold()
        } else {
            style(format.name())
        };
        println!(
            "{:<12} {:<8} {:<10} {} {}",
            name,
            format.extension,
            format.typ.to_string(),
            format.developer,
            format.description
        );
    }
}
