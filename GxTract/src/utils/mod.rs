//! Utility functions

pub mod binary;
pub mod path;

pub use binary::{read_at, slice_at};
pub use path::{format_size, is_blacklisted, sanitize_path};
