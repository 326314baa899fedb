//! Container trees
//!
//! Archives are loaded into a [`DirectoryNode`] tree, walked by the scanner
//! and optionally exported back to disk. The U8 loader is the concrete
//! archive format; other loaders produce the same tree.

pub mod export;
pub mod node;
pub mod u8_archive;

pub use node::{
    DirectoryNode, FileNode, Files, FixedClock, Node, SystemClock, TimestampProvider, Timestamps,
    wildcard_match,
};
