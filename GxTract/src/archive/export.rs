//! Writing container trees to disk

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::node::{DirectoryNode, FileNode, Node};
use crate::error::{Error, Result};
use crate::utils::path::is_blacklisted;

impl DirectoryNode {
    /// Materialize this directory as `dest/<name>` (or `dest` itself for an
    /// unnamed root) together with its whole subtree.
    ///
    /// Without `overwrite`, an existing target is left untouched and
    /// [`Error::DestinationOccupied`] is returned. With `overwrite`, the new
    /// tree is first written to a temporary sibling directory and only swapped
    /// in once it is complete, so a failed export keeps the old content.
    ///
    /// Returns the path of the exported directory.
    ///
    /// # Errors
    /// Returns [`Error::DestinationOccupied`] or [`Error::Io`].
    pub fn export(&self, dest: &Path, overwrite: bool) -> Result<PathBuf> {
        let target = if self.name().is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(self.name())
        };

        if !target.exists() {
            fs::create_dir_all(&target)?;
            self.write_children(&target)?;
            return Ok(target);
        }

        if !overwrite {
            return Err(Error::DestinationOccupied { path: target });
        }

        let parent = target.parent().unwrap_or(dest);
        let staging = tempfile::Builder::new()
            .prefix(".gxtract-export-")
            .tempdir_in(parent)?;
        self.write_children(staging.path())?;

        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        } else {
            fs::remove_file(&target)?;
        }
        fs::rename(staging.path(), &target)?;
        tracing::debug!("Replaced {}", target.display());
        Ok(target)
    }

    fn write_children(&self, dir: &Path) -> Result<()> {
        for child in self.children() {
            let path = dir.join(child.name());
            match child {
                Node::File(file) => {
                    if is_blacklisted(&path) {
                        continue;
                    }
                    file.write_to(&path)?;
                }
                Node::Directory(sub) => {
                    fs::create_dir(&path)?;
                    sub.write_children(&path)?;
                }
            }
        }
        Ok(())
    }
}

impl FileNode {
    /// Write the file contents unmodified to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    /// Returns [`Error::Io`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_to(path)
    }

    fn write_to(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(self.data())?;
        file.set_modified(SystemTime::from(self.timestamps().modified))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn archive(content: &[u8]) -> DirectoryNode {
        let mut root = DirectoryNode::new("pack");
        root.add(FileNode::new("a.bin", content.to_vec())).unwrap();
        root.add_path("nested/dir", FileNode::new("b.bin", vec![9, 9])).unwrap();
        root.add(FileNode::new("Thumbs.db", vec![0])).unwrap();
        root
    }

    #[test]
    fn test_export_creates_tree() {
        let dir = tempdir().unwrap();
        let out = archive(b"one").export(dir.path(), false).unwrap();
        assert_eq!(out, dir.path().join("pack"));
        assert_eq!(fs::read(out.join("a.bin")).unwrap(), b"one");
        assert_eq!(fs::read(out.join("nested/dir/b.bin")).unwrap(), [9, 9]);
        assert!(!out.join("Thumbs.db").exists());
    }

    #[test]
    fn test_export_without_overwrite_keeps_destination() {
        let dir = tempdir().unwrap();
        archive(b"one").export(dir.path(), false).unwrap();
        let err = archive(b"two").export(dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::DestinationOccupied { .. }));
        assert_eq!(fs::read(dir.path().join("pack/a.bin")).unwrap(), b"one");
    }

    #[test]
    fn test_export_overwrite_replaces_tree() {
        let dir = tempdir().unwrap();
        archive(b"one").export(dir.path(), false).unwrap();
        fs::write(dir.path().join("pack/stale.bin"), b"old").unwrap();

        archive(b"two").export(dir.path(), true).unwrap();
        assert_eq!(fs::read(dir.path().join("pack/a.bin")).unwrap(), b"two");
        assert!(!dir.path().join("pack/stale.bin").exists());
        let leftovers = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_save_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x/y/z.bin");
        FileNode::new("z.bin", vec![1, 2]).save(&path).unwrap();
        assert_eq!(fs::read(path).unwrap(), [1, 2]);
    }
}
