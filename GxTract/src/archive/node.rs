//! In-memory container tree

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Creation, modification and access times of a file node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl Timestamps {
    /// All three times set to `at`.
    #[must_use]
    pub fn at(at: DateTime<Utc>) -> Self {
        Self {
            created: at,
            modified: at,
            accessed: at,
        }
    }
}

/// Source of timestamps for newly created nodes.
pub trait TimestampProvider: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn timestamps(&self) -> Timestamps {
        Timestamps::at(self.now())
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimestampProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same instant, for reproducible output.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl TimestampProvider for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A file inside a container.
#[derive(Debug, Clone)]
pub struct FileNode {
    name: String,
    data: Arc<[u8]>,
    timestamps: Timestamps,
}

impl FileNode {
    /// Create a file node stamped with the system clock.
    pub fn new(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::with_clock(name, data, &SystemClock)
    }

    pub fn with_clock(
        name: impl Into<String>,
        data: impl Into<Arc<[u8]>>,
        clock: &dyn TimestampProvider,
    ) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            timestamps: clock.timestamps(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the contents.
    #[must_use]
    pub fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn timestamps(&self) -> Timestamps {
        self.timestamps
    }

    /// Extension including the dot, or `""`.
    #[must_use]
    pub fn extension(&self) -> &str {
        self.name.rfind('.').map_or("", |i| &self.name[i..])
    }
}

/// A directory inside a container. Children are kept sorted by name.
#[derive(Debug, Clone, Default)]
pub struct DirectoryNode {
    name: String,
    children: BTreeMap<String, Node>,
}

/// A container tree node.
#[derive(Debug, Clone)]
pub enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

impl Node {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Node::Directory(dir) => dir.name(),
            Node::File(file) => file.name(),
        }
    }

    #[must_use]
    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(file) => Some(file),
            Node::Directory(_) => None,
        }
    }

    #[must_use]
    pub fn as_directory(&self) -> Option<&DirectoryNode> {
        match self {
            Node::Directory(dir) => Some(dir),
            Node::File(_) => None,
        }
    }

    /// Byte size of the file, or of every file below the directory.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Node::Directory(dir) => dir.total_size(),
            Node::File(file) => file.len() as u64,
        }
    }

    fn rename(&mut self, name: String) {
        match self {
            Node::Directory(dir) => dir.name = name,
            Node::File(file) => file.name = name,
        }
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Node::File(file)
    }
}

impl From<DirectoryNode> for Node {
    fn from(dir: DirectoryNode) -> Self {
        Node::Directory(dir)
    }
}

/// `stem_{index}.ext`, the name given to a duplicate entry.
pub(crate) fn indexed_name(name: &str, index: usize) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{index}{}", &name[..dot], &name[dot..]),
        _ => format!("{name}_{index}"),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidEntryName(name.to_string()));
    }
    Ok(())
}

impl DirectoryNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct children in name order.
    pub fn children(&self) -> impl Iterator<Item = &Node> {
        self.children.values()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.children.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.get_mut(name)
    }

    /// Look up a nested node by a `/` or `\` separated path.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split(['/', '\\']).filter(|p| !p.is_empty());
        let mut current = self.children.get(parts.next()?)?;
        for part in parts {
            current = current.as_directory()?.children.get(part)?;
        }
        Some(current)
    }

    /// Add a child, renaming it `stem_{i}.ext` if the name is taken.
    ///
    /// Returns the name the child was stored under.
    ///
    /// # Errors
    /// Returns [`Error::InvalidEntryName`] if the name is empty or contains
    /// a path separator.
    pub fn add(&mut self, node: impl Into<Node>) -> Result<String> {
        let mut node = node.into();
        validate_name(node.name())?;
        if self.contains(node.name()) {
            let base = node.name().to_string();
            let mut index = 1;
            while self.contains(&indexed_name(&base, index)) {
                index += 1;
            }
            node.rename(indexed_name(&base, index));
        }
        let name = node.name().to_string();
        self.children.insert(name.clone(), node);
        Ok(name)
    }

    /// Add a node below a relative path, creating intermediate directories.
    ///
    /// # Errors
    /// Returns [`Error::InvalidEntryName`] if a path component is invalid, or
    /// if an intermediate component names an existing file.
    pub fn add_path(&mut self, dir_path: &str, node: impl Into<Node>) -> Result<String> {
        let mut current = self;
        for part in dir_path.split(['/', '\\']).filter(|p| !p.is_empty() && *p != ".") {
            validate_name(part)?;
            let entry = current
                .children
                .entry(part.to_string())
                .or_insert_with(|| Node::Directory(DirectoryNode::new(part)));
            current = match entry {
                Node::Directory(dir) => dir,
                Node::File(_) => return Err(Error::InvalidEntryName(dir_path.to_string())),
            };
        }
        current.add(node)
    }

    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.children.remove(name)
    }

    /// Every file below this directory with its path relative to it.
    pub fn files(&self) -> Files<'_> {
        Files {
            stack: vec![(String::new(), self.children.iter())],
        }
    }

    /// Number of files below this directory.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files().count()
    }

    /// Number of nodes below this directory, directories included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.children
            .values()
            .map(|child| match child {
                Node::Directory(dir) => 1 + dir.node_count(),
                Node::File(_) => 1,
            })
            .sum()
    }

    /// Sum of all file sizes below this directory.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files().map(|(_, file)| file.len() as u64).sum()
    }

    /// Files whose name matches a `*`/`?` wildcard pattern (case-insensitive).
    pub fn find<'a>(&'a self, pattern: &'a str) -> impl Iterator<Item = (String, &'a FileNode)> + 'a {
        self.files()
            .filter(move |(_, file)| wildcard_match(pattern, file.name()))
    }
}

/// Depth-first iterator over the files of a [`DirectoryNode`].
pub struct Files<'a> {
    stack: Vec<(String, btree_map::Iter<'a, String, Node>)>,
}

impl<'a> Iterator for Files<'a> {
    type Item = (String, &'a FileNode);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (prefix, iter) = self.stack.last_mut()?;
            let Some((name, node)) = iter.next() else {
                self.stack.pop();
                continue;
            };
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            match node {
                Node::File(file) => return Some((path, file)),
                Node::Directory(dir) => self.stack.push((path, dir.children.iter())),
            }
        }
    }
}

/// Case-insensitive glob match supporting `*` and `?`.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}
