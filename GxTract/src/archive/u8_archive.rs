//! Nintendo U8 archives
//!
//! Layout (all integers big-endian):
//!
//! | Offset | Size | Field                       |
//! |--------|------|-----------------------------|
//! | 0x00   | 4    | Magic `55 AA 38 2D`         |
//! | 0x04   | 4    | Node table offset (0x20)    |
//! | 0x08   | 4    | Node table + string table size |
//! | 0x0C   | 4    | Data offset                 |
//! | 0x10   | 16   | Reserved                    |
//!
//! Each 12-byte node is a type byte (0 file, 1 directory), a 24-bit offset
//! into the string table, and two words: for files the data offset and
//! size, for directories the parent index and the index one past the last
//! node of the directory. Node 0 is the unnamed root whose second word is
//! the total node count. The string table follows the last node.

use std::collections::HashMap;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::node::{DirectoryNode, FileNode, Node, indexed_name};
use crate::error::{Error, Result};
use crate::utils::binary::{align_up, read_at, slice_at, truncated};

/// Magic bytes at offset 0.
pub const MAGIC: [u8; 4] = [0x55, 0xAA, 0x38, 0x2D];

const HEADER_SIZE: usize = 0x20;
const NODE_SIZE: usize = 0x0C;
const DATA_ALIGN: usize = 0x20;

#[derive(Debug, Clone, Copy)]
struct RawNode {
    is_dir: bool,
    name_offset: u32,
    offset: u32,
    size: u32,
}

/// Parse a U8 archive into a directory tree named `name`.
///
/// Entries whose name is already taken in their directory are stored as
/// `stem_{node index}.ext`.
///
/// # Errors
/// Returns [`Error::FormatMismatch`] if the magic is missing and
/// [`Error::CorruptData`] if any offset or index is out of range.
pub fn read(data: &[u8], name: &str) -> Result<DirectoryNode> {
    if data.len() < HEADER_SIZE || data[..4] != MAGIC {
        return Err(Error::FormatMismatch {
            expected: "U8 archive".to_string(),
        });
    }
    let mut header = read_at(data, 4, "U8 header")?;
    let node_table = header.read_u32::<BigEndian>().map_err(truncated("U8 header"))? as usize;
    let _node_section_size = header.read_u32::<BigEndian>().map_err(truncated("U8 header"))?;
    let _data_offset = header.read_u32::<BigEndian>().map_err(truncated("U8 header"))?;

    let root = read_node(data, node_table)?;
    let count = root.size as usize;
    if !root.is_dir || count == 0 {
        return Err(Error::corrupt("U8 root node is not a directory"));
    }
    let strings = count
        .checked_mul(NODE_SIZE)
        .and_then(|len| node_table.checked_add(len))
        .filter(|&end| end <= data.len())
        .ok_or_else(|| Error::corrupt(format!("U8 node table of {count} nodes exceeds archive")))?;

    // open directories with the index one past their last node
    let mut stack: Vec<(DirectoryNode, usize)> = vec![(DirectoryNode::new(name), count)];
    for index in 1..count {
        close_finished(&mut stack, index)?;
        let node = read_node(data, node_table + index * NODE_SIZE)?;
        let mut entry_name = read_name(data, strings, node.name_offset)?;
        let parent = &stack[stack.len() - 1];
        if parent.0.contains(&entry_name) {
            entry_name = indexed_name(&entry_name, index);
        }

        if node.is_dir {
            let end = node.size as usize;
            if end <= index || end > parent.1 {
                return Err(Error::corrupt(format!(
                    "U8 directory node {index} ends at {end}, outside its parent"
                )));
            }
            stack.push((DirectoryNode::new(entry_name), end));
        } else {
            let bytes = slice_at(data, node.offset as usize, node.size as usize, "U8 file data")?;
            let file = FileNode::new(entry_name.as_str(), bytes.to_vec());
            let current = &mut stack.last_mut().ok_or_else(|| Error::corrupt("U8 tree underflow"))?.0;
            if entry_name.contains(['/', '\\']) {
                let (dir, base) = entry_name.rsplit_once(['/', '\\']).unwrap_or(("", entry_name.as_str()));
                current.add_path(dir, FileNode::new(base, file.shared_data()))?;
            } else {
                current.add(file)?;
            }
        }
    }
    close_finished(&mut stack, count)?;

    let (root, _) = stack
        .pop()
        .ok_or_else(|| Error::corrupt("U8 tree underflow"))?;
    Ok(root)
}

/// Bytes a U8 archive at the start of `data` spans: the node and string
/// tables and the data of every file node.
///
/// # Errors
/// Same as [`read`].
pub fn archive_len(data: &[u8]) -> Result<usize> {
    if data.len() < HEADER_SIZE || data[..4] != MAGIC {
        return Err(Error::FormatMismatch {
            expected: "U8 archive".to_string(),
        });
    }
    let mut header = read_at(data, 4, "U8 header")?;
    let node_table = header.read_u32::<BigEndian>().map_err(truncated("U8 header"))? as usize;
    let node_section_size = header.read_u32::<BigEndian>().map_err(truncated("U8 header"))? as usize;

    let root = read_node(data, node_table)?;
    if !root.is_dir || root.size == 0 {
        return Err(Error::corrupt("U8 root node is not a directory"));
    }
    let mut end = node_table + node_section_size;
    for index in 1..root.size as usize {
        let node = read_node(data, node_table + index * NODE_SIZE)?;
        if !node.is_dir {
            end = end.max(node.offset as usize + node.size as usize);
        }
    }
    if end > data.len() {
        return Err(Error::corrupt(format!(
            "U8 archive spans 0x{end:X} bytes, only 0x{:X} available",
            data.len()
        )));
    }
    Ok(end)
}

/// Pop directories whose node range ended before `index` into their parents.
fn close_finished(stack: &mut Vec<(DirectoryNode, usize)>, index: usize) -> Result<()> {
    while stack.len() > 1 && stack[stack.len() - 1].1 <= index {
        if let Some((dir, _)) = stack.pop() {
            let last = stack.len() - 1;
            stack[last].0.add(Node::Directory(dir))?;
        }
    }
    Ok(())
}

fn read_node(data: &[u8], offset: usize) -> Result<RawNode> {
    let raw = slice_at(data, offset, NODE_SIZE, "U8 node")?;
    let mut cursor = std::io::Cursor::new(raw);
    let kind = cursor.read_u8()?;
    Ok(RawNode {
        is_dir: kind == 1,
        name_offset: cursor.read_u24::<BigEndian>()?,
        offset: cursor.read_u32::<BigEndian>()?,
        size: cursor.read_u32::<BigEndian>()?,
    })
}

fn read_name(data: &[u8], strings: usize, offset: u32) -> Result<String> {
    let start = strings + offset as usize;
    let tail = data
        .get(start..)
        .ok_or_else(|| Error::corrupt(format!("U8 name offset 0x{offset:X} outside string table")))?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::corrupt("U8 entry name is not terminated"))?;
    Ok(String::from_utf8_lossy(&tail[..len]).into_owned())
}

/// Serialize a directory tree as a U8 archive. The root's own name is not
/// stored.
///
/// # Errors
/// Returns [`Error::InvalidOptions`] if the archive would exceed the 32-bit
/// offsets of the format.
pub fn write(root: &DirectoryNode) -> Result<Vec<u8>> {
    let mut nodes = vec![RawNode {
        is_dir: true,
        name_offset: 0,
        offset: 0,
        size: 0,
    }];
    let mut strings = vec![0u8];
    let mut string_offsets: HashMap<&str, u32> = HashMap::new();
    let mut files: Vec<(usize, &FileNode)> = Vec::new();
    layout(root, 0, &mut nodes, &mut strings, &mut string_offsets, &mut files)?;
    nodes[0].size = to_u32(nodes.len())?;

    let node_section = nodes.len() * NODE_SIZE + strings.len();
    let data_offset = align_up(HEADER_SIZE + node_section, DATA_ALIGN);
    let mut cursor = data_offset;
    for &(index, file) in &files {
        nodes[index].offset = to_u32(cursor)?;
        cursor = align_up(cursor + file.len(), DATA_ALIGN);
    }

    let mut out = Vec::with_capacity(cursor);
    out.extend_from_slice(&MAGIC);
    out.write_u32::<BigEndian>(HEADER_SIZE as u32)?;
    out.write_u32::<BigEndian>(to_u32(node_section)?)?;
    out.write_u32::<BigEndian>(to_u32(data_offset)?)?;
    out.resize(HEADER_SIZE, 0);
    for node in &nodes {
        out.write_u8(u8::from(node.is_dir))?;
        out.write_u24::<BigEndian>(node.name_offset)?;
        out.write_u32::<BigEndian>(node.offset)?;
        out.write_u32::<BigEndian>(node.size)?;
    }
    out.extend_from_slice(&strings);
    for &(index, file) in &files {
        out.resize(nodes[index].offset as usize, 0);
        out.extend_from_slice(file.data());
    }
    out.resize(align_up(out.len(), DATA_ALIGN), 0);
    Ok(out)
}

/// Append the nodes of `dir` (files first, then subdirectories).
fn layout<'a>(
    dir: &'a DirectoryNode,
    parent: usize,
    nodes: &mut Vec<RawNode>,
    strings: &mut Vec<u8>,
    string_offsets: &mut HashMap<&'a str, u32>,
    files: &mut Vec<(usize, &'a FileNode)>,
) -> Result<()> {
    for file in dir.children().filter_map(Node::as_file) {
        let name_offset = intern(file.name(), strings, string_offsets)?;
        files.push((nodes.len(), file));
        nodes.push(RawNode {
            is_dir: false,
            name_offset,
            offset: 0,
            size: to_u32(file.len())?,
        });
    }
    for sub in dir.children().filter_map(Node::as_directory) {
        let name_offset = intern(sub.name(), strings, string_offsets)?;
        let index = nodes.len();
        nodes.push(RawNode {
            is_dir: true,
            name_offset,
            offset: to_u32(parent)?,
            size: 0,
        });
        layout(sub, index, nodes, strings, string_offsets, files)?;
        nodes[index].size = to_u32(nodes.len())?;
    }
    Ok(())
}

fn intern<'a>(name: &'a str, strings: &mut Vec<u8>, offsets: &mut HashMap<&'a str, u32>) -> Result<u32> {
    if let Some(&offset) = offsets.get(name) {
        return Ok(offset);
    }
    let offset = to_u32(strings.len())?;
    if offset > 0x00FF_FFFF {
        return Err(Error::InvalidOptions("U8 string table exceeds 24-bit offsets".to_string()));
    }
    strings.extend_from_slice(name.as_bytes());
    strings.push(0);
    offsets.insert(name, offset);
    Ok(offset)
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::InvalidOptions(format!("U8 value {value} exceeds 32 bits")))
}
