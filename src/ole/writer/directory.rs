//! Directory tree generation for OLE2 files
//!
//! Entries are stored in SID order; each storage's children form a
//! binary search tree ordered by UTF-16 name length first, then by
//! upper-cased name. The tree is built balanced by taking the midpoint of
//! the sorted siblings as each subtree root, and every node is black.

use super::super::consts::*;
use super::super::file::OleError;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One directory entry being assembled.
#[derive(Debug, Clone)]
pub(super) struct EntryBuilder {
    name: String,
    entry_type: u8,
    pub start_sector: u32,
    pub size: u64,
    sid_left: u32,
    sid_right: u32,
    sid_child: u32,
}

impl EntryBuilder {
    fn new(name: &str, entry_type: u8) -> Self {
        Self {
            name: name.to_string(),
            entry_type,
            start_sector: if entry_type == STGTY_STORAGE { 0 } else { ENDOFCHAIN },
            size: 0,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        }
    }

    fn write_into(&self, out: &mut Vec<u8>) {
        let mut name = [0u8; 64];
        let units: Vec<u16> = self.name.encode_utf16().collect();
        for (i, unit) in units.iter().enumerate() {
            name[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        out.extend_from_slice(&name);
        let name_len = if units.is_empty() { 0 } else { (units.len() + 1) * 2 };
        out.extend_from_slice(&(name_len as u16).to_le_bytes());
        out.push(self.entry_type);
        out.push(NODE_BLACK);
        out.extend_from_slice(&self.sid_left.to_le_bytes());
        out.extend_from_slice(&self.sid_right.to_le_bytes());
        out.extend_from_slice(&self.sid_child.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]); // clsid
        out.extend_from_slice(&0u32.to_le_bytes()); // state bits
        out.extend_from_slice(&0u64.to_le_bytes()); // creation time
        out.extend_from_slice(&0u64.to_le_bytes()); // modified time
        out.extend_from_slice(&self.start_sector.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());
    }
}

/// Collects storages and streams and lays them out as a directory stream.
#[derive(Debug)]
pub(super) struct DirectoryBuilder {
    entries: Vec<EntryBuilder>,
    /// Parent SID to child SIDs
    children: HashMap<u32, Vec<u32>>,
}

impl DirectoryBuilder {
    pub fn new() -> Self {
        Self {
            entries: vec![EntryBuilder::new("Root Entry", STGTY_ROOT)],
            children: HashMap::new(),
        }
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_mut(&mut self, sid: u32) -> &mut EntryBuilder {
        &mut self.entries[sid as usize]
    }

    fn child_named(&self, parent: u32, name: &str) -> Option<u32> {
        self.children.get(&parent)?.iter().copied().find(|&sid| {
            self.entries[sid as usize].name.to_uppercase() == name.to_uppercase()
        })
    }

    fn push_child(&mut self, parent: u32, name: &str, entry_type: u8) -> u32 {
        let sid = self.entries.len() as u32;
        self.entries.push(EntryBuilder::new(name, entry_type));
        self.children.entry(parent).or_default().push(sid);
        sid
    }

    /// Create (or find) the storage at `path`, creating parents as needed.
    pub fn add_storage_path(&mut self, path: &[String]) -> Result<u32, OleError> {
        let mut parent = 0u32;
        for name in path {
            parent = match self.child_named(parent, name) {
                Some(sid) if self.entries[sid as usize].entry_type == STGTY_STORAGE => sid,
                Some(_) => {
                    return Err(OleError::InvalidData(format!(
                        "'{name}' is a stream, not a storage"
                    )));
                },
                None => self.push_child(parent, name, STGTY_STORAGE),
            };
        }
        Ok(parent)
    }

    /// Add a stream entry at `path`; its location is filled in later.
    pub fn add_stream_path(&mut self, path: &[String], size: u64) -> Result<u32, OleError> {
        let (name, parents) = path
            .split_last()
            .ok_or_else(|| OleError::InvalidData("Empty path".to_string()))?;
        let parent = self.add_storage_path(parents)?;
        if self.child_named(parent, name).is_some() {
            return Err(OleError::InvalidData(format!(
                "duplicate entry '{}'",
                path.join("/")
            )));
        }
        let sid = self.push_child(parent, name, STGTY_STREAM);
        self.entries[sid as usize].size = size;
        Ok(sid)
    }

    /// Link every storage's children into a balanced tree and serialize
    /// all entries, padded with empty entries to whole sectors.
    pub fn generate(&mut self, sector_size: usize) -> Vec<u8> {
        let parents: Vec<u32> = self.children.keys().copied().collect();
        for parent in parents {
            let mut sorted = self.children[&parent].clone();
            sorted.sort_by(|&a, &b| {
                compare_names(&self.entries[a as usize].name, &self.entries[b as usize].name)
            });
            let root = self.link(&sorted);
            self.entries[parent as usize].sid_child = root;
        }

        let mut out = Vec::with_capacity(self.entries.len() * DIRENTRY_SIZE);
        for entry in &self.entries {
            entry.write_into(&mut out);
        }

        let padded = out.len().div_ceil(sector_size) * sector_size;
        let empty = EntryBuilder {
            name: String::new(),
            entry_type: STGTY_EMPTY,
            start_sector: 0,
            size: 0,
            sid_left: NOSTREAM,
            sid_right: NOSTREAM,
            sid_child: NOSTREAM,
        };
        while out.len() < padded {
            empty.write_into(&mut out);
        }
        out
    }

    /// Build a balanced subtree from sorted siblings, returning its root.
    fn link(&mut self, sorted: &[u32]) -> u32 {
        if sorted.is_empty() {
            return NOSTREAM;
        }
        let mid = sorted.len() / 2;
        let left = self.link(&sorted[..mid]);
        let right = self.link(&sorted[mid + 1..]);
        let node = &mut self.entries[sorted[mid] as usize];
        node.sid_left = left;
        node.sid_right = right;
        sorted[mid]
    }
}

/// Sibling order used by compound file directories.
fn compare_names(a: &str, b: &str) -> Ordering {
    a.encode_utf16()
        .count()
        .cmp(&b.encode_utf16().count())
        .then_with(|| a.to_uppercase().cmp(&b.to_uppercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_name_order() {
        assert_eq!(compare_names("Data", "1Table"), Ordering::Less);
        assert_eq!(compare_names("abc", "ABD"), Ordering::Less);
        assert_eq!(compare_names("Version", "version"), Ordering::Equal);
    }

    #[test]
    fn test_balanced_children() {
        let mut dir = DirectoryBuilder::new();
        for name in ["A", "B", "C", "D", "E"] {
            dir.add_stream_path(&path(&[name]), 1).unwrap();
        }
        let bytes = dir.generate(SECTOR_SIZE_V3);
        assert_eq!(bytes.len(), 2 * SECTOR_SIZE_V3);
        // Midpoint "C" (SID 3) is the root's child
        assert_eq!(dir.entries[0].sid_child, 3);
        assert_eq!(dir.entries[3].sid_left, 2);
        assert_eq!(dir.entries[3].sid_right, 5);
        assert_eq!(dir.entries[2].sid_left, 1);
    }

    #[test]
    fn test_nested_paths_and_duplicates() {
        let mut dir = DirectoryBuilder::new();
        dir.add_stream_path(&path(&["S", "One"]), 1).unwrap();
        dir.add_stream_path(&path(&["S", "Two"]), 1).unwrap();
        assert_eq!(dir.entry_count(), 4);
        assert!(dir.add_stream_path(&path(&["s", "one"]), 1).is_err());
        assert!(dir.add_stream_path(&path(&["S", "One", "X"]), 1).is_err());
    }
}
