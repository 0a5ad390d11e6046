//! Bidirectional inode ↔ path mapping for the FUSE adapter
//!
//! The kernel addresses files by 64-bit inode numbers while every record is
//! keyed by path. Inodes are handed out lazily on first lookup and follow
//! their path through renames.

use std::collections::HashMap;

use crate::fs::path;

/// Bidirectional mapping between inodes and paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    /// Create a new inode table with root pre-registered
    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.insert("/".to_string(), Self::ROOT_INODE);
        table
    }

    fn insert(&mut self, path: String, inode: u64) {
        self.inode_to_path.insert(inode, path.clone());
        self.path_to_inode.insert(path, inode);
    }

    /// Get or create an inode for a path
    pub fn get_or_create(&mut self, path: &str) -> u64 {
        let normalized = path::normalize(path);
        if let Some(&inode) = self.path_to_inode.get(&normalized) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.insert(normalized, inode);
        inode
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(&path::normalize(path)).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Forget a path. The root mapping is never removed.
    pub fn remove_by_path(&mut self, path: &str) -> Option<u64> {
        let normalized = path::normalize(path);
        if normalized == "/" {
            return None;
        }
        let inode = self.path_to_inode.remove(&normalized)?;
        self.inode_to_path.remove(&inode);
        Some(inode)
    }

    /// Move every mapping at or below `old` to the same place below `new`,
    /// dropping whatever `new` previously mapped to.
    pub fn rename(&mut self, old: &str, new: &str) {
        let old = path::normalize(old);
        let new = path::normalize(new);

        let stale: Vec<String> = self
            .path_to_inode
            .keys()
            .filter(|p| path::is_within(p, &new) && !path::is_within(p, &old))
            .cloned()
            .collect();
        for p in stale {
            self.remove_by_path(&p);
        }

        let moved: Vec<(String, u64)> = self
            .path_to_inode
            .iter()
            .filter(|(p, _)| path::is_within(p, &old))
            .map(|(p, &inode)| (p.clone(), inode))
            .collect();
        for (p, inode) in moved {
            self.path_to_inode.remove(&p);
            self.insert(format!("{}{}", new, &p[old.len()..]), inode);
        }
    }

    /// Number of mapped paths, root included
    pub fn len(&self) -> usize {
        self.path_to_inode.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path_to_inode.is_empty()
    }
}
