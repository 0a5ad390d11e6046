//! Open file handles, each bound to the path it was opened on.

use std::collections::HashMap;

use super::path;

/// State behind one open handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenFile {
    pub path: String,
    pub flags: i32,
}

/// Allocates handle numbers and remembers which path each refers to.
#[derive(Debug)]
pub struct HandleTable {
    open: HashMap<u64, OpenFile>,
    next_fh: u64,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            open: HashMap::new(),
            // 0 is left unused so a zero fh never names a real open file
            next_fh: 1,
        }
    }

    /// Register an open of `path` and return its handle.
    pub fn open(&mut self, path: &str, flags: i32) -> u64 {
        let fh = self.next_fh;
        self.next_fh += 1;
        self.open.insert(
            fh,
            OpenFile {
                path: path.to_string(),
                flags,
            },
        );
        fh
    }

    pub fn get(&self, fh: u64) -> Option<&OpenFile> {
        self.open.get(&fh)
    }

    /// Drop a handle, returning what it referred to.
    pub fn release(&mut self, fh: u64) -> Option<OpenFile> {
        self.open.remove(&fh)
    }

    /// Rebind every handle under `old` to the corresponding path under `new`.
    pub fn rename(&mut self, old: &str, new: &str) {
        for file in self.open.values_mut() {
            if path::is_within(&file.path, old) {
                file.path = format!("{}{}", new, &file.path[old.len()..]);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_distinct_and_bound_to_path() {
        let mut table = HandleTable::new();
        let a = table.open("/a", libc::O_RDONLY);
        let b = table.open("/a", libc::O_RDWR);

        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_eq!(table.get(a).unwrap().path, "/a");
        assert_eq!(table.get(b).unwrap().flags, libc::O_RDWR);
    }

    #[test]
    fn test_release() {
        let mut table = HandleTable::new();
        let fh = table.open("/a", 0);

        assert_eq!(table.release(fh).unwrap().path, "/a");
        assert!(table.get(fh).is_none());
        assert!(table.release(fh).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_rename_rebinds_subtree() {
        let mut table = HandleTable::new();
        let inner = table.open("/dir/file", 0);
        let sibling = table.open("/dirty", 0);

        table.rename("/dir", "/moved");

        assert_eq!(table.get(inner).unwrap().path, "/moved/file");
        assert_eq!(table.get(sibling).unwrap().path, "/dirty");
        assert_eq!(table.len(), 2);
    }
}
