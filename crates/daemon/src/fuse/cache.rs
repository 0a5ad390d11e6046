//! TTL cache for attribute lookups
//!
//! Repeated `lookup`/`getattr` calls from the kernel are answered from here
//! instead of the record store. Every mutation made through the filesystem
//! invalidates the affected entries, so the TTL only bounds how long an
//! entry lives, never how stale it can be.

use std::time::{Duration, SystemTime};

use moka::sync::Cache;
use record_store::{FileKind, FileRecord};

use crate::config::CacheConfig;

/// Attribute snapshot of one record, without its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAttr {
    pub kind: FileKind,
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub crtime: SystemTime,
}

impl From<&FileRecord> for CachedAttr {
    fn from(record: &FileRecord) -> Self {
        Self {
            kind: record.kind,
            mode: record.mode,
            nlink: record.nlink,
            size: record.size.max(0) as u64,
            uid: record.uid,
            gid: record.gid,
            atime: record.atime.into(),
            mtime: record.mtime.into(),
            ctime: record.ctime.into(),
            crtime: record.created_at.into(),
        }
    }
}

/// Attribute and negative-lookup cache keyed by path.
#[derive(Clone)]
pub struct AttrCache {
    attrs: Cache<String, CachedAttr>,
    negative: Cache<String, ()>,
}

impl AttrCache {
    pub fn new(config: CacheConfig) -> Self {
        let attr_ttl = Duration::from_secs(config.attr_ttl_secs as u64);
        let negative_ttl = Duration::from_secs(config.negative_ttl_secs as u64);

        Self {
            attrs: Cache::builder()
                .time_to_live(attr_ttl)
                .max_capacity(config.max_entries)
                .build(),
            negative: Cache::builder()
                .time_to_live(negative_ttl)
                .max_capacity(config.max_entries)
                .build(),
        }
    }

    pub fn get_attr(&self, path: &str) -> Option<CachedAttr> {
        self.attrs.get(path)
    }

    /// Cache attributes for a path, clearing any negative entry.
    pub fn put_attr(&self, path: &str, attr: CachedAttr) {
        self.negative.invalidate(path);
        self.attrs.insert(path.to_string(), attr);
    }

    /// Check if a path is known not to exist.
    pub fn is_negative(&self, path: &str) -> bool {
        self.negative.contains_key(path)
    }

    /// Mark a path as non-existent.
    pub fn put_negative(&self, path: &str) {
        self.attrs.invalidate(path);
        self.negative.insert(path.to_string(), ());
    }

    /// Invalidate a specific path from all caches
    pub fn invalidate(&self, path: &str) {
        self.attrs.invalidate(path);
        self.negative.invalidate(path);
    }

    /// Invalidate all cached entries
    pub fn invalidate_all(&self) {
        self.attrs.invalidate_all();
        self.negative.invalidate_all();
    }
}

impl std::fmt::Debug for AttrCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttrCache")
            .field("attr_count", &self.attrs.entry_count())
            .field("negative_count", &self.negative.entry_count())
            .finish()
    }
}
