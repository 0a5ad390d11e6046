//! POSIX filesystem semantics on top of the path-keyed record store.
//!
//! Each public method corresponds to one filesystem call. The record store
//! only guarantees single-row atomicity and path uniqueness; everything
//! else (link counts, namespace rules, content splicing) is enforced here.

use parking_lot::Mutex;
use record_store::types::{S_IFMT, S_IFREG};
use record_store::{Database, FileKind, FileRecord, NewRecord, RecordChanges, StoreError};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::error::FsError;
use super::handles::HandleTable;
use super::path;
use super::Owner;

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name relative to the listed directory.
    pub name: String,
    /// Absolute path the entry refers to.
    pub path: String,
    pub kind: FileKind,
}

/// Filesystem statistics reported by `statfs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatFs {
    pub block_size: u32,
    pub blocks: u64,
    pub blocks_free: u64,
    pub blocks_available: u64,
    pub files: u64,
    pub files_free: u64,
    pub name_max: u32,
}

impl StatFs {
    /// Fixed figures; the record table has no meaningful block geometry.
    pub const FIXED: StatFs = StatFs {
        block_size: 512,
        blocks: 4096,
        blocks_free: 2048,
        blocks_available: 2048,
        files: 0,
        files_free: 0,
        name_max: 255,
    };
}

/// Translates filesystem calls into record store operations.
#[derive(Debug)]
pub struct Translator {
    db: Database,
    owner: Owner,
    handles: Mutex<HandleTable>,
}

/// Largest content a record may hold; SQLite's default blob length limit.
pub const MAX_FILE_SIZE: u64 = 1_000_000_000;

fn now() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Content after writing `buf` at `offset` into `existing`.
///
/// The result is `existing[..offset] + buf`: bytes past the end of the
/// write are dropped, and a gap before `offset` is zero-filled. Callers
/// bound `offset + buf.len()` first; see [`MAX_FILE_SIZE`].
pub fn splice(existing: &[u8], buf: &[u8], offset: usize) -> Vec<u8> {
    let keep = offset.min(existing.len());
    let mut contents = Vec::with_capacity(offset + buf.len());
    contents.extend_from_slice(&existing[..keep]);
    contents.resize(offset, 0);
    contents.extend_from_slice(buf);
    contents
}

impl Translator {
    /// Wrap `db`, creating the root directory record if it is missing.
    pub async fn new(db: Database, owner: Owner) -> Result<Self, FsError> {
        let root = NewRecord::directory("/", owner.uid, owner.gid, now());
        match db.create(&root).await {
            Ok(_) => info!(uid = owner.uid, gid = owner.gid, "created root directory record"),
            Err(StoreError::UniqueViolation(_)) => debug!("root directory record already present"),
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            db,
            owner,
            handles: Mutex::new(HandleTable::new()),
        })
    }

    /// Underlying record store.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Path currently bound to an open handle.
    pub fn handle_path(&self, fh: u64) -> Result<String, FsError> {
        self.handles
            .lock()
            .get(fh)
            .map(|f| f.path.clone())
            .ok_or(FsError::BadHandle(fh))
    }

    async fn require(&self, path: &str) -> Result<FileRecord, FsError> {
        self.db
            .find_by_path(path)
            .await?
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    /// Check that the directory `path` would be created in exists.
    async fn require_parent(&self, path: &str) -> Result<FileRecord, FsError> {
        if path == "/" {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        let parent = path::parent(path);
        let record = self.require(&parent).await?;
        if !record.is_dir() {
            return Err(FsError::NotADirectory(parent));
        }
        Ok(record)
    }

    /// Succeeds for any existing path; permission bits are not consulted.
    pub async fn access(&self, path: &str, mode: i32) -> Result<(), FsError> {
        let path = path::normalize(path);
        debug!(path = %path, mode, "access");
        match self.db.find_by_path(&path).await? {
            Some(_) => Ok(()),
            None => Err(FsError::PermissionDenied(path)),
        }
    }

    /// Full record for `path`, content included.
    pub async fn getattr(&self, path: &str) -> Result<FileRecord, FsError> {
        let path = path::normalize(path);
        self.require(&path).await
    }

    /// Replace the permission bits, keeping the stored file type.
    pub async fn chmod(&self, path: &str, mode: u32) -> Result<(), FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        let changes = RecordChanges {
            mode: Some((record.mode & S_IFMT) | (mode & 0o7777)),
            ctime: Some(now()),
            ..Default::default()
        };
        self.db.update(&path, &changes).await?;
        debug!(path = %path, mode = format_args!("{:o}", mode), "chmod");
        Ok(())
    }

    /// Change ownership; `None` keeps the current id. A missing path is
    /// silently ignored.
    pub async fn chown(
        &self,
        path: &str,
        uid: Option<u32>,
        gid: Option<u32>,
    ) -> Result<(), FsError> {
        let path = path::normalize(path);
        let changes = RecordChanges {
            uid,
            gid,
            ctime: Some(now()),
            ..Default::default()
        };
        let rows = self.db.update(&path, &changes).await?;
        debug!(path = %path, ?uid, ?gid, rows, "chown");
        Ok(())
    }

    /// `.`, `..` and every immediate child of `path`.
    pub async fn readdir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if !record.is_dir() {
            return Err(FsError::NotADirectory(path));
        }

        let mut entries = vec![
            DirEntry {
                name: ".".to_string(),
                path: path.clone(),
                kind: FileKind::Directory,
            },
            DirEntry {
                name: "..".to_string(),
                path: path::parent(&path),
                kind: FileKind::Directory,
            },
        ];

        let children = self.db.find_children(&path).await?;
        entries.extend(children.into_iter().map(|child| DirEntry {
            name: path::file_name(&child.path).to_string(),
            kind: child.kind,
            path: child.path,
        }));

        Ok(entries)
    }

    /// Create an empty regular file.
    pub async fn mknod(&self, path: &str, mode: u32, dev: u32) -> Result<FileRecord, FsError> {
        let path = path::normalize(path);
        let file_type = mode & S_IFMT;
        if file_type != 0 && file_type != S_IFREG {
            return Err(FsError::Unsupported(format!(
                "node type {:o} for {}",
                file_type, path
            )));
        }
        self.require_parent(&path).await?;

        let record = NewRecord::regular(&path, mode, self.owner.uid, self.owner.gid, now());
        let created = self.db.create(&record).await?;
        debug!(path = %path, dev, "mknod");
        Ok(created)
    }

    /// [`Translator::mknod`] followed by an open of the new file.
    pub async fn create(
        &self,
        path: &str,
        mode: u32,
        flags: i32,
    ) -> Result<(FileRecord, u64), FsError> {
        let created = self.mknod(path, S_IFREG | (mode & !S_IFMT), 0).await?;
        let fh = self.handles.lock().open(&created.path, flags);
        Ok((created, fh))
    }

    /// Open an existing path, returning a handle bound to it.
    pub async fn open(&self, path: &str, flags: i32) -> Result<u64, FsError> {
        let path = path::normalize(path);
        self.require(&path).await?;
        let fh = self.handles.lock().open(&path, flags);
        debug!(path = %path, fh, flags, "open");
        Ok(fh)
    }

    /// Create a directory (always mode `0755`) and count it in its parent.
    pub async fn mkdir(&self, path: &str, mode: u32) -> Result<FileRecord, FsError> {
        let path = path::normalize(path);
        let parent = self.require_parent(&path).await?;

        let record = NewRecord::directory(&path, self.owner.uid, self.owner.gid, now());
        let created = self.db.create(&record).await?;
        self.db.adjust_link_count(&parent.path, 1).await?;

        debug!(path = %path, requested_mode = format_args!("{:o}", mode), "mkdir");
        Ok(created)
    }

    /// Remove an empty directory and drop its link from the parent.
    pub async fn rmdir(&self, path: &str) -> Result<(), FsError> {
        let path = path::normalize(path);
        if path == "/" {
            return Err(FsError::Busy(path));
        }
        let record = self.require(&path).await?;
        if !record.is_dir() {
            return Err(FsError::NotADirectory(path));
        }
        if self.db.has_children(&path).await? {
            return Err(FsError::NotEmpty(path));
        }

        if self.db.delete(&path).await? == 0 {
            return Err(FsError::NotFound(path));
        }
        self.db.adjust_link_count(&path::parent(&path), -1).await?;
        debug!(path = %path, "rmdir");
        Ok(())
    }

    /// Remove a non-directory entry.
    pub async fn unlink(&self, path: &str) -> Result<(), FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if record.is_dir() {
            return Err(FsError::IsADirectory(path));
        }

        if self.db.delete(&path).await? == 0 {
            return Err(FsError::NotFound(path));
        }
        debug!(path = %path, kind = %record.kind, "unlink");
        Ok(())
    }

    /// Create a symbolic link at `name` pointing at `target`.
    ///
    /// `target` is resolved against the link's directory and must name an
    /// existing record; the literal text is kept for `readlink`.
    pub async fn symlink(&self, name: &str, target: &str) -> Result<FileRecord, FsError> {
        let name = path::normalize(name);
        let resolved = path::resolve(&path::parent(&name), target);
        let target_record = self.require(&resolved).await?;
        self.require_parent(&name).await?;

        let record = NewRecord::symlink(
            &name,
            target_record.id,
            target,
            self.owner.uid,
            self.owner.gid,
            now(),
        );
        let created = self.db.create(&record).await?;
        debug!(name = %name, target = %target, resolved = %resolved, "symlink");
        Ok(created)
    }

    /// Create a hard link at `name` to the existing record `target`.
    pub async fn link(&self, name: &str, target: &str) -> Result<FileRecord, FsError> {
        let name = path::normalize(name);
        let target = path::normalize(target);
        let target_record = self.require(&target).await?;
        if target_record.is_dir() {
            return Err(FsError::NotPermitted(target));
        }
        self.require_parent(&name).await?;

        let record = NewRecord::hardlink(
            &name,
            &target_record,
            self.owner.uid,
            self.owner.gid,
            now(),
        );
        let created = self.db.create(&record).await?;
        debug!(name = %name, target = %target, "link");
        Ok(created)
    }

    /// Move `old` (and its subtree) to `new`. `new` must not exist.
    pub async fn rename(&self, old: &str, new: &str) -> Result<(), FsError> {
        let old = path::normalize(old);
        let new = path::normalize(new);
        if old == "/" || new == "/" {
            return Err(FsError::Busy("/".to_string()));
        }
        if old == new {
            self.require(&old).await?;
            return Ok(());
        }
        if path::is_within(&new, &old) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {} into itself at {}",
                old, new
            )));
        }

        let record = self.require(&old).await?;
        let new_parent = self.require_parent(&new).await?;

        if self.db.rename_tree(&old, &new).await? == 0 {
            return Err(FsError::NotFound(old));
        }

        let old_parent = path::parent(&old);
        if record.is_dir() && old_parent != new_parent.path {
            self.db.adjust_link_count(&old_parent, -1).await?;
            self.db.adjust_link_count(&new_parent.path, 1).await?;
        }
        self.handles.lock().rename(&old, &new);

        debug!(old = %old, new = %new, "rename");
        Ok(())
    }

    /// Set access and modification times, or both to now when `times` is
    /// `None`. A missing path is silently ignored.
    pub async fn utimens(
        &self,
        path: &str,
        times: Option<(OffsetDateTime, OffsetDateTime)>,
    ) -> Result<(), FsError> {
        let path = path::normalize(path);
        let current = now();
        let (atime, mtime) = times.unwrap_or((current, current));
        let changes = RecordChanges {
            atime: Some(atime),
            mtime: Some(mtime),
            ctime: Some(current),
            ..Default::default()
        };
        self.db.update(&path, &changes).await?;
        Ok(())
    }

    /// Bytes `[offset, offset + length)` of the content, clamped to what
    /// is stored.
    pub async fn read(&self, path: &str, length: usize, offset: u64) -> Result<Vec<u8>, FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if record.is_dir() {
            return Err(FsError::IsADirectory(path));
        }

        let data = record.data();
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(length).min(data.len());
        Ok(data[start..end].to_vec())
    }

    /// Write `buf` at `offset`; see [`splice`] for the resulting content.
    pub async fn write(&self, path: &str, buf: &[u8], offset: u64) -> Result<usize, FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if record.is_dir() {
            return Err(FsError::IsADirectory(path));
        }

        // Bounded before splicing so a huge offset never reaches the allocator
        let fits = offset
            .checked_add(buf.len() as u64)
            .is_some_and(|end| end <= MAX_FILE_SIZE);
        if !fits {
            return Err(FsError::FileTooLarge(format!(
                "{} bytes at offset {} in {}",
                buf.len(),
                offset,
                path
            )));
        }
        let contents = splice(record.data(), buf, offset as usize);
        let current = now();
        let changes = RecordChanges {
            mtime: Some(current),
            ctime: Some(current),
            ..Default::default()
        }
        .with_contents(contents);
        self.db.update(&path, &changes).await?;

        debug!(path = %path, offset, len = buf.len(), size = ?changes.size, "write");
        Ok(buf.len())
    }

    /// Shrink the content to `length` bytes; never grows it.
    pub async fn truncate(&self, path: &str, length: u64) -> Result<(), FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if record.is_dir() {
            return Err(FsError::IsADirectory(path));
        }

        let Some(contents) = record.contents else {
            return Ok(());
        };
        let length = usize::try_from(length).unwrap_or(usize::MAX);
        if length >= contents.len() {
            return Ok(());
        }

        let current = now();
        let changes = RecordChanges {
            mtime: Some(current),
            ctime: Some(current),
            ..Default::default()
        }
        .with_contents(contents[..length].to_vec());
        self.db.update(&path, &changes).await?;
        debug!(path = %path, length, "truncate");
        Ok(())
    }

    /// Content is written through on every `write`; nothing to flush.
    pub fn flush(&self, _path: &str, _fh: u64) -> Result<(), FsError> {
        Ok(())
    }

    /// Drop the handle. Releasing an unknown handle is not an error.
    pub fn release(&self, path: &str, fh: u64) -> Result<(), FsError> {
        if self.handles.lock().release(fh).is_none() {
            debug!(path = %path, fh, "release of unknown handle");
        }
        Ok(())
    }

    /// No-op for the same reason as [`Translator::flush`].
    pub fn fsync(&self, _path: &str, _datasync: bool, _fh: u64) -> Result<(), FsError> {
        Ok(())
    }

    /// Target of a symbolic link, as it was written at creation.
    pub async fn readlink(&self, path: &str) -> Result<String, FsError> {
        let path = path::normalize(path);
        let record = self.require(&path).await?;
        if record.kind != FileKind::Symlink {
            return Err(FsError::InvalidArgument(format!("{} is not a symlink", path)));
        }

        if let Some(text) = record.contents.as_deref().filter(|t| !t.is_empty()) {
            return Ok(String::from_utf8_lossy(text).into_owned());
        }

        // Links without stored text fall back to the referenced record
        let target_id = record
            .target_id
            .ok_or_else(|| FsError::NotFound(format!("target of {}", path)))?;
        let target = self
            .db
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| FsError::NotFound(format!("target of {}", path)))?;
        Ok(target.path)
    }

    /// Always [`StatFs::FIXED`].
    pub fn statfs(&self, _path: &str) -> StatFs {
        StatFs::FIXED
    }
}
