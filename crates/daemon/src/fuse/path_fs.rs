//! `fuser::Filesystem` implementation over [`Translator`]
//!
//! Callbacks arrive on the FUSE session thread one at a time. Each one
//! resolves inodes to paths, runs the matching translator call to
//! completion on the tokio runtime and replies with the result or its
//! errno.

use std::ffi::OsStr;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
    TimeOrNow,
};
use libc::c_int;
use record_store::{FileKind, FileRecord};
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tracing::{debug, error, info};

use super::cache::{AttrCache, CachedAttr};
use super::inode_table::InodeTable;
use crate::config::CacheConfig;
use crate::fs::{path, FsError, Translator};

const BLOCK_SIZE: u32 = 512;

/// FUSE filesystem backed by a [`Translator`].
pub struct PathFs {
    translator: Arc<Translator>,
    runtime: Handle,
    inodes: InodeTable,
    cache: Option<AttrCache>,
    ttl: Duration,
}

impl PathFs {
    /// `runtime` must belong to a runtime that is not driving the calling
    /// thread; callbacks block on it.
    pub fn new(translator: Arc<Translator>, runtime: Handle, cache: CacheConfig) -> Self {
        let ttl = Duration::from_secs(cache.attr_ttl_secs as u64);
        let cache = cache.enabled.then(|| AttrCache::new(cache));
        Self {
            translator,
            runtime,
            inodes: InodeTable::new(),
            cache,
            ttl,
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn path_of(&self, ino: u64) -> Result<String, FsError> {
        self.inodes
            .get_path(ino)
            .map(str::to_string)
            .ok_or_else(|| FsError::NotFound(format!("inode {}", ino)))
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String, FsError> {
        let name = name
            .to_str()
            .ok_or_else(|| FsError::InvalidArgument(format!("non UTF-8 name {:?}", name)))?;
        Ok(path::join(&self.path_of(parent)?, name))
    }

    /// Path an open handle refers to, falling back to the inode's path.
    fn handle_path(&self, ino: u64, fh: u64) -> Result<String, FsError> {
        self.translator
            .handle_path(fh)
            .or_else(|_| self.path_of(ino))
    }

    fn invalidate(&self, path: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(path);
        }
    }

    fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Attributes of `path`, served from the cache when possible.
    fn lookup_attr(&mut self, path: &str) -> Result<FileAttr, FsError> {
        if let Some(cache) = &self.cache {
            if cache.is_negative(path) {
                return Err(FsError::NotFound(path.to_string()));
            }
            if let Some(attr) = cache.get_attr(path) {
                let ino = self.inodes.get_or_create(path);
                return Ok(to_file_attr(ino, &attr));
            }
        }

        let translator = self.translator.clone();
        match self.block_on(translator.getattr(path)) {
            Ok(record) => Ok(self.entry(&record)),
            Err(e @ FsError::NotFound(_)) => {
                if let Some(cache) = &self.cache {
                    cache.put_negative(path);
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Register `record` with the inode table and cache; return its attrs.
    fn entry(&mut self, record: &FileRecord) -> FileAttr {
        let ino = self.inodes.get_or_create(&record.path);
        let attr = CachedAttr::from(record);
        if let Some(cache) = &self.cache {
            cache.put_attr(&record.path, attr.clone());
        }
        to_file_attr(ino, &attr)
    }

    /// Fresh attributes after a mutation of `path`.
    fn refresh(&mut self, path: &str) -> Result<FileAttr, FsError> {
        self.invalidate(path);
        self.lookup_attr(path)
    }

    fn setattr_inner(
        &mut self,
        path: &str,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
    ) -> Result<FileAttr, FsError> {
        let translator = self.translator.clone();
        self.block_on(async {
            if let Some(mode) = mode {
                translator.chmod(path, mode).await?;
            }
            if uid.is_some() || gid.is_some() {
                translator.chown(path, uid, gid).await?;
            }
            if let Some(size) = size {
                translator.truncate(path, size).await?;
            }
            match (atime, mtime) {
                (None, None) => {}
                (Some(TimeOrNow::Now), Some(TimeOrNow::Now)) => {
                    translator.utimens(path, None).await?;
                }
                (atime, mtime) => {
                    let current = translator.getattr(path).await?;
                    let atime = atime.map_or(current.atime, from_time_or_now);
                    let mtime = mtime.map_or(current.mtime, from_time_or_now);
                    translator.utimens(path, Some((atime, mtime))).await?;
                }
            }
            Ok::<_, FsError>(())
        })?;
        self.refresh(path)
    }
}

/// Map a failure to its errno, logging internal ones loudly.
fn errno(op: &str, err: FsError) -> c_int {
    if err.is_internal() {
        error!(op, error = %err, "filesystem call failed");
    } else {
        debug!(op, error = %err, "filesystem call rejected");
    }
    err.errno()
}

fn from_time_or_now(time: TimeOrNow) -> OffsetDateTime {
    match time {
        TimeOrNow::SpecificTime(t) => OffsetDateTime::from(t),
        TimeOrNow::Now => OffsetDateTime::now_utc(),
    }
}

fn file_type(kind: FileKind) -> FileType {
    match kind {
        FileKind::Directory => FileType::Directory,
        FileKind::Symlink => FileType::Symlink,
        FileKind::Regular | FileKind::Hardlink => FileType::RegularFile,
    }
}

pub(crate) fn to_file_attr(ino: u64, attr: &CachedAttr) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(BLOCK_SIZE as u64),
        atime: attr.atime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: attr.crtime,
        kind: file_type(attr.kind),
        perm: (attr.mode & 0o7777) as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

impl Filesystem for PathFs {
    fn init(&mut self, _req: &Request, _config: &mut KernelConfig) -> Result<(), c_int> {
        info!("pathfs session initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        info!(inodes = self.inodes.len(), "pathfs session destroyed");
    }

    fn lookup(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let result = self
            .child_path(parent, name)
            .and_then(|path| self.lookup_attr(&path));
        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(errno("lookup", e)),
        }
    }

    fn getattr(&mut self, _req: &Request, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let result = self.path_of(ino).and_then(|path| self.lookup_attr(&path));
        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(errno("getattr", e)),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let result = match fh {
            Some(fh) => self.handle_path(ino, fh),
            None => self.path_of(ino),
        }
        .and_then(|path| self.setattr_inner(&path, mode, uid, gid, size, atime, mtime));
        match result {
            Ok(attr) => reply.attr(&self.ttl, &attr),
            Err(e) => reply.error(errno("setattr", e)),
        }
    }

    fn readlink(&mut self, _req: &Request, ino: u64, reply: ReplyData) {
        let translator = self.translator.clone();
        let result = self
            .path_of(ino)
            .and_then(|path| self.block_on(translator.readlink(&path)));
        match result {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(errno("readlink", e)),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|path| {
            let record = self.block_on(translator.mknod(&path, mode & !umask, rdev))?;
            self.invalidate(&path);
            Ok(self.entry(&record))
        });
        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(errno("mknod", e)),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        reply: ReplyEntry,
    ) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|path| {
            let record = self.block_on(translator.mkdir(&path, mode & !umask))?;
            self.invalidate(&path::parent(&path));
            Ok(self.entry(&record))
        });
        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(errno("mkdir", e)),
        }
    }

    fn unlink(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|path| {
            self.block_on(translator.unlink(&path))?;
            self.invalidate(&path);
            self.inodes.remove_by_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("unlink", e)),
        }
    }

    fn rmdir(&mut self, _req: &Request, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|path| {
            self.block_on(translator.rmdir(&path))?;
            self.invalidate(&path);
            self.invalidate(&path::parent(&path));
            self.inodes.remove_by_path(&path);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("rmdir", e)),
        }
    }

    fn symlink(
        &mut self,
        _req: &Request,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, link_name).and_then(|path| {
            let target = target.to_str().ok_or_else(|| {
                FsError::InvalidArgument(format!("non UTF-8 target {:?}", target))
            })?;
            let record = self.block_on(translator.symlink(&path, target))?;
            self.invalidate(&path);
            Ok(self.entry(&record))
        });
        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(errno("symlink", e)),
        }
    }

    fn rename(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|old| {
            let new = self.child_path(newparent, newname)?;
            self.block_on(translator.rename(&old, &new))?;
            // Every cached path below `old` is now wrong
            self.invalidate_all();
            self.inodes.rename(&old, &new);
            Ok(())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("rename", e)),
        }
    }

    fn link(
        &mut self,
        _req: &Request,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        let translator = self.translator.clone();
        let result = self.path_of(ino).and_then(|target| {
            let name = self.child_path(newparent, newname)?;
            let record = self.block_on(translator.link(&name, &target))?;
            self.invalidate(&name);
            Ok(self.entry(&record))
        });
        match result {
            Ok(attr) => reply.entry(&self.ttl, &attr, 0),
            Err(e) => reply.error(errno("link", e)),
        }
    }

    fn open(&mut self, _req: &Request, ino: u64, flags: i32, reply: ReplyOpen) {
        let translator = self.translator.clone();
        let result = self
            .path_of(ino)
            .and_then(|path| self.block_on(translator.open(&path, flags)));
        match result {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(errno("open", e)),
        }
    }

    fn read(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let translator = self.translator.clone();
        let result = self.handle_path(ino, fh).and_then(|path| {
            let offset = u64::try_from(offset)
                .map_err(|_| FsError::InvalidArgument(format!("offset {}", offset)))?;
            self.block_on(translator.read(&path, size as usize, offset))
        });
        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(errno("read", e)),
        }
    }

    fn write(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let translator = self.translator.clone();
        let result = self.handle_path(ino, fh).and_then(|path| {
            let offset = u64::try_from(offset)
                .map_err(|_| FsError::InvalidArgument(format!("offset {}", offset)))?;
            let written = self.block_on(translator.write(&path, data, offset))?;
            self.invalidate(&path);
            Ok(written)
        });
        match result {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(errno("write", e)),
        }
    }

    fn flush(&mut self, _req: &Request, ino: u64, fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        let result = self
            .handle_path(ino, fh)
            .and_then(|path| self.translator.flush(&path, fh));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("flush", e)),
        }
    }

    fn release(
        &mut self,
        _req: &Request,
        ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        let path = self
            .handle_path(ino, fh)
            .unwrap_or_else(|_| format!("inode {}", ino));
        match self.translator.release(&path, fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("release", e)),
        }
    }

    fn fsync(&mut self, _req: &Request, ino: u64, fh: u64, datasync: bool, reply: ReplyEmpty) {
        let result = self
            .handle_path(ino, fh)
            .and_then(|path| self.translator.fsync(&path, datasync, fh));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("fsync", e)),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let translator = self.translator.clone();
        let entries = match self
            .path_of(ino)
            .and_then(|path| self.block_on(translator.readdir(&path)))
        {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(errno("readdir", e));
                return;
            }
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.into_iter().enumerate().skip(skip) {
            let entry_ino = if entry.name == "." {
                ino
            } else {
                self.inodes.get_or_create(&entry.path)
            };
            // A full buffer means the kernel will ask again from this offset
            if reply.add(entry_ino, (i + 1) as i64, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request, ino: u64, reply: ReplyStatfs) {
        let path = self.path_of(ino).unwrap_or_else(|_| "/".to_string());
        let stats = self.translator.statfs(&path);
        reply.statfs(
            stats.blocks,
            stats.blocks_free,
            stats.blocks_available,
            stats.files,
            stats.files_free,
            stats.block_size,
            stats.name_max,
            stats.block_size,
        );
    }

    fn access(&mut self, _req: &Request, ino: u64, mask: i32, reply: ReplyEmpty) {
        let translator = self.translator.clone();
        let result = self
            .path_of(ino)
            .and_then(|path| self.block_on(translator.access(&path, mask)));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(errno("access", e)),
        }
    }

    fn create(
        &mut self,
        _req: &Request,
        parent: u64,
        name: &OsStr,
        mode: u32,
        umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        let translator = self.translator.clone();
        let result = self.child_path(parent, name).and_then(|path| {
            let (record, fh) = self.block_on(translator.create(&path, mode & !umask, flags))?;
            self.invalidate(&path);
            Ok((self.entry(&record), fh))
        });
        match result {
            Ok((attr, fh)) => reply.created(&self.ttl, &attr, 0, fh, 0),
            Err(e) => reply.error(errno("create", e)),
        }
    }
}
