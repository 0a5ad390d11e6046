//! Filesystem call translation
//!
//! - `Translator`: POSIX operations over the record store
//! - `FsError`: failure taxonomy and its errno table
//! - `HandleTable`: open handles bound to paths
//! - `path`: helpers for record key paths

mod error;
mod handles;
pub mod path;
mod translator;

pub use error::FsError;
pub use handles::{HandleTable, OpenFile};
pub use translator::{splice, DirEntry, StatFs, Translator, MAX_FILE_SIZE};

/// Owner assigned to newly created records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// Real user and group of the running process.
    pub fn current() -> Self {
        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self { uid, gid }
    }
}
