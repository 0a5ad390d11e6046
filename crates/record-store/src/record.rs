use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::types::{FileKind, S_IFMT};

/// One row of the `files` table.
#[derive(FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub kind: FileKind,
    /// Row id of the aliased record, for symlinks and hard links.
    pub target_id: Option<i64>,
    /// Opaque metadata placeholder, `{}` unless set by a future feature.
    pub attrs: String,
    #[serde(skip_serializing)]
    pub contents: Option<Vec<u8>>,
    pub mode: u32,
    pub nlink: u32,
    pub size: i64,
    pub uid: u32,
    pub gid: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub atime: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub mtime: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ctime: OffsetDateTime,
}

impl FileRecord {
    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    /// Permission bits without the file type.
    pub fn permissions(&self) -> u32 {
        self.mode & !S_IFMT
    }

    /// Stored content, or an empty slice if nothing was ever written.
    pub fn data(&self) -> &[u8] {
        self.contents.as_deref().unwrap_or_default()
    }
}

/// Field set for inserting a record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub path: String,
    pub kind: FileKind,
    pub target_id: Option<i64>,
    pub contents: Option<Vec<u8>>,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub now: OffsetDateTime,
}

impl NewRecord {
    /// A regular file: nlink 1, no content.
    pub fn regular(path: &str, perm: u32, uid: u32, gid: u32, now: OffsetDateTime) -> Self {
        Self {
            path: path.to_string(),
            kind: FileKind::Regular,
            target_id: None,
            contents: None,
            mode: FileKind::Regular.type_bits() | (perm & !S_IFMT),
            nlink: 1,
            uid,
            gid,
            now,
        }
    }

    /// A directory: nlink 2 (self + entry in parent), mode `0755`.
    pub fn directory(path: &str, uid: u32, gid: u32, now: OffsetDateTime) -> Self {
        Self {
            path: path.to_string(),
            kind: FileKind::Directory,
            target_id: None,
            contents: None,
            mode: FileKind::Directory.type_bits() | 0o755,
            nlink: 2,
            uid,
            gid,
            now,
        }
    }

    /// A symbolic link holding `link_text` and pointing at row `target_id`.
    pub fn symlink(
        path: &str,
        target_id: i64,
        link_text: &str,
        uid: u32,
        gid: u32,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            path: path.to_string(),
            kind: FileKind::Symlink,
            target_id: Some(target_id),
            contents: Some(link_text.as_bytes().to_vec()),
            mode: FileKind::Symlink.type_bits() | 0o777,
            nlink: 1,
            uid,
            gid,
            now,
        }
    }

    /// A hard link seeded with a snapshot of `target`'s content.
    pub fn hardlink(path: &str, target: &FileRecord, uid: u32, gid: u32, now: OffsetDateTime) -> Self {
        Self {
            path: path.to_string(),
            kind: FileKind::Hardlink,
            target_id: Some(target.id),
            contents: target.contents.clone(),
            mode: FileKind::Hardlink.type_bits() | target.permissions(),
            nlink: 1,
            uid,
            gid,
            now,
        }
    }

    /// Size implied by the initial content.
    pub fn size(&self) -> i64 {
        self.contents.as_ref().map_or(0, |c| c.len() as i64)
    }
}

/// Partial update of a record; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecordChanges {
    pub mode: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub contents: Option<Vec<u8>>,
    pub size: Option<i64>,
    pub atime: Option<OffsetDateTime>,
    pub mtime: Option<OffsetDateTime>,
    pub ctime: Option<OffsetDateTime>,
}

impl RecordChanges {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none()
            && self.uid.is_none()
            && self.gid.is_none()
            && self.contents.is_none()
            && self.size.is_none()
            && self.atime.is_none()
            && self.mtime.is_none()
            && self.ctime.is_none()
    }

    /// Replace the content and keep `size` in step with it.
    pub fn with_contents(mut self, contents: Vec<u8>) -> Self {
        self.size = Some(contents.len() as i64);
        self.contents = Some(contents);
        self
    }
}
