mod file_kind;

pub use file_kind::{FileKind, S_IFDIR, S_IFLNK, S_IFMT, S_IFREG};
