//! FUSE integration
//!
//! Exposes a [`Translator`](crate::fs::Translator) to the kernel.
//!
//! - `PathFs`: `fuser::Filesystem` implementation
//! - `InodeTable`: bidirectional inode ↔ path mapping
//! - `AttrCache`: TTL cache for attribute lookups
//! - `mount`: starts a background FUSE session

mod cache;
mod inode_table;
mod mount;
mod path_fs;

pub use cache::{AttrCache, CachedAttr};
pub use inode_table::InodeTable;
pub use mount::{mount, mount_options, MountError};
pub use path_fs::PathFs;
