// Filesystem semantics over the record store
pub mod fs;

// Kernel-facing adapter
#[cfg(feature = "fuse")]
pub mod fuse;

// Process configuration and tracing setup
pub mod config;
pub mod logging;

pub use config::{CacheConfig, Config, ConfigError, MountConfig};
pub use fs::{DirEntry, FsError, Owner, StatFs, Translator};

// Re-exports for consumers that only depend on the daemon crate
pub use record_store::{Database, FileKind, FileRecord};
