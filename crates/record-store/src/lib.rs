//! Path-keyed record table for pathfs
//!
//! Every filesystem entry (file, directory, symlink, hard link) is a single
//! row in one SQLite table, keyed by its absolute path. This crate owns the
//! schema and exposes single-statement create / select / update / delete
//! operations; filesystem semantics live in the daemon's translator.
//!
//! # Example
//!
//! ```rust,no_run
//! use record_store::{Database, FileKind, NewRecord};
//! use time::OffsetDateTime;
//!
//! # async fn example() -> Result<(), record_store::StoreError> {
//! let db = Database::in_memory().await?;
//! let now = OffsetDateTime::now_utc();
//! let record = db
//!     .create(&NewRecord::regular("/notes.txt", 0o644, 1000, 1000, now))
//!     .await?;
//! assert_eq!(record.kind, FileKind::Regular);
//! # Ok(())
//! # }
//! ```

mod database;
mod error;
mod record;
mod record_queries;
pub mod types;

pub use database::Database;
pub use error::{Result, StoreError};
pub use record::{FileRecord, NewRecord, RecordChanges};
pub use types::FileKind;
