//! Mounting a [`PathFs`] at a directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use fuser::{BackgroundSession, MountOption};
use tokio::runtime::Handle;
use tracing::info;

use super::path_fs::PathFs;
use crate::config::{CacheConfig, MountConfig};
use crate::fs::Translator;

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("mount point does not exist: {0}")]
    MountPointNotFound(PathBuf),
    #[error("mount point is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to mount at {path}: {source}")]
    Mount {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Kernel mount options for `config`.
pub fn mount_options(config: &MountConfig) -> Vec<MountOption> {
    let mut options = vec![
        MountOption::FSName(config.fs_name.clone()),
        MountOption::Subtype(crate::config::APP_NAME.to_string()),
    ];
    if config.allow_other {
        options.push(MountOption::AllowOther);
    }
    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    options
}

/// Mount `translator` at `mount_point` on a background FUSE session.
///
/// The filesystem stays mounted until the returned session is joined or
/// dropped.
pub fn mount(
    translator: Arc<Translator>,
    mount_point: &Path,
    config: &MountConfig,
    cache: CacheConfig,
    runtime: Handle,
) -> Result<BackgroundSession, MountError> {
    if !mount_point.exists() {
        return Err(MountError::MountPointNotFound(mount_point.to_path_buf()));
    }
    if !mount_point.is_dir() {
        return Err(MountError::NotADirectory(mount_point.to_path_buf()));
    }

    let fs = PathFs::new(translator, runtime, cache);
    let options = mount_options(config);
    let session =
        fuser::spawn_mount2(fs, mount_point, &options).map_err(|source| MountError::Mount {
            path: mount_point.to_path_buf(),
            source,
        })?;

    info!(mount_point = %mount_point.display(), fs_name = %config.fs_name, "mounted");
    Ok(session)
}
