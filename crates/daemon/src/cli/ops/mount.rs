use std::fmt;
use std::path::PathBuf;

use clap::Args;

use pathfs_daemon::FsError;

use crate::cli::op::{Op, OpContext};

#[derive(Args, Debug, Clone)]
pub struct Mount {
    /// Empty directory to mount the filesystem at
    pub mountpoint: PathBuf,
}

#[derive(Debug)]
pub struct MountOutput {
    pub mountpoint: PathBuf,
}

impl fmt::Display for MountOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unmounted {}", self.mountpoint.display())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[cfg(feature = "fuse")]
    #[error(transparent)]
    Mount(#[from] pathfs_daemon::fuse::MountError),
    #[error("failed to wait for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
    #[error("FUSE support not compiled in; rebuild with --features fuse")]
    Unsupported,
}

#[async_trait::async_trait]
impl Op for Mount {
    type Error = MountError;
    type Output = MountOutput;

    #[cfg(feature = "fuse")]
    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        use std::sync::Arc;

        let translator = Arc::new(ctx.translator().await?);
        let session = pathfs_daemon::fuse::mount(
            translator.clone(),
            &self.mountpoint,
            &ctx.config.mount,
            ctx.config.cache.clone(),
            tokio::runtime::Handle::current(),
        )?;

        tracing::info!(
            mountpoint = %self.mountpoint.display(),
            database = %ctx.config.database_path.display(),
            "serving filesystem, press Ctrl-C to unmount"
        );
        tokio::signal::ctrl_c().await?;

        tracing::info!("shutdown signal received, unmounting");
        // Joining unmounts and waits for in-flight callbacks to finish
        tokio::task::spawn_blocking(move || session.join())
            .await
            .map_err(|e| MountError::Signal(std::io::Error::other(e)))?;
        translator.database().close().await;

        Ok(MountOutput {
            mountpoint: self.mountpoint.clone(),
        })
    }

    #[cfg(not(feature = "fuse"))]
    async fn execute(&self, _ctx: &OpContext) -> Result<Self::Output, Self::Error> {
        tracing::warn!(mountpoint = %self.mountpoint.display(), "built without FUSE support");
        Err(MountError::Unsupported)
    }
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount {}", self.mountpoint.display())
    }
}
