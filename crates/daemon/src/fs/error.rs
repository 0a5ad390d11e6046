use libc::c_int;
use record_store::StoreError;

/// Failure of a filesystem operation.
///
/// [`FsError::errno`] is the only place these are turned into kernel error
/// codes.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("operation not permitted: {0}")]
    NotPermitted(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("resource busy: {0}")]
    Busy(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("file too large: {0}")]
    FileTooLarge(String),

    #[error("bad file handle: {0}")]
    BadHandle(u64),

    #[error("record store failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for FsError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(path) => FsError::AlreadyExists(path),
            other => FsError::Store(other),
        }
    }
}

impl FsError {
    /// POSIX error code reported to the kernel.
    pub fn errno(&self) -> c_int {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::AlreadyExists(_) => libc::EEXIST,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::NotPermitted(_) => libc::EPERM,
            FsError::NotEmpty(_) => libc::ENOTEMPTY,
            FsError::NotADirectory(_) => libc::ENOTDIR,
            FsError::IsADirectory(_) => libc::EISDIR,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::Busy(_) => libc::EBUSY,
            FsError::Unsupported(_) => libc::ENOTSUP,
            FsError::FileTooLarge(_) => libc::EFBIG,
            FsError::BadHandle(_) => libc::EBADF,
            FsError::Store(_) => libc::EIO,
        }
    }

    /// Whether this is an internal failure rather than an expected outcome
    /// of the caller's request.
    pub fn is_internal(&self) -> bool {
        matches!(self, FsError::Store(_))
    }
}
