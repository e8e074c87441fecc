//! Error taxonomy shared by every backend and the router.

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsResult<T> = Result<T, FsError>;

/// Filesystem operation errors.
///
/// Backends return these unchanged; the router never rewraps them. Host I/O
/// errors map into the taxonomy via `From<std::io::Error>`.
#[derive(Debug, Clone, Error)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("operation not supported: {0}")]
    Unsupported(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => FsError::NotFound(err.to_string()),
            ErrorKind::AlreadyExists => FsError::AlreadyExists(err.to_string()),
            ErrorKind::PermissionDenied => FsError::PermissionDenied(err.to_string()),
            ErrorKind::IsADirectory => FsError::IsDirectory(err.to_string()),
            ErrorKind::NotADirectory => FsError::NotDirectory(err.to_string()),
            ErrorKind::InvalidInput => FsError::InvalidArgument(err.to_string()),
            ErrorKind::DirectoryNotEmpty => FsError::InvalidArgument(err.to_string()),
            ErrorKind::Unsupported => FsError::Unsupported(err.to_string()),
            _ => FsError::Internal(err.to_string()),
        }
    }
}
