//! Filesystem errors

use std::fmt;
use std::io;
use thiserror::Error;

/// Error categories shared by every layer of the cache
///
/// `Display` prints the wire name (`NotFound`, `Conflict`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    PermissionDenied,
    /// The filesystem changed under a modified handler
    Conflict,
    UnsupportedMode,
    InvalidKey,
    /// Any other backend failure
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::AlreadyExists => "AlreadyExists",
            ErrorKind::NotADirectory => "NotADirectory",
            ErrorKind::IsADirectory => "IsADirectory",
            ErrorKind::PermissionDenied => "PermissionDenied",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::UnsupportedMode => "UnsupportedMode",
            ErrorKind::InvalidKey => "InvalidKey",
            ErrorKind::Io => "Io",
        };
        write!(f, "{}", name)
    }
}

/// Errors returned by filesystem backends
#[derive(Debug, Error)]
pub enum FsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The backend cannot perform the operation (an open mode, a native rename)
    #[error("Operation {operation} not supported on {key}")]
    Unsupported { key: String, operation: String },

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("No file system registered for scheme {0:?}")]
    UnknownScheme(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("HTTP error on {key}: {message}")]
    Http { key: String, message: String },
}

impl FsError {
    /// Maps an `std::io::Error` raised while working on `key`
    pub fn from_io(key: impl fmt::Display, error: io::Error) -> Self {
        let key = key.to_string();
        match error.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(key),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(key),
            io::ErrorKind::PermissionDenied => FsError::PermissionDenied(key),
            _ => match error.raw_os_error() {
                Some(20) => FsError::NotADirectory(key),
                Some(21) => FsError::IsADirectory(key),
                _ => FsError::Io { key, source: error },
            },
        }
    }

    pub fn unsupported(key: impl fmt::Display, operation: impl Into<String>) -> Self {
        FsError::Unsupported {
            key: key.to_string(),
            operation: operation.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FsError::NotFound(_) => ErrorKind::NotFound,
            FsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            FsError::NotADirectory(_) => ErrorKind::NotADirectory,
            FsError::IsADirectory(_) => ErrorKind::IsADirectory,
            FsError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            FsError::Unsupported { .. } => ErrorKind::UnsupportedMode,
            FsError::InvalidKey(_) | FsError::UnknownScheme(_) => ErrorKind::InvalidKey,
            FsError::Io { .. } | FsError::Http { .. } => ErrorKind::Io,
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
