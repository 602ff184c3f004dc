//! Handler errors

use thiserror::Error;
use vfs::{ErrorKind, FsError};

/// Errors raised while loading or saving a handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Fs(#[from] FsError),

    /// The handler has no key (a detached clone)
    #[error("Handler is not bound to a key")]
    Detached,

    #[error("Cannot decode {key} as {class}: {message}")]
    Decode {
        key: String,
        class: &'static str,
        message: String,
    },

    #[error("Cannot encode {class} payload: {message}")]
    Encode {
        class: &'static str,
        message: String,
    },

    /// The payload is not of the requested type
    #[error("Handler {key:?} of class {class} does not hold a {expected}")]
    WrongType {
        key: Option<String>,
        class: &'static str,
        expected: &'static str,
    },
}

impl HandlerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Fs(error) => error.kind(),
            HandlerError::Detached | HandlerError::WrongType { .. } => ErrorKind::InvalidKey,
            HandlerError::Decode { .. } | HandlerError::Encode { .. } => ErrorKind::Io,
        }
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;
