//! Database errors

use handlers::HandlerError;
use thiserror::Error;
use vfs::{ErrorKind, FsError};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Fs(#[from] FsError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The backend changed under a handler the cache cannot drop
    #[error("Conflict on {0}")]
    Conflict(String),

    #[error("Handler at {key} is {actual}, not {expected}")]
    WrongClass {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// `set_handler` takes detached handlers only
    #[error("Handler is already bound to {0}")]
    NotDetached(String),

    #[error("Cannot move {key} into itself ({target})")]
    IntoItself { key: String, target: String },

    /// A caller still borrows the handler
    #[error("Handler {0} is in use")]
    Busy(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DatabaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DatabaseError::Fs(error) => error.kind(),
            DatabaseError::Handler(error) => error.kind(),
            DatabaseError::NotFound(_) => ErrorKind::NotFound,
            DatabaseError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            DatabaseError::Conflict(_) | DatabaseError::Busy(_) => ErrorKind::Conflict,
            DatabaseError::WrongClass { .. }
            | DatabaseError::NotDetached(_)
            | DatabaseError::IntoItself { .. }
            | DatabaseError::InvalidConfig(_) => ErrorKind::InvalidKey,
        }
    }
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;
