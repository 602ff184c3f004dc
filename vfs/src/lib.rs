//! # Virtual File System
//!
//! This crate gives every storage backend the same face.
//!
//! ## Philosophy
//!
//! **A key names a resource, whatever holds it.**
//!
//! Callers never pick a backend. They hand over a key (`file:///tmp/x`,
//! `mem:/notes`, `http://host/doc`) and the scheme picks the backend.
//!
//! ## Design
//!
//! - **FileSystem**: the backend trait, primitive operations plus defaults
//! - **Registry**: scheme to backend table, process-wide
//! - **api**: the same operations over plain string keys
//! - **Backends**: local disk, memory, tar archives, read-only HTTP
//! - **FailingFs**: wraps a backend and injects write failures

pub mod api;
pub mod archive;
pub mod base;
pub mod error;
pub mod failing;
pub mod http;
pub mod lfs;
pub mod memfs;
pub mod mimetypes;
pub mod registry;

pub use archive::ArchiveFs;
pub use base::{child_reference, copy_across, FileSystem, OpenMode, ReadOnlyStream, Stream};
pub use error::{ErrorKind, FsError, FsResult};
pub use failing::{FailingFs, FailurePolicy};
pub use http::HttpFs;
pub use lfs::LocalFs;
pub use memfs::{MemDir, MemFile, MemFs, MemNode};
pub use mimetypes::{guess_mimetype, DEFAULT_MIMETYPE, FOLDER_MIMETYPE};
pub use registry::{get_file_system, register_file_system, unregister_file_system};

/// Modification times, in UTC
pub type Timestamp = chrono::DateTime<chrono::Utc>;
