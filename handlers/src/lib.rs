//! # Handlers
//!
//! This crate defines the in-memory objects a database hands out.
//!
//! ## Philosophy
//!
//! **A handler is a typed view of one resource, not the resource itself.**
//!
//! Handlers know how to read and write their own key, and record when they
//! were loaded and when they were changed. Deciding *when* to read or write
//! is left to the database that owns them.
//!
//! ## Design
//!
//! - **Handler**: key, owning database, `timestamp`/`dirty` state, payload
//! - **HandlerClass**: how bytes become a payload (File, Text, Json, Folder)
//! - **Registry**: picks the class for a mimetype, process-wide
//! - **No back-pointers**: a handler stores its key; parents are found by key

pub mod error;
pub mod handler;
pub mod payload;
pub mod registry;

pub use error::{HandlerError, HandlerResult};
pub use handler::{DatabaseId, Handler, HandlerRef, HandlerState};
pub use payload::{
    ClassKind, DecodeFn, FolderListing, HandlerClass, Payload, FILE, FOLDER, JSON, TEXT,
};
pub use registry::{
    get_handler_class, get_handler_class_by_mimetype, override_handler_class,
    register_handler_class,
};
