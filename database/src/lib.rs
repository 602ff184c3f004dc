//! # Database
//!
//! This crate puts a transactional cache of handlers in front of the
//! virtual file system.
//!
//! ## Philosophy
//!
//! **The backend is the source of truth; the cache only remembers.**
//!
//! Every lookup checks the cached handler against the backend mtime, so
//! outside changes are picked up and never silently overwritten. Writes are
//! staged and reach the backend in one commit, or not at all.
//!
//! ## Design
//!
//! - **HandlerCache**: LRU of handlers by key, bounded by `size_min`/`size_max`
//! - **RoDatabase**: lookups with mtime synchronization
//! - **RwDatabase**: set, delete, touch, copy and move, staged until commit
//! - **Staging**: the `old2new`/`new2old` maps describing pending changes
//! - **Commit**: children before parents, blocked renames retried, abort on failure
//! - **Pinning**: explicit `pin`/`unpin` on top of reference counts

pub mod base;
pub mod cache;
pub mod config;
pub mod error;
pub mod keys;
pub mod ro;
pub mod rw;
pub mod staging;

pub use base::Database;
pub use cache::{borrow_handler, borrow_handler_mut, HandlerCache};
pub use config::DatabaseConfig;
pub use error::{DatabaseError, DatabaseResult};
pub use ro::RoDatabase;
pub use rw::RwDatabase;
pub use staging::Staging;
