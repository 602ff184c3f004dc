//! Scheme to backend registry
//!
//! The table is process-wide. `file`, `mem`, `http` and `https` are
//! registered on first use; anything else (archive mounts, scratch memory
//! filesystems) is added with [`register_file_system`].

use crate::base::FileSystem;
use crate::error::{FsError, FsResult};
use crate::http::HttpFs;
use crate::lfs::LocalFs;
use crate::memfs::MemFs;
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

type Registry = HashMap<String, Arc<dyn FileSystem>>;

static FILE_SYSTEMS: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry: Registry = HashMap::new();
    let http: Arc<dyn FileSystem> = Arc::new(HttpFs::new());
    registry.insert("file".to_string(), Arc::new(LocalFs::new()));
    registry.insert("mem".to_string(), Arc::new(MemFs::new()));
    registry.insert("http".to_string(), Arc::clone(&http));
    registry.insert("https".to_string(), http);
    RwLock::new(registry)
});

/// Binds `scheme` to a backend, returning the backend it replaces
pub fn register_file_system(
    scheme: &str,
    file_system: Arc<dyn FileSystem>,
) -> Option<Arc<dyn FileSystem>> {
    debug!("registering file system for scheme {:?}", scheme);
    FILE_SYSTEMS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(scheme.to_ascii_lowercase(), file_system)
}

pub fn unregister_file_system(scheme: &str) -> Option<Arc<dyn FileSystem>> {
    FILE_SYSTEMS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&scheme.to_ascii_lowercase())
}

/// The backend bound to `scheme`
pub fn get_file_system(scheme: &str) -> FsResult<Arc<dyn FileSystem>> {
    FILE_SYSTEMS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&scheme.to_ascii_lowercase())
        .cloned()
        .ok_or_else(|| FsError::UnknownScheme(scheme.to_string()))
}
