//! Mimetype to handler class registry
//!
//! Lookup tries the exact mimetype, then the `major/*` registration, then
//! falls back to the `File` class. Registration is first-wins; use
//! [`override_handler_class`] to replace an existing entry.

use crate::error::HandlerResult;
use crate::payload::{HandlerClass, FILE, FOLDER, JSON, TEXT};
use log::debug;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use vfs::{api, DEFAULT_MIMETYPE, FOLDER_MIMETYPE};

type Registry = HashMap<String, &'static HandlerClass>;

static HANDLER_CLASSES: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry: Registry = HashMap::new();
    registry.insert(DEFAULT_MIMETYPE.to_string(), &FILE);
    registry.insert("text/*".to_string(), &TEXT);
    registry.insert("application/json".to_string(), &JSON);
    registry.insert(FOLDER_MIMETYPE.to_string(), &FOLDER);
    RwLock::new(registry)
});

/// Registers `class` for `mimetype` unless another class already has it
///
/// Returns whether the registration took place.
pub fn register_handler_class(mimetype: &str, class: &'static HandlerClass) -> bool {
    let mut registry = HANDLER_CLASSES
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let mimetype = mimetype.to_ascii_lowercase();
    if registry.contains_key(&mimetype) {
        debug!("{} already has a handler class, keeping it", mimetype);
        return false;
    }
    registry.insert(mimetype, class);
    true
}

/// Registers `class` for `mimetype`, returning the class it replaces
pub fn override_handler_class(
    mimetype: &str,
    class: &'static HandlerClass,
) -> Option<&'static HandlerClass> {
    HANDLER_CLASSES
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(mimetype.to_ascii_lowercase(), class)
}

pub fn get_handler_class_by_mimetype(mimetype: &str) -> &'static HandlerClass {
    let registry = HANDLER_CLASSES
        .read()
        .unwrap_or_else(PoisonError::into_inner);
    let mimetype = mimetype.to_ascii_lowercase();
    if let Some(class) = registry.get(&mimetype) {
        return *class;
    }
    if let Some((major, _)) = mimetype.split_once('/') {
        if let Some(class) = registry.get(&format!("{}/*", major)) {
            return *class;
        }
    }
    registry.get(DEFAULT_MIMETYPE).copied().unwrap_or(&FILE)
}

/// The class to instantiate for the resource at `key`
pub fn get_handler_class(key: &str) -> HandlerResult<&'static HandlerClass> {
    if api::is_folder(key)? {
        return Ok(&FOLDER);
    }
    Ok(get_handler_class_by_mimetype(&api::get_mimetype(key)?))
}
