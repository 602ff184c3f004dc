//! Key-based operations dispatched to the backend of each scheme
//!
//! Keys are strings. Relative keys and bare host paths are made absolute
//! against the working directory first, so `/tmp/x` means `file:///tmp/x`.

use crate::base::{child_reference, copy_across, FileSystem, OpenMode, Stream};
use crate::error::{FsError, FsResult};
use crate::registry::get_file_system;
use crate::Timestamp;
use log::debug;
use std::io::Read;
use std::sync::Arc;
use uri::Reference;

/// The backend in charge of `key`, and `key` as an absolute reference
pub fn get_layer_and_reference(key: &str) -> FsResult<(Arc<dyn FileSystem>, Reference)> {
    let reference = uri::get_absolute_reference(key, None)
        .map_err(|e| FsError::InvalidKey(format!("{}: {}", key, e)))?;
    let layer = get_file_system(&reference.scheme)?;
    Ok((layer, reference))
}

pub fn exists(key: &str) -> FsResult<bool> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.exists(&reference))
}

pub fn is_file(key: &str) -> FsResult<bool> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.is_file(&reference))
}

pub fn is_folder(key: &str) -> FsResult<bool> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.is_folder(&reference))
}

pub fn get_names(key: &str) -> FsResult<Vec<String>> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.get_names(&reference)
}

pub fn get_mtime(key: &str) -> FsResult<Timestamp> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.get_mtime(&reference)
}

pub fn get_size(key: &str) -> FsResult<u64> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.get_size(&reference)
}

pub fn get_mimetype(key: &str) -> FsResult<String> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.get_mimetype(&reference)
}

pub fn make_file(key: &str) -> FsResult<Box<dyn Stream>> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.make_file(&reference)
}

pub fn make_folder(key: &str) -> FsResult<()> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.make_folder(&reference)
}

pub fn open(key: &str, mode: OpenMode) -> FsResult<Box<dyn Stream>> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.open(&reference, mode)
}

pub fn remove(key: &str) -> FsResult<()> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.remove(&reference)
}

/// Reads a whole file
pub fn read_bytes(key: &str) -> FsResult<Vec<u8>> {
    let mut stream = open(key, OpenMode::Read)?;
    let mut data = Vec::new();
    stream
        .read_to_end(&mut data)
        .map_err(|e| FsError::from_io(key, e))?;
    Ok(data)
}

/// Copies `source` to `target`, which may live on another backend
pub fn copy(source: &str, target: &str) -> FsResult<()> {
    let (source_layer, source_reference) = get_layer_and_reference(source)?;
    let (target_layer, target_reference) = get_layer_and_reference(target)?;
    if Arc::ptr_eq(&source_layer, &target_layer) {
        return source_layer.copy(&source_reference, &target_reference);
    }
    if target_layer.exists(&target_reference) {
        return Err(FsError::AlreadyExists(target_reference.to_string()));
    }
    copy_across(
        &*source_layer,
        &source_reference,
        &*target_layer,
        &target_reference,
    )
}

/// Moves `source` to `target`, or into `target` when it is a folder
///
/// Inside one backend this is the backend's own move. Across backends the
/// resource is copied, then removed from the source.
pub fn move_to(source: &str, target: &str) -> FsResult<()> {
    let (source_layer, source_reference) = get_layer_and_reference(source)?;
    let (target_layer, mut target_reference) = get_layer_and_reference(target)?;
    if Arc::ptr_eq(&source_layer, &target_layer) {
        return source_layer.move_to(&source_reference, &target_reference);
    }

    if target_layer.is_folder(&target_reference) {
        let name = source_layer.get_basename(&source_reference);
        target_reference = child_reference(&target_reference, &name);
    }
    debug!(
        "moving {} to {} across backends",
        source_reference, target_reference
    );
    copy_across(
        &*source_layer,
        &source_reference,
        &*target_layer,
        &target_reference,
    )?;
    source_layer.remove(&source_reference)
}

pub fn traverse(key: &str) -> FsResult<Vec<Reference>> {
    let (layer, reference) = get_layer_and_reference(key)?;
    layer.traverse(&reference)
}

/// The canonical string form of `key`
pub fn normalize_key(key: &str) -> FsResult<String> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.normalize_key(&reference).to_string())
}

pub fn get_basename(key: &str) -> FsResult<String> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.get_basename(&reference))
}

pub fn get_path(key: &str) -> FsResult<String> {
    let (layer, reference) = get_layer_and_reference(key)?;
    Ok(layer.get_path(&reference))
}

pub fn resolve(base: &str, reference: &str) -> FsResult<String> {
    let (layer, base) = get_layer_and_reference(base)?;
    Ok(layer.resolve(&base, reference).to_string())
}

pub fn resolve2(base: &str, reference: &str) -> FsResult<String> {
    let (layer, base) = get_layer_and_reference(base)?;
    Ok(layer.resolve2(&base, reference).to_string())
}
