//! Payloads and handler classes
//!
//! A handler class says how the bytes of a resource become an in-memory
//! payload and back. Four classes ship with the crate:
//!
//! | class    | payload             | registered for                   |
//! |----------|---------------------|----------------------------------|
//! | `File`   | `Vec<u8>`           | `application/octet-stream`       |
//! | `Text`   | `String`            | `text/*`                         |
//! | `Json`   | `serde_json::Value` | `application/json`               |
//! | `Folder` | [`FolderListing`]   | `application/x-not-regular-file` |

use crate::error::{HandlerError, HandlerResult};
use std::any::Any;
use std::fmt;
use vfs::{DEFAULT_MIMETYPE, FOLDER_MIMETYPE};

/// The in-memory form of a resource
pub trait Payload: Any + fmt::Debug {
    /// Serializes the payload for the backend
    fn to_bytes(&self) -> HandlerResult<Vec<u8>>;

    fn clone_payload(&self) -> Box<dyn Payload>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl Payload for Vec<u8> {
    fn to_bytes(&self) -> HandlerResult<Vec<u8>> {
        Ok(self.clone())
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Payload for String {
    fn to_bytes(&self) -> HandlerResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Payload for serde_json::Value {
    fn to_bytes(&self) -> HandlerResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| HandlerError::Encode {
            class: JSON.name,
            message: e.to_string(),
        })
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sorted names of the entries of a folder
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderListing {
    names: Vec<String>,
}

impl FolderListing {
    pub fn new(mut names: Vec<String>) -> Self {
        names.sort();
        names.dedup();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.binary_search_by(|n| n.as_str().cmp(name)).is_ok()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Payload for FolderListing {
    /// Folders have no byte form
    fn to_bytes(&self) -> HandlerResult<Vec<u8>> {
        Ok(Vec::new())
    }

    fn clone_payload(&self) -> Box<dyn Payload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Whether instances of a class are stored as files or folders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    File,
    Folder,
}

/// Builds a payload out of the bytes stored at a key
pub type DecodeFn = fn(key: &str, data: Vec<u8>) -> HandlerResult<Box<dyn Payload>>;

/// A handler variant
///
/// Classes live for the whole process; register custom ones as `static`
/// items.
pub struct HandlerClass {
    pub name: &'static str,
    pub kind: ClassKind,
    /// Mimetype reported for resources of this class that only exist in memory
    pub mimetype: &'static str,
    decode: DecodeFn,
}

impl HandlerClass {
    pub const fn new(
        name: &'static str,
        kind: ClassKind,
        mimetype: &'static str,
        decode: DecodeFn,
    ) -> Self {
        Self {
            name,
            kind,
            mimetype,
            decode,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.kind == ClassKind::Folder
    }

    pub fn decode(&self, key: &str, data: Vec<u8>) -> HandlerResult<Box<dyn Payload>> {
        (self.decode)(key, data)
    }
}

impl fmt::Debug for HandlerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerClass")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("mimetype", &self.mimetype)
            .finish()
    }
}

impl PartialEq for HandlerClass {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || self.name == other.name
    }
}

impl Eq for HandlerClass {}

impl fmt::Display for HandlerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn decode_file(_key: &str, data: Vec<u8>) -> HandlerResult<Box<dyn Payload>> {
    Ok(Box::new(data))
}

fn decode_text(key: &str, data: Vec<u8>) -> HandlerResult<Box<dyn Payload>> {
    let text = String::from_utf8(data).map_err(|e| HandlerError::Decode {
        key: key.to_string(),
        class: TEXT.name,
        message: e.to_string(),
    })?;
    Ok(Box::new(text))
}

fn decode_json(key: &str, data: Vec<u8>) -> HandlerResult<Box<dyn Payload>> {
    let value: serde_json::Value =
        serde_json::from_slice(&data).map_err(|e| HandlerError::Decode {
            key: key.to_string(),
            class: JSON.name,
            message: e.to_string(),
        })?;
    Ok(Box::new(value))
}

fn decode_folder(key: &str, _data: Vec<u8>) -> HandlerResult<Box<dyn Payload>> {
    Err(HandlerError::Decode {
        key: key.to_string(),
        class: FOLDER.name,
        message: "folders are listed, not read".to_string(),
    })
}

/// Opaque bytes; the default class
pub static FILE: HandlerClass =
    HandlerClass::new("File", ClassKind::File, DEFAULT_MIMETYPE, decode_file);

/// UTF-8 text
pub static TEXT: HandlerClass =
    HandlerClass::new("Text", ClassKind::File, "text/plain", decode_text);

/// A JSON document
pub static JSON: HandlerClass =
    HandlerClass::new("Json", ClassKind::File, "application/json", decode_json);

pub static FOLDER: HandlerClass =
    HandlerClass::new("Folder", ClassKind::Folder, FOLDER_MIMETYPE, decode_folder);
