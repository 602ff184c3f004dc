//! # Handler state machine
//!
//! A handler is the typed, in-memory image of one resource. Two optional
//! timestamps carry its whole state:
//!
//! | `timestamp` | `dirty` | state    |
//! |-------------|---------|----------|
//! | unset       | unset   | Phantom  |
//! | unset       | set     | New      |
//! | set         | unset   | Clean    |
//! | set         | set     | Modified |
//!
//! The payload is loaded lazily: a Phantom handler reads its key the first
//! time the payload is asked for.

use crate::error::{HandlerError, HandlerResult};
use crate::payload::{FolderListing, HandlerClass, Payload, FILE, FOLDER, JSON, TEXT};
use chrono::Utc;
use log::debug;
use std::any::type_name;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;
use uuid::Uuid;
use vfs::{api, FsError, OpenMode, Timestamp};

/// Identifies the database a handler is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId(Uuid);

impl DatabaseId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DatabaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four states given by (`timestamp`, `dirty`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerState {
    /// Allocated, payload not loaded yet
    Phantom,
    /// Created in memory, not on the backend yet
    New,
    /// Loaded and unchanged
    Clean,
    /// Loaded and changed in memory
    Modified,
}

/// Shared handle given out by databases
pub type HandlerRef = Rc<RefCell<Handler>>;

#[derive(Debug)]
pub struct Handler {
    key: Option<String>,
    database: Option<DatabaseId>,
    timestamp: Option<Timestamp>,
    dirty: Option<Timestamp>,
    class: &'static HandlerClass,
    payload: Option<Box<dyn Payload>>,
    pins: usize,
}

impl Handler {
    /// A detached handler holding `payload`, ready to be set into a database
    pub fn new(class: &'static HandlerClass, payload: Box<dyn Payload>) -> Self {
        Self {
            key: None,
            database: None,
            timestamp: None,
            dirty: Some(Utc::now()),
            class,
            payload: Some(payload),
            pins: 0,
        }
    }

    pub fn file(data: impl Into<Vec<u8>>) -> Self {
        Self::new(&FILE, Box::new(data.into()))
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(&TEXT, Box::new(text.into()))
    }

    pub fn json(value: serde_json::Value) -> Self {
        Self::new(&JSON, Box::new(value))
    }

    /// A Phantom handler bound to `key`; nothing is read until needed
    pub fn phantom(key: &str, database: DatabaseId, class: &'static HandlerClass) -> Self {
        Self {
            key: Some(key.to_string()),
            database: Some(database),
            timestamp: None,
            dirty: None,
            class,
            payload: None,
            pins: 0,
        }
    }

    /// A folder handler with an already computed listing
    pub fn folder(key: &str, database: DatabaseId, names: Vec<String>) -> Self {
        Self {
            payload: Some(Box::new(FolderListing::new(names))),
            ..Self::phantom(key, database, &FOLDER)
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn database(&self) -> Option<DatabaseId> {
        self.database
    }

    pub fn timestamp(&self) -> Option<Timestamp> {
        self.timestamp
    }

    pub fn dirty(&self) -> Option<Timestamp> {
        self.dirty
    }

    pub fn class(&self) -> &'static HandlerClass {
        self.class
    }

    pub fn is_folder(&self) -> bool {
        self.class.is_folder()
    }

    /// Not bound to any key or database
    pub fn is_detached(&self) -> bool {
        self.key.is_none() && self.database.is_none()
    }

    pub fn is_loaded(&self) -> bool {
        self.payload.is_some()
    }

    pub fn state(&self) -> HandlerState {
        match (self.timestamp, self.dirty) {
            (None, None) => HandlerState::Phantom,
            (None, Some(_)) => HandlerState::New,
            (Some(_), None) => HandlerState::Clean,
            (Some(_), Some(_)) => HandlerState::Modified,
        }
    }

    fn bound_key(&self) -> HandlerResult<String> {
        self.key.clone().ok_or(HandlerError::Detached)
    }

    /// Reads the payload from the bound key
    ///
    /// Leaves the handler Clean, stamped with the backend mtime.
    pub fn load_state(&mut self) -> HandlerResult<()> {
        let key = self.bound_key()?;
        let payload: Box<dyn Payload> = if self.class.is_folder() {
            Box::new(FolderListing::new(api::get_names(&key)?))
        } else {
            self.class.decode(&key, api::read_bytes(&key)?)?
        };
        self.payload = Some(payload);
        self.timestamp = Some(api::get_mtime(&key)?);
        self.dirty = None;
        debug!("loaded {} as {}", key, self.class);
        Ok(())
    }

    /// Loads the payload unless it is already in memory
    pub fn ensure_loaded(&mut self) -> HandlerResult<()> {
        if self.payload.is_none() {
            self.load_state()?;
        }
        Ok(())
    }

    /// Writes the payload back to the bound key
    ///
    /// Leaves the handler Clean, stamped with the backend mtime.
    pub fn save_state(&mut self) -> HandlerResult<()> {
        let key = self.bound_key()?;
        self.ensure_loaded()?;
        if self.class.is_folder() {
            if !api::is_folder(&key)? {
                api::make_folder(&key)?;
            }
        } else {
            let data = self.encode()?;
            let stream = if api::is_file(&key)? {
                api::open(&key, OpenMode::Write)?
            } else {
                self.clear_target(&key)?;
                api::make_file(&key)?
            };
            write_all(&key, stream, &data)?;
        }
        self.mark_saved(api::get_mtime(&key)?);
        Ok(())
    }

    /// Writes the payload to another key, keeping the current binding
    ///
    /// The target must be free; an empty folder in the way is removed first.
    pub fn save_state_to(&mut self, key: &str) -> HandlerResult<()> {
        self.ensure_loaded()?;
        if self.class.is_folder() {
            api::make_folder(key)?;
            return Ok(());
        }
        let data = self.encode()?;
        self.clear_target(key)?;
        let stream = api::make_file(key)?;
        write_all(key, stream, &data)?;
        debug!("saved {} to {}", self.key.as_deref().unwrap_or("<detached>"), key);
        Ok(())
    }

    fn encode(&self) -> HandlerResult<Vec<u8>> {
        match &self.payload {
            Some(payload) => payload.to_bytes(),
            None => Err(HandlerError::Detached),
        }
    }

    fn clear_target(&self, key: &str) -> HandlerResult<()> {
        if api::is_folder(key)? {
            if !api::get_names(key)?.is_empty() {
                return Err(FsError::IsADirectory(key.to_string()).into());
            }
            api::remove(key)?;
        }
        Ok(())
    }

    /// A detached copy in the New state
    pub fn clone_detached(&mut self) -> HandlerResult<Handler> {
        self.ensure_loaded()?;
        let payload = match &self.payload {
            Some(payload) => payload.clone_payload(),
            None => return Err(HandlerError::Detached),
        };
        Ok(Handler::new(self.class, payload))
    }

    /// Drops the payload; the next access reloads it
    pub fn abort_changes(&mut self) {
        self.payload = None;
        self.timestamp = None;
        self.dirty = None;
    }

    /// Drops the payload and the binding
    pub fn invalidate(&mut self) {
        self.abort_changes();
        self.key = None;
        self.database = None;
    }

    pub fn bind(&mut self, key: &str, database: DatabaseId) {
        self.key = Some(key.to_string());
        self.database = Some(database);
    }

    /// Rebinds to `key` as a New handler, keeping the payload
    pub fn reparent(&mut self, key: &str) {
        self.key = Some(key.to_string());
        self.timestamp = None;
        self.dirty = Some(Utc::now());
    }

    /// Records an in-memory change
    pub fn touch(&mut self) {
        self.dirty = Some(Utc::now());
    }

    /// Records that the backend now holds the payload, as of `timestamp`
    pub fn mark_saved(&mut self, timestamp: Timestamp) {
        self.timestamp = Some(timestamp);
        self.dirty = None;
    }

    pub fn pin(&mut self) {
        self.pins += 1;
    }

    pub fn unpin(&mut self) {
        self.pins = self.pins.saturating_sub(1);
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    fn wrong_type<T>(&self) -> HandlerError {
        HandlerError::WrongType {
            key: self.key.clone(),
            class: self.class.name,
            expected: type_name::<T>(),
        }
    }

    /// The payload as a `T`, loading it first if needed
    pub fn payload<T: Payload>(&mut self) -> HandlerResult<&T> {
        self.ensure_loaded()?;
        let wrong_type = self.wrong_type::<T>();
        self.payload
            .as_deref()
            .and_then(|payload| payload.as_any().downcast_ref::<T>())
            .ok_or(wrong_type)
    }

    /// Mutable access to the payload
    ///
    /// Databases do not notice direct changes; touch the handler through
    /// the database before changing it.
    pub fn payload_mut<T: Payload>(&mut self) -> HandlerResult<&mut T> {
        self.ensure_loaded()?;
        let wrong_type = self.wrong_type::<T>();
        self.payload
            .as_deref_mut()
            .and_then(|payload| payload.as_any_mut().downcast_mut::<T>())
            .ok_or(wrong_type)
    }

    /// Replaces the payload outright
    pub fn set_payload(&mut self, payload: Box<dyn Payload>) {
        self.payload = Some(payload);
    }

    pub fn get_text(&mut self) -> HandlerResult<&str> {
        self.payload::<String>().map(String::as_str)
    }

    pub fn get_bytes(&mut self) -> HandlerResult<&[u8]> {
        self.payload::<Vec<u8>>().map(Vec::as_slice)
    }

    pub fn get_json(&mut self) -> HandlerResult<&serde_json::Value> {
        self.payload::<serde_json::Value>()
    }

    /// Child names of a folder handler
    pub fn get_names(&mut self) -> HandlerResult<Vec<String>> {
        Ok(self.payload::<FolderListing>()?.names().to_vec())
    }

    pub fn into_ref(self) -> HandlerRef {
        Rc::new(RefCell::new(self))
    }
}

fn write_all(key: &str, mut stream: Box<dyn vfs::Stream>, data: &[u8]) -> HandlerResult<()> {
    stream
        .write_all(data)
        .and_then(|()| stream.flush())
        .map_err(|e| FsError::from_io(key, e))?;
    Ok(())
}
