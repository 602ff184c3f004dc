//! Read-only database
//!
//! Every lookup first checks the cached handler against the backend:
//!
//! | state    | backend missing | mtime <= timestamp | mtime > timestamp |
//! |----------|-----------------|--------------------|-------------------|
//! | Phantom  | discard         | keep               | keep              |
//! | New      | keep            | conflict           | conflict          |
//! | Clean    | discard         | keep               | discard           |
//! | Modified | conflict        | keep               | conflict          |
//!
//! A discarded handler is reloaded from the backend on the next lookup.

use crate::base::{check_class, Database};
use crate::cache::{borrow_handler, HandlerCache};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};
use handlers::{get_handler_class, DatabaseId, Handler, HandlerClass, HandlerRef};
use log::{debug, warn};
use std::rc::Rc;
use uri::Reference;
use vfs::{api, FsError};

pub struct RoDatabase {
    id: DatabaseId,
    root: Reference,
    config: DatabaseConfig,
    cache: HandlerCache,
}

impl RoDatabase {
    /// Opens a database rooted at `root`, a key or a host path
    pub fn new(root: &str, config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        let root = uri::get_absolute_reference(root, None)
            .map_err(|e| FsError::InvalidKey(format!("{}: {}", root, e)))?;
        debug!("opening database at {}", root);
        Ok(Self {
            id: DatabaseId::new(),
            root,
            config,
            cache: HandlerCache::new(),
        })
    }

    pub fn root(&self) -> &Reference {
        &self.root
    }

    /// Checks the handler cached at `key` against the backend
    ///
    /// `hidden` makes the backend object count as missing; the read-write
    /// database passes it for keys removed in its staging area.
    pub(crate) fn sync_filesystem(
        &mut self,
        key: &str,
        hidden: bool,
    ) -> DatabaseResult<Option<HandlerRef>> {
        let Some(handler) = self.cache.peek(key) else {
            return Ok(None);
        };
        let (timestamp, dirty) = {
            let handler = borrow_handler(key, &handler)?;
            (handler.timestamp(), handler.dirty())
        };
        let mtime = if hidden || !api::exists(key)? {
            None
        } else {
            Some(api::get_mtime(key)?)
        };

        let keep = match (timestamp, dirty, mtime) {
            (None, None, mtime) => mtime.is_some(),
            (None, Some(_), None) => true,
            (None, Some(_), Some(_)) => return Err(conflict(key, "created on the backend")),
            (Some(_), None, None) => false,
            (Some(timestamp), None, Some(mtime)) => mtime <= timestamp,
            (Some(_), Some(_), None) => return Err(conflict(key, "removed from the backend")),
            (Some(timestamp), Some(_), Some(mtime)) => {
                if mtime > timestamp {
                    return Err(conflict(key, "modified on the backend"));
                }
                true
            }
        };
        if keep {
            return Ok(Some(handler));
        }
        debug!("dropping stale handler {}", key);
        self.cache.discard(key);
        Ok(None)
    }

    /// The cached handler at `key`, after checking it against the backend
    pub(crate) fn cached(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
        hidden: bool,
    ) -> DatabaseResult<Option<HandlerRef>> {
        let Some(handler) = self.sync_filesystem(key, hidden)? else {
            return Ok(None);
        };
        self.cache.promote(key);
        check_class(key, &handler, cls)?;
        debug!("cache hit {}", key);
        Ok(Some(handler))
    }

    /// Caches a new Phantom handler for the file at `key`
    pub(crate) fn instantiate(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<HandlerRef> {
        let class = match cls {
            Some(class) => class,
            None => get_handler_class(key)?,
        };
        debug!("cache miss {}, loading as {}", key, class);
        let handler = Handler::phantom(key, self.id, class).into_ref();
        self.insert(key.to_string(), Rc::clone(&handler));
        Ok(handler)
    }

    /// A fresh folder handler; folders are never cached
    pub(crate) fn folder(
        &self,
        key: &str,
        names: Vec<String>,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<HandlerRef> {
        let handler = Handler::folder(key, self.id, names).into_ref();
        check_class(key, &handler, cls)?;
        Ok(handler)
    }

    /// Caches `handler`, evicting when the cache grows past `size_max`
    pub(crate) fn insert(&mut self, key: String, handler: HandlerRef) {
        self.cache.insert(key, handler);
        if self.cache.len() > self.config.size_max {
            self.make_room();
        }
    }

    pub(crate) fn discard(&mut self, key: &str) {
        self.cache.discard(key);
    }

    pub(crate) fn discard_under(&mut self, key: &str) {
        self.cache.discard_under(key);
    }
}

fn conflict(key: &str, reason: &str) -> DatabaseError {
    warn!("conflict on {}: {}", key, reason);
    DatabaseError::Conflict(format!("{} ({})", key, reason))
}

impl Database for RoDatabase {
    fn id(&self) -> DatabaseId {
        self.id
    }

    fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn cache(&self) -> &HandlerCache {
        &self.cache
    }

    fn cache_mut(&mut self) -> &mut HandlerCache {
        &mut self.cache
    }

    fn normalize_key(&self, key: &str) -> DatabaseResult<String> {
        let reference = self.root.resolve2_str(key);
        Ok(api::normalize_key(&reference.to_string())?)
    }

    fn has_handler(&mut self, key: &str) -> DatabaseResult<bool> {
        let key = self.normalize_key(key)?;
        if self.sync_filesystem(&key, false)?.is_some() {
            return Ok(true);
        }
        Ok(api::exists(&key)?)
    }

    fn lookup(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<Option<HandlerRef>> {
        let key = self.normalize_key(key)?;
        if let Some(handler) = self.cached(&key, cls, false)? {
            return Ok(Some(handler));
        }
        if !api::exists(&key)? {
            return Ok(None);
        }
        if api::is_folder(&key)? {
            let names = self.get_handler_names(&key)?;
            return self.folder(&key, names, cls).map(Some);
        }
        self.instantiate(&key, cls).map(Some)
    }

    fn get_handler_names(&mut self, key: &str) -> DatabaseResult<Vec<String>> {
        let key = self.normalize_key(key)?;
        let mut names = api::get_names(&key)?;
        names.sort();
        Ok(names)
    }

    fn get_mimetype(&mut self, key: &str) -> DatabaseResult<String> {
        let key = self.normalize_key(key)?;
        Ok(api::get_mimetype(&key)?)
    }

    /// Nothing is ever staged here; only trims the cache
    fn abort_changes(&mut self) {
        self.make_room();
    }
}
