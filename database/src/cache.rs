//! LRU of handlers by key

use crate::error::{DatabaseError, DatabaseResult};
use crate::keys::is_descendant;
use handlers::{Handler, HandlerRef};
use log::{debug, warn};
use lru::LruCache;
use std::cell::{Ref, RefMut};
use std::rc::Rc;

/// Borrows a handler, failing instead of panicking when a caller holds it
pub fn borrow_handler<'a>(key: &str, handler: &'a HandlerRef) -> DatabaseResult<Ref<'a, Handler>> {
    handler
        .try_borrow()
        .map_err(|_| DatabaseError::Busy(key.to_string()))
}

pub fn borrow_handler_mut<'a>(
    key: &str,
    handler: &'a HandlerRef,
) -> DatabaseResult<RefMut<'a, Handler>> {
    handler
        .try_borrow_mut()
        .map_err(|_| DatabaseError::Busy(key.to_string()))
}

/// Only the cache holds it, it is not pinned and has no pending change
fn is_evictable(handler: &HandlerRef) -> bool {
    if Rc::strong_count(handler) > 1 {
        return false;
    }
    match handler.try_borrow() {
        Ok(handler) => !handler.is_pinned() && handler.dirty().is_none(),
        Err(_) => false,
    }
}

/// Handlers by normalized key, most recently used first
///
/// Folders are never stored here.
pub struct HandlerCache {
    entries: LruCache<String, HandlerRef>,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Looks a handler up without touching the recency order
    pub fn peek(&self, key: &str) -> Option<HandlerRef> {
        self.entries.peek(key).cloned()
    }

    /// Looks a handler up and marks it most recently used
    pub fn get(&mut self, key: &str) -> Option<HandlerRef> {
        self.entries.get(key).cloned()
    }

    pub fn promote(&mut self, key: &str) {
        self.entries.promote(key);
    }

    pub fn insert(&mut self, key: String, handler: HandlerRef) -> Option<HandlerRef> {
        self.entries.put(key, handler)
    }

    pub fn remove(&mut self, key: &str) -> Option<HandlerRef> {
        self.entries.pop(key)
    }

    /// Removes a handler and drops its payload and binding
    pub fn discard(&mut self, key: &str) -> Option<HandlerRef> {
        let handler = self.entries.pop(key)?;
        match handler.try_borrow_mut() {
            Ok(mut handler) => handler.invalidate(),
            Err(_) => warn!("discarded handler {} is still borrowed", key),
        }
        Some(handler)
    }

    /// Discards `key` and every cached key below it
    pub fn discard_under(&mut self, key: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .map(|(cached, _)| cached)
            .filter(|cached| *cached == key || is_descendant(cached, key))
            .cloned()
            .collect();
        for cached in &doomed {
            self.discard(cached);
        }
        doomed.len()
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().rev().map(|(key, _)| key.clone()).collect()
    }

    /// Evicts least recently used handlers until at most `size_min` remain
    ///
    /// Handlers held outside the cache, pinned or carrying changes stay, so
    /// the cache may end up above `size_min`. Returns the number evicted.
    pub fn make_room(&mut self, size_min: usize) -> usize {
        if self.entries.len() <= size_min {
            return 0;
        }
        let candidates: Vec<String> = self
            .entries
            .iter()
            .rev()
            .filter(|(_, handler)| is_evictable(handler))
            .map(|(key, _)| key.clone())
            .collect();

        let mut evicted = 0;
        for key in candidates {
            if self.entries.len() <= size_min {
                break;
            }
            if self.discard(&key).is_some() {
                evicted += 1;
            }
        }
        debug!(
            "evicted {} handlers, {} left in cache",
            evicted,
            self.entries.len()
        );
        evicted
    }
}

impl Default for HandlerCache {
    fn default() -> Self {
        Self::new()
    }
}
