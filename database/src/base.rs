//! Read API shared by both database flavors

use crate::cache::{borrow_handler, borrow_handler_mut, HandlerCache};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};
use crate::keys::join_key;
use handlers::{DatabaseId, HandlerClass, HandlerRef};

/// Fails when `cls` is given and the handler is of another class
pub(crate) fn check_class(
    key: &str,
    handler: &HandlerRef,
    cls: Option<&'static HandlerClass>,
) -> DatabaseResult<()> {
    let Some(expected) = cls else {
        return Ok(());
    };
    let actual = borrow_handler(key, handler)?.class();
    if actual != expected {
        return Err(DatabaseError::WrongClass {
            key: key.to_string(),
            expected: expected.name,
            actual: actual.name,
        });
    }
    Ok(())
}

/// A cache of handlers over a backend
///
/// Keys may be relative; they are resolved against the database root and
/// normalized before use.
pub trait Database {
    fn id(&self) -> DatabaseId;

    fn config(&self) -> &DatabaseConfig;

    fn cache(&self) -> &HandlerCache;

    fn cache_mut(&mut self) -> &mut HandlerCache;

    fn normalize_key(&self, key: &str) -> DatabaseResult<String>;

    fn has_handler(&mut self, key: &str) -> DatabaseResult<bool>;

    /// The handler at `key`, or `None` when nothing is there
    ///
    /// Fails with `Conflict` when the backend changed under a handler with
    /// pending changes, and with `WrongClass` when `cls` does not match.
    fn lookup(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<Option<HandlerRef>>;

    /// Sorted names of the entries of a folder
    fn get_handler_names(&mut self, key: &str) -> DatabaseResult<Vec<String>>;

    fn get_mimetype(&mut self, key: &str) -> DatabaseResult<String>;

    /// Drops pending changes; never fails
    fn abort_changes(&mut self);

    fn get_handler(&mut self, key: &str) -> DatabaseResult<HandlerRef> {
        self.lookup(key, None)?
            .ok_or_else(|| DatabaseError::NotFound(key.to_string()))
    }

    fn get_handler_as(
        &mut self,
        key: &str,
        cls: &'static HandlerClass,
    ) -> DatabaseResult<HandlerRef> {
        self.lookup(key, Some(cls))?
            .ok_or_else(|| DatabaseError::NotFound(key.to_string()))
    }

    /// Like [`Database::get_handler`], with `None` instead of `NotFound`
    fn get_handler_soft(&mut self, key: &str) -> DatabaseResult<Option<HandlerRef>> {
        self.lookup(key, None)
    }

    /// The handlers of every entry of a folder
    fn get_handlers(&mut self, key: &str) -> DatabaseResult<Vec<HandlerRef>> {
        let key = self.normalize_key(key)?;
        let names = self.get_handler_names(&key)?;
        names
            .iter()
            .map(|name| self.get_handler(&join_key(&key, name)))
            .collect()
    }

    /// Number of cached handlers
    fn len(&self) -> usize {
        self.cache().len()
    }

    fn is_empty(&self) -> bool {
        self.cache().is_empty()
    }

    fn contains_cached(&self, key: &str) -> bool {
        self.normalize_key(key)
            .map(|key| self.cache().contains(&key))
            .unwrap_or(false)
    }

    /// Keeps the cached handler at `key` from being evicted
    fn pin(&mut self, key: &str) -> DatabaseResult<()> {
        let key = self.normalize_key(key)?;
        let handler = self
            .cache()
            .peek(&key)
            .ok_or_else(|| DatabaseError::NotFound(key.clone()))?;
        borrow_handler_mut(&key, &handler)?.pin();
        Ok(())
    }

    fn unpin(&mut self, key: &str) -> DatabaseResult<()> {
        let key = self.normalize_key(key)?;
        let handler = self
            .cache()
            .peek(&key)
            .ok_or_else(|| DatabaseError::NotFound(key.clone()))?;
        borrow_handler_mut(&key, &handler)?.unpin();
        Ok(())
    }

    /// Evicts down to `size_min`; returns the number of handlers evicted
    fn make_room(&mut self) -> usize {
        let size_min = self.config().size_min;
        self.cache_mut().make_room(size_min)
    }
}
