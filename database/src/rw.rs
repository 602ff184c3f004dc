//! Read-write database
//!
//! Changes are staged in memory and reach the backend only on
//! [`RwDatabase::save_changes`]. Until then lookups see the staged view:
//! removed keys are hidden, new and moved handlers are served from the
//! cache, and folder listings merge both.

use crate::base::Database;
use crate::cache::{borrow_handler, borrow_handler_mut, HandlerCache};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, DatabaseResult};
use crate::keys::{child_name, is_descendant, join_key, parent_key};
use crate::ro::RoDatabase;
use crate::staging::Staging;
use handlers::{DatabaseId, Handler, HandlerClass, HandlerRef};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::rc::Rc;
use vfs::{api, ErrorKind, FsError, FOLDER_MIMETYPE};

/// Outcome of committing one staged source
enum Step {
    Done,
    /// The target is not writable yet; try again after the other sources
    Retry(DatabaseError),
    Fatal(DatabaseError),
}

enum CommitFailure {
    /// A whole pass made no progress; staging is left as it was
    Stalled(DatabaseError),
    Fatal(DatabaseError),
}

fn is_retryable(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Io
            | ErrorKind::AlreadyExists
            | ErrorKind::IsADirectory
            | ErrorKind::NotADirectory
    )
}

pub struct RwDatabase {
    base: RoDatabase,
    staging: Staging,
}

impl RwDatabase {
    pub fn new(root: &str, config: DatabaseConfig) -> DatabaseResult<Self> {
        Ok(Self {
            base: RoDatabase::new(root, config)?,
            staging: Staging::new(),
        })
    }

    pub fn has_changed(&self) -> bool {
        !self.staging.is_empty()
    }

    pub fn staging(&self) -> &Staging {
        &self.staging
    }

    fn virtual_folder(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<Option<HandlerRef>> {
        if !self.staging.has_staged_under(key) {
            return Ok(None);
        }
        let names = self.get_handler_names(key)?;
        self.base.folder(key, names, cls).map(Some)
    }

    /// Fails unless `target` is free and outside `source`
    fn check_target(&mut self, source: &str, target: &str) -> DatabaseResult<()> {
        if target == source || is_descendant(target, source) {
            return Err(DatabaseError::IntoItself {
                key: source.to_string(),
                target: target.to_string(),
            });
        }
        if self.has_handler(target)? {
            return Err(DatabaseError::AlreadyExists(target.to_string()));
        }
        self.check_parents(target)
    }

    /// Fails with `NotADirectory` when a staged or backend file sits above `key`
    fn check_parents(&self, key: &str) -> DatabaseResult<()> {
        let mut current = parent_key(key);
        while let Some(parent) = current {
            // Staged handlers are always files
            let is_file = self.staging.is_staged(parent)
                || (!self.staging.is_hidden(parent) && api::is_file(parent)?);
            if is_file {
                return Err(FsError::NotADirectory(key.to_string()).into());
            }
            current = parent_key(parent);
        }
        Ok(())
    }

    fn is_folder(key: &str, handler: &HandlerRef) -> DatabaseResult<bool> {
        Ok(borrow_handler(key, handler)?.is_folder())
    }

    /// Binds a detached handler to `key` as a new resource
    pub fn set_handler(&mut self, key: &str, mut handler: Handler) -> DatabaseResult<HandlerRef> {
        let key = self.normalize_key(key)?;
        if !handler.is_detached() {
            return Err(DatabaseError::NotDetached(key));
        }
        if handler.is_folder() {
            return Err(FsError::IsADirectory(key).into());
        }
        if self.has_handler(&key)? {
            return Err(DatabaseError::AlreadyExists(key));
        }
        self.check_parents(&key)?;

        handler.bind(&key, self.id());
        if handler.dirty().is_none() {
            handler.touch();
        }
        let handler = handler.into_ref();
        self.base.discard(&key);
        self.base.insert(key.clone(), Rc::clone(&handler));
        debug!("staged new handler {}", key);
        self.staging.new2old.insert(key, None);
        Ok(handler)
    }

    /// Stages the removal of `key` and everything below it
    pub fn del_handler(&mut self, key: &str) -> DatabaseResult<()> {
        let key = self.normalize_key(key)?;
        let staged: Vec<String> = self
            .staging
            .new2old
            .keys()
            .filter(|staged| **staged == key || is_descendant(staged, &key))
            .cloned()
            .collect();

        let mut found = !staged.is_empty();
        for target in staged {
            self.base.discard(&target);
            if let Some(Some(source)) = self.staging.new2old.remove(&target) {
                self.staging.old2new.insert(source, None);
            }
        }

        if !self.staging.is_hidden(&key) && api::exists(&key)? {
            self.base.discard_under(&key);
            self.staging.old2new.insert(key.clone(), None);
            found = true;
        }
        if !found {
            return Err(DatabaseError::NotFound(key));
        }
        debug!("staged removal of {}", key);
        Ok(())
    }

    /// Marks the handler at `key` as modified, loading it first if needed
    ///
    /// Call this before changing the payload in place.
    pub fn touch_handler(&mut self, key: &str) -> DatabaseResult<HandlerRef> {
        let key = self.normalize_key(key)?;
        let handler = self.get_handler(&key)?;
        {
            let mut inner = borrow_handler_mut(&key, &handler)?;
            if inner.is_folder() {
                return Err(FsError::IsADirectory(key).into());
            }
            if self.staging.is_staged(&key) {
                inner.touch();
                return Ok(Rc::clone(&handler));
            }
            if inner.timestamp().is_none() {
                inner.load_state()?;
            }
            inner.touch();
        }
        debug!("staged change of {}", key);
        self.staging.old2new.insert(key.clone(), Some(key.clone()));
        self.staging.new2old.insert(key.clone(), Some(key));
        Ok(handler)
    }

    /// Stages a copy of `source` at `target`, recursing into folders
    pub fn copy_handler(&mut self, source: &str, target: &str) -> DatabaseResult<()> {
        let source = self.normalize_key(source)?;
        let target = self.normalize_key(target)?;
        self.check_target(&source, &target)?;

        let handler = self.get_handler(&source)?;
        if Self::is_folder(&source, &handler)? {
            for name in self.get_handler_names(&source)? {
                self.copy_handler(&join_key(&source, &name), &join_key(&target, &name))?;
            }
            return Ok(());
        }
        let copy = borrow_handler_mut(&source, &handler)?.clone_detached()?;
        self.set_handler(&target, copy)?;
        Ok(())
    }

    /// Stages the move of `source` to `target`, recursing into folders
    pub fn move_handler(&mut self, source: &str, target: &str) -> DatabaseResult<()> {
        let source = self.normalize_key(source)?;
        let target = self.normalize_key(target)?;
        self.check_target(&source, &target)?;

        let handler = self.get_handler(&source)?;
        if Self::is_folder(&source, &handler)? {
            for name in self.get_handler_names(&source)? {
                self.move_handler(&join_key(&source, &name), &join_key(&target, &name))?;
            }
            if !self.staging.is_hidden(&source) && api::exists(&source)? {
                self.base.discard_under(&source);
                self.staging.old2new.insert(source, None);
            }
            return Ok(());
        }

        {
            let mut inner = borrow_handler_mut(&source, &handler)?;
            inner.ensure_loaded()?;
            inner.reparent(&target);
        }
        self.base.cache_mut().remove(&source);
        self.base.insert(target.clone(), Rc::clone(&handler));

        let original = self
            .staging
            .new2old
            .remove(&source)
            .unwrap_or_else(|| Some(source.clone()));
        match original {
            Some(original) => {
                if original == target {
                    // Back where it came from: a change in place
                    let mtime = api::get_mtime(&target)?;
                    let mut inner = borrow_handler_mut(&target, &handler)?;
                    inner.mark_saved(mtime);
                    inner.touch();
                }
                self.staging
                    .old2new
                    .insert(original.clone(), Some(target.clone()));
                self.staging.new2old.insert(target.clone(), Some(original));
            }
            None => {
                self.staging.new2old.insert(target.clone(), None);
            }
        }
        debug!("staged move of {} to {}", source, target);
        Ok(())
    }

    /// Writes every staged change to the backend
    ///
    /// Renames whose target is not free yet are retried after the rest of
    /// the pass. A pass without progress fails with `Conflict` and keeps
    /// the staging area; any other failure aborts every staged change.
    pub fn save_changes(&mut self) -> DatabaseResult<()> {
        if !self.has_changed() {
            return Ok(());
        }
        let sources = self.staging.old2new.len();
        let additions = self
            .staging
            .new2old
            .values()
            .filter(|source| source.is_none())
            .count();

        let outcome = match self.commit() {
            Ok(()) => {
                self.staging.clear();
                info!(
                    "committed {} changed and {} new handlers",
                    sources, additions
                );
                Ok(())
            }
            Err(CommitFailure::Stalled(error)) => {
                warn!("commit stalled, staging kept: {}", error);
                Err(error)
            }
            Err(CommitFailure::Fatal(error)) => {
                warn!("commit failed, aborting: {}", error);
                self.abort_staged();
                Err(error)
            }
        };
        self.make_room();
        outcome
    }

    fn commit(&mut self) -> Result<(), CommitFailure> {
        // Children sort after their parents, so they go first
        let mut pending: Vec<String> = self.staging.old2new.keys().rev().cloned().collect();
        while !pending.is_empty() {
            let mut retry = Vec::new();
            let mut last_error = None;
            for source in &pending {
                match self.commit_source(source) {
                    Step::Done => {}
                    Step::Retry(error) => {
                        warn!("retrying {} later: {}", source, error);
                        retry.push(source.clone());
                        last_error = Some(error);
                    }
                    Step::Fatal(error) => return Err(CommitFailure::Fatal(error)),
                }
            }
            if retry.len() == pending.len() {
                let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
                return Err(CommitFailure::Stalled(DatabaseError::Conflict(format!(
                    "no progress committing {} ({})",
                    retry.join(", "),
                    reason
                ))));
            }
            pending = retry;
        }

        let additions: Vec<String> = self
            .staging
            .new2old
            .iter()
            .filter(|(_, source)| source.is_none())
            .map(|(target, _)| target.clone())
            .collect();
        for target in additions {
            self.commit_addition(&target).map_err(CommitFailure::Fatal)?;
        }
        Ok(())
    }

    fn commit_source(&mut self, source: &str) -> Step {
        let Some(target) = self.staging.old2new.get(source).cloned() else {
            return Step::Done;
        };
        let result = match target.as_deref() {
            None => self.commit_removal(source),
            Some(target) if target == source => self.commit_in_place(source),
            Some(target) => return self.commit_rename(source, target),
        };
        match result {
            Ok(()) => Step::Done,
            Err(error) => Step::Fatal(error),
        }
    }

    fn staged_handler(&self, key: &str) -> DatabaseResult<HandlerRef> {
        self.base
            .cache()
            .peek(key)
            .ok_or_else(|| DatabaseError::NotFound(key.to_string()))
    }

    fn commit_removal(&mut self, source: &str) -> DatabaseResult<()> {
        remove_if_exists(source)?;
        self.staging.old2new.remove(source);
        Ok(())
    }

    fn commit_in_place(&mut self, key: &str) -> DatabaseResult<()> {
        let handler = self.staged_handler(key)?;
        borrow_handler_mut(key, &handler)?.save_state()?;
        self.staging.old2new.remove(key);
        self.staging.new2old.remove(key);
        Ok(())
    }

    fn commit_rename(&mut self, source: &str, target: &str) -> Step {
        let handler = match self.staged_handler(target) {
            Ok(handler) => handler,
            Err(error) => return Step::Fatal(error),
        };
        let saved = borrow_handler_mut(target, &handler)
            .and_then(|mut inner| inner.save_state_to(target).map_err(DatabaseError::from));
        if let Err(error) = saved {
            if is_retryable(error.kind()) {
                return Step::Retry(error);
            }
            return Step::Fatal(error);
        }
        match self.finish_rename(source, target, &handler) {
            Ok(()) => Step::Done,
            Err(error) => Step::Fatal(error),
        }
    }

    fn finish_rename(
        &mut self,
        source: &str,
        target: &str,
        handler: &HandlerRef,
    ) -> DatabaseResult<()> {
        remove_if_exists(source)?;
        let mtime = api::get_mtime(target)?;
        borrow_handler_mut(target, handler)?.mark_saved(mtime);
        self.staging.old2new.remove(source);
        self.staging.new2old.remove(target);
        Ok(())
    }

    fn commit_addition(&mut self, target: &str) -> DatabaseResult<()> {
        let handler = self.staged_handler(target)?;
        {
            let mut inner = borrow_handler_mut(target, &handler)?;
            inner.save_state_to(target)?;
            inner.mark_saved(api::get_mtime(target)?);
        }
        self.staging.new2old.remove(target);
        Ok(())
    }

    /// Drops every staged change; returns the number of staged handlers
    fn abort_staged(&mut self) -> usize {
        let staged = std::mem::take(&mut self.staging.new2old);
        for (target, source) in &staged {
            if source.as_deref() != Some(target.as_str()) {
                self.base.discard(target);
                continue;
            }
            let Some(handler) = self.base.cache().peek(target) else {
                warn!("changed handler {} is no longer cached", target);
                continue;
            };
            let reset = match handler.try_borrow_mut() {
                Ok(mut inner) => {
                    inner.abort_changes();
                    true
                }
                Err(_) => false,
            };
            if !reset {
                warn!("handler {} is in use, discarding it", target);
                self.base.discard(target);
            }
        }
        self.staging.old2new.clear();
        staged.len()
    }
}

fn remove_if_exists(key: &str) -> DatabaseResult<()> {
    match api::remove(key) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

impl Database for RwDatabase {
    fn id(&self) -> DatabaseId {
        self.base.id()
    }

    fn config(&self) -> &DatabaseConfig {
        self.base.config()
    }

    fn cache(&self) -> &HandlerCache {
        self.base.cache()
    }

    fn cache_mut(&mut self) -> &mut HandlerCache {
        self.base.cache_mut()
    }

    fn normalize_key(&self, key: &str) -> DatabaseResult<String> {
        self.base.normalize_key(key)
    }

    fn has_handler(&mut self, key: &str) -> DatabaseResult<bool> {
        let key = self.normalize_key(key)?;
        if self.staging.is_staged(&key) || self.staging.has_staged_under(&key) {
            return Ok(true);
        }
        if self.staging.is_hidden(&key) {
            return Ok(false);
        }
        self.base.has_handler(&key)
    }

    fn lookup(
        &mut self,
        key: &str,
        cls: Option<&'static HandlerClass>,
    ) -> DatabaseResult<Option<HandlerRef>> {
        let key = self.normalize_key(key)?;
        let hidden = self.staging.is_hidden(&key);
        if let Some(handler) = self.base.cached(&key, cls, hidden)? {
            return Ok(Some(handler));
        }
        if hidden || !api::exists(&key)? {
            return self.virtual_folder(&key, cls);
        }
        if api::is_folder(&key)? {
            let names = self.get_handler_names(&key)?;
            return self.base.folder(&key, names, cls).map(Some);
        }
        self.base.instantiate(&key, cls).map(Some)
    }

    /// Backend names minus staged removals, plus staged additions
    fn get_handler_names(&mut self, key: &str) -> DatabaseResult<Vec<String>> {
        let key = self.normalize_key(key)?;
        let on_backend = !self.staging.is_hidden(&key) && api::exists(&key)?;

        let mut names = BTreeSet::new();
        if on_backend {
            for name in api::get_names(&key)? {
                if !self.staging.is_removed(&join_key(&key, &name)) {
                    names.insert(name);
                }
            }
        }
        for staged in self.staging.staged_under(&key) {
            if let Some(name) = child_name(&key, staged) {
                names.insert(name.to_string());
            }
        }

        if !on_backend && names.is_empty() {
            if self.staging.is_staged(&key) {
                return Err(FsError::NotADirectory(key).into());
            }
            return Err(DatabaseError::NotFound(key));
        }
        Ok(names.into_iter().collect())
    }

    fn get_mimetype(&mut self, key: &str) -> DatabaseResult<String> {
        let key = self.normalize_key(key)?;
        if let Some(Some(source)) = self.staging.new2old.get(&key) {
            if *source == key {
                return Ok(api::get_mimetype(&key)?);
            }
        }
        if self.staging.is_staged(&key) {
            let handler = self.staged_handler(&key)?;
            let mimetype = borrow_handler(&key, &handler)?.class().mimetype;
            return Ok(mimetype.to_string());
        }
        if self.staging.is_hidden(&key) || !api::exists(&key)? {
            if self.staging.has_staged_under(&key) {
                return Ok(FOLDER_MIMETYPE.to_string());
            }
            return Err(DatabaseError::NotFound(key));
        }
        Ok(api::get_mimetype(&key)?)
    }

    /// Drops every staged change; handlers changed in place reload on next use
    fn abort_changes(&mut self) {
        let count = self.abort_staged();
        self.make_room();
        info!("aborted {} staged handlers", count);
    }
}
