//! Pending structural changes of a read-write database
//!
//! Two maps describe everything not yet committed:
//!
//! - `old2new`: backend key to its pending destination. `None` means the
//!   object goes away; the key itself means it is rewritten in place.
//! - `new2old`: staged key to the backend key it comes from. `None` means
//!   the handler is brand new.
//!
//! Ordered maps keep commits deterministic and make "everything under a
//! key" a range scan.

use crate::keys::is_descendant;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Staging {
    pub(crate) old2new: BTreeMap<String, Option<String>>,
    pub(crate) new2old: BTreeMap<String, Option<String>>,
}

impl Staging {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn old2new(&self) -> &BTreeMap<String, Option<String>> {
        &self.old2new
    }

    pub fn new2old(&self) -> &BTreeMap<String, Option<String>> {
        &self.new2old
    }

    pub fn is_empty(&self) -> bool {
        self.old2new.is_empty() && self.new2old.is_empty()
    }

    pub fn clear(&mut self) {
        self.old2new.clear();
        self.new2old.clear();
    }

    /// The backend object at `key` is removed or moved elsewhere
    pub fn is_removed(&self, key: &str) -> bool {
        match self.old2new.get(key) {
            Some(Some(target)) => target != key,
            Some(None) => true,
            None => false,
        }
    }

    /// Some ancestor of `key` is removed or moved elsewhere
    pub fn has_removed_ancestor(&self, key: &str) -> bool {
        self.old2new
            .keys()
            .any(|old| is_descendant(key, old) && self.is_removed(old))
    }

    /// The backend object at `key` must be ignored
    pub fn is_hidden(&self, key: &str) -> bool {
        self.is_removed(key) || self.has_removed_ancestor(key)
    }

    pub fn is_staged(&self, key: &str) -> bool {
        self.new2old.contains_key(key)
    }

    /// Staged keys strictly below `key`
    pub fn staged_under<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.new2old
            .keys()
            .filter(move |staged| is_descendant(staged, key))
    }

    pub fn has_staged_under(&self, key: &str) -> bool {
        self.staged_under(key).next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging(old2new: &[(&str, Option<&str>)], new2old: &[(&str, Option<&str>)]) -> Staging {
        let map = |entries: &[(&str, Option<&str>)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect()
        };
        Staging {
            old2new: map(old2new),
            new2old: map(new2old),
        }
    }

    #[test]
    fn test_empty() {
        let staging = Staging::new();
        assert!(staging.is_empty());
        assert!(!staging.is_hidden("mem:/a"));
    }

    #[test]
    fn test_removed_and_moved() {
        let staging = staging(
            &[
                ("mem:/gone", None),
                ("mem:/same", Some("mem:/same")),
                ("mem:/from", Some("mem:/to")),
            ],
            &[("mem:/same", Some("mem:/same")), ("mem:/to", Some("mem:/from"))],
        );
        assert!(staging.is_removed("mem:/gone"));
        assert!(!staging.is_removed("mem:/same"));
        assert!(staging.is_removed("mem:/from"));
        assert!(!staging.is_removed("mem:/to"));
        assert!(staging.is_staged("mem:/to"));
    }

    #[test]
    fn test_hidden_below_removed_folder() {
        let staging = staging(&[("mem:/dir", None)], &[("mem:/dir/new", None)]);
        assert!(staging.is_hidden("mem:/dir/a/b"));
        assert!(!staging.is_hidden("mem:/dirt"));
        assert!(staging.has_staged_under("mem:/dir"));
        assert!(staging.has_staged_under("mem:/"));
        assert!(!staging.has_staged_under("mem:/dir/new"));
        assert_eq!(staging.staged_under("mem:/").count(), 1);
    }

    #[test]
    fn test_clear() {
        let mut staging = staging(&[("mem:/a", None)], &[("mem:/b", None)]);
        assert!(!staging.is_empty());
        staging.clear();
        assert!(staging.is_empty());
    }
}
