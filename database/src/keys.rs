//! Helpers over normalized key strings
//!
//! Normalized keys never end with a slash, except for a root such as
//! `mem:/` or `file:///`.

/// The key of `name` inside the folder `parent`
pub fn join_key(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// True when `key` lies strictly below `ancestor`
pub fn is_descendant(key: &str, ancestor: &str) -> bool {
    if ancestor.ends_with('/') {
        key.len() > ancestor.len() && key.starts_with(ancestor)
    } else {
        key.len() > ancestor.len() + 1
            && key.starts_with(ancestor)
            && key.as_bytes()[ancestor.len()] == b'/'
    }
}

/// The name of the direct child of `parent` on the way to `key`
///
/// ```
/// use database::keys::child_name;
///
/// assert_eq!(child_name("mem:/a", "mem:/a/b/c"), Some("b"));
/// assert_eq!(child_name("mem:/", "mem:/a"), Some("a"));
/// assert_eq!(child_name("mem:/a", "mem:/ab"), None);
/// ```
pub fn child_name<'a>(parent: &str, key: &'a str) -> Option<&'a str> {
    if !is_descendant(key, parent) {
        return None;
    }
    let offset = if parent.ends_with('/') {
        parent.len()
    } else {
        parent.len() + 1
    };
    key[offset..].split('/').next()
}

/// The folder holding `key`, or `None` for a root
pub fn parent_key(key: &str) -> Option<&str> {
    let index = key.rfind('/')?;
    if index + 1 == key.len() {
        return None;
    }
    let head = &key[..index];
    let path_start = head.find(':').map_or(0, |colon| colon + 1);
    let rest = &head[path_start..];
    if rest.is_empty() || (rest.starts_with("//") && !rest[2..].contains('/')) {
        Some(&key[..=index])
    } else {
        Some(head)
    }
}
