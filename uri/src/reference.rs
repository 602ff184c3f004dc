//! Generic references
//!
//! A reference is made of five components:
//!
//! ```text
//! <scheme>://<authority><path>?<query>#<fragment>
//! ```
//!
//! Any of them may be missing. Resolution of a relative reference against a
//! base follows RFC 3986 section 5.2.

use crate::path::Path;
use crate::query::Query;
use std::fmt;
use std::str::FromStr;

/// Server-based authority: `userinfo@host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Authority {
    pub userinfo: Option<String>,
    pub host: String,
    pub port: Option<String>,
}

impl Authority {
    pub fn parse(raw: &str) -> Self {
        let (userinfo, rest) = match raw.rsplit_once('@') {
            Some((userinfo, rest)) => (Some(userinfo.to_string()), rest),
            None => (None, raw),
        };
        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => {
                (host.to_string(), Some(port.to_string()))
            }
            _ => (rest.to_string(), None),
        };
        Self {
            userinfo,
            host,
            port,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.userinfo.is_none() && self.host.is_empty() && self.port.is_none()
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(userinfo) = &self.userinfo {
            write!(f, "{}@", userinfo)?;
        }
        write!(f, "{}", self.host)?;
        if let Some(port) = &self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// A generic URI reference
///
/// `scheme` is empty for relative references. `authority` is `None` when the
/// reference has no `//` part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Reference {
    pub scheme: String,
    pub authority: Option<Authority>,
    pub path: Path,
    pub query: Option<Query>,
    pub fragment: Option<String>,
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
}

/// True for `C:/...` and `C:\...`
pub(crate) fn is_windows_drive(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

impl Reference {
    /// Parses a reference
    ///
    /// ```
    /// use uri::Reference;
    ///
    /// let reference = Reference::parse("http://example.com/a/b/c?query#fragment");
    /// assert_eq!(reference.scheme, "http");
    /// assert_eq!(reference.authority.unwrap().host, "example.com");
    /// assert_eq!(reference.path, "/a/b/c");
    /// assert_eq!(reference.query.unwrap().to_string(), "query");
    /// assert_eq!(reference.fragment.as_deref(), Some("fragment"));
    /// ```
    pub fn parse(raw: &str) -> Self {
        if is_windows_drive(raw) {
            return Self::from_windows_path(raw);
        }

        let (rest, fragment) = match raw.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (raw, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(Query::parse(query))),
            None => (rest, None),
        };

        let (scheme, rest) = match rest.split_once(':') {
            Some((scheme, rest)) if is_scheme(scheme) => (scheme.to_ascii_lowercase(), rest),
            _ => (String::new(), rest),
        };

        let (authority, path) = match rest.strip_prefix("//") {
            Some(rest) => {
                let end = rest.find('/').unwrap_or(rest.len());
                (Some(Authority::parse(&rest[..end])), &rest[end..])
            }
            None => (None, rest),
        };

        Self {
            scheme,
            authority,
            path: Path::parse(path),
            query,
            fragment,
        }
    }

    fn from_windows_path(raw: &str) -> Self {
        let path = raw.replace('\\', "/");
        Self {
            scheme: "file".to_string(),
            authority: Some(Authority::default()),
            path: Path::parse(&format!("/{}", path)),
            query: None,
            fragment: None,
        }
    }

    /// Builds a reference from its path alone
    pub fn from_path(path: Path) -> Self {
        Self {
            path,
            ..Self::default()
        }
    }

    /// The empty reference `""`
    pub fn is_empty(&self) -> bool {
        self.scheme.is_empty()
            && self.authority.is_none()
            && self.path.is_empty()
            && self.query.is_none()
            && self.fragment.is_none()
    }

    /// Absolute references carry a scheme
    pub fn is_absolute(&self) -> bool {
        !self.scheme.is_empty()
    }

    /// The authority as text, empty when there is none
    pub fn host(&self) -> String {
        self.authority
            .as_ref()
            .map(|a| a.host.clone())
            .unwrap_or_default()
    }

    /// Returns a copy with another path, dropping query and fragment
    pub fn with_path(&self, path: Path) -> Self {
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
            query: None,
            fragment: None,
        }
    }

    /// Resolves `reference` using `self` as the base
    ///
    /// ```
    /// use uri::Reference;
    ///
    /// let base = Reference::parse("http://a/b/c/d;p?q");
    /// assert_eq!(base.resolve_str("../g").to_string(), "http://a/b/g");
    /// assert_eq!(base.resolve_str("?y").to_string(), "http://a/b/c/d;p?y");
    /// ```
    pub fn resolve(&self, reference: &Reference) -> Reference {
        self.resolve_with(reference, |base, path| {
            if base.authority.is_some() && base.path.is_empty() {
                Path::parse(&format!("/{}", path))
            } else {
                base.path.resolve(path)
            }
        })
    }

    /// Like [`Reference::resolve`], but the base path is always treated as a
    /// container, as though it ended with a slash
    ///
    /// ```
    /// use uri::Reference;
    ///
    /// let base = Reference::parse("file:///tmp/db");
    /// assert_eq!(base.resolve2_str("doc").to_string(), "file:///tmp/db/doc");
    /// ```
    pub fn resolve2(&self, reference: &Reference) -> Reference {
        self.resolve_with(reference, |base, path| {
            if base.path.is_empty() {
                Path::parse(&format!("/{}", path))
            } else {
                base.path.resolve2(path)
            }
        })
    }

    pub fn resolve_str(&self, reference: &str) -> Reference {
        self.resolve(&Reference::parse(reference))
    }

    pub fn resolve2_str(&self, reference: &str) -> Reference {
        self.resolve2(&Reference::parse(reference))
    }

    fn resolve_with<F>(&self, reference: &Reference, merge: F) -> Reference
    where
        F: Fn(&Reference, &Path) -> Path,
    {
        if reference.is_absolute() {
            return reference.clone();
        }

        if reference.authority.is_some() {
            return Reference {
                scheme: self.scheme.clone(),
                ..reference.clone()
            };
        }

        let (path, query) = if reference.path.is_empty() {
            let query = reference.query.clone().or_else(|| self.query.clone());
            (self.path.clone(), query)
        } else if reference.path.is_absolute() {
            (reference.path.clone(), reference.query.clone())
        } else {
            (merge(self, &reference.path), reference.query.clone())
        };

        Reference {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
            query,
            fragment: reference.fragment.clone(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.scheme.is_empty() {
            write!(f, "{}:", self.scheme)?;
        }
        if let Some(authority) = &self.authority {
            write!(f, "//{}", authority)?;
        }
        let path = self.path.to_string();
        let bare = self.scheme.is_empty()
            && self.authority.is_none()
            && self.query.is_none()
            && self.fragment.is_none();
        if path != "." || bare {
            write!(f, "{}", path)?;
        }
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

impl FromStr for Reference {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Reference::parse(s))
    }
}
