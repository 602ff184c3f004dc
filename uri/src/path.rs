//! Hierarchical paths
//!
//! A [`Path`] is the sequence of segments found in the path component of a
//! reference. Parsing always normalizes: empty and `.` segments vanish and
//! `..` consumes the preceding segment.

use std::fmt;
use std::str::FromStr;

/// A single path segment, with an optional `;param` suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub param: Option<String>,
}

impl Segment {
    /// Splits a raw segment on its first `;`
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(';') {
            Some((name, param)) => Self {
                name: name.to_string(),
                param: Some(param.to_string()),
            },
            None => Self {
                name: raw.to_string(),
                param: None,
            },
        }
    }

    fn is_parent(&self) -> bool {
        self.name == ".." && self.param.is_none()
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{};{}", self.name, param),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A normalized path
///
/// The absolute flag records a leading slash and the trailing flag records a
/// trailing slash (or a final `.`/`..` that was folded away). Both only
/// matter when resolving one path against another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    absolute: bool,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

/// Normalizes a raw path string
///
/// # Examples
///
/// ```
/// use uri::normalize_path;
///
/// assert_eq!(normalize_path("a//b/c"), "a/b/c");
/// assert_eq!(normalize_path("a/./b/c"), "a/b/c");
/// assert_eq!(normalize_path("a/b/c/../d"), "a/b/d");
/// assert_eq!(normalize_path("/../a/b/c"), "/a/b/c");
/// assert_eq!(normalize_path("."), ".");
/// ```
pub fn normalize_path(path: &str) -> String {
    Path::parse(path).to_string()
}

impl Path {
    /// Parses and normalizes a path
    pub fn parse(raw: &str) -> Self {
        let absolute = raw.starts_with('/');
        let last_raw = raw.rsplit('/').next().unwrap_or("");
        let mut trailing_slash = raw.ends_with('/') || last_raw == "." || last_raw == "..";

        let mut stack: Vec<Segment> = Vec::new();
        for raw_segment in raw.split('/') {
            if raw_segment.is_empty() || raw_segment == "." {
                continue;
            }
            let segment = Segment::parse(raw_segment);
            if segment.is_parent() {
                match stack.last() {
                    Some(top) if !top.is_parent() => {
                        stack.pop();
                        continue;
                    }
                    _ if absolute => continue,
                    _ => {}
                }
            }
            stack.push(segment);
        }

        // A surviving trailing `..` is a segment of its own, not a folder marker
        if last_raw == ".." && stack.last().map_or(false, Segment::is_parent) {
            trailing_slash = raw.ends_with('/');
        }

        Self {
            absolute,
            segments: stack,
            trailing_slash,
        }
    }

    /// Builds a relative path out of segments
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self {
            absolute: false,
            segments,
            trailing_slash: false,
        }
    }

    /// The root path `/`
    pub fn root() -> Self {
        Self {
            absolute: true,
            segments: Vec::new(),
            trailing_slash: false,
        }
    }

    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    pub fn is_relative(&self) -> bool {
        !self.absolute
    }

    /// Whether the path ends with a slash (is used as a container)
    pub fn has_trailing_slash(&self) -> bool {
        self.trailing_slash
    }

    /// True for the path of the empty reference
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.segments.is_empty() && !self.trailing_slash
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// The name of the last segment, if any
    pub fn get_name(&self) -> Option<&str> {
        self.segments.last().map(|s| s.name.as_str())
    }

    /// The path without its last segment
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self {
            absolute: self.absolute,
            segments,
            trailing_slash: false,
        }
    }

    /// Returns a copy of the path with the trailing slash flag dropped
    pub fn without_trailing_slash(&self) -> Self {
        Self {
            trailing_slash: false,
            ..self.clone()
        }
    }

    /// Appends a single name, ignoring any trailing slash
    pub fn join(&self, name: &str) -> Self {
        self.resolve2(&Path::parse(name))
    }

    /// Segment-wise prefix test (`/a/b` starts with `/a`, not with `/a/b/c`)
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.absolute == prefix.absolute
            && self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Resolves a relative path the standard way: the last segment of `self`
    /// is replaced unless `self` ends with a slash.
    ///
    /// ```
    /// use uri::Path;
    ///
    /// let base = Path::parse("/a/b");
    /// assert_eq!(base.resolve(&Path::parse("c")).to_string(), "/a/c");
    /// let base = Path::parse("/a/b/");
    /// assert_eq!(base.resolve(&Path::parse("c")).to_string(), "/a/b/c");
    /// ```
    pub fn resolve(&self, path: &Path) -> Path {
        if path.absolute {
            return path.clone();
        }
        if path.is_empty() {
            return self.clone();
        }
        let base = self.to_string();
        let directory = match base.rfind('/') {
            Some(index) => &base[..=index],
            None => "",
        };
        Path::parse(&format!("{}{}", directory, path))
    }

    /// Resolves a relative path as if `self` always had a trailing slash
    ///
    /// ```
    /// use uri::Path;
    ///
    /// let base = Path::parse("/a/b");
    /// assert_eq!(base.resolve2(&Path::parse("c")).to_string(), "/a/b/c");
    /// ```
    pub fn resolve2(&self, path: &Path) -> Path {
        if path.absolute {
            return path.clone();
        }
        if path.is_empty() {
            return self.clone();
        }
        let base = self.to_string();
        if base.is_empty() || base == "." {
            return path.clone();
        }
        if base.ends_with('/') {
            Path::parse(&format!("{}{}", base, path))
        } else {
            Path::parse(&format!("{}/{}", base, path))
        }
    }

    /// The longest common prefix of two paths, as a relative path
    pub fn get_prefix(&self, other: &Path) -> Path {
        let common = self
            .segments
            .iter()
            .zip(other.segments.iter())
            .take_while(|(a, b)| a.name == b.name)
            .count();
        Path::from_segments(self.segments[..common].to_vec())
    }

    /// The relative path leading from `self` to `other`
    ///
    /// This is the complement of [`Path::resolve2`]: for `x =
    /// a.get_pathto(b)`, `a.resolve2(x) == b`.
    pub fn get_pathto(&self, other: &Path) -> Path {
        let common = self.get_prefix(other).len();
        let mut segments: Vec<Segment> = (common..self.segments.len())
            .map(|_| Segment::parse(".."))
            .collect();
        segments.extend(other.segments[common..].iter().cloned());
        if segments.is_empty() {
            return Path::parse(".");
        }
        Path::from_segments(segments)
    }

    /// The relative path from the last segment back up to the first one
    pub fn get_pathtoroot(&self) -> Path {
        let depth = self.segments.len().saturating_sub(1);
        Path::parse(&"../".repeat(depth))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return match (self.absolute, self.trailing_slash) {
                (true, _) => write!(f, "/"),
                (false, true) => write!(f, "."),
                (false, false) => Ok(()),
            };
        }
        if self.absolute {
            write!(f, "/")?;
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                write!(f, "/")?;
            }
            write!(f, "{}", segment)?;
        }
        if self.trailing_slash {
            write!(f, "/")?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Path::parse(s))
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        *self == Path::parse(other)
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        *self == Path::parse(other)
    }
}
