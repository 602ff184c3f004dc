//! # URI References
//!
//! This crate implements the addressing scheme shared by every storage
//! backend: paths, generic references and mail addresses.
//!
//! ## Philosophy
//!
//! - **Keys are references**: a resource is named by an absolute, normalized URI
//! - **Parsing normalizes**: `a/./b`, `a//b` and `a/x/../b` are the same path
//! - **Resolution is pure**: resolving never touches any storage
//!
//! ## Design
//!
//! - [`Path`] is a normalized segment list with absolute and trailing-slash flags
//! - [`Reference`] splits scheme, authority, path, query and fragment
//! - [`Mailto`] is kept apart since mail addresses are opaque
//! - [`get_reference`] picks the right type from the scheme

pub mod mailto;
pub mod path;
pub mod query;
pub mod reference;

pub use mailto::Mailto;
pub use path::{normalize_path, Path, Segment};
pub use query::Query;
pub use reference::{Authority, Reference};

use std::fmt;
use thiserror::Error;

/// Errors raised while building references
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    /// Mail address without a user name
    #[error("Invalid mail address: {0}")]
    InvalidMailto(String),

    /// A reference with a scheme was required
    #[error("Reference is not absolute: {0}")]
    NotAbsolute(String),

    /// The working directory could not be read
    #[error("Cannot read working directory: {0}")]
    WorkingDirectory(String),
}

/// Any reference the parser knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Uri {
    Generic(Reference),
    Mailto(Mailto),
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uri::Generic(reference) => write!(f, "{}", reference),
            Uri::Mailto(mailto) => write!(f, "{}", mailto),
        }
    }
}

/// Returns a reference of the right type for the given string
///
/// ```
/// use uri::{get_reference, Uri};
///
/// assert!(matches!(get_reference("mailto:jdavid").unwrap(), Uri::Mailto(_)));
/// assert!(matches!(get_reference("http://a/b").unwrap(), Uri::Generic(_)));
/// ```
pub fn get_reference(raw: &str) -> Result<Uri, UriError> {
    match raw.split_once(':') {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("mailto") => {
            Ok(Uri::Mailto(Mailto::decode(raw)?))
        }
        _ => Ok(Uri::Generic(Reference::parse(raw))),
    }
}

/// The current working directory as a `file:` reference with a trailing slash
pub fn get_cwd() -> Result<Reference, UriError> {
    let cwd =
        std::env::current_dir().map_err(|e| UriError::WorkingDirectory(e.to_string()))?;
    let cwd = cwd.to_string_lossy().replace('\\', "/");
    let cwd = cwd.trim_end_matches('/');
    if reference::is_windows_drive(&format!("{}/", cwd)) {
        return Ok(Reference::parse(&format!("file:///{}/", cwd)));
    }
    Ok(Reference::parse(&format!("file://{}/", cwd)))
}

fn absolute_with<F>(raw: &str, base: Option<&Reference>, resolve: F) -> Result<Reference, UriError>
where
    F: Fn(&Reference, &Reference) -> Reference,
{
    let reference = Reference::parse(raw);
    if reference.is_absolute() {
        return Ok(reference);
    }
    match base {
        Some(base) if base.is_absolute() => Ok(resolve(base, &reference)),
        Some(base) => Err(UriError::NotAbsolute(base.to_string())),
        None => Ok(resolve(&get_cwd()?, &reference)),
    }
}

/// Resolves `raw` against `base`, defaulting to the working directory
///
/// Bare filesystem paths and Windows drive paths come back as `file:`
/// references.
pub fn get_absolute_reference(raw: &str, base: Option<&Reference>) -> Result<Reference, UriError> {
    absolute_with(raw, base, Reference::resolve)
}

/// Like [`get_absolute_reference`], ignoring the trailing slash of the base
pub fn get_absolute_reference2(raw: &str, base: Option<&Reference>) -> Result<Reference, UriError> {
    absolute_with(raw, base, Reference::resolve2)
}
