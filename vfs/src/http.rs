//! Read-only HTTP backend
//!
//! Metadata comes from `HEAD` requests (`Content-Length`, `Last-Modified`,
//! `Content-Type`), contents from `GET`. Every write operation is refused.

use crate::base::{FileSystem, OpenMode, ReadOnlyStream, Stream};
use crate::error::{FsError, FsResult};
use crate::mimetypes::guess_mimetype;
use crate::Timestamp;
use chrono::{DateTime, Utc};
use log::debug;
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE, LAST_MODIFIED};
use reqwest::StatusCode;
use std::time::UNIX_EPOCH;
use uri::Reference;

/// Parses an HTTP date such as `Wed, 21 Oct 2015 07:28:00 GMT`
pub fn parse_http_date(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

/// The mimetype of a `Content-Type` value, parameters dropped
pub fn parse_content_type(value: &str) -> Option<String> {
    let mimetype = value.split(';').next()?.trim().to_ascii_lowercase();
    if mimetype.is_empty() {
        None
    } else {
        Some(mimetype)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Backend for the `http:` and `https:` schemes
#[derive(Debug, Default)]
pub struct HttpFs {
    client: OnceCell<Client>,
}

impl HttpFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self, reference: &Reference) -> FsResult<&Client> {
        self.client.get_or_try_init(|| {
            Client::builder().build().map_err(|e| FsError::Http {
                key: reference.to_string(),
                message: e.to_string(),
            })
        })
    }

    fn check(reference: &Reference, response: Response) -> FsResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let key = reference.to_string();
        Err(match status {
            StatusCode::NOT_FOUND | StatusCode::GONE => FsError::NotFound(key),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FsError::PermissionDenied(key),
            _ => FsError::Http {
                key,
                message: format!("unexpected status {}", status),
            },
        })
    }

    fn head(&self, reference: &Reference) -> FsResult<Response> {
        debug!("HEAD {}", reference);
        let response = self
            .client(reference)?
            .head(reference.to_string())
            .send()
            .map_err(|e| FsError::Http {
                key: reference.to_string(),
                message: e.to_string(),
            })?;
        Self::check(reference, response)
    }

    fn read_only(reference: &Reference) -> FsError {
        FsError::PermissionDenied(format!("{} is served over read-only HTTP", reference))
    }
}

impl FileSystem for HttpFs {
    fn exists(&self, reference: &Reference) -> bool {
        self.head(reference).is_ok()
    }

    fn is_file(&self, reference: &Reference) -> bool {
        self.exists(reference)
    }

    fn is_folder(&self, _reference: &Reference) -> bool {
        false
    }

    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>> {
        Err(FsError::NotADirectory(reference.to_string()))
    }

    /// Servers that do not send `Last-Modified` report the epoch, so their
    /// resources never look stale.
    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp> {
        let response = self.head(reference)?;
        Ok(header(response.headers(), LAST_MODIFIED)
            .and_then(parse_http_date)
            .unwrap_or_else(|| Timestamp::from(UNIX_EPOCH)))
    }

    fn get_size(&self, reference: &Reference) -> FsResult<u64> {
        let response = self.head(reference)?;
        header(response.headers(), CONTENT_LENGTH)
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| FsError::Http {
                key: reference.to_string(),
                message: "missing Content-Length".to_string(),
            })
    }

    fn get_mimetype(&self, reference: &Reference) -> FsResult<String> {
        let response = self.head(reference)?;
        let mimetype = header(response.headers(), CONTENT_TYPE)
            .and_then(parse_content_type)
            .or_else(|| {
                reference
                    .path
                    .get_name()
                    .and_then(guess_mimetype)
                    .map(str::to_string)
            });
        Ok(mimetype.unwrap_or_else(|| crate::DEFAULT_MIMETYPE.to_string()))
    }

    fn make_file(&self, reference: &Reference) -> FsResult<Box<dyn Stream>> {
        Err(Self::read_only(reference))
    }

    fn make_folder(&self, reference: &Reference) -> FsResult<()> {
        Err(Self::read_only(reference))
    }

    fn open(&self, reference: &Reference, mode: OpenMode) -> FsResult<Box<dyn Stream>> {
        if mode.is_write() {
            return Err(Self::read_only(reference));
        }
        debug!("GET {}", reference);
        let http_error = |e: reqwest::Error| FsError::Http {
            key: reference.to_string(),
            message: e.to_string(),
        };
        let response = self
            .client(reference)?
            .get(reference.to_string())
            .send()
            .map_err(http_error)?;
        let body = Self::check(reference, response)?
            .bytes()
            .map_err(http_error)?;
        Ok(Box::new(ReadOnlyStream::new(body.to_vec())))
    }

    fn remove(&self, reference: &Reference) -> FsResult<()> {
        Err(Self::read_only(reference))
    }

    fn rename(&self, source: &Reference, _target: &Reference) -> FsResult<()> {
        Err(Self::read_only(source))
    }

    fn move_to(&self, source: &Reference, _target: &Reference) -> FsResult<()> {
        Err(Self::read_only(source))
    }

    /// URLs keep their query; only the fragment is dropped
    fn normalize_key(&self, reference: &Reference) -> Reference {
        let path = if reference.path.is_empty() {
            uri::Path::root()
        } else {
            reference.path.clone()
        };
        Reference {
            scheme: reference.scheme.clone(),
            authority: reference.authority.clone(),
            path,
            query: reference.query.clone(),
            fragment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_http_date() {
        let date = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(date.year(), 2015);
        assert_eq!(date.month(), 10);
        assert_eq!(date.hour(), 7);
        assert!(parse_http_date("yesterday").is_none());
    }

    #[test]
    fn test_parse_content_type() {
        assert_eq!(
            parse_content_type("text/HTML; charset=utf-8").as_deref(),
            Some("text/html")
        );
        assert_eq!(parse_content_type(" ; x=y"), None);
    }

    #[test]
    fn test_writes_are_refused_without_network() {
        let fs = HttpFs::new();
        let reference = Reference::parse("http://example.invalid/x");
        assert!(matches!(fs.make_file(&reference), Err(FsError::PermissionDenied(_))));
        assert!(matches!(fs.remove(&reference), Err(FsError::PermissionDenied(_))));
        assert!(matches!(
            fs.open(&reference, OpenMode::Write),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(!fs.is_folder(&reference));
    }

    #[test]
    fn test_normalize_key_keeps_query() {
        let fs = HttpFs::new();
        let key = fs.normalize_key(&Reference::parse("http://a/b?x=1#frag"));
        assert_eq!(key.to_string(), "http://a/b?x=1");
        let key = fs.normalize_key(&Reference::parse("http://a"));
        assert_eq!(key.to_string(), "http://a/");
    }
}
