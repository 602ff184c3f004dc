//! The `mailto` scheme
//!
//! Mail addresses are opaque: they are not resolved against anything and
//! have no path.

use crate::UriError;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Mailto {
    pub username: String,
    pub host: Option<String>,
}

impl Mailto {
    pub fn new(username: &str, host: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            host: host.map(str::to_string),
        }
    }

    /// Decodes `mailto:user@host`, `user@host` or a bare `user`
    ///
    /// ```
    /// use uri::Mailto;
    ///
    /// let address = Mailto::decode("mailto:jdavid").unwrap();
    /// assert_eq!(address.username, "jdavid");
    /// assert_eq!(address.host, None);
    /// ```
    pub fn decode(raw: &str) -> Result<Self, UriError> {
        let address = match raw.split_once(':') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("mailto") => rest,
            _ => raw,
        };
        let (username, host) = match address.split_once('@') {
            Some((username, host)) => (username, Some(host)),
            None => (address, None),
        };
        if username.is_empty() {
            return Err(UriError::InvalidMailto(raw.to_string()));
        }
        Ok(Self::new(username, host.filter(|h| !h.is_empty())))
    }

    /// The address without the scheme
    pub fn address(&self) -> String {
        match &self.host {
            Some(host) => format!("{}@{}", self.username, host),
            None => self.username.clone(),
        }
    }
}

impl fmt::Display for Mailto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mailto:{}", self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailto() {
        let address = Mailto::new("jdavid", Some("itaapy.com"));
        assert_eq!(address.username, "jdavid");
        assert_eq!(address.host.as_deref(), Some("itaapy.com"));
        assert_eq!(address.to_string(), "mailto:jdavid@itaapy.com");
    }

    #[test]
    fn test_mailto_no_host() {
        let address = Mailto::new("jdavid", None);
        assert_eq!(address.to_string(), "mailto:jdavid");
    }

    #[test]
    fn test_decode() {
        let address = Mailto::decode("jdavid@itaapy.com").unwrap();
        assert_eq!(address.username, "jdavid");
        assert_eq!(address.host.as_deref(), Some("itaapy.com"));
        assert_eq!(address.to_string(), "mailto:jdavid@itaapy.com");
        assert_eq!(address, Mailto::new("jdavid", Some("itaapy.com")));
    }

    #[test]
    fn test_decode_no_host() {
        let address = Mailto::decode("jdavid").unwrap();
        assert_eq!(address.host, None);
        assert_eq!(address.to_string(), "mailto:jdavid");
    }

    #[test]
    fn test_decode_rejects_empty_user() {
        assert!(matches!(
            Mailto::decode("mailto:@example.com"),
            Err(UriError::InvalidMailto(_))
        ));
    }
}
