//! Query component
//!
//! Queries are read as `key=value` pairs separated by `&`, with the
//! `application/x-www-form-urlencoded` escaping rules. A key may appear more
//! than once; pair order is preserved so encoding is deterministic.

use percent_encoding::percent_decode_str;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Query {
    pairs: Vec<(String, Option<String>)>,
}

fn unquote_plus(raw: &str) -> String {
    percent_decode_str(&raw.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

fn quote_plus(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a raw query string (without the leading `?`)
    ///
    /// ```
    /// use uri::Query;
    ///
    /// let query = Query::parse("width=800&height=600&tag=a&tag=b");
    /// assert_eq!(query.get("width"), Some("800"));
    /// assert_eq!(query.get_all("tag"), vec!["a", "b"]);
    /// ```
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|item| !item.is_empty())
            .map(|item| match item.split_once('=') {
                Some((key, value)) => (unquote_plus(key), Some(unquote_plus(value))),
                None => (unquote_plus(item), None),
            })
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// First value bound to `key`; a bare key yields `""`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    /// Every value bound to `key`, in order
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.pairs
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
            .collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Adds a value without touching existing ones
    pub fn append(&mut self, key: &str, value: &str) {
        self.pairs.push((key.to_string(), Some(value.to_string())));
    }

    /// Replaces every value of `key` with a single one
    pub fn set(&mut self, key: &str, value: &str) {
        match self.pairs.iter().position(|(k, _)| k == key) {
            Some(index) => {
                self.pairs[index].1 = Some(value.to_string());
                let mut seen = 0;
                self.pairs.retain(|(k, _)| {
                    if k != key {
                        return true;
                    }
                    seen += 1;
                    seen == 1
                });
            }
            None => self.append(key, value),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = Vec::new();
        for (key, _) in &self.pairs {
            if !seen.contains(&key.as_str()) {
                seen.push(key);
            }
        }
        seen.into_iter()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, (key, value)) in self.pairs.iter().enumerate() {
            if index > 0 {
                write!(f, "&")?;
            }
            write!(f, "{}", quote_plus(key))?;
            if let Some(value) = value {
                write!(f, "={}", quote_plus(value))?;
            }
        }
        Ok(())
    }
}
