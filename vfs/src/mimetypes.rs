//! Mimetype guessing from file names

/// Reported for folders
pub const FOLDER_MIMETYPE: &str = "application/x-not-regular-file";

/// Reported for files whose type cannot be guessed
pub const DEFAULT_MIMETYPE: &str = "application/octet-stream";

const EXTENSIONS: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("rst", "text/x-rst"),
    ("py", "text/x-python"),
    ("rs", "text/x-rust"),
    ("ics", "text/calendar"),
    ("po", "text/x-po"),
    ("xml", "application/xml"),
    ("xhtml", "application/xhtml+xml"),
    ("json", "application/json"),
    ("js", "application/javascript"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tgz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
];

/// Guesses a mimetype from a file name
///
/// Names may stack suffixes (`index.html.en`, `notes.txt.UTF-8`), so the
/// extensions are tried from the last one backwards. A leading dot marks a
/// hidden file, not an extension.
///
/// ```
/// use vfs::guess_mimetype;
///
/// assert_eq!(guess_mimetype("index.html.en"), Some("text/html"));
/// assert_eq!(guess_mimetype("README"), None);
/// ```
pub fn guess_mimetype(name: &str) -> Option<&'static str> {
    let name = name.strip_prefix('.').unwrap_or(name);
    let mut parts = name.split('.');
    parts.next();
    let extensions: Vec<&str> = parts.collect();
    extensions.iter().rev().find_map(|extension| {
        let extension = extension.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(known, _)| *known == extension)
            .map(|(_, mimetype)| *mimetype)
    })
}
