//! The backend trait
//!
//! Every storage backend implements [`FileSystem`] over absolute references.
//! Generic behavior (mimetype guessing, recursive copy, move with rename
//! fallback, traversal) comes from default methods, so a backend only has to
//! provide the primitive operations.

use crate::error::{ErrorKind, FsError, FsResult};
use crate::mimetypes::{guess_mimetype, DEFAULT_MIMETYPE, FOLDER_MIMETYPE};
use crate::Timestamp;
use log::debug;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use uri::{Path, Reference};

/// How a file is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Input stream positioned at the start
    Read,
    /// Truncates the file
    Write,
    /// Reads and writes without truncating; optional for backends
    ReadWrite,
    /// Writes positioned at the end of the file
    Append,
}

impl OpenMode {
    pub fn is_write(&self) -> bool {
        !matches!(self, OpenMode::Read)
    }
}

/// A stream returned by `open` and `make_file`
///
/// Dropping the stream closes it.
pub trait Stream: Read + Write + Seek + Send {}

impl<T: Read + Write + Seek + Send> Stream for T {}

/// An in-memory stream that refuses writes
#[derive(Debug)]
pub struct ReadOnlyStream(Cursor<Vec<u8>>);

impl ReadOnlyStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self(Cursor::new(data))
    }
}

impl Read for ReadOnlyStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for ReadOnlyStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.0.seek(pos)
    }
}

impl Write for ReadOnlyStream {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "stream opened for reading",
        ))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// The reference of `name` inside the folder `parent`
pub fn child_reference(parent: &Reference, name: &str) -> Reference {
    parent.with_path(parent.path.join(name))
}

/// Copies a file or a folder tree, possibly between two backends
///
/// The target must not exist yet.
pub fn copy_across<A, B>(
    source_fs: &A,
    source: &Reference,
    target_fs: &B,
    target: &Reference,
) -> FsResult<()>
where
    A: FileSystem + ?Sized,
    B: FileSystem + ?Sized,
{
    if source_fs.is_folder(source) {
        target_fs.make_folder(target)?;
        for name in source_fs.get_names(source)? {
            copy_across(
                source_fs,
                &child_reference(source, &name),
                target_fs,
                &child_reference(target, &name),
            )?;
        }
        return Ok(());
    }

    let mut reader = source_fs.open(source, OpenMode::Read)?;
    let mut writer = target_fs.make_file(target)?;
    io::copy(&mut reader, &mut writer).map_err(|e| FsError::from_io(target, e))?;
    writer.flush().map_err(|e| FsError::from_io(target, e))?;
    Ok(())
}

/// A storage backend bound to one or more URI schemes
pub trait FileSystem: Send + Sync {
    fn exists(&self, reference: &Reference) -> bool;

    fn is_file(&self, reference: &Reference) -> bool;

    fn is_folder(&self, reference: &Reference) -> bool;

    /// Names of the entries of a folder
    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>>;

    /// Last modification time, with at least second granularity
    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp>;

    fn get_size(&self, reference: &Reference) -> FsResult<u64>;

    /// Creates an empty file, and any missing parent folder
    ///
    /// Fails with `AlreadyExists` when something is already there.
    fn make_file(&self, reference: &Reference) -> FsResult<Box<dyn Stream>>;

    /// Creates a folder and any missing parent folder
    fn make_folder(&self, reference: &Reference) -> FsResult<()>;

    fn open(&self, reference: &Reference, mode: OpenMode) -> FsResult<Box<dyn Stream>>;

    /// Removes a file, or a folder with everything below it
    fn remove(&self, reference: &Reference) -> FsResult<()>;

    /// Native rename inside this backend; the target must be free
    fn rename(&self, source: &Reference, target: &Reference) -> FsResult<()>;

    fn get_mimetype(&self, reference: &Reference) -> FsResult<String> {
        if !self.exists(reference) {
            return Err(FsError::NotFound(reference.to_string()));
        }
        if self.is_folder(reference) {
            return Ok(FOLDER_MIMETYPE.to_string());
        }
        let guessed = reference.path.get_name().and_then(guess_mimetype);
        Ok(guessed.unwrap_or(DEFAULT_MIMETYPE).to_string())
    }

    /// Copies `source` to the free key `target`
    fn copy(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        if self.exists(target) {
            return Err(FsError::AlreadyExists(target.to_string()));
        }
        copy_across(self, source, self, target)
    }

    /// Moves `source` to `target`, or into `target` when it is a folder
    ///
    /// A native rename is tried first; when the backend cannot rename, the
    /// resource is copied and then removed.
    fn move_to(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        let target = if self.is_folder(target) {
            match source.path.get_name() {
                Some(name) => child_reference(target, name),
                None => return Err(FsError::InvalidKey(source.to_string())),
            }
        } else {
            target.clone()
        };

        match self.rename(source, &target) {
            Ok(()) => Ok(()),
            Err(error) if matches!(error.kind(), ErrorKind::UnsupportedMode | ErrorKind::Io) => {
                debug!("rename {} -> {} failed ({}), copying", source, target, error);
                self.copy(source, &target)?;
                self.remove(source)
            }
            Err(error) => Err(error),
        }
    }

    /// The canonical form of a key
    ///
    /// Drops query, fragment and trailing slash, and makes the path absolute.
    fn normalize_key(&self, reference: &Reference) -> Reference {
        let path = if reference.path.is_absolute() {
            reference.path.without_trailing_slash()
        } else {
            Path::root().resolve2(&reference.path).without_trailing_slash()
        };
        Reference {
            scheme: reference.scheme.clone(),
            authority: reference.authority.clone().filter(|a| !a.is_empty()),
            path,
            query: None,
            fragment: None,
        }
    }

    /// The key itself followed by everything below it, folders first
    fn traverse(&self, reference: &Reference) -> FsResult<Vec<Reference>> {
        let mut found = Vec::new();
        let mut stack = vec![reference.clone()];
        while let Some(current) = stack.pop() {
            if self.is_folder(&current) {
                let mut names = self.get_names(&current)?;
                names.sort();
                for name in names.iter().rev() {
                    stack.push(child_reference(&current, name));
                }
            }
            found.push(current);
        }
        Ok(found)
    }

    fn get_basename(&self, reference: &Reference) -> String {
        reference.path.get_name().unwrap_or_default().to_string()
    }

    fn get_path(&self, reference: &Reference) -> String {
        reference.path.to_string()
    }

    fn resolve(&self, base: &Reference, reference: &str) -> Reference {
        base.resolve_str(reference)
    }

    fn resolve2(&self, base: &Reference, reference: &str) -> Reference {
        base.resolve2_str(reference)
    }
}
