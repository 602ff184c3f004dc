//! In-memory filesystem
//!
//! A tree of [`MemDir`] and [`MemFile`] nodes behind a mutex. Streams work on
//! a private buffer and store it back into the tree when they are flushed or
//! dropped.

use crate::base::{FileSystem, OpenMode, Stream};
use crate::error::{FsError, FsResult};
use crate::Timestamp;
use chrono::Utc;
use log::warn;
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uri::Reference;

/// File contents and modification time
#[derive(Debug, Clone)]
pub struct MemFile {
    pub data: Vec<u8>,
    pub mtime: Timestamp,
}

/// Folder entries by name
#[derive(Debug, Clone)]
pub struct MemDir {
    pub entries: BTreeMap<String, MemNode>,
    pub mtime: Timestamp,
}

impl MemDir {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            mtime: Utc::now(),
        }
    }
}

impl Default for MemDir {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub enum MemNode {
    File(MemFile),
    Dir(MemDir),
}

impl MemNode {
    pub fn mtime(&self) -> Timestamp {
        match self {
            MemNode::File(file) => file.mtime,
            MemNode::Dir(dir) => dir.mtime,
        }
    }

    /// Walks down the tree; `None` when a component is missing or a file
    /// sits in the middle of the path
    pub fn find(&self, components: &[String]) -> Option<&MemNode> {
        let mut node = self;
        for component in components {
            match node {
                MemNode::Dir(dir) => node = dir.entries.get(component)?,
                MemNode::File(_) => return None,
            }
        }
        Some(node)
    }

    fn find_mut(&mut self, components: &[String]) -> Option<&mut MemNode> {
        let mut node = self;
        for component in components {
            match node {
                MemNode::Dir(dir) => node = dir.entries.get_mut(component)?,
                MemNode::File(_) => return None,
            }
        }
        Some(node)
    }

    /// The folder at `components`, which must exist
    fn dir_mut(&mut self, components: &[String], key: &Reference) -> FsResult<&mut MemDir> {
        match self.find_mut(components) {
            Some(MemNode::Dir(dir)) => Ok(dir),
            Some(MemNode::File(_)) => Err(FsError::NotADirectory(key.to_string())),
            None => Err(FsError::NotFound(key.to_string())),
        }
    }

    /// The folder at `components`, created on demand
    pub fn makedirs(&mut self, components: &[String], key: &Reference) -> FsResult<&mut MemDir> {
        let mut node = self;
        for component in components {
            match node {
                MemNode::Dir(dir) => {
                    if !dir.entries.contains_key(component) {
                        dir.mtime = Utc::now();
                    }
                    node = dir
                        .entries
                        .entry(component.clone())
                        .or_insert_with(|| MemNode::Dir(MemDir::new()));
                }
                MemNode::File(_) => return Err(FsError::NotADirectory(key.to_string())),
            }
        }
        match node {
            MemNode::Dir(dir) => Ok(dir),
            MemNode::File(_) => Err(FsError::NotADirectory(key.to_string())),
        }
    }
}

/// Path components of a reference, as tree keys
pub fn components(reference: &Reference) -> Vec<String> {
    reference
        .path
        .segments()
        .iter()
        .map(|segment| segment.to_string())
        .collect()
}

fn lock(root: &Mutex<MemNode>) -> MutexGuard<'_, MemNode> {
    root.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A stream over a buffered copy of a [`MemFile`]
pub struct MemStream {
    root: Arc<Mutex<MemNode>>,
    components: Vec<String>,
    buffer: Cursor<Vec<u8>>,
    writable: bool,
}

impl MemStream {
    fn store(&mut self) -> io::Result<()> {
        if !self.writable {
            return Ok(());
        }
        let Some((name, parent)) = self.components.split_last() else {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "root is a folder"));
        };
        let mut root = lock(&self.root);
        match root.find_mut(parent) {
            Some(MemNode::Dir(dir)) => {
                let now = Utc::now();
                dir.entries.insert(
                    name.clone(),
                    MemNode::File(MemFile {
                        data: self.buffer.get_ref().clone(),
                        mtime: now,
                    }),
                );
                dir.mtime = now;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent folder of {} is gone", name),
            )),
        }
    }
}

impl Read for MemStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.buffer.read(buf)
    }
}

impl Seek for MemStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.buffer.seek(pos)
    }
}

impl Write for MemStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "stream opened for reading",
            ));
        }
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.store()
    }
}

impl Drop for MemStream {
    fn drop(&mut self) {
        if let Err(error) = self.store() {
            warn!("memory stream lost on close: {}", error);
        }
    }
}

/// Filesystem kept entirely in memory
///
/// Clones share the same tree.
#[derive(Debug, Clone)]
pub struct MemFs {
    root: Arc<Mutex<MemNode>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Mutex::new(MemNode::Dir(MemDir::new()))),
        }
    }

    /// Overrides the modification time of a node
    pub fn set_mtime(&self, reference: &Reference, mtime: Timestamp) -> FsResult<()> {
        let mut root = lock(&self.root);
        match root.find_mut(&components(reference)) {
            Some(MemNode::File(file)) => file.mtime = mtime,
            Some(MemNode::Dir(dir)) => dir.mtime = mtime,
            None => return Err(FsError::NotFound(reference.to_string())),
        }
        Ok(())
    }

    /// A copy of the whole tree
    pub fn snapshot(&self) -> MemNode {
        lock(&self.root).clone()
    }

    fn stream(&self, components: Vec<String>, data: Vec<u8>, writable: bool) -> MemStream {
        MemStream {
            root: Arc::clone(&self.root),
            components,
            buffer: Cursor::new(data),
            writable,
        }
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn exists(&self, reference: &Reference) -> bool {
        lock(&self.root).find(&components(reference)).is_some()
    }

    fn is_file(&self, reference: &Reference) -> bool {
        matches!(
            lock(&self.root).find(&components(reference)),
            Some(MemNode::File(_))
        )
    }

    fn is_folder(&self, reference: &Reference) -> bool {
        matches!(
            lock(&self.root).find(&components(reference)),
            Some(MemNode::Dir(_))
        )
    }

    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>> {
        match lock(&self.root).find(&components(reference)) {
            Some(MemNode::Dir(dir)) => Ok(dir.entries.keys().cloned().collect()),
            Some(MemNode::File(_)) => Err(FsError::NotADirectory(reference.to_string())),
            None => Err(FsError::NotFound(reference.to_string())),
        }
    }

    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp> {
        lock(&self.root)
            .find(&components(reference))
            .map(MemNode::mtime)
            .ok_or_else(|| FsError::NotFound(reference.to_string()))
    }

    fn get_size(&self, reference: &Reference) -> FsResult<u64> {
        match lock(&self.root).find(&components(reference)) {
            Some(MemNode::File(file)) => Ok(file.data.len() as u64),
            Some(MemNode::Dir(_)) => Ok(0),
            None => Err(FsError::NotFound(reference.to_string())),
        }
    }

    fn make_file(&self, reference: &Reference) -> FsResult<Box<dyn Stream>> {
        let components = components(reference);
        let Some((name, parent)) = components.split_last() else {
            return Err(FsError::AlreadyExists(reference.to_string()));
        };
        {
            let mut root = lock(&self.root);
            let dir = root.makedirs(parent, reference)?;
            if dir.entries.contains_key(name) {
                return Err(FsError::AlreadyExists(reference.to_string()));
            }
            let now = Utc::now();
            dir.entries.insert(
                name.clone(),
                MemNode::File(MemFile {
                    data: Vec::new(),
                    mtime: now,
                }),
            );
            dir.mtime = now;
        }
        Ok(Box::new(self.stream(components, Vec::new(), true)))
    }

    fn make_folder(&self, reference: &Reference) -> FsResult<()> {
        lock(&self.root).makedirs(&components(reference), reference)?;
        Ok(())
    }

    fn open(&self, reference: &Reference, mode: OpenMode) -> FsResult<Box<dyn Stream>> {
        let components = components(reference);
        let data = match lock(&self.root).find(&components) {
            Some(MemNode::File(file)) => file.data.clone(),
            Some(MemNode::Dir(_)) => return Err(FsError::IsADirectory(reference.to_string())),
            None => return Err(FsError::NotFound(reference.to_string())),
        };
        let stream = match mode {
            OpenMode::Read => self.stream(components, data, false),
            OpenMode::Write => self.stream(components, Vec::new(), true),
            OpenMode::ReadWrite => self.stream(components, data, true),
            OpenMode::Append => {
                let mut stream = self.stream(components, data, true);
                stream
                    .buffer
                    .seek(SeekFrom::End(0))
                    .map_err(|e| FsError::from_io(reference, e))?;
                stream
            }
        };
        Ok(Box::new(stream))
    }

    fn remove(&self, reference: &Reference) -> FsResult<()> {
        let components = components(reference);
        let Some((name, parent)) = components.split_last() else {
            return Err(FsError::PermissionDenied(reference.to_string()));
        };
        let mut root = lock(&self.root);
        let dir = root.dir_mut(parent, reference)?;
        match dir.entries.remove(name) {
            Some(_) => {
                dir.mtime = Utc::now();
                Ok(())
            }
            None => Err(FsError::NotFound(reference.to_string())),
        }
    }

    fn rename(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        let source_components = components(source);
        let target_components = components(target);
        let (Some((source_name, source_parent)), Some((target_name, target_parent))) =
            (source_components.split_last(), target_components.split_last())
        else {
            return Err(FsError::PermissionDenied(source.to_string()));
        };
        if target_components.starts_with(&source_components) {
            return Err(FsError::InvalidKey(target.to_string()));
        }

        let mut root = lock(&self.root);
        if root.find(&source_components).is_none() {
            return Err(FsError::NotFound(source.to_string()));
        }
        if root.find(&target_components).is_some() {
            return Err(FsError::AlreadyExists(target.to_string()));
        }
        root.makedirs(target_parent, target)?;

        let now = Utc::now();
        let node = {
            let dir = root.dir_mut(source_parent, source)?;
            let node = dir
                .entries
                .remove(source_name)
                .ok_or_else(|| FsError::NotFound(source.to_string()))?;
            dir.mtime = now;
            node
        };
        let dir = root.dir_mut(target_parent, target)?;
        dir.entries.insert(target_name.clone(), node);
        dir.mtime = now;
        Ok(())
    }

    fn normalize_key(&self, reference: &Reference) -> Reference {
        let path = uri::Path::root()
            .resolve2(&reference.path)
            .without_trailing_slash();
        Reference {
            scheme: reference.scheme.clone(),
            authority: None,
            path,
            query: None,
            fragment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> Reference {
        Reference::parse(raw)
    }

    fn write(fs: &MemFs, raw: &str, data: &[u8]) {
        let mut stream = fs.make_file(&key(raw)).unwrap();
        stream.write_all(data).unwrap();
    }

    fn read(fs: &MemFs, raw: &str) -> String {
        let mut stream = fs.open(&key(raw), OpenMode::Read).unwrap();
        let mut text = String::new();
        stream.read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn test_make_file_creates_parents() {
        let fs = MemFs::new();
        write(&fs, "mem:/a/b/c.txt", b"hello");

        assert!(fs.is_folder(&key("mem:/a")));
        assert!(fs.is_folder(&key("mem:/a/b")));
        assert!(fs.is_file(&key("mem:/a/b/c.txt")));
        assert_eq!(read(&fs, "mem:/a/b/c.txt"), "hello");
        assert_eq!(fs.get_size(&key("mem:/a/b/c.txt")).unwrap(), 5);
    }

    #[test]
    fn test_make_file_fails_if_exists() {
        let fs = MemFs::new();
        write(&fs, "mem:/x", b"1");
        let result = fs.make_file(&key("mem:/x"));
        assert!(matches!(result, Err(FsError::AlreadyExists(_))));
    }

    #[test]
    fn test_make_file_under_file() {
        let fs = MemFs::new();
        write(&fs, "mem:/x", b"1");
        let result = fs.make_file(&key("mem:/x/y"));
        assert!(matches!(result, Err(FsError::NotADirectory(_))));
    }

    #[test]
    fn test_stream_flushes_on_drop() {
        let fs = MemFs::new();
        {
            let mut stream = fs.make_file(&key("mem:/doc")).unwrap();
            stream.write_all(b"abc").unwrap();
            assert_eq!(fs.get_size(&key("mem:/doc")).unwrap(), 0);
        }
        assert_eq!(read(&fs, "mem:/doc"), "abc");
    }

    #[test]
    fn test_open_modes() {
        let fs = MemFs::new();
        write(&fs, "mem:/doc", b"hello");

        {
            let mut stream = fs.open(&key("mem:/doc"), OpenMode::Append).unwrap();
            stream.write_all(b" world").unwrap();
        }
        assert_eq!(read(&fs, "mem:/doc"), "hello world");

        {
            let mut stream = fs.open(&key("mem:/doc"), OpenMode::ReadWrite).unwrap();
            stream.write_all(b"J").unwrap();
        }
        assert_eq!(read(&fs, "mem:/doc"), "Jello world");

        {
            let mut stream = fs.open(&key("mem:/doc"), OpenMode::Write).unwrap();
            stream.write_all(b"bye").unwrap();
        }
        assert_eq!(read(&fs, "mem:/doc"), "bye");

        let mut stream = fs.open(&key("mem:/doc"), OpenMode::Read).unwrap();
        assert!(stream.write_all(b"nope").is_err());
    }

    #[test]
    fn test_open_errors() {
        let fs = MemFs::new();
        fs.make_folder(&key("mem:/dir")).unwrap();
        assert!(matches!(
            fs.open(&key("mem:/dir"), OpenMode::Read),
            Err(FsError::IsADirectory(_))
        ));
        assert!(matches!(
            fs.open(&key("mem:/missing"), OpenMode::Read),
            Err(FsError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_is_recursive() {
        let fs = MemFs::new();
        write(&fs, "mem:/a/b", b"1");
        write(&fs, "mem:/a/c/d", b"2");
        fs.remove(&key("mem:/a")).unwrap();
        assert!(!fs.exists(&key("mem:/a")));
        assert!(!fs.exists(&key("mem:/a/c/d")));
        assert!(matches!(fs.remove(&key("mem:/a")), Err(FsError::NotFound(_))));
    }

    #[test]
    fn test_get_names() {
        let fs = MemFs::new();
        write(&fs, "mem:/f/b", b"");
        write(&fs, "mem:/f/a", b"");
        assert_eq!(fs.get_names(&key("mem:/f")).unwrap(), vec!["a", "b"]);
        assert!(matches!(
            fs.get_names(&key("mem:/f/a")),
            Err(FsError::NotADirectory(_))
        ));
    }

    #[test]
    fn test_move_renames() {
        let fs = MemFs::new();
        write(&fs, "mem:/x", b"payload");
        fs.move_to(&key("mem:/x"), &key("mem:/sub/y")).unwrap();
        assert!(!fs.exists(&key("mem:/x")));
        assert_eq!(read(&fs, "mem:/sub/y"), "payload");
    }

    #[test]
    fn test_move_into_folder() {
        let fs = MemFs::new();
        write(&fs, "mem:/x", b"payload");
        fs.make_folder(&key("mem:/dest")).unwrap();
        fs.move_to(&key("mem:/x"), &key("mem:/dest")).unwrap();
        assert_eq!(read(&fs, "mem:/dest/x"), "payload");
    }

    #[test]
    fn test_rename_into_itself_is_refused() {
        let fs = MemFs::new();
        fs.make_folder(&key("mem:/a")).unwrap();
        let result = fs.rename(&key("mem:/a"), &key("mem:/a/b"));
        assert!(matches!(result, Err(FsError::InvalidKey(_))));
        assert!(fs.is_folder(&key("mem:/a")));
    }

    #[test]
    fn test_copy_folder() {
        let fs = MemFs::new();
        write(&fs, "mem:/a/b", b"1");
        write(&fs, "mem:/a/c/d", b"2");
        fs.copy(&key("mem:/a"), &key("mem:/z")).unwrap();
        assert_eq!(read(&fs, "mem:/z/b"), "1");
        assert_eq!(read(&fs, "mem:/z/c/d"), "2");
        assert!(fs.exists(&key("mem:/a/c/d")));
    }

    #[test]
    fn test_traverse() {
        let fs = MemFs::new();
        write(&fs, "mem:/t/b", b"");
        write(&fs, "mem:/t/a/x", b"");
        let found: Vec<String> = fs
            .traverse(&key("mem:/t"))
            .unwrap()
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(found, vec!["mem:/t", "mem:/t/a", "mem:/t/a/x", "mem:/t/b"]);
    }

    #[test]
    fn test_set_mtime() {
        let fs = MemFs::new();
        write(&fs, "mem:/doc", b"");
        let later = Utc::now() + chrono::Duration::seconds(60);
        fs.set_mtime(&key("mem:/doc"), later).unwrap();
        assert_eq!(fs.get_mtime(&key("mem:/doc")).unwrap(), later);
    }

    #[test]
    fn test_mimetype() {
        let fs = MemFs::new();
        write(&fs, "mem:/notes.txt", b"");
        write(&fs, "mem:/blob", b"");
        fs.make_folder(&key("mem:/dir.txt")).unwrap();
        assert_eq!(fs.get_mimetype(&key("mem:/notes.txt")).unwrap(), "text/plain");
        assert_eq!(
            fs.get_mimetype(&key("mem:/blob")).unwrap(),
            "application/octet-stream"
        );
        assert_eq!(
            fs.get_mimetype(&key("mem:/dir.txt")).unwrap(),
            "application/x-not-regular-file"
        );
    }

    #[test]
    fn test_normalize_key() {
        let fs = MemFs::new();
        let once = fs.normalize_key(&key("mem://host/a/./b/"));
        assert_eq!(once.to_string(), "mem:/a/b");
        assert_eq!(fs.normalize_key(&once), once);
        assert_eq!(fs.normalize_key(&key("mem:doc")).to_string(), "mem:/doc");
    }
}
