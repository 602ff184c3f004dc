//! Read-only mount of a tar archive
//!
//! The archive (plain or gzip compressed) is unpacked into an in-memory tree
//! when mounted. Register the mount under a scheme of your choice to browse
//! it with keys such as `archive:/docs/readme.txt`.

use crate::base::{FileSystem, OpenMode, ReadOnlyStream, Stream};
use crate::error::{FsError, FsResult};
use crate::memfs::{components, MemDir, MemFile, MemNode};
use crate::Timestamp;
use chrono::{TimeZone, Utc};
use flate2::read::GzDecoder;
use log::debug;
use std::io::{Cursor, Read};
use tar::Archive;
use uri::Reference;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Clone)]
pub struct ArchiveFs {
    root: MemNode,
}

fn mtime_of(seconds: u64) -> Timestamp {
    Utc.timestamp_opt(seconds as i64, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

impl ArchiveFs {
    /// Mounts the archive stored at `path` on the host
    pub fn open(path: impl AsRef<std::path::Path>) -> FsResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| FsError::from_io(path.display(), e))?;
        Self::from_bytes(data)
    }

    /// Mounts an archive held in memory
    pub fn from_bytes(data: Vec<u8>) -> FsResult<Self> {
        if data.starts_with(&GZIP_MAGIC) {
            Self::from_reader(GzDecoder::new(Cursor::new(data)))
        } else {
            Self::from_reader(Cursor::new(data))
        }
    }

    pub fn from_reader<R: Read>(reader: R) -> FsResult<Self> {
        let mut root = MemNode::Dir(MemDir::new());
        let mut archive = Archive::new(reader);
        let entries = archive
            .entries()
            .map_err(|e| FsError::from_io("archive", e))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| FsError::from_io("archive", e))?;
            let name = entry
                .path()
                .map_err(|e| FsError::from_io("archive", e))?
                .to_string_lossy()
                .into_owned();
            let reference = Reference::parse(&format!("archive:/{}", name));
            let parts = components(&reference);
            let mtime = mtime_of(entry.header().mtime().unwrap_or(0));
            let entry_type = entry.header().entry_type();

            if entry_type.is_dir() {
                root.makedirs(&parts, &reference)?.mtime = mtime;
                continue;
            }
            if !entry_type.is_file() {
                debug!("skipping archive entry {} ({:?})", name, entry_type);
                continue;
            }
            let Some((file_name, parent)) = parts.split_last() else {
                continue;
            };
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| FsError::from_io(&reference, e))?;
            root.makedirs(parent, &reference)?
                .entries
                .insert(file_name.clone(), MemNode::File(MemFile { data, mtime }));
        }
        Ok(Self { root })
    }

    fn read_only(reference: &Reference) -> FsError {
        FsError::PermissionDenied(format!("{} is in a read-only archive", reference))
    }
}

impl FileSystem for ArchiveFs {
    fn exists(&self, reference: &Reference) -> bool {
        self.root.find(&components(reference)).is_some()
    }

    fn is_file(&self, reference: &Reference) -> bool {
        matches!(
            self.root.find(&components(reference)),
            Some(MemNode::File(_))
        )
    }

    fn is_folder(&self, reference: &Reference) -> bool {
        matches!(
            self.root.find(&components(reference)),
            Some(MemNode::Dir(_))
        )
    }

    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>> {
        match self.root.find(&components(reference)) {
            Some(MemNode::Dir(dir)) => Ok(dir.entries.keys().cloned().collect()),
            Some(MemNode::File(_)) => Err(FsError::NotADirectory(reference.to_string())),
            None => Err(FsError::NotFound(reference.to_string())),
        }
    }

    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp> {
        self.root
            .find(&components(reference))
            .map(MemNode::mtime)
            .ok_or_else(|| FsError::NotFound(reference.to_string()))
    }

    fn get_size(&self, reference: &Reference) -> FsResult<u64> {
        match self.root.find(&components(reference)) {
            Some(MemNode::File(file)) => Ok(file.data.len() as u64),
            Some(MemNode::Dir(_)) => Ok(0),
            None => Err(FsError::NotFound(reference.to_string())),
        }
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
        match self.root.find(&components(reference)) {
            Some(MemNode::File(file)) => Ok(Box::new(ReadOnlyStream::new(file.data.clone()))),
            Some(MemNode::Dir(_)) => Err(FsError::IsADirectory(reference.to_string())),
            None => Err(FsError::NotFound(reference.to_string())),
        }
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
