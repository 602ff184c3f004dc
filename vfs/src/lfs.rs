//! Local filesystem, the `file:` scheme

use crate::base::{copy_across, FileSystem, OpenMode, Stream};
use crate::error::{FsError, FsResult};
use crate::Timestamp;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;
use uri::{Authority, Reference};

/// Backend over the host filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }

    /// The host path of a `file:` reference
    ///
    /// `file:///C:/x` maps to `C:/x`, everything else keeps its leading slash.
    pub fn os_path(reference: &Reference) -> PathBuf {
        let path = reference.path.to_string();
        let is_drive = reference
            .path
            .segments()
            .first()
            .map_or(false, |s| s.name.len() == 2 && s.name.ends_with(':'));
        match path.strip_prefix('/') {
            Some(stripped) if is_drive => PathBuf::from(stripped),
            _ => PathBuf::from(path),
        }
    }
}

fn file_stream(file: File) -> Box<dyn Stream> {
    Box::new(file)
}

impl FileSystem for LocalFs {
    fn exists(&self, reference: &Reference) -> bool {
        Self::os_path(reference).exists()
    }

    fn is_file(&self, reference: &Reference) -> bool {
        Self::os_path(reference).is_file()
    }

    fn is_folder(&self, reference: &Reference) -> bool {
        Self::os_path(reference).is_dir()
    }

    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>> {
        let path = Self::os_path(reference);
        if path.is_file() {
            return Err(FsError::NotADirectory(reference.to_string()));
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&path).map_err(|e| FsError::from_io(reference, e))? {
            let entry = entry.map_err(|e| FsError::from_io(reference, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp> {
        let modified = fs::metadata(Self::os_path(reference))
            .and_then(|metadata| metadata.modified())
            .map_err(|e| FsError::from_io(reference, e))?;
        Ok(Timestamp::from(modified))
    }

    fn get_size(&self, reference: &Reference) -> FsResult<u64> {
        fs::metadata(Self::os_path(reference))
            .map(|metadata| metadata.len())
            .map_err(|e| FsError::from_io(reference, e))
    }

    fn make_file(&self, reference: &Reference) -> FsResult<Box<dyn Stream>> {
        let path = Self::os_path(reference);
        if path.exists() {
            return Err(FsError::AlreadyExists(reference.to_string()));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::from_io(reference, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| FsError::from_io(reference, e))?;
        Ok(file_stream(file))
    }

    fn make_folder(&self, reference: &Reference) -> FsResult<()> {
        let path = Self::os_path(reference);
        if path.is_file() {
            return Err(FsError::NotADirectory(reference.to_string()));
        }
        fs::create_dir_all(path).map_err(|e| FsError::from_io(reference, e))
    }

    fn open(&self, reference: &Reference, mode: OpenMode) -> FsResult<Box<dyn Stream>> {
        let path = Self::os_path(reference);
        if path.is_dir() {
            return Err(FsError::IsADirectory(reference.to_string()));
        }
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Read => options.read(true),
            OpenMode::Write => options.write(true).truncate(true),
            OpenMode::ReadWrite => options.read(true).write(true),
            OpenMode::Append => options.read(true).write(true),
        };
        let mut file = options
            .open(&path)
            .map_err(|e| FsError::from_io(reference, e))?;
        if mode == OpenMode::Append {
            file.seek(SeekFrom::End(0))
                .map_err(|e| FsError::from_io(reference, e))?;
        }
        Ok(file_stream(file))
    }

    fn remove(&self, reference: &Reference) -> FsResult<()> {
        let path = Self::os_path(reference);
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| FsError::from_io(reference, e))
    }

    fn rename(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        let source_path = Self::os_path(source);
        let target_path = Self::os_path(target);
        if !source_path.exists() {
            return Err(FsError::NotFound(source.to_string()));
        }
        if target_path.exists() {
            return Err(FsError::AlreadyExists(target.to_string()));
        }
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::from_io(target, e))?;
        }
        fs::rename(&source_path, &target_path).map_err(|e| FsError::from_io(source, e))
    }

    fn copy(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        let source_path = Self::os_path(source);
        let target_path = Self::os_path(target);
        if target_path.exists() {
            return Err(FsError::AlreadyExists(target.to_string()));
        }
        if source_path.is_dir() {
            return copy_across(self, source, self, target);
        }
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|e| FsError::from_io(target, e))?;
        }
        fs::copy(&source_path, &target_path)
            .map(|_| ())
            .map_err(|e| FsError::from_io(source, e))
    }

    fn normalize_key(&self, reference: &Reference) -> Reference {
        let path = uri::Path::root()
            .resolve2(&reference.path)
            .without_trailing_slash();
        Reference {
            scheme: "file".to_string(),
            authority: Some(Authority::default()),
            path,
            query: None,
            fragment: None,
        }
    }
}
