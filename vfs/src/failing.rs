//! # Failing File System
//!
//! A FileSystem wrapper that can simulate failures for testing the commit
//! protocol. Useful for exercising rename fallbacks, retries and aborts
//! without a misbehaving disk.

use crate::base::{FileSystem, OpenMode, Stream};
use crate::error::{FsError, FsResult};
use crate::Timestamp;
use std::io;
use std::sync::{Mutex, PoisonError};
use uri::Reference;

/// Policy for when failures should occur
#[derive(Debug, Clone)]
pub enum FailurePolicy {
    /// Never fail (passthrough)
    Never,
    /// Native rename is not supported
    RefuseRename,
    /// Fail after N write operations
    AfterWrites(usize),
    /// Fail every write touching one of these paths
    OnPaths(Vec<String>),
}

#[derive(Debug)]
struct FailureState {
    policy: FailurePolicy,
    write_count: usize,
}

/// Wrapper around a FileSystem that can simulate failures
///
/// Writes are `make_file`, `make_folder`, `open` in a write mode, `remove`
/// and `rename`. Reads always pass through.
pub struct FailingFs<F: FileSystem> {
    inner: F,
    state: Mutex<FailureState>,
}

impl<F: FileSystem> FailingFs<F> {
    /// Create a new failing filesystem with the given policy
    pub fn new(inner: F, policy: FailurePolicy) -> Self {
        Self {
            inner,
            state: Mutex::new(FailureState {
                policy,
                write_count: 0,
            }),
        }
    }

    /// Get the underlying filesystem (for inspection)
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Get the number of writes that have gone through
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_count
    }

    /// Reset the failure policy
    pub fn set_policy(&self, policy: FailurePolicy) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.policy = policy;
        state.write_count = 0;
    }

    /// Counts a write, or fails it according to the policy
    fn check_write(&self, reference: &Reference) -> FsResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let fail = match &state.policy {
            FailurePolicy::Never | FailurePolicy::RefuseRename => false,
            FailurePolicy::AfterWrites(n) => state.write_count >= *n,
            FailurePolicy::OnPaths(paths) => {
                let path = reference.path.to_string();
                paths.iter().any(|p| *p == path)
            }
        };
        if fail {
            return Err(FsError::Io {
                key: reference.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "injected failure"),
            });
        }
        state.write_count += 1;
        Ok(())
    }

    fn refuses_rename(&self) -> bool {
        matches!(
            self.state
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .policy,
            FailurePolicy::RefuseRename
        )
    }
}

impl<F: FileSystem> FileSystem for FailingFs<F> {
    fn exists(&self, reference: &Reference) -> bool {
        self.inner.exists(reference)
    }

    fn is_file(&self, reference: &Reference) -> bool {
        self.inner.is_file(reference)
    }

    fn is_folder(&self, reference: &Reference) -> bool {
        self.inner.is_folder(reference)
    }

    fn get_names(&self, reference: &Reference) -> FsResult<Vec<String>> {
        self.inner.get_names(reference)
    }

    fn get_mtime(&self, reference: &Reference) -> FsResult<Timestamp> {
        self.inner.get_mtime(reference)
    }

    fn get_size(&self, reference: &Reference) -> FsResult<u64> {
        self.inner.get_size(reference)
    }

    fn get_mimetype(&self, reference: &Reference) -> FsResult<String> {
        self.inner.get_mimetype(reference)
    }

    fn make_file(&self, reference: &Reference) -> FsResult<Box<dyn Stream>> {
        self.check_write(reference)?;
        self.inner.make_file(reference)
    }

    fn make_folder(&self, reference: &Reference) -> FsResult<()> {
        self.check_write(reference)?;
        self.inner.make_folder(reference)
    }

    fn open(&self, reference: &Reference, mode: OpenMode) -> FsResult<Box<dyn Stream>> {
        if mode.is_write() {
            self.check_write(reference)?;
        }
        self.inner.open(reference, mode)
    }

    fn remove(&self, reference: &Reference) -> FsResult<()> {
        self.check_write(reference)?;
        self.inner.remove(reference)
    }

    fn rename(&self, source: &Reference, target: &Reference) -> FsResult<()> {
        if self.refuses_rename() {
            return Err(FsError::unsupported(source, "rename"));
        }
        self.check_write(target)?;
        self.inner.rename(source, target)
    }

    fn normalize_key(&self, reference: &Reference) -> Reference {
        self.inner.normalize_key(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memfs::MemFs;
    use std::io::{Read, Write};

    fn key(raw: &str) -> Reference {
        Reference::parse(raw)
    }

    #[test]
    fn test_failing_fs_never() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::Never);
        assert!(failing.make_file(&key("mem:/a")).is_ok());
        assert!(failing.make_folder(&key("mem:/b")).is_ok());
        assert_eq!(failing.write_count(), 2);
    }

    #[test]
    fn test_failing_fs_after_writes() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::AfterWrites(2));
        assert!(failing.make_file(&key("mem:/a")).is_ok());
        assert!(failing.make_file(&key("mem:/b")).is_ok());
        assert!(matches!(
            failing.make_file(&key("mem:/c")),
            Err(FsError::Io { .. })
        ));
        assert!(!failing.inner().exists(&key("mem:/c")));
    }

    #[test]
    fn test_failing_fs_on_paths() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::OnPaths(vec!["/bad".into()]));
        assert!(failing.make_file(&key("mem:/good")).is_ok());
        assert!(failing.make_file(&key("mem:/bad")).is_err());
    }

    #[test]
    fn test_reads_never_fail() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::Never);
        failing
            .make_file(&key("mem:/doc"))
            .unwrap()
            .write_all(b"x")
            .unwrap();
        failing.set_policy(FailurePolicy::AfterWrites(0));

        let mut text = String::new();
        failing
            .open(&key("mem:/doc"), OpenMode::Read)
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "x");
        assert!(failing.open(&key("mem:/doc"), OpenMode::Write).is_err());
    }

    #[test]
    fn test_refused_rename_falls_back_to_copy() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::RefuseRename);
        failing
            .make_file(&key("mem:/x"))
            .unwrap()
            .write_all(b"payload")
            .unwrap();

        assert!(matches!(
            failing.rename(&key("mem:/x"), &key("mem:/y")),
            Err(FsError::Unsupported { .. })
        ));
        failing.move_to(&key("mem:/x"), &key("mem:/y")).unwrap();

        assert!(!failing.exists(&key("mem:/x")));
        assert_eq!(failing.get_size(&key("mem:/y")).unwrap(), 7);
    }

    #[test]
    fn test_set_policy_resets_count() {
        let failing = FailingFs::new(MemFs::new(), FailurePolicy::Never);
        failing.make_folder(&key("mem:/a")).unwrap();
        failing.set_policy(FailurePolicy::AfterWrites(1));
        assert_eq!(failing.write_count(), 0);
        assert!(failing.make_folder(&key("mem:/b")).is_ok());
        assert!(failing.make_folder(&key("mem:/c")).is_err());
    }
}
