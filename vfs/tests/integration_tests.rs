//! Integration tests for the virtual file system
//!
//! These tests drive the key-based api across several backends:
//! - Local disk through plain paths
//! - Memory and archive mounts under their own schemes
//! - Moves between backends
//! - Rename fallback on a backend without native rename

use std::io::{Read, Write};
use std::sync::{Arc, Once};
use uuid::Uuid;
use vfs::api;
use vfs::{ErrorKind, FailingFs, FailurePolicy, FileSystem, MemFs, OpenMode};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .is_test(true)
        .try_init();
    });
}

fn mount(prefix: &str, file_system: Arc<dyn FileSystem>) -> String {
    let scheme = format!("{}{}", prefix, Uuid::new_v4().simple());
    vfs::register_file_system(&scheme, file_system);
    scheme
}

fn write(key: &str, data: &[u8]) {
    let mut stream = api::make_file(key).unwrap();
    stream.write_all(data).unwrap();
    stream.flush().unwrap();
}

#[test]
fn test_local_paths_are_file_keys() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    let key = path.to_string_lossy().into_owned();

    write(&key, b"local");
    assert!(api::is_file(&key).unwrap());
    assert!(api::normalize_key(&key).unwrap().starts_with("file:///"));
    assert_eq!(api::read_bytes(&key).unwrap(), b"local");
    assert_eq!(api::get_size(&key).unwrap(), 5);

    api::remove(&key).unwrap();
    assert!(!api::exists(&key).unwrap());
}

#[test]
fn test_make_file_refuses_existing_key() {
    init_logging();
    let scheme = mount("vfsexists", Arc::new(MemFs::new()));
    let key = format!("{}:/a", scheme);
    write(&key, b"1");

    let error = api::make_file(&key).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn test_move_tree_from_disk_to_memory() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_string_lossy().into_owned();
    write(&format!("{}/tree/a.txt", root), b"a");
    write(&format!("{}/tree/sub/b.json", root), b"{}");

    let scheme = mount("vfsmove", Arc::new(MemFs::new()));
    api::move_to(&format!("{}/tree", root), &format!("{}:/moved", scheme)).unwrap();

    assert!(!api::exists(&format!("{}/tree", root)).unwrap());
    assert_eq!(
        api::read_bytes(&format!("{}:/moved/a.txt", scheme)).unwrap(),
        b"a"
    );
    assert_eq!(
        api::get_mimetype(&format!("{}:/moved/sub/b.json", scheme)).unwrap(),
        "application/json"
    );
    let walked: Vec<String> = api::traverse(&format!("{}:/moved", scheme))
        .unwrap()
        .iter()
        .map(|reference| reference.path.to_string())
        .collect();
    assert_eq!(
        walked,
        vec!["/moved", "/moved/a.txt", "/moved/sub", "/moved/sub/b.json"]
    );
}

#[test]
fn test_move_without_native_rename() {
    init_logging();
    let failing = Arc::new(FailingFs::new(MemFs::new(), FailurePolicy::RefuseRename));
    let scheme = mount("vfsnorename", failing.clone());
    write(&format!("{}:/src/doc", scheme), b"content");

    api::move_to(&format!("{}:/src", scheme), &format!("{}:/dst", scheme)).unwrap();

    assert!(!api::exists(&format!("{}:/src", scheme)).unwrap());
    assert_eq!(
        api::read_bytes(&format!("{}:/dst/doc", scheme)).unwrap(),
        b"content"
    );
}

#[test]
fn test_failed_write_leaves_backend_untouched() {
    init_logging();
    let failing = Arc::new(FailingFs::new(
        MemFs::new(),
        FailurePolicy::OnPaths(vec!["/locked".to_string()]),
    ));
    let scheme = mount("vfslocked", failing.clone());

    let error = api::make_file(&format!("{}:/locked", scheme)).err().unwrap();
    assert_eq!(error.kind(), ErrorKind::Io);
    assert!(!failing.inner().exists(&uri::Reference::parse(&format!("{}:/locked", scheme))));
}

#[test]
fn test_append_and_read_write_modes() {
    init_logging();
    let scheme = mount("vfsmodes", Arc::new(MemFs::new()));
    let key = format!("{}:/log", scheme);
    write(&key, b"one");

    {
        let mut stream = api::open(&key, OpenMode::Append).unwrap();
        stream.write_all(b" two").unwrap();
    }
    let mut text = String::new();
    api::open(&key, OpenMode::Read)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    assert_eq!(text, "one two");

    {
        let mut stream = api::open(&key, OpenMode::Write).unwrap();
        stream.write_all(b"reset").unwrap();
    }
    assert_eq!(api::read_bytes(&key).unwrap(), b"reset");
}

#[test]
fn test_folder_mimetype_and_names() {
    init_logging();
    let scheme = mount("vfsnames", Arc::new(MemFs::new()));
    write(&format!("{}:/dir/b", scheme), b"");
    write(&format!("{}:/dir/a", scheme), b"");

    assert_eq!(
        api::get_mimetype(&format!("{}:/dir", scheme)).unwrap(),
        vfs::FOLDER_MIMETYPE
    );
    assert_eq!(
        api::get_names(&format!("{}:/dir", scheme)).unwrap(),
        vec!["a", "b"]
    );
    let error = api::get_names(&format!("{}:/dir/a", scheme)).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotADirectory);
}
