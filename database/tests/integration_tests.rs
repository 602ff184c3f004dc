//! Integration tests for the handler database
//!
//! These tests run read-write databases over scratch backends:
//! - Creating, changing, moving and deleting, then committing
//! - Outside changes detected through mtimes
//! - Commit retries, stalls and failures injected by FailingFs
//! - Abort restoring the backend view
//! - Cache bounds and eviction of held handlers

use database::{Database, DatabaseConfig, DatabaseError, RoDatabase, RwDatabase};
use handlers::{Handler, HandlerState, JSON};
use serde_json::json;
use std::io::Write;
use std::rc::Rc;
use std::sync::{Arc, Once};
use uri::Reference;
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

/// A memory backend mounted under a fresh scheme
struct Backend {
    fs: MemFs,
    scheme: String,
}

impl Backend {
    fn new() -> Self {
        let fs = MemFs::new();
        let scheme = mount(Arc::new(fs.clone()));
        Self { fs, scheme }
    }

    fn failing(policy: FailurePolicy) -> Self {
        let fs = MemFs::new();
        let scheme = mount(Arc::new(FailingFs::new(fs.clone(), policy)));
        Self { fs, scheme }
    }

    fn key(&self, path: &str) -> String {
        format!("{}:{}", self.scheme, path)
    }

    fn write(&self, path: &str, data: &str) {
        let mut stream = api::make_file(&self.key(path)).unwrap();
        stream.write_all(data.as_bytes()).unwrap();
        stream.flush().unwrap();
    }

    fn write_over(&self, path: &str, data: &str) {
        let mut stream = api::open(&self.key(path), OpenMode::Write).unwrap();
        stream.write_all(data.as_bytes()).unwrap();
        stream.flush().unwrap();
    }

    fn read(&self, path: &str) -> String {
        String::from_utf8(api::read_bytes(&self.key(path)).unwrap()).unwrap()
    }

    fn exists(&self, path: &str) -> bool {
        api::exists(&self.key(path)).unwrap()
    }

    fn bump_mtime(&self, path: &str) {
        let key = self.key(path);
        let mtime = api::get_mtime(&key).unwrap() + chrono::Duration::seconds(60);
        self.fs.set_mtime(&Reference::parse(&key), mtime).unwrap();
    }

    /// Every key with its content and mtime
    fn snapshot(&self) -> Vec<(String, Option<Vec<u8>>, String)> {
        api::traverse(&self.key("/"))
            .unwrap()
            .into_iter()
            .map(|reference| {
                let key = reference.to_string();
                let data = if api::is_file(&key).unwrap() {
                    Some(api::read_bytes(&key).unwrap())
                } else {
                    None
                };
                let mtime = api::get_mtime(&key).unwrap().to_rfc3339();
                (key, data, mtime)
            })
            .collect()
    }

    fn open(&self, config: DatabaseConfig) -> RwDatabase {
        RwDatabase::new(&self.key("/"), config).unwrap()
    }
}

fn mount(file_system: Arc<dyn FileSystem>) -> String {
    let scheme = format!("db{}", Uuid::new_v4().simple());
    vfs::register_file_system(&scheme, file_system);
    scheme
}

fn text(db: &mut RwDatabase, key: &str) -> String {
    let handler = db.get_handler(key).unwrap();
    let mut handler = handler.borrow_mut();
    handler.get_text().unwrap().to_string()
}

/// What a caller can observe through the read API
fn observe(db: &mut RwDatabase, keys: &[&str]) -> Vec<(bool, Option<String>)> {
    keys.iter()
        .map(|key| {
            let present = db.has_handler(key).unwrap();
            let content = db.get_handler_soft(key).unwrap().map(|handler| {
                let mut handler = handler.borrow_mut();
                if handler.is_folder() {
                    handler.get_names().unwrap().join(",")
                } else {
                    handler.get_text().unwrap().to_string()
                }
            });
            (present, content)
        })
        .collect()
}

#[test]
fn test_create_mutate_commit() {
    init_logging();
    let backend = Backend::new();
    let mut db = backend.open(DatabaseConfig::default());

    db.set_handler("/doc", Handler::text("hello")).unwrap();
    assert_eq!(text(&mut db, "/doc"), "hello");
    assert!(db.has_changed());
    assert!(!backend.exists("/doc"));

    db.save_changes().unwrap();
    assert!(!db.has_changed());
    assert_eq!(backend.read("/doc"), "hello");

    let handler = db.get_handler("/doc").unwrap();
    assert_eq!(handler.borrow().state(), HandlerState::Clean);
}

#[test]
fn test_outside_change_reloads_clean_handler() {
    init_logging();
    let backend = Backend::new();
    backend.write("/doc", "v1");
    let mut db = backend.open(DatabaseConfig::default());
    assert_eq!(text(&mut db, "/doc"), "v1");

    backend.write_over("/doc", "v2");
    backend.bump_mtime("/doc");
    let handler = db.get_handler("/doc").unwrap();
    assert_eq!(handler.borrow().state(), HandlerState::Phantom);
    assert_eq!(handler.borrow_mut().get_text().unwrap(), "v2");
    assert_eq!(handler.borrow().state(), HandlerState::Clean);
}

#[test]
fn test_outside_change_conflicts_with_modified_handler() {
    init_logging();
    let backend = Backend::new();
    backend.write("/doc", "v1");
    let mut db = backend.open(DatabaseConfig::default());
    db.touch_handler("/doc").unwrap();

    backend.bump_mtime("/doc");
    let error = db.get_handler("/doc").unwrap_err();
    assert!(matches!(error, DatabaseError::Conflict(_)));
    assert_eq!(error.kind(), ErrorKind::Conflict);

    db.abort_changes();
    assert_eq!(text(&mut db, "/doc"), "v1");
}

#[test]
fn test_outside_removal_conflicts_with_modified_handler() {
    init_logging();
    let backend = Backend::new();
    backend.write("/doc", "v1");
    let mut db = backend.open(DatabaseConfig::default());
    db.touch_handler("/doc").unwrap();

    api::remove(&backend.key("/doc")).unwrap();
    assert_eq!(db.get_handler("/doc").unwrap_err().kind(), ErrorKind::Conflict);
}

#[test]
fn test_folder_delete() {
    init_logging();
    let backend = Backend::new();
    let mut db = backend.open(DatabaseConfig::default());

    db.set_handler("/a/b", Handler::text("b")).unwrap();
    db.set_handler("/a/c", Handler::text("c")).unwrap();
    assert_eq!(db.get_handler_names("/a").unwrap(), vec!["b", "c"]);
    db.del_handler("/a").unwrap();
    db.save_changes().unwrap();

    assert!(!backend.exists("/a"));
    assert!(!backend.exists("/a/b"));
    assert!(!backend.exists("/a/c"));
    assert!(!db.has_handler("/a").unwrap());
}

#[test]
fn test_committed_folder_delete() {
    init_logging();
    let backend = Backend::new();
    backend.write("/a/b", "b");
    backend.write("/a/c", "c");
    let mut db = backend.open(DatabaseConfig::default());

    db.touch_handler("/a/b").unwrap();
    db.set_handler("/a/d", Handler::text("d")).unwrap();
    db.del_handler("/a").unwrap();
    assert!(!db.has_handler("/a/b").unwrap());
    assert!(db.get_handler_soft("/a").unwrap().is_none());

    db.save_changes().unwrap();
    assert!(!backend.exists("/a"));
}

#[test]
fn test_rename_without_native_rename() {
    init_logging();
    // Commits write the target and remove the source, never calling the
    // backend rename; vfs tests cover api::move_to under this policy
    let backend = Backend::failing(FailurePolicy::RefuseRename);
    backend.write("/x", "payload");
    let mut db = backend.open(DatabaseConfig::default());

    db.move_handler("/x", "/y").unwrap();
    assert!(!db.has_handler("/x").unwrap());
    assert_eq!(text(&mut db, "/y"), "payload");
    db.save_changes().unwrap();

    assert!(!backend.exists("/x"));
    assert_eq!(backend.read("/y"), "payload");
    assert_eq!(db.get_handler("/y").unwrap().borrow().state(), HandlerState::Clean);
}

#[test]
fn test_folder_rename() {
    init_logging();
    let backend = Backend::new();
    backend.write("/src/a", "a");
    backend.write("/src/sub/b", "b");
    let mut db = backend.open(DatabaseConfig::default());

    db.move_handler("/src", "/dst").unwrap();
    assert!(!db.has_handler("/src").unwrap());
    assert_eq!(db.get_handler_names("/dst").unwrap(), vec!["a", "sub"]);
    assert_eq!(db.get_mimetype("/dst").unwrap(), vfs::FOLDER_MIMETYPE);

    db.save_changes().unwrap();
    assert!(!backend.exists("/src"));
    assert_eq!(backend.read("/dst/a"), "a");
    assert_eq!(backend.read("/dst/sub/b"), "b");
}

#[test]
fn test_blocked_rename_is_retried() {
    init_logging();
    let backend = Backend::new();
    backend.write("/a", "old");
    backend.write("/z", "new");
    let mut db = backend.open(DatabaseConfig::default());

    // `/z` is committed first and finds `/a` still in place
    db.del_handler("/a").unwrap();
    db.move_handler("/z", "/a").unwrap();
    db.save_changes().unwrap();

    assert_eq!(backend.read("/a"), "new");
    assert!(!backend.exists("/z"));
}

#[test]
fn test_rename_below_removed_file_is_retried() {
    init_logging();
    let backend = Backend::new();
    backend.write("/p", "old");
    backend.write("/x", "new");
    let mut db = backend.open(DatabaseConfig::default());

    // `/x` is committed first, while `/p` is still a file
    db.del_handler("/p").unwrap();
    db.move_handler("/x", "/p/y").unwrap();
    db.save_changes().unwrap();

    assert!(!db.has_changed());
    assert!(!backend.exists("/x"));
    assert_eq!(backend.read("/p/y"), "new");
}

#[test]
fn test_set_handler_below_file_is_rejected() {
    init_logging();
    let backend = Backend::new();
    backend.write("/stored", "s");
    let mut db = backend.open(DatabaseConfig::default());

    db.set_handler("/a", Handler::text("a")).unwrap();
    let error = db.set_handler("/a/b", Handler::text("b")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotADirectory);
    let error = db.set_handler("/stored/b", Handler::text("b")).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotADirectory);

    db.save_changes().unwrap();
    assert_eq!(backend.read("/a"), "a");
    assert!(!backend.exists("/a/b"));
}

#[test]
fn test_outside_creation_conflicts_with_new_handler() {
    init_logging();
    let backend = Backend::new();
    let mut db = backend.open(DatabaseConfig::default());
    db.set_handler("/n", Handler::text("mine")).unwrap();

    backend.write("/n", "theirs");
    let error = db.get_handler("/n").unwrap_err();
    assert!(matches!(error, DatabaseError::Conflict(_)));
    assert_eq!(error.kind(), ErrorKind::Conflict);
}

#[test]
fn test_failing_rename_stalls() {
    init_logging();
    let backend = Backend::failing(FailurePolicy::OnPaths(vec!["/y".to_string()]));
    backend.write("/x", "x");
    let mut db = backend.open(DatabaseConfig::default());

    db.move_handler("/x", "/y").unwrap();
    let error = db.save_changes().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Conflict);
    assert!(db.has_changed());
    assert!(backend.exists("/x"));

    db.abort_changes();
    assert!(!db.has_changed());
    assert_eq!(text(&mut db, "/x"), "x");
}

#[test]
fn test_failing_write_aborts_commit() {
    init_logging();
    let backend = Backend::failing(FailurePolicy::OnPaths(vec!["/broken".to_string()]));
    let mut db = backend.open(DatabaseConfig::default());

    db.set_handler("/broken", Handler::text("x")).unwrap();
    let error = db.save_changes().unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Io);
    assert!(!db.has_changed());
    assert!(!db.has_handler("/broken").unwrap());
}

#[test]
fn test_abort_restores_backend_value() {
    init_logging();
    let backend = Backend::new();
    backend.write("/doc", "persisted");
    let mut db = backend.open(DatabaseConfig::default());

    let handler = db.touch_handler("/doc").unwrap();
    handler
        .borrow_mut()
        .set_payload(Box::new("changed".to_string()));
    assert_eq!(text(&mut db, "/doc"), "changed");

    db.abort_changes();
    assert_eq!(text(&mut db, "/doc"), "persisted");
    assert_eq!(backend.read("/doc"), "persisted");
}

#[test]
fn test_eviction_keeps_held_handler() {
    init_logging();
    let backend = Backend::new();
    for i in 0..20 {
        backend.write(&format!("/f{:02}", i), "");
    }
    let mut db = backend.open(DatabaseConfig::new(2, 8));

    let held = db.get_handler("/f00").unwrap();
    for i in 1..20 {
        db.get_handler(&format!("/f{:02}", i)).unwrap();
    }
    db.make_room();
    assert!(db.len() <= 2 + 1);
    assert!(db.contains_cached("/f00"));
    assert!(!held.borrow().is_detached());

    let again = db.get_handler("/f00").unwrap();
    assert!(Rc::ptr_eq(&held, &again));
}

#[test]
fn test_key_canonicality() {
    init_logging();
    let backend = Backend::new();
    let db = backend.open(DatabaseConfig::default());
    for key in ["doc", "/a/b/", "a/./b/../c", "", "/", "x//y"] {
        let once = db.normalize_key(key).unwrap();
        assert_eq!(db.normalize_key(&once).unwrap(), once, "key {:?}", key);
    }
}

#[test]
fn test_round_trip() {
    init_logging();
    let backend = Backend::new();
    let mut db = backend.open(DatabaseConfig::default());
    let value = json!({ "name": "cache", "sizes": [1, 2, 3] });

    db.set_handler("/conf.json", Handler::json(value.clone()))
        .unwrap();
    db.save_changes().unwrap();

    let mut fresh = RoDatabase::new(&backend.key("/"), DatabaseConfig::default()).unwrap();
    let handler = fresh.get_handler_as("/conf.json", &JSON).unwrap();
    assert_eq!(handler.borrow_mut().get_json().unwrap(), &value);
}

#[test]
fn test_abort_is_identity() {
    init_logging();
    let backend = Backend::new();
    backend.write("/keep", "k");
    backend.write("/dir/a", "a");
    backend.write("/dir/b", "b");
    backend.write("/doc", "d");
    let mut db = backend.open(DatabaseConfig::default());
    let keys = ["/", "/keep", "/dir", "/dir/a", "/dir/b", "/doc", "/new", "/moved", "/copy"];
    let before = observe(&mut db, &keys);

    db.set_handler("/new", Handler::text("n")).unwrap();
    db.del_handler("/dir/a").unwrap();
    db.touch_handler("/doc").unwrap();
    db.copy_handler("/dir", "/copy").unwrap();
    db.move_handler("/keep", "/moved").unwrap();
    assert_ne!(observe(&mut db, &keys), before);

    db.abort_changes();
    assert!(!db.has_changed());
    assert_eq!(observe(&mut db, &keys), before);
}

#[test]
fn test_commit_is_idempotent() {
    init_logging();
    let backend = Backend::new();
    backend.write("/a", "a");
    let mut db = backend.open(DatabaseConfig::default());

    db.set_handler("/b", Handler::text("b")).unwrap();
    db.touch_handler("/a").unwrap();
    db.save_changes().unwrap();
    let once = backend.snapshot();

    db.save_changes().unwrap();
    assert_eq!(backend.snapshot(), once);
}

#[test]
fn test_cache_bounds() {
    init_logging();
    let backend = Backend::new();
    for i in 0..30 {
        backend.write(&format!("/f{:02}", i), "");
    }
    let config = DatabaseConfig::new(4, 10);
    let mut db = backend.open(config);
    for i in 0..30 {
        db.get_handler(&format!("/f{:02}", i)).unwrap();
        assert!(db.len() <= config.size_max);
    }
    db.make_room();
    assert!(db.len() <= config.size_min);
}

#[test]
fn test_staged_keys_are_dirty() {
    init_logging();
    let backend = Backend::new();
    backend.write("/a", "a");
    backend.write("/b", "b");
    backend.write("/c", "c");
    let mut db = backend.open(DatabaseConfig::default());

    db.get_handler("/c").unwrap();
    db.touch_handler("/a").unwrap();
    db.move_handler("/b", "/moved").unwrap();
    db.set_handler("/new", Handler::text("n")).unwrap();
    db.copy_handler("/c", "/copy").unwrap();

    for key in db.cache().keys() {
        let handler = db.cache().peek(&key).unwrap();
        let dirty = handler.borrow().dirty().is_some();
        assert_eq!(db.staging().new2old().contains_key(&key), dirty, "key {}", key);
    }
    assert_eq!(db.staging().new2old().len(), 4);
}

#[test]
fn test_rename_preserves_payload() {
    init_logging();
    let backend = Backend::new();
    let mut db = backend.open(DatabaseConfig::default());
    db.set_handler("/a", Handler::file(vec![0u8, 1, 2, 255])).unwrap();
    db.save_changes().unwrap();

    db.move_handler("/a", "/b").unwrap();
    db.save_changes().unwrap();

    assert!(!backend.exists("/a"));
    assert_eq!(
        api::read_bytes(&backend.key("/b")).unwrap(),
        vec![0u8, 1, 2, 255]
    );
}

#[test]
fn test_pinned_handler_survives_eviction() {
    init_logging();
    let backend = Backend::new();
    backend.write("/pinned", "p");
    backend.write("/other", "o");
    let mut db = backend.open(DatabaseConfig::new(0, 10));

    db.get_handler("/pinned").unwrap();
    db.get_handler("/other").unwrap();
    db.pin("/pinned").unwrap();
    db.make_room();
    assert!(db.contains_cached("/pinned"));
    assert!(!db.contains_cached("/other"));

    db.unpin("/pinned").unwrap();
    db.make_room();
    assert!(db.is_empty());
}
