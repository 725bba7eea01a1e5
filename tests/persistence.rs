use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use memvfs::{
  Delta, Durability, Errno, MemoryBackend, OpenMode, Snapshot, StorageBackend, StorageError, Vfs, VfsConfig,
  YamlBackend,
};

fn deferred() -> VfsConfig {
  VfsConfig {
    durability: Durability::Deferred,
    ..VfsConfig::default()
  }
}

fn write_file(vfs: &mut Vfs, pathname: &str, data: &[u8]) {
  let fd = vfs.open(pathname, OpenMode::Write).unwrap();
  vfs.write(fd, data).unwrap();
  vfs.close(fd).unwrap();
}

/// Memory backend that refuses writes while `down` is set
#[derive(Clone, Default)]
struct Switchable {
  inner: MemoryBackend,
  down: Arc<AtomicBool>,
}

impl StorageBackend for Switchable {
  fn load_snapshot(&self) -> Result<Snapshot, StorageError> {
    self.inner.load_snapshot()
  }

  fn apply_delta(&self, delta: &Delta) -> Result<(), StorageError> {
    if self.down.load(Ordering::SeqCst) {
      return Err(StorageError::Unavailable("switched off".to_owned()));
    }
    self.inner.apply_delta(delta)
  }

  fn name(&self) -> &'static str {
    "switchable"
  }
}

#[test]
fn second_instance_sees_persisted_tree() {
  let backend = MemoryBackend::new();
  let mut vfs = Vfs::new(backend.clone()).unwrap();
  vfs.mkdir("/docs").unwrap();
  write_file(&mut vfs, "/docs/readme.md", b"hello");

  let mut reopened = Vfs::new(backend).unwrap();
  assert_eq!(reopened.cat("/docs/readme.md").unwrap(), b"hello".to_vec());
  let names: Vec<String> = reopened.ls(Some("/docs")).unwrap().into_iter().map(|entry| entry.name).collect();
  assert_eq!(names, vec!["readme.md"]);

  let unrelated = Vfs::new(MemoryBackend::new()).unwrap();
  assert_eq!(unrelated.resolve("/docs").unwrap().target, None);
}

#[test]
fn deferred_durability_waits_for_sync() {
  let backend = MemoryBackend::new();
  let mut vfs = Vfs::bootstrap(Box::new(backend.clone()), deferred()).unwrap();
  let after_bootstrap = backend.persisted().unwrap();

  vfs.mkdir("/later").unwrap();
  write_file(&mut vfs, "/later/notes", b"not yet");

  assert!(vfs.has_pending_changes());
  assert_eq!(backend.persisted().unwrap(), after_bootstrap);

  vfs.sync().unwrap();
  assert!(!vfs.has_pending_changes());

  let mut reopened = Vfs::new(backend).unwrap();
  assert_eq!(reopened.cat("/later/notes").unwrap(), b"not yet".to_vec());
}

#[test]
fn sync_with_nothing_dirty_is_a_noop() {
  let backend = MemoryBackend::new();
  let mut vfs = Vfs::new(backend.clone()).unwrap();
  vfs.touch("/f").unwrap();
  let before = backend.persisted().unwrap();

  vfs.sync().unwrap();
  vfs.sync().unwrap();

  assert_eq!(backend.persisted().unwrap(), before);
}

#[test]
fn yaml_snapshot_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("fs.yaml");

  {
    let mut vfs = Vfs::new(YamlBackend::new(&path)).unwrap();
    vfs.mkdir("/etc").unwrap();
    write_file(&mut vfs, "/etc/motd", &[0, 1, 2, 255]);
    vfs.symlink("/etc/motd", "/motd").unwrap();
  }

  let mut vfs = Vfs::new(YamlBackend::new(&path)).unwrap();
  assert_eq!(vfs.cat("/etc/motd").unwrap(), vec![0, 1, 2, 255]);
  assert_eq!(vfs.readlink("/motd").unwrap(), "/etc/motd");

  let names: Vec<String> = vfs.ls(None).unwrap().into_iter().map(|entry| entry.name).collect();
  assert_eq!(names, vec!["etc", "motd"]);
}

#[test]
fn failed_flush_keeps_changes_for_retry() {
  let backend = Switchable::default();
  let mut vfs = Vfs::new(backend.clone()).unwrap();

  backend.down.store(true, Ordering::SeqCst);
  let error = vfs.mkdir("/kept").unwrap_err();
  assert!(matches!(error, Errno::Storage(StorageError::Unavailable(_))));

  // The mutation stays in memory and stays dirty
  assert!(vfs.resolve("/kept").unwrap().target.is_some());
  assert!(vfs.has_pending_changes());
  assert!(vfs.sync().is_err());

  backend.down.store(false, Ordering::SeqCst);
  vfs.sync().unwrap();
  assert!(!vfs.has_pending_changes());

  let reopened = Vfs::new(backend.inner.clone()).unwrap();
  assert!(reopened.resolve("/kept").unwrap().target.is_some());
}

#[test]
fn restored_filesystem_allocates_fresh_numbers() {
  let backend = MemoryBackend::new();
  let mut vfs = Vfs::new(backend.clone()).unwrap();
  let a = vfs.mkdir("/a").unwrap();
  let b = vfs.touch("/a/b").unwrap();

  let mut reopened = Vfs::new(backend).unwrap();
  let c = reopened.touch("/c").unwrap();

  assert!(c > a && c > b);
  assert_eq!(reopened.resolve("/a/b").unwrap().target, Some(b));
}

#[test]
fn cwd_is_not_persisted() {
  let backend = MemoryBackend::new();
  let mut vfs = Vfs::new(backend.clone()).unwrap();
  vfs.mkdir("/home").unwrap();
  vfs.cd("/home").unwrap();

  let reopened = Vfs::new(backend).unwrap();
  assert_eq!(reopened.current_path().unwrap(), "/");
}

// vim:ts=2 sw=2
