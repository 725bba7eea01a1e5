use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::config::VfsConfig;
use crate::util::unixtime;

use super::backend::{Delta, StorageBackend};
use super::fs::{FileMode, Inode, InodeKind, InodeNumber, NO_PARENT, ROOT_INODE_NUMBER};
use super::kernel::Errno;
use super::store::InodeStore;

/// Ids mutated since the last successful flush
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirtySet {
  pub inodes: BTreeSet<InodeNumber>,
  pub dirs: BTreeSet<InodeNumber>,
}

impl DirtySet {
  pub fn is_empty(&self) -> bool {
    self.inodes.is_empty() && self.dirs.is_empty()
  }

  pub fn clear(&mut self) {
    self.inodes.clear();
    self.dirs.clear();
  }
}

/// Batches mutations and ships them to a [`StorageBackend`]
#[derive(Debug)]
pub struct Persistence {
  backend: Box<dyn StorageBackend>,
  dirty: DirtySet,
}

impl Persistence {
  pub fn new(backend: Box<dyn StorageBackend>) -> Self {
    Self {
      backend,
      dirty: DirtySet::default(),
    }
  }

  pub fn dirty(&self) -> &DirtySet {
    &self.dirty
  }

  pub fn mark_dirty(&mut self, number: Option<InodeNumber>) {
    if let Some(number) = number {
      self.dirty.inodes.insert(number);
    }
  }

  pub fn mark_dirty_dir(&mut self, number: Option<InodeNumber>) {
    if let Some(number) = number {
      self.dirty.dirs.insert(number);
    }
  }

  /// Send everything dirty to the backend.
  ///
  /// The dirty sets are only cleared once the backend accepted the delta,
  /// so a failed flush is resent whole by the next one.
  pub fn flush(&mut self, store: &InodeStore) -> Result<(), Errno> {
    if self.dirty.is_empty() {
      return Ok(());
    }

    let delta = Delta {
      full_snapshot: store.snapshot(),
      changes: store.materialize(&self.dirty.inodes, &self.dirty.dirs)?,
    };

    debug!(
      backend = self.backend.name(),
      inodes = delta.changes.inodes.len(),
      dirs = delta.changes.dirs.len(),
      "flushing delta"
    );

    match self.backend.apply_delta(&delta) {
      Ok(()) => {
        self.dirty.clear();
        Ok(())
      },
      Err(error) => {
        warn!(backend = self.backend.name(), %error, "flush failed, keeping dirty set");
        Err(error.into())
      },
    }
  }

  /// Load the store from the backend, or lay down and persist a fresh root
  pub fn bootstrap(&mut self, config: &VfsConfig) -> Result<InodeStore, Errno> {
    let snapshot = self.backend.load_snapshot()?;

    if !snapshot.is_empty() {
      let store = InodeStore::from_snapshot(snapshot)?;
      info!(backend = self.backend.name(), inodes = store.len(), "restored filesystem");
      return Ok(store);
    }

    let now = unixtime();
    let store = InodeStore::with_root(Inode {
      number: ROOT_INODE_NUMBER,
      kind: InodeKind::Directory,
      mode: FileMode::new(config.dir_mode),
      uid: config.uid,
      gid: config.gid,
      ctime: now,
      mtime: now,
      atime: now,
      links_count: 2,
      parent: NO_PARENT,
      name: None,
    })?;

    self.mark_dirty(Some(ROOT_INODE_NUMBER));
    self.mark_dirty_dir(Some(ROOT_INODE_NUMBER));
    self.flush(&store)?;

    info!(backend = self.backend.name(), "created fresh filesystem");
    Ok(store)
  }
}


// vim:ts=2 sw=2
