//! Volatile backend. Clones share one snapshot, which is how tests hand
//! the same "disk" to a second filesystem instance.

use std::sync::{Arc, Mutex};

use super::{Delta, Snapshot, StorageBackend, StorageError};

#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
  snapshot: Arc<Mutex<Snapshot>>,
}

impl MemoryBackend {
  pub fn new() -> Self {
    Self::default()
  }

  /// Copy of what is currently persisted
  pub fn persisted(&self) -> Result<Snapshot, StorageError> {
    self.snapshot
      .lock()
      .map(|snapshot| snapshot.clone())
      .map_err(|_| StorageError::Poisoned("memory backend"))
  }
}

impl StorageBackend for MemoryBackend {
  fn load_snapshot(&self) -> Result<Snapshot, StorageError> {
    self.persisted()
  }

  /// Merges `changes` only; the full snapshot is not needed here.
  fn apply_delta(&self, delta: &Delta) -> Result<(), StorageError> {
    let mut snapshot = self.snapshot
      .lock()
      .map_err(|_| StorageError::Poisoned("memory backend"))?;

    for (number, inode) in &delta.changes.inodes {
      snapshot.inodes.insert(*number, inode.clone());
    }
    for (number, entries) in &delta.changes.dirs {
      snapshot.dirs.insert(*number, entries.clone());
    }

    Ok(())
  }

  fn name(&self) -> &'static str {
    "memory"
  }
}


// vim:ts=2 sw=2
