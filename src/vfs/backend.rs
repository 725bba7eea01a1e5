pub mod memory;
pub mod yaml;

use core::fmt::Debug;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::fs::{DirEntries, Inode, InodeNumber};

pub use memory::MemoryBackend;
pub use yaml::YamlBackend;

/// The whole persisted layout: every inode and every directory's entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub inodes: BTreeMap<InodeNumber, Inode>,
  pub dirs: BTreeMap<InodeNumber, DirEntries>,
}

impl Snapshot {
  pub fn is_empty(&self) -> bool {
    self.inodes.is_empty() && self.dirs.is_empty()
  }
}

/// One flush worth of state.
///
/// Backends may replace everything with `full_snapshot` or merge only
/// `changes`; both end up in the same state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
  pub full_snapshot: Snapshot,
  pub changes: Snapshot,
}

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("malformed snapshot: {0}")]
  Yaml(#[from] serde_yaml::Error),
  #[error("snapshot checksum mismatch in {path}")]
  Checksum { path: String },
  #[error("storage lock poisoned: {0}")]
  Poisoned(&'static str),
  #[error("storage unavailable: {0}")]
  Unavailable(String),
}

/// Where snapshots live between sessions.
///
/// `apply_delta` must be durable when it returns `Ok`. Implementations
/// serialize their own writes, so one backend can be shared by several
/// filesystems.
pub trait StorageBackend: Send + Sync {
  /// Empty snapshot if nothing was ever persisted
  fn load_snapshot(&self) -> Result<Snapshot, StorageError>;

  fn apply_delta(&self, delta: &Delta) -> Result<(), StorageError>;

  fn name(&self) -> &'static str;
}

impl Debug for dyn StorageBackend {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "StorageBackend {{ {} }}", self.name())
  }
}

// vim:ts=2 sw=2
