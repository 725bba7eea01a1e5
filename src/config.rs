use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vfs::fs::{FileMode, Id};

/// When mutations reach the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
  /// Flush at the end of every mutating operation
  #[default]
  Immediate,
  /// Only mark dirty; `sync()` flushes
  Deferred,
}

/// 64 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VfsConfig {
  pub durability: Durability,
  pub uid: Id,
  pub gid: Id,
  pub file_mode: u16,
  pub dir_mode: u16,
  /// Largest file a write may produce, in bytes
  pub max_file_size: u64,
}

impl Default for VfsConfig {
  fn default() -> Self {
    Self {
      durability: Durability::Immediate,
      uid: 0,
      gid: 0,
      file_mode: FileMode::FILE.get_raw(),
      dir_mode: FileMode::DIR.get_raw(),
      max_file_size: DEFAULT_MAX_FILE_SIZE,
    }
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("can't read config: {0}")]
  Io(#[from] std::io::Error),
  #[error("can't parse config: {0}")]
  Yaml(#[from] serde_yaml::Error),
}

impl VfsConfig {
  pub fn from_reader(reader: impl Read) -> Result<Self, ConfigError> {
    Ok(serde_yaml::from_reader(reader)?)
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
    let reader = std::fs::File::open(path)?;
    Self::from_reader(reader)
  }
}


// vim:ts=2 sw=2
