use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use tracing::debug;

use super::{Delta, Snapshot, StorageBackend, StorageError};

/// Header line carrying the hex SHA-256 of everything after it
const DIGEST_HEADER: &str = "# sha256: ";

/// Whole-snapshot YAML file guarded by a SHA-256 digest.
///
/// Every apply rewrites the file from `full_snapshot`. The first line is a
/// YAML comment holding the digest of the body below it, so one rename
/// commits both.
#[derive(Debug)]
pub struct YamlBackend {
  path: PathBuf,
  lock: Mutex<()>,
}

impl YamlBackend {
  pub fn new(path: impl AsRef<Path>) -> Self {
    Self {
      path: path.as_ref().to_owned(),
      lock: Mutex::new(()),
    }
  }

  fn digest(body: &str) -> String {
    hex::encode(Sha256::digest(body.as_bytes()))
  }

  fn checksum_error(&self) -> StorageError {
    StorageError::Checksum {
      path: self.path.display().to_string(),
    }
  }

  /// Write to a temporary sibling, sync it, then rename over the snapshot
  fn replace(&self, contents: &str) -> Result<(), StorageError> {
    let temporary = {
      let mut name = OsString::from(self.path.as_os_str());
      name.push(".tmp");
      PathBuf::from(name)
    };

    let mut file = File::create(&temporary)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    fs::rename(&temporary, &self.path)?;
    Ok(())
  }
}

impl StorageBackend for YamlBackend {
  fn load_snapshot(&self) -> Result<Snapshot, StorageError> {
    let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned("yaml backend"))?;

    if !self.path.exists() {
      return Ok(Snapshot::default());
    }

    let contents = fs::read_to_string(&self.path)?;
    let (header, body) = contents.split_once('\n').ok_or_else(|| self.checksum_error())?;
    let expected = header.strip_prefix(DIGEST_HEADER).ok_or_else(|| self.checksum_error())?;
    if expected.trim() != Self::digest(body) {
      return Err(self.checksum_error());
    }

    Ok(serde_yaml::from_str(body)?)
  }

  fn apply_delta(&self, delta: &Delta) -> Result<(), StorageError> {
    let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned("yaml backend"))?;

    let body = serde_yaml::to_string(&delta.full_snapshot)?;
    self.replace(&format!("{DIGEST_HEADER}{}\n{body}", Self::digest(&body)))?;

    debug!(
      path = %self.path.display(),
      inodes = delta.full_snapshot.inodes.len(),
      bytes = body.len(),
      "snapshot written"
    );
    Ok(())
  }

  fn name(&self) -> &'static str {
    "yaml"
  }
}


// vim:ts=2 sw=2
