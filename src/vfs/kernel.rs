use std::io::SeekFrom;

use thiserror::Error;
use tracing::debug;

use crate::config::{Durability, VfsConfig};
use crate::util::unixtime;

use super::backend::{StorageBackend, StorageError};
use super::fs::{
  DirectoryEntry, FileDescriptor, FileMode, Inode, InodeKind, InodeNumber, OpenMode, ROOT_INODE_NUMBER,
};
use super::handles::HandleTable;
use super::path::{self, Resolved};
use super::persist::Persistence;
use super::store::InodeStore;

#[derive(Debug, Error)]
pub enum Errno {
  /// Zero-length path
  #[error("empty path")]
  EmptyPath,
  /// Not a directory
  #[error("{0}: Not a directory")]
  NotADirectory(String),
  /// No such file
  #[error("{0}: No such file")]
  NoSuchFile(String),
  /// No such directory
  #[error("{0}: No such directory")]
  NoSuchDirectory(String),
  /// File exists
  #[error("{0}: File exists")]
  AlreadyExists(String),
  /// Is a directory
  #[error("{0}: Is a directory")]
  IsADirectory(String),
  /// Invalid argument
  #[error("invalid argument: {0}")]
  InvalidArgument(String),
  /// File too large
  #[error("{0}: File too large")]
  FileTooLarge(String),
  /// No space left on device
  #[error("{0}: No space left")]
  NoSpace(String),
  /// Bad file descriptor
  #[error("bad file descriptor: {0}")]
  BadDescriptor(FileDescriptor),
  /// Store references an inode it does not hold
  #[error("corrupt state: inode {0}")]
  CorruptState(InodeNumber),
  #[error(transparent)]
  Storage(#[from] StorageError),
}

#[cfg(test)]
impl PartialEq for Errno {
  fn eq(&self, other: &Self) -> bool {
    use Errno::*;

    match (self, other) {
      (EmptyPath, EmptyPath) => true,
      (NotADirectory(a), NotADirectory(b))
      | (NoSuchFile(a), NoSuchFile(b))
      | (NoSuchDirectory(a), NoSuchDirectory(b))
      | (AlreadyExists(a), AlreadyExists(b))
      | (IsADirectory(a), IsADirectory(b))
      | (InvalidArgument(a), InvalidArgument(b))
      | (FileTooLarge(a), FileTooLarge(b))
      | (NoSpace(a), NoSpace(b)) => a == b,
      (BadDescriptor(a), BadDescriptor(b)) => a == b,
      (CorruptState(a), CorruptState(b)) => a == b,
      // Storage errors carry io::Error; match on them instead
      _ => false,
    }
  }
}

/// One filesystem instance: inodes, open files, cwd and its backend.
///
/// Every operation resolves through [`path::resolve`], validates, mutates,
/// marks dirty and then persists according to [`VfsConfig::durability`].
/// Flushes run inline, so they land in operation order.
#[derive(Debug)]
pub struct Vfs {
  store: InodeStore,
  handles: HandleTable,
  persistence: Persistence,
  cwd: InodeNumber,
  config: VfsConfig,
}

impl Vfs {
  /// Load the filesystem held by `backend`, creating a fresh root if it is empty
  pub fn bootstrap(backend: Box<dyn StorageBackend>, config: VfsConfig) -> Result<Self, Errno> {
    let mut persistence = Persistence::new(backend);
    let store = persistence.bootstrap(&config)?;

    Ok(Self {
      store,
      handles: HandleTable::new(),
      persistence,
      cwd: ROOT_INODE_NUMBER,
      config,
    })
  }

  pub fn new(backend: impl StorageBackend + 'static) -> Result<Self, Errno> {
    Self::bootstrap(Box::new(backend), VfsConfig::default())
  }

  pub fn cwd(&self) -> InodeNumber {
    self.cwd
  }

  pub fn inode(&self, number: InodeNumber) -> Result<&Inode, Errno> {
    self.store.get(number)
  }

  pub fn resolve(&self, pathname: &str) -> Result<Resolved, Errno> {
    path::resolve(&self.store, pathname, self.cwd)
  }

  pub fn has_pending_changes(&self) -> bool {
    !self.persistence.dirty().is_empty()
  }

  fn persist(&mut self) -> Result<(), Errno> {
    match self.config.durability {
      Durability::Immediate => self.persistence.flush(&self.store),
      Durability::Deferred => Ok(()),
    }
  }

  /// Parent and name for a new entry; nothing may exist there yet
  fn creation_slot(&self, pathname: &str) -> Result<(InodeNumber, String), Errno> {
    let resolved = self.resolve(pathname)?;
    if resolved.target.is_some() {
      return Err(Errno::AlreadyExists(pathname.to_owned()));
    }
    self.slot_under(&resolved, pathname)
  }

  /// The final component lands in the last directory the walk reached
  fn slot_under(&self, resolved: &Resolved, pathname: &str) -> Result<(InodeNumber, String), Errno> {
    let name = resolved
      .creatable_name()
      .ok_or_else(|| Errno::InvalidArgument(format!("{pathname}: bad name for a new entry")))?;

    if self.store.lookup_child(resolved.parent, name)?.is_some() {
      return Err(Errno::AlreadyExists(pathname.to_owned()));
    }
    Ok((resolved.parent, name.to_owned()))
  }

  fn directory_at(&self, pathname: &str) -> Result<InodeNumber, Errno> {
    if let Some(number) = self.resolve(pathname)?.target {
      if self.store.get(number)?.is_dir() {
        return Ok(number);
      }
    }
    Err(Errno::NoSuchDirectory(pathname.to_owned()))
  }

  fn create(&mut self, parent: InodeNumber, name: &str, kind: InodeKind, mode: FileMode) -> Result<InodeNumber, Errno> {
    if !self.store.get(parent)?.is_dir() {
      return Err(Errno::NotADirectory(name.to_owned()));
    }

    let now = unixtime();
    let is_dir = matches!(kind, InodeKind::Directory);
    let number = self.store.allocate_number()?;

    self.store.insert(Inode {
      number,
      kind,
      mode,
      uid: self.config.uid,
      gid: self.config.gid,
      ctime: now,
      mtime: now,
      atime: now,
      links_count: if is_dir { 2 } else { 1 },
      parent,
      name: Some(name.to_owned()),
    });
    self.store.insert_child(parent, name, number)?;

    let parent_inode = self.store.get_mut(parent)?;
    parent_inode.touch_mtime(now);
    // New subdirectory's '..'
    if is_dir {
      parent_inode.links_count += 1;
    }

    self.persistence.mark_dirty(Some(number));
    self.persistence.mark_dirty_dir(is_dir.then_some(number));
    self.persistence.mark_dirty(Some(parent));
    self.persistence.mark_dirty_dir(Some(parent));

    debug!(number, parent, leaf = name, "created inode");
    Ok(number)
  }

  /// Open a file, creating it when `mode` can write and it is missing
  pub fn open(&mut self, pathname: &str, mode: OpenMode) -> Result<FileDescriptor, Errno> {
    let resolved = self.resolve(pathname)?;
    if !self.store.get(resolved.parent)?.is_dir() {
      return Err(Errno::NotADirectory(pathname.to_owned()));
    }

    let number = match resolved.target {
      Some(number) => match self.store.get(number)?.kind {
        InodeKind::File { .. } => number,
        InodeKind::Directory => return Err(Errno::IsADirectory(pathname.to_owned())),
        InodeKind::Symlink { .. } => {
          return Err(Errno::InvalidArgument(format!("{pathname}: is a symbolic link")))
        },
      },
      None if !mode.writable() => return Err(Errno::NoSuchFile(pathname.to_owned())),
      None => {
        let (parent, name) = self.slot_under(&resolved, pathname)?;
        self.create(parent, &name, InodeKind::empty_file(), FileMode::new(self.config.file_mode))?
      },
    };

    self.store.get_mut(number)?.touch_atime(unixtime());
    self.persistence.mark_dirty(Some(number));
    self.persistence.mark_dirty(Some(resolved.parent));
    self.persist()?;

    Ok(self.handles.allocate(number, mode))
  }

  /// Up to `count` bytes from the handle's offset; short at end of data
  pub fn read(&mut self, fd: FileDescriptor, count: usize) -> Result<Vec<u8>, Errno> {
    let (number, offset) = match self.handles.get(fd) {
      Some(handle) if handle.mode.readable() => (handle.inode, handle.offset),
      _ => return Err(Errno::BadDescriptor(fd)),
    };

    let inode = self.store.get_mut(number)?;
    let bytes = match &inode.kind {
      InodeKind::File { data } => {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
        let end = start.saturating_add(count).min(data.len());
        data[start..end].to_vec()
      },
      _ => return Err(Errno::BadDescriptor(fd)),
    };
    inode.touch_atime(unixtime());

    // atime only; it rides along with the next flush
    self.persistence.mark_dirty(Some(number));

    if let Some(handle) = self.handles.get_mut(fd) {
      handle.offset += bytes.len() as u64;
    }
    Ok(bytes)
  }

  /// Write `buffer` at the handle's offset, zero-filling any gap
  pub fn write(&mut self, fd: FileDescriptor, buffer: &[u8]) -> Result<usize, Errno> {
    let (number, offset) = match self.handles.get(fd) {
      Some(handle) if handle.mode.writable() => (handle.inode, handle.offset),
      _ => return Err(Errno::BadDescriptor(fd)),
    };

    let too_large = || Errno::FileTooLarge(format!("fd {fd}"));
    let end = offset
      .checked_add(buffer.len() as u64)
      .filter(|end| *end <= self.config.max_file_size)
      .ok_or_else(too_large)?;
    let start = usize::try_from(offset).map_err(|_| too_large())?;
    let end = usize::try_from(end).map_err(|_| too_large())?;

    let now = unixtime();
    let inode = self.store.get_mut(number)?;
    match &mut inode.kind {
      InodeKind::File { data } => {
        if data.len() < end {
          data
            .try_reserve(end - data.len())
            .map_err(|_| Errno::NoSpace(format!("fd {fd}")))?;
          data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buffer);
      },
      _ => return Err(Errno::BadDescriptor(fd)),
    }
    inode.touch_mtime(now);
    inode.touch_atime(now);
    let parent = inode.parent;

    self.persistence.mark_dirty(Some(number));
    self.persistence.mark_dirty(Some(parent));

    if let Some(handle) = self.handles.get_mut(fd) {
      handle.offset += buffer.len() as u64;
    }
    self.persist()?;

    Ok(buffer.len())
  }

  /// Move the handle's offset. Seeking past the end is allowed.
  pub fn seek(&mut self, fd: FileDescriptor, position: SeekFrom) -> Result<u64, Errno> {
    let (number, current) = self
      .handles
      .get(fd)
      .map(|handle| (handle.inode, handle.offset))
      .ok_or(Errno::BadDescriptor(fd))?;
    let size = self.store.get(number)?.size();

    let target = match position {
      SeekFrom::Start(offset) => i128::from(offset),
      SeekFrom::Current(delta) => i128::from(current) + i128::from(delta),
      SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
    };
    let offset = u64::try_from(target)
      .map_err(|_| Errno::InvalidArgument(format!("seek to offset {target}")))?;

    if let Some(handle) = self.handles.get_mut(fd) {
      handle.offset = offset;
    }
    Ok(offset)
  }

  pub fn close(&mut self, fd: FileDescriptor) -> Result<(), Errno> {
    if self.handles.release(fd) {
      Ok(())
    } else {
      Err(Errno::BadDescriptor(fd))
    }
  }

  pub fn mkdir(&mut self, pathname: &str) -> Result<InodeNumber, Errno> {
    let (parent, leaf) = self.creation_slot(pathname)?;
    let number = self.create(parent, &leaf, InodeKind::Directory, FileMode::new(self.config.dir_mode))?;
    self.persist()?;
    Ok(number)
  }

  pub fn cd(&mut self, pathname: &str) -> Result<(), Errno> {
    let number = self.directory_at(pathname)?;

    self.store.get_mut(number)?.touch_atime(unixtime());
    self.cwd = number;
    self.persistence.mark_dirty(Some(number));
    self.persist()
  }

  /// Entries of `pathname` (or the cwd) in insertion order
  pub fn ls(&self, pathname: Option<&str>) -> Result<Vec<DirectoryEntry>, Errno> {
    let number = match pathname {
      Some(pathname) => self.directory_at(pathname)?,
      None => self.cwd,
    };

    self.store
      .entries(number)?
      .iter()
      .filter(|(name, _)| !matches!(name.as_str(), "." | ".."))
      .map(|(name, child)| -> Result<DirectoryEntry, Errno> {
        Ok(DirectoryEntry {
          name: name.clone(),
          kind: self.store.get(*child)?.file_type(),
          number: *child,
        })
      })
      .collect()
  }

  /// Create an empty file; unlike `open`, fails if anything is there
  pub fn touch(&mut self, pathname: &str) -> Result<InodeNumber, Errno> {
    let (parent, leaf) = self.creation_slot(pathname)?;
    let number = self.create(parent, &leaf, InodeKind::empty_file(), FileMode::new(self.config.file_mode))?;
    self.persist()?;
    Ok(number)
  }

  /// Whole payload of a file. An empty file gives empty bytes.
  pub fn cat(&mut self, pathname: &str) -> Result<Vec<u8>, Errno> {
    let number = self
      .resolve(pathname)?
      .target
      .ok_or_else(|| Errno::NoSuchFile(pathname.to_owned()))?;

    let inode = self.store.get_mut(number)?;
    let data = match &inode.kind {
      InodeKind::File { data } => data.clone(),
      InodeKind::Directory => return Err(Errno::NoSuchFile(pathname.to_owned())),
      InodeKind::Symlink { .. } => {
        return Err(Errno::InvalidArgument(format!("{pathname}: is a symbolic link")))
      },
    };
    inode.touch_atime(unixtime());

    self.persistence.mark_dirty(Some(number));
    self.persist()?;
    Ok(data)
  }

  /// Create `linkpath` pointing at `target`. The target is stored, not checked.
  pub fn symlink(&mut self, target: &str, linkpath: &str) -> Result<InodeNumber, Errno> {
    if target.is_empty() {
      return Err(Errno::InvalidArgument("empty symlink target".to_owned()));
    }

    let (parent, leaf) = self.creation_slot(linkpath)?;
    let kind = InodeKind::Symlink {
      target: target.to_owned(),
    };
    let number = self.create(parent, &leaf, kind, FileMode::SYMLINK)?;
    self.persist()?;
    Ok(number)
  }

  pub fn readlink(&self, pathname: &str) -> Result<String, Errno> {
    let number = self
      .resolve(pathname)?
      .target
      .ok_or_else(|| Errno::NoSuchFile(pathname.to_owned()))?;

    match &self.store.get(number)?.kind {
      InodeKind::Symlink { target } => Ok(target.clone()),
      _ => Err(Errno::InvalidArgument(format!("{pathname}: not a symbolic link"))),
    }
  }

  /// Flush now, whatever the durability policy
  pub fn sync(&mut self) -> Result<(), Errno> {
    self.persistence.flush(&self.store)
  }

  pub fn current_path(&self) -> Result<String, Errno> {
    path::absolute_path(&self.store, self.cwd)
  }
}


// vim:ts=2 sw=2
