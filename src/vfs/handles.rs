use std::collections::BTreeMap;

use super::fs::{FileDescriptor, InodeNumber, OpenMode};

/// 0, 1 and 2 belong to stdio
pub const FIRST_FILE_DESCRIPTOR: FileDescriptor = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
  pub fd: FileDescriptor,
  pub inode: InodeNumber,
  pub offset: u64,
  pub mode: OpenMode,
}

/// Open file descriptions. Never persisted.
#[derive(Debug)]
pub struct HandleTable {
  handles: BTreeMap<FileDescriptor, FileHandle>,
  next_fd: FileDescriptor,
}

impl Default for HandleTable {
  fn default() -> Self {
    Self::new()
  }
}

impl HandleTable {
  pub fn new() -> Self {
    Self {
      handles: BTreeMap::new(),
      next_fd: FIRST_FILE_DESCRIPTOR,
    }
  }

  /// Descriptors only ever grow, so a released one is never handed out again
  pub fn allocate(&mut self, inode: InodeNumber, mode: OpenMode) -> FileDescriptor {
    let fd = self.next_fd;
    self.next_fd += 1;
    self.handles.insert(fd, FileHandle {
      fd,
      inode,
      offset: 0,
      mode,
    });
    fd
  }

  pub fn get(&self, fd: FileDescriptor) -> Option<&FileHandle> {
    self.handles.get(&fd)
  }

  pub fn get_mut(&mut self, fd: FileDescriptor) -> Option<&mut FileHandle> {
    self.handles.get_mut(&fd)
  }

  pub fn release(&mut self, fd: FileDescriptor) -> bool {
    self.handles.remove(&fd).is_some()
  }
}


// vim:ts=2 sw=2
