use core::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::util::Timestamp;

use super::kernel::Errno;

pub type InodeNumber = u32;
pub type FileDescriptor = u32;
pub type Id = u16;

/// Parent of the root, never a real inode
pub const NO_PARENT: InodeNumber = 0;
pub const ROOT_INODE_NUMBER: InodeNumber = 1;

/// Directory children: name -> inode number, in insertion order
pub type DirEntries = IndexMap<String, InodeNumber>;

/// Permission bits only. The file type lives in [`InodeKind`].
///
///   setuid/setgid/sticky
///   |   user
///   |   |   group
///   |   |   |   others
///   |   |   |   |
///   xxx rwx rwx rwx
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(pub u16);

impl Default for FileMode {
  fn default() -> Self {
    Self::FILE
  }
}

impl FileMode {
  pub const FILE: Self = Self(0o644);
  pub const DIR: Self = Self(0o755);
  pub const SYMLINK: Self = Self(0o777);

  pub fn new(raw: u16) -> Self {
    Self(raw & 0o7777)
  }

  pub fn user(&self) -> u8 {
    ((self.0 >> 6) & 0o7) as u8
  }

  pub fn group(&self) -> u8 {
    ((self.0 >> 3) & 0o7) as u8
  }

  pub fn others(&self) -> u8 {
    (self.0 & 0o7) as u8
  }

  pub fn get_raw(&self) -> u16 {
    self.0
  }
}

impl fmt::Display for FileMode {
  /// `rwxr-xr-x`
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for triad in [self.user(), self.group(), self.others()] {
      let r = if triad & 0b100 != 0 { 'r' } else { '-' };
      let w = if triad & 0b010 != 0 { 'w' } else { '-' };
      let x = if triad & 0b001 != 0 { 'x' } else { '-' };
      write!(f, "{r}{w}{x}")?;
    }
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
  File,
  Directory,
  Symlink,
}

impl FileType {
  /// Type column of `ls -l`
  pub fn as_char(&self) -> char {
    match self {
      FileType::File => '-',
      FileType::Directory => 'd',
      FileType::Symlink => 'l',
    }
  }
}

/// Payload of an inode, tagged by its kind.
///
/// A directory carries nothing: its children live in the store's
/// entry maps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InodeKind {
  File {
    #[serde(with = "hex::serde")]
    data: Vec<u8>,
  },
  Directory,
  Symlink {
    target: String,
  },
}

impl InodeKind {
  pub fn empty_file() -> Self {
    InodeKind::File { data: Vec::new() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
  pub number: InodeNumber,
  pub kind: InodeKind,
  pub mode: FileMode,
  pub uid: Id,
  pub gid: Id,
  pub ctime: Timestamp,
  pub mtime: Timestamp,
  pub atime: Timestamp,
  pub links_count: u32,
  pub parent: InodeNumber,
  /// Leaf name under `parent`; `None` for the root
  pub name: Option<String>,
}

impl Inode {
  pub fn file_type(&self) -> FileType {
    match self.kind {
      InodeKind::File { .. } => FileType::File,
      InodeKind::Directory => FileType::Directory,
      InodeKind::Symlink { .. } => FileType::Symlink,
    }
  }

  pub fn is_dir(&self) -> bool {
    matches!(self.kind, InodeKind::Directory)
  }

  pub fn size(&self) -> u64 {
    match &self.kind {
      InodeKind::File { data } => data.len() as u64,
      InodeKind::Directory => 0,
      InodeKind::Symlink { target } => target.len() as u64,
    }
  }

  // Clocks may step back; stored times must not.
  pub fn touch_atime(&mut self, now: Timestamp) {
    self.atime = self.atime.max(now);
  }

  pub fn touch_mtime(&mut self, now: Timestamp) {
    self.mtime = self.mtime.max(now);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
  Read,
  Write,
  ReadWrite,
}

impl OpenMode {
  pub fn readable(&self) -> bool {
    matches!(self, OpenMode::Read | OpenMode::ReadWrite)
  }

  pub fn writable(&self) -> bool {
    matches!(self, OpenMode::Write | OpenMode::ReadWrite)
  }
}

impl FromStr for OpenMode {
  type Err = Errno;

  /// `r`, `w`, `rw` (also `r+`, `w+`)
  fn from_str(mode: &str) -> Result<Self, Self::Err> {
    match mode {
      "r" => Ok(OpenMode::Read),
      "w" => Ok(OpenMode::Write),
      "rw" | "r+" | "w+" => Ok(OpenMode::ReadWrite),
      other => Err(Errno::InvalidArgument(format!("unknown open mode '{other}'"))),
    }
  }
}

/// One row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
  pub name: String,
  pub kind: FileType,
  pub number: InodeNumber,
}


// vim:ts=2 sw=2
