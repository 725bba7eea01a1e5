use std::collections::{BTreeMap, BTreeSet};

use super::backend::Snapshot;
use super::fs::{DirEntries, Inode, InodeKind, InodeNumber, NO_PARENT, ROOT_INODE_NUMBER};
use super::kernel::Errno;

/// Owner of every inode and every directory's entry map.
///
/// Knows nothing about paths; see [`super::path`].
#[derive(Debug, Clone)]
pub struct InodeStore {
  inodes: BTreeMap<InodeNumber, Inode>,
  dirs: BTreeMap<InodeNumber, DirEntries>,
  next_number: InodeNumber,
}

impl InodeStore {
  /// Store holding only `root`, which must be a directory numbered 1.
  pub fn with_root(root: Inode) -> Result<Self, Errno> {
    if root.number != ROOT_INODE_NUMBER || !root.is_dir() || root.parent != NO_PARENT {
      return Err(Errno::CorruptState(root.number));
    }

    let mut store = Self {
      inodes: BTreeMap::new(),
      dirs: BTreeMap::new(),
      next_number: ROOT_INODE_NUMBER + 1,
    };
    store.insert(root);
    Ok(store)
  }

  /// Rebuild from a persisted snapshot, checking the structural invariants
  pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, Errno> {
    let Snapshot { inodes, mut dirs } = snapshot;

    match inodes.get(&ROOT_INODE_NUMBER) {
      Some(root) if root.is_dir() && root.parent == NO_PARENT => (),
      _ => return Err(Errno::CorruptState(ROOT_INODE_NUMBER)),
    }

    for (number, inode) in &inodes {
      if *number != inode.number || *number == NO_PARENT {
        return Err(Errno::CorruptState(*number));
      }
      if inode.is_dir() {
        dirs.entry(*number).or_default();
      }
    }

    for (dir_number, entries) in &dirs {
      match inodes.get(dir_number) {
        Some(dir) if dir.is_dir() => (),
        _ => return Err(Errno::CorruptState(*dir_number)),
      }
      if let Some(missing) = entries.values().find(|child| !inodes.contains_key(child)) {
        return Err(Errno::CorruptState(*missing));
      }
    }

    let max = inodes.keys().max().copied().unwrap_or(ROOT_INODE_NUMBER);
    let next_number = max.checked_add(1).ok_or(Errno::CorruptState(max))?;

    Ok(Self {
      inodes,
      dirs,
      next_number,
    })
  }

  pub fn get(&self, number: InodeNumber) -> Result<&Inode, Errno> {
    self.inodes.get(&number).ok_or(Errno::CorruptState(number))
  }

  pub fn get_mut(&mut self, number: InodeNumber) -> Result<&mut Inode, Errno> {
    self.inodes.get_mut(&number).ok_or(Errno::CorruptState(number))
  }

  /// Next unused number. The counter never wraps back onto 0.
  pub fn allocate_number(&mut self) -> Result<InodeNumber, Errno> {
    let number = self.next_number;
    self.next_number = number
      .checked_add(1)
      .ok_or_else(|| Errno::NoSpace("inode numbers exhausted".to_owned()))?;
    Ok(number)
  }

  /// Insert an inode record. Directories also get an empty entry map.
  pub fn insert(&mut self, inode: Inode) {
    if let InodeKind::Directory = inode.kind {
      self.dirs.entry(inode.number).or_default();
    }
    if let Some(next) = inode.number.checked_add(1) {
      self.next_number = self.next_number.max(next);
    }
    self.inodes.insert(inode.number, inode);
  }

  pub fn insert_child(&mut self, dir: InodeNumber, name: &str, child: InodeNumber) -> Result<(), Errno> {
    if !self.inodes.contains_key(&child) {
      return Err(Errno::CorruptState(child));
    }
    self.dirs
      .get_mut(&dir)
      .ok_or(Errno::CorruptState(dir))?
      .insert(name.to_owned(), child);
    Ok(())
  }

  pub fn lookup_child(&self, dir: InodeNumber, name: &str) -> Result<Option<InodeNumber>, Errno> {
    Ok(self.entries(dir)?.get(name).copied())
  }

  pub fn entries(&self, dir: InodeNumber) -> Result<&DirEntries, Errno> {
    self.dirs.get(&dir).ok_or(Errno::CorruptState(dir))
  }

  pub(crate) fn len(&self) -> usize {
    self.inodes.len()
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      inodes: self.inodes.clone(),
      dirs: self.dirs.clone(),
    }
  }

  /// Partial snapshot holding only the given inodes and entry maps
  pub fn materialize(
    &self,
    inodes: &BTreeSet<InodeNumber>,
    dirs: &BTreeSet<InodeNumber>,
  ) -> Result<Snapshot, Errno> {
    Ok(Snapshot {
      inodes: inodes
        .iter()
        .map(|number| -> Result<_, Errno> { Ok((*number, self.get(*number)?.clone())) })
        .collect::<Result<_, Errno>>()?,
      dirs: dirs
        .iter()
        .map(|number| -> Result<_, Errno> { Ok((*number, self.entries(*number)?.clone())) })
        .collect::<Result<_, Errno>>()?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vfs::fs::FileMode;

  fn inode(number: InodeNumber, kind: InodeKind, parent: InodeNumber, name: Option<&str>) -> Inode {
    Inode {
      number,
      kind,
      mode: FileMode::DIR,
      uid: 0,
      gid: 0,
      ctime: 0,
      mtime: 0,
      atime: 0,
      links_count: 2,
      parent,
      name: name.map(str::to_owned),
    }
  }

  fn root() -> Inode {
    inode(ROOT_INODE_NUMBER, InodeKind::Directory, NO_PARENT, None)
  }

  #[test]
  fn root_store_allocates_after_root() {
    let mut store = InodeStore::with_root(root()).unwrap();

    assert!(store.get(ROOT_INODE_NUMBER).unwrap().is_dir());
    assert_eq!(store.allocate_number().unwrap(), 2);
    assert_eq!(store.allocate_number().unwrap(), 3);
  }

  #[test]
  fn root_must_be_a_directory() {
    let bad = inode(ROOT_INODE_NUMBER, InodeKind::empty_file(), NO_PARENT, None);
    assert_eq!(InodeStore::with_root(bad).unwrap_err(), Errno::CorruptState(1));
  }

  #[test]
  fn dangling_number_is_corrupt_state() {
    let store = InodeStore::with_root(root()).unwrap();
    assert_eq!(store.get(42).unwrap_err(), Errno::CorruptState(42));
  }

  #[test]
  fn children_keep_insertion_order() {
    let mut store = InodeStore::with_root(root()).unwrap();
    for name in ["c", "a", "b"] {
      let number = store.allocate_number().unwrap();
      store.insert(inode(number, InodeKind::empty_file(), ROOT_INODE_NUMBER, Some(name)));
      store.insert_child(ROOT_INODE_NUMBER, name, number).unwrap();
    }

    let names: Vec<&str> = store.entries(ROOT_INODE_NUMBER).unwrap().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["c", "a", "b"]);
    assert_eq!(store.lookup_child(ROOT_INODE_NUMBER, "a").unwrap(), Some(3));
    assert_eq!(store.lookup_child(ROOT_INODE_NUMBER, "z").unwrap(), None);
  }

  #[test]
  fn insert_child_rejects_unknown_child() {
    let mut store = InodeStore::with_root(root()).unwrap();
    assert_eq!(
      store.insert_child(ROOT_INODE_NUMBER, "ghost", 9).unwrap_err(),
      Errno::CorruptState(9)
    );
  }

  #[test]
  fn restore_sets_counter_above_max() {
    let mut snapshot = Snapshot::default();
    snapshot.inodes.insert(1, root());
    snapshot.inodes.insert(17, inode(17, InodeKind::Directory, 1, Some("deep")));
    snapshot.dirs.insert(1, DirEntries::from([("deep".to_owned(), 17)]));

    let mut store = InodeStore::from_snapshot(snapshot).unwrap();

    assert_eq!(store.allocate_number().unwrap(), 18);
    // Missing entry map for a directory is rebuilt empty
    assert!(store.entries(17).unwrap().is_empty());
  }

  #[test]
  fn restore_rejects_largest_number() {
    let mut snapshot = Snapshot::default();
    snapshot.inodes.insert(1, root());
    snapshot.inodes.insert(u32::MAX, inode(u32::MAX, InodeKind::empty_file(), 1, Some("last")));
    snapshot.dirs.insert(1, DirEntries::from([("last".to_owned(), u32::MAX)]));

    assert_eq!(InodeStore::from_snapshot(snapshot).unwrap_err(), Errno::CorruptState(u32::MAX));
  }

  #[test]
  fn counter_never_hands_out_zero() {
    let mut store = InodeStore::with_root(root()).unwrap();
    store.insert(inode(u32::MAX - 1, InodeKind::empty_file(), 1, Some("f")));

    assert_eq!(store.allocate_number().unwrap_err(), Errno::NoSpace("inode numbers exhausted".to_owned()));
    // Inserting the top number leaves the counter where it was
    store.insert(inode(u32::MAX, InodeKind::empty_file(), 1, Some("g")));
    assert!(store.allocate_number().is_err());
  }

  #[test]
  fn restore_rejects_missing_root() {
    let mut snapshot = Snapshot::default();
    snapshot.inodes.insert(2, inode(2, InodeKind::Directory, 1, Some("orphan")));

    assert_eq!(InodeStore::from_snapshot(snapshot).unwrap_err(), Errno::CorruptState(1));
  }

  #[test]
  fn restore_rejects_dangling_entry() {
    let mut snapshot = Snapshot::default();
    snapshot.inodes.insert(1, root());
    snapshot.dirs.insert(1, DirEntries::from([("gone".to_owned(), 5)]));

    assert_eq!(InodeStore::from_snapshot(snapshot).unwrap_err(), Errno::CorruptState(5));
  }

  #[test]
  fn materialize_picks_requested_entities() {
    let mut store = InodeStore::with_root(root()).unwrap();
    let number = store.allocate_number().unwrap();
    store.insert(inode(number, InodeKind::empty_file(), ROOT_INODE_NUMBER, Some("f")));
    store.insert_child(ROOT_INODE_NUMBER, "f", number).unwrap();

    let partial = store
      .materialize(&BTreeSet::from([number]), &BTreeSet::from([ROOT_INODE_NUMBER]))
      .unwrap();

    assert_eq!(partial.inodes.keys().copied().collect::<Vec<_>>(), vec![number]);
    assert_eq!(partial.dirs[&ROOT_INODE_NUMBER]["f"], number);
    assert_eq!(store.snapshot().inodes.len(), 2);
  }
}

// vim:ts=2 sw=2
