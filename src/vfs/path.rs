use itertools::Itertools;

use crate::util::fixedpoint;

use super::fs::{InodeNumber, NO_PARENT, ROOT_INODE_NUMBER};
use super::kernel::Errno;
use super::store::InodeStore;

/// Outcome of walking a path.
///
/// `target` is `None` when a component was missing. `parent` is then the
/// last directory actually reached, `leaf` the final component of the path
/// and `unresolved` the number of components skipped after the missing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
  pub target: Option<InodeNumber>,
  pub parent: InodeNumber,
  pub leaf: Option<String>,
  pub unresolved: usize,
}

impl Resolved {
  /// Name a new entry gets under `parent`
  pub fn creatable_name(&self) -> Option<&str> {
    match (self.target, self.leaf.as_deref()) {
      (None, Some(".") | Some("..")) => None,
      (None, leaf) => leaf,
      _ => None,
    }
  }
}

/// Split a path into its absoluteness and non-empty components.
pub fn split_path(pathname: &str) -> Result<(bool, Vec<&str>), Errno> {
  if pathname.is_empty() {
    return Err(Errno::EmptyPath);
  }

  let absolute = pathname.starts_with('/');
  let components = pathname
    .split('/')
    .filter(|piece| !piece.is_empty())
    .collect();

  Ok((absolute, components))
}

fn parent_of(store: &InodeStore, number: InodeNumber) -> Result<InodeNumber, Errno> {
  match store.get(number)?.parent {
    NO_PARENT => Ok(ROOT_INODE_NUMBER),
    parent => Ok(parent),
  }
}

/// Walk `pathname` starting at the root or at `cwd`.
pub fn resolve(store: &InodeStore, pathname: &str, cwd: InodeNumber) -> Result<Resolved, Errno> {
  let (absolute, components) = split_path(pathname)?;

  // Base case: '/'
  if absolute && components.is_empty() {
    return Ok(Resolved {
      target: Some(ROOT_INODE_NUMBER),
      parent: ROOT_INODE_NUMBER,
      leaf: None,
      unresolved: 0,
    });
  }

  let mut cursor = if absolute { ROOT_INODE_NUMBER } else { cwd };
  let mut parent = parent_of(store, cursor)?;

  for (index, piece) in components.iter().enumerate() {
    match *piece {
      "." => (),
      ".." => {
        cursor = parent_of(store, cursor)?;
        parent = parent_of(store, cursor)?;
      },
      name => {
        if !store.get(cursor)?.is_dir() {
          return Err(Errno::NotADirectory(pathname.to_owned()));
        }

        match store.lookup_child(cursor, name)? {
          Some(child) => {
            parent = cursor;
            cursor = child;
          },
          None => {
            return Ok(Resolved {
              target: None,
              parent: cursor,
              leaf: components.last().map(|last| (*last).to_owned()),
              unresolved: components.len() - index - 1,
            })
          },
        }
      },
    }
  }

  Ok(Resolved {
    target: Some(cursor),
    parent,
    leaf: None,
    unresolved: 0,
  })
}

/// Absolute path of `number`, walking parent links up to the root
pub fn absolute_path(store: &InodeStore, number: InodeNumber) -> Result<String, Errno> {
  let mut names = Vec::new();
  let mut cursor = store.get(number)?;

  while cursor.parent != NO_PARENT {
    // More hops than inodes means the parent links loop
    if names.len() > store.len() {
      return Err(Errno::CorruptState(cursor.number));
    }
    names.push(cursor.name.clone().unwrap_or_default());
    cursor = store.get(cursor.parent)?;
  }

  let joined = format!("/{}", names.iter().rev().join("/"));
  Ok(fixedpoint(|pathname: String| pathname.replace("//", "/"), joined))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::vfs::fs::{FileMode, Inode, InodeKind};

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

  /// / (1)
  /// ├── docs (2)
  /// │   └── readme.md (3)
  /// └── src (4)
  fn tree() -> InodeStore {
    let mut store = InodeStore::with_root(inode(1, InodeKind::Directory, NO_PARENT, None)).unwrap();
    store.insert(inode(2, InodeKind::Directory, 1, Some("docs")));
    store.insert_child(1, "docs", 2).unwrap();
    store.insert(inode(3, InodeKind::empty_file(), 2, Some("readme.md")));
    store.insert_child(2, "readme.md", 3).unwrap();
    store.insert(inode(4, InodeKind::Directory, 1, Some("src")));
    store.insert_child(1, "src", 4).unwrap();
    store
  }

  fn found(target: InodeNumber, parent: InodeNumber) -> Resolved {
    Resolved {
      target: Some(target),
      parent,
      leaf: None,
      unresolved: 0,
    }
  }

  #[test]
  fn split_path_root() {
    assert_eq!(split_path("/").unwrap(), (true, Vec::new()));
  }

  #[test]
  fn split_path_only_slashes() {
    assert_eq!(split_path("//////").unwrap(), (true, Vec::new()));
    assert_eq!(split_path("//").unwrap(), (true, Vec::new()));
  }

  #[test]
  fn split_path_valid_multiple_slashes() {
    assert_eq!(split_path("//test1//test2///test3////").unwrap(), (true, vec!["test1", "test2", "test3"]));
  }

  #[test]
  fn split_path_relative() {
    assert_eq!(split_path("a/b/").unwrap(), (false, vec!["a", "b"]));
  }

  #[test]
  fn split_path_zero_length() {
    assert_eq!(split_path("").unwrap_err(), Errno::EmptyPath);
  }

  #[test]
  fn resolve_root() {
    let store = tree();
    assert_eq!(resolve(&store, "/", 2).unwrap(), found(1, 1));
    assert_eq!(resolve(&store, "///", 2).unwrap(), found(1, 1));
  }

  #[test]
  fn resolve_absolute_and_relative() {
    let store = tree();
    assert_eq!(resolve(&store, "/docs/readme.md", 4).unwrap(), found(3, 2));
    assert_eq!(resolve(&store, "readme.md", 2).unwrap(), found(3, 2));
    assert_eq!(resolve(&store, "docs/", 1).unwrap(), found(2, 1));
  }

  #[test]
  fn resolve_dots() {
    let store = tree();
    assert_eq!(resolve(&store, ".", 2).unwrap(), found(2, 1));
    assert_eq!(resolve(&store, "../src", 2).unwrap(), found(4, 1));
    assert_eq!(resolve(&store, "/docs/./readme.md", 1).unwrap(), found(3, 2));
  }

  #[test]
  fn dotdot_clamps_at_root() {
    let store = tree();
    assert_eq!(resolve(&store, "..", 1).unwrap(), found(1, 1));
    assert_eq!(resolve(&store, "/../../..", 4).unwrap(), found(1, 1));
    assert_eq!(resolve(&store, "../../../docs", 2).unwrap(), found(2, 1));
  }

  #[test]
  fn missing_leaf_stops_at_last_directory() {
    let store = tree();
    let resolved = resolve(&store, "/docs/new.txt", 1).unwrap();

    assert_eq!(resolved.target, None);
    assert_eq!(resolved.parent, 2);
    assert_eq!(resolved.unresolved, 0);
    assert_eq!(resolved.creatable_name(), Some("new.txt"));
  }

  #[test]
  fn missing_intermediate_stops_at_last_directory() {
    let store = tree();
    let resolved = resolve(&store, "/docs/nope/deeper/file", 1).unwrap();

    assert_eq!(resolved.target, None);
    assert_eq!(resolved.parent, 2);
    assert_eq!(resolved.unresolved, 2);
    assert_eq!(resolved.creatable_name(), Some("file"));
  }

  #[test]
  fn dot_names_are_not_creatable() {
    let store = tree();

    assert_eq!(resolve(&store, "/nope/..", 1).unwrap().creatable_name(), None);
    assert_eq!(resolve(&store, "nope/.", 2).unwrap().creatable_name(), None);
    assert_eq!(resolve(&store, "/docs", 1).unwrap().creatable_name(), None);
  }

  #[test]
  fn descending_through_a_file_fails() {
    let store = tree();
    assert_eq!(
      resolve(&store, "/docs/readme.md/x", 1).unwrap_err(),
      Errno::NotADirectory("/docs/readme.md/x".to_owned())
    );
  }

  #[test]
  fn empty_path_fails() {
    assert_eq!(resolve(&tree(), "", 1).unwrap_err(), Errno::EmptyPath);
  }

  #[test]
  fn absolute_path_walks_to_root() {
    let store = tree();
    assert_eq!(absolute_path(&store, 1).unwrap(), "/");
    assert_eq!(absolute_path(&store, 2).unwrap(), "/docs");
    assert_eq!(absolute_path(&store, 3).unwrap(), "/docs/readme.md");
  }

  #[test]
  fn absolute_path_detects_cycles() {
    let mut store = tree();
    store.get_mut(2).unwrap().parent = 4;
    store.get_mut(4).unwrap().parent = 2;

    assert!(matches!(absolute_path(&store, 2), Err(Errno::CorruptState(_))));
  }
}

// vim:ts=2 sw=2
