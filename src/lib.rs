pub mod binaries;
pub mod config;
pub mod util;
pub mod vfs;

pub use config::{Durability, VfsConfig};
pub use vfs::backend::{Delta, MemoryBackend, Snapshot, StorageBackend, StorageError, YamlBackend};
pub use vfs::fs::{DirectoryEntry, FileType, OpenMode};
pub use vfs::kernel::{Errno, Vfs};

// vim:ts=2 sw=2
