pub mod backend;
pub mod fs;
pub mod handles;
pub mod kernel;
pub mod path;
pub mod persist;
pub mod store;

// vim:ts=2 sw=2
