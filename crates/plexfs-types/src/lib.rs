//! Pure data types for plexfs — file metadata, write flags, errors, search hits.
//!
//! This crate is a leaf dependency with no async runtime and no I/O. It exists
//! so that consumers (backends, embedders, external tools) can share plexfs's
//! type system without pulling in the full VFS stack.

pub mod error;
pub mod file_info;
pub mod flags;
pub mod search;

// Flat re-exports for convenience
pub use error::*;
pub use file_info::*;
pub use flags::*;
pub use search::*;
