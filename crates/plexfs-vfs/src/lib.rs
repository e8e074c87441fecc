//! plexfs-vfs: the virtual filesystem core of plexfs.
//!
//! This crate provides:
//!
//! - **Filesystem contract**: the backend trait plus optional capability
//!   traits (truncate, content search) detected by probing
//! - **Router**: longest-prefix mount dispatch with composite directory
//!   listings
//! - **LocalBackend**: a backend rooted at a host directory
//! - **ObjectStoreBackend**: POSIX-style files over an immutable object
//!   store, via read-modify-write
//! - **Range utilities**: shared offset/size clamping and write-flag
//!   interpretation

pub mod local;
pub mod object;
pub mod object_store;
pub mod paths;
pub mod range;
pub mod router;
pub mod traits;

pub use local::LocalBackend;
pub use object::ObjectStoreBackend;
pub use object_store::{MemoryObjectStore, ObjectInfo, ObjectStore};
pub use paths::normalize_path;
pub use router::{MountInfo, Router};
pub use traits::{ContentSearch, FileReader, FileWriter, Filesystem, Truncate};

// Re-export the shared data types so most consumers only need this crate.
pub use plexfs_types::{FileInfo, FsError, FsResult, SearchHit, WriteFlags};
