//! File metadata — the unified entry type for `readdir()` and `stat()`.

use std::collections::HashMap;
use std::time::SystemTime;

/// Metadata for a file or directory entry.
///
/// Produced fresh per call; never mutated by the backends. Only the lower 12
/// bits of `mode` are meaningful.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Name of the entry (not the full path).
    pub name: String,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Permission bits (e.g. 0o644).
    pub mode: u32,
    /// Last modification time.
    pub modified: SystemTime,
    /// True if this entry is a directory.
    pub is_dir: bool,
    /// Free-form backend metadata (e.g. backend name, entry kind).
    pub meta: HashMap<String, String>,
}

impl FileInfo {
    /// Create a new file entry with default mode 0o644.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mode: 0o644,
            modified: SystemTime::now(),
            is_dir: false,
            meta: HashMap::new(),
        }
    }

    /// Create a new directory entry with default mode 0o755.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            mode: 0o755,
            modified: SystemTime::now(),
            is_dir: true,
            meta: HashMap::new(),
        }
    }

    /// Set the permission bits (lower 12 bits kept).
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode & 0o7777;
        self
    }

    /// Set the modification time.
    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = modified;
        self
    }

    /// Attach a metadata key/value pair.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}
