//! Write flags for `write()` operations.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitmask of write flags.
///
/// The wire representation at the system boundary is the raw bitmask.
/// `EXCLUSIVE` is only meaningful together with `CREATE`; backends reject the
/// combination `EXCLUSIVE` without `CREATE` as an invalid argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteFlags(pub u32);

impl WriteFlags {
    /// No flags; plain positional write into an existing file.
    pub const NONE: WriteFlags = WriteFlags(0);
    /// Create the file if it does not exist.
    pub const CREATE: WriteFlags = WriteFlags(1 << 0);
    /// Combined with `CREATE`: fail if the file already exists.
    pub const EXCLUSIVE: WriteFlags = WriteFlags(1 << 1);
    /// Set the file length to zero before writing.
    pub const TRUNCATE: WriteFlags = WriteFlags(1 << 2);
    /// Write at the current end of file, ignoring the supplied offset.
    pub const APPEND: WriteFlags = WriteFlags(1 << 3);

    /// Returns true if every flag in `other` is set in `self`.
    pub fn contains(self, other: WriteFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flags are set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask value.
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for WriteFlags {
    type Output = WriteFlags;

    fn bitor(self, rhs: WriteFlags) -> WriteFlags {
        WriteFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for WriteFlags {
    fn bitor_assign(&mut self, rhs: WriteFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for WriteFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let mut parts = Vec::new();
        if self.contains(WriteFlags::CREATE) {
            parts.push("create");
        }
        if self.contains(WriteFlags::EXCLUSIVE) {
            parts.push("exclusive");
        }
        if self.contains(WriteFlags::TRUNCATE) {
            parts.push("truncate");
        }
        if self.contains(WriteFlags::APPEND) {
            parts.push("append");
        }
        write!(f, "{}", parts.join("|"))
    }
}
