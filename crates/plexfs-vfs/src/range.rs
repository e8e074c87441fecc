//! Shared range and write-flag helpers.
//!
//! The offset convention across the VFS: a supplied offset of `-1` means
//! "at end" for writes and "from start" for reads; a read size of `-1` means
//! "to end of file". Reads past the end return fewer bytes than requested;
//! the short read is the end-of-file signal, never an error.

use plexfs_types::{FsError, FsResult, WriteFlags};

/// Validate a write-flag combination.
///
/// `EXCLUSIVE` is only meaningful together with `CREATE`.
pub fn validate_flags(flags: WriteFlags) -> FsResult<()> {
    if flags.contains(WriteFlags::EXCLUSIVE) && !flags.contains(WriteFlags::CREATE) {
        return Err(FsError::InvalidArgument(
            "exclusive flag requires create".to_string(),
        ));
    }
    Ok(())
}

/// Slice `data` according to the read range convention.
///
/// A negative offset reads from the start; the offset is clamped into
/// `[0, len]`. A negative size reads to the end; otherwise at most `size`
/// bytes are returned.
pub fn apply_range(data: &[u8], offset: i64, size: i64) -> Vec<u8> {
    let start = if offset < 0 {
        0
    } else {
        (offset as usize).min(data.len())
    };
    let end = if size < 0 {
        data.len()
    } else {
        start.saturating_add(size as usize).min(data.len())
    };
    data[start..end].to_vec()
}

/// Apply a write to an in-memory file image.
///
/// This is the read-modify-write kernel shared by backends that cannot write
/// in place: `current` is the file's current contents (`None` if absent), and
/// the result is the full new contents.
///
/// Flag contract:
/// - absent file requires `CREATE`, except the compatibility clause: flags
///   `NONE` with offset `-1` auto-creates.
/// - `CREATE|EXCLUSIVE` on an existing file fails with no side effects.
/// - `TRUNCATE` empties the image before positioning.
/// - `APPEND` ignores the offset and writes at the current end.
/// - offset `-1` writes at the start when `CREATE` or `TRUNCATE` is set,
///   otherwise at the current end.
/// - an offset past the end zero-fills the gap.
pub fn apply_write(
    current: Option<Vec<u8>>,
    data: &[u8],
    offset: i64,
    flags: WriteFlags,
) -> FsResult<Vec<u8>> {
    validate_flags(flags)?;

    let exists = current.is_some();
    if exists && flags.contains(WriteFlags::CREATE) && flags.contains(WriteFlags::EXCLUSIVE) {
        return Err(FsError::AlreadyExists("file exists".to_string()));
    }
    if !exists && !flags.contains(WriteFlags::CREATE) && !(flags.is_empty() && offset < 0) {
        return Err(FsError::NotFound("file does not exist".to_string()));
    }

    let mut buf = current.unwrap_or_default();
    if flags.contains(WriteFlags::TRUNCATE) {
        buf.clear();
    }

    let pos = if flags.contains(WriteFlags::APPEND) {
        buf.len()
    } else if offset < 0 {
        if flags.contains(WriteFlags::CREATE) || flags.contains(WriteFlags::TRUNCATE) {
            0
        } else {
            buf.len()
        }
    } else {
        offset as usize
    };

    let end = pos + data.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[pos..end].copy_from_slice(data);
    Ok(buf)
}

/// Resize an in-memory file image: grow zero-fills, shrink drops the tail.
pub fn resize(mut buf: Vec<u8>, size: u64) -> Vec<u8> {
    buf.resize(size as usize, 0);
    buf
}
