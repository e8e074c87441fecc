//! Core VFS traits and streaming types.

use async_trait::async_trait;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

pub use plexfs_types::{FileInfo, FsError, FsResult, SearchHit, WriteFlags};

/// Abstract filesystem interface.
///
/// All operations use absolute paths relative to the backend's own root; the
/// router rewrites virtual paths before delegating. For example, a backend
/// mounted at `/data` sees `read("/a.txt", ...)` for the virtual path
/// `/data/a.txt`.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Establish an empty regular file.
    ///
    /// Fails if the parent is missing or the target exists as a directory.
    async fn create(&self, path: &str) -> FsResult<()>;

    /// Create one directory. Parents must exist; fails if the target exists.
    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()>;

    /// Remove a single file or empty directory.
    async fn remove(&self, path: &str) -> FsResult<()>;

    /// Recursively remove a file or directory tree.
    async fn remove_all(&self, path: &str) -> FsResult<()>;

    /// Read up to `size` bytes starting at `offset`.
    ///
    /// A negative offset reads from the start; a negative size reads to the
    /// end. A short read signals end-of-file; it is not an error.
    async fn read(&self, path: &str, offset: i64, size: i64) -> FsResult<Vec<u8>>;

    /// Write `data` at `offset` under the flag contract of [`WriteFlags`].
    ///
    /// Returns the number of bytes written (`data.len()` on success).
    async fn write(&self, path: &str, data: &[u8], offset: i64, flags: WriteFlags)
        -> FsResult<u64>;

    /// List entries in a directory.
    async fn readdir(&self, path: &str) -> FsResult<Vec<FileInfo>>;

    /// Get metadata for a file or directory.
    async fn stat(&self, path: &str) -> FsResult<FileInfo>;

    /// Rename (move) a file or directory within this backend.
    async fn rename(&self, from: &str, to: &str) -> FsResult<()>;

    /// Change permission bits (lower 12 bits).
    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()>;

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Open a streaming reader over the file's current contents.
    async fn open_read(&self, path: &str) -> FsResult<FileReader> {
        Ok(FileReader::new(self.read(path, 0, -1).await?))
    }

    /// Probe for the optional truncate capability.
    fn as_truncate(&self) -> Option<&dyn Truncate> {
        None
    }

    /// Probe for the optional content-search capability.
    fn as_search(&self) -> Option<&dyn ContentSearch> {
        None
    }
}

/// Optional capability: set a file's length.
///
/// Growing zero-fills; shrinking drops the tail. Fails on directories and
/// missing files.
#[async_trait]
pub trait Truncate: Send + Sync {
    async fn truncate(&self, path: &str, size: u64) -> FsResult<()>;
}

/// Optional capability: content search below a directory.
#[async_trait]
pub trait ContentSearch: Send + Sync {
    async fn search(&self, path: &str, query: &str) -> FsResult<Vec<SearchHit>>;
}

/// Byte stream over a file snapshot, returned by `open_read`.
#[derive(Debug)]
pub struct FileReader {
    cursor: Cursor<Vec<u8>>,
}

impl FileReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
        }
    }

    /// Consume the reader and return the remaining unread bytes.
    pub fn into_inner(self) -> Vec<u8> {
        let pos = (self.cursor.position() as usize).min(self.cursor.get_ref().len());
        self.cursor.into_inner()[pos..].to_vec()
    }
}

impl AsyncRead for FileReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let me = self.get_mut();
        let pos = (me.cursor.position() as usize).min(me.cursor.get_ref().len());
        let remaining = &me.cursor.get_ref()[pos..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        me.cursor.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

/// Byte sink returned by `open_write`.
///
/// Writes accumulate in memory; `close` flushes the buffer in one
/// `write(path, buf, -1, CREATE)` call through the backend it was opened on.
/// The sink borrows the backend through an `Arc` back-reference, so its
/// lifetime is bounded by the mount that produced it.
pub struct FileWriter {
    fs: Arc<dyn Filesystem>,
    path: String,
    buf: Vec<u8>,
}

impl FileWriter {
    pub fn new(fs: Arc<dyn Filesystem>, path: impl Into<String>) -> Self {
        Self {
            fs,
            path: path.into(),
            buf: Vec::new(),
        }
    }

    /// Buffer `data`; returns the number of bytes accepted (always all).
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.buf.extend_from_slice(data);
        data.len()
    }

    /// Bytes buffered so far.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Flush the buffered contents to the backend and close the sink.
    pub async fn close(self) -> FsResult<u64> {
        self.fs
            .write(&self.path, &self.buf, -1, WriteFlags::CREATE)
            .await
    }
}
