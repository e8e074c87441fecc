//! Local-disk backend.
//!
//! Exposes a host directory as a backend. All virtual paths are joined to the
//! root, and the resolved path must stay inside it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::range::validate_flags;
use crate::traits::{FileInfo, Filesystem, FsError, FsResult, Truncate, WriteFlags};

/// Filesystem backend rooted at a host directory.
///
/// If the root is `/srv/data`, then `read("/notes/a.txt", ...)` reads
/// `/srv/data/notes/a.txt`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at the given host directory.
    ///
    /// The directory must exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root path.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Resolve a virtual path to a host path inside the root.
    ///
    /// Rejects any `..` sequence that would climb above the root.
    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        let mut depth: i64 = 0;
        let mut rel = PathBuf::new();
        for component in path.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(FsError::InvalidArgument(format!(
                            "path escapes backend root: {path}"
                        )));
                    }
                    rel.pop();
                }
                c => {
                    depth += 1;
                    rel.push(c);
                }
            }
        }
        Ok(self.root.join(rel))
    }

    fn mode_of(meta: &std::fs::Metadata) -> u32 {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            meta.permissions().mode() & 0o7777
        }
        #[cfg(not(unix))]
        {
            if meta.is_dir() {
                0o755
            } else {
                0o644
            }
        }
    }

    fn info_from(name: &str, meta: &std::fs::Metadata) -> FileInfo {
        let modified = meta.modified().unwrap_or_else(|_| SystemTime::now());
        if meta.is_dir() {
            FileInfo::directory(name)
                .with_mode(Self::mode_of(meta))
                .with_modified(modified)
        } else {
            FileInfo::file(name, meta.len())
                .with_mode(Self::mode_of(meta))
                .with_modified(modified)
        }
    }
}

#[async_trait]
impl Filesystem for LocalBackend {
    async fn create(&self, path: &str) -> FsResult<()> {
        let full = self.resolve(path)?;
        if let Ok(meta) = fs::metadata(&full).await {
            if meta.is_dir() {
                return Err(FsError::IsDirectory(path.to_string()));
            }
        }
        fs::File::create(&full).await?;
        Ok(())
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        let full = self.resolve(path)?;
        fs::create_dir(&full).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            fs::remove_dir(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> FsResult<()> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            fs::remove_dir_all(&full).await?;
        } else {
            fs::remove_file(&full).await?;
        }
        Ok(())
    }

    async fn read(&self, path: &str, offset: i64, size: i64) -> FsResult<Vec<u8>> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }

        let mut file = fs::File::open(&full).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset as u64)).await?;
        }

        let mut buf = Vec::new();
        if size < 0 {
            file.read_to_end(&mut buf).await?;
        } else {
            file.take(size as u64).read_to_end(&mut buf).await?;
        }
        Ok(buf)
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        offset: i64,
        flags: WriteFlags,
    ) -> FsResult<u64> {
        validate_flags(flags)?;
        let full = self.resolve(path)?;

        let meta = fs::metadata(&full).await.ok();
        if let Some(meta) = &meta {
            if meta.is_dir() {
                return Err(FsError::IsDirectory(path.to_string()));
            }
        }
        // Compatibility clause: flags None with offset -1 auto-creates.
        if meta.is_none()
            && !flags.contains(WriteFlags::CREATE)
            && !(flags.is_empty() && offset < 0)
        {
            return Err(FsError::NotFound(path.to_string()));
        }

        let mut opts = fs::OpenOptions::new();
        opts.write(true);
        if flags.contains(WriteFlags::CREATE) && flags.contains(WriteFlags::EXCLUSIVE) {
            // The exclusive check must be atomic with the open; a losing
            // racer gets AlreadyExists from the open itself.
            opts.create_new(true);
        } else {
            opts.create(true);
        }
        if flags.contains(WriteFlags::TRUNCATE) {
            opts.truncate(true);
        }
        let mut file = opts.open(&full).await?;

        if flags.contains(WriteFlags::APPEND)
            || (offset < 0
                && !flags.contains(WriteFlags::CREATE)
                && !flags.contains(WriteFlags::TRUNCATE))
        {
            file.seek(SeekFrom::End(0)).await?;
        } else if offset > 0 {
            // Seeking past the end and writing leaves a zero-filled hole.
            file.seek(SeekFrom::Start(offset as u64)).await?;
        }

        file.write_all(data).await?;
        file.flush().await?;
        Ok(data.len() as u64)
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let full = self.resolve(path)?;
        let mut dir = fs::read_dir(&full).await?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(Self::info_from(&name, &meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> FsResult<FileInfo> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        Ok(Self::info_from(crate::paths::base_name(path), &meta))
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from_path = self.resolve(from)?;
        let to_path = self.resolve(to)?;
        fs::rename(&from_path, &to_path).await?;
        Ok(())
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        let full = self.resolve(path)?;
        // Surface NotFound before touching permissions.
        fs::metadata(&full).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full, std::fs::Permissions::from_mode(mode & 0o7777)).await?;
        }
        #[cfg(not(unix))]
        let _ = mode;
        Ok(())
    }

    fn as_truncate(&self) -> Option<&dyn Truncate> {
        Some(self)
    }
}

#[async_trait]
impl Truncate for LocalBackend {
    async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await?;
        if meta.is_dir() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let file = fs::OpenOptions::new().write(true).open(&full).await?;
        file.set_len(size).await?;
        Ok(())
    }
}
