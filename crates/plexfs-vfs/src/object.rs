//! Object-store backend.
//!
//! Exposes POSIX-style mutable files over an immutable object store. A file
//! is one object whose key is the virtual path minus the leading slash;
//! every mutation fetches the current object, applies the edit in memory,
//! and puts the replacement. Concurrent writers race; the last `put` wins.
//!
//! Directories are synthesized. `mkdir` drops a zero-byte `<dir>/.keep`
//! marker; listings fold deeper keys into directory entries and hide the
//! markers. Implicit directories disappear with their last child.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::object_store::ObjectStore;
use crate::paths::{base_name, normalize_path};
use crate::range::{apply_range, apply_write, resize, validate_flags};
use crate::traits::{FileInfo, Filesystem, FsError, FsResult, Truncate, WriteFlags};

/// Zero-byte marker object that pins an otherwise-empty directory.
const DIR_MARKER: &str = ".keep";

/// Backend mapping a virtual file tree onto an object store.
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
}

impl ObjectStoreBackend {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Object key for a virtual path (empty for the root).
    fn key_of(path: &str) -> String {
        normalize_path(path).trim_start_matches('/').to_string()
    }

    /// True if any object lives under `<key>/`.
    async fn dir_exists(&self, key: &str) -> FsResult<bool> {
        if key.is_empty() {
            return Ok(true);
        }
        Ok(!self.store.list(&format!("{key}/")).await?.is_empty())
    }
}

#[async_trait]
impl Filesystem for ObjectStoreBackend {
    async fn create(&self, path: &str) -> FsResult<()> {
        let key = Self::key_of(path);
        if key.is_empty() || self.dir_exists(&key).await? {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        self.store.put(&key, Vec::new()).await
    }

    async fn mkdir(&self, path: &str, _mode: u32) -> FsResult<()> {
        let key = Self::key_of(path);
        if key.is_empty() {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        if self.store.get(&key).await?.is_some() || self.dir_exists(&key).await? {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        self.store.put(&format!("{key}/{DIR_MARKER}"), Vec::new()).await
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let key = Self::key_of(path);
        if key.is_empty() {
            return Err(FsError::InvalidArgument(
                "cannot remove the backend root".to_string(),
            ));
        }
        if self.store.get(&key).await?.is_some() {
            return self.store.delete(&key).await;
        }
        let children = self.store.list(&format!("{key}/")).await?;
        if children.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }
        let marker = format!("{key}/{DIR_MARKER}");
        if children.len() == 1 && children[0].key == marker {
            return self.store.delete(&marker).await;
        }
        Err(FsError::InvalidArgument(format!(
            "directory not empty: {path}"
        )))
    }

    async fn remove_all(&self, path: &str) -> FsResult<()> {
        let key = Self::key_of(path);
        let is_file = !key.is_empty() && self.store.get(&key).await?.is_some();
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        let children = self.store.list(&prefix).await?;
        if !is_file && children.is_empty() && !key.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }
        if is_file {
            self.store.delete(&key).await?;
        }
        for obj in children {
            self.store.delete(&obj.key).await?;
        }
        Ok(())
    }

    async fn read(&self, path: &str, offset: i64, size: i64) -> FsResult<Vec<u8>> {
        let key = Self::key_of(path);
        if key.is_empty() {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        match self.store.get(&key).await? {
            Some(data) => Ok(apply_range(&data, offset, size)),
            None if self.dir_exists(&key).await? => Err(FsError::IsDirectory(path.to_string())),
            None => Err(FsError::NotFound(path.to_string())),
        }
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        offset: i64,
        flags: WriteFlags,
    ) -> FsResult<u64> {
        validate_flags(flags)?;
        let key = Self::key_of(path);
        if key.is_empty() || self.dir_exists(&key).await? {
            return Err(FsError::IsDirectory(path.to_string()));
        }

        // Read-modify-write: fetch, edit in memory, replace whole object.
        let current = self.store.get(&key).await?;
        let next = apply_write(current, data, offset, flags)
            .map_err(|err| match err {
                FsError::NotFound(_) => FsError::NotFound(path.to_string()),
                FsError::AlreadyExists(_) => FsError::AlreadyExists(path.to_string()),
                other => other,
            })?;
        self.store.put(&key, next).await?;
        Ok(data.len() as u64)
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let key = Self::key_of(path);
        if !key.is_empty() && self.store.get(&key).await?.is_some() {
            return Err(FsError::NotDirectory(path.to_string()));
        }
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{key}/")
        };
        let objects = self.store.list(&prefix).await?;
        if objects.is_empty() && !key.is_empty() {
            return Err(FsError::NotFound(path.to_string()));
        }

        // Fold deeper keys into directory entries; markers stay hidden.
        let mut dirs = BTreeSet::new();
        let mut files = Vec::new();
        for obj in &objects {
            let rest = &obj.key[prefix.len()..];
            match rest.split_once('/') {
                Some((first, _)) => {
                    dirs.insert(first.to_string());
                }
                None if rest.is_empty() || rest == DIR_MARKER => {}
                None => files.push(
                    FileInfo::file(rest, obj.size).with_modified(obj.modified),
                ),
            }
        }

        let mut entries: Vec<FileInfo> = dirs.iter().map(|d| FileInfo::directory(d.clone())).collect();
        entries.extend(files.into_iter().filter(|f| !dirs.contains(&f.name)));
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> FsResult<FileInfo> {
        let key = Self::key_of(path);
        if key.is_empty() {
            return Ok(FileInfo::directory("/"));
        }
        let objects = self.store.list(&key).await?;
        if let Some(obj) = objects.iter().find(|o| o.key == key) {
            return Ok(FileInfo::file(base_name(path), obj.size).with_modified(obj.modified));
        }
        let dir_prefix = format!("{key}/");
        if objects.iter().any(|o| o.key.starts_with(&dir_prefix)) {
            return Ok(FileInfo::directory(base_name(path)));
        }
        Err(FsError::NotFound(path.to_string()))
    }

    /// Copy-then-delete; not atomic. A reader can observe both paths (or,
    /// for directories, a partially moved tree) mid-rename.
    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from_key = Self::key_of(from);
        let to_key = Self::key_of(to);
        if from_key.is_empty() || to_key.is_empty() {
            return Err(FsError::InvalidArgument(
                "cannot rename the backend root".to_string(),
            ));
        }

        if let Some(data) = self.store.get(&from_key).await? {
            self.store.put(&to_key, data).await?;
            return self.store.delete(&from_key).await;
        }

        let from_prefix = format!("{from_key}/");
        let children = self.store.list(&from_prefix).await?;
        if children.is_empty() {
            return Err(FsError::NotFound(from.to_string()));
        }
        tracing::debug!(from = %from, to = %to, objects = children.len(), "renaming directory by copy-then-delete");
        for obj in children {
            let rest = &obj.key[from_prefix.len()..];
            let data = self.store.get(&obj.key).await?.unwrap_or_default();
            self.store.put(&format!("{to_key}/{rest}"), data).await?;
            self.store.delete(&obj.key).await?;
        }
        Ok(())
    }

    async fn chmod(&self, path: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::Unsupported(format!(
            "chmod is not supported by the object-store backend: {path}"
        )))
    }

    fn as_truncate(&self) -> Option<&dyn Truncate> {
        Some(self)
    }
}

#[async_trait]
impl Truncate for ObjectStoreBackend {
    async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        let key = Self::key_of(path);
        if key.is_empty() || self.dir_exists(&key).await? {
            return Err(FsError::IsDirectory(path.to_string()));
        }
        match self.store.get(&key).await? {
            Some(data) => self.store.put(&key, resize(data, size)).await,
            None => Err(FsError::NotFound(path.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::MemoryObjectStore;

    fn backend() -> (ObjectStoreBackend, Arc<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::new());
        (ObjectStoreBackend::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (fs, _) = backend();

        fs.write("/a.txt", b"Hello", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        assert_eq!(fs.read("/a.txt", 0, -1).await.unwrap(), b"Hello");
        assert_eq!(fs.read("/a.txt", 2, 2).await.unwrap(), b"ll");
    }

    #[tokio::test]
    async fn test_write_offset_hole_fill() {
        let (fs, _) = backend();

        fs.write("/a", b"Hello", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        fs.write("/a", b"World", 10, WriteFlags::NONE).await.unwrap();

        let content = fs.read("/a", 0, -1).await.unwrap();
        assert_eq!(content.len(), 15);
        assert_eq!(&content[..5], b"Hello");
        assert_eq!(&content[5..10], &[0u8; 5]);
        assert_eq!(&content[10..], b"World");
    }

    #[tokio::test]
    async fn test_write_append_and_truncate_flags() {
        let (fs, _) = backend();

        fs.write("/a", b"Hello", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        fs.write("/a", b", World!", 0, WriteFlags::APPEND)
            .await
            .unwrap();
        assert_eq!(fs.read("/a", 0, -1).await.unwrap(), b"Hello, World!");

        fs.write("/a", b"Hi", -1, WriteFlags::TRUNCATE)
            .await
            .unwrap();
        assert_eq!(fs.read("/a", 0, -1).await.unwrap(), b"Hi");
    }

    #[tokio::test]
    async fn test_write_exclusive_collision() {
        let (fs, _) = backend();

        fs.write("/b", b"x", -1, WriteFlags::CREATE | WriteFlags::EXCLUSIVE)
            .await
            .unwrap();
        let err = fs
            .write("/b", b"y", -1, WriteFlags::CREATE | WriteFlags::EXCLUSIVE)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
        assert_eq!(fs.read("/b", 0, -1).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_write_missing_without_create() {
        let (fs, _) = backend();

        let err = fs.write("/nope", b"x", 0, WriteFlags::NONE).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));

        // Compatibility clause still applies on this backend.
        fs.write("/nope", b"x", -1, WriteFlags::NONE).await.unwrap();
        assert_eq!(fs.read("/nope", 0, -1).await.unwrap(), b"x");
    }

    #[tokio::test]
    async fn test_truncate_grow_and_shrink() {
        let (fs, _) = backend();

        fs.write("/a", b"Hi", -1, WriteFlags::CREATE | WriteFlags::TRUNCATE)
            .await
            .unwrap();
        fs.truncate("/a", 10).await.unwrap();

        let content = fs.read("/a", 0, -1).await.unwrap();
        assert_eq!(content.len(), 10);
        assert_eq!(&content[..2], b"Hi");
        assert!(content[2..].iter().all(|&b| b == 0));
        assert_eq!(fs.stat("/a").await.unwrap().size, 10);

        fs.truncate("/a", 1).await.unwrap();
        assert_eq!(fs.read("/a", 0, -1).await.unwrap(), b"H");

        let err = fs.truncate("/missing", 0).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mkdir_and_readdir_folding() {
        let (fs, _) = backend();

        fs.mkdir("/docs", 0o755).await.unwrap();
        assert!(fs.stat("/docs").await.unwrap().is_dir);

        fs.write("/docs/a.txt", b"a", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        fs.write("/docs/sub/deep.txt", b"d", -1, WriteFlags::CREATE)
            .await
            .unwrap();

        let entries = fs.readdir("/docs").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        // The marker is hidden; deeper keys fold into one directory entry.
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert!(entries[1].is_dir);

        let root = fs.readdir("/").await.unwrap();
        let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["docs"]);
    }

    #[tokio::test]
    async fn test_mkdir_collisions() {
        let (fs, _) = backend();

        fs.write("/f", b"x", -1, WriteFlags::CREATE).await.unwrap();
        let err = fs.mkdir("/f", 0o755).await.unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));

        fs.mkdir("/d", 0o755).await.unwrap();
        let err = fs.mkdir("/d", 0o755).await.unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_implicit_directory_lifecycle() {
        let (fs, store) = backend();

        fs.write("/d/f.txt", b"x", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        assert!(fs.stat("/d").await.unwrap().is_dir);

        // The implicit directory disappears with its last child.
        fs.remove("/d/f.txt").await.unwrap();
        let err = fs.stat("/d").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_remove_semantics() {
        let (fs, _) = backend();

        fs.mkdir("/d", 0o755).await.unwrap();
        fs.write("/d/f", b"x", -1, WriteFlags::CREATE).await.unwrap();

        let err = fs.remove("/d").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));

        fs.remove("/d/f").await.unwrap();
        // Now only the marker remains; the directory removes cleanly.
        fs.remove("/d").await.unwrap();
        assert!(!fs.exists("/d").await);

        let err = fs.remove("/missing").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_all() {
        let (fs, store) = backend();

        fs.mkdir("/d", 0o755).await.unwrap();
        fs.write("/d/a", b"1", -1, WriteFlags::CREATE).await.unwrap();
        fs.write("/d/sub/b", b"2", -1, WriteFlags::CREATE)
            .await
            .unwrap();

        fs.remove_all("/d").await.unwrap();
        assert!(!fs.exists("/d").await);
        assert!(store.is_empty().await);

        let err = fs.remove_all("/missing").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_file_and_directory() {
        let (fs, _) = backend();

        fs.write("/a", b"data", -1, WriteFlags::CREATE).await.unwrap();
        fs.rename("/a", "/b").await.unwrap();
        assert!(!fs.exists("/a").await);
        assert_eq!(fs.read("/b", 0, -1).await.unwrap(), b"data");

        fs.write("/d/x", b"1", -1, WriteFlags::CREATE).await.unwrap();
        fs.write("/d/sub/y", b"2", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        fs.rename("/d", "/e").await.unwrap();
        assert!(!fs.exists("/d").await);
        assert_eq!(fs.read("/e/x", 0, -1).await.unwrap(), b"1");
        assert_eq!(fs.read("/e/sub/y", 0, -1).await.unwrap(), b"2");
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let (fs, _) = backend();

        fs.write("/a", b"first", -1, WriteFlags::CREATE).await.unwrap();
        fs.write("/a", b"second", -1, WriteFlags::CREATE | WriteFlags::TRUNCATE)
            .await
            .unwrap();
        assert_eq!(fs.read("/a", 0, -1).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_directory_errors() {
        let (fs, _) = backend();

        fs.mkdir("/d", 0o755).await.unwrap();
        let err = fs.write("/d", b"x", -1, WriteFlags::CREATE).await.unwrap_err();
        assert!(matches!(err, FsError::IsDirectory(_)));
        let err = fs.read("/d", 0, -1).await.unwrap_err();
        assert!(matches!(err, FsError::IsDirectory(_)));

        fs.write("/f", b"x", -1, WriteFlags::CREATE).await.unwrap();
        let err = fs.readdir("/f").await.unwrap_err();
        assert!(matches!(err, FsError::NotDirectory(_)));

        let err = fs.chmod("/f", 0o600).await.unwrap_err();
        assert!(matches!(err, FsError::Unsupported(_)));
    }
}
