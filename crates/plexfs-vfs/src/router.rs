//! Mount router.
//!
//! Routes filesystem operations to mounted backends by longest prefix match.
//! If `/mnt` and `/mnt/project` are both mounted, `/mnt/project/src/main.rs`
//! goes to the `/mnt/project` mount with the rewritten path `/src/main.rs`.
//!
//! The mount registry is mutable only while the tree is being assembled;
//! afterwards the router is shared immutably.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::paths::{base_name, normalize_path};
use crate::range::validate_flags;
use crate::traits::{
    ContentSearch, FileInfo, FileWriter, Filesystem, FsError, FsResult, SearchHit, Truncate,
    WriteFlags,
};

/// Information about a mount point.
#[derive(Debug, Clone)]
pub struct MountInfo {
    /// The mount prefix (e.g. `/mnt/project`).
    pub prefix: String,
}

/// Routes filesystem operations to mounted backends.
#[derive(Default)]
pub struct Router {
    /// Mounts keyed by normalized prefix. BTreeMap for ordered iteration.
    mounts: BTreeMap<String, Arc<dyn Filesystem>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("mounts", &self.mounts.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Router {
    /// Create a new empty router.
    pub fn new() -> Self {
        Self {
            mounts: BTreeMap::new(),
        }
    }

    /// Mount a backend at the given prefix.
    ///
    /// The prefix is normalized; mounting over an existing prefix is an
    /// error.
    pub fn mount(&mut self, prefix: &str, fs: impl Filesystem + 'static) -> FsResult<()> {
        self.mount_arc(prefix, Arc::new(fs))
    }

    /// Mount a backend (already wrapped in `Arc`) at the given prefix.
    pub fn mount_arc(&mut self, prefix: &str, fs: Arc<dyn Filesystem>) -> FsResult<()> {
        let prefix = normalize_path(prefix);
        if self.mounts.contains_key(&prefix) {
            return Err(FsError::AlreadyExists(format!(
                "mount prefix already in use: {prefix}"
            )));
        }
        tracing::debug!(prefix = %prefix, "mounting backend");
        self.mounts.insert(prefix, fs);
        Ok(())
    }

    /// Unmount the backend at the given prefix.
    ///
    /// Returns `true` if a mount was removed.
    pub fn unmount(&mut self, prefix: &str) -> bool {
        let prefix = normalize_path(prefix);
        self.mounts.remove(&prefix).is_some()
    }

    /// List all current mounts.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.mounts
            .keys()
            .map(|prefix| MountInfo {
                prefix: prefix.clone(),
            })
            .collect()
    }

    /// Find the mount for a normalized path.
    ///
    /// Returns the backend and the path rewritten to be absolute from the
    /// backend's root (`/` on an exact prefix match).
    fn find_mount(&self, path: &str) -> FsResult<(Arc<dyn Filesystem>, String)> {
        let mut best: Option<(&String, &Arc<dyn Filesystem>)> = None;
        for (prefix, fs) in &self.mounts {
            let is_match = prefix == "/"
                || path == prefix.as_str()
                || path.starts_with(&format!("{prefix}/"));
            if is_match && best.map_or(true, |(b, _)| prefix.len() > b.len()) {
                best = Some((prefix, fs));
            }
        }
        match best {
            Some((prefix, fs)) => {
                let rel = if prefix == "/" {
                    path.to_string()
                } else {
                    let rest = &path[prefix.len()..];
                    if rest.is_empty() {
                        "/".to_string()
                    } else {
                        rest.to_string()
                    }
                };
                Ok((Arc::clone(fs), rel))
            }
            None => Err(FsError::NotFound(format!("no mount for path: {path}"))),
        }
    }

    fn is_mount_point(&self, path: &str) -> bool {
        path != "/" && self.mounts.contains_key(path)
    }

    /// Mutations addressed at a mount-point path itself are disallowed.
    fn guard_mount_point(&self, path: &str) -> FsResult<()> {
        if self.is_mount_point(path) {
            return Err(FsError::InvalidArgument(format!(
                "path collides with a mount point: {path}"
            )));
        }
        Ok(())
    }

    /// First path components of mount prefixes strictly below `dir`.
    fn child_mount_names(&self, dir: &str) -> Vec<String> {
        let mut names = BTreeSet::new();
        for prefix in self.mounts.keys() {
            if prefix == "/" {
                continue;
            }
            let rest = if dir == "/" {
                &prefix[1..]
            } else if let Some(rest) = prefix.strip_prefix(&format!("{dir}/")) {
                rest
            } else {
                continue;
            };
            let first = rest.split('/').next().unwrap_or("");
            if !first.is_empty() {
                names.insert(first.to_string());
            }
        }
        names.into_iter().collect()
    }

    fn has_mounts_under(&self, path: &str) -> bool {
        !self.child_mount_names(path).is_empty()
    }

    /// Open a buffered byte sink that flushes to the selected backend on
    /// close.
    pub fn open_write(&self, path: &str) -> FsResult<FileWriter> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        Ok(FileWriter::new(fs, rel))
    }

    /// Truncate through the selected backend's capability, if present.
    pub async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        match fs.as_truncate() {
            Some(t) => t.truncate(&rel, size).await,
            None => Err(FsError::Unsupported(format!(
                "truncate is not supported by the backend mounted for {path}"
            ))),
        }
    }

    /// Content search through the selected backend's capability, if present.
    pub async fn search(&self, path: &str, query: &str) -> FsResult<Vec<SearchHit>> {
        let path = normalize_path(path);
        let (fs, rel) = self.find_mount(&path)?;
        match fs.as_search() {
            Some(s) => s.search(&rel, query).await,
            None => Err(FsError::Unsupported(format!(
                "content search is not supported by the backend mounted for {path}"
            ))),
        }
    }
}

#[async_trait]
impl Filesystem for Router {
    async fn create(&self, path: &str) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.create(&rel).await
    }

    async fn mkdir(&self, path: &str, mode: u32) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.mkdir(&rel, mode).await
    }

    async fn remove(&self, path: &str) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.remove(&rel).await
    }

    async fn remove_all(&self, path: &str) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.remove_all(&rel).await
    }

    async fn read(&self, path: &str, offset: i64, size: i64) -> FsResult<Vec<u8>> {
        let path = normalize_path(path);
        let (fs, rel) = self.find_mount(&path)?;
        fs.read(&rel, offset, size).await
    }

    async fn write(
        &self,
        path: &str,
        data: &[u8],
        offset: i64,
        flags: WriteFlags,
    ) -> FsResult<u64> {
        validate_flags(flags)?;
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.write(&rel, data, offset, flags).await
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let path = normalize_path(path);
        let mount_children = self.child_mount_names(&path);

        let backend_entries = match self.find_mount(&path) {
            Ok((fs, rel)) => match fs.readdir(&rel).await {
                Ok(entries) => entries,
                // A directory the backend does not know can still exist as
                // the parent of a mount prefix.
                Err(FsError::NotFound(_)) if !mount_children.is_empty() => Vec::new(),
                Err(err) => return Err(err),
            },
            Err(_) if path == "/" || !mount_children.is_empty() => Vec::new(),
            Err(err) => return Err(err),
        };

        // Union; mount-point names shadow backend entries of equal name.
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        for name in mount_children {
            seen.insert(name.clone());
            entries.push(FileInfo::directory(name));
        }
        for entry in backend_entries {
            if seen.insert(entry.name.clone()) {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> FsResult<FileInfo> {
        let path = normalize_path(path);
        if self.is_mount_point(&path) {
            return Ok(FileInfo::directory(base_name(&path)));
        }
        let (fs, rel) = match self.find_mount(&path) {
            Ok(found) => found,
            Err(err) => {
                if path == "/" || self.has_mounts_under(&path) {
                    return Ok(FileInfo::directory(base_name(&path)));
                }
                return Err(err);
            }
        };
        match fs.stat(&rel).await {
            Ok(info) => Ok(info),
            Err(FsError::NotFound(_)) if self.has_mounts_under(&path) => {
                Ok(FileInfo::directory(base_name(&path)))
            }
            Err(err) => Err(err),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> FsResult<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        self.guard_mount_point(&from)?;
        self.guard_mount_point(&to)?;
        let (from_fs, from_rel) = self.find_mount(&from)?;
        let (to_fs, to_rel) = self.find_mount(&to)?;

        if !Arc::ptr_eq(&from_fs, &to_fs) {
            return Err(FsError::Unsupported(
                "cannot rename across different mount points".to_string(),
            ));
        }
        from_fs.rename(&from_rel, &to_rel).await
    }

    async fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        let path = normalize_path(path);
        self.guard_mount_point(&path)?;
        let (fs, rel) = self.find_mount(&path)?;
        fs.chmod(&rel, mode).await
    }

    fn as_truncate(&self) -> Option<&dyn Truncate> {
        Some(self)
    }

    fn as_search(&self) -> Option<&dyn ContentSearch> {
        Some(self)
    }
}

#[async_trait]
impl Truncate for Router {
    async fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        Router::truncate(self, path, size).await
    }
}

#[async_trait]
impl ContentSearch for Router {
    async fn search(&self, path: &str, query: &str) -> FsResult<Vec<SearchHit>> {
        Router::search(self, path, query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectStoreBackend;
    use crate::object_store::{MemoryObjectStore, ObjectStore};

    fn object_backend() -> (ObjectStoreBackend, Arc<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::new());
        (ObjectStoreBackend::new(store.clone()), store)
    }

    /// Backend with no optional capabilities, for probing tests.
    struct NullFs;

    #[async_trait]
    impl Filesystem for NullFs {
        async fn create(&self, path: &str) -> FsResult<()> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn mkdir(&self, path: &str, _mode: u32) -> FsResult<()> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn remove(&self, path: &str) -> FsResult<()> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn remove_all(&self, path: &str) -> FsResult<()> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn read(&self, path: &str, _offset: i64, _size: i64) -> FsResult<Vec<u8>> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn write(
            &self,
            _path: &str,
            data: &[u8],
            _offset: i64,
            _flags: WriteFlags,
        ) -> FsResult<u64> {
            Ok(data.len() as u64)
        }
        async fn readdir(&self, _path: &str) -> FsResult<Vec<FileInfo>> {
            Ok(Vec::new())
        }
        async fn stat(&self, path: &str) -> FsResult<FileInfo> {
            Err(FsError::NotFound(path.to_string()))
        }
        async fn rename(&self, from: &str, _to: &str) -> FsResult<()> {
            Err(FsError::NotFound(from.to_string()))
        }
        async fn chmod(&self, path: &str, _mode: u32) -> FsResult<()> {
            Err(FsError::NotFound(path.to_string()))
        }
    }

    #[tokio::test]
    async fn test_basic_mount() {
        let mut router = Router::new();
        let (fs, _) = object_backend();
        fs.write("/test.txt", b"hello", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/scratch", fs).unwrap();

        let data = router.read("/scratch/test.txt", 0, -1).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_multiple_mounts() {
        let mut router = Router::new();

        let (scratch, _) = object_backend();
        scratch
            .write("/a.txt", b"scratch", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/scratch", scratch).unwrap();

        let (data, _) = object_backend();
        data.write("/b.txt", b"data", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/data", data).unwrap();

        assert_eq!(
            router.read("/scratch/a.txt", 0, -1).await.unwrap(),
            b"scratch"
        );
        assert_eq!(router.read("/data/b.txt", 0, -1).await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_nested_mount_longest_prefix() {
        let mut router = Router::new();

        let (outer, _) = object_backend();
        outer
            .write("/outer.txt", b"outer", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/mnt", outer).unwrap();

        let (inner, _) = object_backend();
        inner
            .write("/inner.txt", b"inner", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/mnt/project", inner).unwrap();

        assert_eq!(router.read("/mnt/outer.txt", 0, -1).await.unwrap(), b"outer");
        assert_eq!(
            router.read("/mnt/project/inner.txt", 0, -1).await.unwrap(),
            b"inner"
        );
    }

    #[tokio::test]
    async fn test_sibling_prefix_not_captured() {
        let mut router = Router::new();
        let (root, root_store) = object_backend();
        router.mount("/", root).unwrap();
        let (vec_fs, vec_store) = object_backend();
        router.mount("/vec", vec_fs).unwrap();

        // Inside the /vec mount: rewritten path is absolute from its root.
        router
            .write("/vec/ns/docs/f.txt", b"v", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        assert_eq!(
            vec_store.get("ns/docs/f.txt").await.unwrap(),
            Some(b"v".to_vec())
        );

        // A sibling that merely shares the name prefix goes to the root mount.
        router
            .write("/vec-other/x", b"r", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        assert_eq!(
            root_store.get("vec-other/x").await.unwrap(),
            Some(b"r".to_vec())
        );
        assert_eq!(vec_store.get("vec-other/x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_synthetic_root() {
        let mut router = Router::new();
        router.mount("/scratch", object_backend().0).unwrap();
        router.mount("/mnt/a", object_backend().0).unwrap();
        router.mount("/mnt/b", object_backend().0).unwrap();

        let entries = router.readdir("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["mnt", "scratch"]);
        assert!(entries.iter().all(|e| e.is_dir));

        // Intermediate synthetic directory lists its mount children.
        let entries = router.readdir("/mnt").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_composite_readdir_shadowing() {
        let mut router = Router::new();
        let (root, _) = object_backend();
        // Backend entry with the same name as the mount point, plus one more.
        root.write("/data", b"backend file", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        root.write("/other.txt", b"x", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/", root).unwrap();
        router.mount("/data", object_backend().0).unwrap();

        let entries = router.readdir("/").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["data", "other.txt"]);
        // The mount point shadows the backend file of the same name.
        let data = entries.iter().find(|e| e.name == "data").unwrap();
        assert!(data.is_dir);
    }

    #[tokio::test]
    async fn test_composite_readdir_merges_backend_entries() {
        let mut router = Router::new();
        let (root, _) = object_backend();
        root.write("/mnt/real.txt", b"x", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/", root).unwrap();
        router.mount("/mnt/vol", object_backend().0).unwrap();

        let entries = router.readdir("/mnt").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["real.txt", "vol"]);
    }

    #[tokio::test]
    async fn test_mutating_mount_point_rejected() {
        let mut router = Router::new();
        router.mount("/", object_backend().0).unwrap();
        router.mount("/data", object_backend().0).unwrap();

        let err = router
            .write("/data", b"x", -1, WriteFlags::CREATE)
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));

        let err = router.create("/data").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));

        let err = router.remove_all("/data").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));

        let err = router.rename("/data", "/elsewhere").await.unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_duplicate_mount_rejected() {
        let mut router = Router::new();
        router.mount("/data", object_backend().0).unwrap();
        let err = router.mount("/data/", object_backend().0).unwrap_err();
        assert!(matches!(err, FsError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unmount() {
        let mut router = Router::new();
        let (fs, _) = object_backend();
        fs.write("/f", b"x", -1, WriteFlags::CREATE).await.unwrap();
        router.mount("/scratch", fs).unwrap();

        assert!(router.read("/scratch/f", 0, -1).await.is_ok());
        assert!(router.unmount("/scratch"));
        assert!(router.read("/scratch/f", 0, -1).await.is_err());
    }

    #[tokio::test]
    async fn test_stat_synthetic_directories() {
        let mut router = Router::new();
        router.mount("/mnt/a", object_backend().0).unwrap();

        assert!(router.stat("/").await.unwrap().is_dir);
        assert!(router.stat("/mnt").await.unwrap().is_dir);
        assert!(router.stat("/mnt/a").await.unwrap().is_dir);

        let err = router.stat("/mnt/b").await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_no_mount_error() {
        let router = Router::new();
        let err = router.read("/nothing/here.txt", 0, -1).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_same_and_cross_mount() {
        let mut router = Router::new();
        let (m1, _) = object_backend();
        m1.write("/old.txt", b"data", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/one", m1).unwrap();
        router.mount("/two", object_backend().0).unwrap();

        router.rename("/one/old.txt", "/one/new.txt").await.unwrap();
        assert_eq!(router.read("/one/new.txt", 0, -1).await.unwrap(), b"data");
        assert!(!router.exists("/one/old.txt").await);

        let err = router
            .rename("/one/new.txt", "/two/new.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_truncate_capability_probe() {
        let mut router = Router::new();
        let (fs, _) = object_backend();
        fs.write("/f", b"Hello, World!", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/obj", fs).unwrap();
        router.mount("/null", NullFs).unwrap();

        router.truncate("/obj/f", 5).await.unwrap();
        assert_eq!(router.read("/obj/f", 0, -1).await.unwrap(), b"Hello");

        let err = router.truncate("/null/f", 5).await.unwrap_err();
        assert!(matches!(err, FsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_search_capability_probe() {
        let mut router = Router::new();
        router.mount("/obj", object_backend().0).unwrap();

        let err = router.search("/obj/docs", "query").await.unwrap_err();
        assert!(matches!(err, FsError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_open_write_flushes_on_close() {
        let mut router = Router::new();
        router.mount("/scratch", object_backend().0).unwrap();

        let mut writer = router.open_write("/scratch/new.txt").unwrap();
        writer.write(b"buffered ");
        writer.write(b"content");
        writer.close().await.unwrap();

        assert_eq!(
            router.read("/scratch/new.txt", 0, -1).await.unwrap(),
            b"buffered content"
        );
    }

    #[tokio::test]
    async fn test_open_read_streams() {
        use tokio::io::AsyncReadExt;

        let mut router = Router::new();
        let (fs, _) = object_backend();
        fs.write("/f", b"stream me", -1, WriteFlags::CREATE)
            .await
            .unwrap();
        router.mount("/m", fs).unwrap();

        let mut reader = router.open_read("/m/f").await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"stream me");
    }
}
