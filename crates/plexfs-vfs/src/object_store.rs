//! Object-store capability interface.
//!
//! The store holds immutable objects under flat string keys; `put` is an
//! atomic whole-object replace. Real deployments bind this to S3-compatible
//! services; `MemoryObjectStore` serves tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tokio::sync::RwLock;

use crate::traits::FsResult;

/// Metadata for one stored object.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub modified: SystemTime,
}

/// Capability interface over an immutable object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes, or `None` if the key is absent.
    async fn get(&self, key: &str) -> FsResult<Option<Vec<u8>>>;

    /// Store an object, atomically replacing any previous version.
    async fn put(&self, key: &str, data: Vec<u8>) -> FsResult<()>;

    /// Delete an object. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> FsResult<()>;

    /// List objects whose key starts with `prefix`, sorted by key.
    async fn list(&self, prefix: &str) -> FsResult<Vec<ObjectInfo>>;
}

/// In-memory object store.
///
/// Thread-safe via an internal `RwLock`; all data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> FsResult<Option<Vec<u8>>> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|(data, _)| data.clone()))
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> FsResult<()> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_string(), (data, SystemTime::now()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> FsResult<()> {
        let mut objects = self.objects.write().await;
        objects.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> FsResult<Vec<ObjectInfo>> {
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, (data, modified))| ObjectInfo {
                key: key.clone(),
                size: data.len() as u64,
                modified: *modified,
            })
            .collect())
    }
}
