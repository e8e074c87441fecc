//! Vector-document backend.
//!
//! A content-addressed, deduplicating document store behind the filesystem
//! contract. Writes are acknowledged immediately and indexed asynchronously;
//! the content-search capability answers semantic queries over the indexed
//! chunks.
//!
//! Virtual tree:
//!
//! ```text
//! /                    (synthetic)
//!   README             (synthetic, read-only)
//!   <namespace>/       (created with mkdir)
//!      docs/           (documents; arbitrary sub-paths allowed)
//!      .indexing       (status file)
//! ```

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use plexfs_types::{FileInfo, FsError, FsResult, SearchHit, WriteFlags};
use plexfs_vfs::range::{apply_range, validate_flags};
use plexfs_vfs::{normalize_path, ContentSearch, Filesystem, ObjectStore};

use crate::config::{ConfigError, VectorConfig};
use crate::chunker::ChunkerConfig;
use crate::embed::Embedder;
use crate::index::DocumentIndex;
use crate::indexer::{IndexPipeline, IndexTask, Indexer};

const DOCS_DIR: &str = "docs";
const README_NAME: &str = "README";
const STATUS_NAME: &str = ".indexing";
/// Placeholder status; per-task tracking is a future extension.
const STATUS_IDLE: &str = "idle";
const SEARCH_TOP_K: usize = 10;

const README: &str = "\
vector backend - semantic document search

Documents written under a namespace's docs/ directory are uploaded to an
object store, deduplicated by content digest, and indexed for similarity
search in the background.

LAYOUT
  /
    README              this file
    <namespace>/        one per project, created with mkdir
      docs/             documents (indexed on write)
      .indexing         indexing status

USAGE
  1. Create a namespace:   mkdir <mount>/my_project
  2. Add documents:        write files under <mount>/my_project/docs/
  3. Search:               content-search over <mount>/my_project/docs
  4. Read documents back:  read <mount>/my_project/docs/<name>

CONFIGURATION
  object_store:  access_key, secret_key, bucket, key_prefix, region, endpoint
  database:      dsn
  embedding:     provider, api_key, model, dimension
  chunking:      chunk_size (tokens), chunk_overlap (tokens)
  workers:       index_workers

NOTES
  - Writes are acknowledged before indexing completes.
  - Identical content is stored once, whatever its filename.
  - Per-file removal is not supported; remove the whole namespace instead.
";

/// Filesystem backend over an object store, a document index, and an
/// embedding service.
pub struct VectorBackend {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<dyn Embedder>,
    indexer: Indexer,
    key_prefix: String,
}

impl VectorBackend {
    /// Build the backend and start its worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        config: &VectorConfig,
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if embedder.dimension() != config.embedding.dimension {
            return Err(ConfigError::Invalid(format!(
                "embedder produces dimension {} but config declares {}",
                embedder.dimension(),
                config.embedding.dimension
            )));
        }

        let pipeline = Arc::new(IndexPipeline::new(
            Arc::clone(&store),
            Arc::clone(&index),
            Arc::clone(&embedder),
            ChunkerConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
            },
            config.object_store.key_prefix.clone(),
        ));
        let indexer = Indexer::start(pipeline, config.index_workers);

        Ok(Self {
            store,
            index,
            embedder,
            indexer,
            key_prefix: config.object_store.key_prefix.clone(),
        })
    }

    /// Drain the index queue and stop the workers.
    pub async fn shutdown(&self) {
        self.indexer.shutdown().await;
    }

    /// Split a backend path into `(namespace, rest)`. Both may be empty.
    fn split(path: &str) -> (String, String) {
        let normalized = normalize_path(path);
        let trimmed = normalized.trim_start_matches('/');
        match trimmed.split_once('/') {
            Some((ns, rest)) => (ns.to_string(), rest.to_string()),
            None => (trimmed.to_string(), String::new()),
        }
    }

    /// Document name for a path under `docs/`, if any.
    fn doc_name(rel: &str) -> Option<&str> {
        rel.strip_prefix("docs/").filter(|name| !name.is_empty())
    }

    fn object_key(&self, namespace: &str, digest: &str) -> String {
        format!("{}/{}/{}", self.key_prefix, namespace, digest)
    }

    fn readme_info() -> FileInfo {
        FileInfo::file(README_NAME, README.len() as u64)
            .with_mode(0o444)
            .with_meta("type", "doc")
    }

    fn status_info() -> FileInfo {
        FileInfo::file(STATUS_NAME, STATUS_IDLE.len() as u64)
            .with_mode(0o444)
            .with_meta("type", "status")
    }

    async fn require_namespace(&self, namespace: &str) -> FsResult<()> {
        if self.index.namespace_exists(namespace).await? {
            Ok(())
        } else {
            Err(FsError::NotFound(format!(
                "namespace not found: {namespace}"
            )))
        }
    }
}

#[async_trait]
impl Filesystem for VectorBackend {
    /// Files materialize on write; create is accepted as a no-op.
    async fn create(&self, _path: &str) -> FsResult<()> {
        Ok(())
    }

    async fn mkdir(&self, path: &str, _mode: u32) -> FsResult<()> {
        let (namespace, rel) = Self::split(path);
        if namespace.is_empty() {
            return Err(FsError::InvalidArgument(
                "a namespace name is required".to_string(),
            ));
        }
        if rel.is_empty() {
            return self
                .index
                .create_namespace(&namespace, self.embedder.dimension())
                .await;
        }
        if rel == DOCS_DIR {
            return Err(FsError::AlreadyExists(path.to_string()));
        }
        if rel.starts_with("docs/") {
            // Subdirectories under docs/ are implicit.
            return Ok(());
        }
        Err(FsError::InvalidArgument(
            "only namespace directories and docs/ subdirectories can be created".to_string(),
        ))
    }

    async fn remove(&self, _path: &str) -> FsResult<()> {
        Err(FsError::Unsupported(
            "per-file removal is not supported; remove the whole namespace with remove_all"
                .to_string(),
        ))
    }

    async fn remove_all(&self, path: &str) -> FsResult<()> {
        let (namespace, rel) = Self::split(path);
        if namespace.is_empty() {
            return Err(FsError::InvalidArgument(
                "cannot remove the mount root".to_string(),
            ));
        }
        if !rel.is_empty() {
            return Err(FsError::InvalidArgument(format!(
                "only a whole namespace can be removed: {path}"
            )));
        }
        self.require_namespace(&namespace).await?;

        // Objects first, then the tables that reference them.
        let prefix = format!("{}/{}/", self.key_prefix, namespace);
        for object in self.store.list(&prefix).await? {
            self.store.delete(&object.key).await?;
        }
        self.index.drop_namespace(&namespace).await?;
        tracing::debug!(namespace = %namespace, "namespace removed");
        Ok(())
    }

    async fn read(&self, path: &str, offset: i64, size: i64) -> FsResult<Vec<u8>> {
        let (namespace, rel) = Self::split(path);
        if namespace.is_empty() {
            return Err(FsError::IsDirectory("/".to_string()));
        }
        if namespace == README_NAME && rel.is_empty() {
            return Ok(apply_range(README.as_bytes(), offset, size));
        }
        if rel == STATUS_NAME {
            return Ok(apply_range(STATUS_IDLE.as_bytes(), offset, size));
        }
        if rel.is_empty() || rel == DOCS_DIR {
            self.require_namespace(&namespace).await?;
            return Err(FsError::IsDirectory(path.to_string()));
        }
        let Some(name) = Self::doc_name(&rel) else {
            return Err(FsError::InvalidArgument(
                "only files under docs/ can be read".to_string(),
            ));
        };

        let doc = self
            .index
            .document_by_name(&namespace, name)
            .await?
            .ok_or_else(|| FsError::NotFound(path.to_string()))?;
        let key = self.object_key(&namespace, &doc.digest);
        let data = self.store.get(&key).await?.ok_or_else(|| {
            FsError::Internal(format!("stored object missing for digest {}", doc.digest))
        })?;
        tracing::debug!(
            namespace = %namespace,
            filename = %name,
            digest = %doc.digest,
            size = data.len(),
            "document read"
        );
        Ok(apply_range(&data, offset, size))
    }

    /// Acknowledge the write immediately; upload and indexing run in the
    /// worker pool. The whole payload replaces the document — offsets are
    /// not honored beyond flag validation.
    async fn write(
        &self,
        path: &str,
        data: &[u8],
        _offset: i64,
        flags: WriteFlags,
    ) -> FsResult<u64> {
        validate_flags(flags)?;
        let (namespace, rel) = Self::split(path);
        let filename = match Self::doc_name(&rel) {
            Some(name) if !namespace.is_empty() => name.to_string(),
            _ => {
                return Err(FsError::InvalidArgument(
                    "writes are only accepted under <namespace>/docs/".to_string(),
                ))
            }
        };

        let digest = hex::encode(Sha256::digest(data));
        self.indexer.submit(IndexTask {
            namespace: namespace.clone(),
            digest: digest.clone(),
            filename: filename.clone(),
            payload: data.to_vec(),
        })?;

        tracing::debug!(
            namespace = %namespace,
            filename = %filename,
            digest = %digest,
            size = data.len(),
            "write queued for indexing"
        );
        Ok(data.len() as u64)
    }

    async fn readdir(&self, path: &str) -> FsResult<Vec<FileInfo>> {
        let (namespace, rel) = Self::split(path);

        if namespace.is_empty() {
            let mut entries = vec![Self::readme_info()];
            for ns in self.index.list_namespaces().await? {
                entries.push(FileInfo::directory(ns).with_meta("type", "namespace"));
            }
            return Ok(entries);
        }

        if rel.is_empty() {
            self.require_namespace(&namespace).await?;
            return Ok(vec![
                FileInfo::directory(DOCS_DIR).with_meta("type", "docs"),
                Self::status_info(),
            ]);
        }

        if rel == DOCS_DIR {
            self.require_namespace(&namespace).await?;
            let docs = self.index.list_documents(&namespace).await?;
            return Ok(docs
                .into_iter()
                .map(|doc| {
                    FileInfo::file(doc.filename, doc.size)
                        .with_modified(doc.updated_at)
                        .with_meta("type", "document")
                })
                .collect());
        }

        Err(FsError::NotDirectory(path.to_string()))
    }

    async fn stat(&self, path: &str) -> FsResult<FileInfo> {
        let (namespace, rel) = Self::split(path);

        if namespace.is_empty() {
            return Ok(FileInfo::directory("/").with_meta("type", "root"));
        }
        if namespace == README_NAME && rel.is_empty() {
            return Ok(Self::readme_info());
        }
        if rel.is_empty() {
            self.require_namespace(&namespace).await?;
            return Ok(FileInfo::directory(namespace).with_meta("type", "namespace"));
        }
        if rel == DOCS_DIR {
            self.require_namespace(&namespace).await?;
            return Ok(FileInfo::directory(DOCS_DIR).with_meta("type", "docs"));
        }
        if rel == STATUS_NAME {
            self.require_namespace(&namespace).await?;
            return Ok(Self::status_info());
        }
        if let Some(name) = Self::doc_name(&rel) {
            if let Some(doc) = self.index.document_by_name(&namespace, name).await? {
                return Ok(FileInfo::file(name, doc.size)
                    .with_modified(doc.updated_at)
                    .with_meta("type", "document"));
            }
        }
        Err(FsError::NotFound(path.to_string()))
    }

    async fn rename(&self, _from: &str, _to: &str) -> FsResult<()> {
        Err(FsError::Unsupported(
            "rename is not supported by the vector backend".to_string(),
        ))
    }

    async fn chmod(&self, _path: &str, _mode: u32) -> FsResult<()> {
        Err(FsError::Unsupported(
            "chmod is not supported by the vector backend".to_string(),
        ))
    }

    fn as_search(&self) -> Option<&dyn ContentSearch> {
        Some(self)
    }
}

#[async_trait]
impl ContentSearch for VectorBackend {
    /// Embed the query once and return the top nearest chunks as grep-style
    /// hits.
    async fn search(&self, path: &str, query: &str) -> FsResult<Vec<SearchHit>> {
        let (namespace, rel) = Self::split(path);
        if namespace.is_empty() || !(rel == DOCS_DIR || rel.starts_with("docs/")) {
            return Err(FsError::InvalidArgument(
                "content search is only supported under <namespace>/docs".to_string(),
            ));
        }
        self.require_namespace(&namespace).await?;

        let vector = self.embedder.embed(query).await?;
        let hits = self
            .index
            .nearest_chunks(&namespace, &vector, SEARCH_TOP_K)
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let score = 1.0 - hit.distance;
                SearchHit::new(
                    format!("{namespace}/docs/{}", hit.filename),
                    hit.chunk_index as u64 + 1,
                    hit.text,
                )
                .with_meta("distance", format!("{:.6}", hit.distance))
                .with_meta("score", format!("{score:.6}"))
            })
            .collect())
    }
}
