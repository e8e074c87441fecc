//! Document-index capability interface.
//!
//! The index persists per-namespace document metadata and chunk embeddings
//! and answers nearest-neighbor queries. Real deployments bind this to an
//! indexed SQL database with a vector column; `MemoryDocumentIndex` is the
//! in-memory implementation used for tests and local development.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::SystemTime;
use tokio::sync::RwLock;

use plexfs_types::{FsError, FsResult};

/// Metadata row for one document.
///
/// Documents are identified by filename within a namespace; the digest is
/// the content address. Writing new content under an existing filename
/// replaces the row (the digest changes). Two filenames may share a digest.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub digest: String,
    pub filename: String,
    pub size: u64,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl DocumentRecord {
    pub fn new(digest: impl Into<String>, filename: impl Into<String>, size: u64) -> Self {
        let now = SystemTime::now();
        Self {
            digest: digest.into(),
            filename: filename.into(),
            size,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One chunk row: primary key is `(digest, chunk_index)`, so re-indexing the
/// same content is idempotent.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub digest: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Nearest-neighbor query hit.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
    pub distance: f32,
}

/// Capability interface over the indexed database.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Create a namespace with a fixed embedding dimension.
    async fn create_namespace(&self, namespace: &str, dimension: usize) -> FsResult<()>;

    /// Drop a namespace and everything in it.
    async fn drop_namespace(&self, namespace: &str) -> FsResult<()>;

    async fn list_namespaces(&self) -> FsResult<Vec<String>>;

    async fn namespace_exists(&self, namespace: &str) -> FsResult<bool>;

    /// True if any document in the namespace has this content digest.
    async fn has_document(&self, namespace: &str, digest: &str) -> FsResult<bool>;

    /// Insert or update a document row, keyed by filename.
    async fn insert_document(&self, namespace: &str, record: DocumentRecord) -> FsResult<()>;

    async fn document_by_name(
        &self,
        namespace: &str,
        filename: &str,
    ) -> FsResult<Option<DocumentRecord>>;

    /// All documents in the namespace, sorted by filename.
    async fn list_documents(&self, namespace: &str) -> FsResult<Vec<DocumentRecord>>;

    /// Insert a chunk row; the embedding must match the namespace dimension.
    async fn insert_chunk(&self, namespace: &str, chunk: ChunkRecord) -> FsResult<()>;

    /// Top-`k` chunks by ascending distance to `vector`.
    async fn nearest_chunks(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> FsResult<Vec<ChunkHit>>;
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

#[derive(Debug, Default)]
struct NamespaceData {
    dimension: usize,
    /// Documents keyed by filename.
    documents: BTreeMap<String, DocumentRecord>,
    /// Chunks keyed by `(digest, chunk_index)`.
    chunks: BTreeMap<(String, usize), ChunkRecord>,
}

/// In-memory document index with exact nearest-neighbor search.
///
/// Thread-safe via an internal `RwLock`; all data is lost on drop.
#[derive(Debug, Default)]
pub struct MemoryDocumentIndex {
    namespaces: RwLock<BTreeMap<String, NamespaceData>>,
}

impl MemoryDocumentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of chunk rows in a namespace (test observability).
    pub async fn chunk_count(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map_or(0, |data| data.chunks.len())
    }
}

fn missing(namespace: &str) -> FsError {
    FsError::NotFound(format!("namespace not found: {namespace}"))
}

#[async_trait]
impl DocumentIndex for MemoryDocumentIndex {
    async fn create_namespace(&self, namespace: &str, dimension: usize) -> FsResult<()> {
        let mut namespaces = self.namespaces.write().await;
        if namespaces.contains_key(namespace) {
            return Err(FsError::AlreadyExists(format!(
                "namespace already exists: {namespace}"
            )));
        }
        namespaces.insert(
            namespace.to_string(),
            NamespaceData {
                dimension,
                ..NamespaceData::default()
            },
        );
        Ok(())
    }

    async fn drop_namespace(&self, namespace: &str) -> FsResult<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .remove(namespace)
            .map(|_| ())
            .ok_or_else(|| missing(namespace))
    }

    async fn list_namespaces(&self) -> FsResult<Vec<String>> {
        Ok(self.namespaces.read().await.keys().cloned().collect())
    }

    async fn namespace_exists(&self, namespace: &str) -> FsResult<bool> {
        Ok(self.namespaces.read().await.contains_key(namespace))
    }

    async fn has_document(&self, namespace: &str, digest: &str) -> FsResult<bool> {
        let namespaces = self.namespaces.read().await;
        let data = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(data.documents.values().any(|doc| doc.digest == digest))
    }

    async fn insert_document(&self, namespace: &str, record: DocumentRecord) -> FsResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let data = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;
        match data.documents.get_mut(&record.filename) {
            Some(existing) => {
                // Replacement keeps the original creation time.
                existing.digest = record.digest;
                existing.size = record.size;
                existing.updated_at = record.updated_at;
            }
            None => {
                data.documents.insert(record.filename.clone(), record);
            }
        }
        Ok(())
    }

    async fn document_by_name(
        &self,
        namespace: &str,
        filename: &str,
    ) -> FsResult<Option<DocumentRecord>> {
        let namespaces = self.namespaces.read().await;
        let data = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(data.documents.get(filename).cloned())
    }

    async fn list_documents(&self, namespace: &str) -> FsResult<Vec<DocumentRecord>> {
        let namespaces = self.namespaces.read().await;
        let data = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        Ok(data.documents.values().cloned().collect())
    }

    async fn insert_chunk(&self, namespace: &str, chunk: ChunkRecord) -> FsResult<()> {
        let mut namespaces = self.namespaces.write().await;
        let data = namespaces
            .get_mut(namespace)
            .ok_or_else(|| missing(namespace))?;
        if chunk.embedding.len() != data.dimension {
            return Err(FsError::InvalidArgument(format!(
                "embedding dimension {} does not match namespace dimension {}",
                chunk.embedding.len(),
                data.dimension
            )));
        }
        data.chunks
            .insert((chunk.digest.clone(), chunk.chunk_index), chunk);
        Ok(())
    }

    async fn nearest_chunks(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> FsResult<Vec<ChunkHit>> {
        let namespaces = self.namespaces.read().await;
        let data = namespaces.get(namespace).ok_or_else(|| missing(namespace))?;
        if vector.len() != data.dimension {
            return Err(FsError::InvalidArgument(format!(
                "query dimension {} does not match namespace dimension {}",
                vector.len(),
                data.dimension
            )));
        }

        let mut hits: Vec<ChunkHit> = data
            .chunks
            .values()
            .filter_map(|chunk| {
                // A chunk is reachable only while some document points at its
                // digest.
                let doc = data
                    .documents
                    .values()
                    .filter(|doc| doc.digest == chunk.digest)
                    .max_by_key(|doc| doc.updated_at)?;
                Some(ChunkHit {
                    filename: doc.filename.clone(),
                    chunk_index: chunk.chunk_index,
                    text: chunk.text.clone(),
                    distance: cosine_distance(vector, &chunk.embedding),
                })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(top_k);
        Ok(hits)
    }
}
