//! Asynchronous indexing: bounded job queue and worker pool.
//!
//! Writes into the vector backend enqueue an [`IndexTask`] and return
//! immediately; a fixed pool of workers executes the tasks. Enqueueing never
//! blocks the caller: when the queue is full, a detached helper task waits
//! for capacity instead.

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use plexfs_types::{FsError, FsResult};
use plexfs_vfs::ObjectStore;

use crate::chunker::{chunk_text, ChunkerConfig};
use crate::embed::Embedder;
use crate::index::{ChunkRecord, DocumentIndex, DocumentRecord};

/// Bound on queued tasks.
pub const QUEUE_CAPACITY: usize = 100;

/// One pending document write.
#[derive(Debug, Clone)]
pub struct IndexTask {
    pub namespace: String,
    pub digest: String,
    pub filename: String,
    pub payload: Vec<u8>,
}

/// Executes one indexing task end to end.
pub struct IndexPipeline {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn DocumentIndex>,
    embedder: Arc<dyn Embedder>,
    chunker: ChunkerConfig,
    key_prefix: String,
}

impl IndexPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn DocumentIndex>,
        embedder: Arc<dyn Embedder>,
        chunker: ChunkerConfig,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            index,
            embedder,
            chunker,
            key_prefix: key_prefix.into(),
        }
    }

    /// Object-store key for a document: `<prefix>/<namespace>/<digest>`.
    pub fn object_key(&self, namespace: &str, digest: &str) -> String {
        format!("{}/{}/{}", self.key_prefix, namespace, digest)
    }

    /// Run one task.
    ///
    /// Prepare phase first: upload (skipped when the digest is already
    /// stored) and metadata commit, which makes the file visible. The index
    /// phase then chunks, embeds in one batch, and inserts chunk rows; it is
    /// skipped entirely for an already-indexed digest.
    pub async fn run(&self, task: &IndexTask) -> FsResult<()> {
        let deduplicated = self.index.has_document(&task.namespace, &task.digest).await?;

        if !deduplicated {
            let key = self.object_key(&task.namespace, &task.digest);
            self.store.put(&key, task.payload.clone()).await?;
        }
        self.index
            .insert_document(
                &task.namespace,
                DocumentRecord::new(&task.digest, &task.filename, task.payload.len() as u64),
            )
            .await?;
        if deduplicated {
            tracing::debug!(
                namespace = %task.namespace,
                digest = %task.digest,
                filename = %task.filename,
                "content already indexed; recorded filename only"
            );
            return Ok(());
        }

        let text = String::from_utf8_lossy(&task.payload);
        let chunks = chunk_text(&text, &self.chunker);
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(FsError::Internal(format!(
                "embedding service returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let chunk_total = chunks.len();
        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            self.index
                .insert_chunk(
                    &task.namespace,
                    ChunkRecord {
                        digest: task.digest.clone(),
                        chunk_index: chunk.index,
                        text: chunk.text,
                        embedding,
                    },
                )
                .await?;
        }

        tracing::debug!(
            namespace = %task.namespace,
            filename = %task.filename,
            chunks = chunk_total,
            "document indexed"
        );
        Ok(())
    }
}

/// Bounded queue plus fixed worker pool.
pub struct Indexer {
    tx: std::sync::Mutex<Option<mpsc::Sender<IndexTask>>>,
    shutdown_tx: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Indexer {
    /// Start `worker_count` workers consuming the queue immediately.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(pipeline: Arc<IndexPipeline>, worker_count: usize) -> Self {
        let (tx, rx) = mpsc::channel::<IndexTask>(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));
        let (shutdown_tx, _) = watch::channel(false);

        let mut workers = Vec::new();
        for id in 0..worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let pipeline = Arc::clone(&pipeline);
            workers.push(tokio::spawn(async move {
                loop {
                    let task = { rx.lock().await.recv().await };
                    let Some(task) = task else { break };
                    if let Err(error) = pipeline.run(&task).await {
                        // At-most-once: log with task identity and discard.
                        tracing::error!(
                            worker = id,
                            namespace = %task.namespace,
                            filename = %task.filename,
                            %error,
                            "indexing failed; task discarded"
                        );
                    }
                }
                tracing::debug!(worker = id, "index worker stopped");
            }));
        }

        Self {
            tx: std::sync::Mutex::new(Some(tx)),
            shutdown_tx,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue a task without blocking the caller.
    ///
    /// On a full queue the task is handed to a detached helper that waits
    /// for capacity.
    pub fn submit(&self, task: IndexTask) -> FsResult<()> {
        if *self.shutdown_tx.borrow() {
            return Err(FsError::Unavailable("indexer is shut down".to_string()));
        }
        let sender = {
            let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
            match guard.as_ref() {
                Some(tx) => tx.clone(),
                None => {
                    return Err(FsError::Unavailable("index queue is closed".to_string()))
                }
            }
        };
        match sender.try_send(task) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(task)) => {
                tracing::warn!(
                    namespace = %task.namespace,
                    filename = %task.filename,
                    "index queue full; enqueue deferred off the write path"
                );
                let tx = sender.clone();
                tokio::spawn(async move {
                    let _ = tx.send(task).await;
                });
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(FsError::Unavailable("index queue is closed".to_string()))
            }
        }
    }

    /// True once shutdown has been signalled.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Signal shutdown, close the queue, and join the workers.
    ///
    /// Every task enqueued before the call (including tasks parked in
    /// deferred-enqueue helpers) is executed before this returns.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        {
            let mut guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
            guard.take();
        }
        let mut workers = self.workers.lock().await;
        for handle in workers.drain(..) {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::MemoryDocumentIndex;
    use async_trait::async_trait;
    use plexfs_vfs::MemoryObjectStore;

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> FsResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    fn pipeline() -> (Arc<IndexPipeline>, Arc<MemoryObjectStore>, Arc<MemoryDocumentIndex>) {
        let store = Arc::new(MemoryObjectStore::new());
        let index = Arc::new(MemoryDocumentIndex::new());
        let pipeline = Arc::new(IndexPipeline::new(
            store.clone(),
            index.clone(),
            Arc::new(FixedEmbedder),
            ChunkerConfig {
                chunk_size: 4,
                chunk_overlap: 1,
            },
            "vectorfs",
        ));
        (pipeline, store, index)
    }

    fn task(digest: &str, filename: &str, payload: &str) -> IndexTask {
        IndexTask {
            namespace: "ns".to_string(),
            digest: digest.to_string(),
            filename: filename.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_pipeline_prepare_and_index() {
        let (pipeline, store, index) = pipeline();
        index.create_namespace("ns", 2).await.unwrap();

        pipeline.run(&task("d1", "a.txt", "hello world")).await.unwrap();

        assert_eq!(
            store.get("vectorfs/ns/d1").await.unwrap(),
            Some(b"hello world".to_vec())
        );
        assert!(index.has_document("ns", "d1").await.unwrap());
        assert_eq!(index.chunk_count("ns").await, 1);
    }

    #[tokio::test]
    async fn test_pipeline_dedup_skips_upload_and_chunks() {
        let (pipeline, store, index) = pipeline();
        index.create_namespace("ns", 2).await.unwrap();

        pipeline.run(&task("d1", "a.txt", "payload")).await.unwrap();
        let chunk_count = index.chunk_count("ns").await;

        // Same digest under a new filename: metadata only.
        pipeline.run(&task("d1", "b.txt", "payload")).await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(index.chunk_count("ns").await, chunk_count);
        assert_eq!(index.list_documents("ns").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_pipeline_missing_namespace_errors() {
        let (pipeline, _, _) = pipeline();
        let err = pipeline.run(&task("d1", "a.txt", "x")).await.unwrap_err();
        assert!(matches!(err, FsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_indexer_drains_on_shutdown() {
        let (pipeline, _, index) = pipeline();
        index.create_namespace("ns", 2).await.unwrap();

        let indexer = Indexer::start(pipeline, 4);
        for i in 0..20 {
            indexer
                .submit(task(&format!("d{i}"), &format!("f{i}.txt"), "some words here"))
                .unwrap();
        }
        indexer.shutdown().await;

        // Every task enqueued before shutdown was executed.
        assert_eq!(index.list_documents("ns").await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_rejected() {
        let (pipeline, _, index) = pipeline();
        index.create_namespace("ns", 2).await.unwrap();

        let indexer = Indexer::start(pipeline, 1);
        indexer.shutdown().await;
        assert!(indexer.is_shut_down());

        let err = indexer.submit(task("d1", "a.txt", "x")).unwrap_err();
        assert!(matches!(err, FsError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_worker_survives_failing_task() {
        let (pipeline, _, index) = pipeline();
        index.create_namespace("ns", 2).await.unwrap();

        let indexer = Indexer::start(pipeline, 1);
        // First task fails inside the worker (unknown namespace) and is
        // discarded; the second still runs.
        let mut bad = task("d0", "bad.txt", "x");
        bad.namespace = "missing".to_string();
        indexer.submit(bad).unwrap();
        indexer.submit(task("d1", "good.txt", "x")).unwrap();
        indexer.shutdown().await;

        assert!(index.has_document("ns", "d1").await.unwrap());
    }
}
