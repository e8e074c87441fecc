//! plexfs-vector: the content-addressed vector-document backend.
//!
//! Documents written under a namespace's `docs/` directory are digested,
//! uploaded to an object store, registered in an indexed database, and
//! chunked + embedded asynchronously by a bounded worker pool. The backend
//! answers the content-search capability with nearest-neighbor queries over
//! the indexed chunks.
//!
//! The object store, database, and embedding service are opaque capability
//! traits; in-memory implementations ship for tests and local development.

pub mod backend;
pub mod chunker;
pub mod config;
pub mod embed;
pub mod index;
pub mod indexer;

pub use backend::VectorBackend;
pub use chunker::{chunk_text, Chunk, ChunkerConfig};
pub use config::{ConfigError, DatabaseConfig, EmbeddingConfig, ObjectStoreConfig, VectorConfig};
pub use embed::Embedder;
pub use index::{ChunkHit, ChunkRecord, DocumentIndex, DocumentRecord, MemoryDocumentIndex};
pub use indexer::{IndexPipeline, IndexTask, Indexer, QUEUE_CAPACITY};
