//! VectorBackend configuration.
//!
//! The structs are the configuration boundary; whatever deserializes them
//! (TOML, JSON, env) rejects unknown keys as a fatal error via
//! `deny_unknown_fields`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing required config key: {0}")]
    MissingKey(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Object-store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ObjectStoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub key_prefix: String,
    pub region: String,
    pub endpoint: String,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: String::new(),
            key_prefix: "vectorfs".to_string(),
            region: "us-east-1".to_string(),
            endpoint: String::new(),
        }
    }
}

/// Indexed-database connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DatabaseConfig {
    pub dsn: String,
}

/// Embedding-service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

/// Full VectorBackend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VectorConfig {
    pub mount_path: String,
    pub object_store: ObjectStoreConfig,
    pub database: DatabaseConfig,
    pub embedding: EmbeddingConfig,
    /// Chunk window size, in tokens.
    pub chunk_size: usize,
    /// Tokens shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// Worker tasks consuming the index queue.
    pub index_workers: usize,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            mount_path: "/vectorfs".to_string(),
            object_store: ObjectStoreConfig::default(),
            database: DatabaseConfig::default(),
            embedding: EmbeddingConfig::default(),
            chunk_size: 512,
            chunk_overlap: 50,
            index_workers: 4,
        }
    }
}

impl VectorConfig {
    /// Check required keys and cross-field rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.object_store.bucket.is_empty() {
            return Err(ConfigError::MissingKey("object_store.bucket"));
        }
        if self.database.dsn.is_empty() {
            return Err(ConfigError::MissingKey("database.dsn"));
        }
        if self.embedding.provider == "openai" && self.embedding.api_key.is_empty() {
            return Err(ConfigError::MissingKey("embedding.api_key"));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be at least 1".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.index_workers == 0 {
            return Err(ConfigError::Invalid(
                "index_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
