//! Content-search results.

use std::collections::HashMap;

/// One hit from a backend's content search.
///
/// Backends that index by chunk report the chunk position as a 1-indexed
/// `line` so hits render like grep output.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Path of the matching file, relative to the backend root.
    pub file: String,
    /// 1-indexed match position.
    pub line: u64,
    /// Matching text.
    pub content: String,
    /// Backend-specific metadata (e.g. distance, score).
    pub meta: HashMap<String, String>,
}

impl SearchHit {
    pub fn new(file: impl Into<String>, line: u64, content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            line,
            content: content.into(),
            meta: HashMap::new(),
        }
    }

    /// Attach a metadata key/value pair.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}
