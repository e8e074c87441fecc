//! Sliding-window text chunker.
//!
//! Tokens are whitespace-separated words. Consecutive chunks share exactly
//! `chunk_overlap` tokens, every chunk carries at most `chunk_size` tokens,
//! and the last chunk may be shorter.

/// Chunking parameters, in tokens.
#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

/// One chunk of a document. Indices are dense and zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Split `text` into overlapping token windows.
///
/// Empty or whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<Chunk> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let size = config.chunk_size.max(1);
    let stride = size.saturating_sub(config.chunk_overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut index = 0;
    loop {
        let end = (start + size).min(tokens.len());
        chunks.push(Chunk {
            index,
            text: tokens[start..end].join(" "),
        });
        if end == tokens.len() {
            break;
        }
        start += stride;
        index += 1;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_empty_input() {
        let config = ChunkerConfig::default();
        assert!(chunk_text("", &config).is_empty());
        assert!(chunk_text("   \n\t ", &config).is_empty());
    }

    #[test]
    fn test_single_chunk_when_short() {
        let config = ChunkerConfig {
            chunk_size: 10,
            chunk_overlap: 2,
        };
        let chunks = chunk_text("one two three", &config);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "one two three");
    }

    #[test]
    fn test_exact_overlap_between_consecutive_chunks() {
        let config = ChunkerConfig {
            chunk_size: 5,
            chunk_overlap: 2,
        };
        let text = words(12);
        let chunks = chunk_text(&text, &config);

        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].text.split_whitespace().collect();
            let right: Vec<&str> = pair[1].text.split_whitespace().collect();
            // The last `overlap` tokens of one chunk open the next.
            assert_eq!(&left[left.len() - 2..], &right[..2]);
        }
    }

    #[test]
    fn test_dense_zero_based_indices_and_short_tail() {
        let config = ChunkerConfig {
            chunk_size: 4,
            chunk_overlap: 1,
        };
        let text = words(10);
        let chunks = chunk_text(&text, &config);

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            let count = chunk.text.split_whitespace().count();
            assert!(count <= 4);
        }
        // Stride 3 over 10 tokens: windows at 0, 3, 6, 9.
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[3].text, "w9");
    }

    #[test]
    fn test_every_token_is_covered() {
        let config = ChunkerConfig {
            chunk_size: 6,
            chunk_overlap: 3,
        };
        let text = words(25);
        let chunks = chunk_text(&text, &config);

        let mut seen = std::collections::HashSet::new();
        for chunk in &chunks {
            for token in chunk.text.split_whitespace() {
                seen.insert(token.to_string());
            }
        }
        assert_eq!(seen.len(), 25);
    }
}
