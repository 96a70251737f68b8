//! Order-preserving chunking of keyword lists.
//!
//! Every batch sub-request carries one chunk, and the chunk index is part of
//! the request key, so chunking must be deterministic: chunk `i` always holds
//! `items[i * size .. min((i + 1) * size, len)]`.

use crate::error::AppError;

/// Chunk size presets for the different request paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSize {
    /// 200 keywords per prompt (localize, classify, validate)
    Prompt,
    /// 1,000 keywords per historical-metrics call
    Metrics,
    /// Custom item count
    Custom(usize),
}

impl ChunkSize {
    /// Returns the chunk size as a usize.
    pub fn as_usize(self) -> usize {
        match self {
            ChunkSize::Prompt => 200,
            ChunkSize::Metrics => 1_000,
            ChunkSize::Custom(n) => n,
        }
    }
}

impl From<ChunkSize> for usize {
    fn from(size: ChunkSize) -> Self {
        size.as_usize()
    }
}

/// Splits `items` into consecutive chunks of at most `size` elements.
///
/// The last chunk may be shorter. An empty input yields no chunks.
///
/// # Errors
///
/// Returns `AppError::InvalidInput` if `size` is zero.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Result<Vec<Vec<T>>, AppError> {
    if size == 0 {
        return Err(AppError::InvalidInput(
            "Chunk size must be greater than 0".to_string(),
        ));
    }

    Ok(items.chunks(size).map(|c| c.to_vec()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{}", i)).collect()
    }

    #[test]
    fn test_concatenation_and_count() {
        for (len, size) in [(0, 3), (1, 3), (3, 3), (7, 3), (200, 200), (401, 200), (5, 1)] {
            let items = keywords(len);
            let chunks = chunk(&items, size).unwrap();

            assert_eq!(chunks.len(), len.div_ceil(size), "count for len={} size={}", len, size);

            let flattened: Vec<String> = chunks.iter().flatten().cloned().collect();
            assert_eq!(flattened, items, "concatenation for len={} size={}", len, size);

            // Only the last chunk may be short
            for (i, c) in chunks.iter().enumerate() {
                if i + 1 < chunks.len() {
                    assert_eq!(c.len(), size);
                } else {
                    assert!(!c.is_empty() && c.len() <= size);
                }
            }
        }
    }

    #[test]
    fn test_chunk_order_is_index_stable() {
        let items = keywords(5);
        let chunks = chunk(&items, 2).unwrap();
        assert_eq!(chunks[0], vec!["kw0", "kw1"]);
        assert_eq!(chunks[1], vec!["kw2", "kw3"]);
        assert_eq!(chunks[2], vec!["kw4"]);
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        let chunks = chunk::<String>(&[], ChunkSize::Prompt.as_usize()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let result = chunk(&keywords(3), 0);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let result = chunk(&keywords(3), ChunkSize::Custom(0).into());
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_chunk_size_variants() {
        assert_eq!(ChunkSize::Prompt.as_usize(), 200);
        assert_eq!(ChunkSize::Metrics.as_usize(), 1_000);
        assert_eq!(ChunkSize::Custom(42).as_usize(), 42);
        assert_eq!(usize::from(ChunkSize::Prompt), 200);
    }
}
