//! Embedding backend trait and the deterministic hashing embedder.

use sha2::{Digest, Sha256};
use sqlsage_core::{Error, Result};

/// Trait for embedding backends.
///
/// Implementations must be deterministic: identical input text yields
/// identical vectors for the lifetime of a backend. Swapping backends
/// requires an explicit migration (`sqlsage-store::migrate`).
pub trait EmbeddingBackend: Send + Sync {
    /// Generate an embedding for a text string.
    ///
    /// Fails with `Error::Embedding` for input that cannot be embedded
    /// (empty or whitespace-only text). Never returns a zero vector as a
    /// failure sentinel.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for a batch of texts.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Result<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// The fixed output dimension.
    fn dimension(&self) -> usize;

    /// Stable backend name, used to detect embedding-function changes.
    fn name(&self) -> &str;
}

/// Deterministic token-hashing embedder.
///
/// Feature-hashes lowercased alphanumeric tokens into a fixed-dimension
/// bag-of-words vector, then L2-normalizes. Not a learned model, but
/// deterministic and cheap, so stores built with it rank overlapping
/// vocabulary sensibly and tests get stable vectors.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Hash a token to (bucket, sign). The sign bit halves the bias
    /// introduced by bucket collisions.
    fn token_slot(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let bucket = u64::from_le_bytes(digest[..8].try_into().unwrap()) as usize % self.dim;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (bucket, sign)
    }
}

impl EmbeddingBackend for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::Embedding("cannot embed empty text".into()));
        }

        let mut vector = vec![0.0f32; self.dim];
        let lowered = text.to_lowercase();
        for token in lowered.split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let (bucket, sign) = self.token_slot(token);
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm < 1e-9 {
            return Err(Error::Embedding("text produced no tokens".into()));
        }
        for v in &mut vector {
            *v /= norm;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn name(&self) -> &str {
        "hashing-v1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let embedder = HashEmbedder::new(384);
        let a = embedder.embed("total sales by region").unwrap();
        let b = embedder.embed("total sales by region").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[test]
    fn test_normalized() {
        let embedder = HashEmbedder::new(128);
        let v = embedder.embed("SELECT * FROM sales").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_input_fails() {
        let embedder = HashEmbedder::new(384);
        assert!(matches!(embedder.embed(""), Err(Error::Embedding(_))));
        assert!(matches!(embedder.embed("   "), Err(Error::Embedding(_))));
    }

    #[test]
    fn test_shared_vocabulary_ranks_higher() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed("total sales amount").unwrap();
        let close = embedder.embed("total sales?").unwrap();
        let far = embedder.embed("customer churn dashboard").unwrap();

        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(dot(&query, &close) > dot(&query, &far));
    }
}
