//! SQLSage Embed — embedding backends and query cache.
//!
//! Provides the `EmbeddingBackend` trait for turning text into
//! fixed-dimension float vectors. When the `onnx` feature is enabled and
//! model files are present, `OnnxEmbedder` loads all-MiniLM-L6-v2 for
//! 384-dim embeddings. Without it, the deterministic `HashEmbedder` is
//! used so retrieval stays functional on any machine.

pub mod backend;
pub mod cache;
pub mod onnx;

pub use backend::{EmbeddingBackend, HashEmbedder};
pub use cache::EmbeddingCache;

#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available embedder for the given model directory.
///
/// Tries ONNX first (if the feature is enabled and model files are
/// present), falls back to the hashing embedder.
pub fn create_embedder(model_dir: &Path, dimension: usize) -> Arc<dyn EmbeddingBackend> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEmbedder::load(model_dir) {
            Ok(embedder) => {
                tracing::info!("Using ONNX embedder (dim={})", embedder.dimension());
                return Arc::new(embedder);
            }
            Err(e) => {
                tracing::warn!(
                    "ONNX embedder unavailable: {}. Falling back to hashing embedder.",
                    e
                );
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using hashing embedder.");
    }

    Arc::new(HashEmbedder::new(dimension))
}
