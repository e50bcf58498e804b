//! Text-to-vector embedding for the similarity index.
//!
//! [`EmbeddingProvider`] is the seam; [`local::LocalEmbeddingProvider`] runs
//! all-MiniLM-L6-v2 through ONNX Runtime. Providers are built by
//! [`create_provider`], which fails when embeddings are disabled or the model
//! files are missing. The similarity index treats that failure as "unavailable".

pub mod local;

use anyhow::Result;

use crate::config::EmbeddingConfig;

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Produces L2-normalized vectors of [`EMBEDDING_DIM`] dimensions.
///
/// Methods are synchronous and CPU-bound; async callers go through
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Build the configured provider.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Box<dyn EmbeddingProvider>> {
    anyhow::ensure!(config.enabled, "embeddings are disabled in configuration");
    match config.provider.as_str() {
        "local" => Ok(Box::new(local::LocalEmbeddingProvider::load(config)?)),
        other => anyhow::bail!("unknown embedding provider: {other}. Supported: local"),
    }
}

/// L2-normalize in place. A zero vector stays zero.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

/// Raw little-endian bytes of an f32 slice, the format sqlite-vec expects.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            std::mem::size_of_val(embedding),
        )
    }
}
