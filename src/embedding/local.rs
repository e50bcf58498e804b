//! ONNX Runtime provider for all-MiniLM-L6-v2.
//!
//! Tokenize → run the transformer → attention-masked mean pooling → L2 normalize.

use std::path::Path;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};

use super::{normalize, EmbeddingProvider, EMBEDDING_DIM};
use crate::config::{expand_tilde, EmbeddingConfig};

/// all-MiniLM-L6-v2 was trained at 256 tokens.
const MAX_SEQ_LEN: usize = 256;

pub struct LocalEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync and the Session is only used behind the Mutex.
unsafe impl Send for LocalEmbeddingProvider {}
unsafe impl Sync for LocalEmbeddingProvider {}

impl LocalEmbeddingProvider {
    /// Load `model.onnx` and `tokenizer.json` from the configured cache dir.
    pub fn load(config: &EmbeddingConfig) -> Result<Self> {
        let dir = expand_tilde(&config.cache_dir);
        Self::from_dir(&dir)
    }

    pub fn from_dir(dir: &Path) -> Result<Self> {
        let model_path = dir.join("model.onnx");
        let tokenizer_path = dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `jira-cache model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "tokenizer not found at {}. Run `jira-cache model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("failed to load tokenizer: {e}"))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow!("failed to set truncation: {e}"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        tracing::info!(model = %model_path.display(), "embedding model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl EmbeddingProvider for LocalEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("embedding batch returned no vectors"))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| anyhow!("tokenization failed: {e}"))?;
        let batch = BatchInputs::from_encodings(&encodings);

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow!("session lock poisoned: {e}"))?;

        let shape = vec![batch.size as i64, batch.seq_len as i64];
        let outputs = session.run(ort::inputs! {
            "input_ids" => Tensor::from_array((shape.clone(), batch.input_ids.into_boxed_slice()))?,
            "attention_mask" => Tensor::from_array((shape.clone(), batch.attention_mask.clone().into_boxed_slice()))?,
            "token_type_ids" => Tensor::from_array((shape, vec![0i64; batch.size * batch.seq_len].into_boxed_slice()))?,
        })?;

        // Output name depends on the export; fall back to the first output.
        let hidden = outputs
            .get("last_hidden_state")
            .or_else(|| outputs.get("token_embeddings"))
            .unwrap_or(&outputs[0]);
        let (dims, data) = hidden
            .try_extract_tensor::<f32>()
            .context("failed to extract hidden-state tensor")?;

        anyhow::ensure!(
            dims.len() == 3 && dims[2] == EMBEDDING_DIM as i64,
            "unexpected hidden-state shape {:?}, expected [batch, seq, {EMBEDDING_DIM}]",
            &dims[..]
        );

        Ok((0..batch.size)
            .map(|b| {
                let mut pooled = mean_pool(
                    data,
                    &batch.attention_mask,
                    b,
                    batch.seq_len,
                    dims[1] as usize,
                    EMBEDDING_DIM,
                );
                normalize(&mut pooled);
                pooled
            })
            .collect())
    }
}

/// Flattened `[batch, seq]` model inputs.
struct BatchInputs {
    size: usize,
    seq_len: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

impl BatchInputs {
    fn from_encodings(encodings: &[Encoding]) -> Self {
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        let mut input_ids = Vec::with_capacity(encodings.len() * seq_len);
        let mut attention_mask = Vec::with_capacity(encodings.len() * seq_len);
        for encoding in encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }
        Self {
            size: encodings.len(),
            seq_len,
            input_ids,
            attention_mask,
        }
    }
}

/// Average the token vectors of row `b`, counting only unmasked tokens.
fn mean_pool(
    hidden: &[f32],
    mask: &[i64],
    b: usize,
    mask_seq_len: usize,
    out_seq_len: usize,
    dim: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; dim];
    let mut count = 0.0f32;
    for s in 0..out_seq_len.min(mask_seq_len) {
        if mask[b * mask_seq_len + s] == 0 {
            continue;
        }
        let offset = (b * out_seq_len + s) * dim;
        for (acc, value) in sum.iter_mut().zip(&hidden[offset..offset + dim]) {
            *acc += value;
        }
        count += 1.0;
    }
    if count > 0.0 {
        sum.iter_mut().for_each(|x| *x /= count);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pool_ignores_masked_tokens() {
        // batch 1, seq 3, dim 2; last token is padding
        let hidden = vec![1.0, 2.0, 3.0, 4.0, 100.0, 100.0];
        let mask = vec![1, 1, 0];
        let pooled = mean_pool(&hidden, &mask, 0, 3, 3, 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_all_masked_is_zero() {
        let hidden = vec![5.0, 5.0];
        let pooled = mean_pool(&hidden, &[0], 0, 1, 1, 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }

    fn model_dir() -> std::path::PathBuf {
        crate::config::default_cache_dir().join("models")
    }

    #[test]
    #[ignore] // Requires model files: run `jira-cache model download`, then `cargo test -- --ignored`
    fn embeds_to_normalized_384_dims() {
        let provider = LocalEmbeddingProvider::from_dir(&model_dir()).unwrap();
        let emb = provider.embed("Login page crashes on Safari").unwrap();
        assert_eq!(emb.len(), EMBEDDING_DIM);
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    #[ignore]
    fn similar_issue_texts_score_higher() {
        let provider = LocalEmbeddingProvider::from_dir(&model_dir()).unwrap();
        let embs = provider
            .embed_batch(&[
                "Login fails on Safari",
                "Safari users cannot sign in",
                "Add CSV export to reports",
            ])
            .unwrap();
        let dot = |a: &[f32], b: &[f32]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
        assert!(dot(&embs[0], &embs[1]) > dot(&embs[0], &embs[2]));
    }
}
