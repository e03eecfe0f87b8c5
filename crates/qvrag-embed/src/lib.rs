//! qvrag-embed
//!
//! Embedders behind the `qvrag_core::traits::Embedder` seam: a candle-based
//! BGE-M3 model for real use, and a hashed bag-of-words embedder selected with
//! `APP_USE_FAKE_EMBEDDINGS=1` for fast, deterministic tests and development.

use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use qvrag_core::traits::Embedder;

pub mod device;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use model::BgeM3Embedder;
pub use pool::masked_mean_l2;

pub const DEFAULT_FAKE_DIM: usize = 1024;

/// Deterministic embedder that hashes lowercase word tokens into buckets and
/// L2-normalizes the result. Texts sharing words land close together.
#[derive(Debug, Clone)]
pub struct HashEmbedder { dim: usize }

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> qvrag_core::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// The embedder selected by the environment: the hashed embedder when
/// `APP_USE_FAKE_EMBEDDINGS` is set, otherwise the BGE-M3 model.
pub fn get_default_embedder() -> qvrag_core::Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        tracing::info!(dim = DEFAULT_FAKE_DIM, "using hashed fake embedder");
        return Ok(Box::new(HashEmbedder::new(DEFAULT_FAKE_DIM)));
    }
    let model = BgeM3Embedder::new().map_err(qvrag_core::Error::embedding)?;
    Ok(Box::new(model))
}
