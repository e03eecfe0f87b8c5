use crate::error::Result;

/// Turns text into fixed-size vectors.
///
/// Implementations must return one vector per input, each of length `dim()`,
/// and must be deterministic for a given model.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| crate::error::Error::Operation("embedder returned no vector".into()))
    }
}
