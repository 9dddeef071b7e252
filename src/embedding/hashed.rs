//! Deterministic last-resort embedder.
//!
//! Feature hashing over lowercase word tokens: each token contributes a
//! signed unit weight to a hashed bucket, and the result is L2-normalized.
//! Texts sharing vocabulary land near each other in cosine space, which
//! keeps similarity search meaningful when every real provider is down and
//! makes the whole pipeline testable without network access.

use async_trait::async_trait;

use super::{EmbeddingError, EmbeddingProvider, ProviderId};
use crate::hashing::hash_to_u64;

pub const DEFAULT_DIM: usize = 384;

pub struct HashedEmbedder {
    dim: usize,
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self { dim: DEFAULT_DIM }
    }
}

impl HashedEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(8) }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];

        for token in text.to_lowercase().split(|c: char| !c.is_alphanumeric()) {
            if token.is_empty() {
                continue;
            }
            let h = hash_to_u64(token.as_bytes());
            let bucket = (h % self.dim as u64) as usize;
            // One hash bit decides the sign so colliding tokens can cancel
            // instead of systematically inflating a bucket.
            let sign = if h & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbedder {
    fn id(&self) -> ProviderId {
        ProviderId::Hashed
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
    }

    #[tokio::test]
    async fn deterministic_and_unit_norm() {
        let embedder = HashedEmbedder::default();
        let texts = vec!["Drinking lemon water cures cancer".to_string()];

        let a = embedder.embed(&texts).await.unwrap();
        let b = embedder.embed(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), DEFAULT_DIM);

        let norm: f32 = a[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn overlapping_vocabulary_scores_higher() {
        let embedder = HashedEmbedder::default();
        let texts = vec![
            "lemon water cures cancer".to_string(),
            "hot lemon water cures cancer overnight".to_string(),
            "parliament passed the annual budget bill".to_string(),
        ];

        let vs = embedder.embed(&texts).await.unwrap();
        let near = cosine(&vs[0], &vs[1]);
        let far = cosine(&vs[0], &vs[2]);
        assert!(near > far, "near={near} far={far}");
        assert!(near > 0.6);
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let embedder = HashedEmbedder::default();
        let texts = vec!["alpha".to_string(), "beta".to_string()];
        let batch = embedder.embed(&texts).await.unwrap();
        let alpha = embedder.embed(&texts[..1].to_vec()).await.unwrap();
        assert_eq!(batch[0], alpha[0]);
        assert_ne!(batch[0], batch[1]);
    }

    #[tokio::test]
    async fn empty_batch_is_an_error() {
        let embedder = HashedEmbedder::default();
        assert!(matches!(
            embedder.embed(&[]).await,
            Err(EmbeddingError::EmptyInput)
        ));
    }
}
