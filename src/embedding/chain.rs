//! The provider fallback chain.

use std::sync::Arc;
use tracing::{debug, warn};

use super::{EmbeddingError, EmbeddingProvider, ProviderId};

/// A batch of vectors together with the provider that produced all of them.
#[derive(Debug, Clone)]
pub struct EmbeddedBatch {
    pub provider: ProviderId,
    pub vectors: Vec<Vec<f32>>,
}

impl EmbeddedBatch {
    pub fn dimension(&self) -> usize {
        self.vectors.first().map(|v| v.len()).unwrap_or(0)
    }
}

/// Preference-ordered providers, attempted in order and short-circuiting on
/// the first success. A whole batch always comes from a single provider.
pub struct FallbackChain {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { providers }
    }

    /// The provider the chain would try first.
    pub fn preferred(&self) -> Option<ProviderId> {
        self.providers.first().map(|p| p.id())
    }

    pub fn provider_ids(&self) -> Vec<ProviderId> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Embeds one batch through the first provider that succeeds. A switch
    /// away from the preferred provider is logged as `degraded_embedding`.
    pub async fn embed(&self, texts: &[String]) -> Result<EmbeddedBatch, EmbeddingError> {
        if texts.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut failures: Vec<String> = Vec::new();

        for (position, provider) in self.providers.iter().enumerate() {
            match provider.embed(texts).await {
                Ok(vectors) => {
                    if position > 0 {
                        warn!(
                            event = "degraded_embedding",
                            provider = %provider.id(),
                            skipped = failures.len(),
                            "embedding fell back past preferred provider"
                        );
                    }
                    debug!(
                        provider = %provider.id(),
                        batch = texts.len(),
                        dim = vectors.first().map(|v| v.len()).unwrap_or(0),
                        "batch embedded"
                    );
                    return Ok(EmbeddedBatch {
                        provider: provider.id(),
                        vectors,
                    });
                }
                Err(e) => {
                    warn!(provider = %provider.id(), error = %e, "embedding provider failed");
                    failures.push(format!("{}: {}", provider.id(), e));
                }
            }
        }

        Err(EmbeddingError::AllProvidersFailed {
            summary: failures.join("; "),
        })
    }

    /// Embeds with one specific provider. Used when a collection is pinned
    /// to the provider that produced its vectors: mixing providers across
    /// records would make similarity undefined, so there is no fallback
    /// here — the caller decides what a pinned-provider outage means.
    pub async fn embed_with(
        &self,
        provider: ProviderId,
        texts: &[String],
    ) -> Result<EmbeddedBatch, EmbeddingError> {
        let Some(chosen) = self.providers.iter().find(|p| p.id() == provider) else {
            return Err(EmbeddingError::NotConfigured { provider });
        };

        let vectors = chosen.embed(texts).await?;
        Ok(EmbeddedBatch { provider, vectors })
    }

    /// Convenience for single-text queries.
    pub async fn embed_query(
        &self,
        provider: ProviderId,
        text: &str,
    ) -> Result<Vec<f32>, EmbeddingError> {
        let batch = self.embed_with(provider, &[text.to_string()]).await?;
        batch
            .vectors
            .into_iter()
            .next()
            .ok_or(EmbeddingError::CountMismatch {
                provider,
                expected: 1,
                got: 0,
            })
    }
}
