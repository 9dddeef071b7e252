//! Multi-collection vector index.
//!
//! The index holds N named collections of [`KbRecord`]s with a fixed
//! dimension per collection, upserts by record id and answers top-k cosine
//! queries with a minimum-similarity floor. Qdrant is the production
//! backend; the in-memory implementation serves tests.

mod error;
mod model;
mod qdrant;

#[cfg(any(test, feature = "mock"))]
mod memory;


pub use error::IndexError;
pub use model::{sort_hits, Hit, KbRecord, RecordMeta};
pub use qdrant::QdrantIndex;

#[cfg(any(test, feature = "mock"))]
pub use memory::InMemoryIndex;

use async_trait::async_trait;

/// Vector collection names used by the engine and the ingestion pipeline.
pub const COLLECTION_VERIFIED_CLAIMS: &str = "verified_claims";
pub const COLLECTION_NEWS: &str = "news_articles";
pub const COLLECTION_GOV: &str = "gov_bulletins";
pub const COLLECTION_SOCIAL: &str = "social_posts";

/// The minimal async surface the engine and orchestrator need.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Creates the collection if missing; no-op otherwise.
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError>;

    /// Inserts or replaces records by `record_id`. Every record's vector
    /// must match the collection dimension.
    async fn upsert(&self, collection: &str, records: Vec<KbRecord>) -> Result<(), IndexError>;

    /// Top-k cosine search. Hits below `min_similarity` are excluded and
    /// the result is sorted by descending similarity with the
    /// credibility/recency/id tie-break.
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        k: usize,
        min_similarity: Option<f32>,
    ) -> Result<Vec<Hit>, IndexError>;

    /// Number of records in the collection.
    async fn count(&self, collection: &str) -> Result<u64, IndexError>;
}
