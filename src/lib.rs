//! Claimcheck library crate (used by the server and integration tests).
//!
//! Verifies free-text claims against a continuously refreshed evidence
//! corpus. The pieces, bottom up:
//!
//! - [`connectors`] - normalize upstream providers into [`connectors::RawItem`]s
//! - [`embedding`] - text → vector with a provider fallback chain
//! - [`index`] - named vector collections over Qdrant (mockable)
//! - [`store`] - durable rows: canon, raw items, logs, feedback
//! - [`ingest`] - the chunk/dedupe/embed/persist pipeline and its run gate
//! - [`gateway`] - preference-ordered LLM backend chain with health sampling
//! - [`engine`] - the two-phase verification algorithm
//! - [`logqueue`] - bounded fire-and-forget claim-log writes
//! - [`config`] - environment-backed settings
//!
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod connectors;
pub mod credibility;
pub mod embedding;
pub mod engine;
pub mod gateway;
pub mod hashing;
pub mod index;
pub mod ingest;
pub mod logqueue;
pub mod store;
pub mod verdict;

pub use config::{Config, ConfigError};
pub use connectors::{
    ConnectorError, FactCheckClient, FactCheckRecord, FetchOptions, HubClient, RawItem,
    SourceConnector, SourceKind,
};
pub use credibility::{classify, Credibility, CredibilityLevel};
pub use embedding::{
    EmbeddedBatch, EmbeddingError, EmbeddingProvider, FallbackChain, GeminiEmbedder,
    HashedEmbedder, OllamaEmbedder, OpenRouterEmbedder, ProviderId,
};
pub use engine::{
    EngineError, EngineParams, Mode, SourceRef, VerificationEngine, VerifyResult,
};
pub use gateway::{
    BackendError, BackendHealth, ChatBackend, GatewayError, GeminiBackend, GenerateOutput,
    HealthMonitor, ModelGateway, OllamaBackend, OpenRouterBackend, RetryPolicy,
};
pub use index::{
    Hit, IndexError, KbRecord, QdrantIndex, RecordMeta, VectorIndex, COLLECTION_GOV,
    COLLECTION_NEWS, COLLECTION_SOCIAL, COLLECTION_VERIFIED_CLAIMS,
};
#[cfg(any(test, feature = "mock"))]
pub use index::InMemoryIndex;
pub use ingest::{IngestOrchestrator, IngestParams, IngestReport, IngestStatus};
pub use logqueue::ClaimLogQueue;
pub use store::{
    ClaimLogRow, DocStore, FeedbackRow, IngestCounts, IngestRunRow, ItemRow, RunStatus,
    StoreError, VerifiedClaimRow,
};
pub use verdict::Verdict;

#[cfg(any(test, feature = "mock"))]
pub use connectors::mock::MockConnector;
