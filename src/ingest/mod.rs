//! Ingestion pipeline: connectors → chunk/dedup → embed → index + store.
//!
//! One run is a single pass over every configured connector. The document
//! store's partial unique index enforces the run singleton; a cooldown
//! keeps unforced runs from hammering the upstream providers. Connector
//! failures degrade the run to `partial`; only a run where every connector
//! failed is `failed`.

pub mod chunk;
pub mod dedup;

#[cfg(test)]
mod tests;

pub use chunk::{chunk_text, Chunk};
pub use dedup::{content_key, url_key, RunDeduper};

use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::connectors::{
    FactCheckClient, FactCheckRecord, FetchOptions, RawItem, SourceConnector, SourceKind,
};
use crate::credibility::classify;
use crate::embedding::{EmbeddedBatch, FallbackChain};
use crate::hashing::{record_id, record_id_from_body};
use crate::index::{
    KbRecord, RecordMeta, VectorIndex, COLLECTION_GOV, COLLECTION_NEWS, COLLECTION_SOCIAL,
    COLLECTION_VERIFIED_CLAIMS,
};
use crate::store::{DocStore, IngestCounts, ItemRow, RunStatus, StoreError, VerifiedClaimRow};

/// Knobs for one deployment's ingestion behavior.
#[derive(Debug, Clone)]
pub struct IngestParams {
    pub cooldown: Duration,
    pub connector_deadline: Duration,
    pub embed_batch: usize,
    pub chunk_width: usize,
    pub chunk_overlap: usize,
    pub news_limit: usize,
    pub gov_limit: usize,
    pub social_limit: usize,
    pub factcheck_limit: usize,
}

impl Default for IngestParams {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(600),
            connector_deadline: Duration::from_secs(60),
            embed_batch: 32,
            chunk_width: 800,
            chunk_overlap: 120,
            news_limit: 50,
            gov_limit: 30,
            social_limit: 10,
            factcheck_limit: 20,
        }
    }
}

/// Outcome of an ingest request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    Ok,
    Partial,
    Failed,
    AlreadyRunning,
    Cooldown,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Ok => "ok",
            IngestStatus::Partial => "partial",
            IngestStatus::Failed => "failed",
            IngestStatus::AlreadyRunning => "already_running",
            IngestStatus::Cooldown => "cooldown",
        }
    }
}

/// What the caller gets back from [`IngestOrchestrator::ingest`].
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub counts: IngestCounts,
    pub errors: Vec<String>,
    pub last_synced: Option<String>,
}

pub struct IngestOrchestrator {
    connectors: Vec<Arc<dyn SourceConnector>>,
    factcheck: Option<Arc<FactCheckClient>>,
    chain: Arc<FallbackChain>,
    index: Arc<dyn VectorIndex>,
    store: DocStore,
    params: IngestParams,
}

enum FetchOutcome {
    Items(SourceKind, Vec<RawItem>),
    FactChecks(Vec<FactCheckRecord>),
    Failed(String, String),
}

impl IngestOrchestrator {
    pub fn new(
        connectors: Vec<Arc<dyn SourceConnector>>,
        factcheck: Option<Arc<FactCheckClient>>,
        chain: Arc<FallbackChain>,
        index: Arc<dyn VectorIndex>,
        store: DocStore,
        params: IngestParams,
    ) -> Self {
        Self {
            connectors,
            factcheck,
            chain,
            index,
            store,
            params,
        }
    }

    /// Runs one ingestion pass. Returns without touching the providers when
    /// the gate is held or the cooldown has not elapsed.
    #[instrument(skip(self), fields(force, triggered_by))]
    pub async fn ingest(&self, force: bool, triggered_by: &str) -> Result<IngestReport, StoreError> {
        if self.store.active_ingest_run().await?.is_some() {
            debug!("ingest rejected: run already active");
            return Ok(self.rejection(IngestStatus::AlreadyRunning).await);
        }

        if !force {
            if let Some(last) = self.store.last_successful_ingest_finished_at().await? {
                let elapsed = Utc::now().signed_duration_since(last);
                if elapsed.to_std().unwrap_or(Duration::ZERO) < self.params.cooldown {
                    debug!(?elapsed, "ingest rejected: cooldown");
                    return Ok(self.rejection(IngestStatus::Cooldown).await);
                }
            }
        }

        let run = match self.store.begin_ingest_run(triggered_by, force).await {
            Ok(run) => run,
            Err(StoreError::RunAlreadyActive) => {
                return Ok(self.rejection(IngestStatus::AlreadyRunning).await);
            }
            Err(e) => return Err(e),
        };

        info!(run_id = %run.run_id, force, "ingestion run started");

        let outcomes = self.fetch_all().await;

        let mut counts = IngestCounts::default();
        let mut errors: Vec<String> = Vec::new();
        let mut connectors_failed = 0usize;
        let connectors_total = outcomes.len();
        let mut deduper = RunDeduper::new();

        for outcome in outcomes {
            match outcome {
                FetchOutcome::Items(kind, items) => {
                    let count = self
                        .process_items(kind, items, force, &mut deduper, &mut errors)
                        .await;
                    match kind {
                        SourceKind::News => counts.news += count,
                        SourceKind::Gov => counts.gov += count,
                        SourceKind::Social => counts.social += count,
                        SourceKind::FactCheck => {}
                    }
                }
                FetchOutcome::FactChecks(records) => {
                    counts.factchecks += self.process_factchecks(records, &mut errors).await;
                }
                FetchOutcome::Failed(tag, message) => {
                    warn!(connector = %tag, error = %message, "connector failed");
                    errors.push(format!("{tag}: {message}"));
                    connectors_failed += 1;
                }
            }
        }

        let status = if connectors_failed == 0 {
            RunStatus::Ok
        } else if connectors_failed < connectors_total {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };

        self.store
            .finish_ingest_run(&run.run_id, status, counts, &errors)
            .await?;

        info!(
            run_id = %run.run_id,
            status = %status,
            news = counts.news,
            gov = counts.gov,
            factchecks = counts.factchecks,
            social = counts.social,
            errors = errors.len(),
            "ingestion run finished"
        );

        let report_status = match status {
            RunStatus::Ok => IngestStatus::Ok,
            RunStatus::Partial => IngestStatus::Partial,
            _ => IngestStatus::Failed,
        };

        Ok(IngestReport {
            status: report_status,
            counts,
            errors,
            last_synced: Some(Utc::now().to_rfc3339()),
        })
    }

    async fn rejection(&self, status: IngestStatus) -> IngestReport {
        let last_synced = self
            .store
            .last_successful_ingest_finished_at()
            .await
            .ok()
            .flatten()
            .map(|dt| dt.to_rfc3339());

        IngestReport {
            status,
            counts: IngestCounts::default(),
            errors: Vec::new(),
            last_synced,
        }
    }

    /// Invokes every connector concurrently under the per-connector
    /// deadline. Failures become [`FetchOutcome::Failed`] values.
    async fn fetch_all(&self) -> Vec<FetchOutcome> {
        let deadline = self.params.connector_deadline;

        let connector_futures = self.connectors.iter().map(|connector| {
            let limit = match connector.kind() {
                SourceKind::News => self.params.news_limit,
                SourceKind::Gov => self.params.gov_limit,
                SourceKind::Social => self.params.social_limit,
                SourceKind::FactCheck => self.params.factcheck_limit,
            };
            let options = FetchOptions::with_limit(limit);
            async move {
                let kind = connector.kind();
                let tag = kind.as_str().to_string();
                match timeout(deadline, connector.fetch(&options)).await {
                    Ok(Ok(items)) => FetchOutcome::Items(kind, items),
                    Ok(Err(e)) => FetchOutcome::Failed(tag, e.to_string()),
                    Err(_) => FetchOutcome::Failed(tag, "connector deadline exceeded".to_string()),
                }
            }
        });

        let factcheck_future = async {
            match &self.factcheck {
                Some(client) => {
                    match timeout(deadline, client.recent("en", self.params.factcheck_limit)).await
                    {
                        Ok(Ok(records)) => Some(FetchOutcome::FactChecks(records)),
                        Ok(Err(e)) => Some(FetchOutcome::Failed(
                            "factcheck".to_string(),
                            e.to_string(),
                        )),
                        Err(_) => Some(FetchOutcome::Failed(
                            "factcheck".to_string(),
                            "connector deadline exceeded".to_string(),
                        )),
                    }
                }
                None => None,
            }
        };

        let (mut outcomes, factcheck) = tokio::join!(join_all(connector_futures), factcheck_future);
        outcomes.extend(factcheck);
        outcomes
    }

    /// Chunks, dedupes, embeds and persists one connector's items.
    /// Returns the number of items that made it into the index.
    async fn process_items(
        &self,
        kind: SourceKind,
        items: Vec<RawItem>,
        force: bool,
        deduper: &mut RunDeduper,
        errors: &mut Vec<String>,
    ) -> i64 {
        let collection = collection_for_kind(kind);
        let mut ingested = 0i64;
        let mut skipped = 0usize;

        for item in items {
            if let Err(e) = item.validate() {
                errors.push(e.to_string());
                continue;
            }

            let item_url_key = item.url.as_deref().and_then(url_key);
            let item_content_key = content_key(&item.body);

            // Historical URL dedup (skipped under force so a deployment can
            // rebuild the index); in-run dedup always applies.
            if !force {
                if let Some(uk) = &item_url_key {
                    match self.store.item_url_exists(kind, uk).await {
                        Ok(true) => {
                            skipped += 1;
                            continue;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            errors.push(format!("{kind}: url lookup: {e}"));
                            continue;
                        }
                    }
                }
            }

            if !deduper.admit(item_url_key.as_deref(), &item_content_key) {
                skipped += 1;
                continue;
            }

            match self
                .persist_item(kind, collection, &item, item_url_key.as_deref(), &item_content_key)
                .await
            {
                Ok(()) => ingested += 1,
                Err(e) => errors.push(format!(
                    "{kind}: item {}: {e}",
                    item.url.as_deref().unwrap_or("<no url>")
                )),
            }
        }

        debug!(kind = %kind, ingested, skipped, "connector items processed");
        ingested
    }

    /// Index first, then the raw row: a raw row without vectors is benign
    /// (seen but not indexed), vectors without a raw row are not.
    async fn persist_item(
        &self,
        kind: SourceKind,
        collection: &str,
        item: &RawItem,
        item_url_key: Option<&str>,
        item_content_key: &str,
    ) -> Result<(), String> {
        let chunks = chunk_text(
            item.body.trim(),
            self.params.chunk_width,
            self.params.chunk_overlap,
        );
        if chunks.is_empty() {
            return Err("empty body after trim".to_string());
        }

        // URL-identified items hash (provider, url, ordinal); URL-less
        // items fall back to hashing the body itself.
        let chunk_record_id = |ordinal: u32| match item_url_key {
            Some(url_key) => record_id(&item.provider_tag, url_key, ordinal),
            None => record_id_from_body(&item.provider_tag, &item.body, ordinal),
        };
        let credibility = classify(&item.source_name, kind);

        let mut records: Vec<KbRecord> = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.params.embed_batch) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .embed_for_collection(collection, &texts)
                .await
                .map_err(|e| format!("embed: {e}"))?;

            for (chunk, vector) in batch.iter().zip(embedded.vectors) {
                records.push(KbRecord {
                    record_id: chunk_record_id(chunk.ordinal),
                    vector,
                    text: chunk.text.clone(),
                    meta: RecordMeta {
                        kind,
                        source_name: item.source_name.clone(),
                        url: item.url.clone(),
                        title: item.title.clone(),
                        published_at: item.published_at,
                        credibility_score: credibility.score,
                        credibility_level: credibility.level,
                        is_verified_source: credibility.is_verified_source,
                        verdict: None,
                        explanation: None,
                        provider_tag: item.provider_tag.clone(),
                    },
                });
            }
        }

        let dim = records.first().map(|r| r.vector.len()).unwrap_or(0);
        self.index
            .ensure_collection(collection, dim)
            .await
            .map_err(|e| format!("index: {e}"))?;
        self.index
            .upsert(collection, records)
            .await
            .map_err(|e| format!("index: {e}"))?;

        let row = ItemRow {
            item_id: chunk_record_id(0),
            url_key: item_url_key.map(String::from),
            url: item.url.clone(),
            title: item.title.clone(),
            source: item.source_name.clone(),
            body: item.body.clone(),
            content_key: item_content_key.to_string(),
            published_at: item.published_at.map(|dt| dt.to_rfc3339()),
            language: item.language.clone(),
            chunk_count: chunks.len() as i64,
            provider_tag: item.provider_tag.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.store
            .insert_item(kind, &row)
            .await
            .map_err(|e| format!("store: {e}"))?;

        Ok(())
    }

    /// Fact-check records become canon rows: vector record first, then the
    /// document row, mirroring the item ordering guarantee.
    async fn process_factchecks(
        &self,
        records: Vec<FactCheckRecord>,
        errors: &mut Vec<String>,
    ) -> i64 {
        let mut ingested = 0i64;

        for record in records {
            let normalized = record.claim_text.to_lowercase();
            let claim_id = if record.url.is_empty() {
                record_id_from_body(&record.provider_tag, &normalized, 0)
            } else {
                record_id(&record.provider_tag, &record.url, 0)
            };

            let embedded = match self.embed_for_collection(COLLECTION_VERIFIED_CLAIMS, &[normalized.clone()]).await {
                Ok(batch) => batch,
                Err(e) => {
                    errors.push(format!("factcheck: embed: {e}"));
                    continue;
                }
            };
            let Some(vector) = embedded.vectors.into_iter().next() else {
                errors.push("factcheck: embed returned no vector".to_string());
                continue;
            };

            let credibility = classify(&record.publisher, SourceKind::FactCheck);
            let kb = KbRecord {
                record_id: claim_id.clone(),
                vector,
                text: record.claim_text.clone(),
                meta: RecordMeta {
                    kind: SourceKind::FactCheck,
                    source_name: record.publisher.clone(),
                    url: (!record.url.is_empty()).then(|| record.url.clone()),
                    title: None,
                    published_at: record.published_at,
                    credibility_score: credibility.score,
                    credibility_level: credibility.level,
                    is_verified_source: credibility.is_verified_source,
                    verdict: Some(record.verdict),
                    explanation: Some(record.explanation.clone()),
                    provider_tag: record.provider_tag.clone(),
                },
            };

            let dim = kb.vector.len();
            if let Err(e) = self.index.ensure_collection(COLLECTION_VERIFIED_CLAIMS, dim).await {
                errors.push(format!("factcheck: index: {e}"));
                continue;
            }
            if let Err(e) = self.index.upsert(COLLECTION_VERIFIED_CLAIMS, vec![kb]).await {
                errors.push(format!("factcheck: index: {e}"));
                continue;
            }

            let row = VerifiedClaimRow {
                claim_id,
                claim_text: record.claim_text.clone(),
                normalized_claim_text: normalized,
                verdict: record.verdict.as_str().to_string(),
                explanation: record.explanation.clone(),
                source_url: record.url.clone(),
                publisher: record.publisher.clone(),
                language: record.language.clone(),
                published_at: record.published_at.map(|dt| dt.to_rfc3339()),
                tags_json: serde_json::to_string(&record.tags).unwrap_or_else(|_| "[]".to_string()),
                provider_tag: record.provider_tag.clone(),
                created_at: Utc::now().to_rfc3339(),
            };
            if let Err(e) = self.store.upsert_verified_claim(&row).await {
                errors.push(format!("factcheck: store: {e}"));
                continue;
            }

            ingested += 1;
        }

        ingested
    }

    /// Embeds a batch for one collection, honoring the pinned provider.
    /// The first batch ever written to a collection pins it; a lost pin
    /// race re-embeds with the winner.
    async fn embed_for_collection(
        &self,
        collection: &str,
        texts: &[String],
    ) -> Result<EmbeddedBatch, String> {
        let manifest = self
            .store
            .collection_manifest(collection)
            .await
            .map_err(|e| e.to_string())?;

        if let Some(manifest) = manifest {
            let provider = manifest.provider_id().map_err(|e| e.to_string())?;
            let batch = self
                .chain
                .embed_with(provider, texts)
                .await
                .map_err(|e| e.to_string())?;
            if batch.dimension() != manifest.dim as usize {
                return Err(format!(
                    "provider '{provider}' now returns dim {} but '{collection}' is pinned at {}",
                    batch.dimension(),
                    manifest.dim
                ));
            }
            return Ok(batch);
        }

        let batch = self.chain.embed(texts).await.map_err(|e| e.to_string())?;
        let pinned = self
            .store
            .pin_collection_manifest(collection, batch.provider, batch.dimension())
            .await
            .map_err(|e| e.to_string())?;

        let pinned_provider = pinned.provider_id().map_err(|e| e.to_string())?;
        if pinned_provider != batch.provider {
            // Another writer pinned first; converge on its provider.
            return self
                .chain
                .embed_with(pinned_provider, texts)
                .await
                .map_err(|e| e.to_string());
        }

        Ok(batch)
    }
}

fn collection_for_kind(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::News => COLLECTION_NEWS,
        SourceKind::Gov => COLLECTION_GOV,
        SourceKind::Social => COLLECTION_SOCIAL,
        SourceKind::FactCheck => COLLECTION_VERIFIED_CLAIMS,
    }
}
