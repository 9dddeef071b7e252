//! The two-phase verification engine.
//!
//! Phase 1 answers from the canon: a prior adjudication whose claim text
//! sits above the canon similarity threshold. Phase 2 retrieves evidence
//! across the knowledge collections (plus best-effort live pulls), builds a
//! grounded prompt, and has the model gateway reason over it.

mod parse;
mod prompt;
mod types;

#[cfg(test)]
mod tests;

pub use parse::{parse_reply, ParseError, ParsedReply};
pub use prompt::{build_prompt, repair_prompt, system_directive, SNIPPET_LEN};
pub use types::{
    placeholder_url, rank_evidence, EngineError, EvidenceItem, Mode, SourceRef, VerifyResult,
};

use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::connectors::{FactCheckClient, FactCheckRecord, FetchOptions, SourceConnector, SourceKind};
use crate::embedding::{FallbackChain, ProviderId};
use crate::gateway::{GatewayError, ModelGateway};
use crate::index::{
    Hit, VectorIndex, COLLECTION_GOV, COLLECTION_NEWS, COLLECTION_SOCIAL,
    COLLECTION_VERIFIED_CLAIMS,
};
use crate::store::DocStore;
use crate::verdict::Verdict;

/// Retrieval and ranking knobs. Defaults follow the deployment profile;
/// every field is overridable through configuration.
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub canon_similarity: f32,
    pub min_similarity: f32,
    pub context_limit: usize,
    pub top_k_news: usize,
    pub top_k_gov: usize,
    pub top_k_social: usize,
    pub live_news_limit: usize,
    pub live_factcheck_limit: usize,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            canon_similarity: 0.85,
            min_similarity: 0.65,
            context_limit: 25,
            top_k_news: 50,
            top_k_gov: 20,
            top_k_social: 15,
            live_news_limit: 10,
            live_factcheck_limit: 5,
        }
    }
}

/// Words in evidence that signal disagreement with a claim. Fallback for
/// models that omit `contradiction_score`.
const CONTRADICTION_KEYWORDS: &[&str] = &[
    "false",
    "fake",
    "misleading",
    "incorrect",
    "wrong",
    "debunked",
    "hoax",
    "fabricated",
    "unverified",
    "no evidence",
];

pub struct VerificationEngine {
    chain: Arc<FallbackChain>,
    index: Arc<dyn VectorIndex>,
    store: DocStore,
    gateway: Arc<ModelGateway>,
    live_news: Option<Arc<dyn SourceConnector>>,
    factcheck: Option<Arc<FactCheckClient>>,
    params: EngineParams,
}

impl VerificationEngine {
    pub fn new(
        chain: Arc<FallbackChain>,
        index: Arc<dyn VectorIndex>,
        store: DocStore,
        gateway: Arc<ModelGateway>,
        params: EngineParams,
    ) -> Self {
        Self {
            chain,
            index,
            store,
            gateway,
            live_news: None,
            factcheck: None,
            params,
        }
    }

    /// Attaches the best-effort live news connector.
    pub fn with_live_news(mut self, connector: Arc<dyn SourceConnector>) -> Self {
        self.live_news = Some(connector);
        self
    }

    /// Attaches the live fact-check client.
    pub fn with_factcheck(mut self, client: Arc<FactCheckClient>) -> Self {
        self.factcheck = Some(client);
        self
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Verifies one claim. Infallible except for total model-chain
    /// exhaustion, which the API layer turns into a 503.
    #[instrument(skip(self, claim_text), fields(claim_len = claim_text.len(), language))]
    pub async fn verify(
        &self,
        claim_text: &str,
        language: &str,
        category: Option<&str>,
    ) -> Result<VerifyResult, EngineError> {
        let mut errors: Vec<String> = Vec::new();

        // Phase 1: canon lookup. Any failure here degrades to Phase 2.
        let mut query_cache: HashMap<ProviderId, Vec<f32>> = HashMap::new();
        match self.canon_lookup(claim_text, &mut query_cache).await {
            Ok(Some(result)) => {
                info!(verdict = %result.verdict, confidence = result.confidence, "canon hit");
                return Ok(result);
            }
            Ok(None) => {}
            Err(reason) => {
                warn!(error = %reason, "canon lookup failed, continuing to reasoning");
                errors.push(reason);
            }
        }

        // Live fact-check pull: an exact prior adjudication short-circuits;
        // anything else becomes Phase 2 evidence.
        let mut live_factchecks: Vec<FactCheckRecord> = Vec::new();
        if let Some(client) = &self.factcheck {
            match client
                .search(claim_text, language, self.params.live_factcheck_limit)
                .await
            {
                Ok(records) => {
                    if let Some(matched) = records
                        .iter()
                        .find(|r| normalized_claim(&r.claim_text) == normalized_claim(claim_text))
                    {
                        info!(publisher = %matched.publisher, "live fact-check match");
                        return Ok(self.live_factcheck_result(matched, errors));
                    }
                    live_factchecks = records;
                }
                Err(e) => {
                    debug!(error = %e, "live fact-check fetch failed");
                    errors.push(format!("live_factcheck: {e}"));
                }
            }
        }

        // Phase 2: grounded reasoning.
        let evidence = self
            .gather_evidence(claim_text, live_factchecks, &mut query_cache, &mut errors)
            .await;

        if evidence.is_empty() {
            debug!("no evidence from any source");
            return Ok(VerifyResult {
                mode: Mode::Reasoned,
                verdict: Verdict::Unverified,
                confidence: 0.0,
                contradiction_score: 0.0,
                explanation:
                    "No relevant sources were found for this claim in the knowledge base or live feeds."
                        .to_string(),
                raw_answer: String::new(),
                sources_used: Vec::new(),
                model_used: None,
                timestamp: Utc::now(),
                errors,
            });
        }

        let system = system_directive(language);
        let user_prompt = build_prompt(claim_text, &evidence);
        debug!(evidence = evidence.len(), category, "invoking model gateway");

        let output = self
            .gateway
            .generate(&user_prompt, &system)
            .await
            .map_err(map_gateway_error)?;

        let parsed = match parse_reply(&output.text) {
            Ok(parsed) => parsed,
            Err(first_err) => {
                debug!(error = %first_err, "reply unparseable, attempting repair");
                errors.push(format!("parse: {first_err}"));

                let repair = repair_prompt(claim_text, &output.text);
                let second = self
                    .gateway
                    .generate(&repair, &system)
                    .await
                    .map_err(map_gateway_error)?;

                match parse_reply(&second.text) {
                    Ok(parsed) => parsed,
                    Err(second_err) => {
                        warn!(error = %second_err, "repair reply unparseable, refusing");
                        errors.push(format!("parse_repair: {second_err}"));
                        return Ok(VerifyResult {
                            mode: Mode::Refused,
                            verdict: Verdict::Unverified,
                            confidence: 0.0,
                            contradiction_score: 0.0,
                            explanation:
                                "The model did not produce a readable verdict for this claim."
                                    .to_string(),
                            raw_answer: second.text,
                            sources_used: Vec::new(),
                            model_used: Some(second.model_used),
                            timestamp: Utc::now(),
                            errors,
                        });
                    }
                }
            }
        };

        Ok(self.finish_reasoned(parsed, evidence, output.text, output.model_used, errors))
    }

    async fn canon_lookup(
        &self,
        claim_text: &str,
        query_cache: &mut HashMap<ProviderId, Vec<f32>>,
    ) -> Result<Option<VerifyResult>, String> {
        let manifest = self
            .store
            .collection_manifest(COLLECTION_VERIFIED_CLAIMS)
            .await
            .map_err(|e| format!("canon manifest: {e}"))?;

        let Some(manifest) = manifest else {
            // Nothing ever ingested into the canon.
            return Ok(None);
        };
        let provider = manifest
            .provider_id()
            .map_err(|e| format!("canon manifest: {e}"))?;

        let vector = self
            .query_vector(provider, claim_text, query_cache)
            .await
            .map_err(|e| format!("canon embed: {e}"))?;

        let hits = self
            .index
            .search(
                COLLECTION_VERIFIED_CLAIMS,
                &vector,
                1,
                Some(self.params.canon_similarity),
            )
            .await
            .map_err(|e| format!("canon search: {e}"))?;

        Ok(hits.into_iter().next().map(|hit| self.canon_result(hit)))
    }

    fn canon_result(&self, hit: Hit) -> VerifyResult {
        let verdict = hit.meta.verdict.unwrap_or(Verdict::Unverified);
        let explanation = hit.meta.explanation.clone().unwrap_or_default();
        let url = hit
            .meta
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| placeholder_url(&hit.meta.source_name));

        let source = SourceRef {
            kind: SourceKind::FactCheck,
            source: hit.meta.source_name.clone(),
            url,
            snippet: prompt::truncate_chars(&explanation, 200).to_string(),
            credibility_score: hit.meta.credibility_score,
            credibility_level: hit.meta.credibility_level,
            is_verified_source: hit.meta.is_verified_source,
        };

        VerifyResult {
            mode: Mode::ExistingFactCheck,
            verdict,
            confidence: hit.similarity.clamp(0.0, 1.0),
            contradiction_score: 0.0,
            explanation,
            raw_answer: format!("Matched existing fact-check from {}", hit.meta.source_name),
            sources_used: vec![source],
            model_used: None,
            timestamp: Utc::now(),
            errors: Vec::new(),
        }
    }

    fn live_factcheck_result(&self, record: &FactCheckRecord, errors: Vec<String>) -> VerifyResult {
        let credibility = crate::credibility::classify(&record.publisher, SourceKind::FactCheck);
        let url = if record.url.is_empty() {
            placeholder_url(&record.publisher)
        } else {
            record.url.clone()
        };

        VerifyResult {
            mode: Mode::ExistingFactCheck,
            verdict: record.verdict,
            confidence: 0.95,
            contradiction_score: 0.0,
            explanation: format!("Fact check by {}: {}", record.publisher, record.explanation),
            raw_answer: format!("Live match from {}", record.publisher),
            sources_used: vec![SourceRef {
                kind: SourceKind::FactCheck,
                source: record.publisher.clone(),
                url,
                snippet: prompt::truncate_chars(&record.explanation, SNIPPET_LEN).to_string(),
                credibility_score: credibility.score,
                credibility_level: credibility.level,
                is_verified_source: credibility.is_verified_source,
            }],
            model_used: None,
            timestamp: Utc::now(),
            errors,
        }
    }

    async fn gather_evidence(
        &self,
        claim_text: &str,
        live_factchecks: Vec<FactCheckRecord>,
        query_cache: &mut HashMap<ProviderId, Vec<f32>>,
        errors: &mut Vec<String>,
    ) -> Vec<EvidenceItem> {
        let floor = self.params.min_similarity;
        let plans = [
            (COLLECTION_NEWS, self.params.top_k_news),
            (COLLECTION_GOV, self.params.top_k_gov),
            (COLLECTION_SOCIAL, self.params.top_k_social),
        ];

        // Resolve each collection's pinned provider and embed the claim
        // once per distinct provider.
        let mut queries: Vec<(&str, usize, Vec<f32>)> = Vec::new();
        for (collection, k) in plans {
            match self.store.collection_manifest(collection).await {
                Ok(Some(manifest)) => match manifest.provider_id() {
                    Ok(provider) => {
                        match self.query_vector(provider, claim_text, query_cache).await {
                            Ok(vector) => queries.push((collection, k, vector)),
                            Err(e) => errors.push(format!("{collection}: embed: {e}")),
                        }
                    }
                    Err(e) => errors.push(format!("{collection}: {e}")),
                },
                Ok(None) => {} // collection never populated
                Err(e) => errors.push(format!("{collection}: manifest: {e}")),
            }
        }

        // Indexed searches and the live news pull run in parallel and are
        // joined before ranking.
        let searches = queries.iter().map(|(collection, k, vector)| {
            let index = Arc::clone(&self.index);
            async move {
                let result = index.search(collection, vector, *k, Some(floor)).await;
                (*collection, result)
            }
        });

        let live_news_future = async {
            match &self.live_news {
                Some(connector) => Some(
                    connector
                        .fetch(&FetchOptions::query(claim_text, self.params.live_news_limit))
                        .await,
                ),
                None => None,
            }
        };

        let (search_results, live_news) = tokio::join!(join_all(searches), live_news_future);

        let mut evidence: Vec<EvidenceItem> = Vec::new();

        for (collection, result) in search_results {
            match result {
                Ok(hits) => {
                    debug!(collection, hits = hits.len(), "collection searched");
                    evidence.extend(hits.into_iter().map(evidence_from_hit));
                }
                Err(e) => {
                    warn!(collection, error = %e, "collection search failed");
                    errors.push(format!("{collection}: search: {e}"));
                }
            }
        }

        match live_news {
            Some(Ok(items)) => {
                debug!(items = items.len(), "live news fetched");
                evidence.extend(items.into_iter().map(|item| {
                    let text = match &item.title {
                        Some(title) => format!("{}. {}", title, item.body),
                        None => item.body.clone(),
                    };
                    EvidenceItem::from_live(
                        SourceKind::News,
                        &item.source_name,
                        item.url.clone(),
                        item.published_at,
                        text,
                        floor,
                    )
                }));
            }
            Some(Err(e)) => {
                debug!(error = %e, "live news fetch failed");
                errors.push(format!("live_news: {e}"));
            }
            None => {}
        }

        evidence.extend(live_factchecks.into_iter().map(|record| {
            let text = format!(
                "{} — rated {} by {}: {}",
                record.claim_text, record.verdict, record.publisher, record.explanation
            );
            EvidenceItem::from_live(
                SourceKind::FactCheck,
                &record.publisher,
                (!record.url.is_empty()).then(|| record.url.clone()),
                record.published_at,
                text,
                floor,
            )
        }));

        rank_evidence(&mut evidence, self.params.context_limit);
        evidence
    }

    fn finish_reasoned(
        &self,
        parsed: ParsedReply,
        evidence: Vec<EvidenceItem>,
        raw_answer: String,
        model_used: String,
        errors: Vec<String>,
    ) -> VerifyResult {
        let mut verdict = Verdict::coerce(&parsed.verdict);
        let confidence = (parsed.confidence as f32).clamp(0.0, 1.0);

        let contradiction_score = parsed
            .contradiction_score
            .map(|c| (c as f32).clamp(0.0, 1.0))
            .unwrap_or_else(|| contradiction_heuristic(&evidence));

        // Cited indices are 1-based prompt numbers; keep only real,
        // non-empty-snippet evidence, in ranked order.
        let mut sources_used: Vec<SourceRef> = Vec::new();
        for (i, item) in evidence.iter().enumerate() {
            if !parsed.cited_evidence_indices.contains(&(i + 1)) {
                continue;
            }
            let snippet = prompt::truncate_chars(item.text.trim(), SNIPPET_LEN);
            if snippet.is_empty() {
                continue;
            }

            let url = match &item.url {
                Some(url) if !url.is_empty() => url.clone(),
                _ => placeholder_url(&item.source),
            };

            sources_used.push(SourceRef {
                kind: item.kind,
                source: item.source.clone(),
                url,
                snippet: snippet.to_string(),
                credibility_score: item.credibility.score,
                credibility_level: item.credibility.level,
                is_verified_source: item.credibility.is_verified_source,
            });
        }

        // A verdict nobody can check is no verdict.
        if sources_used.is_empty() && verdict != Verdict::Unverified {
            debug!("model cited no usable evidence, downgrading to unverified");
            verdict = Verdict::Unverified;
        }

        let explanation = if parsed.explanation.trim().is_empty() {
            prompt::truncate_chars(&raw_answer, 500).to_string()
        } else {
            parsed.explanation
        };

        VerifyResult {
            mode: Mode::Reasoned,
            verdict,
            confidence,
            contradiction_score,
            explanation,
            raw_answer,
            sources_used,
            model_used: Some(model_used),
            timestamp: Utc::now(),
            errors,
        }
    }

    async fn query_vector(
        &self,
        provider: ProviderId,
        claim_text: &str,
        cache: &mut HashMap<ProviderId, Vec<f32>>,
    ) -> Result<Vec<f32>, crate::embedding::EmbeddingError> {
        if let Some(vector) = cache.get(&provider) {
            return Ok(vector.clone());
        }
        let vector = self.chain.embed_query(provider, claim_text).await?;
        cache.insert(provider, vector.clone());
        Ok(vector)
    }
}

fn evidence_from_hit(hit: Hit) -> EvidenceItem {
    EvidenceItem {
        kind: hit.meta.kind,
        source: hit.meta.source_name.clone(),
        url: hit.meta.url.clone(),
        published_at: hit.meta.published_at,
        text: hit.text,
        similarity: hit.similarity,
        credibility: crate::credibility::Credibility {
            score: hit.meta.credibility_score,
            level: hit.meta.credibility_level,
            is_verified_source: hit.meta.is_verified_source,
        },
    }
}

fn map_gateway_error(e: GatewayError) -> EngineError {
    match e {
        GatewayError::AllBackendsDown { summary } => EngineError::AllBackendsDown { summary },
        GatewayError::NoBackends => EngineError::AllBackendsDown {
            summary: "no backends configured".to_string(),
        },
    }
}

/// Keyword-count fallback for the contradiction signal.
fn contradiction_heuristic(evidence: &[EvidenceItem]) -> f32 {
    let joined: String = evidence
        .iter()
        .map(|e| e.text.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");

    let count = CONTRADICTION_KEYWORDS
        .iter()
        .filter(|kw| joined.contains(*kw))
        .count();

    ((count as f32) / 5.0).min(1.0)
}

/// Whitespace-and-case-insensitive claim comparison for live matches.
fn normalized_claim(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
