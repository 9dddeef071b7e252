use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::connectors::SourceKind;
use crate::embedding::{EmbeddingProvider, FallbackChain, HashedEmbedder, ProviderId};
use crate::gateway::{BackendError, ChatBackend, ModelGateway, RetryPolicy};
use crate::index::{InMemoryIndex, KbRecord, RecordMeta, VectorIndex, COLLECTION_NEWS, COLLECTION_VERIFIED_CLAIMS};
use crate::store::DocStore;
use crate::verdict::Verdict;

const DIM: usize = 384;

/// Backend that replays a scripted sequence of replies.
struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, u16>>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<Result<&str, u16>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(String::from))
                    .collect(),
            ),
        })
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    fn is_remote(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, BackendError> {
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(status)) => Err(BackendError::Status(status)),
            None => Err(BackendError::Status(503)),
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

struct Harness {
    engine: VerificationEngine,
    index: Arc<InMemoryIndex>,
    store: DocStore,
    embedder: HashedEmbedder,
}

async fn harness(replies: Vec<Result<&str, u16>>, params: EngineParams) -> Harness {
    let chain = Arc::new(FallbackChain::new(vec![Arc::new(HashedEmbedder::default())]));
    let index = Arc::new(InMemoryIndex::new());
    let store = DocStore::connect_in_memory().await.unwrap();

    let gateway = Arc::new(ModelGateway::new(
        vec![ScriptedBackend::new(replies)],
        false,
        Duration::from_secs(5),
        RetryPolicy {
            max_attempts: 1,
            base_backoff: Duration::from_millis(1),
            max_jitter: Duration::from_millis(1),
        },
    ));

    let engine = VerificationEngine::new(
        Arc::clone(&chain),
        index.clone() as Arc<dyn VectorIndex>,
        store.clone(),
        gateway,
        params,
    );

    Harness {
        engine,
        index,
        store,
        embedder: HashedEmbedder::default(),
    }
}

fn relaxed_params() -> EngineParams {
    EngineParams {
        // The feature-hash embedder separates topics less sharply than a
        // trained model; tests drop the floor and assert on ordering.
        min_similarity: 0.0,
        ..EngineParams::default()
    }
}

async fn embed(embedder: &HashedEmbedder, text: &str) -> Vec<f32> {
    embedder.embed(&[text.to_string()]).await.unwrap().remove(0)
}

fn news_meta(source: &str) -> RecordMeta {
    let cred = crate::credibility::classify(source, SourceKind::News);
    RecordMeta {
        kind: SourceKind::News,
        source_name: source.to_string(),
        url: Some(format!("https://{}.example/story", source.to_lowercase())),
        title: None,
        published_at: None,
        credibility_score: cred.score,
        credibility_level: cred.level,
        is_verified_source: cred.is_verified_source,
        verdict: None,
        explanation: None,
        provider_tag: "hub:news".to_string(),
    }
}

async fn seed_news(h: &Harness, docs: &[(&str, &str)]) {
    h.index.ensure_collection(COLLECTION_NEWS, DIM).await.unwrap();
    h.store
        .pin_collection_manifest(COLLECTION_NEWS, ProviderId::Hashed, DIM)
        .await
        .unwrap();

    let mut records = Vec::new();
    for (i, (source, text)) in docs.iter().enumerate() {
        records.push(KbRecord {
            record_id: format!("news-{i}"),
            vector: embed(&h.embedder, text).await,
            text: text.to_string(),
            meta: news_meta(source),
        });
    }
    h.index.upsert(COLLECTION_NEWS, records).await.unwrap();
}

async fn seed_canon(h: &Harness, claim: &str, verdict: Verdict, explanation: &str) {
    h.index
        .ensure_collection(COLLECTION_VERIFIED_CLAIMS, DIM)
        .await
        .unwrap();
    h.store
        .pin_collection_manifest(COLLECTION_VERIFIED_CLAIMS, ProviderId::Hashed, DIM)
        .await
        .unwrap();

    let cred = crate::credibility::classify("AltNews", SourceKind::FactCheck);
    let record = KbRecord {
        record_id: "canon-1".to_string(),
        vector: embed(&h.embedder, claim).await,
        text: claim.to_string(),
        meta: RecordMeta {
            kind: SourceKind::FactCheck,
            source_name: "AltNews".to_string(),
            url: Some("https://altnews.in/debunk".to_string()),
            title: None,
            published_at: None,
            credibility_score: cred.score,
            credibility_level: cred.level,
            is_verified_source: cred.is_verified_source,
            verdict: Some(verdict),
            explanation: Some(explanation.to_string()),
            provider_tag: "google_factcheck".to_string(),
        },
    };
    h.index.upsert(COLLECTION_VERIFIED_CLAIMS, vec![record]).await.unwrap();
}

const CLAIM: &str = "Drinking hot water with lemon cures cancer";

#[tokio::test]
async fn canon_hit_short_circuits() {
    let h = harness(vec![Ok("should never be called")], EngineParams::default()).await;
    seed_canon(&h, CLAIM, Verdict::False, "No clinical evidence supports this.").await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::ExistingFactCheck);
    assert_eq!(result.verdict, Verdict::False);
    assert!(result.confidence > 0.85, "identical claim must clear the canon threshold");
    assert_eq!(result.contradiction_score, 0.0);
    assert_eq!(result.sources_used.len(), 1);
    assert_eq!(result.sources_used[0].kind, SourceKind::FactCheck);
    assert!(result.model_used.is_none(), "no model call on a canon hit");
}

#[tokio::test]
async fn reasoned_verdict_filters_sources_by_cited_indices() {
    let reply = r#"{"verdict":"false","confidence":0.9,"contradiction_score":0.8,
        "explanation":"Multiple medical sources refute the claim.",
        "cited_evidence_indices":[1,3]}"#;
    let h = harness(vec![Ok(reply)], relaxed_params()).await;

    seed_news(
        &h,
        &[
            ("BBC", "Doctors say hot lemon water does not cure cancer and warn against misinformation"),
            ("NDTV", "Hospitals report patients delaying treatment over lemon water claims about cancer"),
            ("Reuters", "Oncologists find no evidence that lemon water affects cancer outcomes"),
        ],
    )
    .await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::Reasoned);
    assert_eq!(result.verdict, Verdict::False);
    assert_eq!(result.confidence, 0.9);
    assert_eq!(result.contradiction_score, 0.8);
    assert_eq!(result.sources_used.len(), 2, "only cited indices survive");
    assert_eq!(result.model_used.as_deref(), Some("scripted"));
    for source in &result.sources_used {
        assert!(!source.snippet.is_empty());
        assert!(!source.url.is_empty());
    }
}

#[tokio::test]
async fn no_evidence_returns_unverified_without_model_call() {
    let h = harness(vec![Ok("should never be called")], EngineParams::default()).await;

    let result = h.engine.verify("xkcd unknowable claim", "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::Reasoned);
    assert_eq!(result.verdict, Verdict::Unverified);
    assert!(result.confidence <= 0.3);
    assert!(result.sources_used.is_empty());
    assert!(result.explanation.contains("No relevant sources"));
}

#[tokio::test]
async fn exhausted_backends_surface_as_error() {
    let h = harness(vec![Err(503)], relaxed_params()).await;
    seed_news(&h, &[("BBC", "relevant coverage of the lemon water cancer claim")]).await;

    let err = h.engine.verify(CLAIM, "en", None).await.unwrap_err();
    assert!(matches!(err, EngineError::AllBackendsDown { .. }));
}

#[tokio::test]
async fn unparseable_reply_is_repaired_once() {
    let reply = r#"{"verdict":"misleading","confidence":0.6,"contradiction_score":0.2,
        "explanation":"Partially supported.","cited_evidence_indices":[1]}"#;
    let h = harness(
        vec![Ok("I think this claim is probably wrong."), Ok(reply)],
        relaxed_params(),
    )
    .await;
    seed_news(&h, &[("BBC", "coverage of the lemon water cancer claim")]).await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::Reasoned);
    assert_eq!(result.verdict, Verdict::Misleading);
    assert_eq!(result.sources_used.len(), 1);
}

#[tokio::test]
async fn double_parse_failure_refuses() {
    let h = harness(
        vec![Ok("not json"), Ok("still not json")],
        relaxed_params(),
    )
    .await;
    seed_news(&h, &[("BBC", "coverage of the lemon water cancer claim")]).await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::Refused);
    assert_eq!(result.verdict, Verdict::Unverified);
    assert!(result.sources_used.is_empty());
}

#[tokio::test]
async fn uncited_verdict_downgrades_to_unverified() {
    let reply = r#"{"verdict":"true","confidence":0.95,"contradiction_score":0.0,
        "explanation":"It is true.","cited_evidence_indices":[]}"#;
    let h = harness(vec![Ok(reply)], relaxed_params()).await;
    seed_news(&h, &[("BBC", "coverage of the lemon water cancer claim")]).await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();

    assert_eq!(result.mode, Mode::Reasoned);
    assert_eq!(result.verdict, Verdict::Unverified, "no citations, no verdict");
    assert!(result.sources_used.is_empty());
}

#[tokio::test]
async fn out_of_range_citations_are_ignored() {
    let reply = r#"{"verdict":"false","confidence":0.8,"contradiction_score":0.1,
        "explanation":"Refuted.","cited_evidence_indices":[1, 99]}"#;
    let h = harness(vec![Ok(reply)], relaxed_params()).await;
    seed_news(&h, &[("BBC", "coverage of the lemon water cancer claim")]).await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();
    assert_eq!(result.sources_used.len(), 1);
}

#[tokio::test]
async fn confidence_is_clamped() {
    let reply = r#"{"verdict":"false","confidence":3.7,"contradiction_score":-2.0,
        "explanation":"Refuted.","cited_evidence_indices":[1]}"#;
    let h = harness(vec![Ok(reply)], relaxed_params()).await;
    seed_news(&h, &[("BBC", "coverage of the lemon water cancer claim")]).await;

    let result = h.engine.verify(CLAIM, "en", None).await.unwrap();
    assert_eq!(result.confidence, 1.0);
    assert_eq!(result.contradiction_score, 0.0);
}
