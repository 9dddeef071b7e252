use std::sync::Arc;

use super::*;
use crate::connectors::mock::MockConnector;
use crate::embedding::HashedEmbedder;
use crate::index::InMemoryIndex;

struct Fixture {
    orchestrator: IngestOrchestrator,
    index: Arc<InMemoryIndex>,
    store: DocStore,
}

async fn fixture(connectors: Vec<Arc<dyn SourceConnector>>) -> Fixture {
    let chain = Arc::new(FallbackChain::new(vec![Arc::new(HashedEmbedder::default())]));
    let index = Arc::new(InMemoryIndex::new());
    let store = DocStore::connect_in_memory().await.unwrap();

    let orchestrator = IngestOrchestrator::new(
        connectors,
        None,
        chain,
        index.clone() as Arc<dyn VectorIndex>,
        store.clone(),
        IngestParams {
            cooldown: Duration::from_secs(600),
            connector_deadline: Duration::from_secs(5),
            ..IngestParams::default()
        },
    );

    Fixture {
        orchestrator,
        index,
        store,
    }
}

fn news_connector(articles: &[(&str, &str, &str)]) -> Arc<MockConnector> {
    let connector = MockConnector::new("hub:news", SourceKind::News);
    let items = articles
        .iter()
        .map(|(source, url, body)| connector.item(source, Some(url), body))
        .collect();
    Arc::new(connector.with_items(items))
}

#[tokio::test]
async fn successful_run_counts_and_persists() {
    let news = news_connector(&[
        ("BBC", "https://bbc.com/a", "Article one body text."),
        ("NDTV", "https://ndtv.com/b", "Article two body text."),
    ]);
    let gov = MockConnector::new("hub:gov", SourceKind::Gov);
    let gov_items = vec![gov.item("PIB", Some("https://pib.gov.in/x"), "Official bulletin.")];
    let gov: Arc<dyn SourceConnector> = Arc::new(gov.with_items(gov_items));

    let f = fixture(vec![news.clone(), gov]).await;
    let report = f.orchestrator.ingest(false, "admin").await.unwrap();

    assert_eq!(report.status, IngestStatus::Ok);
    assert_eq!(report.counts.news, 2);
    assert_eq!(report.counts.gov, 1);
    assert!(report.errors.is_empty());
    assert!(report.last_synced.is_some());

    // Vector records and raw rows both landed.
    assert_eq!(f.index.count(COLLECTION_NEWS).await.unwrap(), 2);
    assert_eq!(f.index.count(COLLECTION_GOV).await.unwrap(), 1);
    assert_eq!(f.store.count_items(SourceKind::News).await.unwrap(), 2);
    assert_eq!(f.store.count_items(SourceKind::Gov).await.unwrap(), 1);

    // The run row is terminal.
    let run = f.store.latest_ingest_run().await.unwrap().unwrap();
    assert_eq!(run.status().unwrap(), RunStatus::Ok);
    assert_eq!(run.count_news, 2);
}

#[tokio::test]
async fn failing_connector_degrades_to_partial() {
    let news: Arc<dyn SourceConnector> =
        Arc::new(MockConnector::new("hub:news", SourceKind::News).failing("connection refused"));
    let gov = MockConnector::new("hub:gov", SourceKind::Gov);
    let gov_items = vec![gov.item("PIB", Some("https://pib.gov.in/x"), "Official bulletin.")];
    let gov: Arc<dyn SourceConnector> = Arc::new(gov.with_items(gov_items));

    let f = fixture(vec![news, gov]).await;
    let report = f.orchestrator.ingest(false, "admin").await.unwrap();

    assert_eq!(report.status, IngestStatus::Partial);
    assert_eq!(report.counts.news, 0);
    assert_eq!(report.counts.gov, 1);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("news:"));
}

#[tokio::test]
async fn all_connectors_failing_is_a_failed_run() {
    let news: Arc<dyn SourceConnector> =
        Arc::new(MockConnector::new("hub:news", SourceKind::News).failing("down"));

    let f = fixture(vec![news]).await;
    let report = f.orchestrator.ingest(false, "admin").await.unwrap();

    assert_eq!(report.status, IngestStatus::Failed);
    let run = f.store.latest_ingest_run().await.unwrap().unwrap();
    assert_eq!(run.status().unwrap(), RunStatus::Failed);
}

#[tokio::test]
async fn cooldown_rejects_unforced_rerun() {
    let f = fixture(vec![news_connector(&[("BBC", "https://bbc.com/a", "Body.")])]).await;

    let first = f.orchestrator.ingest(false, "admin").await.unwrap();
    assert_eq!(first.status, IngestStatus::Ok);

    let second = f.orchestrator.ingest(false, "admin").await.unwrap();
    assert_eq!(second.status, IngestStatus::Cooldown);
    assert!(second.last_synced.is_some());

    // Force bypasses the cooldown.
    let forced = f.orchestrator.ingest(true, "admin").await.unwrap();
    assert_eq!(forced.status, IngestStatus::Ok);
}

#[tokio::test]
async fn active_gate_rejects_second_start() {
    let f = fixture(vec![news_connector(&[("BBC", "https://bbc.com/a", "Body.")])]).await;

    // Hold the gate by hand, as a concurrent run would.
    let held = f.store.begin_ingest_run("other", false).await.unwrap();

    let report = f.orchestrator.ingest(true, "admin").await.unwrap();
    assert_eq!(report.status, IngestStatus::AlreadyRunning);
    assert_eq!(report.counts.news, 0);

    // The held run is untouched.
    let active = f.store.active_ingest_run().await.unwrap().unwrap();
    assert_eq!(active.run_id, held.run_id);
}

#[tokio::test]
async fn rerun_with_force_is_idempotent_on_record_ids() {
    let articles: &[(&str, &str, &str)] = &[
        ("BBC", "https://bbc.com/a", "Article one body text."),
        ("NDTV", "https://ndtv.com/b", "Article two body text."),
    ];

    let f = fixture(vec![news_connector(articles)]).await;
    f.orchestrator.ingest(true, "admin").await.unwrap();
    let count_after_first = f.index.count(COLLECTION_NEWS).await.unwrap();

    // Unchanged upstream, forced again: upserts replace, never duplicate.
    let f2_connector = news_connector(articles);
    let report = {
        let orchestrator = IngestOrchestrator::new(
            vec![f2_connector],
            None,
            Arc::new(FallbackChain::new(vec![Arc::new(HashedEmbedder::default())])),
            Arc::clone(&f.index) as Arc<dyn VectorIndex>,
            f.store.clone(),
            IngestParams::default(),
        );
        orchestrator.ingest(true, "admin").await.unwrap()
    };

    assert_eq!(report.status, IngestStatus::Ok);
    assert_eq!(f.index.count(COLLECTION_NEWS).await.unwrap(), count_after_first);
}

#[tokio::test]
async fn historical_url_dedup_skips_seen_items() {
    let articles: &[(&str, &str, &str)] =
        &[("BBC", "https://bbc.com/a?utm_source=feed", "Article body.")];

    let f = fixture(vec![news_connector(articles)]).await;
    let first = f.orchestrator.ingest(false, "admin").await.unwrap();
    assert_eq!(first.counts.news, 1);

    // Same story behind different tracking params: historical dedup wins.
    let again = news_connector(&[("BBC", "https://bbc.com/a?utm_source=other", "Article body.")]);
    let orchestrator = IngestOrchestrator::new(
        vec![again],
        None,
        Arc::new(FallbackChain::new(vec![Arc::new(HashedEmbedder::default())])),
        Arc::clone(&f.index) as Arc<dyn VectorIndex>,
        f.store.clone(),
        IngestParams {
            cooldown: Duration::ZERO,
            ..IngestParams::default()
        },
    );
    let second = orchestrator.ingest(false, "admin").await.unwrap();
    assert_eq!(second.status, IngestStatus::Ok);
    assert_eq!(second.counts.news, 0, "duplicate URL must be skipped");
}

#[tokio::test]
async fn in_run_content_dedup_rejects_copies() {
    let connector = MockConnector::new("hub:news", SourceKind::News);
    let items = vec![
        connector.item("BBC", Some("https://bbc.com/a"), "Identical wire copy."),
        connector.item("Mirror Site", Some("https://mirror.example/a"), "Identical wire copy."),
    ];
    let connector: Arc<dyn SourceConnector> = Arc::new(connector.with_items(items));

    let f = fixture(vec![connector]).await;
    let report = f.orchestrator.ingest(false, "admin").await.unwrap();

    assert_eq!(report.counts.news, 1, "content duplicate must be rejected");
}

#[tokio::test]
async fn long_bodies_are_chunked_into_multiple_records() {
    let body: String = (0..600).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
    let connector = MockConnector::new("hub:news", SourceKind::News);
    let items = vec![connector.item("BBC", Some("https://bbc.com/long"), &body)];
    let connector: Arc<dyn SourceConnector> = Arc::new(connector.with_items(items));

    let f = fixture(vec![connector]).await;
    let report = f.orchestrator.ingest(false, "admin").await.unwrap();

    assert_eq!(report.counts.news, 1, "one item");
    let records = f.index.count(COLLECTION_NEWS).await.unwrap();
    assert!(records > 1, "but several chunk records, got {records}");

    let row_count = f.store.count_items(SourceKind::News).await.unwrap();
    assert_eq!(row_count, 1);
}

#[tokio::test]
async fn manifest_is_pinned_on_first_write() {
    let f = fixture(vec![news_connector(&[("BBC", "https://bbc.com/a", "Body.")])]).await;
    f.orchestrator.ingest(false, "admin").await.unwrap();

    let manifest = f
        .store
        .collection_manifest(COLLECTION_NEWS)
        .await
        .unwrap()
        .expect("manifest must exist after first write");
    assert_eq!(manifest.provider, "hashed");
    assert_eq!(manifest.dim, 384);
}
