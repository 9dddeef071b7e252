//! Claimcheck HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use mimalloc::MiMalloc;
use tokio::net::TcpListener;
use tokio::signal;

use claimcheck::connectors::{FactCheckClient, HubClient, SourceConnector};
use claimcheck::embedding::{
    EmbeddingProvider, FallbackChain, GeminiEmbedder, HashedEmbedder, OllamaEmbedder,
    OpenRouterEmbedder,
};
use claimcheck::gateway::{
    ChatBackend, GeminiBackend, HealthMonitor, ModelGateway, OllamaBackend, OpenRouterBackend,
    RetryPolicy,
};
use claimcheck::index::{QdrantIndex, VectorIndex};
use claimcheck::ingest::{IngestOrchestrator, IngestParams};
use claimcheck::engine::{EngineParams, VerificationEngine};
use claimcheck::{ClaimLogQueue, Config, DocStore, SourceKind};

use claimcheck_server::api::{router, AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        offline = config.force_offline,
        "claimcheck starting"
    );

    // Durable state.
    let store = DocStore::connect(&config.db_path).await?;
    let stale = store.fail_stale_running_runs().await?;
    if stale > 0 {
        tracing::warn!(stale, "released ingest gate held by a dead process");
    }

    let index = Arc::new(QdrantIndex::connect(&config.qdrant_url).await?);
    if let Err(e) = index.health_check().await {
        tracing::warn!(error = %e, "vector store unreachable at startup, continuing");
    }
    let index: Arc<dyn VectorIndex> = index;

    // Embedding chain: remote providers first, the deterministic hasher as
    // the floor so the pipeline never loses embedding entirely.
    let mut providers: Vec<Arc<dyn EmbeddingProvider>> = Vec::new();
    if !config.force_offline {
        if let Some(key) = &config.gemini_api_key {
            providers.push(Arc::new(GeminiEmbedder::new(
                key.clone(),
                None,
                config.model_timeout,
            )?));
        }
        if let Some(key) = &config.openrouter_api_key {
            providers.push(Arc::new(OpenRouterEmbedder::new(
                key.clone(),
                None,
                config.model_timeout,
            )?));
        }
    }
    providers.push(Arc::new(OllamaEmbedder::new(
        &config.ollama_endpoint,
        None,
        config.model_timeout,
    )?));
    providers.push(Arc::new(HashedEmbedder::default()));
    let chain = Arc::new(FallbackChain::new(providers));

    // Model backend chain in preference order.
    let mut backends: Vec<Arc<dyn ChatBackend>> = Vec::new();
    if let Some(key) = &config.gemini_api_key {
        backends.push(Arc::new(GeminiBackend::new(
            key.clone(),
            config.gemini_model.clone(),
        )?));
    }
    if let Some(key) = &config.openrouter_api_key {
        backends.push(Arc::new(OpenRouterBackend::new(
            key.clone(),
            config.openrouter_model.clone(),
        )?));
    }
    backends.push(Arc::new(OllamaBackend::new(
        &config.ollama_endpoint,
        config.ollama_model.clone(),
    )?));

    let gateway = Arc::new(ModelGateway::new(
        backends.clone(),
        config.force_offline,
        config.model_timeout,
        RetryPolicy::default(),
    ));

    let health = HealthMonitor::new();
    health.sample_once(&backends).await;
    health.spawn_sampler(backends, config.health_interval);

    // Connectors.
    let hub_connectors: Vec<Arc<dyn SourceConnector>> = vec![
        Arc::new(HubClient::new(
            &config.source_hub_url,
            SourceKind::News,
            config.connector_timeout,
        )?),
        Arc::new(HubClient::new(
            &config.source_hub_url,
            SourceKind::Gov,
            config.connector_timeout,
        )?),
        Arc::new(HubClient::new(
            &config.source_hub_url,
            SourceKind::Social,
            config.connector_timeout,
        )?),
    ];
    let factcheck = Arc::new(FactCheckClient::new(
        config.factcheck_api_key.clone(),
        config.connector_timeout,
    )?);

    let orchestrator = Arc::new(IngestOrchestrator::new(
        hub_connectors.clone(),
        config.factcheck_api_key.is_some().then(|| Arc::clone(&factcheck)),
        Arc::clone(&chain),
        Arc::clone(&index),
        store.clone(),
        IngestParams {
            cooldown: config.cooldown,
            connector_deadline: config.connector_timeout,
            embed_batch: config.embed_batch,
            chunk_width: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            ..IngestParams::default()
        },
    ));

    let live_news = Arc::clone(&hub_connectors[0]);
    let mut engine = VerificationEngine::new(
        Arc::clone(&chain),
        Arc::clone(&index),
        store.clone(),
        Arc::clone(&gateway),
        EngineParams {
            canon_similarity: config.canon_similarity,
            min_similarity: config.min_similarity,
            context_limit: config.context_limit,
            ..EngineParams::default()
        },
    )
    .with_live_news(live_news);
    if config.factcheck_api_key.is_some() {
        engine = engine.with_factcheck(Arc::clone(&factcheck));
    }
    let engine = Arc::new(engine);

    let log_queue = ClaimLogQueue::new(config.log_queue_capacity);
    let log_writer = log_queue.spawn_writer(store.clone());

    let state = AppState::new(
        engine,
        orchestrator,
        gateway,
        store,
        health,
        log_queue.clone(),
        config.admin_token.clone(),
        config.request_timeout,
    );

    let app = router(state, &config.cors_origins);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain whatever claim logs are still queued before exiting.
    log_queue.close();
    if let Err(e) = log_writer.await {
        tracing::error!(error = %e, "claim-log writer did not drain cleanly");
    }

    tracing::info!("claimcheck shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating graceful shutdown");
        }
    }
}
