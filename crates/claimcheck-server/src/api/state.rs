use std::sync::Arc;
use std::time::Duration;

use claimcheck::{
    ClaimLogQueue, DocStore, HealthMonitor, IngestOrchestrator, ModelGateway, VerificationEngine,
};

use super::ratelimit::RateLimiter;

/// Default `/verify` budget per caller fingerprint.
pub const VERIFY_RATE_PER_MINUTE: u32 = 30;

/// Everything the handlers need. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<VerificationEngine>,
    pub orchestrator: Arc<IngestOrchestrator>,
    pub gateway: Arc<ModelGateway>,
    pub store: DocStore,
    pub health: HealthMonitor,
    pub log_queue: ClaimLogQueue,
    pub admin_token: String,
    pub request_timeout: Duration,
    pub rate_limiter: RateLimiter,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<VerificationEngine>,
        orchestrator: Arc<IngestOrchestrator>,
        gateway: Arc<ModelGateway>,
        store: DocStore,
        health: HealthMonitor,
        log_queue: ClaimLogQueue,
        admin_token: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            engine,
            orchestrator,
            gateway,
            store,
            health,
            log_queue,
            admin_token,
            request_timeout,
            rate_limiter: RateLimiter::new(VERIFY_RATE_PER_MINUTE),
        }
    }

    /// Backend ids in chain order, for the health map.
    pub fn backend_ids(&self) -> Vec<String> {
        self.gateway
            .backends()
            .iter()
            .map(|b| b.id().to_string())
            .collect()
    }
}
