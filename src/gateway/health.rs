//! Out-of-band backend health sampling.
//!
//! A background task pings every configured backend on a fixed interval and
//! writes the outcome into a process-local map. Readers (the health
//! endpoint) never block on a probe and may observe slightly stale data.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

use super::ChatBackend;

/// Last observed state of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendHealth {
    Ok,
    Down,
}

impl BackendHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendHealth::Ok => "ok",
            BackendHealth::Down => "down",
        }
    }
}

/// Shared status map. Written only by the sampler task; read concurrently.
#[derive(Clone, Default)]
pub struct HealthMonitor {
    statuses: Arc<RwLock<HashMap<String, BackendHealth>>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot as `backend_id -> "ok" | "down"`. Backends never sampled
    /// yet report as down.
    pub fn snapshot(&self, backend_ids: &[String]) -> HashMap<String, String> {
        let statuses = self.statuses.read().unwrap_or_else(|e| e.into_inner());
        backend_ids
            .iter()
            .map(|id| {
                let health = statuses.get(id).copied().unwrap_or(BackendHealth::Down);
                (id.clone(), health.as_str().to_string())
            })
            .collect()
    }

    pub fn any_down(&self, backend_ids: &[String]) -> bool {
        let statuses = self.statuses.read().unwrap_or_else(|e| e.into_inner());
        backend_ids
            .iter()
            .any(|id| statuses.get(id).copied().unwrap_or(BackendHealth::Down) == BackendHealth::Down)
    }

    pub fn record(&self, backend_id: &str, health: BackendHealth) {
        let mut statuses = self.statuses.write().unwrap_or_else(|e| e.into_inner());
        statuses.insert(backend_id.to_string(), health);
    }

    /// Probes every backend once. Factored out of the sampler loop so tests
    /// and startup can run a synchronous sweep.
    pub async fn sample_once(&self, backends: &[Arc<dyn ChatBackend>]) {
        for backend in backends {
            let health = match backend.ping().await {
                Ok(()) => BackendHealth::Ok,
                Err(e) => {
                    debug!(model = backend.id(), error = %e, "ping failed");
                    BackendHealth::Down
                }
            };
            self.record(backend.id(), health);
        }
    }

    /// Spawns the periodic sampler. The task runs for the life of the
    /// process; the returned handle exists for tests.
    pub fn spawn_sampler(
        &self,
        backends: Vec<Arc<dyn ChatBackend>>,
        interval: Duration,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.sample_once(&backends).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsampled_backends_report_down() {
        let monitor = HealthMonitor::new();
        let ids = vec!["gemini".to_string(), "ollama".to_string()];

        let snapshot = monitor.snapshot(&ids);
        assert_eq!(snapshot["gemini"], "down");
        assert!(monitor.any_down(&ids));
    }

    #[test]
    fn recorded_status_is_visible() {
        let monitor = HealthMonitor::new();
        let ids = vec!["gemini".to_string(), "ollama".to_string()];

        monitor.record("gemini", BackendHealth::Ok);
        monitor.record("ollama", BackendHealth::Ok);
        assert!(!monitor.any_down(&ids));

        monitor.record("gemini", BackendHealth::Down);
        let snapshot = monitor.snapshot(&ids);
        assert_eq!(snapshot["gemini"], "down");
        assert_eq!(snapshot["ollama"], "ok");
    }
}
