//! Model gateway: preference-ordered dispatch across heterogeneous LLM
//! backends.
//!
//! The chain is walked strictly sequentially — probing backends in parallel
//! would burn paid quota on requests whose results are discarded. Each
//! backend gets up to [`RetryPolicy::max_attempts`] tries under its own
//! deadline; transient failures back off exponentially with jitter, hard
//! failures fall through to the next backend at once.

pub mod backend;
pub mod error;
pub mod health;

#[cfg(test)]
mod tests;

pub use backend::{ChatBackend, GeminiBackend, OllamaBackend, OpenRouterBackend};
pub use error::{BackendError, GatewayError};
pub use health::{BackendHealth, HealthMonitor};

use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Retry behavior for one backend.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// `base · 2^attempt` plus uniform jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_backoff * 2u32.saturating_pow(attempt);
        let jitter_ms = rand::thread_rng().gen_range(0..=self.max_jitter.as_millis() as u64);
        exp + Duration::from_millis(jitter_ms)
    }
}

/// A successful completion.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub text: String,
    pub model_used: String,
    /// `online` when a remote backend answered, `offline` otherwise.
    pub online: bool,
    pub latency: Duration,
}

/// The backend chain.
pub struct ModelGateway {
    backends: Vec<Arc<dyn ChatBackend>>,
    force_offline: bool,
    per_call_deadline: Duration,
    retry: RetryPolicy,
}

impl ModelGateway {
    pub fn new(
        backends: Vec<Arc<dyn ChatBackend>>,
        force_offline: bool,
        per_call_deadline: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backends,
            force_offline,
            per_call_deadline,
            retry,
        }
    }

    pub fn backends(&self) -> &[Arc<dyn ChatBackend>] {
        &self.backends
    }

    pub fn force_offline(&self) -> bool {
        self.force_offline
    }

    /// `online` when at least one remote backend is eligible.
    pub fn current_mode(&self) -> &'static str {
        if !self.force_offline && self.backends.iter().any(|b| b.is_remote()) {
            "online"
        } else {
            "offline"
        }
    }

    fn eligible(&self) -> impl Iterator<Item = &Arc<dyn ChatBackend>> {
        self.backends
            .iter()
            .filter(move |b| !(self.force_offline && b.is_remote()))
    }

    /// Dispatches a completion along the chain.
    #[instrument(skip_all, fields(prompt_len = prompt.len()))]
    pub async fn generate(&self, prompt: &str, system: &str) -> Result<GenerateOutput, GatewayError> {
        let started = Instant::now();
        let mut failures: Vec<String> = Vec::new();
        let mut tried_any = false;

        for backend in self.eligible() {
            tried_any = true;
            match self.call_with_retry(backend.as_ref(), prompt, system).await {
                Ok(text) => {
                    let latency = started.elapsed();
                    info!(
                        model = backend.id(),
                        latency_ms = latency.as_millis() as u64,
                        "completion generated"
                    );
                    return Ok(GenerateOutput {
                        text,
                        model_used: backend.id().to_string(),
                        online: backend.is_remote(),
                        latency,
                    });
                }
                Err(e) => {
                    warn!(model = backend.id(), error = %e, "backend exhausted, falling through");
                    failures.push(format!("{}: {}", backend.id(), e));
                }
            }
        }

        if !tried_any {
            return Err(GatewayError::NoBackends);
        }

        Err(GatewayError::AllBackendsDown {
            summary: failures.join("; "),
        })
    }

    async fn call_with_retry(
        &self,
        backend: &dyn ChatBackend,
        prompt: &str,
        system: &str,
    ) -> Result<String, BackendError> {
        let mut last_error = BackendError::NotConfigured("no attempt made".to_string());

        for attempt in 0..self.retry.max_attempts {
            let result = match timeout(self.per_call_deadline, backend.generate(prompt, system)).await
            {
                Ok(inner) => inner,
                Err(_) => Err(BackendError::Timeout),
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retriable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.backoff(attempt);
                    debug!(
                        model = backend.id(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    last_error = e;
                }
                Err(e) if e.is_retriable() => {
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }
}
