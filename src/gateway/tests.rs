use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::*;

/// Scripted backend: fails `failures` times, then succeeds (or always
/// fails when `failures == u32::MAX`).
struct ScriptedBackend {
    id: String,
    remote: bool,
    failures: u32,
    error_kind: fn() -> BackendError,
    calls: AtomicU32,
}

impl ScriptedBackend {
    fn flaky(id: &str, remote: bool, failures: u32) -> Self {
        Self {
            id: id.to_string(),
            remote,
            failures,
            error_kind: || BackendError::Status(503),
            calls: AtomicU32::new(0),
        }
    }

    fn hard_failing(id: &str, remote: bool) -> Self {
        Self {
            id: id.to_string(),
            remote,
            failures: u32::MAX,
            error_kind: || BackendError::Status(401),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_remote(&self) -> bool {
        self.remote
    }

    async fn generate(&self, _prompt: &str, _system: &str) -> Result<String, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err((self.error_kind)())
        } else {
            Ok(format!("reply from {}", self.id))
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_backoff: Duration::from_millis(1),
        max_jitter: Duration::from_millis(1),
    }
}

fn gateway(backends: Vec<Arc<dyn ChatBackend>>, force_offline: bool) -> ModelGateway {
    ModelGateway::new(backends, force_offline, Duration::from_secs(5), fast_retry())
}

#[tokio::test]
async fn first_healthy_backend_wins() {
    let gw = gateway(
        vec![
            Arc::new(ScriptedBackend::flaky("gemini", true, 0)),
            Arc::new(ScriptedBackend::flaky("ollama", false, 0)),
        ],
        false,
    );

    let out = gw.generate("claim", "system").await.unwrap();
    assert_eq!(out.model_used, "gemini");
    assert!(out.online);
}

#[tokio::test]
async fn transient_failures_are_retried_on_same_backend() {
    let backend = Arc::new(ScriptedBackend::flaky("gemini", true, 2));
    let gw = gateway(vec![backend.clone()], false);

    let out = gw.generate("claim", "system").await.unwrap();
    assert_eq!(out.model_used, "gemini");
    assert_eq!(backend.calls.load(Ordering::SeqCst), 3, "two failures + one success");
}

#[tokio::test]
async fn non_retriable_falls_through_immediately() {
    let auth_broken = Arc::new(ScriptedBackend::hard_failing("gemini", true));
    let local = Arc::new(ScriptedBackend::flaky("ollama", false, 0));
    let gw = gateway(vec![auth_broken.clone(), local], false);

    let out = gw.generate("claim", "system").await.unwrap();
    assert_eq!(out.model_used, "ollama");
    assert!(!out.online);
    assert_eq!(
        auth_broken.calls.load(Ordering::SeqCst),
        1,
        "401 must not be retried"
    );
}

#[tokio::test]
async fn exhausted_chain_reports_every_backend() {
    let gw = gateway(
        vec![
            Arc::new(ScriptedBackend::flaky("gemini", true, u32::MAX)),
            Arc::new(ScriptedBackend::flaky("ollama", false, u32::MAX)),
        ],
        false,
    );

    let err = gw.generate("claim", "system").await.unwrap_err();
    match err {
        GatewayError::AllBackendsDown { summary } => {
            assert!(summary.contains("gemini"));
            assert!(summary.contains("ollama"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn forced_offline_skips_remote_backends() {
    let remote = Arc::new(ScriptedBackend::flaky("gemini", true, 0));
    let local = Arc::new(ScriptedBackend::flaky("ollama", false, 0));
    let gw = gateway(vec![remote.clone(), local], true);

    let out = gw.generate("claim", "system").await.unwrap();
    assert_eq!(out.model_used, "ollama");
    assert_eq!(remote.calls.load(Ordering::SeqCst), 0, "remote must not be touched");
    assert_eq!(gw.current_mode(), "offline");
}

#[tokio::test]
async fn offline_with_only_remote_backends_is_empty_chain() {
    let gw = gateway(vec![Arc::new(ScriptedBackend::flaky("gemini", true, 0))], true);
    assert!(matches!(
        gw.generate("claim", "system").await,
        Err(GatewayError::NoBackends)
    ));
}

#[tokio::test]
async fn sampler_sweep_marks_backends_ok() {
    let backends: Vec<Arc<dyn ChatBackend>> = vec![
        Arc::new(ScriptedBackend::flaky("gemini", true, 0)),
        Arc::new(ScriptedBackend::flaky("ollama", false, 0)),
    ];
    let monitor = HealthMonitor::new();
    monitor.sample_once(&backends).await;

    let ids = vec!["gemini".to_string(), "ollama".to_string()];
    assert!(!monitor.any_down(&ids));
}
