use thiserror::Error;

/// Failure of a single backend call. The retriable/non-retriable split
/// drives the gateway's retry-vs-fall-through decision.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("network error: {0}")]
    Network(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend not configured: {0}")]
    NotConfigured(String),

    #[error("empty completion")]
    EmptyCompletion,
}

impl BackendError {
    /// Transient failures are retried on the same backend; everything else
    /// falls through to the next backend immediately.
    pub fn is_retriable(&self) -> bool {
        match self {
            BackendError::Network(_) | BackendError::Timeout => true,
            BackendError::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            BackendError::Malformed(_)
            | BackendError::NotConfigured(_)
            | BackendError::EmptyCompletion => false,
        }
    }
}

/// Gateway-level failures.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("all model backends failed: {summary}")]
    AllBackendsDown { summary: String },

    #[error("no model backends configured")]
    NoBackends,
}
