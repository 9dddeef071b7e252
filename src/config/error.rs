use thiserror::Error;

#[derive(Debug, Error)]
/// Configuration loading and validation errors.
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("chunk overlap ({overlap}) must be smaller than chunk size ({size})")]
    OverlapExceedsChunk { size: usize, overlap: usize },

    #[error("{var} is required when {feature} is enabled")]
    MissingRequired {
        var: &'static str,
        feature: &'static str,
    },
}
