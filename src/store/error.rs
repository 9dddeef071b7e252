use thiserror::Error;

#[derive(Debug, Error)]
/// Errors from the document store.
pub enum StoreError {
    #[error("document store I/O error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("an ingestion run is already active")]
    RunAlreadyActive,

    #[error("unknown item kind for document storage: {kind}")]
    UnknownItemKind { kind: String },

    #[error("row decode error: {reason}")]
    Decode { reason: String },
}
