use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by vector index operations.
pub enum IndexError {
    #[error("failed to connect to vector store at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    #[error("failed to create collection '{collection}': {message}")]
    CreateCollectionFailed { collection: String, message: String },

    #[error("collection not found: {collection}")]
    CollectionNotFound { collection: String },

    #[error("failed to upsert records to '{collection}': {message}")]
    UpsertFailed { collection: String, message: String },

    #[error("failed to search '{collection}': {message}")]
    SearchFailed { collection: String, message: String },

    #[error("failed to count '{collection}': {message}")]
    CountFailed { collection: String, message: String },

    #[error("dimension mismatch in '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },
}
