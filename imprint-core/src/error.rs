use uuid::Uuid;

/// Errors surfaced by an order store implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// An external provider call failed. Never retried at this layer; the
/// invoking job or handler owns the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Call(String),

    #[error("provider rejected request: {0}")]
    Rejected(String),
}
