use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned status {status}")]
    Http { status: u16 },
    #[error("failed to decode server response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("post {id} is already present")]
    DuplicateId { id: i64 },
    #[error("no post with id {id}")]
    NotFound { id: i64 },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{field} must not be empty")]
    Validation { field: &'static str },
    #[error("an operation for this post is already in flight")]
    OperationInFlight,
    #[error("no edit is in progress")]
    NoActiveEdit,
    #[error("no deletion is pending confirmation")]
    NoPendingDeletion,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
