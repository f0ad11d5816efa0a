use thiserror::Error;

pub type Result<T> = std::result::Result<T, LensError>;

#[derive(Debug, Error)]
pub enum LensError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] content_store::StoreError),

    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("source root does not exist: {0}")]
    MissingRoot(String),

    #[error("unrecognized folder: {0}")]
    UnknownFolder(String),

    #[error("content missing for hash {0}")]
    MissingContent(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
