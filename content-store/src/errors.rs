use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serde json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown content version: {0}")]
    UnknownVersion(i64),

    #[error("content version {0} is sealed and immutable")]
    VersionSealed(i64),

    #[error("content version {0} is not sealed yet")]
    VersionNotSealed(i64),

    #[error("unknown playset: {0}")]
    UnknownPlayset(String),

    #[error("content missing for hash {0}")]
    MissingContent(String),
}
