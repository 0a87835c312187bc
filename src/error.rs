use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("job store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("invalid job config: {0}")]
    InvalidConfig(String),

    #[error("job {0} not found")]
    JobNotFound(Uuid),

    #[error("no stage implementation for job kind '{0}'")]
    UnsupportedKind(String),

    #[error("dns error: {0}")]
    Dns(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
