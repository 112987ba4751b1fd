use thiserror::Error;

/// Errors emitted by similarity providers.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding request timed out")]
    Timeout,
    #[error("provider rejected the request: {0}")]
    Api(String),
}
