//! Error taxonomy for the publishing core.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PublishError>;

#[derive(Debug, Error)]
pub enum PublishError {
    /// A required credential or setting is missing.
    #[error("{0}")]
    Configuration(String),

    /// A request field is missing or malformed. Raised before any network call.
    #[error("{0}")]
    Validation(String),

    /// The upstream provider rejected one of the protocol steps.
    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    NotFound(String),

    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for PublishError {
    fn from(e: rusqlite::Error) -> Self {
        PublishError::Storage(e.to_string())
    }
}

impl From<r2d2::Error> for PublishError {
    fn from(e: r2d2::Error) -> Self {
        PublishError::Storage(e.to_string())
    }
}
