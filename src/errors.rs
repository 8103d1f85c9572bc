use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("invalid grid cell id: {0}")]
    InvalidCell(String),
    #[error("spot {0} is not currently displayed")]
    UnknownSpot(String),
    #[error("user location unavailable")]
    LocationUnavailable,
}
