use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Capture(#[from] capture_core::CaptureError),

    #[error(transparent)]
    Api(#[from] ingest_client::ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid feed line: {0}")]
    Feed(#[from] serde_json::Error),
}
