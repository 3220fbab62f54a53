use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("state store I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("state (de)serialization error: {source}")]
    Persist {
        #[from]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Api(#[from] ingest_client::ApiError),
}
